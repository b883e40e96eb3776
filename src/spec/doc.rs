/// Free documentation text attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doc(String);

/// Width of a generated Doxygen line, including the leading ` * `.
pub const DOC_LINE_WIDTH: usize = 76;

impl Doc {
    pub fn new(text: impl Into<String>) -> Self {
        Doc(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }

    /// Formats the text as a Doxygen block comment, wrapped so that no line
    /// exceeds `width` characters (unless a single word is longer).
    pub fn doxygen(&self, width: usize) -> Vec<String> {
        doxygen_block(self.0.trim(), width)
    }

    /// The text as a C string literal body.
    pub fn c_literal(&self) -> String {
        escape_c_string(self.0.trim())
    }
}

/// Joins a function description with its `@param` and `@return` tags.
pub fn function_doc(
    text: Option<&Doc>,
    params: impl IntoIterator<Item = (String, Doc)>,
    returns: Option<&Doc>,
) -> Option<Doc> {
    let mut paragraphs = Vec::new();
    if let Some(doc) = text {
        paragraphs.push(doc.text().trim().to_string());
    }
    let tags: Vec<String> = params
        .into_iter()
        .map(|(name, doc)| format!("@param {} {}", name, doc.text().trim()))
        .chain(returns.map(|doc| format!("@return {}", doc.text().trim())))
        .collect();
    if !tags.is_empty() {
        paragraphs.push(tags.join("\n"));
    }
    if paragraphs.is_empty() {
        None
    } else {
        Some(Doc(paragraphs.join("\n\n")))
    }
}

fn doxygen_block(text: &str, width: usize) -> Vec<String> {
    let room = width.saturating_sub(3).max(1);
    let mut out = vec!["/**".to_string()];
    for source_line in text.lines() {
        let words: Vec<&str> = source_line.split_whitespace().collect();
        if words.is_empty() {
            out.push(" *".to_string());
            continue;
        }
        let mut current = String::new();
        for word in words {
            if !current.is_empty() && current.len() + 1 + word.len() > room {
                out.push(format!(" * {current}"));
                current.clear();
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        out.push(format!(" * {current}"));
    }
    out.push(" */".to_string());
    out
}

pub fn escape_c_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_text_wraps_to_width() {
        let doc = Doc::new("word ".repeat(40));
        let lines = doc.doxygen(DOC_LINE_WIDTH);
        assert_eq!(lines.first().map(String::as_str), Some("/**"));
        assert_eq!(lines.last().map(String::as_str), Some(" */"));
        assert!(lines.len() > 3);
        assert!(lines.iter().all(|l| l.len() <= DOC_LINE_WIDTH));
    }

    #[test]
    fn paragraphs_are_kept() {
        let doc = function_doc(
            Some(&Doc::new("Adds things.")),
            vec![("a".to_string(), Doc::new("the first"))],
            Some(&Doc::new("the sum")),
        )
        .unwrap();
        assert_eq!(
            doc.doxygen(DOC_LINE_WIDTH),
            vec!["/**", " * Adds things.", " *", " * @param a the first", " * @return the sum", " */"]
        );
    }

    #[test]
    fn quotes_are_escaped_for_c() {
        assert_eq!(Doc::new("say \"hi\"\n").c_literal(), "say \\\"hi\\\"");
    }
}
