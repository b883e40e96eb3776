//! Identifier spelling for generated code.
use once_cell::sync::Lazy;
use regex::Regex;

static CAMEL_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());
static ACRONYM_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").unwrap());
static NON_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").unwrap());

/// `HTTPRequest` gives `http_request`, `my-module` gives `my_module`.
pub fn snake_case(name: &str) -> String {
    let s = ACRONYM_BOUNDARY.replace_all(name, "${1}_${2}");
    let s = CAMEL_BOUNDARY.replace_all(&s, "${1}_${2}");
    let s = NON_IDENT.replace_all(&s, "_");
    s.trim_matches('_').to_lowercase()
}

/// Include guard for a generated header: `ShapeList` with `hpp` gives `SHAPE_LIST_HPP`.
pub fn include_guard(name: &str, extension: &str) -> String {
    format!("{}_{}", snake_case(name), snake_case(extension)).to_uppercase()
}

/// A C identifier usable as a module or target name.
pub fn c_identifier(name: &str) -> String {
    let s = NON_IDENT.replace_all(name, "_").into_owned();
    if s.starts_with(|c: char| c.is_ascii_digit()) { format!("_{s}") } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_splits_words() {
        assert_eq!(snake_case("ShapeList"), "shape_list");
        assert_eq!(snake_case("HTTPRequest"), "http_request");
        assert_eq!(snake_case("point"), "point");
        assert_eq!(snake_case("my-module"), "my_module");
    }

    #[test]
    fn guards_are_upper_case() {
        assert_eq!(include_guard("ShapeList", "hpp"), "SHAPE_LIST_HPP");
        assert_eq!(include_guard("Point", "hh"), "POINT_HH");
    }

    #[test]
    fn identifiers_are_sanitized() {
        assert_eq!(c_identifier("geo.shapes"), "geo_shapes");
        assert_eq!(c_identifier("3d"), "_3d");
    }
}
