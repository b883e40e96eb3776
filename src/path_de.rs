use serde::de::DeserializeOwned;

/// Deserialize JSON with path context in error messages.
pub fn from_json_with_path<T: DeserializeOwned>(src: &str) -> Result<T, String> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        format!("at path {path} → {}", err.into_inner())
    })
}

/// Deserialize YAML with path context in error messages.
pub fn from_yaml_with_path<T: DeserializeOwned>(src: &str) -> Result<T, String> {
    let de = serde_yaml::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        format!("at path {path} → {}", err.into_inner())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Outer {
        inner: Inner,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Inner {
        width: usize,
    }

    #[test]
    fn errors_name_the_failing_path() {
        let err = from_json_with_path::<Outer>(r#"{ "inner": { "width": "wide" } }"#).unwrap_err();
        assert!(err.starts_with("at path inner.width"), "{err}");
        let err = from_yaml_with_path::<Outer>("inner:\n  width: wide\n").unwrap_err();
        assert!(err.starts_with("at path inner.width"), "{err}");
    }
}
