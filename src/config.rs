//! Generator settings, read from an optional JSON or YAML file.
use std::path::Path;

use anyhow::{Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::path_de;
use crate::spec::{NormalizeCtx, parse_version};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Newest specification version accepted.
    pub supported_version: String,
    pub header_extension: String,
    pub source_extension: String,
    /// Overrides the scope name for the Python module.
    pub module_name: Option<String>,
    /// Overrides the scope name for the C++ library target.
    pub library_name: Option<String>,
    pub doc_line_width: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            supported_version: crate::VERSION.to_string(),
            header_extension: "hpp".into(),
            source_extension: "cpp".into(),
            module_name: None,
            library_name: None,
            doc_line_width: crate::spec::doc::DOC_LINE_WIDTH,
        }
    }
}

impl GeneratorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))?;
        let parsed = if is_yaml(path) { path_de::from_yaml_with_path(&src) } else { path_de::from_json_with_path(&src) };
        let config: Self = parsed.map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
        config.supported_version()?;
        Ok(config)
    }

    pub fn supported_version(&self) -> Result<Version> {
        parse_version(&self.supported_version)
            .with_context(|| format!("'{}' is not a valid supported-version", self.supported_version))
    }

    pub fn normalize_ctx(&self) -> Result<NormalizeCtx> {
        Ok(NormalizeCtx::new(self.supported_version()?))
    }
}

pub fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yml" | "yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_case_keys_with_defaults() {
        let config: GeneratorConfig =
            path_de::from_json_with_path(r#"{ "header-extension": "hh", "library-name": "geo" }"#).unwrap();
        assert_eq!(config.header_extension, "hh");
        assert_eq!(config.source_extension, "cpp");
        assert_eq!(config.library_name.as_deref(), Some("geo"));
        assert_eq!(config.supported_version().unwrap(), Version::parse(crate::VERSION).unwrap());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = path_de::from_yaml_with_path::<GeneratorConfig>("header-ext: hh\n").unwrap_err();
        assert!(err.contains("header-ext"), "{err}");
    }

    #[test]
    fn yaml_is_chosen_by_extension() {
        assert!(is_yaml(Path::new("wrap.yml")));
        assert!(is_yaml(Path::new("dir/wrap.yaml")));
        assert!(!is_yaml(Path::new("wrap.json")));
    }
}
