//! Error taxonomy for specification loading.
//!
//! Every variant is raised while a document is expanded or normalized. Emission
//! takes a validated model and does not produce `SpecError`s.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("required keys are missing from {entity}: {}", keys.join(", "))]
    MissingRequiredKey { entity: String, keys: Vec<String> },

    #[error("{entity} may not have both '{first}' and '{second}'")]
    ConflictingKeys { entity: String, first: String, second: String },

    #[error("invalid key '{key}' in {entity}: {reason}")]
    InvalidKey { entity: String, key: String, reason: String },

    #[error("spec version {found} is not supported (newest supported version is {supported})")]
    UnsupportedVersion { found: String, supported: String },

    #[error("class '{class}' does not declare a namespace")]
    MissingNamespace { class: String },

    #[error("invalid template usage ('use-template'): {reason}")]
    InvalidTemplateUsage { reason: String },
}

pub type Result<T, E = SpecError> = std::result::Result<T, E>;

impl SpecError {
    pub fn missing(entity: impl Into<String>, key: impl Into<String>) -> Self {
        SpecError::MissingRequiredKey { entity: entity.into(), keys: vec![key.into()] }
    }

    pub fn conflicting(entity: impl Into<String>, first: impl Into<String>, second: impl Into<String>) -> Self {
        SpecError::ConflictingKeys { entity: entity.into(), first: first.into(), second: second.into() }
    }

    pub fn invalid(entity: impl Into<String>, key: impl Into<String>, reason: impl Into<String>) -> Self {
        SpecError::InvalidKey { entity: entity.into(), key: key.into(), reason: reason.into() }
    }

    pub fn template(reason: impl Into<String>) -> Self {
        SpecError::InvalidTemplateUsage { reason: reason.into() }
    }
}

/// Failure while persisting generated files. The whole run fails on the first one.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
