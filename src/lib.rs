//! Generates C++ and Python wrappers around C libraries from declarative
//! JSON or YAML specifications.
pub mod backend;
pub mod config;
pub mod error;
pub mod jq_exec;
pub mod names;
pub mod path_de;
pub mod resolve;
pub mod spec;
pub mod synth;
pub mod template;
pub mod tree;

#[cfg(test)]
mod tests;

use semver::Version;
use serde_json::Value;

pub use backend::{Backend, CppBackend, GeneratedFile, PythonBackend};
pub use config::GeneratorConfig;
pub use error::{OutputError, SpecError};
pub use spec::{NormalizeCtx, Scope, SpecNode};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn generator_version() -> Version {
    Version::parse(VERSION).unwrap_or_else(|_| Version::new(0, 0, 0))
}

/// Expands templates and normalizes one specification document.
pub fn load_scope(doc: &Value, ctx: &NormalizeCtx) -> error::Result<Scope> {
    Scope::load(tree::Node::from_value(doc)?, ctx)
}

/// Template expansion only, for inspecting what a document turns into.
pub fn expand(doc: &Value) -> error::Result<Value> {
    Ok(template::expand_document(tree::Node::from_value(doc)?)?.to_value())
}

/// The normalized form of a document.
pub fn normalize(doc: &Value, ctx: &NormalizeCtx) -> error::Result<Value> {
    Ok(load_scope(doc, ctx)?.to_node().to_value())
}
