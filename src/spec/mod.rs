//! Specification model.
//!
//! Each entity normalizes a raw (template-expanded) map into a typed value,
//! checking required and mutually exclusive keys and materializing defaults.
//! `to_node` writes the normalized form back out, so normalization can be
//! observed as a `Node -> Node` function and is idempotent.
pub mod action;
pub mod class;
pub mod constant;
pub mod doc;
pub mod enumeration;
pub mod function;
pub mod param;
pub mod rule;
pub mod scope;
pub mod structure;
pub mod types;
pub mod wrapped;

use semver::Version;

use crate::error::{Result, SpecError};
use crate::tree::{Node, NodeMap};

pub use action::ActionSpec;
pub use class::{ClassSpec, ParentSpec};
pub use constant::ConstantSpec;
pub use doc::Doc;
pub use enumeration::{EnumElement, EnumSpec};
pub use function::{FactoryArm, FunctionKind, FunctionSpec, Implementation, Initializer, ReturnSpec, Synthesized};
pub use param::ParamSpec;
pub use rule::{Condition, RenderCtx, RuleSpec};
pub use scope::{Entity, Scope};
pub use structure::{MemberSpec, StructSpec};
pub use types::TypeSpec;
pub use wrapped::{ArgSpec, CallSpec, ErrorCheck, WrappedCodeSpec, WrappedFunctionSpec};

/// The native struct a class wraps, by value.
pub const EQUIVALENT_STRUCT_KEYWORD: &str = "equivalent-struct";

/// A pointer to the native struct a class wraps.
pub const EQUIVALENT_POINTER_KEYWORD: &str = "equivalent-struct-pointer";

/// Return type meaning "the current instance".
pub const SELF_REFERENCE_KEYWORD: &str = "self-reference";

/// Type of the rest parameter of a variadic function.
pub const VARIADIC_KEYWORD: &str = "...";

/// The return value of a wrapped call, usable in rules and wrapped code.
pub const RETURN_VALUE_KEYWORD: &str = "return-value";

pub const KEYWORDS: [&str; 5] = [
    EQUIVALENT_STRUCT_KEYWORD,
    EQUIVALENT_POINTER_KEYWORD,
    SELF_REFERENCE_KEYWORD,
    VARIADIC_KEYWORD,
    RETURN_VALUE_KEYWORD,
];

// ————————————————————————————————————————————————————————————————————————————
// NORMALIZATION
// ————————————————————————————————————————————————————————————————————————————

/// Values normalization needs from the caller.
#[derive(Debug, Clone)]
pub struct NormalizeCtx {
    pub supported_version: Version,
}

impl NormalizeCtx {
    pub fn new(supported_version: Version) -> Self {
        Self { supported_version }
    }

    /// The version an entity declares, or the supported version if it
    /// declares none. Newer versions are rejected.
    pub fn spec_version(&self, fields: &Fields<'_>) -> Result<Version> {
        let Some(node) = fields.get("version") else {
            return Ok(self.supported_version.clone());
        };
        let text = node
            .literal()
            .ok_or_else(|| fields.invalid("version", "must be a version string"))?;
        let found = parse_version(&text)
            .ok_or_else(|| fields.invalid("version", format!("'{text}' is not a version")))?;
        if found <= self.supported_version {
            Ok(found)
        } else {
            Err(SpecError::UnsupportedVersion { found: text, supported: self.supported_version.to_string() })
        }
    }
}

impl Default for NormalizeCtx {
    fn default() -> Self {
        Self { supported_version: crate::generator_version() }
    }
}

/// Accepts `1`, `1.2` and `1.2.3` (missing components are zero).
pub fn parse_version(text: &str) -> Option<Version> {
    let text = text.trim();
    let parts = text.split('.').count();
    let padded = match parts {
        1 => format!("{text}.0.0"),
        2 => format!("{text}.0"),
        _ => text.to_string(),
    };
    Version::parse(&padded).ok()
}

pub trait SpecNode: Sized {
    fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Self>;

    fn to_node(&self) -> Node;

    fn normalize(node: &Node, ctx: &NormalizeCtx) -> Result<Node> {
        Ok(Self::from_node(node, ctx)?.to_node())
    }
}

/// Read access to the keys of one raw entity map, producing errors that name
/// the entity and the key.
pub struct Fields<'a> {
    entity: String,
    map: &'a NodeMap,
}

impl<'a> Fields<'a> {
    pub fn of(node: &'a Node, entity: impl Into<String>) -> Result<Self> {
        let entity = entity.into();
        match node.as_map() {
            Some(map) => Ok(Self { entity, map }),
            None => Err(SpecError::invalid(entity, "<value>", "expected a map")),
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Re-labels the entity once its name is known.
    pub fn named(mut self, name: &str) -> Self {
        self.entity = format!("{} '{}'", self.entity, name);
        self
    }

    pub fn get(&self, key: &str) -> Option<&'a Node> {
        self.map.get(key).filter(|n| !n.is_null())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> SpecError {
        SpecError::invalid(self.entity.clone(), key, reason)
    }

    pub fn require(&self, keys: &[&str]) -> Result<()> {
        let missing: Vec<String> = keys.iter().filter(|k| !self.has(k)).map(|k| k.to_string()).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SpecError::MissingRequiredKey { entity: self.entity.clone(), keys: missing })
        }
    }

    /// Rejects keys outside `allowed`.
    pub fn only(&self, allowed: &[&str]) -> Result<()> {
        let extra: Vec<&str> = self.map.keys().map(String::as_str).filter(|k| !allowed.contains(k)).collect();
        if extra.is_empty() {
            Ok(())
        } else {
            Err(self.invalid(&extra.join(", "), "unrecognized key"))
        }
    }

    pub fn exclusive(&self, first: &str, second: &str) -> Result<()> {
        if self.has(first) && self.has(second) {
            Err(SpecError::conflicting(self.entity.clone(), first, second))
        } else {
            Ok(())
        }
    }

    pub fn string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(node) => match node.as_str() {
                Some(s) => Ok(Some(s.to_string())),
                None => Err(self.invalid(key, "must be a string")),
            },
        }
    }

    pub fn required_string(&self, key: &str) -> Result<String> {
        self.require(&[key])?;
        Ok(self.string(key)?.unwrap_or_default())
    }

    /// Any scalar, as source text.
    pub fn literal(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(node) => node.literal().map(Some).ok_or_else(|| self.invalid(key, "must be a literal value")),
        }
    }

    pub fn flag(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            None => Ok(false),
            Some(node) => node
                .as_bool()
                .ok_or_else(|| self.invalid(key, format!("'{key}' may only be true or false"))),
        }
    }

    pub fn list(&self, key: &str) -> Result<&'a [Node]> {
        match self.get(key) {
            None => Ok(&[]),
            Some(node) => node.as_list().ok_or_else(|| self.invalid(key, "must be a list")),
        }
    }

    pub fn strings(&self, key: &str) -> Result<Vec<String>> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(node) => match node {
                Node::Scalar(_) => node.as_str().map(|s| vec![s.to_string()]).ok_or_else(|| self.invalid(key, "must be a string or a list of strings")),
                Node::List(xs) => xs
                    .iter()
                    .map(|x| x.as_str().map(str::to_string).ok_or_else(|| self.invalid(key, "must only contain strings")))
                    .collect(),
                _ => Err(self.invalid(key, "must be a string or a list of strings")),
            },
        }
    }

    /// An include list: a single string, a list, or nothing. Duplicates are
    /// dropped, keeping the first occurrence.
    pub fn includes(&self, key: &str) -> Result<Vec<String>> {
        Ok(dedup(self.strings(key)?))
    }

    pub fn doc(&self) -> Result<Option<Doc>> {
        match self.get("doc") {
            None => Ok(None),
            Some(node) => match node.as_str() {
                Some(text) => Ok(Some(Doc::new(text))),
                None => Err(self.invalid("doc", "documentation must be a string")),
            },
        }
    }
}

/// Removes duplicates, keeping first-seen order.
pub fn dedup<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Builds the normalized map form of an entity.
#[derive(Default)]
pub struct MapBuilder(NodeMap);

impl MapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn str(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), Node::str(value));
        self
    }

    pub fn opt_str(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.str(key, v),
            None => self,
        }
    }

    pub fn flag(mut self, key: &str, value: bool) -> Self {
        self.0.insert(key.into(), Node::bool(value));
        self
    }

    pub fn strings(mut self, key: &str, values: &[String]) -> Self {
        self.0.insert(key.into(), Node::list_of(values.iter().cloned()));
        self
    }

    pub fn node(mut self, key: &str, value: Node) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn opt_node(self, key: &str, value: Option<Node>) -> Self {
        match value {
            Some(v) => self.node(key, v),
            None => self,
        }
    }

    pub fn list<T, F>(self, key: &str, items: &[T], f: F) -> Self
    where
        F: Fn(&T) -> Node,
    {
        self.node(key, Node::List(items.iter().map(f).collect()))
    }

    pub fn doc(self, doc: &Option<Doc>) -> Self {
        self.opt_str("doc", doc.as_ref().map(Doc::text))
    }

    pub fn build(self) -> Node {
        Node::Map(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn versions_pad_and_compare() {
        assert_eq!(parse_version("0.4"), Some(Version::new(0, 4, 0)));
        assert_eq!(parse_version("1"), Some(Version::new(1, 0, 0)));
        assert!(parse_version("newest").is_none());

        let ctx = NormalizeCtx::new(Version::new(0, 6, 0));
        let old = Node::from_value(&json!({ "version": "0.4.2" })).unwrap();
        let new = Node::from_value(&json!({ "version": "99.0.0" })).unwrap();
        let none = Node::from_value(&json!({})).unwrap();
        assert_eq!(ctx.spec_version(&Fields::of(&old, "class").unwrap()).unwrap(), Version::new(0, 4, 2));
        assert_eq!(ctx.spec_version(&Fields::of(&none, "class").unwrap()).unwrap(), Version::new(0, 6, 0));
        assert!(matches!(
            ctx.spec_version(&Fields::of(&new, "class").unwrap()),
            Err(SpecError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn includes_accept_single_strings_and_dedup() {
        let node = Node::from_value(&json!({ "one": "a.h", "many": ["b.h", "a.h", "b.h"] })).unwrap();
        let fields = Fields::of(&node, "class").unwrap();
        assert_eq!(fields.includes("one").unwrap(), vec!["a.h"]);
        assert_eq!(fields.includes("many").unwrap(), vec!["b.h", "a.h"]);
        assert!(fields.includes("absent").unwrap().is_empty());
    }

    #[test]
    fn flags_must_be_boolean() {
        let node = Node::from_value(&json!({ "virtual": "yes" })).unwrap();
        let fields = Fields::of(&node, "function").unwrap();
        assert!(matches!(fields.flag("virtual"), Err(SpecError::InvalidKey { .. })));
        assert!(!fields.flag("static").unwrap());
    }
}
