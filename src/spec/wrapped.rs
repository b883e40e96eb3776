//! The native side of a function: a call into the wrapped library, or
//! literal code lines.
use crate::error::{Result, SpecError};
use crate::spec::action::ActionSpec;
use crate::spec::rule::RuleSpec;
use crate::spec::types::TypeSpec;
use crate::spec::{Fields, MapBuilder, NormalizeCtx, SpecNode, dedup};
use crate::tree::Node;

/// An argument passed to a wrapped call. `ty` is the type the native side
/// expects, when it differs from the caller's expression and a cast is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub value: String,
    pub ty: Option<TypeSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    pub name: String,
    pub args: Vec<ArgSpec>,
    pub includes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCheck {
    pub rules: Vec<RuleSpec>,
    pub action: ActionSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedFunctionSpec {
    pub call: CallSpec,
    pub libraries: Vec<String>,
    pub returns: TypeSpec,
    pub error_check: Option<ErrorCheck>,
}

/// Literal lines pasted into the function body. A non-void `returns` means
/// the lines assign `return-value`, which the error check then inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedCodeSpec {
    pub lines: Vec<String>,
    pub includes: Vec<String>,
    pub libraries: Vec<String>,
    pub returns: TypeSpec,
    pub error_check: Option<ErrorCheck>,
}

impl ArgSpec {
    pub fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Self> {
        if let Some(value) = node.literal() {
            return Ok(Self { value, ty: None });
        }
        let fields = Fields::of(node, "wrapped parameter")?;
        fields.only(&["name", "value", "type"])?;
        // the value defaults to the parameter name
        let value = match fields.literal("value")? {
            Some(v) => v,
            None => fields
                .string("name")?
                .ok_or_else(|| SpecError::missing(fields.entity(), "value"))?,
        };
        let ty = match fields.get("type") {
            Some(t) => Some(TypeSpec::from_node(t, ctx)?),
            None => None,
        };
        Ok(Self { value, ty })
    }

    pub fn to_node(&self) -> Node {
        MapBuilder::new()
            .str("value", self.value.clone())
            .opt_node("type", self.ty.as_ref().map(TypeSpec::to_node))
            .build()
    }
}

impl CallSpec {
    pub fn from_fields(fields: &Fields<'_>, ctx: &NormalizeCtx) -> Result<Self> {
        let name = fields.required_string("name")?;
        let args = fields
            .list("params")?
            .iter()
            .map(|p| ArgSpec::from_node(p, ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { name, args, includes: fields.includes("includes")? })
    }

    fn builder(&self) -> MapBuilder {
        MapBuilder::new()
            .str("name", self.name.clone())
            .list("params", &self.args, ArgSpec::to_node)
            .strings("includes", &self.includes)
    }

    pub fn includes(&self) -> Vec<String> {
        dedup(
            self.includes
                .iter()
                .cloned()
                .chain(self.args.iter().flat_map(|a| a.ty.iter().flat_map(TypeSpec::includes))),
        )
    }
}

impl ErrorCheck {
    /// `None` when the check has no rules.
    pub fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Option<Self>> {
        let fields = Fields::of(node, "error check")?;
        fields.only(&["rules", "error-action"])?;
        let rules = fields
            .list("rules")?
            .iter()
            .map(|r| RuleSpec::from_node(r, ctx))
            .collect::<Result<Vec<_>>>()?;
        if rules.is_empty() {
            return Ok(None);
        }
        fields.require(&["error-action"])?;
        let action = match fields.get("error-action") {
            Some(a) => ActionSpec::from_node(a, ctx)?,
            None => return Err(SpecError::missing(fields.entity(), "error-action")),
        };
        Ok(Some(Self { rules, action }))
    }

    pub fn to_node(&self) -> Node {
        MapBuilder::new()
            .list("rules", &self.rules, RuleSpec::to_node)
            .node("error-action", self.action.to_node())
            .build()
    }
}

/// The `return` entry of wrapped native code: a bare type name with its own
/// includes, or a full type node.
fn return_type(fields: &Fields<'_>, ctx: &NormalizeCtx) -> Result<TypeSpec> {
    let Some(ret) = fields.get("return") else {
        return Ok(TypeSpec::void());
    };
    let r = Fields::of(ret, "wrapped return")?;
    r.only(&["type", "includes"])?;
    match r.get("type") {
        Some(Node::Scalar(_)) => Ok(TypeSpec::Name { name: r.required_string("type")?, includes: r.includes("includes")? }),
        Some(ty) => TypeSpec::from_node(ty, ctx),
        None => Ok(TypeSpec::void()),
    }
}

fn error_check(fields: &Fields<'_>, ctx: &NormalizeCtx) -> Result<Option<ErrorCheck>> {
    match fields.get("error-check") {
        Some(check) => ErrorCheck::from_node(check, ctx),
        None => Ok(None),
    }
}

fn return_node(returns: &TypeSpec) -> Node {
    MapBuilder::new().node("type", returns.to_node()).build()
}

impl WrappedFunctionSpec {
    pub fn includes(&self) -> Vec<String> {
        let action = self.error_check.iter().flat_map(|c| c.action.includes());
        dedup(self.call.includes().into_iter().chain(self.returns.includes()).chain(action))
    }

    pub fn returns_value(&self) -> bool {
        !self.returns.is_void()
    }
}

impl SpecNode for WrappedFunctionSpec {
    fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Self> {
        let fields = Fields::of(node, "wrapped function")?;
        fields.only(&["name", "params", "includes", "libraries", "return", "error-check"])?;
        let fields = match fields.string("name")? {
            Some(name) => fields.named(&name),
            None => fields,
        };
        let call = CallSpec::from_fields(&fields, ctx)?;
        Ok(Self {
            call,
            libraries: fields.includes("libraries")?,
            returns: return_type(&fields, ctx)?,
            error_check: error_check(&fields, ctx)?,
        })
    }

    fn to_node(&self) -> Node {
        self.call
            .builder()
            .strings("libraries", &self.libraries)
            .node("return", return_node(&self.returns))
            .opt_node("error-check", self.error_check.as_ref().map(ErrorCheck::to_node))
            .build()
    }
}

impl WrappedCodeSpec {
    pub fn includes(&self) -> Vec<String> {
        let action = self.error_check.iter().flat_map(|c| c.action.includes());
        dedup(self.includes.iter().cloned().chain(self.returns.includes()).chain(action))
    }

    pub fn returns_value(&self) -> bool {
        !self.returns.is_void()
    }
}

impl SpecNode for WrappedCodeSpec {
    fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Self> {
        if let Some(text) = node.as_str() {
            return Ok(Self {
                lines: text.lines().map(str::to_string).collect(),
                includes: Vec::new(),
                libraries: Vec::new(),
                returns: TypeSpec::void(),
                error_check: None,
            });
        }
        let fields = Fields::of(node, "wrapped code")?;
        fields.only(&["lines", "includes", "libraries", "return", "error-check"])?;
        fields.require(&["lines"])?;
        Ok(Self {
            lines: fields.strings("lines")?,
            includes: fields.includes("includes")?,
            libraries: fields.includes("libraries")?,
            returns: return_type(&fields, ctx)?,
            error_check: error_check(&fields, ctx)?,
        })
    }

    fn to_node(&self) -> Node {
        MapBuilder::new()
            .strings("lines", &self.lines)
            .strings("includes", &self.includes)
            .strings("libraries", &self.libraries)
            .node("return", return_node(&self.returns))
            .opt_node("error-check", self.error_check.as_ref().map(ErrorCheck::to_node))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wrapped(v: serde_json::Value) -> Result<WrappedFunctionSpec> {
        WrappedFunctionSpec::from_node(&Node::from_value(&v).unwrap(), &NormalizeCtx::default())
    }

    #[test]
    fn argument_values_default_to_names() {
        let w = wrapped(json!({
            "name": "add",
            "params": [{ "name": "x" }, { "value": "equivalent-struct-pointer" }, 3]
        }))
        .unwrap();
        let values: Vec<_> = w.call.args.iter().map(|a| a.value.as_str()).collect();
        assert_eq!(values, vec!["x", "equivalent-struct-pointer", "3"]);
        assert!(w.returns.is_void());
        assert!(w.error_check.is_none());
    }

    #[test]
    fn error_check_needs_an_action() {
        let err = wrapped(json!({
            "name": "open",
            "return": { "type": "int" },
            "error-check": { "rules": [{ "left-expression": "return-value", "condition": "less-than", "right-expression": 0 }] }
        }))
        .unwrap_err();
        match err {
            SpecError::MissingRequiredKey { keys, .. } => assert_eq!(keys, vec!["error-action"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_rule_list_means_no_check() {
        let w = wrapped(json!({ "name": "f", "error-check": { "rules": [] } })).unwrap();
        assert!(w.error_check.is_none());
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let ctx = NormalizeCtx::default();
        let raw = Node::from_value(&json!({
            "name": "open",
            "params": [{ "name": "path", "type": "const char *" }],
            "includes": "stdio.h",
            "libraries": ["c", "c"],
            "return": { "type": "int", "includes": "errno.h" },
            "error-check": {
                "rules": [{ "left-expression": "return-value", "condition": "less-than", "right-expression": 0 }],
                "error-action": { "name": "throw-exception", "constructor": { "name": "OpenError" } }
            }
        }))
        .unwrap();
        let once = WrappedFunctionSpec::normalize(&raw, &ctx).unwrap();
        assert_eq!(WrappedFunctionSpec::normalize(&once, &ctx).unwrap(), once);
        let w = WrappedFunctionSpec::from_node(&once, &ctx).unwrap();
        assert_eq!(w.libraries, vec!["c"]);
        assert_eq!(w.includes(), vec!["stdio.h", "errno.h"]);
    }

    #[test]
    fn code_can_be_a_single_string() {
        let ctx = NormalizeCtx::default();
        let code = WrappedCodeSpec::from_node(&Node::str("int x = 1;\nreturn x;"), &ctx).unwrap();
        assert_eq!(code.lines, vec!["int x = 1;", "return x;"]);
        assert!(code.returns.is_void());
        assert!(code.error_check.is_none());
    }

    #[test]
    fn code_declares_return_and_error_check() {
        let ctx = NormalizeCtx::default();
        let raw = Node::from_value(&json!({
            "lines": ["return-value = buffer_fill( this->equivalent );"],
            "return": { "type": "int" },
            "error-check": {
                "rules": [{ "left-expression": "return-value", "condition": "less-than", "right-expression": 0 }],
                "error-action": { "name": "throw-exception", "constructor": { "name": "FillError", "includes": "errors.hpp" } }
            }
        }))
        .unwrap();
        let once = WrappedCodeSpec::normalize(&raw, &ctx).unwrap();
        assert_eq!(WrappedCodeSpec::normalize(&once, &ctx).unwrap(), once);
        let code = WrappedCodeSpec::from_node(&once, &ctx).unwrap();
        assert!(code.returns_value());
        assert_eq!(code.error_check.as_ref().map(|c| c.rules.len()), Some(1));
        assert_eq!(code.includes(), vec!["errors.hpp"]);
    }
}
