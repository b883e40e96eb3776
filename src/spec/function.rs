use semver::Version;

use crate::error::{Result, SpecError};
use crate::spec::doc::function_doc;
use crate::spec::param::ParamSpec;
use crate::spec::rule::RuleSpec;
use crate::spec::types::TypeSpec;
use crate::spec::wrapped::{ErrorCheck, WrappedCodeSpec, WrappedFunctionSpec};
use crate::spec::{Doc, Fields, MapBuilder, NormalizeCtx, SpecNode, dedup};
use crate::tree::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Method,
    Constructor,
    Destructor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnSpec {
    pub ty: TypeSpec,
    pub includes: Vec<String>,
    pub doc: Option<Doc>,
    /// The returned class may be specialized; build it with the class factory.
    pub overloaded: bool,
}

/// A member initializer: `Name( values... )`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Initializer {
    pub name: String,
    pub values: Vec<String>,
}

/// How a function body is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Implementation {
    Function(WrappedFunctionSpec),
    Code(WrappedCodeSpec),
    Synthesized(Synthesized),
}

/// Bodies the generator writes on its own; see [`crate::synth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synthesized {
    /// Store the given native pointer (or copy its target).
    AdoptPointer,
    /// Copy a struct passed by value.
    FromValue,
    /// Assign each struct member from the parameter of the same name.
    MemberWise,
    /// Pick the most specific class whose struct rules match.
    Factory(Vec<FactoryArm>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryArm {
    pub class: String,
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: String,
    pub kind: FunctionKind,
    pub params: Vec<ParamSpec>,
    pub returns: ReturnSpec,
    pub is_static: bool,
    pub is_virtual: bool,
    pub doc: Option<Doc>,
    pub initializers: Vec<Initializer>,
    pub implementation: Implementation,
    pub version: Version,
}

impl ReturnSpec {
    pub fn void() -> Self {
        Self { ty: TypeSpec::void(), includes: Vec::new(), doc: None, overloaded: false }
    }

    pub fn of(ty: TypeSpec) -> Self {
        Self { ty, ..Self::void() }
    }

    fn from_node(node: Option<&Node>, ctx: &NormalizeCtx) -> Result<Self> {
        let Some(node) = node else {
            return Ok(Self::void());
        };
        let fields = Fields::of(node, "return")?;
        fields.only(&["type", "includes", "doc", "overloaded"])?;
        let ty = match fields.get("type") {
            Some(t) => TypeSpec::from_node(t, ctx)?,
            None => TypeSpec::void(),
        };
        Ok(Self {
            ty,
            includes: fields.includes("includes")?,
            doc: fields.doc()?,
            overloaded: fields.flag("overloaded")?,
        })
    }

    fn to_node(&self) -> Node {
        MapBuilder::new()
            .node("type", self.ty.to_node())
            .strings("includes", &self.includes)
            .doc(&self.doc)
            .flag("overloaded", self.overloaded)
            .build()
    }
}

impl Initializer {
    fn from_node(node: &Node) -> Result<Self> {
        let fields = Fields::of(node, "initializer")?;
        fields.only(&["name", "values"])?;
        fields.require(&["name"])?;
        let values = fields
            .list("values")?
            .iter()
            .map(|v| v.literal().ok_or_else(|| fields.invalid("values", "must be literal values")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { name: fields.required_string("name")?, values })
    }

    fn to_node(&self) -> Node {
        MapBuilder::new().str("name", self.name.clone()).strings("values", &self.values).build()
    }

    /// `Name( a, b )`
    pub fn render(&self) -> String {
        if self.values.is_empty() {
            format!("{}()", self.name)
        } else {
            format!("{}( {} )", self.name, self.values.join(", "))
        }
    }
}

impl FunctionSpec {
    /// Normalizes a constructor. Its name is always the class name.
    pub fn constructor(node: &Node, class: &str, ctx: &NormalizeCtx) -> Result<Self> {
        Self::parse(node, FunctionKind::Constructor, Some(class.to_string()), ctx)
    }

    /// Normalizes a destructor (`~Name`, no parameters).
    pub fn destructor(node: &Node, class: &str, ctx: &NormalizeCtx) -> Result<Self> {
        let mut destructor = Self::parse(node, FunctionKind::Destructor, Some(format!("~{class}")), ctx)?;
        destructor.params.clear();
        Ok(destructor)
    }

    fn parse(node: &Node, kind: FunctionKind, name: Option<String>, ctx: &NormalizeCtx) -> Result<Self> {
        let fields = Fields::of(node, "function")?;
        fields.only(&[
            "name",
            "params",
            "return",
            "static",
            "virtual",
            "doc",
            "initializers",
            "wrapped-function",
            "wrapped-code",
            "version",
        ])?;
        let name = match name {
            Some(name) => name,
            None => fields.required_string("name")?,
        };
        let fields = fields.named(&name);
        fields.exclusive("wrapped-function", "wrapped-code")?;
        let implementation = match (fields.get("wrapped-function"), fields.get("wrapped-code")) {
            (Some(f), _) => Implementation::Function(WrappedFunctionSpec::from_node(f, ctx)?),
            (None, Some(c)) => Implementation::Code(WrappedCodeSpec::from_node(c, ctx)?),
            (None, None) => {
                return Err(SpecError::MissingRequiredKey {
                    entity: fields.entity().to_string(),
                    keys: vec!["wrapped-function".into(), "wrapped-code".into()],
                });
            }
        };
        let initializers = fields
            .list("initializers")?
            .iter()
            .map(Initializer::from_node)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            kind,
            params: ParamSpec::list_from_nodes(fields.list("params")?, ctx)?,
            returns: ReturnSpec::from_node(fields.get("return"), ctx)?,
            is_static: fields.flag("static")?,
            is_virtual: fields.flag("virtual")?,
            doc: fields.doc()?,
            initializers,
            implementation,
            version: ctx.spec_version(&fields)?,
            name,
        })
    }

    /// A function the generator writes itself, stamped with the version of
    /// the scope it is written for.
    pub fn synthesized(
        name: impl Into<String>,
        kind: FunctionKind,
        params: Vec<ParamSpec>,
        body: Synthesized,
        version: Version,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            params,
            returns: ReturnSpec::void(),
            is_static: false,
            is_virtual: false,
            doc: None,
            initializers: Vec::new(),
            implementation: Implementation::Synthesized(body),
            version,
        }
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == FunctionKind::Constructor
    }

    pub fn is_destructor(&self) -> bool {
        self.kind == FunctionKind::Destructor
    }

    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(ParamSpec::is_variadic)
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// The parameter right before the variadic one, the anchor for `va_start`.
    pub fn last_fixed_param(&self) -> Option<&ParamSpec> {
        self.params.iter().rev().find(|p| !p.is_variadic())
    }

    pub fn wrapped(&self) -> Option<&WrappedFunctionSpec> {
        match &self.implementation {
            Implementation::Function(w) => Some(w),
            _ => None,
        }
    }

    pub fn error_check(&self) -> Option<&ErrorCheck> {
        match &self.implementation {
            Implementation::Function(w) => w.error_check.as_ref(),
            Implementation::Code(c) => c.error_check.as_ref(),
            Implementation::Synthesized(_) => None,
        }
    }

    /// The native type wrapped code leaves in `return-value`, if any.
    pub fn code_return(&self) -> Option<&TypeSpec> {
        match &self.implementation {
            Implementation::Code(c) if c.returns_value() => Some(&c.returns),
            _ => None,
        }
    }

    pub fn returns_value(&self) -> bool {
        !self.returns.ty.is_void() && self.kind == FunctionKind::Method
    }

    /// The wrapped call result must be held in a local before returning.
    pub fn needs_return_value(&self) -> bool {
        self.wrapped().is_some_and(WrappedFunctionSpec::returns_value) && (self.error_check().is_some() || self.is_variadic())
    }

    pub fn signature_includes(&self) -> Vec<String> {
        dedup(
            self.returns
                .includes
                .iter()
                .cloned()
                .chain(self.returns.ty.includes())
                .chain(self.params.iter().flat_map(ParamSpec::includes)),
        )
    }

    pub fn body_includes(&self) -> Vec<String> {
        let implementation = match &self.implementation {
            Implementation::Function(w) => w.includes(),
            Implementation::Code(c) => c.includes(),
            Implementation::Synthesized(_) => Vec::new(),
        };
        dedup(self.signature_includes().into_iter().chain(implementation))
    }

    pub fn libraries(&self) -> Vec<String> {
        match &self.implementation {
            Implementation::Function(w) => w.libraries.clone(),
            Implementation::Code(c) => c.libraries.clone(),
            Implementation::Synthesized(_) => Vec::new(),
        }
    }

    /// The description with `@param` and `@return` tags appended.
    pub fn doc_comment(&self) -> Option<Doc> {
        let params = self.params.iter().filter_map(|p| p.doc.clone().map(|d| (p.name.clone(), d)));
        function_doc(self.doc.as_ref(), params, self.returns.doc.as_ref())
    }
}

impl SpecNode for FunctionSpec {
    fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Self> {
        Self::parse(node, FunctionKind::Method, None, ctx)
    }

    fn to_node(&self) -> Node {
        let out = MapBuilder::new()
            .str("name", self.name.clone())
            .list("params", &self.params, ParamSpec::to_node)
            .node("return", self.returns.to_node())
            .flag("static", self.is_static)
            .flag("virtual", self.is_virtual)
            .doc(&self.doc)
            .list("initializers", &self.initializers, Initializer::to_node);
        let out = match &self.implementation {
            Implementation::Function(w) => out.node("wrapped-function", w.to_node()),
            Implementation::Code(c) => out.node("wrapped-code", c.to_node()),
            Implementation::Synthesized(_) => out,
        };
        out.str("version", self.version.to_string()).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn function(v: serde_json::Value) -> Result<FunctionSpec> {
        FunctionSpec::from_node(&Node::from_value(&v).unwrap(), &NormalizeCtx::default())
    }

    #[test]
    fn wrapped_function_and_code_are_exclusive() {
        let both = function(json!({
            "name": "f",
            "wrapped-function": { "name": "f" },
            "wrapped-code": { "lines": ["return;"] }
        }));
        assert!(matches!(both, Err(SpecError::ConflictingKeys { .. })));
        let neither = function(json!({ "name": "f" }));
        assert!(matches!(neither, Err(SpecError::MissingRequiredKey { .. })));
    }

    #[test]
    fn flags_default_to_false() {
        let f = function(json!({ "name": "f", "wrapped-function": { "name": "f" } })).unwrap();
        assert!(!f.is_static);
        assert!(!f.is_virtual);
        assert!(!f.is_variadic());
        assert!(f.returns.ty.is_void());
        assert!(matches!(function(json!({ "name": "f", "static": 1, "wrapped-code": "x;" })), Err(SpecError::InvalidKey { .. })));
    }

    #[test]
    fn constructors_take_the_class_name() {
        let ctx = NormalizeCtx::default();
        let node = Node::from_value(&json!({
            "params": [{ "name": "size", "type": "int" }],
            "wrapped-function": { "name": "make", "params": [{ "name": "size" }], "return": { "type": "equivalent-struct-pointer" } }
        }))
        .unwrap();
        let c = FunctionSpec::constructor(&node, "Buffer", &ctx).unwrap();
        assert_eq!(c.name, "Buffer");
        assert!(c.is_constructor());
        let d = FunctionSpec::destructor(&Node::from_value(&json!({ "wrapped-code": "free(x);" })).unwrap(), "Buffer", &ctx).unwrap();
        assert_eq!(d.name, "~Buffer");
    }

    #[test]
    fn variadic_functions_hold_their_return_value() {
        let f = function(json!({
            "name": "print",
            "params": [{ "name": "format", "type": "const char *" }, { "name": "...", "type": "..." }],
            "return": { "type": "int" },
            "wrapped-function": { "name": "vprintf", "params": [{ "name": "format" }, { "value": "..." }], "return": { "type": "int" } }
        }))
        .unwrap();
        assert!(f.is_variadic());
        assert!(f.needs_return_value());
        assert_eq!(f.last_fixed_param().map(|p| p.name.as_str()), Some("format"));
    }

    #[test]
    fn wrapped_code_exposes_its_check() {
        let f = function(json!({
            "name": "flush",
            "return": { "type": "int" },
            "wrapped-code": {
                "lines": ["return-value = stream_flush( this->equivalent );"],
                "return": { "type": "int" },
                "error-check": {
                    "rules": [{ "left-expression": "return-value", "condition": "not-equals", "right-expression": 0 }],
                    "error-action": { "name": "throw-exception", "value": "FlushError()" }
                }
            }
        }))
        .unwrap();
        assert!(f.error_check().is_some());
        assert_eq!(f.code_return(), Some(&TypeSpec::named("int")));
        assert!(function(json!({ "name": "g", "wrapped-code": "g();" })).unwrap().code_return().is_none());
    }

    #[test]
    fn doc_comment_collects_tags() {
        let f = function(json!({
            "name": "area",
            "doc": "Computes the area.",
            "params": [{ "name": "scale", "type": "double", "doc": "multiplier" }],
            "return": { "type": "double", "doc": "the area" },
            "wrapped-code": { "lines": ["return 0;"] }
        }))
        .unwrap();
        let doc = f.doc_comment().unwrap();
        assert!(doc.text().contains("@param scale multiplier"));
        assert!(doc.text().ends_with("@return the area"));
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let ctx = NormalizeCtx::default();
        let raw = Node::from_value(&json!({
            "name": "resize",
            "virtual": true,
            "params": [{ "name": "n", "type": "size_t", "default": 0 }],
            "return": { "type": "self-reference" },
            "initializers": [{ "name": "Base", "values": ["n"] }],
            "wrapped-function": { "name": "buffer_resize", "params": [{ "value": "equivalent-struct-pointer" }, { "name": "n" }] }
        }))
        .unwrap();
        let once = FunctionSpec::normalize(&raw, &ctx).unwrap();
        assert_eq!(FunctionSpec::normalize(&once, &ctx).unwrap(), once);
    }
}
