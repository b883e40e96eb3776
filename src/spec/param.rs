use crate::error::{Result, SpecError};
use crate::spec::types::TypeSpec;
use crate::spec::{Doc, Fields, MapBuilder, NormalizeCtx, SpecNode, VARIADIC_KEYWORD, dedup};
use crate::tree::Node;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: TypeSpec,
    pub includes: Vec<String>,
    /// Only ever appears in declarations.
    pub default: Option<String>,
    pub doc: Option<Doc>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: TypeSpec) -> Self {
        Self { name: name.into(), ty, includes: Vec::new(), default: None, doc: None }
    }

    pub fn is_variadic(&self) -> bool {
        self.ty.is_variadic()
    }

    pub fn includes(&self) -> Vec<String> {
        dedup(self.includes.iter().cloned().chain(self.ty.includes()))
    }

    /// Normalizes a parameter list. A variadic parameter is moved to the end;
    /// a list holding only a variadic parameter, or more than one, is rejected.
    pub fn list_from_nodes(nodes: &[Node], ctx: &NormalizeCtx) -> Result<Vec<ParamSpec>> {
        let params = nodes.iter().map(|n| ParamSpec::from_node(n, ctx)).collect::<Result<Vec<_>>>()?;
        let (variadic, mut fixed): (Vec<ParamSpec>, Vec<ParamSpec>) = params.into_iter().partition(ParamSpec::is_variadic);
        match variadic.len() {
            0 => Ok(fixed),
            1 if fixed.is_empty() => Err(SpecError::invalid(
                "params",
                VARIADIC_KEYWORD,
                "a variadic parameter needs at least one named parameter before it",
            )),
            1 => {
                fixed.extend(variadic);
                Ok(fixed)
            }
            _ => Err(SpecError::invalid("params", VARIADIC_KEYWORD, "only one variadic parameter is allowed")),
        }
    }
}

impl SpecNode for ParamSpec {
    fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Self> {
        let fields = Fields::of(node, "parameter")?;
        fields.only(&["name", "type", "includes", "default", "doc"])?;
        // `{ name: ... }` alone stands for the variadic marker
        let is_marker = fields.string("name")?.as_deref() == Some(VARIADIC_KEYWORD) && !fields.has("type");
        let ty = if is_marker {
            TypeSpec::named(VARIADIC_KEYWORD)
        } else {
            fields.require(&["type"])?;
            match fields.get("type") {
                Some(ty) => TypeSpec::from_node(ty, ctx)?,
                None => return Err(SpecError::missing(fields.entity(), "type")),
            }
        };
        let name = match fields.string("name")? {
            Some(name) => name,
            None if ty.is_variadic() => VARIADIC_KEYWORD.to_string(),
            None => return Err(SpecError::missing(fields.entity(), "name")),
        };
        let fields = fields.named(&name);
        Ok(Self {
            includes: fields.includes("includes")?,
            default: fields.literal("default")?,
            doc: fields.doc()?,
            name,
            ty,
        })
    }

    fn to_node(&self) -> Node {
        MapBuilder::new()
            .str("name", self.name.clone())
            .node("type", self.ty.to_node())
            .strings("includes", &self.includes)
            .opt_str("default", self.default.as_deref())
            .doc(&self.doc)
            .build()
    }
}
