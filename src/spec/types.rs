use crate::error::Result;
use crate::spec::param::ParamSpec;
use crate::spec::{
    EQUIVALENT_POINTER_KEYWORD, EQUIVALENT_STRUCT_KEYWORD, Fields, MapBuilder, NormalizeCtx, SELF_REFERENCE_KEYWORD,
    SpecNode, VARIADIC_KEYWORD, dedup,
};
use crate::tree::Node;

/// A type as written in a specification.
///
/// Either a plain type name (which may be one of the reserved type keywords)
/// or a function pointer type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSpec {
    Name { name: String, includes: Vec<String> },
    Function { params: Vec<ParamSpec>, returns: Box<TypeSpec>, includes: Vec<String> },
}

impl TypeSpec {
    pub fn named(name: impl Into<String>) -> Self {
        TypeSpec::Name { name: name.into(), includes: Vec::new() }
    }

    pub fn void() -> Self {
        Self::named("void")
    }

    /// The written name, for plain types.
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeSpec::Name { name, .. } => Some(name.as_str()),
            TypeSpec::Function { .. } => None,
        }
    }

    pub fn is(&self, keyword: &str) -> bool {
        self.name().map(str::trim) == Some(keyword)
    }

    pub fn is_void(&self) -> bool {
        self.is("void")
    }

    pub fn is_variadic(&self) -> bool {
        self.is(VARIADIC_KEYWORD)
    }

    pub fn is_self_reference(&self) -> bool {
        self.is(SELF_REFERENCE_KEYWORD)
    }

    pub fn is_equivalent_struct(&self) -> bool {
        self.is(EQUIVALENT_STRUCT_KEYWORD)
    }

    pub fn is_equivalent_pointer(&self) -> bool {
        self.is(EQUIVALENT_POINTER_KEYWORD)
    }

    pub fn is_pointer(&self) -> bool {
        self.name().is_some_and(|n| n.trim_end().ends_with('*'))
    }

    /// The written name stripped of qualifiers and pointer/reference markers,
    /// used to look classes up by type: `const Foo *` gives `Foo`.
    pub fn base_name(&self) -> Option<&str> {
        self.name().map(base_type_name)
    }

    /// Headers this type needs, including those of function pointer parameters.
    pub fn includes(&self) -> Vec<String> {
        match self {
            TypeSpec::Name { includes, .. } => includes.clone(),
            TypeSpec::Function { params, returns, includes } => dedup(
                includes
                    .iter()
                    .cloned()
                    .chain(returns.includes())
                    .chain(params.iter().flat_map(ParamSpec::includes)),
            ),
        }
    }
}

/// `const struct foo *` gives `struct foo`, `Foo &` gives `Foo`.
pub fn base_type_name(name: &str) -> &str {
    let name = name.trim();
    let name = name.strip_prefix("const ").unwrap_or(name);
    name.trim_end_matches(['*', '&', ' '])
}

impl SpecNode for TypeSpec {
    fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Self> {
        if let Some(name) = node.as_str() {
            return Ok(Self::named(name));
        }
        let fields = Fields::of(node, "type")?;
        fields.only(&["name", "includes", "function"])?;
        fields.exclusive("name", "function")?;
        let includes = fields.includes("includes")?;
        if let Some(function) = fields.get("function") {
            let f = Fields::of(function, "function type")?;
            f.only(&["params", "return"])?;
            let params = ParamSpec::list_from_nodes(f.list("params")?, ctx)?;
            let returns = match f.get("return") {
                None => TypeSpec::void(),
                Some(ret) => {
                    let r = Fields::of(ret, "function type return")?;
                    match r.get("type") {
                        Some(ty) => TypeSpec::from_node(ty, ctx)?,
                        None => TypeSpec::void(),
                    }
                }
            };
            return Ok(TypeSpec::Function { params, returns: Box::new(returns), includes });
        }
        let name = fields.required_string("name")?;
        Ok(TypeSpec::Name { name, includes })
    }

    fn to_node(&self) -> Node {
        match self {
            TypeSpec::Name { name, includes } if includes.is_empty() => Node::str(name.clone()),
            TypeSpec::Name { name, includes } => MapBuilder::new().str("name", name.clone()).strings("includes", includes).build(),
            TypeSpec::Function { params, returns, includes } => {
                let function = MapBuilder::new()
                    .list("params", params, ParamSpec::to_node)
                    .node("return", MapBuilder::new().node("type", returns.to_node()).build())
                    .build();
                MapBuilder::new().node("function", function).strings("includes", includes).build()
            }
        }
    }
}
