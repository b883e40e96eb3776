use crate::error::Result;
use crate::spec::{Doc, Fields, MapBuilder, NormalizeCtx, SpecNode, dedup};
use crate::tree::Node;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSpec {
    pub name: String,
    pub namespace: Option<String>,
    pub doc: Option<Doc>,
    pub includes: Vec<String>,
    pub elements: Vec<EnumElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumElement {
    pub name: String,
    pub value: Option<String>,
    pub doc: Option<Doc>,
    pub includes: Vec<String>,
}

impl EnumSpec {
    /// Element names with their values. An element without a declared value
    /// gets its one-based position.
    pub fn effective_values(&self) -> Vec<(&str, String)> {
        self.elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.as_str(), e.value.clone().unwrap_or_else(|| (i + 1).to_string())))
            .collect()
    }

    pub fn all_includes(&self) -> Vec<String> {
        dedup(self.includes.iter().cloned().chain(self.elements.iter().flat_map(|e| e.includes.iter().cloned())))
    }
}

impl SpecNode for EnumElement {
    fn from_node(node: &Node, _ctx: &NormalizeCtx) -> Result<Self> {
        let fields = Fields::of(node, "enum element")?;
        fields.only(&["name", "value", "doc", "includes"])?;
        let name = fields.required_string("name")?;
        let fields = fields.named(&name);
        Ok(Self { value: fields.literal("value")?, doc: fields.doc()?, includes: fields.includes("includes")?, name })
    }

    fn to_node(&self) -> Node {
        MapBuilder::new()
            .str("name", self.name.clone())
            .opt_str("value", self.value.as_deref())
            .doc(&self.doc)
            .strings("includes", &self.includes)
            .build()
    }
}

impl SpecNode for EnumSpec {
    fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Self> {
        let fields = Fields::of(node, "enum")?;
        fields.only(&["name", "namespace", "doc", "includes", "elements"])?;
        fields.require(&["name", "elements"])?;
        let name = fields.required_string("name")?;
        let fields = fields.named(&name);
        let elements = fields
            .list("elements")?
            .iter()
            .map(|e| EnumElement::from_node(e, ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            namespace: fields.string("namespace")?,
            doc: fields.doc()?,
            includes: fields.includes("includes")?,
            elements,
            name,
        })
    }

    fn to_node(&self) -> Node {
        MapBuilder::new()
            .str("name", self.name.clone())
            .opt_str("namespace", self.namespace.as_deref())
            .doc(&self.doc)
            .strings("includes", &self.includes)
            .list("elements", &self.elements, EnumElement::to_node)
            .build()
    }
}
