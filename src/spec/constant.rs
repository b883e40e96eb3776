use semver::Version;

use crate::error::Result;
use crate::spec::types::TypeSpec;
use crate::spec::{Doc, Fields, MapBuilder, NormalizeCtx, SpecNode, dedup};
use crate::tree::Node;

/// A named class-level constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantSpec {
    pub name: String,
    pub ty: TypeSpec,
    pub value: String,
    pub includes: Vec<String>,
    pub doc: Option<Doc>,
    pub version: Version,
}

impl ConstantSpec {
    pub fn includes(&self) -> Vec<String> {
        dedup(self.includes.iter().cloned().chain(self.ty.includes()))
    }
}

impl SpecNode for ConstantSpec {
    fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Self> {
        let fields = Fields::of(node, "constant")?;
        fields.only(&["name", "type", "value", "includes", "doc", "version"])?;
        fields.require(&["name", "type", "value"])?;
        let name = fields.required_string("name")?;
        let fields = fields.named(&name);
        let ty = match fields.get("type") {
            Some(t) => TypeSpec::from_node(t, ctx)?,
            None => TypeSpec::void(),
        };
        Ok(Self {
            ty,
            value: fields.literal("value")?.unwrap_or_default(),
            includes: fields.includes("includes")?,
            doc: fields.doc()?,
            version: ctx.spec_version(&fields)?,
            name,
        })
    }

    fn to_node(&self) -> Node {
        MapBuilder::new()
            .str("name", self.name.clone())
            .node("type", self.ty.to_node())
            .str("value", self.value.clone())
            .strings("includes", &self.includes)
            .doc(&self.doc)
            .str("version", self.version.to_string())
            .build()
    }
}
