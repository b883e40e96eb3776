use crate::error::Result;
use crate::spec::rule::RuleSpec;
use crate::spec::types::TypeSpec;
use crate::spec::{Doc, Fields, MapBuilder, NormalizeCtx, SpecNode, dedup};
use crate::tree::Node;

/// The native struct a class wraps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructSpec {
    pub name: String,
    pub includes: Vec<String>,
    pub members: Vec<MemberSpec>,
    /// Conditions a struct must meet to be wrapped by a particular class.
    /// Used for factory dispatch.
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSpec {
    pub name: String,
    pub ty: TypeSpec,
    pub doc: Option<Doc>,
}

impl StructSpec {
    /// `struct name`
    pub fn type_name(&self) -> String {
        format!("struct {}", self.name)
    }

    /// `struct name *`
    pub fn pointer_type(&self) -> String {
        format!("struct {} *", self.name)
    }

    pub fn declaration(&self, variable: &str) -> String {
        format!("struct {} {}", self.name, variable)
    }

    pub fn pointer_declaration(&self, variable: &str) -> String {
        format!("struct {} *{}", self.name, variable)
    }

    pub fn has_members(&self) -> bool {
        !self.members.is_empty()
    }

    pub fn includes(&self) -> Vec<String> {
        dedup(self.includes.iter().cloned().chain(self.members.iter().flat_map(|m| m.ty.includes())))
    }

    /// Whether `text` names this struct by value (`struct foo`).
    pub fn is_value_type(&self, text: &str) -> bool {
        squash(text) == squash(&self.type_name())
    }

    /// Whether `text` names a pointer to this struct (`struct foo *`).
    pub fn is_pointer_type(&self, text: &str) -> bool {
        squash(text) == squash(&self.pointer_type())
    }
}

fn squash(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

impl SpecNode for MemberSpec {
    fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Self> {
        let fields = Fields::of(node, "struct member")?;
        fields.only(&["name", "type", "doc"])?;
        fields.require(&["name", "type"])?;
        let name = fields.required_string("name")?;
        let ty = match fields.get("type") {
            Some(t) => TypeSpec::from_node(t, ctx)?,
            None => TypeSpec::void(),
        };
        Ok(Self { doc: fields.doc()?, name, ty })
    }

    fn to_node(&self) -> Node {
        MapBuilder::new()
            .str("name", self.name.clone())
            .node("type", self.ty.to_node())
            .doc(&self.doc)
            .build()
    }
}

impl SpecNode for StructSpec {
    fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Self> {
        let fields = Fields::of(node, "equivalent struct")?;
        fields.only(&["name", "includes", "members", "rules"])?;
        let name = fields.required_string("name")?;
        let fields = fields.named(&name);
        let members = fields
            .list("members")?
            .iter()
            .map(|m| MemberSpec::from_node(m, ctx))
            .collect::<Result<Vec<_>>>()?;
        let rules = fields
            .list("rules")?
            .iter()
            .map(|r| RuleSpec::from_node(r, ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { includes: fields.includes("includes")?, name, members, rules })
    }

    fn to_node(&self) -> Node {
        MapBuilder::new()
            .str("name", self.name.clone())
            .strings("includes", &self.includes)
            .list("members", &self.members, MemberSpec::to_node)
            .list("rules", &self.rules, RuleSpec::to_node)
            .build()
    }
}
