use semver::Version;

use crate::error::{Result, SpecError};
use crate::spec::constant::ConstantSpec;
use crate::spec::function::FunctionSpec;
use crate::spec::structure::StructSpec;
use crate::spec::types::base_type_name;
use crate::spec::{Doc, Fields, MapBuilder, NormalizeCtx, SpecNode, dedup};
use crate::tree::Node;

/// Name of the member holding the wrapped struct.
pub const EQUIVALENT_MEMBER: &str = "equivalent";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentSpec {
    pub name: String,
    pub includes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSpec {
    pub name: String,
    pub namespace: String,
    pub doc: Option<Doc>,
    pub includes: Vec<String>,
    pub libraries: Vec<String>,
    pub parent: Option<ParentSpec>,
    /// The class holds a pointer to its struct instead of the struct itself.
    pub pointer_wrapper: bool,
    /// Declared a factory even without specialized subclasses.
    pub factory: bool,
    pub structure: StructSpec,
    pub constructors: Vec<FunctionSpec>,
    pub destructor: Option<FunctionSpec>,
    pub functions: Vec<FunctionSpec>,
    pub constants: Vec<ConstantSpec>,
    pub version: Version,
}

impl ClassSpec {
    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_ref().map(|p| p.name.as_str())
    }

    /// The type of the `equivalent` member.
    pub fn equivalent_type(&self) -> String {
        if self.pointer_wrapper { self.structure.pointer_type() } else { self.structure.type_name() }
    }

    /// `struct foo *equivalent` or `struct foo equivalent`.
    pub fn equivalent_declaration(&self) -> String {
        if self.pointer_wrapper {
            self.structure.pointer_declaration(EQUIVALENT_MEMBER)
        } else {
            self.structure.declaration(EQUIVALENT_MEMBER)
        }
    }

    /// Whether a written type refers to this class, by value, pointer or reference.
    pub fn is_named_by(&self, type_text: &str) -> bool {
        base_type_name(type_text) == self.name
    }

    /// Author-declared functions in declaration order.
    pub fn declared_functions(&self) -> impl Iterator<Item = &FunctionSpec> {
        self.constructors.iter().chain(self.destructor.iter()).chain(self.functions.iter())
    }

    pub fn libraries(&self) -> Vec<String> {
        dedup(self.libraries.iter().cloned().chain(self.declared_functions().flat_map(FunctionSpec::libraries)))
    }

    pub fn declaration_includes(&self) -> Vec<String> {
        let parent = self.parent.iter().flat_map(|p| p.includes.iter().cloned());
        dedup(
            self.includes
                .iter()
                .cloned()
                .chain(self.structure.includes())
                .chain(parent)
                .chain(self.constants.iter().flat_map(ConstantSpec::includes))
                .chain(self.declared_functions().flat_map(FunctionSpec::signature_includes)),
        )
    }

    pub fn definition_includes(&self) -> Vec<String> {
        dedup(
            self.includes
                .iter()
                .cloned()
                .chain(self.structure.includes())
                .chain(self.constants.iter().flat_map(ConstantSpec::includes))
                .chain(self.declared_functions().flat_map(FunctionSpec::body_includes)),
        )
    }
}

fn infer_pointer_wrapper(structure: &StructSpec, constructors: &[FunctionSpec]) -> bool {
    constructors.iter().filter_map(FunctionSpec::wrapped).any(|w| {
        w.returns.is_equivalent_pointer() || w.returns.name().is_some_and(|n| structure.is_pointer_type(n))
    })
}

fn parse_list<T>(fields: &Fields<'_>, key: &str, f: impl Fn(&Node) -> Result<T>) -> Result<Vec<T>> {
    fields.list(key)?.iter().map(f).collect()
}

impl SpecNode for ClassSpec {
    fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Self> {
        let fields = Fields::of(node, "class")?;
        fields.only(&[
            "name",
            "namespace",
            "doc",
            "includes",
            "libraries",
            "parent",
            "type",
            "factory",
            "equivalent-struct",
            "constructors",
            "destructor",
            "functions",
            "constants",
            "version",
        ])?;
        let name = fields.required_string("name")?;
        let fields = fields.named(&name);
        let namespace = fields.string("namespace")?.ok_or_else(|| SpecError::MissingNamespace { class: name.clone() })?;
        fields.require(&["equivalent-struct"])?;
        let structure = match fields.get("equivalent-struct") {
            Some(s) => StructSpec::from_node(s, ctx)?,
            None => return Err(SpecError::missing(fields.entity(), "equivalent-struct")),
        };
        let parent = match fields.get("parent") {
            None => None,
            Some(p) => {
                let p = Fields::of(p, "parent")?;
                p.only(&["name", "includes"])?;
                Some(ParentSpec { name: p.required_string("name")?, includes: p.includes("includes")? })
            }
        };
        let constructors = parse_list(&fields, "constructors", |c| FunctionSpec::constructor(c, &name, ctx))?;
        let destructor = match fields.get("destructor") {
            Some(d) => Some(FunctionSpec::destructor(d, &name, ctx)?),
            None => None,
        };
        let pointer_wrapper = match fields.string("type")?.as_deref() {
            Some("pointer") => true,
            Some("struct") => false,
            Some(other) => return Err(fields.invalid("type", format!("'{other}' must be 'pointer' or 'struct'"))),
            None => infer_pointer_wrapper(&structure, &constructors),
        };
        Ok(Self {
            namespace,
            doc: fields.doc()?,
            includes: fields.includes("includes")?,
            libraries: fields.includes("libraries")?,
            parent,
            pointer_wrapper,
            factory: fields.flag("factory")?,
            structure,
            constructors,
            destructor,
            functions: parse_list(&fields, "functions", |f| FunctionSpec::from_node(f, ctx))?,
            constants: parse_list(&fields, "constants", |c| ConstantSpec::from_node(c, ctx))?,
            version: ctx.spec_version(&fields)?,
            name,
        })
    }

    fn to_node(&self) -> Node {
        let parent = self.parent.as_ref().map(|p| MapBuilder::new().str("name", p.name.clone()).strings("includes", &p.includes).build());
        MapBuilder::new()
            .str("name", self.name.clone())
            .str("namespace", self.namespace.clone())
            .doc(&self.doc)
            .strings("includes", &self.includes)
            .strings("libraries", &self.libraries)
            .opt_node("parent", parent)
            .str("type", if self.pointer_wrapper { "pointer" } else { "struct" })
            .flag("factory", self.factory)
            .node("equivalent-struct", self.structure.to_node())
            .list("constructors", &self.constructors, FunctionSpec::to_node)
            .opt_node("destructor", self.destructor.as_ref().map(FunctionSpec::to_node))
            .list("functions", &self.functions, FunctionSpec::to_node)
            .list("constants", &self.constants, ConstantSpec::to_node)
            .str("version", self.version.to_string())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn class(v: serde_json::Value) -> Result<ClassSpec> {
        ClassSpec::from_node(&Node::from_value(&v).unwrap(), &NormalizeCtx::default())
    }

    #[test]
    fn namespace_is_required() {
        let err = class(json!({ "name": "Point", "equivalent-struct": { "name": "point" } })).unwrap_err();
        assert_eq!(err, SpecError::MissingNamespace { class: "Point".into() });
    }

    #[test]
    fn pointer_type_is_inferred_from_constructors() {
        let c = class(json!({
            "name": "File",
            "namespace": "io",
            "equivalent-struct": { "name": "file" },
            "constructors": [{
                "wrapped-function": { "name": "file_open", "return": { "type": "equivalent-struct-pointer" } }
            }]
        }))
        .unwrap();
        assert!(c.pointer_wrapper);
        assert_eq!(c.equivalent_declaration(), "struct file *equivalent");

        let explicit = class(json!({
            "name": "Point", "namespace": "geo", "type": "struct", "equivalent-struct": { "name": "point" }
        }))
        .unwrap();
        assert!(!explicit.pointer_wrapper);
        assert!(matches!(
            class(json!({ "name": "P", "namespace": "n", "type": "handle", "equivalent-struct": { "name": "p" } })),
            Err(SpecError::InvalidKey { .. })
        ));
    }

    #[test]
    fn libraries_are_collected_from_functions() {
        let c = class(json!({
            "name": "File",
            "namespace": "io",
            "libraries": "io",
            "equivalent-struct": { "name": "file" },
            "functions": [
                { "name": "close", "wrapped-function": { "name": "file_close", "libraries": ["io", "posix"] } }
            ]
        }))
        .unwrap();
        assert_eq!(c.libraries(), vec!["io", "posix"]);
        assert!(c.is_named_by("const File &"));
        assert!(!c.is_named_by("Files"));
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let ctx = NormalizeCtx::default();
        let raw = Node::from_value(&json!({
            "name": "Tree",
            "namespace": "forest",
            "parent": { "name": "Plant", "includes": "plant.hpp" },
            "equivalent-struct": { "name": "tree", "includes": "tree.h", "members": [{ "name": "height", "type": "int" }] },
            "constructors": [{ "params": [{ "name": "h", "type": "int" }], "wrapped-function": { "name": "tree_new", "params": [{ "name": "h" }], "return": { "type": "equivalent-struct" } } }],
            "destructor": { "wrapped-function": { "name": "tree_free", "params": [{ "value": "equivalent-struct-pointer" }] } },
            "constants": [{ "name": "MAX_HEIGHT", "type": "int", "value": 100 }]
        }))
        .unwrap();
        let once = ClassSpec::normalize(&raw, &ctx).unwrap();
        assert_eq!(ClassSpec::normalize(&once, &ctx).unwrap(), once);
    }
}
