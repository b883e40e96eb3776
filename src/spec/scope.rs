use semver::Version;
use tracing::debug;

use crate::error::{Result, SpecError};
use crate::resolve;
use crate::spec::class::ClassSpec;
use crate::spec::enumeration::EnumSpec;
use crate::spec::function::{FactoryArm, FunctionSpec};
use crate::spec::rule::evaluate_all;
use crate::spec::types::TypeSpec;
use crate::spec::{Fields, MapBuilder, NormalizeCtx, SpecNode, dedup};
use crate::template::expand_document;
use crate::tree::{Node, NodeMap};

/// Everything generated together: the classes and enums of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub name: Option<String>,
    pub version: Version,
    pub classes: Vec<ClassSpec>,
    pub enums: Vec<EnumSpec>,
}

#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Class(&'a ClassSpec),
    Enum(&'a EnumSpec),
}

impl Scope {
    /// Expands templates and normalizes the document.
    pub fn load(doc: Node, ctx: &NormalizeCtx) -> Result<Self> {
        let expanded = expand_document(doc)?;
        Self::from_node(&expanded, ctx)
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity<'_>> {
        self.classes.iter().map(Entity::Class).chain(self.enums.iter().map(Entity::Enum))
    }

    pub fn class(&self, name: &str) -> Option<&ClassSpec> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// The scope class a written type refers to, if any.
    pub fn class_for_type(&self, ty: &TypeSpec) -> Option<&ClassSpec> {
        self.classes.iter().find(|c| ty.name().is_some_and(|n| c.is_named_by(n)))
    }

    pub fn parent_of(&self, class: &ClassSpec) -> Option<&ClassSpec> {
        class.parent_name().and_then(|p| self.class(p))
    }

    /// The class inherits its `equivalent` member instead of declaring one.
    pub fn shares_parent_struct(&self, class: &ClassSpec) -> bool {
        self.parent_of(class).is_some_and(|p| p.structure.name == class.structure.name)
    }

    /// Subclasses that specialize `parent`: same struct, plus rules telling
    /// when a struct belongs to them.
    pub fn overloads(&self, parent: &ClassSpec) -> Vec<&ClassSpec> {
        self.classes
            .iter()
            .filter(|c| {
                c.parent_name() == Some(parent.name.as_str())
                    && c.structure.name == parent.structure.name
                    && !c.structure.rules.is_empty()
            })
            .collect()
    }

    pub fn is_factory(&self, class: &ClassSpec) -> bool {
        class.factory || !self.overloads(class).is_empty()
    }

    pub fn factory_arms(&self, parent: &ClassSpec) -> Vec<FactoryArm> {
        self.overloads(parent)
            .into_iter()
            .map(|c| FactoryArm { class: c.name.clone(), rules: c.structure.rules.clone() })
            .collect()
    }

    /// Picks the class a factory would build for native member values: the
    /// first overload whose rules all hold, otherwise `parent`.
    pub fn dispatch<'a>(&'a self, parent: &'a ClassSpec, native: &NodeMap) -> &'a ClassSpec {
        self.overloads(parent)
            .into_iter()
            .find(|c| evaluate_all(&c.structure.rules, native) == Some(true))
            .unwrap_or(parent)
    }

    pub fn libraries(&self) -> Vec<String> {
        dedup(self.classes.iter().flat_map(ClassSpec::libraries))
    }

    /// The explicit scope name, else the first namespace declared.
    pub fn module_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or_else(|| self.classes.first().map(|c| c.namespace.as_str()))
            .or_else(|| self.enums.iter().find_map(|e| e.namespace.as_deref()))
    }

    fn validate(&self) -> Result<()> {
        for (i, class) in self.classes.iter().enumerate() {
            if self.classes[..i].iter().any(|c| c.name == class.name) {
                return Err(SpecError::invalid("scope", class.name.clone(), "class is declared more than once"));
            }
            for function in class.declared_functions() {
                self.validate_casts(class, function)?;
            }
        }
        // every class and enum gets a header named after it
        let mut names: Vec<&str> = self.classes.iter().map(|c| c.name.as_str()).collect();
        for e in &self.enums {
            if names.contains(&e.name.as_str()) {
                return Err(SpecError::invalid("scope", e.name.clone(), "name is already used by another class or enum"));
            }
            names.push(&e.name);
        }
        Ok(())
    }

    /// Every typed argument built from a class-typed parameter must cast.
    fn validate_casts(&self, owner: &ClassSpec, function: &FunctionSpec) -> Result<()> {
        let Some(wrapped) = function.wrapped() else {
            return Ok(());
        };
        for arg in &wrapped.call.args {
            let (Some(target), Some(param)) = (arg.ty.as_ref(), function.param(&arg.value)) else {
                continue;
            };
            let Some(class) = self.class_for_type(&param.ty) else {
                continue;
            };
            let source = resolve::resolve_type(&param.ty, owner);
            let target = resolve::resolve_type(target, class);
            if resolve::cast(class, &param.name, &target, &source).is_none() {
                return Err(SpecError::invalid(
                    format!("function '{}' of class '{}'", function.name, owner.name),
                    arg.value.clone(),
                    format!("cannot cast '{source}' to '{target}'"),
                ));
            }
        }
        Ok(())
    }
}

impl SpecNode for Scope {
    fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Self> {
        if node.has_uses() {
            return Err(SpecError::template("document still contains template uses"));
        }
        let fields = Fields::of(node, "scope")?;
        fields.only(&["name", "version", "classes", "enums"])?;
        let classes = fields
            .list("classes")?
            .iter()
            .map(|c| ClassSpec::from_node(c, ctx))
            .collect::<Result<Vec<_>>>()?;
        let enums = fields
            .list("enums")?
            .iter()
            .map(|e| EnumSpec::from_node(e, ctx))
            .collect::<Result<Vec<_>>>()?;
        let scope = Self { name: fields.string("name")?, version: ctx.spec_version(&fields)?, classes, enums };
        scope.validate()?;
        debug!(classes = scope.classes.len(), enums = scope.enums.len(), "normalized scope");
        Ok(scope)
    }

    fn to_node(&self) -> Node {
        MapBuilder::new()
            .opt_str("name", self.name.as_deref())
            .str("version", self.version.to_string())
            .list("classes", &self.classes, ClassSpec::to_node)
            .list("enums", &self.enums, EnumSpec::to_node)
            .build()
    }
}
