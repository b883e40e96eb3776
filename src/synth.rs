//! Functions the generator adds to a class on its own.
//!
//! The result is an augmented view for emission; the model itself is never
//! modified, so normalization stays idempotent.
use std::borrow::Cow;

use tracing::trace;

use crate::resolve::resolve_type;
use crate::spec::class::EQUIVALENT_MEMBER;
use crate::spec::function::ReturnSpec;
use crate::spec::{
    ClassSpec, EQUIVALENT_POINTER_KEYWORD, EQUIVALENT_STRUCT_KEYWORD, FunctionKind, FunctionSpec, Initializer, ParamSpec, Scope, Synthesized,
    TypeSpec,
};

/// Every function to emit for `class`: author constructors, then the
/// pointer-adopting, struct-copying and member-wise constructors, then the
/// destructor, the factory, and the remaining author functions.
pub fn functions<'a>(class: &'a ClassSpec, scope: &Scope) -> Vec<Cow<'a, FunctionSpec>> {
    let mut out: Vec<Cow<'a, FunctionSpec>> = class.constructors.iter().map(Cow::Borrowed).collect();

    let candidates =
        [adopt_pointer_constructor(class, scope), from_value_constructor(class, scope), member_wise_constructor(class, scope)];
    for candidate in candidates.into_iter().flatten() {
        if !out.iter().any(|f| f.is_constructor() && same_params(f, &candidate, class)) {
            trace!(class = %class.name, params = candidate.params.len(), "synthesized constructor");
            out.push(Cow::Owned(candidate));
        }
    }

    out.extend(class.destructor.iter().map(Cow::Borrowed));
    if let Some(factory) = factory(class, scope) {
        trace!(class = %class.name, "synthesized factory");
        out.push(Cow::Owned(factory));
    }
    out.extend(class.functions.iter().map(Cow::Borrowed));
    out
}

/// `Name( struct s *equivalent )`
pub fn adopt_pointer_constructor(class: &ClassSpec, scope: &Scope) -> Option<FunctionSpec> {
    let mut constructor = FunctionSpec::synthesized(
        class.name.clone(),
        FunctionKind::Constructor,
        vec![ParamSpec::new(EQUIVALENT_MEMBER, TypeSpec::named(EQUIVALENT_POINTER_KEYWORD))],
        Synthesized::AdoptPointer,
        scope.version.clone(),
    );
    if let Some(parent) = inherited_parent(class, scope) {
        constructor.initializers.push(Initializer { name: parent.to_string(), values: vec![EQUIVALENT_MEMBER.to_string()] });
    }
    Some(constructor)
}

/// `Name( struct s equivalent )`, the target of by-value struct casts.
/// Pointer wrappers copy into a fresh allocation, so they only get one when
/// the struct's members are declared.
pub fn from_value_constructor(class: &ClassSpec, scope: &Scope) -> Option<FunctionSpec> {
    if class.pointer_wrapper && !class.structure.has_members() {
        return None;
    }
    let mut constructor = FunctionSpec::synthesized(
        class.name.clone(),
        FunctionKind::Constructor,
        vec![ParamSpec::new(EQUIVALENT_MEMBER, TypeSpec::named(EQUIVALENT_STRUCT_KEYWORD))],
        Synthesized::FromValue,
        scope.version.clone(),
    );
    if let Some(parent) = inherited_parent(class, scope) {
        constructor.initializers.push(Initializer { name: parent.to_string(), values: vec![EQUIVALENT_MEMBER.to_string()] });
    }
    Some(constructor)
}

/// One parameter per struct member, in member order. Pointer wrappers
/// allocate the struct first.
pub fn member_wise_constructor(class: &ClassSpec, scope: &Scope) -> Option<FunctionSpec> {
    if !class.structure.has_members() {
        return None;
    }
    let params = class
        .structure
        .members
        .iter()
        .map(|m| ParamSpec::new(m.name.clone(), m.ty.clone()))
        .collect();
    Some(FunctionSpec::synthesized(
        class.name.clone(),
        FunctionKind::Constructor,
        params,
        Synthesized::MemberWise,
        scope.version.clone(),
    ))
}

/// `static Name *newName( struct s *equivalent )`, for classes with
/// specialized subclasses or declared as factories.
pub fn factory(class: &ClassSpec, scope: &Scope) -> Option<FunctionSpec> {
    if !scope.is_factory(class) {
        return None;
    }
    let mut factory = FunctionSpec::synthesized(
        factory_name(class),
        FunctionKind::Method,
        vec![ParamSpec::new(EQUIVALENT_MEMBER, TypeSpec::named(EQUIVALENT_POINTER_KEYWORD))],
        Synthesized::Factory(scope.factory_arms(class)),
        scope.version.clone(),
    );
    factory.is_static = true;
    factory.returns = ReturnSpec::of(TypeSpec::named(format!("{} *", class.name)));
    Some(factory)
}

pub fn factory_name(class: &ClassSpec) -> String {
    format!("new{}", class.name)
}

/// The parent whose `equivalent` member this class reuses.
fn inherited_parent<'a>(class: &'a ClassSpec, scope: &Scope) -> Option<&'a str> {
    if scope.shares_parent_struct(class) { class.parent_name() } else { None }
}

fn same_params(a: &FunctionSpec, b: &FunctionSpec, owner: &ClassSpec) -> bool {
    let squash = |p: &ParamSpec| resolve_type(&p.ty, owner).split_whitespace().collect::<String>();
    a.params.len() == b.params.len() && a.params.iter().zip(&b.params).all(|(x, y)| squash(x) == squash(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Implementation, NormalizeCtx};
    use crate::tree::Node;
    use serde_json::json;

    fn scope(v: serde_json::Value) -> Scope {
        Scope::load(Node::from_value(&v).unwrap(), &NormalizeCtx::default()).unwrap()
    }

    fn body(f: &FunctionSpec) -> Option<&Synthesized> {
        match &f.implementation {
            Implementation::Synthesized(s) => Some(s),
            _ => None,
        }
    }

    #[test]
    fn constructors_are_added_in_order() {
        let s = scope(json!({
            "classes": [{
                "name": "Point", "namespace": "geo",
                "equivalent-struct": { "name": "point", "members": [{ "name": "x", "type": "int" }, { "name": "y", "type": "int" }] },
                "functions": [{ "name": "norm", "return": { "type": "double" }, "wrapped-code": "return 0;" }]
            }]
        }));
        let class = s.class("Point").unwrap();
        let fs = functions(class, &s);
        let kinds: Vec<_> = fs.iter().map(|f| body(f).cloned()).collect();
        assert_eq!(
            kinds,
            vec![Some(Synthesized::AdoptPointer), Some(Synthesized::FromValue), Some(Synthesized::MemberWise), None]
        );
        assert_eq!(resolve_type(&fs[1].params[0].ty, class), "struct point");
        assert_eq!(fs[2].params.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(s.classes[0], *class, "the model is left untouched");
    }

    #[test]
    fn author_pointer_constructor_wins() {
        let s = scope(json!({
            "classes": [{
                "name": "Handle", "namespace": "io", "equivalent-struct": { "name": "handle" },
                "constructors": [{
                    "params": [{ "name": "raw", "type": "struct handle *" }],
                    "wrapped-code": "this->equivalent = raw;"
                }]
            }]
        }));
        let class = s.class("Handle").unwrap();
        let fs = functions(class, &s);
        assert_eq!(fs.len(), 2);
        assert!(body(&fs[0]).is_none());
        assert_eq!(body(&fs[1]), Some(&Synthesized::FromValue));
    }

    #[test]
    fn from_value_constructor_is_deduplicated() {
        let s = scope(json!({
            "classes": [{
                "name": "Point", "namespace": "geo", "equivalent-struct": { "name": "point" },
                "constructors": [{
                    "params": [{ "name": "p", "type": "equivalent-struct" }],
                    "wrapped-code": "this->equivalent = p;"
                }]
            }]
        }));
        let class = s.class("Point").unwrap();
        let kinds: Vec<_> = functions(class, &s).iter().map(|f| body(f).cloned()).collect();
        assert_eq!(kinds, vec![None, Some(Synthesized::AdoptPointer)]);
    }

    #[test]
    fn opaque_pointer_wrappers_skip_the_copy() {
        let s = scope(json!({
            "version": "0.5",
            "classes": [
                { "name": "File", "namespace": "io", "type": "pointer", "equivalent-struct": { "name": "file" } },
                {
                    "name": "Pair", "namespace": "io", "type": "pointer",
                    "equivalent-struct": { "name": "pair", "members": [{ "name": "a", "type": "int" }] }
                }
            ]
        }));
        let file = s.class("File").unwrap();
        assert!(from_value_constructor(file, &s).is_none());
        let pair = s.class("Pair").unwrap();
        let copy = from_value_constructor(pair, &s).unwrap();
        assert_eq!(copy.version, semver::Version::new(0, 5, 0));
    }

    #[test]
    fn factories_list_overloads_as_arms() {
        let s = scope(json!({
            "classes": [
                { "name": "Shape", "namespace": "geo", "equivalent-struct": { "name": "shape" } },
                {
                    "name": "Circle", "namespace": "geo", "parent": { "name": "Shape" },
                    "equivalent-struct": { "name": "shape", "rules": [{ "member-name": "kind", "condition": "equals", "value": 1 }] }
                }
            ]
        }));
        let shape = s.class("Shape").unwrap();
        let fs = functions(shape, &s);
        let factory = fs.iter().find(|f| f.name == "newShape").unwrap();
        assert!(factory.is_static);
        assert_eq!(factory.returns.ty, TypeSpec::named("Shape *"));
        match body(factory) {
            Some(Synthesized::Factory(arms)) => assert_eq!(arms[0].class, "Circle"),
            other => panic!("unexpected {other:?}"),
        }

        let circle = s.class("Circle").unwrap();
        let adopt = adopt_pointer_constructor(circle, &s).unwrap();
        assert_eq!(adopt.initializers[0].render(), "Shape( equivalent )");
        assert!(factory_name(circle) == "newCircle" && super::factory(circle, &s).is_none());
    }
}
