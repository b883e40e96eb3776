//! Reserved-keyword resolution and casts between wrapper classes and their
//! native structs.
//!
//! Everything here is a pure function of the normalized model and the
//! receiver spelling handed in by a backend.
use crate::spec::class::EQUIVALENT_MEMBER;
use crate::spec::{
    ArgSpec, CallSpec, ClassSpec, EQUIVALENT_POINTER_KEYWORD, EQUIVALENT_STRUCT_KEYWORD, FunctionSpec, ParamSpec,
    RETURN_VALUE_KEYWORD, SELF_REFERENCE_KEYWORD, Scope, TypeSpec, VARIADIC_KEYWORD,
};

/// Local holding the `va_list` of a variadic function.
pub const VARIADIC_ARGS: &str = "variadic_args";

/// Local holding the result of a wrapped call.
pub const RETURN_VALUE: &str = "return_val";

/// How generated code reaches the current instance.
#[derive(Debug, Clone, Copy)]
pub struct Receiver<'a> {
    pub instance: &'a str,
    pub via_pointer: bool,
}

impl Receiver<'static> {
    pub const THIS: Receiver<'static> = Receiver { instance: "this", via_pointer: true };
    pub const SELF: Receiver<'static> = Receiver { instance: "self", via_pointer: true };
}

/// How a backend spells a parameter when it is used as a cast source:
/// the instance expression and its type.
pub type ParamView<'a> = &'a dyn Fn(&ParamSpec) -> (String, String);

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

pub fn resolve_type(ty: &TypeSpec, owner: &ClassSpec) -> String {
    match ty {
        TypeSpec::Name { name, .. } => resolve_type_name(name, owner),
        TypeSpec::Function { params, returns, .. } => {
            format!("{} (*)( {} )", resolve_type(returns, owner), param_types(params, owner))
        }
    }
}

pub fn resolve_type_name(name: &str, owner: &ClassSpec) -> String {
    match name.trim() {
        EQUIVALENT_STRUCT_KEYWORD => owner.structure.type_name(),
        EQUIVALENT_POINTER_KEYWORD => owner.structure.pointer_type(),
        SELF_REFERENCE_KEYWORD => owner.name.clone(),
        VARIADIC_KEYWORD => "va_list".to_string(),
        other => other.to_string(),
    }
}

fn param_types(params: &[ParamSpec], owner: &ClassSpec) -> String {
    if params.is_empty() {
        return "void".to_string();
    }
    params
        .iter()
        .map(|p| if p.is_variadic() { VARIADIC_KEYWORD.to_string() } else { resolve_type(&p.ty, owner) })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `int x`, `struct foo *p`, `int ( *callback )( int, char * )`.
pub fn declare(ty: &TypeSpec, name: &str, owner: &ClassSpec) -> String {
    match ty {
        TypeSpec::Function { params, returns, .. } => {
            format!("{} ( *{} )( {} )", resolve_type(returns, owner), name, param_types(params, owner))
        }
        TypeSpec::Name { name: type_name, .. } => typed_variable(&resolve_type_name(type_name, owner), name),
    }
}

/// Joins a type and a name, without a space after a pointer or reference marker.
pub fn typed_variable(ty: &str, name: &str) -> String {
    let ty = ty.trim_end();
    if ty.ends_with('*') || ty.ends_with('&') {
        format!("{ty}{name}")
    } else {
        format!("{ty} {name}")
    }
}

/// One entry of a parameter list; the variadic parameter is always `...`.
pub fn declare_param(param: &ParamSpec, owner: &ClassSpec) -> String {
    if param.is_variadic() {
        VARIADIC_KEYWORD.to_string()
    } else {
        declare(&param.ty, &param.name, owner)
    }
}

pub fn is_pointer(ty: &str) -> bool {
    ty.trim_end().ends_with('*')
}

// ————————————————————————————————————————————————————————————————————————————
// EXPRESSIONS
// ————————————————————————————————————————————————————————————————————————————

/// `instance->equivalent` or `instance.equivalent`.
pub fn member_access(instance: &str, via_pointer: bool) -> String {
    let op = if via_pointer { "->" } else { "." };
    format!("{instance}{op}{EQUIVALENT_MEMBER}")
}

/// The wrapped struct by value. Pointer wrappers dereference their member.
pub fn equivalent_struct(class: &ClassSpec, instance: &str, via_pointer: bool) -> String {
    let access = member_access(instance, via_pointer);
    if class.pointer_wrapper { format!("*{access}") } else { access }
}

/// A pointer to the wrapped struct. Pointer wrappers hand out their member.
pub fn equivalent_pointer(class: &ClassSpec, instance: &str, via_pointer: bool) -> String {
    let access = member_access(instance, via_pointer);
    if class.pointer_wrapper { access } else { format!("&{access}") }
}

/// Converts `instance` of type `source` into `target`, where one side is
/// `class` (by value or pointer) and the other its struct (by value or
/// pointer). `None` if no such conversion exists.
pub fn cast(class: &ClassSpec, instance: &str, target: &str, source: &str) -> Option<String> {
    let target_is_class = class.is_named_by(target);
    let source_is_class = class.is_named_by(source);
    let structure = &class.structure;

    if source_is_class {
        let via_pointer = is_pointer(source);
        return if structure.is_value_type(target) {
            Some(equivalent_struct(class, instance, via_pointer))
        } else if structure.is_pointer_type(target) {
            Some(equivalent_pointer(class, instance, via_pointer))
        } else if target_is_class && is_pointer(target) == via_pointer {
            Some(instance.to_string())
        } else {
            None
        };
    }

    if target_is_class && (structure.is_pointer_type(source) || structure.is_value_type(source)) {
        return Some(if is_pointer(target) {
            format!("new {}( {} )", class.name, instance)
        } else {
            format!("{}( {} )", class.name, instance)
        });
    }

    None
}

/// The expression passed for one wrapped call argument.
pub fn resolve_arg(
    arg: &ArgSpec,
    function: &FunctionSpec,
    owner: &ClassSpec,
    scope: &Scope,
    receiver: Receiver<'_>,
    view: ParamView<'_>,
) -> String {
    match arg.value.as_str() {
        EQUIVALENT_STRUCT_KEYWORD => equivalent_struct(owner, receiver.instance, receiver.via_pointer),
        EQUIVALENT_POINTER_KEYWORD => equivalent_pointer(owner, receiver.instance, receiver.via_pointer),
        RETURN_VALUE_KEYWORD => RETURN_VALUE.to_string(),
        VARIADIC_KEYWORD => VARIADIC_ARGS.to_string(),
        value => {
            if let (Some(target), Some(param)) = (arg.ty.as_ref(), function.param(value)) {
                if let Some(class) = scope.class_for_type(&param.ty) {
                    let (instance, source) = view(param);
                    if let Some(expr) = cast(class, &instance, &resolve_type(target, class), &source) {
                        return expr;
                    }
                }
            }
            value.to_string()
        }
    }
}

/// `name( a, b )`, or `name()` without arguments.
pub fn call_expression(
    call: &CallSpec,
    function: &FunctionSpec,
    owner: &ClassSpec,
    scope: &Scope,
    receiver: Receiver<'_>,
    view: ParamView<'_>,
) -> String {
    if call.args.is_empty() {
        return format!("{}()", call.name);
    }
    let args: Vec<String> = call.args.iter().map(|a| resolve_arg(a, function, owner, scope, receiver, view)).collect();
    format!("{}( {} )", call.name, args.join(", "))
}

/// Converts a wrapped call result into the declared return type of
/// `function`. Overloaded class returns go through that class's factory.
pub fn return_expression(function: &FunctionSpec, owner: &ClassSpec, scope: &Scope, native: &TypeSpec, expr: &str) -> String {
    let declared = &function.returns.ty;
    let Some(class) = scope.class_for_type(declared) else {
        return expr.to_string();
    };
    let target = resolve_type(declared, owner);
    let source = resolve_type(native, owner);
    if class.is_named_by(&source) {
        return expr.to_string();
    }
    if function.returns.overloaded && is_pointer(&target) && scope.is_factory(class) {
        return format!("{}::new{}( {} )", class.name, class.name, expr);
    }
    cast(class, expr, &target, &source).unwrap_or_else(|| expr.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::NormalizeCtx;
    use crate::tree::Node;
    use serde_json::json;

    fn scope() -> Scope {
        Scope::load(
            Node::from_value(&json!({
                "classes": [
                    { "name": "Point", "namespace": "geo", "type": "struct", "equivalent-struct": { "name": "point" } },
                    { "name": "Handle", "namespace": "geo", "type": "pointer", "equivalent-struct": { "name": "handle" } }
                ]
            }))
            .unwrap(),
            &NormalizeCtx::default(),
        )
        .unwrap()
    }

    #[test]
    fn keywords_resolve_against_the_owner() {
        let s = scope();
        let point = s.class("Point").unwrap();
        assert_eq!(resolve_type(&TypeSpec::named("equivalent-struct"), point), "struct point");
        assert_eq!(resolve_type(&TypeSpec::named("equivalent-struct-pointer"), point), "struct point *");
        assert_eq!(resolve_type(&TypeSpec::named("self-reference"), point), "Point");
        assert_eq!(resolve_type(&TypeSpec::named("..."), point), "va_list");
        assert_eq!(declare(&TypeSpec::named("equivalent-struct-pointer"), "p", point), "struct point *p");
    }

    #[test]
    fn class_to_struct_casts() {
        let s = scope();
        let point = s.class("Point").unwrap();
        let handle = s.class("Handle").unwrap();
        assert_eq!(cast(point, "p", "struct point *", "Point").as_deref(), Some("&p.equivalent"));
        assert_eq!(cast(point, "p", "struct point", "Point *").as_deref(), Some("p->equivalent"));
        assert_eq!(cast(handle, "h", "struct handle *", "Handle &").as_deref(), Some("h.equivalent"));
        assert_eq!(cast(handle, "h", "struct handle", "Handle *").as_deref(), Some("*h->equivalent"));
        assert_eq!(cast(point, "p", "int", "Point"), None);
    }

    #[test]
    fn struct_to_class_casts() {
        let s = scope();
        let handle = s.class("Handle").unwrap();
        assert_eq!(cast(handle, "raw", "Handle", "struct handle *").as_deref(), Some("Handle( raw )"));
        assert_eq!(cast(handle, "raw", "Handle *", "struct handle *").as_deref(), Some("new Handle( raw )"));
        assert_eq!(cast(handle, "raw", "Handle", "struct other *"), None);
    }

    #[test]
    fn function_pointer_declarations() {
        let s = scope();
        let point = s.class("Point").unwrap();
        let ty = TypeSpec::Function {
            params: vec![ParamSpec::new("p", TypeSpec::named("equivalent-struct-pointer"))],
            returns: Box::new(TypeSpec::named("int")),
            includes: Vec::new(),
        };
        assert_eq!(declare(&ty, "visit", point), "int ( *visit )( struct point * )");
    }
}
