//! C++ wrapper classes: one header and one definition file per class, one
//! header per enum, and a CMake build descriptor.
use rayon::prelude::*;
use tracing::debug;

use crate::backend::{Backend, GeneratedFile, push, push_all};
use crate::config::GeneratorConfig;
use crate::names;
use crate::resolve::{
    self, RETURN_VALUE, Receiver, VARIADIC_ARGS, declare_param, resolve_type, typed_variable,
};
use crate::spec::rule::render_all;
use crate::spec::{
    ActionSpec, ClassSpec, Entity, EnumSpec, ErrorCheck, FactoryArm, FunctionSpec, Implementation, ParamSpec,
    RETURN_VALUE_KEYWORD, RenderCtx, Scope, Synthesized, WrappedCodeSpec, dedup,
};
use crate::synth;

pub struct CppBackend {
    config: GeneratorConfig,
}

impl CppBackend {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    fn header_name(&self, name: &str) -> String {
        format!("{}.{}", name, self.config.header_extension)
    }

    fn source_name(&self, name: &str) -> String {
        format!("{}.{}", name, self.config.source_extension)
    }

    fn entity_files(&self, scope: &Scope, entity: Entity<'_>) -> Vec<GeneratedFile> {
        match entity {
            Entity::Class(class) => {
                let wrapper = ClassWriter { backend: self, scope, class, functions: synth::functions(class, scope) };
                vec![
                    GeneratedFile::new(self.header_name(&class.name), wrapper.declaration()),
                    GeneratedFile::new(self.source_name(&class.name), wrapper.definition()),
                ]
            }
            Entity::Enum(enumeration) => {
                vec![GeneratedFile::new(self.header_name(&enumeration.name), self.enum_declaration(enumeration))]
            }
        }
    }

    pub fn enum_declaration(&self, e: &EnumSpec) -> Vec<String> {
        let guard = names::include_guard(&e.name, &self.config.header_extension);
        let mut out = vec![format!("#ifndef {guard}"), format!("#define {guard}"), String::new()];
        let includes = e.all_includes();
        if !includes.is_empty() {
            out.extend(includes.iter().map(|i| format!("#include <{i}>")));
            out.push(String::new());
        }
        let depth = if let Some(ns) = &e.namespace {
            out.push(format!("namespace {ns} {{"));
            out.push(String::new());
            1
        } else {
            0
        };
        if let Some(doc) = &e.doc {
            push_all(&mut out, depth, doc.doxygen(self.doc_width(depth)));
        }
        push(&mut out, depth, format!("enum class {} {{", e.name));
        let values = e.effective_values();
        let count = values.len();
        for (i, (element, (name, value))) in e.elements.iter().zip(values).enumerate() {
            if let Some(doc) = &element.doc {
                push_all(&mut out, depth + 1, doc.doxygen(self.doc_width(depth + 1)));
            }
            let separator = if i + 1 < count { "," } else { "" };
            push(&mut out, depth + 1, format!("{name} = {value}{separator}"));
        }
        push(&mut out, depth, "};");
        if e.namespace.is_some() {
            out.push(String::new());
            out.push("}".into());
        }
        out.push(String::new());
        out.push(format!("#endif /* {guard} */"));
        out
    }

    fn doc_width(&self, depth: usize) -> usize {
        self.config.doc_line_width.saturating_sub(2 * depth)
    }

    pub fn library_name(&self, scope: &Scope) -> String {
        let name = self.config.library_name.as_deref().or_else(|| scope.module_name()).unwrap_or("wrapper");
        names::c_identifier(name)
    }
}

impl Backend for CppBackend {
    fn generate_sources(&self, scope: &Scope) -> Vec<GeneratedFile> {
        let entities: Vec<Entity<'_>> = scope.entities().collect();
        let files: Vec<Vec<GeneratedFile>> = entities.par_iter().map(|e| self.entity_files(scope, *e)).collect();
        let files: Vec<GeneratedFile> = files.into_iter().flatten().collect();
        debug!(files = files.len(), "generated C++ sources");
        files
    }

    fn package_descriptor(&self, scope: &Scope, sources: &[GeneratedFile]) -> GeneratedFile {
        let name = self.library_name(scope);
        let suffix = format!(".{}", self.config.source_extension);
        let mut out = vec![
            "cmake_minimum_required( VERSION 3.10 )".to_string(),
            format!("project( {name} CXX )"),
            String::new(),
            "set( CMAKE_CXX_STANDARD 11 )".to_string(),
            "set( CMAKE_CXX_STANDARD_REQUIRED ON )".to_string(),
            String::new(),
            format!("add_library( {name} SHARED"),
        ];
        out.extend(sources.iter().filter(|f| f.name.ends_with(&suffix)).map(|f| format!("  {}", f.name)));
        out.push(")".into());
        let libraries = scope.libraries();
        if !libraries.is_empty() {
            out.push(String::new());
            out.push(format!("target_link_libraries( {} {} )", name, libraries.join(" ")));
        }
        let header_suffix = format!(".{}", self.config.header_extension);
        out.push(String::new());
        out.push(format!("install( TARGETS {name} DESTINATION lib )"));
        out.push("install( FILES".into());
        out.extend(sources.iter().filter(|f| f.name.ends_with(&header_suffix)).map(|f| format!("  {}", f.name)));
        out.push("  DESTINATION include".into());
        out.push(")".into());
        GeneratedFile::new("CMakeLists.txt", out)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CLASSES
// ————————————————————————————————————————————————————————————————————————————

struct ClassWriter<'a> {
    backend: &'a CppBackend,
    scope: &'a Scope,
    class: &'a ClassSpec,
    functions: Vec<std::borrow::Cow<'a, FunctionSpec>>,
}

impl<'a> ClassWriter<'a> {
    fn declaration(&self) -> Vec<String> {
        let class = self.class;
        let guard = names::include_guard(&class.name, &self.backend.config.header_extension);
        let mut out = vec![format!("#ifndef {guard}"), format!("#define {guard}"), String::new()];

        let includes = dedup(
            class
                .declaration_includes()
                .into_iter()
                .chain(self.functions.iter().flat_map(|f| f.signature_includes())),
        );
        out.extend(includes.iter().map(|i| format!("#include <{i}>")));
        out.extend(self.referenced_classes(true).iter().map(|c| format!("#include \"{}\"", self.backend.header_name(c))));
        out.push(String::new());
        out.push(format!("namespace {} {{", class.namespace));
        out.push(String::new());

        if let Some(doc) = &class.doc {
            push_all(&mut out, 1, doc.doxygen(self.backend.doc_width(1)));
        }
        match class.parent_name() {
            Some(parent) => push(&mut out, 1, format!("class {} : public {} {{", class.name, parent)),
            None => push(&mut out, 1, format!("class {} {{", class.name)),
        }
        push(&mut out, 1, "public:");

        if !class.constants.is_empty() {
            for constant in &class.constants {
                if let Some(doc) = &constant.doc {
                    push_all(&mut out, 2, doc.doxygen(self.backend.doc_width(2)));
                }
                let ty = resolve_type(&constant.ty, class);
                push(&mut out, 2, format!("static const {};", typed_variable(&ty, &constant.name)));
            }
            out.push(String::new());
        }
        if !self.scope.shares_parent_struct(class) {
            push(&mut out, 2, format!("{};", class.equivalent_declaration()));
            out.push(String::new());
        }
        for function in &self.functions {
            if let Some(doc) = function.doc_comment() {
                push_all(&mut out, 2, doc.doxygen(self.backend.doc_width(2)));
            }
            push(&mut out, 2, format!("{};", self.signature(function, true)));
        }
        push(&mut out, 1, "};");
        out.push(String::new());
        out.push("}".into());
        out.push(String::new());
        out.push(format!("#endif /* {guard} */"));
        out
    }

    fn definition(&self) -> Vec<String> {
        let class = self.class;
        let mut out = vec![format!("#include \"{}\"", self.backend.header_name(&class.name))];
        out.extend(self.referenced_classes(false).iter().map(|c| format!("#include \"{}\"", self.backend.header_name(c))));
        let includes = dedup(class.definition_includes().into_iter().chain(self.functions.iter().flat_map(|f| f.body_includes())));
        out.extend(includes.iter().map(|i| format!("#include <{i}>")));
        if self.functions.iter().any(|f| f.is_variadic()) {
            out.push("#include <cstdarg>".into());
        }
        out.push(String::new());
        out.push(format!("namespace {} {{", class.namespace));

        for constant in &class.constants {
            let ty = resolve_type(&constant.ty, class);
            out.push(String::new());
            push(&mut out, 1, format!("const {} = {};", typed_variable(&ty, &format!("{}::{}", class.name, constant.name)), constant.value));
        }
        for function in &self.functions {
            out.push(String::new());
            let mut head = self.signature(function, false);
            if !function.initializers.is_empty() {
                let inits: Vec<String> = function.initializers.iter().map(|i| i.render()).collect();
                head = format!("{} : {}", head, inits.join(", "));
            }
            push(&mut out, 1, format!("{head} {{"));
            push_all(&mut out, 2, self.body(function));
            push(&mut out, 1, "}");
        }
        out.push(String::new());
        out.push("}".into());
        out
    }

    /// Scope classes whose headers this class needs: in the declaration
    /// the parent and signature types, in the definition the factory
    /// overloads.
    fn referenced_classes(&self, declaration: bool) -> Vec<String> {
        let class = self.class;
        if !declaration {
            return self.scope.overloads(class).iter().map(|c| c.name.clone()).collect();
        }
        let parent = class.parent_name().filter(|p| self.scope.class(p).is_some()).map(str::to_string);
        let signature_types = self.functions.iter().flat_map(|f| {
            f.params.iter().map(|p| &p.ty).chain(std::iter::once(&f.returns.ty)).collect::<Vec<_>>()
        });
        let used = signature_types
            .filter_map(|ty| self.scope.class_for_type(ty))
            .filter(|c| c.name != class.name)
            .map(|c| c.name.clone());
        dedup(parent.into_iter().chain(used))
    }

    /// `static int count( int a = 1 )` in declarations,
    /// `int Name::count( int a )` in definitions.
    fn signature(&self, function: &FunctionSpec, declaration: bool) -> String {
        let class = self.class;
        let name = if declaration { function.name.clone() } else { format!("{}::{}", class.name, function.name) };
        let params = self.param_list(&function.params, declaration);
        let head = if function.is_constructor() || function.is_destructor() {
            format!("{name}( {params} )")
        } else if function.returns.ty.is_self_reference() {
            format!("{}& {name}( {params} )", class.name)
        } else {
            typed_variable(&resolve_type(&function.returns.ty, class), &format!("{name}( {params} )"))
        };
        if !declaration {
            return head;
        }
        let mut prefix = String::new();
        if function.is_static {
            prefix.push_str("static ");
        }
        if function.is_virtual {
            prefix.push_str("virtual ");
        }
        format!("{prefix}{head}")
    }

    fn param_list(&self, params: &[ParamSpec], declaration: bool) -> String {
        if params.is_empty() {
            return "void".into();
        }
        params
            .iter()
            .map(|p| {
                let decl = declare_param(p, self.class);
                match (&p.default, declaration) {
                    (Some(default), true) => format!("{decl} = {default}"),
                    _ => decl,
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn body(&self, function: &FunctionSpec) -> Vec<String> {
        match &function.implementation {
            Implementation::Code(code) => self.code_body(function, code),
            Implementation::Function(_) => self.wrapped_body(function),
            Implementation::Synthesized(Synthesized::AdoptPointer) => {
                if function.initializers.is_empty() {
                    let value = if self.class.pointer_wrapper { "equivalent" } else { "*equivalent" };
                    vec![format!("this->equivalent = {value};")]
                } else {
                    Vec::new()
                }
            }
            Implementation::Synthesized(Synthesized::FromValue) => {
                if !function.initializers.is_empty() {
                    Vec::new()
                } else if self.class.pointer_wrapper {
                    vec![
                        format!("this->equivalent = new {};", self.class.structure.type_name()),
                        "*this->equivalent = equivalent;".into(),
                    ]
                } else {
                    vec!["this->equivalent = equivalent;".into()]
                }
            }
            Implementation::Synthesized(Synthesized::MemberWise) => self.member_wise_body(),
            Implementation::Synthesized(Synthesized::Factory(arms)) => self.factory_body(arms),
        }
    }

    /// The author's lines. Declared return values are held in `return_val`,
    /// checked, and then returned.
    fn code_body(&self, function: &FunctionSpec, code: &WrappedCodeSpec) -> Vec<String> {
        let class = self.class;
        let Some(returns) = function.code_return() else {
            let mut out = code.lines.clone();
            if let Some(check) = &code.error_check {
                out.extend(self.error_guard(function, check, "this->equivalent"));
            }
            return out;
        };
        let native = resolve_type(returns, class);
        let mut out = vec![format!("{};", typed_variable(&native, RETURN_VALUE))];
        out.extend(code.lines.iter().map(|line| line.replace(RETURN_VALUE_KEYWORD, RETURN_VALUE)));
        if let Some(check) = &code.error_check {
            out.extend(self.error_guard(function, check, RETURN_VALUE));
        }
        if function.returns.ty.is_self_reference() {
            out.push("return *this;".into());
        } else if function.returns_value() {
            let expr = resolve::return_expression(function, class, self.scope, returns, RETURN_VALUE);
            out.push(format!("return {expr};"));
        }
        out
    }

    fn error_guard(&self, function: &FunctionSpec, check: &ErrorCheck, return_value: &str) -> Vec<String> {
        let ctx = RenderCtx { variable: "this->equivalent", pointer: self.class.pointer_wrapper, return_value };
        vec![
            format!("if( {} ) {{", render_all(&check.rules, &ctx)),
            format!("  {}", self.throw_statement(function, &check.action)),
            "}".into(),
        ]
    }

    fn member_wise_body(&self) -> Vec<String> {
        let class = self.class;
        let mut out = Vec::new();
        if class.pointer_wrapper {
            out.push(format!("this->equivalent = new {};", class.structure.type_name()));
        }
        let access = if class.pointer_wrapper { "->" } else { "." };
        for member in &class.structure.members {
            out.push(format!("this->equivalent{access}{0} = {0};", member.name));
        }
        out
    }

    fn factory_body(&self, arms: &[FactoryArm]) -> Vec<String> {
        let fallback = format!("return new {}( equivalent );", self.class.name);
        if arms.is_empty() {
            return vec![fallback];
        }
        let ctx = RenderCtx { variable: "equivalent", pointer: true, return_value: RETURN_VALUE };
        let mut out = Vec::new();
        for (i, arm) in arms.iter().enumerate() {
            let keyword = if i == 0 { "if" } else { "} else if" };
            out.push(format!("{keyword}( {} ) {{", render_all(&arm.rules, &ctx)));
            out.push(format!("  return new {}( equivalent );", arm.class));
        }
        out.push("} else {".into());
        out.push(format!("  {fallback}"));
        out.push("}".into());
        out
    }

    fn wrapped_body(&self, function: &FunctionSpec) -> Vec<String> {
        let Some(wrapped) = function.wrapped() else {
            return Vec::new();
        };
        let class = self.class;
        let view = |p: &ParamSpec| (p.name.clone(), resolve_type(&p.ty, class));
        let call = resolve::call_expression(&wrapped.call, function, class, self.scope, Receiver::THIS, &view);
        let mut out = Vec::new();

        if function.is_variadic() {
            let anchor = function.last_fixed_param().map(|p| p.name.as_str()).unwrap_or_default();
            out.push(format!("va_list {VARIADIC_ARGS};"));
            out.push(format!("va_start( {VARIADIC_ARGS}, {anchor} );"));
        }

        let native = resolve_type(&wrapped.returns, class);
        let held = function.needs_return_value();
        if function.is_constructor() {
            out.extend(store_equivalent(class, "this->equivalent", &call, &native, "new"));
        } else if held {
            out.push(format!("{} = {};", typed_variable(&native, RETURN_VALUE), call));
        } else if function.returns_value() && !function.returns.ty.is_self_reference() {
            let expr = resolve::return_expression(function, class, self.scope, &wrapped.returns, &call);
            out.push(format!("return {expr};"));
        } else {
            out.push(format!("{call};"));
        }

        if let Some(check) = &wrapped.error_check {
            let return_value = if function.is_constructor() { "this->equivalent" } else { RETURN_VALUE };
            out.extend(self.error_guard(function, check, return_value));
        }

        if function.is_variadic() {
            out.push(format!("va_end( {VARIADIC_ARGS} );"));
        }
        if function.returns.ty.is_self_reference() {
            out.push("return *this;".into());
        } else if held && function.returns_value() {
            let expr = resolve::return_expression(function, class, self.scope, &wrapped.returns, RETURN_VALUE);
            out.push(format!("return {expr};"));
        }
        out
    }

    fn throw_statement(&self, function: &FunctionSpec, action: &ActionSpec) -> String {
        match action {
            ActionSpec::ThrowValue(value) => format!("throw {value};"),
            ActionSpec::Throw(call) => {
                let view = |p: &ParamSpec| (p.name.clone(), resolve_type(&p.ty, self.class));
                let expr = resolve::call_expression(call, function, self.class, self.scope, Receiver::THIS, &view);
                format!("throw {expr};")
            }
        }
    }
}

/// Statements storing a native result in a class's `equivalent` member.
/// `alloc` is either `new` (C++) or `malloc` (C).
pub(crate) fn store_equivalent(class: &ClassSpec, target: &str, expr: &str, native: &str, alloc: &str) -> Vec<String> {
    let structure = &class.structure;
    let from_pointer = structure.is_pointer_type(native);
    let from_value = structure.is_value_type(native);
    match (class.pointer_wrapper, from_pointer, from_value) {
        (true, true, _) | (false, false, true) => vec![format!("{target} = {expr};")],
        (false, true, _) => vec![format!("{target} = *{expr};")],
        (true, false, true) => {
            let allocation = if alloc == "new" {
                format!("new {}", structure.type_name())
            } else {
                format!("( {} ) malloc( sizeof( {} ) )", structure.pointer_type(), structure.type_name())
            };
            vec![format!("{target} = {allocation};"), format!("*{target} = {expr};")]
        }
        _ => vec![format!("{expr};")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::NormalizeCtx;
    use crate::tree::Node;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn scope(v: serde_json::Value) -> Scope {
        Scope::load(Node::from_value(&v).unwrap(), &NormalizeCtx::default()).unwrap()
    }

    fn backend() -> CppBackend {
        CppBackend::new(GeneratorConfig::default())
    }

    fn file<'f>(files: &'f [GeneratedFile], name: &str) -> &'f GeneratedFile {
        files.iter().find(|f| f.name == name).unwrap()
    }

    #[test]
    fn header_layout() {
        let s = scope(json!({
            "classes": [{
                "name": "Point", "namespace": "geo", "type": "struct",
                "includes": "point.h",
                "equivalent-struct": { "name": "point", "members": [{ "name": "x", "type": "int" }] },
                "constants": [{ "name": "ORIGIN", "type": "int", "value": 0 }],
                "functions": [{
                    "name": "getX", "return": { "type": "int" },
                    "wrapped-function": { "name": "point_x", "params": [{ "value": "equivalent-struct-pointer" }], "return": { "type": "int" } }
                }]
            }]
        }));
        let files = backend().generate(&s);
        assert_eq!(
            file(&files, "Point.hpp").lines,
            vec![
                "#ifndef POINT_HPP",
                "#define POINT_HPP",
                "",
                "#include <point.h>",
                "",
                "namespace geo {",
                "",
                "  class Point {",
                "  public:",
                "    static const int ORIGIN;",
                "",
                "    struct point equivalent;",
                "",
                "    Point( struct point *equivalent );",
                "    Point( struct point equivalent );",
                "    Point( int x );",
                "    int getX( void );",
                "  };",
                "",
                "}",
                "",
                "#endif /* POINT_HPP */",
            ]
        );
        let source = file(&files, "Point.cpp").lines.join("\n");
        assert!(source.contains("  const int Point::ORIGIN = 0;"));
        assert!(source.contains("  Point::Point( struct point *equivalent ) {\n    this->equivalent = *equivalent;\n  }"));
        assert!(source.contains("  Point::Point( struct point equivalent ) {\n    this->equivalent = equivalent;\n  }"));
        assert!(source.contains("    this->equivalent.x = x;"));
        assert!(source.contains("  int Point::getX( void ) {\n    return point_x( &this->equivalent );\n  }"));
    }

    #[test]
    fn error_checks_hold_and_test_the_result() {
        let s = scope(json!({
            "classes": [{
                "name": "File", "namespace": "io", "type": "pointer", "equivalent-struct": { "name": "file" },
                "functions": [{
                    "name": "read", "return": { "type": "int" },
                    "wrapped-function": {
                        "name": "file_read",
                        "params": [{ "value": "equivalent-struct-pointer" }],
                        "return": { "type": "int" },
                        "error-check": {
                            "rules": [{ "left-expression": "return-value", "condition": "less-than", "right-expression": 0 }],
                            "error-action": { "name": "throw-exception", "constructor": { "name": "ReadError", "params": [{ "value": "return-value" }] } }
                        }
                    }
                }]
            }]
        }));
        let files = backend().generate(&s);
        let source = file(&files, "File.cpp").lines.join("\n");
        assert!(source.contains(
            "    int return_val = file_read( this->equivalent );\n    if( return_val < 0 ) {\n      throw ReadError( return_val );\n    }\n    return return_val;"
        ));
    }

    #[test]
    fn wrapped_code_holds_and_checks_its_result() {
        let s = scope(json!({
            "classes": [{
                "name": "Buffer", "namespace": "io", "type": "pointer", "equivalent-struct": { "name": "buffer" },
                "functions": [{
                    "name": "fill", "return": { "type": "int" },
                    "wrapped-code": {
                        "lines": ["return-value = buffer_fill( this->equivalent, 0 );"],
                        "return": { "type": "int" },
                        "error-check": {
                            "rules": [{ "left-expression": "return-value", "condition": "less-than", "right-expression": 0 }],
                            "error-action": { "name": "throw-exception", "constructor": { "name": "FillError", "includes": "errors.hpp" } }
                        }
                    }
                }]
            }]
        }));
        let files = backend().generate(&s);
        let source = file(&files, "Buffer.cpp").lines.join("\n");
        assert!(source.contains("#include <errors.hpp>"));
        assert!(source.contains(
            "  int Buffer::fill( void ) {\n    int return_val;\n    return_val = buffer_fill( this->equivalent, 0 );\n    if( return_val < 0 ) {\n      throw FillError();\n    }\n    return return_val;\n  }"
        ));
    }

    #[test]
    fn pointer_wrappers_copy_structs_passed_by_value() {
        let s = scope(json!({
            "classes": [{
                "name": "Pair", "namespace": "n", "type": "pointer",
                "equivalent-struct": { "name": "pair", "members": [{ "name": "a", "type": "int" }, { "name": "b", "type": "int" }] }
            }]
        }));
        let files = backend().generate(&s);
        assert!(file(&files, "Pair.hpp").lines.contains(&"    Pair( struct pair equivalent );".to_string()));
        let source = file(&files, "Pair.cpp").lines.join("\n");
        assert!(source.contains(
            "  Pair::Pair( struct pair equivalent ) {\n    this->equivalent = new struct pair;\n    *this->equivalent = equivalent;\n  }"
        ));
    }

    #[test]
    fn variadic_functions_use_va_list() {
        let s = scope(json!({
            "classes": [{
                "name": "Log", "namespace": "io", "equivalent-struct": { "name": "log" },
                "functions": [{
                    "name": "print",
                    "params": [{ "name": "format", "type": "const char *" }, { "name": "...", "type": "..." }],
                    "wrapped-function": { "name": "log_vprint", "params": [{ "value": "equivalent-struct-pointer" }, { "name": "format" }, { "value": "..." }] }
                }]
            }]
        }));
        let files = backend().generate(&s);
        let header = file(&files, "Log.hpp").lines.join("\n");
        assert!(header.contains("void print( const char *format, ... );"));
        let source = file(&files, "Log.cpp").lines.join("\n");
        assert!(source.contains("#include <cstdarg>"));
        assert!(source.contains(
            "    va_list variadic_args;\n    va_start( variadic_args, format );\n    log_vprint( &this->equivalent, format, variadic_args );\n    va_end( variadic_args );"
        ));
    }

    #[test]
    fn enums_always_have_explicit_values() {
        let s = scope(json!({
            "enums": [{
                "name": "Color", "namespace": "paint",
                "elements": [{ "name": "RED" }, { "name": "GREEN", "value": 10 }, { "name": "BLUE" }]
            }]
        }));
        let files = backend().generate(&s);
        let header = file(&files, "Color.hpp").lines.join("\n");
        assert!(header.contains("  enum class Color {\n    RED = 1,\n    GREEN = 10,\n    BLUE = 3\n  };"));
    }

    #[test]
    fn cmake_lists_sources_and_libraries() {
        let s = scope(json!({
            "name": "geo",
            "classes": [{
                "name": "Point", "namespace": "geo", "libraries": "geo", "equivalent-struct": { "name": "point" }
            }]
        }));
        let files = backend().generate(&s);
        assert_eq!(files.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(), vec!["Point.hpp", "Point.cpp", "CMakeLists.txt"]);
        let cmake = file(&files, "CMakeLists.txt").lines.join("\n");
        assert!(cmake.contains("add_library( geo SHARED\n  Point.cpp\n)"));
        assert!(cmake.contains("target_link_libraries( geo geo )"));
        assert!(cmake.contains("install( FILES\n  Point.hpp\n  DESTINATION include\n)"));
    }

    #[test]
    fn storing_native_results() {
        let s = scope(json!({
            "classes": [
                { "name": "P", "namespace": "n", "type": "pointer", "equivalent-struct": { "name": "p" } },
                { "name": "V", "namespace": "n", "type": "struct", "equivalent-struct": { "name": "v" } }
            ]
        }));
        let p = s.class("P").unwrap();
        let v = s.class("V").unwrap();
        assert_eq!(store_equivalent(p, "this->equivalent", "mk()", "struct p *", "new"), vec!["this->equivalent = mk();"]);
        assert_eq!(
            store_equivalent(p, "this->equivalent", "mk()", "struct p", "new"),
            vec!["this->equivalent = new struct p;", "*this->equivalent = mk();"]
        );
        assert_eq!(store_equivalent(v, "this->equivalent", "mk()", "struct v *", "new"), vec!["this->equivalent = *mk();"]);
        assert_eq!(store_equivalent(v, "this->equivalent", "mk()", "int", "new"), vec!["mk();"]);
    }
}
