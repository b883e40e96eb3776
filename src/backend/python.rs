//! CPython extension module: a single C source defining one extension type
//! per class plus `IntEnum`s, and a setuptools build script.
//!
//! Variadic functions have no C-level equivalent in the extension and are
//! skipped with a warning. `wrapped-code` lines are pasted into the
//! trampoline with `self` as the receiver.
use std::borrow::Cow;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::backend::cpp::store_equivalent;
use crate::backend::{Backend, GeneratedFile, push, push_all};
use crate::config::GeneratorConfig;
use crate::names;
use crate::resolve::{self, RETURN_VALUE, Receiver, resolve_type, typed_variable};
use crate::spec::rule::render_all;
use crate::spec::{
    ActionSpec, ClassSpec, ConstantSpec, EnumSpec, FactoryArm, FunctionSpec, Implementation, ParamSpec,
    RETURN_VALUE_KEYWORD, RenderCtx, Scope, Synthesized, TypeSpec, WrappedCodeSpec, dedup,
};
use crate::synth;

pub struct PythonBackend {
    config: GeneratorConfig,
}

impl PythonBackend {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn module_name(&self, scope: &Scope) -> String {
        let name = self.config.module_name.as_deref().or_else(|| scope.module_name()).unwrap_or("wrapper");
        names::c_identifier(name)
    }

    fn module_source(&self, scope: &Scope) -> Vec<String> {
        let module = self.module_name(scope);
        let mut out = vec![
            "#define PY_SSIZE_T_CLEAN".to_string(),
            "#include <Python.h>".to_string(),
            "#include <structmember.h>".to_string(),
            "#include <stdlib.h>".to_string(),
            String::new(),
        ];
        let includes = dedup(
            scope
                .classes
                .iter()
                .flat_map(|c| c.definition_includes())
                .chain(scope.enums.iter().flat_map(EnumSpec::all_includes)),
        );
        if !includes.is_empty() {
            out.extend(includes.iter().map(|i| format!("#include <{i}>")));
            out.push(String::new());
        }

        // `equivalent` sits right after the head so a subclass sharing its
        // parent's struct keeps it at the parent's offset.
        for class in &scope.classes {
            out.push("typedef struct {".into());
            push(&mut out, 1, "PyObject_HEAD");
            push(&mut out, 1, format!("{};", class.equivalent_declaration()));
            for constant in layout_constants(scope, class) {
                push(&mut out, 1, format!("PyObject *{};", constant.name));
            }
            out.push(format!("}} {};", object_struct(class)));
            out.push(String::new());
        }
        for class in &scope.classes {
            out.push(format!("static PyTypeObject {};", type_object(class)));
        }
        out.push(String::new());
        if !scope.classes.is_empty() {
            out.extend(wrap_helpers(scope));
        }

        let bodies: Vec<Vec<String>> = scope
            .classes
            .par_iter()
            .map(|class| ClassWriter { backend: self, scope, class, functions: synth::functions(class, scope) }.definition())
            .collect();
        out.extend(bodies.into_iter().flatten());

        out.extend(self.module_init(scope, &module));
        out
    }

    fn module_init(&self, scope: &Scope, module: &str) -> Vec<String> {
        let mut out = vec![
            format!("static PyModuleDef {module}_module = {{"),
            "  PyModuleDef_HEAD_INIT,".to_string(),
            format!("  .m_name = \"{module}\","),
            "  .m_doc = NULL,".to_string(),
            "  .m_size = -1,".to_string(),
            "};".to_string(),
            String::new(),
            "PyMODINIT_FUNC".to_string(),
            format!("PyInit_{module}( void ) {{"),
            "  PyObject *m;".to_string(),
        ];
        if !scope.enums.is_empty() {
            push(&mut out, 1, "PyObject *enum_module;");
            push(&mut out, 1, "PyObject *int_enum;");
            push(&mut out, 1, "PyObject *members;");
            push(&mut out, 1, "PyObject *enum_type;");
        }
        out.push(String::new());
        for class in &scope.classes {
            push(&mut out, 1, format!("if( PyType_Ready( &{} ) < 0 ) {{", type_object(class)));
            push(&mut out, 2, "return NULL;");
            push(&mut out, 1, "}");
        }
        out.push(String::new());
        push(&mut out, 1, format!("m = PyModule_Create( &{module}_module );"));
        push(&mut out, 1, "if( m == NULL ) {");
        push(&mut out, 2, "return NULL;");
        push(&mut out, 1, "}");
        for class in &scope.classes {
            let ty = type_object(class);
            out.push(String::new());
            push(&mut out, 1, format!("Py_INCREF( &{ty} );"));
            push(&mut out, 1, format!("if( PyModule_AddObject( m, \"{}\", ( PyObject * ) &{ty} ) < 0 ) {{", class.name));
            push(&mut out, 2, format!("Py_DECREF( &{ty} );"));
            push(&mut out, 2, "Py_DECREF( m );");
            push(&mut out, 2, "return NULL;");
            push(&mut out, 1, "}");
        }
        if !scope.enums.is_empty() {
            out.push(String::new());
            push(&mut out, 1, "enum_module = PyImport_ImportModule( \"enum\" );");
            push(&mut out, 1, "if( enum_module == NULL ) {");
            push(&mut out, 2, "Py_DECREF( m );");
            push(&mut out, 2, "return NULL;");
            push(&mut out, 1, "}");
            push(&mut out, 1, "int_enum = PyObject_GetAttrString( enum_module, \"IntEnum\" );");
            push(&mut out, 1, "Py_DECREF( enum_module );");
            push(&mut out, 1, "if( int_enum == NULL ) {");
            push(&mut out, 2, "Py_DECREF( m );");
            push(&mut out, 2, "return NULL;");
            push(&mut out, 1, "}");
            for e in &scope.enums {
                out.push(String::new());
                push_all(&mut out, 1, enum_definition(e));
            }
            push(&mut out, 1, "Py_DECREF( int_enum );");
        }
        out.push(String::new());
        push(&mut out, 1, "return m;");
        out.push("}".into());
        out
    }
}

impl Backend for PythonBackend {
    fn generate_sources(&self, scope: &Scope) -> Vec<GeneratedFile> {
        let name = format!("{}.c", self.module_name(scope));
        let source = self.module_source(scope);
        debug!(file = %name, lines = source.len(), "generated Python extension source");
        vec![GeneratedFile::new(name, source)]
    }

    fn package_descriptor(&self, scope: &Scope, sources: &[GeneratedFile]) -> GeneratedFile {
        let module = self.module_name(scope);
        let quoted = |items: &[String]| items.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(", ");
        let sources: Vec<String> = sources.iter().map(|f| f.name.clone()).collect();
        let lines = vec![
            "from setuptools import setup, Extension".to_string(),
            String::new(),
            format!("{module}_module = Extension("),
            format!("    '{module}',"),
            format!("    sources=[{}],", quoted(&sources)),
            format!("    libraries=[{}],", quoted(&scope.libraries())),
            ")".to_string(),
            String::new(),
            "setup(".to_string(),
            format!("    name='{module}',"),
            format!("    version='{}',", scope.version),
            format!("    ext_modules=[{module}_module],"),
            ")".to_string(),
        ];
        GeneratedFile::new("setup.py", lines)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CLASSES
// ————————————————————————————————————————————————————————————————————————————

struct ClassWriter<'a> {
    backend: &'a PythonBackend,
    scope: &'a Scope,
    class: &'a ClassSpec,
    functions: Vec<Cow<'a, FunctionSpec>>,
}

/// Locals and `PyArg_ParseTuple` pieces for one parameter.
struct ParsedParam {
    declarations: Vec<String>,
    format: String,
    targets: Vec<String>,
    conversions: Vec<String>,
    optional: bool,
}

impl<'a> ClassWriter<'a> {
    fn definition(&self) -> Vec<String> {
        let class = self.class;
        let mut out = Vec::new();
        let mut methods = Vec::new();

        out.extend(self.alloc_function());
        out.push(String::new());
        out.extend(self.init_function());
        out.push(String::new());
        out.extend(self.dealloc_function());
        out.push(String::new());

        for function in self.functions.iter().filter(|f| !f.is_constructor() && !f.is_destructor()) {
            if function.is_variadic() {
                warn!(class = %class.name, function = %function.name, "variadic function skipped in the Python module");
                out.push(format!("/* {} is variadic and not available from Python */", function.name));
                out.push(String::new());
                continue;
            }
            out.extend(self.method(function));
            out.push(String::new());
            let flags = if function.is_static { "METH_VARARGS | METH_STATIC" } else { "METH_VARARGS" };
            let doc = function.doc_comment().map(|d| d.c_literal()).unwrap_or_default();
            methods.push(format!(
                "{{ \"{}\", ( PyCFunction ) {}, {}, \"{}\" }},",
                function.name,
                c_function(class, &function.name),
                flags,
                doc
            ));
        }

        out.push(format!("static PyMethodDef {}_methods[] = {{", class.name));
        push_all(&mut out, 1, methods);
        push(&mut out, 1, "{ NULL }");
        out.push("};".into());
        out.push(String::new());

        out.push(format!("static PyMemberDef {}_members[] = {{", class.name));
        for constant in &class.constants {
            let doc = constant.doc.as_ref().map(|d| d.c_literal()).unwrap_or_default();
            push(
                &mut out,
                1,
                format!(
                    "{{ \"{0}\", T_OBJECT_EX, offsetof( {1}, {0} ), READONLY, \"{2}\" }},",
                    constant.name,
                    object_struct(class),
                    doc
                ),
            );
        }
        push(&mut out, 1, "{ NULL }");
        out.push("};".into());
        out.push(String::new());

        out.push(format!("static PyTypeObject {} = {{", type_object(class)));
        push(&mut out, 1, "PyVarObject_HEAD_INIT( NULL, 0 )");
        push(&mut out, 1, format!(".tp_name = \"{}.{}\",", self.backend.module_name(self.scope), class.name));
        if let Some(doc) = &class.doc {
            push(&mut out, 1, format!(".tp_doc = \"{}\",", doc.c_literal()));
        }
        push(&mut out, 1, format!(".tp_basicsize = sizeof( {} ),", object_struct(class)));
        push(&mut out, 1, ".tp_itemsize = 0,");
        push(&mut out, 1, ".tp_flags = Py_TPFLAGS_DEFAULT | Py_TPFLAGS_BASETYPE,");
        if let Some(parent) = self.scope.parent_of(class) {
            push(&mut out, 1, format!(".tp_base = &{},", type_object(parent)));
        }
        push(&mut out, 1, format!(".tp_new = {},", c_function(class, "new")));
        push(&mut out, 1, format!(".tp_init = ( initproc ) {},", c_function(class, "init")));
        push(&mut out, 1, format!(".tp_dealloc = ( destructor ) {},", c_function(class, "dealloc")));
        push(&mut out, 1, format!(".tp_methods = {}_methods,", class.name));
        push(&mut out, 1, format!(".tp_members = {}_members,", class.name));
        out.push("};".into());
        out.push(String::new());
        out
    }

    fn alloc_function(&self) -> Vec<String> {
        let class = self.class;
        let mut out = vec![
            "static PyObject *".to_string(),
            format!("{}( PyTypeObject *type, PyObject *args, PyObject *kwds ) {{", c_function(class, "new")),
            format!("  {} *self;", object_struct(class)),
            format!("  self = ( {} * ) type->tp_alloc( type, 0 );", object_struct(class)),
        ];
        let inits = constant_inits(self.scope, class, "self");
        if !inits.is_empty() {
            push(&mut out, 1, "if( self != NULL ) {");
            push_all(&mut out, 2, inits);
            push(&mut out, 1, "}");
        }
        push(&mut out, 1, "return ( PyObject * ) self;");
        out.push("}".into());
        out
    }

    /// Constructors are told apart by the number of arguments; the first
    /// one declared for an arity wins.
    fn init_function(&self) -> Vec<String> {
        let class = self.class;
        let mut out = vec![
            "static int".to_string(),
            format!("{}( {} *self, PyObject *args, PyObject *kwds ) {{", c_function(class, "init"), object_struct(class)),
            "  Py_ssize_t arg_count = PyTuple_Size( args );".to_string(),
        ];
        let mut arities: Vec<usize> = Vec::new();
        for constructor in self.functions.iter().filter(|f| f.is_constructor()) {
            if constructor.is_variadic() {
                warn!(class = %class.name, "variadic constructor skipped in the Python module");
                continue;
            }
            // structs cannot be passed by value from Python
            if matches!(constructor.implementation, Implementation::Synthesized(Synthesized::FromValue)) {
                continue;
            }
            let arity = constructor.params.len();
            if arities.contains(&arity) {
                continue;
            }
            arities.push(arity);
            out.push(String::new());
            push(&mut out, 1, format!("if( arg_count == {arity} ) {{"));
            push_all(&mut out, 2, self.constructor_body(constructor));
            push(&mut out, 1, "}");
        }
        out.push(String::new());
        push(
            &mut out,
            1,
            format!("PyErr_SetString( PyExc_TypeError, \"no constructor of {} takes the given arguments\" );", class.name),
        );
        push(&mut out, 1, "return -1;");
        out.push("}".into());
        out
    }

    fn constructor_body(&self, constructor: &FunctionSpec) -> Vec<String> {
        let class = self.class;
        let parsed: Vec<ParsedParam> = constructor.params.iter().map(|p| self.parse_param(p)).collect();
        let mut out = Vec::new();
        if let Some(returns) = constructor.code_return() {
            out.push(format!("{};", typed_variable(&resolve_type(returns, class), RETURN_VALUE)));
        }
        out.extend(parse_block(&parsed, "-1"));
        match &constructor.implementation {
            Implementation::Synthesized(Synthesized::AdoptPointer) => {
                let value = if class.pointer_wrapper { "equivalent" } else { "*equivalent" };
                out.push(format!("self->equivalent = {value};"));
            }
            Implementation::Synthesized(Synthesized::MemberWise) => {
                if class.pointer_wrapper {
                    out.push(format!(
                        "self->equivalent = ( {} ) malloc( sizeof( {} ) );",
                        class.structure.pointer_type(),
                        class.structure.type_name()
                    ));
                }
                let access = if class.pointer_wrapper { "->" } else { "." };
                for member in &class.structure.members {
                    out.push(format!("self->equivalent{access}{0} = {0};", member.name));
                }
            }
            Implementation::Function(wrapped) => {
                let call = self.call(constructor, &wrapped.call);
                let native = resolve_type(&wrapped.returns, class);
                out.extend(store_equivalent(class, "self->equivalent", &call, &native, "malloc"));
                if let Some(check) = &wrapped.error_check {
                    let ctx = RenderCtx { variable: "self->equivalent", pointer: class.pointer_wrapper, return_value: "self->equivalent" };
                    out.extend(raise_block(&render_all(&check.rules, &ctx), &check.action, "-1"));
                }
            }
            Implementation::Code(code) => {
                out.extend(code_lines(code));
                if let Some(check) = &code.error_check {
                    let ctx = RenderCtx { variable: "self->equivalent", pointer: class.pointer_wrapper, return_value: RETURN_VALUE };
                    out.extend(raise_block(&render_all(&check.rules, &ctx), &check.action, "-1"));
                }
            }
            Implementation::Synthesized(Synthesized::FromValue | Synthesized::Factory(_)) => {}
        }
        out.push("return 0;".into());
        out
    }

    fn dealloc_function(&self) -> Vec<String> {
        let class = self.class;
        let mut out = vec![
            "static void".to_string(),
            format!("{}( {} *self ) {{", c_function(class, "dealloc"), object_struct(class)),
        ];
        if let Some(destructor) = &class.destructor {
            match &destructor.implementation {
                Implementation::Function(wrapped) => push(&mut out, 1, format!("{};", self.call(destructor, &wrapped.call))),
                Implementation::Code(code) => push_all(&mut out, 1, code_lines(code)),
                Implementation::Synthesized(_) => {}
            }
        }
        for constant in layout_constants(self.scope, class) {
            push(&mut out, 1, format!("Py_XDECREF( self->{} );", constant.name));
        }
        push(&mut out, 1, "Py_TYPE( self )->tp_free( ( PyObject * ) self );");
        out.push("}".into());
        out
    }

    fn method(&self, function: &FunctionSpec) -> Vec<String> {
        let class = self.class;
        let receiver = if function.is_static { "PyObject *unused".to_string() } else { format!("{} *self", object_struct(class)) };
        let mut out = vec![
            "static PyObject *".to_string(),
            format!("{}( {}, PyObject *args ) {{", c_function(class, &function.name), receiver),
        ];
        let body = match &function.implementation {
            Implementation::Synthesized(Synthesized::Factory(arms)) => self.factory_body(arms),
            Implementation::Function(_) => self.wrapped_body(function),
            Implementation::Code(code) => self.code_body(function, code),
            _ => vec!["Py_RETURN_NONE;".to_string()],
        };
        push_all(&mut out, 1, body);
        out.push("}".into());
        out
    }

    fn wrapped_body(&self, function: &FunctionSpec) -> Vec<String> {
        let Some(wrapped) = function.wrapped() else {
            return vec!["Py_RETURN_NONE;".into()];
        };
        let class = self.class;
        let parsed: Vec<ParsedParam> = function.params.iter().map(|p| self.parse_param(p)).collect();
        let native = resolve_type(&wrapped.returns, class);
        let holds = wrapped.returns_value();
        let mut out = Vec::new();
        if holds {
            out.push(format!("{};", typed_variable(&native, RETURN_VALUE)));
        }
        out.extend(parse_block(&parsed, "NULL"));

        let call = self.call(function, &wrapped.call);
        if holds {
            out.push(format!("{RETURN_VALUE} = {call};"));
        } else {
            out.push(format!("{call};"));
        }
        if let Some(check) = &wrapped.error_check {
            let ctx = RenderCtx { variable: "self->equivalent", pointer: class.pointer_wrapper, return_value: RETURN_VALUE };
            out.extend(raise_block(&render_all(&check.rules, &ctx), &check.action, "NULL"));
        }
        out.extend(self.return_statements(function, &wrapped.returns, holds));
        out
    }

    /// The author's lines between argument parsing and the return. Without a
    /// declared `return` the trampoline returns `None`.
    fn code_body(&self, function: &FunctionSpec, code: &WrappedCodeSpec) -> Vec<String> {
        let class = self.class;
        let parsed: Vec<ParsedParam> = function.params.iter().map(|p| self.parse_param(p)).collect();
        let holds = code.returns_value();
        let mut out = Vec::new();
        if holds {
            out.push(format!("{};", typed_variable(&resolve_type(&code.returns, class), RETURN_VALUE)));
        }
        out.extend(parse_block(&parsed, "NULL"));
        out.extend(code_lines(code));
        if let Some(check) = &code.error_check {
            let ctx = RenderCtx { variable: "self->equivalent", pointer: class.pointer_wrapper, return_value: RETURN_VALUE };
            out.extend(raise_block(&render_all(&check.rules, &ctx), &check.action, "NULL"));
        }
        out.extend(self.return_statements(function, &code.returns, holds));
        out
    }

    /// Converts the held result into a Python object.
    fn return_statements(&self, function: &FunctionSpec, native: &TypeSpec, holds: bool) -> Vec<String> {
        let class = self.class;
        let declared = &function.returns.ty;
        if declared.is_self_reference() && !function.is_static {
            return vec!["Py_INCREF( self );".into(), "return ( PyObject * ) self;".into()];
        }
        if declared.is_void() || !holds {
            return vec!["Py_RETURN_NONE;".into()];
        }
        let native_text = resolve_type(native, class);
        let target = if declared.is_equivalent_struct() || declared.is_equivalent_pointer() {
            Some(class)
        } else {
            self.scope.class_for_type(declared)
        };
        match target {
            Some(target) => {
                let pointer = if target.structure.is_pointer_type(&native_text) {
                    RETURN_VALUE.to_string()
                } else if target.structure.is_value_type(&native_text) {
                    format!("&{RETURN_VALUE}")
                } else {
                    format!("( {} ) {}", target.structure.pointer_type(), RETURN_VALUE)
                };
                let wrap = if function.returns.overloaded && self.scope.is_factory(target) {
                    factory_helper(target)
                } else {
                    wrap_helper(target)
                };
                vec![format!("return {wrap}( {pointer} );")]
            }
            None => vec![format!("return {};", build_value(&native_text, RETURN_VALUE))],
        }
    }

    /// The static factory method: parses a pointer and dispatches.
    fn factory_body(&self, arms: &[FactoryArm]) -> Vec<String> {
        let class = self.class;
        let mut out = vec![
            "PyObject *equivalent_obj;".to_string(),
            format!("{};", class.structure.pointer_declaration("equivalent")),
            "if( !PyArg_ParseTuple( args, \"O\", &equivalent_obj ) ) {".to_string(),
            "  return NULL;".to_string(),
            "}".to_string(),
            format!("equivalent = ( {} ) PyLong_AsVoidPtr( equivalent_obj );", class.structure.pointer_type()),
        ];
        if arms.is_empty() {
            out.push(format!("return {}( equivalent );", wrap_helper(class)));
        } else {
            out.push(format!("return {}( equivalent );", factory_helper(class)));
        }
        out
    }

    fn call(&self, function: &FunctionSpec, call: &crate::spec::CallSpec) -> String {
        let scope = self.scope;
        let view = |p: &ParamSpec| match scope.class_for_type(&p.ty) {
            Some(c) => (format!("(( {} * ) {})", object_struct(c), p.name), format!("{} *", c.name)),
            None => (p.name.clone(), resolve_type(&p.ty, self.class)),
        };
        resolve::call_expression(call, function, self.class, scope, Receiver::SELF, &view)
    }

    fn parse_param(&self, param: &ParamSpec) -> ParsedParam {
        let class = self.class;
        let name = &param.name;
        if let Some(target) = self.scope.class_for_type(&param.ty) {
            return ParsedParam {
                declarations: vec![format!("PyObject *{name};")],
                format: "O!".into(),
                targets: vec![format!("&{}", type_object(target)), format!("&{name}")],
                conversions: Vec::new(),
                optional: false,
            };
        }
        let ty = resolve_type(&param.ty, class);
        match parse_code(&ty) {
            Some((code, local)) => {
                let local = local.map(str::to_string).unwrap_or_else(|| ty.clone());
                let declaration = match &param.default {
                    Some(default) => format!("{} = {};", typed_variable(&local, name), default),
                    None => format!("{};", typed_variable(&local, name)),
                };
                ParsedParam {
                    declarations: vec![declaration],
                    format: code.into(),
                    targets: vec![format!("&{name}")],
                    conversions: Vec::new(),
                    optional: param.default.is_some(),
                }
            }
            None => {
                let conversion = if resolve::is_pointer(&ty) {
                    format!("{name} = ( {ty} ) PyLong_AsVoidPtr( {name}_obj );")
                } else {
                    format!("{name} = ( {ty} ) PyLong_AsLong( {name}_obj );")
                };
                ParsedParam {
                    declarations: vec![format!("PyObject *{name}_obj;"), format!("{};", typed_variable(&ty, name))],
                    format: "O".into(),
                    targets: vec![format!("&{name}_obj")],
                    conversions: vec![conversion],
                    optional: false,
                }
            }
        }
    }
}

/// Wrapped code lines addressed to the extension object.
fn code_lines(code: &WrappedCodeSpec) -> Vec<String> {
    code.lines
        .iter()
        .map(|line| line.replace("this->equivalent", "self->equivalent").replace(RETURN_VALUE_KEYWORD, RETURN_VALUE))
        .collect()
}

/// Declarations, the `PyArg_ParseTuple` call and conversions. Trailing
/// parameters with defaults become optional.
fn parse_block(params: &[ParsedParam], failure: &str) -> Vec<String> {
    let mut out: Vec<String> = params.iter().flat_map(|p| p.declarations.iter().cloned()).collect();
    if params.is_empty() {
        return out;
    }
    let first_optional = params.iter().rposition(|p| !p.optional).map_or(0, |i| i + 1);
    let mut format = String::new();
    for (i, p) in params.iter().enumerate() {
        if i == first_optional && first_optional < params.len() {
            format.push('|');
        }
        format.push_str(&p.format);
    }
    let targets: Vec<String> = params.iter().flat_map(|p| p.targets.iter().cloned()).collect();
    out.push(format!("if( !PyArg_ParseTuple( args, \"{}\", {} ) ) {{", format, targets.join(", ")));
    out.push(format!("  return {failure};"));
    out.push("}".into());
    out.extend(params.iter().flat_map(|p| p.conversions.iter().cloned()));
    out
}

fn raise_block(condition: &str, action: &ActionSpec, failure: &str) -> Vec<String> {
    vec![
        format!("if( {condition} ) {{"),
        format!("  PyErr_SetString( PyExc_RuntimeError, \"{}\" );", crate::spec::doc::escape_c_string(action.message())),
        format!("  return {failure};"),
        "}".to_string(),
    ]
}

/// Module-level helpers giving every class a way to wrap a raw pointer,
/// and factory classes a dispatching variant.
fn wrap_helpers(scope: &Scope) -> Vec<String> {
    let mut out = Vec::new();
    for class in &scope.classes {
        out.push(format!("static PyObject *{}( {} );", wrap_helper(class), class.structure.pointer_declaration("equivalent")));
        if scope.is_factory(class) {
            out.push(format!("static PyObject *{}( {} );", factory_helper(class), class.structure.pointer_declaration("equivalent")));
        }
    }
    out.push(String::new());
    for class in &scope.classes {
        let value = if class.pointer_wrapper { "equivalent" } else { "*equivalent" };
        out.extend([
            "static PyObject *".to_string(),
            format!("{}( {} ) {{", wrap_helper(class), class.structure.pointer_declaration("equivalent")),
            format!("  {0} *result = ( {0} * ) {1}.tp_alloc( &{1}, 0 );", object_struct(class), type_object(class)),
            "  if( result == NULL ) {".to_string(),
            "    return NULL;".to_string(),
            "  }".to_string(),
            format!("  result->equivalent = {value};"),
        ]);
        push_all(&mut out, 1, constant_inits(scope, class, "result"));
        out.extend(["  return ( PyObject * ) result;".to_string(), "}".to_string(), String::new()]);
        if !scope.is_factory(class) {
            continue;
        }
        let arms = scope.factory_arms(class);
        let ctx = RenderCtx { variable: "equivalent", pointer: true, return_value: RETURN_VALUE };
        out.push("static PyObject *".into());
        out.push(format!("{}( {} ) {{", factory_helper(class), class.structure.pointer_declaration("equivalent")));
        for (i, arm) in arms.iter().enumerate() {
            let keyword = if i == 0 { "if" } else { "} else if" };
            push(&mut out, 1, format!("{keyword}( {} ) {{", render_all(&arm.rules, &ctx)));
            let child = scope.class(&arm.class).map(wrap_helper).unwrap_or_else(|| wrap_helper(class));
            push(&mut out, 2, format!("return {child}( equivalent );"));
        }
        if !arms.is_empty() {
            push(&mut out, 1, "}");
        }
        push(&mut out, 1, format!("return {}( equivalent );", wrap_helper(class)));
        out.push("}".into());
        out.push(String::new());
    }
    out
}

/// Constants stored in a class's object layout: inherited ones first, so a
/// subclass layout extends its parent's.
fn layout_constants<'s>(scope: &'s Scope, class: &'s ClassSpec) -> Vec<&'s ConstantSpec> {
    let mut chain = vec![class];
    let mut current = class;
    while let Some(parent) = scope.parent_of(current) {
        if chain.len() > scope.classes.len() || chain.iter().any(|c| c.name == parent.name) {
            break;
        }
        chain.push(parent);
        current = parent;
    }
    chain.into_iter().rev().flat_map(|c| c.constants.iter()).collect()
}

fn constant_inits(scope: &Scope, class: &ClassSpec, object: &str) -> Vec<String> {
    layout_constants(scope, class)
        .into_iter()
        .map(|c| {
            let owner = scope.classes.iter().find(|k| k.constants.contains(c)).unwrap_or(class);
            let ty = resolve_type(&c.ty, owner);
            format!("{object}->{} = {};", c.name, build_value(&ty, &c.value))
        })
        .collect()
}

fn enum_definition(e: &EnumSpec) -> Vec<String> {
    let values = e.effective_values();
    let format: String = std::iter::repeat_n("(si)", values.len()).collect();
    let args: Vec<String> = values.iter().map(|(name, value)| format!("\"{name}\", {value}")).collect();
    let mut build = format!("members = Py_BuildValue( \"[{format}]\"");
    if !args.is_empty() {
        build.push_str(&format!(", {}", args.join(", ")));
    }
    build.push_str(" );");
    vec![
        build,
        format!("enum_type = PyObject_CallFunction( int_enum, \"sO\", \"{}\", members );", e.name),
        "Py_XDECREF( members );".to_string(),
        format!("if( enum_type == NULL || PyModule_AddObject( m, \"{}\", enum_type ) < 0 ) {{", e.name),
        "  Py_XDECREF( enum_type );".to_string(),
        "  Py_DECREF( int_enum );".to_string(),
        "  Py_DECREF( m );".to_string(),
        "  return NULL;".to_string(),
        "}".to_string(),
    ]
}

fn object_struct(class: &ClassSpec) -> String {
    format!("{}_type_struct", class.name)
}

fn type_object(class: &ClassSpec) -> String {
    format!("{}_type", class.name)
}

fn c_function(class: &ClassSpec, name: &str) -> String {
    format!("{}_{}", class.name, name)
}

fn wrap_helper(class: &ClassSpec) -> String {
    format!("{}_wrap", class.name)
}

fn factory_helper(class: &ClassSpec) -> String {
    format!("{}_dispatch", class.name)
}

fn squash(ty: &str) -> String {
    ty.split_whitespace().collect()
}

/// `PyArg_ParseTuple` code for a C type, and the local type to parse into
/// when it differs.
fn parse_code(ty: &str) -> Option<(&'static str, Option<&'static str>)> {
    Some(match squash(ty).as_str() {
        "int" | "signedint" => ("i", None),
        "unsigned" | "unsignedint" => ("I", None),
        "long" | "longint" => ("l", None),
        "unsignedlong" => ("k", None),
        "longlong" => ("L", None),
        "unsignedlonglong" => ("K", None),
        "short" => ("h", None),
        "unsignedshort" => ("H", None),
        "char" => ("c", None),
        "unsignedchar" => ("b", None),
        "float" => ("f", None),
        "double" => ("d", None),
        "bool" | "_Bool" => ("p", Some("int")),
        "size_t" => ("n", Some("Py_ssize_t")),
        "char*" | "constchar*" => ("s", Some("const char *")),
        _ => return None,
    })
}

/// An expression building a Python object from a C value.
fn build_value(ty: &str, expr: &str) -> String {
    match squash(ty).as_str() {
        "bool" | "_Bool" => format!("PyBool_FromLong( {expr} )"),
        "size_t" => format!("PyLong_FromSize_t( {expr} )"),
        "char*" | "constchar*" => format!("Py_BuildValue( \"s\", {expr} )"),
        _ => match parse_code(ty) {
            Some((code, _)) => format!("Py_BuildValue( \"{code}\", {expr} )"),
            None if resolve::is_pointer(ty) => format!("PyLong_FromVoidPtr( ( void * ) {expr} )"),
            None => format!("PyLong_FromLong( ( long ) {expr} )"),
        },
    }
}
