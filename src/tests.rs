use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use crate::tree::Node;
use crate::{Backend, CppBackend, GeneratedFile, GeneratorConfig, NormalizeCtx, PythonBackend, Scope, SpecError};

fn scope(doc: Value) -> Scope {
    crate::load_scope(&doc, &NormalizeCtx::default()).unwrap()
}

fn cpp(doc: Value) -> Vec<GeneratedFile> {
    CppBackend::new(GeneratorConfig::default()).generate(&scope(doc))
}

fn text<'f>(files: &'f [GeneratedFile], name: &str) -> String {
    files.iter().find(|f| f.name == name).map(|f| f.lines.join("\n")).unwrap()
}

fn shapes() -> Value {
    json!({
        "name": "geo",
        "classes": [
            {
                "name": "Shape", "namespace": "geo", "type": "pointer", "libraries": "geo",
                "includes": "shape.h", "equivalent-struct": { "name": "shape" }
            },
            {
                "name": "Circle", "namespace": "geo", "type": "pointer", "parent": { "name": "Shape" },
                "equivalent-struct": { "name": "shape", "rules": [{ "member-name": "kind", "condition": "equals", "value": 1 }] }
            },
            {
                "name": "Square", "namespace": "geo", "type": "pointer", "parent": { "name": "Shape" },
                "equivalent-struct": { "name": "shape", "rules": [{ "member-name": "kind", "condition": "equals", "value": 2 }] }
            }
        ]
    })
}

#[test]
fn pointer_wrapper_emits_header_and_source() {
    let s = scope(json!({
        "classes": [{
            "name": "File", "namespace": "io", "type": "pointer", "equivalent-struct": { "name": "file" },
            "destructor": { "wrapped-function": { "name": "file_close", "params": [{ "value": "equivalent-struct-pointer" }] } }
        }]
    }));
    let files = CppBackend::new(GeneratorConfig::default()).generate_sources(&s);
    assert_eq!(files.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(), vec!["File.hpp", "File.cpp"]);
    let header = text(&files, "File.hpp");
    assert!(header.contains("    struct file *equivalent;"));
    assert!(header.contains("    File( struct file *equivalent );"));
    assert!(header.contains("    ~File( void );"));
    let source = text(&files, "File.cpp");
    assert!(source.contains("  File::File( struct file *equivalent ) {\n    this->equivalent = equivalent;\n  }"));
    assert!(source.contains("  File::~File( void ) {\n    file_close( this->equivalent );\n  }"));
}

#[test]
fn returned_structs_are_wrapped_by_the_copying_constructor() {
    let files = cpp(json!({
        "classes": [{
            "name": "Point", "namespace": "geo", "type": "struct", "equivalent-struct": { "name": "point" },
            "functions": [{
                "name": "copy",
                "return": { "type": "Point" },
                "wrapped-function": {
                    "name": "point_copy",
                    "params": [{ "value": "equivalent-struct-pointer" }],
                    "return": { "type": "equivalent-struct" }
                }
            }]
        }]
    }));
    let header = text(&files, "Point.hpp");
    assert!(header.contains("    Point( struct point equivalent );"));
    assert!(header.contains("    Point copy( void );"));
    let source = text(&files, "Point.cpp");
    assert!(source.contains("  Point::Point( struct point equivalent ) {\n    this->equivalent = equivalent;\n  }"));
    assert!(source.contains("  Point Point::copy( void ) {\n    return Point( point_copy( &this->equivalent ) );\n  }"));
}

#[test]
fn wrapped_code_return_values_are_checked() {
    let files = cpp(json!({
        "classes": [{
            "name": "Socket", "namespace": "net", "type": "pointer", "equivalent-struct": { "name": "socket" },
            "functions": [{
                "name": "send",
                "params": [{ "name": "len", "type": "size_t" }],
                "return": { "type": "long" },
                "wrapped-code": {
                    "lines": ["return-value = socket_send( this->equivalent, len );"],
                    "return": { "type": "long" },
                    "error-check": {
                        "rules": [{ "left-expression": "return-value", "condition": "equals", "right-expression": -1 }],
                        "error-action": { "name": "throw-exception", "constructor": { "name": "SendError", "params": [{ "value": "return-value" }] } }
                    }
                }
            }]
        }]
    }));
    let source = text(&files, "Socket.cpp");
    assert!(source.contains(
        "  long Socket::send( size_t len ) {\n    long return_val;\n    return_val = socket_send( this->equivalent, len );\n    if( return_val == -1 ) {\n      throw SendError( return_val );\n    }\n    return return_val;\n  }"
    ));
    for file in &files {
        assert!(!file.contents().contains("return-value"), "return-value leaked into {}", file.name);
    }
}

#[test]
fn factory_builds_the_matching_child() {
    let files = cpp(shapes());
    let source = text(&files, "Shape.cpp");
    assert!(source.contains("#include \"Circle.hpp\"\n#include \"Square.hpp\""));
    assert!(source.contains("if( equivalent->kind == 1 ) {"));
    assert!(source.contains("  return new Circle( equivalent );"));
    assert!(source.contains("} else if( equivalent->kind == 2 ) {"));
    assert!(source.contains("  return new Square( equivalent );"));
    assert!(source.contains("  return new Shape( equivalent );"));
    assert!(text(&files, "Shape.hpp").contains("newShape("));

    let s = scope(shapes());
    let shape = s.class("Shape").unwrap();
    let native = |v: Value| Node::from_value(&v).unwrap().as_map().cloned().unwrap();
    assert_eq!(s.dispatch(shape, &native(json!({ "kind": 2 }))).name, "Square");
    assert_eq!(s.dispatch(shape, &native(json!({ "kind": 1 }))).name, "Circle");
    assert_eq!(s.dispatch(shape, &native(json!({ "kind": 7 }))).name, "Shape");
}

#[test]
fn children_initialize_their_parent() {
    let files = cpp(shapes());
    let source = text(&files, "Circle.cpp");
    assert!(source.contains("Circle::Circle( struct shape *equivalent ) : Shape( equivalent )"));
    let header = text(&files, "Circle.hpp");
    assert!(header.contains("class Circle : public Shape {"));
}

#[test]
fn self_reference_returns_the_receiver() {
    let files = cpp(json!({
        "classes": [{
            "name": "Point", "namespace": "geo", "equivalent-struct": { "name": "point" },
            "functions": [{
                "name": "scale",
                "params": [{ "name": "factor", "type": "int" }],
                "return": { "type": "self-reference" },
                "wrapped-function": { "name": "point_scale", "params": [{ "value": "equivalent-struct-pointer" }, { "name": "factor" }] }
            }]
        }]
    }));
    assert!(text(&files, "Point.hpp").contains("    Point& scale( int factor );"));
    let source = text(&files, "Point.cpp");
    assert!(source.contains("  Point& Point::scale( int factor ) {\n    point_scale( &this->equivalent, factor );\n    return *this;\n  }"));
    for file in &files {
        for keyword in ["self-reference", "equivalent-struct", "return-value"] {
            assert!(!file.contents().contains(keyword), "{keyword} leaked into {}", file.name);
        }
    }
}

#[test]
fn enum_values_count_from_position() {
    let s = scope(json!({
        "enums": [{
            "name": "Color", "namespace": "paint",
            "elements": [{ "name": "RED" }, { "name": "GREEN", "value": 10 }, { "name": "BLUE" }]
        }]
    }));
    let values: Vec<(String, String)> =
        s.enums[0].effective_values().into_iter().map(|(n, v)| (n.to_string(), v)).collect();
    assert_eq!(
        values,
        vec![("RED".into(), "1".into()), ("GREEN".into(), "10".into()), ("BLUE".into(), "3".into())]
    );
}

#[test]
fn templates_are_expanded_before_normalizing() {
    let doc = json!({
        "templates": [
            { "name": "geo-class", "value": { "namespace": "geo", "libraries": "geo" } },
            { "name": "xy", "value": [{ "name": "x", "type": "int" }, { "name": "y", "type": "int" }] }
        ],
        "classes": [{
            "name": "Point",
            "use-template": "geo-class",
            "equivalent-struct": { "name": "point", "members": [{ "use-template": "xy" }] }
        }]
    });
    let expanded = crate::expand(&doc).unwrap();
    assert!(expanded.get("templates").is_none());
    assert_eq!(
        expanded["classes"][0],
        json!({
            "name": "Point",
            "namespace": "geo",
            "libraries": "geo",
            "equivalent-struct": { "name": "point", "members": [{ "name": "x", "type": "int" }, { "name": "y", "type": "int" }] }
        })
    );
    let s = scope(doc);
    assert_eq!(s.classes[0].namespace, "geo");
    assert_eq!(s.classes[0].structure.members.len(), 2);
}

#[test]
fn normalizing_twice_changes_nothing() {
    let ctx = NormalizeCtx::default();
    let once = crate::normalize(&shapes(), &ctx).unwrap();
    let twice = crate::normalize(&once, &ctx).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn newer_spec_versions_are_rejected() {
    let doc = json!({
        "classes": [{ "name": "Point", "namespace": "geo", "version": "99.0", "equivalent-struct": { "name": "point" } }]
    });
    match crate::load_scope(&doc, &NormalizeCtx::default()) {
        Err(SpecError::UnsupportedVersion { found, .. }) => assert_eq!(found, "99.0"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn python_module_covers_the_scope() {
    let files = PythonBackend::new(GeneratorConfig::default()).generate(&scope(shapes()));
    assert_eq!(files.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(), vec!["geo.c", "setup.py"]);
    let source = text(&files, "geo.c");
    for class in ["Shape", "Circle", "Square"] {
        assert!(source.contains(&format!("static PyTypeObject {class}_type;")));
        assert!(source.contains(&format!("  if( PyModule_AddObject( m, \"{class}\", ( PyObject * ) &{class}_type ) < 0 ) {{")));
    }
    assert!(source.contains("    return Square_wrap( equivalent );"));
    assert!(text(&files, "setup.py").contains("    libraries=['geo'],"));
}
