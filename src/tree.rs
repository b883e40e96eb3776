//! Raw document tree.
//!
//! Specification documents arrive as `serde_json::Value`s. Before anything else
//! runs they are lifted into `Node`, which makes the two template constructs
//! (parameter placeholders and template uses) explicit variants instead of
//! maps that happen to carry a reserved key.
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{Result, SpecError};

/// Key marking a map as a template use.
pub const USE_KEYWORD: &str = "use-template";

/// Key marking a map as a template parameter placeholder.
pub const PARAM_KEYWORD: &str = "is-param";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Map(IndexMap<String, Node>),
    List(Vec<Node>),
    Scalar(Scalar),
    /// `{ is-param: true, name: <name> }`
    Param(String),
    Use(Use),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
}

/// A reference to a named template.
///
/// `siblings` holds the other keys of the map the use appeared in. An empty
/// sibling map is a direct use (the whole map is replaced); otherwise the
/// instantiated value is merged underneath the siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Use {
    pub template: String,
    pub params: Vec<(String, Node)>,
    pub siblings: IndexMap<String, Node>,
}

pub type NodeMap = IndexMap<String, Node>;

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Node {
    pub fn from_value(value: &Value) -> Result<Node> {
        Ok(match value {
            Value::Null => Node::Scalar(Scalar::Null),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Node::Scalar(Scalar::Int(i))
                } else {
                    Node::Scalar(Scalar::Float(OrderedFloat(n.as_f64().unwrap_or(f64::NAN))))
                }
            }
            Value::String(s) => Node::Scalar(Scalar::Str(s.clone())),
            Value::Array(xs) => Node::List(xs.iter().map(Node::from_value).collect::<Result<_>>()?),
            Value::Object(m) => from_object(m)?,
        })
    }

    pub fn to_value(&self) -> Value {
        match self {
            Node::Scalar(s) => s.to_value(),
            Node::List(xs) => Value::Array(xs.iter().map(Node::to_value).collect()),
            Node::Map(m) => Value::Object(map_to_object(m)),
            Node::Param(name) => {
                let mut out = Map::new();
                out.insert(PARAM_KEYWORD.into(), Value::Bool(true));
                out.insert("name".into(), Value::String(name.clone()));
                Value::Object(out)
            }
            Node::Use(u) => {
                let mut out = Map::new();
                let mut target = Map::new();
                target.insert("name".into(), Value::String(u.template.clone()));
                if !u.params.is_empty() {
                    let params = u.params.iter().map(|(name, value)| {
                        let mut p = Map::new();
                        p.insert("name".into(), Value::String(name.clone()));
                        p.insert("value".into(), value.to_value());
                        Value::Object(p)
                    }).collect();
                    target.insert("params".into(), Value::Array(params));
                }
                out.insert(USE_KEYWORD.into(), Value::Object(target));
                for (k, v) in &u.siblings {
                    out.insert(k.clone(), v.to_value());
                }
                Value::Object(out)
            }
        }
    }

    pub fn str(s: impl Into<String>) -> Node {
        Node::Scalar(Scalar::Str(s.into()))
    }

    pub fn bool(b: bool) -> Node {
        Node::Scalar(Scalar::Bool(b))
    }

    pub fn list_of<I, S>(items: I) -> Node
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Node::List(items.into_iter().map(|s| Node::str(s)).collect())
    }

    pub fn as_map(&self) -> Option<&NodeMap> {
        match self { Node::Map(m) => Some(m), _ => None }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self { Node::List(xs) => Some(xs), _ => None }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self { Node::Scalar(Scalar::Str(s)) => Some(s), _ => None }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self { Node::Scalar(Scalar::Bool(b)) => Some(*b), _ => None }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Scalar::Null))
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Source text of a scalar, the way it is pasted into generated code.
    pub fn literal(&self) -> Option<String> {
        match self {
            Node::Scalar(s) => s.literal(),
            _ => None,
        }
    }

    /// True if any template use remains anywhere in this subtree.
    pub fn has_uses(&self) -> bool {
        match self {
            Node::Use(_) => true,
            Node::Map(m) => m.values().any(Node::has_uses),
            Node::List(xs) => xs.iter().any(Node::has_uses),
            Node::Scalar(_) | Node::Param(_) => false,
        }
    }
}

impl Scalar {
    pub fn literal(&self) -> Option<String> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(b) => Some(b.to_string()),
            Scalar::Int(i) => Some(i.to_string()),
            Scalar::Float(f) => Some(f.0.to_string()),
            Scalar::Str(s) => Some(s.clone()),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::from(*i),
            Scalar::Float(f) => Value::from(f.0),
            Scalar::Str(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self { Node::str(s) }
}

impl From<String> for Node {
    fn from(s: String) -> Self { Node::str(s) }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn from_object(m: &Map<String, Value>) -> Result<Node> {
    if let Some(target) = m.get(USE_KEYWORD) {
        let mut siblings = IndexMap::new();
        for (k, v) in m {
            if k != USE_KEYWORD {
                siblings.insert(k.clone(), Node::from_value(v)?);
            }
        }
        let (template, params) = parse_use_target(target)?;
        return Ok(Node::Use(Use { template, params, siblings }));
    }

    if m.get(PARAM_KEYWORD).and_then(Value::as_bool) == Some(true) {
        return match m.get("name").and_then(Value::as_str) {
            Some(name) => Ok(Node::Param(name.to_string())),
            None => Err(SpecError::template("a template parameter must have a string 'name'")),
        };
    }

    let mut out = IndexMap::with_capacity(m.len());
    for (k, v) in m {
        out.insert(k.clone(), Node::from_value(v)?);
    }
    Ok(Node::Map(out))
}

fn parse_use_target(target: &Value) -> Result<(String, Vec<(String, Node)>)> {
    match target {
        Value::String(name) => Ok((name.clone(), Vec::new())),
        Value::Object(m) => {
            let name = match m.get("name") {
                Some(Value::String(name)) => name.clone(),
                Some(_) => return Err(SpecError::template(format!("the name of a '{USE_KEYWORD}' must be a string"))),
                None => return Err(SpecError::template(format!("a '{USE_KEYWORD}' map requires a 'name'"))),
            };
            let params = match m.get("params") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(xs)) => xs.iter().map(parse_use_param).collect::<Result<_>>()?,
                Some(_) => return Err(SpecError::template(format!("the params of '{USE_KEYWORD}' must be a list"))),
            };
            Ok((name, params))
        }
        _ => Err(SpecError::template(format!(
            "the value of '{USE_KEYWORD}' must be a template name or a map with a name"
        ))),
    }
}

fn parse_use_param(param: &Value) -> Result<(String, Node)> {
    let name = param
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| SpecError::template("every template parameter value requires a string 'name'"))?;
    let value = match param.get("value") {
        Some(v) => Node::from_value(v)?,
        None => Node::Scalar(Scalar::Null),
    };
    Ok((name.to_string(), value))
}

fn map_to_object(m: &NodeMap) -> Map<String, Value> {
    let mut out = Map::new();
    for (k, v) in m {
        out.insert(k.clone(), v.to_value());
    }
    out
}

// ------------------------------- Tests ------------------------------------ //
