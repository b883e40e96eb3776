//! Template expansion.
//!
//! Templates are named fragments of a document. A use of a template is
//! replaced by a copy of the template value with its parameter placeholders
//! filled in. Expansion is applied to the whole tree again and again until a
//! full pass changes nothing, so templates may use other templates.
//!
//! There is no cycle detection: a template that (directly or through others)
//! uses itself never converges.
use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Result, SpecError};
use crate::tree::{Node, NodeMap, Use};

/// Document key holding the template list.
pub const TEMPLATES_KEY: &str = "templates";

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    pub value: Node,
}

/// Templates of one document, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: IndexMap<String, Template>,
}

impl Template {
    pub fn from_node(node: &Node) -> Result<Template> {
        let map = node
            .as_map()
            .ok_or_else(|| SpecError::invalid("template", "templates", "each template must be a map"))?;
        let missing: Vec<String> = ["name", "value"]
            .iter()
            .filter(|k| !map.contains_key(**k))
            .map(|k| k.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SpecError::MissingRequiredKey { entity: "template".into(), keys: missing });
        }
        let name = map["name"]
            .as_str()
            .ok_or_else(|| SpecError::invalid("template", "name", "must be a string"))?;
        Ok(Template { name: name.to_string(), value: map["value"].clone() })
    }

    /// A copy of the template value with the given parameters substituted.
    pub fn instantiate(&self, params: &[(String, Node)]) -> Node {
        params
            .iter()
            .fold(self.value.clone(), |acc, (name, value)| replace_param(&acc, name, value))
    }
}

/// Replaces every placeholder named `name` in `node` with `value`.
pub fn replace_param(node: &Node, name: &str, value: &Node) -> Node {
    match node {
        Node::Param(p) if p == name => value.clone(),
        Node::Param(_) | Node::Scalar(_) => node.clone(),
        Node::List(xs) => Node::List(xs.iter().map(|x| replace_param(x, name, value)).collect()),
        Node::Map(m) => Node::Map(
            m.iter().map(|(k, v)| (k.clone(), replace_param(v, name, value))).collect(),
        ),
        Node::Use(u) => Node::Use(Use {
            template: u.template.clone(),
            params: u.params.iter().map(|(k, v)| (k.clone(), replace_param(v, name, value))).collect(),
            siblings: u.siblings.iter().map(|(k, v)| (k.clone(), replace_param(v, name, value))).collect(),
        }),
    }
}

impl TemplateSet {
    pub fn new(templates: Vec<Template>) -> Result<Self> {
        let mut out = IndexMap::new();
        for t in templates {
            if out.contains_key(&t.name) {
                return Err(SpecError::invalid("template", "name", format!("duplicate template '{}'", t.name)));
            }
            out.insert(t.name.clone(), t);
        }
        Ok(Self { templates: out })
    }

    pub fn from_list(node: Option<&Node>) -> Result<Self> {
        match node {
            None => Ok(Self::default()),
            Some(n) if n.is_null() => Ok(Self::default()),
            Some(Node::List(xs)) => Self::new(xs.iter().map(Template::from_node).collect::<Result<_>>()?),
            Some(_) => Err(SpecError::invalid("scope", TEMPLATES_KEY, "must be a list of templates")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Applies every template to the tree until a full pass makes no change.
    ///
    /// Fails if a use names a template that does not exist.
    pub fn expand(&self, mut tree: Node) -> Result<Node> {
        let mut passes = 0usize;
        loop {
            let mut changed = false;
            for template in self.templates.values() {
                tree = apply(template, tree, &mut changed)?;
            }
            passes += 1;
            if !changed {
                break;
            }
        }
        debug!(passes, templates = self.templates.len(), "template expansion converged");

        if let Some(name) = first_use(&tree) {
            return Err(SpecError::template(format!("unknown template '{name}'")));
        }
        Ok(tree)
    }
}

/// Expands a whole document: the `templates` list is consumed and removed,
/// everything else is expanded.
pub fn expand_document(doc: Node) -> Result<Node> {
    let Node::Map(mut map) = doc else {
        return Err(SpecError::invalid("scope", "document", "a specification document must be a map"));
    };
    let templates = TemplateSet::from_list(map.get(TEMPLATES_KEY))?;
    map.shift_remove(TEMPLATES_KEY);
    templates.expand(Node::Map(map))
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn apply(template: &Template, node: Node, changed: &mut bool) -> Result<Node> {
    match node {
        Node::Use(u) if u.template == template.name => {
            *changed = true;
            let siblings = apply_map(template, u.siblings, changed)?;
            let inst = template.instantiate(&u.params);
            if siblings.is_empty() {
                Ok(inst)
            } else {
                merge(siblings, inst)
            }
        }
        Node::Use(u) => {
            let mut params = Vec::with_capacity(u.params.len());
            for (k, v) in u.params {
                params.push((k, apply(template, v, changed)?));
            }
            let siblings = apply_map(template, u.siblings, changed)?;
            Ok(Node::Use(Use { template: u.template, params, siblings }))
        }
        Node::Map(m) => Ok(Node::Map(apply_map(template, m, changed)?)),
        Node::List(xs) => {
            let mut out = Vec::with_capacity(xs.len());
            for x in xs {
                match x {
                    Node::Use(u) if u.template == template.name && u.siblings.is_empty() => {
                        *changed = true;
                        match template.instantiate(&u.params) {
                            Node::List(items) => out.extend(items),
                            single => out.push(single),
                        }
                    }
                    other => out.push(apply(template, other, changed)?),
                }
            }
            Ok(Node::List(out))
        }
        leaf @ (Node::Scalar(_) | Node::Param(_)) => Ok(leaf),
    }
}

fn apply_map(template: &Template, m: NodeMap, changed: &mut bool) -> Result<NodeMap> {
    let mut out = NodeMap::with_capacity(m.len());
    for (k, v) in m {
        out.insert(k, apply(template, v, changed)?);
    }
    Ok(out)
}

/// Merges an instantiated value under the sibling keys of its use. Siblings win
/// on conflict and keep their position; other template keys are appended.
fn merge(siblings: NodeMap, inst: Node) -> Result<Node> {
    match inst {
        Node::Map(m) => Ok(Node::Map(overlay(siblings, m))),
        Node::Use(mut inner) => {
            inner.siblings = overlay(siblings, inner.siblings);
            Ok(Node::Use(inner))
        }
        _ => Err(SpecError::template(
            "a template used alongside other keys must instantiate to a map",
        )),
    }
}

fn overlay(top: NodeMap, bottom: NodeMap) -> NodeMap {
    let mut out = top;
    for (k, v) in bottom {
        out.entry(k).or_insert(v);
    }
    out
}

fn first_use(node: &Node) -> Option<&str> {
    match node {
        Node::Use(u) => Some(&u.template),
        Node::Map(m) => m.values().find_map(first_use),
        Node::List(xs) => xs.iter().find_map(first_use),
        Node::Scalar(_) | Node::Param(_) => None,
    }
}

// ------------------------------- Tests ------------------------------------ //
