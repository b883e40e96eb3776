//! Comparisons against native struct members or arbitrary expressions.
//!
//! Rules are rendered into generated boolean expressions (error checks and
//! factory dispatch) and can also be evaluated at generation time against a
//! sample of native field values.
use std::cmp::Ordering;
use std::fmt;

use ordered_float::OrderedFloat;

use crate::error::{Result, SpecError};
use crate::spec::{
    EQUIVALENT_POINTER_KEYWORD, EQUIVALENT_STRUCT_KEYWORD, Fields, MapBuilder, NormalizeCtx, RETURN_VALUE_KEYWORD, SpecNode,
};
use crate::tree::{Node, NodeMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSpec {
    Member { member: String, condition: Condition, value: String },
    Expression { left: String, condition: Condition, right: String },
}

/// How the native struct and the wrapped return value are spelled where a
/// rule is rendered.
#[derive(Debug, Clone, Copy)]
pub struct RenderCtx<'a> {
    pub variable: &'a str,
    /// `variable` holds a pointer to the struct rather than the struct.
    pub pointer: bool,
    pub return_value: &'a str,
}

impl Condition {
    pub const ALL: [Condition; 6] = [
        Condition::Equals,
        Condition::NotEquals,
        Condition::GreaterThan,
        Condition::GreaterThanEqual,
        Condition::LessThan,
        Condition::LessThanEqual,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Condition::Equals => "equals",
            Condition::NotEquals => "not-equals",
            Condition::GreaterThan => "greater-than",
            Condition::GreaterThanEqual => "greater-than-equal",
            Condition::LessThan => "less-than",
            Condition::LessThanEqual => "less-than-equal",
        }
    }

    pub fn operator(self) -> &'static str {
        match self {
            Condition::Equals => "==",
            Condition::NotEquals => "!=",
            Condition::GreaterThan => ">",
            Condition::GreaterThanEqual => ">=",
            Condition::LessThan => "<",
            Condition::LessThanEqual => "<=",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.keyword() == keyword)
    }

    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Condition::Equals => ordering == Ordering::Equal,
            Condition::NotEquals => ordering != Ordering::Equal,
            Condition::GreaterThan => ordering == Ordering::Greater,
            Condition::GreaterThanEqual => ordering != Ordering::Less,
            Condition::LessThan => ordering == Ordering::Less,
            Condition::LessThanEqual => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operator())
    }
}

impl RuleSpec {
    pub fn condition(&self) -> Condition {
        match self {
            RuleSpec::Member { condition, .. } | RuleSpec::Expression { condition, .. } => *condition,
        }
    }

    pub fn render(&self, ctx: &RenderCtx<'_>) -> String {
        match self {
            RuleSpec::Member { member, condition, value } => {
                let access = if ctx.pointer { "->" } else { "." };
                format!("{}{}{} {} {}", ctx.variable, access, member, condition, value)
            }
            RuleSpec::Expression { left, condition, right } => {
                format!("{} {} {}", substitute(left, ctx), condition, substitute(right, ctx))
            }
        }
    }

    /// Evaluates the rule against sample member values. Operands that are
    /// neither known members nor literals make the result unknown.
    pub fn evaluate(&self, native: &NodeMap) -> Option<bool> {
        let (left, condition, right) = match self {
            RuleSpec::Member { member, condition, value } => (native.get(member)?.literal()?, *condition, literal_operand(value)?),
            RuleSpec::Expression { left, condition, right } => (operand(left, native)?, *condition, operand(right, native)?),
        };
        Some(condition.holds(compare(&left, &right)))
    }
}

/// All rules joined with `&&`.
pub fn render_all(rules: &[RuleSpec], ctx: &RenderCtx<'_>) -> String {
    rules.iter().map(|r| r.render(ctx)).collect::<Vec<_>>().join(" && ")
}

/// All rules must hold. Any rule that is definitely false decides the result.
pub fn evaluate_all(rules: &[RuleSpec], native: &NodeMap) -> Option<bool> {
    let mut known = true;
    for rule in rules {
        match rule.evaluate(native) {
            Some(false) => return Some(false),
            Some(true) => {}
            None => known = false,
        }
    }
    known.then_some(true)
}

fn substitute(expression: &str, ctx: &RenderCtx<'_>) -> String {
    let pointer = if ctx.pointer { ctx.variable.to_string() } else { format!("&{}", ctx.variable) };
    let value = if ctx.pointer { format!("*{}", ctx.variable) } else { ctx.variable.to_string() };
    expression
        .replace(EQUIVALENT_POINTER_KEYWORD, &pointer)
        .replace(EQUIVALENT_STRUCT_KEYWORD, &value)
        .replace(RETURN_VALUE_KEYWORD, ctx.return_value)
}

fn operand(text: &str, native: &NodeMap) -> Option<String> {
    match native.get(text.trim()) {
        Some(node) => node.literal(),
        None => literal_operand(text),
    }
}

fn literal_operand(text: &str) -> Option<String> {
    let text = text.trim();
    if text.parse::<f64>().is_ok() {
        return Some(text.to_string());
    }
    let quoted = text.strip_prefix('"').and_then(|t| t.strip_suffix('"'));
    quoted.or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\''))).map(str::to_string)
}

fn compare(left: &str, right: &str) -> Ordering {
    match (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
        (Ok(l), Ok(r)) => OrderedFloat(l).cmp(&OrderedFloat(r)),
        _ => left.cmp(right),
    }
}

impl SpecNode for RuleSpec {
    fn from_node(node: &Node, _ctx: &NormalizeCtx) -> Result<Self> {
        let fields = Fields::of(node, "rule")?;
        let condition = |fields: &Fields<'_>| -> Result<Condition> {
            let keyword = fields.required_string("condition")?;
            Condition::from_keyword(&keyword)
                .ok_or_else(|| fields.invalid("condition", format!("'{keyword}' is not a known condition")))
        };
        if fields.has("member-name") {
            fields.only(&["member-name", "condition", "value"])?;
            fields.require(&["member-name", "condition", "value"])?;
            return Ok(RuleSpec::Member {
                member: fields.required_string("member-name")?,
                condition: condition(&fields)?,
                value: fields.literal("value")?.unwrap_or_default(),
            });
        }
        if fields.has("left-expression") {
            fields.only(&["left-expression", "condition", "right-expression"])?;
            fields.require(&["left-expression", "condition", "right-expression"])?;
            return Ok(RuleSpec::Expression {
                left: fields.literal("left-expression")?.unwrap_or_default(),
                condition: condition(&fields)?,
                right: fields.literal("right-expression")?.unwrap_or_default(),
            });
        }
        Err(SpecError::MissingRequiredKey {
            entity: fields.entity().to_string(),
            keys: vec!["member-name".into(), "left-expression".into()],
        })
    }

    fn to_node(&self) -> Node {
        match self {
            RuleSpec::Member { member, condition, value } => MapBuilder::new()
                .str("member-name", member.clone())
                .str("condition", condition.keyword())
                .str("value", value.clone())
                .build(),
            RuleSpec::Expression { left, condition, right } => MapBuilder::new()
                .str("left-expression", left.clone())
                .str("condition", condition.keyword())
                .str("right-expression", right.clone())
                .build(),
        }
    }
}
