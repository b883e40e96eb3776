use crate::error::Result;
use crate::spec::wrapped::CallSpec;
use crate::spec::{Fields, MapBuilder, NormalizeCtx, SpecNode};
use crate::tree::Node;

/// The only action kind currently understood.
pub const THROW_EXCEPTION: &str = "throw-exception";

/// What generated code does when an error check fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSpec {
    /// Construct an exception object and throw it.
    Throw(CallSpec),
    /// Throw an already formed expression.
    ThrowValue(String),
}

impl ActionSpec {
    pub fn includes(&self) -> Vec<String> {
        match self {
            ActionSpec::Throw(call) => call.includes(),
            ActionSpec::ThrowValue(_) => Vec::new(),
        }
    }

    /// A short human description of the failure, used where exceptions
    /// cannot be thrown.
    pub fn message(&self) -> &str {
        match self {
            ActionSpec::Throw(call) => &call.name,
            ActionSpec::ThrowValue(value) => value,
        }
    }
}

impl SpecNode for ActionSpec {
    fn from_node(node: &Node, ctx: &NormalizeCtx) -> Result<Self> {
        let fields = Fields::of(node, "error action")?;
        fields.only(&["name", "constructor", "value"])?;
        let name = fields.required_string("name")?;
        if name != THROW_EXCEPTION {
            return Err(fields.invalid("name", format!("unknown action '{name}'")));
        }
        fields.exclusive("constructor", "value")?;
        if let Some(value) = fields.literal("value")? {
            return Ok(ActionSpec::ThrowValue(value));
        }
        fields.require(&["constructor"])?;
        match fields.get("constructor") {
            Some(constructor) => {
                let c = Fields::of(constructor, "exception constructor")?;
                c.only(&["name", "params", "includes"])?;
                Ok(ActionSpec::Throw(CallSpec::from_fields(&c, ctx)?))
            }
            None => Err(fields.invalid("constructor", "missing")),
        }
    }

    fn to_node(&self) -> Node {
        let out = MapBuilder::new().str("name", THROW_EXCEPTION);
        match self {
            ActionSpec::Throw(call) => out
                .node(
                    "constructor",
                    MapBuilder::new()
                        .str("name", call.name.clone())
                        .list("params", &call.args, |a| a.to_node())
                        .strings("includes", &call.includes)
                        .build(),
                )
                .build(),
            ActionSpec::ThrowValue(value) => out.str("value", value.clone()).build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpecError;
    use serde_json::json;

    fn action(v: serde_json::Value) -> Result<ActionSpec> {
        ActionSpec::from_node(&Node::from_value(&v).unwrap(), &NormalizeCtx::default())
    }

    #[test]
    fn constructor_and_value_are_exclusive() {
        let err = action(json!({ "name": "throw-exception", "constructor": { "name": "E" }, "value": "e" })).unwrap_err();
        assert!(matches!(err, SpecError::ConflictingKeys { .. }));
        assert!(matches!(action(json!({ "name": "throw-exception" })), Err(SpecError::MissingRequiredKey { .. })));
    }

    #[test]
    fn unknown_action_names_are_rejected() {
        assert!(matches!(action(json!({ "name": "abort", "value": "1" })), Err(SpecError::InvalidKey { .. })));
    }

    #[test]
    fn throw_with_constructor() {
        let a = action(json!({
            "name": "throw-exception",
            "constructor": { "name": "IoError", "params": [{ "value": "return-value" }], "includes": "io_error.hpp" }
        }))
        .unwrap();
        assert_eq!(a.message(), "IoError");
        assert_eq!(a.includes(), vec!["io_error.hpp"]);
    }
}
