// Typed access to the untyped argument map of a tools/call request

use crate::error::ToolError;
use serde_json::{Map, Value};

/// Arguments of one invocation.
///
/// The host does not validate arguments against the tool's input schema;
/// each tool pulls out what it needs before touching any upstream client.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Map<String, Value>,
}

impl Arguments {
    /// Accepts an object or `null`/absent arguments.
    pub fn from_value(value: Option<Value>) -> Result<Self, ToolError> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::Object(values)) => Ok(Self { values }),
            Some(other) => Err(ToolError::InvalidArguments(format!(
                "expected an object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// The named argument as a string. Absent or non-string values are rejected.
    pub fn required_str(&self, name: &'static str) -> Result<&str, ToolError> {
        match self.values.get(name) {
            Some(Value::String(s)) => Ok(s.as_str()),
            _ => Err(ToolError::MissingArgument(name)),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
