use crate::context::Context;
use crate::value::{SemanticType, Value};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;

impl<'a> Context<'a> {
    pub fn input_bytes(&mut self) -> Result<Vec<u8>> {
        self.boundary().input()
    }

    pub fn input_str(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.input_bytes()?)?)
    }

    pub fn input_json<T: DeserializeOwned>(&mut self) -> Result<T> {
        Ok(serde_json::from_slice(&self.input_bytes()?)?)
    }

    /// Read the input buffer as `ty`. Unit reads nothing.
    pub fn input_as(&mut self, ty: &SemanticType) -> Result<Option<Value>> {
        let value = match ty {
            SemanticType::Unit => return Ok(None),
            SemanticType::Utf8String => Value::Str(self.input_str()?),
            SemanticType::ByteBuffer => Value::Bytes(self.input_bytes()?),
            SemanticType::JsonObject | SemanticType::JsonArray => {
                Value::from_json(serde_json::from_slice(&self.input_bytes()?)?)
            }
            SemanticType::Enumeration(schema) => Value::Enum(schema.parse(&self.input_str()?)?),
            SemanticType::Integer | SemanticType::MemoryHandle => {
                return Err(Error::UnsupportedType(format!(
                    "{ty} cannot be read from the input buffer"
                )))
            }
        };
        Ok(Some(value))
    }

    /// Write `value` to the output buffer. Unit writes nothing.
    pub fn output(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Unit => Ok(()),
            Value::Str(_) | Value::Bytes(_) | Value::Object(_) | Value::Array(_) | Value::Enum(_) => {
                if let Some(handle) = self.encode(value)?.region() {
                    self.boundary().set_output(handle);
                }
                Ok(())
            }
            other => Err(Error::UnsupportedType(format!(
                "{} cannot be written to the output buffer",
                other.kind()
            ))),
        }
    }

    /// Write `value` as JSON. Bare numbers are written as a JSON string of
    /// their decimal text.
    pub fn output_json<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let json = match serde_json::to_value(value)? {
            Json::Number(n) => Json::String(n.to_string()),
            other => other,
        };
        let handle = self.boundary().alloc(serde_json::to_string(&json)?.as_bytes())?;
        self.boundary().set_output(handle);
        Ok(())
    }
}
