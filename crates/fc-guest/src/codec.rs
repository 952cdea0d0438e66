//! Conversion between native values and words on the wire.
//!
//! A wire word is either an immediate (integers, the zero sentinel for unit)
//! or the offset of a region in shared memory holding the encoded bytes.

use crate::memory::{Memory, MemoryHandle};
use crate::value::{SemanticType, Value};
use crate::{Error, Result};
use serde_json::Value as Json;

/// Result of encoding one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    /// Carried in the word itself, nothing was written to memory.
    Immediate(u64),
    /// Stored in (or already living in) shared memory.
    Region(MemoryHandle),
}

impl Wire {
    /// The word handed to the host.
    pub fn word(self) -> u64 {
        match self {
            Wire::Immediate(word) => word,
            Wire::Region(handle) => handle.offset(),
        }
    }

    pub fn region(self) -> Option<MemoryHandle> {
        match self {
            Wire::Immediate(_) => None,
            Wire::Region(handle) => Some(handle),
        }
    }
}

/// Value codec over a borrowed arena.
pub struct Codec<'m, M: Memory + ?Sized> {
    memory: &'m mut M,
}

impl<'m, M: Memory + ?Sized> Codec<'m, M> {
    pub fn new(memory: &'m mut M) -> Self {
        Self { memory }
    }

    /// Encode a value, allocating at most one region.
    pub fn encode(&mut self, value: &Value) -> Result<Wire> {
        let handle = match value {
            Value::Str(s) => self.memory.alloc(s.as_bytes())?,
            Value::Bytes(bytes) => self.memory.alloc(bytes)?,
            Value::Object(map) => self.memory.alloc(&serde_json::to_vec(map)?)?,
            Value::Array(items) => self.memory.alloc(&serde_json::to_vec(items)?)?,
            Value::Enum(e) => self.memory.alloc(e.value().as_bytes())?,
            Value::Handle(handle) => *handle,
            Value::Int(i) => return Ok(Wire::Immediate(*i as u64)),
            Value::Unit => return Ok(Wire::Immediate(0)),
            Value::Float(_) | Value::Bool(_) => {
                return Err(Error::UnsupportedType(format!(
                    "{} has no wire mapping",
                    value.kind()
                )))
            }
        };
        Ok(Wire::Region(handle))
    }

    /// Decode a wire word as `ty`.
    ///
    /// `Ok(None)` means the word does not name a region: the value is absent.
    pub fn decode(&self, ty: &SemanticType, word: u64) -> Result<Option<Value>> {
        if let SemanticType::Integer = ty {
            return Ok(Some(Value::Int(word as i64)));
        }

        let Some(handle) = self.memory.find(word) else {
            return Ok(None);
        };

        let value = match ty {
            SemanticType::Utf8String => Value::Str(self.read_string(handle)?),
            SemanticType::ByteBuffer => Value::Bytes(self.memory.read(handle)?),
            SemanticType::JsonObject | SemanticType::JsonArray => {
                let json: Json = serde_json::from_str(&self.read_string(handle)?)?;
                Value::from_json(json)
            }
            SemanticType::Enumeration(schema) => {
                Value::Enum(schema.parse(&self.read_string(handle)?)?)
            }
            SemanticType::MemoryHandle => Value::Handle(handle),
            SemanticType::Integer => Value::Int(word as i64),
            SemanticType::Unit => return Ok(None),
        };
        Ok(Some(value))
    }

    fn read_string(&self, handle: MemoryHandle) -> Result<String> {
        Ok(String::from_utf8(self.memory.read(handle)?)?)
    }
}
