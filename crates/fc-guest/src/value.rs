use crate::memory::MemoryHandle;
use crate::{Error, Result};
use base64::{engine::general_purpose, Engine as _};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::fmt;

/// The declared type of a parameter or return value. Drives both encode and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    /// Signed integer carried in the wire word itself.
    Integer,
    /// UTF-8 text in a memory region.
    Utf8String,
    /// Raw bytes in a memory region.
    ByteBuffer,
    /// JSON object text in a memory region.
    JsonObject,
    /// JSON array text in a memory region.
    JsonArray,
    /// One of a fixed set of strings, stored like `Utf8String`.
    Enumeration(EnumSchema),
    /// A region passed through without copying or decoding.
    MemoryHandle,
    /// No value. Encodes to the zero sentinel.
    Unit,
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::Integer => f.write_str("integer"),
            SemanticType::Utf8String => f.write_str("string"),
            SemanticType::ByteBuffer => f.write_str("bytes"),
            SemanticType::JsonObject => f.write_str("JSON object"),
            SemanticType::JsonArray => f.write_str("JSON array"),
            SemanticType::Enumeration(schema) => write!(f, "enumeration {}", schema.name),
            SemanticType::MemoryHandle => f.write_str("memory handle"),
            SemanticType::Unit => f.write_str("unit"),
        }
    }
}

/// Name and allowed wire values of an enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumSchema {
    pub name: &'static str,
    pub variants: &'static [&'static str],
}

impl EnumSchema {
    /// Schema named `name` accepting exactly `variants`.
    pub const fn new(name: &'static str, variants: &'static [&'static str]) -> Self {
        Self { name, variants }
    }

    /// Construct a value of this enumeration from its wire string.
    pub fn parse(&self, raw: &str) -> Result<EnumValue> {
        if self.variants.contains(&raw) {
            Ok(EnumValue {
                schema: *self,
                value: raw.to_string(),
            })
        } else {
            Err(Error::InvalidEnumValue {
                enumeration: self.name.to_string(),
                value: raw.to_string(),
            })
        }
    }
}

/// Rust enums that cross the boundary as their underlying string value.
pub trait Enumeration: Sized {
    const SCHEMA: EnumSchema;

    fn wire_value(&self) -> &'static str;

    fn from_wire(raw: &str) -> Option<Self>;
}

/// A validated enumeration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    schema: EnumSchema,
    value: String,
}

impl EnumValue {
    /// Wrap a Rust enum variant.
    pub fn of<T: Enumeration>(variant: &T) -> Self {
        Self {
            schema: T::SCHEMA,
            value: variant.wire_value().to_string(),
        }
    }

    /// Schema the value was validated against.
    pub fn schema(&self) -> EnumSchema {
        self.schema
    }

    /// The underlying wire string.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Convert back to a Rust enum. Fails when `T` has no variant with this
    /// wire value.
    pub fn to<T: Enumeration>(&self) -> Result<T> {
        T::from_wire(&self.value).ok_or_else(|| Error::InvalidEnumValue {
            enumeration: T::SCHEMA.name.to_string(),
            value: self.value.clone(),
        })
    }
}

/// A native value that can cross the boundary.
///
/// `Float` and `Bool` only arrive through JSON keyword arguments; they have no
/// wire mapping of their own and the codec rejects them.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    Object(Map<String, Json>),
    Array(Vec<Json>),
    Enum(EnumValue),
    Handle(MemoryHandle),
}

impl Value {
    /// Serialize any value into an `Object` or `Array` value.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::from_json(serde_json::to_value(value)?))
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    /// Short name of the runtime kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Enum(_) => "enumeration",
            Value::Handle(_) => "memory handle",
        }
    }

    /// Convert parsed JSON. Objects and arrays stay JSON; scalars map to
    /// their native variant.
    pub fn from_json(json: Json) -> Self {
        match json {
            Json::Null => Value::Unit,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::Array(items),
            Json::Object(map) => Value::Object(map),
        }
    }

    /// Render the value for embedding in a JSON envelope.
    ///
    /// Byte buffers become base64 strings. Memory handles have no JSON form.
    pub fn to_json(&self) -> Result<Json> {
        Ok(match self {
            Value::Unit => Json::Null,
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .ok_or_else(|| Error::UnsupportedType(format!("non-finite float {f}")))?,
            Value::Bool(b) => Json::Bool(*b),
            Value::Str(s) => Json::String(s.clone()),
            Value::Bytes(bytes) => Json::String(encode_bytes_base64(bytes)),
            Value::Object(map) => Json::Object(map.clone()),
            Value::Array(items) => Json::Array(items.clone()),
            Value::Enum(e) => Json::String(e.value().to_string()),
            Value::Handle(_) => {
                return Err(Error::UnsupportedType(
                    "memory handle cannot be embedded in JSON".to_string(),
                ))
            }
        })
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<Map<String, Json>> for Value {
    fn from(map: Map<String, Json>) -> Self {
        Value::Object(map)
    }
}

impl From<Vec<Json>> for Value {
    fn from(items: Vec<Json>) -> Self {
        Value::Array(items)
    }
}

impl From<EnumValue> for Value {
    fn from(e: EnumValue) -> Self {
        Value::Enum(e)
    }
}

impl From<MemoryHandle> for Value {
    fn from(handle: MemoryHandle) -> Self {
        Value::Handle(handle)
    }
}

/// Encode bytes as base64 for transport inside JSON.
pub fn encode_bytes_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode base64 text produced by [`encode_bytes_base64`].
pub fn decode_bytes_base64(value: &str) -> Result<Vec<u8>> {
    Ok(general_purpose::STANDARD.decode(value)?)
}

/// Named arguments passed to a registered function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: BTreeMap<String, Value>,
}

impl Args {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyword arguments from a parsed JSON object.
    pub fn from_json_object(map: Map<String, Json>) -> Self {
        Self {
            values: map
                .into_iter()
                .map(|(name, json)| (name, Value::from_json(json)))
                .collect(),
        }
    }

    /// Builder form of [`Args::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set `name`, replacing any earlier value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Argument names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Like [`Args::get`], but a missing argument is an error.
    pub fn value(&self, name: &str) -> Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| Error::MissingArgument(name.to_string()))
    }

    /// Integer argument.
    pub fn int(&self, name: &str) -> Result<i64> {
        match self.value(name)? {
            Value::Int(i) => Ok(*i),
            _ => Err(type_error(name, "integer")),
        }
    }

    /// String argument. Enumeration values read as their wire string.
    pub fn str(&self, name: &str) -> Result<&str> {
        match self.value(name)? {
            Value::Str(s) => Ok(s),
            Value::Enum(e) => Ok(e.value()),
            _ => Err(type_error(name, "string")),
        }
    }

    /// Raw bytes; a string argument is read as base64.
    pub fn bytes(&self, name: &str) -> Result<Vec<u8>> {
        match self.value(name)? {
            Value::Bytes(bytes) => Ok(bytes.clone()),
            Value::Str(s) => decode_bytes_base64(s),
            _ => Err(type_error(name, "byte buffer")),
        }
    }

    /// Memory handle argument, as passed to shared exports.
    pub fn handle(&self, name: &str) -> Result<MemoryHandle> {
        match self.value(name)? {
            Value::Handle(handle) => Ok(*handle),
            _ => Err(type_error(name, "memory handle")),
        }
    }

    /// Enumeration argument, parsed from a string if it arrived as JSON.
    pub fn enumeration<T: Enumeration>(&self, name: &str) -> Result<T> {
        match self.value(name)? {
            Value::Enum(e) => e.to(),
            Value::Str(s) => T::SCHEMA.parse(s)?.to(),
            _ => Err(type_error(name, T::SCHEMA.name)),
        }
    }

    /// Deserialize a single argument.
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        Ok(serde_json::from_value(self.value(name)?.to_json()?)?)
    }

    /// Deserialize the whole argument set as one struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Json::Object(self.to_json_object()?))?)
    }

    /// Render as a JSON object for a keyword-argument envelope.
    pub fn to_json_object(&self) -> Result<Map<String, Json>> {
        self.values
            .iter()
            .map(|(name, value)| Ok((name.clone(), value.to_json()?)))
            .collect()
    }
}

fn type_error(name: &str, expected: &'static str) -> Error {
    Error::ArgumentType {
        name: name.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    enum Color {
        Red,
        Green,
    }

    impl Enumeration for Color {
        const SCHEMA: EnumSchema = EnumSchema::new("Color", &["red", "green"]);

        fn wire_value(&self) -> &'static str {
            match self {
                Color::Red => "red",
                Color::Green => "green",
            }
        }

        fn from_wire(raw: &str) -> Option<Self> {
            match raw {
                "red" => Some(Color::Red),
                "green" => Some(Color::Green),
                _ => None,
            }
        }
    }

    #[test]
    fn test_from_json_splits_integers_and_floats() {
        assert_eq!(Value::from_json(json!(5)), Value::Int(5));
        assert_eq!(Value::from_json(json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from_json(json!(null)), Value::Unit);
        assert!(matches!(Value::from_json(json!({"a": 1})), Value::Object(_)));
    }

    #[test]
    fn test_handle_has_no_json_form() {
        let err = Value::Handle(MemoryHandle::new(4, 2)).to_json().unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[test]
    fn test_bytes_travel_as_base64() {
        let json = Value::Bytes(b"hi".to_vec()).to_json().unwrap();
        assert_eq!(json, json!("aGk="));

        let args = Args::new().with("blob", "aGk=");
        assert_eq!(args.bytes("blob").unwrap(), b"hi");
    }

    #[test]
    fn test_enum_schema_rejects_unknown_variant() {
        let err = Color::SCHEMA.parse("blue").unwrap_err();
        assert!(matches!(err, Error::InvalidEnumValue { .. }));

        let value = EnumValue::of(&Color::Green);
        assert_eq!(value.value(), "green");
        assert_eq!(value.to::<Color>().unwrap(), Color::Green);
    }

    #[test]
    fn test_args_accessors() {
        let args = Args::from_json_object(
            json!({"count": 3, "name": "ada", "color": "red"})
                .as_object()
                .cloned()
                .unwrap(),
        );

        assert_eq!(args.int("count").unwrap(), 3);
        assert_eq!(args.str("name").unwrap(), "ada");
        assert_eq!(args.enumeration::<Color>("color").unwrap(), Color::Red);
        assert!(matches!(
            args.int("name"),
            Err(Error::ArgumentType { expected: "integer", .. })
        ));
        assert!(matches!(args.int("missing"), Err(Error::MissingArgument(_))));
    }

    #[test]
    fn test_args_deserialize_struct() {
        #[derive(Deserialize)]
        struct Order {
            id: i64,
            tags: Vec<String>,
        }

        let args = Args::new()
            .with("id", 9)
            .with("tags", vec![json!("a"), json!("b")]);
        let order: Order = args.deserialize().unwrap();

        assert_eq!(order.id, 9);
        assert_eq!(order.tags, vec!["a", "b"]);
    }
}
