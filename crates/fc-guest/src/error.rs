use crate::exports::Role;
use thiserror::Error;

/// Errors raised while marshalling values, dispatching exports or talking to the host.
#[derive(Debug, Error)]
pub enum Error {
    /// A value or target type has no wire mapping.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// The host named a role-scoped handler that was never registered.
    #[error("unknown {role} handler: {name}")]
    UnknownHandler { role: Role, name: String },

    /// The host addressed an export index past the end of the export table.
    #[error("export index {index} out of range ({len} exports registered)")]
    OutOfRangeExport { index: u32, len: usize },

    /// Business logic inside a registered function failed.
    #[error(transparent)]
    UserFunction(#[from] anyhow::Error),

    /// A shared call carried a different number of raw arguments than declared.
    #[error("export '{export}' takes {expected} arguments, got {got}")]
    Arity {
        export: String,
        expected: usize,
        got: usize,
    },

    /// A keyword argument does not match any declared parameter.
    #[error("'{export}' got an unexpected keyword argument '{name}'")]
    UnexpectedArgument { export: String, name: String },

    /// A required argument was not supplied.
    #[error("missing argument: {0}")]
    MissingArgument(String),

    /// An argument holds a value of the wrong kind.
    #[error("argument '{name}' is not a valid {expected}")]
    ArgumentType { name: String, expected: &'static str },

    /// A string does not name a variant of the enumeration.
    #[error("'{value}' is not a valid {enumeration}")]
    InvalidEnumValue { enumeration: String, value: String },

    /// The call input could not be used as keyword arguments.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The host sent a reply the protocol cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A handler name was registered twice within one role.
    #[error("duplicate {role} handler: {name}")]
    DuplicateName { role: Role, name: String },

    /// HTTP capability failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Memory region did not hold UTF-8 text.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding error.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl Error {
    /// Recover a bridge error that travelled through a handler as `anyhow::Error`.
    pub fn from_handler(err: anyhow::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(err) => err,
            Err(err) => Error::UserFunction(err),
        }
    }
}

/// Result type for fc-guest operations.
pub type Result<T> = std::result::Result<T, Error>;
