//! The generic entry point the host calls with an export index.

use crate::boundary::Boundary;
use crate::config::BridgeConfig;
use crate::context::Context;
use crate::exports::{ExportEntry, ExportTable};
use crate::value::{Args, SemanticType, Value};
use crate::{Error, Result};
use log::{debug, error};
use serde_json::Value as Json;
use std::backtrace::Backtrace;
use std::fmt::Write as _;
use std::rc::Rc;

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    /// What the function returned, decoded to its declared return type for
    /// keyword calls.
    pub value: Value,
    /// Word returned to the host: the encoded result for shared calls, the
    /// integer result (or zero) for keyword calls.
    pub word: u64,
}

/// Resolves export indices and runs the target function.
pub struct Dispatcher {
    exports: Rc<ExportTable>,
    config: BridgeConfig,
}

impl Dispatcher {
    pub fn new(exports: ExportTable, config: BridgeConfig) -> Self {
        Self::from_shared(Rc::new(exports), config)
    }

    pub fn from_shared(exports: Rc<ExportTable>, config: BridgeConfig) -> Self {
        Self { exports, config }
    }

    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run export `index`.
    ///
    /// Shared calls decode `raw_args` positionally; keyword calls read one JSON
    /// object from the input buffer. Any failure is written to the host error
    /// channel before it is returned.
    pub fn dispatch(
        &self,
        boundary: &mut dyn Boundary,
        index: u32,
        shared: bool,
        raw_args: &[u64],
    ) -> Result<Dispatched> {
        debug!("dispatching export #{} (shared: {})", index, shared);
        match self.run(boundary, index, shared, raw_args) {
            Ok(dispatched) => Ok(dispatched),
            Err(err) => {
                report_error(boundary, &err);
                Err(err)
            }
        }
    }

    fn run(
        &self,
        boundary: &mut dyn Boundary,
        index: u32,
        shared: bool,
        raw_args: &[u64],
    ) -> Result<Dispatched> {
        let entry = self.exports.get(index)?;
        let mut ctx = Context::new(boundary, &self.exports, &self.config);

        let args = if shared {
            positional_args(&mut ctx, entry, raw_args)?
        } else {
            keyword_args(&mut ctx)?
        };

        let value = entry.call(&mut ctx, args)?;

        let wire = ctx.encode(&value)?;
        if let Some(handle) = wire.region() {
            ctx.boundary().set_output(handle);
        }
        if shared {
            return Ok(Dispatched {
                word: wire.word(),
                value,
            });
        }

        // A raw integer returned from a function that declares a memory type
        // is an offset into the arena.
        let decoded = match (entry.signature().return_type(), &value) {
            (Some(ty), Value::Int(raw)) if *ty != SemanticType::Integer => {
                Some(ctx.decode(ty, *raw as u64)?.unwrap_or(Value::Unit))
            }
            _ => None,
        };
        let value = decoded.unwrap_or(value);
        let word = match &value {
            Value::Int(i) => *i as u64,
            _ => 0,
        };
        Ok(Dispatched { value, word })
    }
}

fn positional_args(ctx: &mut Context<'_>, entry: &ExportEntry, raw_args: &[u64]) -> Result<Args> {
    let params = entry.signature().params();
    if params.len() != raw_args.len() {
        return Err(Error::Arity {
            export: entry.name().to_string(),
            expected: params.len(),
            got: raw_args.len(),
        });
    }

    let mut args = Args::new();
    for (param, raw) in params.iter().zip(raw_args) {
        let value = ctx.decode(&param.wire_type(), *raw)?.unwrap_or(Value::Unit);
        args.insert(param.name.clone(), value);
    }
    Ok(args)
}

fn keyword_args(ctx: &mut Context<'_>) -> Result<Args> {
    let input = ctx.boundary().input()?;
    let kwargs = if input.is_empty() && ctx.config().empty_input_as_empty_object {
        serde_json::Map::new()
    } else {
        match serde_json::from_slice::<Json>(&input)? {
            Json::Object(map) => map,
            other => {
                return Err(Error::InvalidInput(format!(
                    "expected a JSON object of keyword arguments, got {}",
                    json_kind(&other)
                )))
            }
        }
    };
    Ok(Args::from_json_object(kwargs))
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

/// Render an error as `"<message>:\n<stack trace>"`.
pub fn format_error(err: &Error) -> String {
    let mut trace = String::new();
    match err {
        Error::UserFunction(inner) => {
            for cause in inner.chain().skip(1) {
                let _ = writeln!(trace, "caused by: {cause}");
            }
            let _ = write!(trace, "{}", inner.backtrace());
        }
        other => {
            let mut source = std::error::Error::source(other);
            while let Some(cause) = source {
                let _ = writeln!(trace, "caused by: {cause}");
                source = cause.source();
            }
            let _ = write!(trace, "{}", Backtrace::capture());
        }
    }
    format!("{err}:\n{trace}")
}

/// Write a formatted error to the host error channel.
pub fn report_error(boundary: &mut dyn Boundary, err: &Error) {
    let text = format_error(err);
    error!("{}", err);
    match boundary.alloc(text.as_bytes()) {
        Ok(handle) => boundary.set_error(handle),
        Err(alloc_err) => error!("could not report error to host: {}", alloc_err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context as _;

    #[test]
    fn test_format_error_starts_with_message() {
        let err = Error::OutOfRangeExport { index: 3, len: 1 };
        let text = format_error(&err);
        assert!(text.starts_with("export index 3 out of range (1 exports registered):\n"));
    }

    #[test]
    fn test_format_error_lists_user_causes() {
        let inner: anyhow::Result<()> = Err(anyhow::anyhow!("disk full"));
        let err = Error::UserFunction(inner.context("saving order").unwrap_err());
        let text = format_error(&err);

        assert!(text.starts_with("saving order:\n"));
        assert!(text.contains("caused by: disk full"));
    }
}
