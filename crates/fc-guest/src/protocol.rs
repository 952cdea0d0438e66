//! Guest-initiated requests to the host callback.
//!
//! A request with discriminant `D` is resent until the host answers with a
//! reply of the same `typ`. In between, the host may ask the guest to run
//! update or query handlers; their results go back as the next request.

use crate::context::Context;
use crate::exports::Role;
use crate::imports::HostImport;
use crate::value::{Args, SemanticType, Value};
use crate::{Error, Result};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use std::fmt;

/// The `typ` field of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discriminant {
    Compute,
    Timer,
    Signal,
    Query,
    Update,
}

impl Discriminant {
    pub fn as_str(self) -> &'static str {
        match self {
            Discriminant::Compute => "compute",
            Discriminant::Timer => "timer",
            Discriminant::Signal => "signal",
            Discriminant::Query => "query",
            Discriminant::Update => "update",
        }
    }
}

impl fmt::Display for Discriminant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request to the host callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub typ: Discriminant,
    /// JSON-encoded body; its shape depends on `typ`.
    pub payload: String,
}

impl Envelope {
    pub fn new(typ: Discriminant, payload: &Json) -> Self {
        Self {
            typ,
            payload: payload.to_string(),
        }
    }
}

/// A reply from the host callback.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HostReply {
    pub typ: String,
    /// Handler to run for nested `update`/`query` replies and named signals.
    #[serde(default)]
    pub name: Option<Json>,
    /// JSON-encoded keyword arguments for that handler.
    #[serde(default)]
    pub args: Option<Json>,
    /// Result of a terminal `compute` reply.
    #[serde(default)]
    pub ret: Option<Json>,
    /// Set on `signal` replies that ask the guest to re-check its condition.
    #[serde(default)]
    pub check_condition: bool,
    #[serde(default)]
    pub protocol_instance_id: Option<Json>,
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

impl HostReply {
    /// Name of the handler this reply asks for.
    pub fn handler_name(&self) -> Result<&str> {
        self.name
            .as_ref()
            .and_then(Json::as_str)
            .ok_or_else(|| Error::Protocol(format!("'{}' reply does not name a handler", self.typ)))
    }

    /// Keyword arguments for the named handler.
    ///
    /// `args` is normally a JSON string holding an object; a missing or empty
    /// value means no arguments.
    pub fn keyword_args(&self) -> Result<Args> {
        match &self.args {
            None | Some(Json::Null) => Ok(Args::new()),
            Some(Json::String(s)) if s.is_empty() => Ok(Args::new()),
            Some(Json::String(s)) => match serde_json::from_str::<Json>(s)? {
                Json::Object(map) => Ok(Args::from_json_object(map)),
                _ => Err(Error::Protocol(format!(
                    "'{}' reply args are not a JSON object",
                    self.typ
                ))),
            },
            Some(Json::Object(map)) => Ok(Args::from_json_object(map.clone())),
            Some(_) => Err(Error::Protocol(format!(
                "'{}' reply args are not a JSON object",
                self.typ
            ))),
        }
    }
}

/// Guest-side handle on a compute export.
///
/// Calling it does not run the function locally: the host is asked to run it
/// and the terminal reply's `ret` is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeFn {
    name: String,
}

impl ComputeFn {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, ctx: &mut Context<'_>, args: &Args) -> Result<Json> {
        ctx.compute(&self.name, args)
    }
}

impl<'a> Context<'a> {
    /// Run an outer request to completion and return the terminal reply.
    pub fn call_host(&mut self, typ: Discriminant, payload: &Json) -> Result<HostReply> {
        let outer = typ;
        let mut envelope = Envelope::new(outer, payload);

        loop {
            let reply = self.send(&envelope)?;
            if reply.typ == outer.as_str() {
                return Ok(reply);
            }

            envelope = match reply.typ.as_str() {
                "update" => self.service_update(outer, &reply)?,
                "query" => self.service_query(&reply)?,
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected '{other}' reply while waiting for '{outer}'"
                    )))
                }
            };
        }
    }

    /// Ask the host to run the compute export `name`.
    pub fn compute(&mut self, name: &str, args: &Args) -> Result<Json> {
        let kwargs = serde_json::to_string(&args.to_json_object()?)?;
        let reply = self.call_host(Discriminant::Compute, &json!({"name": name, "args": kwargs}))?;
        Ok(reply.ret.unwrap_or(Json::Null))
    }

    fn send(&mut self, envelope: &Envelope) -> Result<HostReply> {
        trace!("-> {} {}", envelope.typ, envelope.payload);
        let callback =
            HostImport::new(self.config().host_callback_index).returns(SemanticType::Utf8String);
        let args = [
            Value::from(envelope.typ.as_str()),
            Value::from(envelope.payload.as_str()),
        ];

        let body = match callback.call(self, &args)? {
            Some(Value::Str(body)) => body,
            _ => {
                return Err(Error::Protocol(format!(
                    "host callback returned no reply to '{}'",
                    envelope.typ
                )))
            }
        };
        trace!("<- {}", body);
        Ok(serde_json::from_str(&body)?)
    }

    fn service_update(&mut self, outer: Discriminant, reply: &HostReply) -> Result<Envelope> {
        let instance = reply.protocol_instance_id.clone().ok_or_else(|| {
            Error::Protocol("update reply without protocol_instance_id".to_string())
        })?;
        let name = reply.handler_name()?;
        let args = reply.keyword_args()?;
        let ret = self.invoke(Role::Update, name, args)?;
        debug!("update '{}' serviced while waiting for '{}'", name, outer);

        Ok(Envelope::new(
            Discriminant::Update,
            &json!({
                "name": name,
                "ret": ret.to_json()?,
                "waiting_on_signal": outer == Discriminant::Signal,
                "protocol_instance_id": instance,
            }),
        ))
    }

    fn service_query(&mut self, reply: &HostReply) -> Result<Envelope> {
        let name = reply.handler_name()?;
        let args = reply.keyword_args()?;
        let ret = self.invoke(Role::Query, name, args)?;
        debug!("query '{}' serviced", name);

        Ok(Envelope::new(
            Discriminant::Query,
            &json!({"name": name, "ret": ret.to_json()?}),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(json: Json) -> HostReply {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_reply_keeps_unknown_fields() {
        let parsed = reply(json!({"typ": "compute", "ret": 3, "elapsed": 12}));
        assert_eq!(parsed.ret, Some(json!(3)));
        assert_eq!(parsed.extra.get("elapsed"), Some(&json!(12)));
        assert!(!parsed.check_condition);
    }

    #[test]
    fn test_keyword_args_from_encoded_string() {
        let parsed = reply(json!({"typ": "update", "name": "f", "args": "{\"x\": 5}"}));
        let args = parsed.keyword_args().unwrap();
        assert_eq!(args.int("x").unwrap(), 5);

        let empty = reply(json!({"typ": "update", "name": "f", "args": ""}));
        assert!(empty.keyword_args().unwrap().is_empty());
    }

    #[test]
    fn test_keyword_args_must_be_an_object() {
        let parsed = reply(json!({"typ": "query", "name": "f", "args": "[1]"}));
        assert!(matches!(parsed.keyword_args(), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_handler_name_requires_a_string() {
        let parsed = reply(json!({"typ": "signal", "name": []}));
        assert!(matches!(parsed.handler_name(), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_discriminant_wire_names() {
        assert_eq!(serde_json::to_value(Discriminant::Timer).unwrap(), json!("timer"));
        assert_eq!(Discriminant::Update.to_string(), "update");
    }
}
