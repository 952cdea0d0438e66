//! In-process host double for driving a guest natively.
//!
//! [`ScriptedHost`] answers the host callback from a queue of prepared
//! replies and records everything the guest sends, so protocol exchanges can
//! be asserted step by step without a wasm runtime.

use crate::boundary::Boundary;
use crate::config::HOST_CALLBACK_INDEX;
use crate::memory::{HeapArena, Memory, MemoryHandle};
use crate::services::{HttpRequest, HttpResponse};
use crate::{Error, Result};
use serde_json::Value as Json;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// A request the guest sent to the host callback.
#[derive(Debug, Clone, PartialEq)]
pub struct SentEnvelope {
    pub typ: String,
    pub payload: Json,
}

/// Extra host import: receives raw words and the arena.
pub type ImportFn = Box<dyn FnMut(&mut HeapArena, &[u64]) -> u64>;

/// Scripted host backed by a [`HeapArena`].
#[derive(Default)]
pub struct ScriptedHost {
    pub arena: HeapArena,
    pub input: Vec<u8>,
    pub output: Option<Vec<u8>>,
    pub error: Option<String>,
    /// Replies handed out, in order, by the host callback.
    pub replies: VecDeque<Json>,
    /// Every envelope the guest sent, in order.
    pub sent: Vec<SentEnvelope>,
    pub vars: HashMap<String, Vec<u8>>,
    pub config: HashMap<String, String>,
    pub logs: Vec<(log::Level, String)>,
    pub http_response: Option<HttpResponse>,
    pub http_requests: Vec<(HttpRequest, Option<Vec<u8>>)>,
    imports: HashMap<u32, ImportFn>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the host callback.
    pub fn reply(mut self, reply: Json) -> Self {
        self.replies.push_back(reply);
        self
    }

    /// Set the call input to the JSON encoding of `input`.
    pub fn with_json_input(mut self, input: &Json) -> Self {
        self.input = input.to_string().into_bytes();
        self
    }

    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = input.into();
        self
    }

    pub fn with_config(mut self, key: &str, value: &str) -> Self {
        self.config.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_http_response(mut self, response: HttpResponse) -> Self {
        self.http_response = Some(response);
        self
    }

    /// Serve import `index` with `import`.
    pub fn with_import(
        mut self,
        index: u32,
        import: impl FnMut(&mut HeapArena, &[u64]) -> u64 + 'static,
    ) -> Self {
        self.imports.insert(index, Box::new(import));
        self
    }

    /// Copy a string into the arena, as a host would before a shared call.
    pub fn store(&mut self, bytes: impl AsRef<[u8]>) -> u64 {
        self.arena
            .alloc(bytes.as_ref())
            .map(|handle| handle.offset())
            .unwrap_or(0)
    }

    pub fn output_str(&self) -> Option<String> {
        self.output
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn output_json(&self) -> Option<Json> {
        self.output
            .as_ref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }

    fn read_str(&self, offset: u64) -> Result<String> {
        let handle = self
            .arena
            .find(offset)
            .ok_or_else(|| Error::Protocol(format!("no string at offset {offset}")))?;
        Ok(String::from_utf8(self.arena.read(handle)?)?)
    }

    fn host_callback(&mut self, args: &[u64]) -> Result<u64> {
        let [typ, payload] = args else {
            return Err(Error::Protocol(format!(
                "host callback takes 2 arguments, got {}",
                args.len()
            )));
        };
        let typ = self.read_str(*typ)?;
        let payload = serde_json::from_str(&self.read_str(*payload)?)?;
        self.sent.push(SentEnvelope { typ, payload });

        let reply = self
            .replies
            .pop_front()
            .ok_or_else(|| Error::Protocol("scripted host ran out of replies".to_string()))?;
        Ok(self.arena.alloc(reply.to_string().as_bytes())?.offset())
    }
}

impl Memory for ScriptedHost {
    fn alloc(&mut self, bytes: &[u8]) -> Result<MemoryHandle> {
        self.arena.alloc(bytes)
    }

    fn find(&self, offset: u64) -> Option<MemoryHandle> {
        self.arena.find(offset)
    }

    fn read(&self, handle: MemoryHandle) -> Result<Vec<u8>> {
        self.arena.read(handle)
    }
}

impl Boundary for ScriptedHost {
    fn call_import(&mut self, index: u32, args: &[u64]) -> Result<u64> {
        if index == HOST_CALLBACK_INDEX {
            return self.host_callback(args);
        }
        match self.imports.get_mut(&index) {
            Some(import) => Ok(import(&mut self.arena, args)),
            None => Err(Error::Protocol(format!("no host import at index {index}"))),
        }
    }

    fn input(&mut self) -> Result<Vec<u8>> {
        Ok(self.input.clone())
    }

    fn set_output(&mut self, handle: MemoryHandle) {
        self.output = self.arena.read(handle).ok();
    }

    fn set_error(&mut self, handle: MemoryHandle) {
        self.error = self
            .arena
            .read(handle)
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
    }

    fn var_get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.vars.get(key).cloned())
    }

    fn var_set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.vars.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn var_remove(&mut self, key: &str) -> Result<()> {
        self.vars.remove(key);
        Ok(())
    }

    fn config_get(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.config.get(key).cloned())
    }

    fn log(&mut self, level: log::Level, message: &str) {
        self.logs.push((level, message.to_string()));
    }

    fn http_request(
        &mut self,
        request: &HttpRequest,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse> {
        self.http_requests
            .push((request.clone(), body.map(<[u8]>::to_vec)));
        self.http_response
            .clone()
            .ok_or_else(|| Error::Http(format!("no scripted response for {}", request.url)))
    }
}

/// Headers map helper for building scripted responses.
pub fn headers<const N: usize>(pairs: [(&str, &str); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}
