//! Ancillary host services: variables, configuration, HTTP and logging.
//!
//! These are thin typed wrappers over the corresponding [`Boundary`] calls.

use crate::boundary::Boundary;
use crate::context::Context;
use crate::{Error, Result};
use log::{LevelFilter, Log, Metadata, Record};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request line and headers of an outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl HttpRequest {
    /// A `GET` request for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Response to an [`HttpRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    status_code: u16,
    body: Vec<u8>,
    headers: BTreeMap<String, String>,
}

impl HttpResponse {
    pub fn new(status_code: u16, body: Vec<u8>, headers: BTreeMap<String, String>) -> Self {
        Self {
            status_code,
            body,
            headers,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn data_bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn data_str(&self) -> Result<String> {
        Ok(String::from_utf8(self.body.clone())?)
    }

    pub fn data_json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

/// Host key/value variable store.
pub struct Var<'c> {
    boundary: &'c mut dyn Boundary,
}

impl Var<'_> {
    pub fn get_bytes(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        self.boundary.var_get(key)
    }

    pub fn get_str(&mut self, key: &str) -> Result<Option<String>> {
        self.get_bytes(key)?
            .map(|bytes| String::from_utf8(bytes).map_err(Error::from))
            .transpose()
    }

    pub fn get_json<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        self.get_bytes(key)?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(Error::from))
            .transpose()
    }

    /// Store a string or byte value.
    pub fn set(&mut self, key: &str, value: impl AsRef<[u8]>) -> Result<()> {
        self.boundary.var_set(key, value.as_ref())
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        self.boundary.var_remove(key)
    }
}

/// Static configuration supplied by the host.
pub struct Config<'c> {
    boundary: &'c mut dyn Boundary,
}

impl Config<'_> {
    pub fn get_str(&mut self, key: &str) -> Result<Option<String>> {
        self.boundary.config_get(key)
    }

    pub fn get_json<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        self.get_str(key)?
            .map(|raw| serde_json::from_str(&raw).map_err(Error::from))
            .transpose()
    }
}

/// HTTP capability of the host.
pub struct Http<'c> {
    boundary: &'c mut dyn Boundary,
}

impl Http<'_> {
    pub fn request(&mut self, request: &HttpRequest, body: Option<&[u8]>) -> Result<HttpResponse> {
        log::debug!("{} {}", request.method, request.url);
        self.boundary.http_request(request, body)
    }

    pub fn get(&mut self, url: &str) -> Result<HttpResponse> {
        self.request(&HttpRequest::new(url), None)
    }
}

impl<'a> Context<'a> {
    pub fn var(&mut self) -> Var<'_> {
        Var {
            boundary: self.boundary(),
        }
    }

    pub fn host_config(&mut self) -> Config<'_> {
        Config {
            boundary: self.boundary(),
        }
    }

    pub fn http(&mut self) -> Http<'_> {
        Http {
            boundary: self.boundary(),
        }
    }
}

/// `log` backend that forwards records to the host's logging service.
pub struct HostLogger {
    level: LevelFilter,
    sink: fn(log::Level, &str),
}

impl HostLogger {
    pub fn new(level: LevelFilter, sink: fn(log::Level, &str)) -> Self {
        Self { level, sink }
    }

    /// Install as the global logger.
    pub fn install(self) -> std::result::Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for HostLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            (self.sink)(
                record.level(),
                &format!("{}: {}", record.target(), record.args()),
            );
        }
    }

    fn flush(&self) {}
}
