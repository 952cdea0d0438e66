use crate::boundary::Boundary;
use crate::codec::{Codec, Wire};
use crate::config::BridgeConfig;
use crate::exports::{ExportTable, Role};
use crate::value::{Args, SemanticType, Value};
use crate::Result;

/// Handle given to every registered function for the duration of one call.
///
/// It borrows the boundary for the call and the export table for name-based
/// lookups. Nested host round-trips and blocking primitives are methods on
/// this type (see `protocol` and `blocking`).
pub struct Context<'a> {
    boundary: &'a mut dyn Boundary,
    exports: &'a ExportTable,
    config: &'a BridgeConfig,
}

impl<'a> Context<'a> {
    pub fn new(
        boundary: &'a mut dyn Boundary,
        exports: &'a ExportTable,
        config: &'a BridgeConfig,
    ) -> Self {
        Self {
            boundary,
            exports,
            config,
        }
    }

    pub fn exports(&self) -> &'a ExportTable {
        self.exports
    }

    pub fn config(&self) -> &'a BridgeConfig {
        self.config
    }

    pub fn boundary(&mut self) -> &mut dyn Boundary {
        &mut *self.boundary
    }

    pub fn codec(&mut self) -> Codec<'_, dyn Boundary + 'a> {
        Codec::new(&mut *self.boundary)
    }

    pub fn encode(&mut self, value: &Value) -> Result<Wire> {
        self.codec().encode(value)
    }

    pub fn decode(&mut self, ty: &SemanticType, word: u64) -> Result<Option<Value>> {
        self.codec().decode(ty, word)
    }

    /// Send a message to the host log.
    pub fn log(&mut self, level: log::Level, message: &str) {
        self.boundary.log(level, message);
    }

    /// Like [`Context::log`] for byte messages; invalid UTF-8 is replaced.
    pub fn log_bytes(&mut self, level: log::Level, message: &[u8]) {
        self.boundary.log(level, &String::from_utf8_lossy(message));
    }

    /// Invoke a role-scoped handler by name.
    pub(crate) fn invoke(&mut self, role: Role, name: &str, args: Args) -> Result<Value> {
        let exports = self.exports;
        let entry = exports.handler(role, name)?;
        log::debug!("invoking {} handler '{}'", role, name);
        entry.call(self, args)
    }
}
