use crate::context::Context;
use crate::value::{SemanticType, Value};
use crate::{Error, Result};

/// Raw host import reachable by slot number. Receives the encoded argument
/// words and returns the raw result word.
pub type ImportSlot = fn(&[u64]) -> Result<u64>;

/// Slot-indexed table of raw host imports.
///
/// On wasm the plugin supplies one through `register_plugin!(init, imports =
/// TABLE)`; slot 0 must be the host callback.
#[derive(Clone, Copy)]
pub struct ImportTable {
    slots: &'static [ImportSlot],
}

impl ImportTable {
    pub const fn new(slots: &'static [ImportSlot]) -> Self {
        Self { slots }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Call the import in slot `index`.
    pub fn call(&self, index: u32, args: &[u64]) -> Result<u64> {
        let slot = self
            .slots
            .get(index as usize)
            .ok_or_else(|| Error::Protocol(format!("no host import at index {index}")))?;
        slot(args)
    }
}

/// A typed host function in the import table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostImport {
    index: u32,
    returns: Option<SemanticType>,
}

impl HostImport {
    /// Import in slot `index`, with its result discarded.
    pub fn new(index: u32) -> Self {
        Self {
            index,
            returns: None,
        }
    }

    /// Decode the import's result word as `ty`.
    pub fn returns(mut self, ty: SemanticType) -> Self {
        self.returns = Some(ty);
        self
    }

    /// Slot number in the import table.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Encode `args`, call the import and decode its result.
    ///
    /// Imports without a declared return type always yield `None`.
    pub fn call(&self, ctx: &mut Context<'_>, args: &[Value]) -> Result<Option<Value>> {
        let words = args
            .iter()
            .map(|arg| ctx.encode(arg).map(|wire| wire.word()))
            .collect::<Result<Vec<_>>>()?;
        let raw = ctx.boundary().call_import(self.index, &words)?;

        match &self.returns {
            Some(ty) => ctx.decode(ty, raw),
            None => Ok(None),
        }
    }
}
