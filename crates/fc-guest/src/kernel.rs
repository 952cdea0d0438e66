//! Boundary over the wasm kernel ABI.
//!
//! Memory, per-call buffers and the ancillary services come from the
//! `extism:host/env` module; the host callback is the first import of
//! `extism:host/user`.

use crate::boundary::Boundary;
use crate::dispatch::{report_error, Dispatcher};
use crate::imports::{ImportSlot, ImportTable};
use crate::memory::{Memory, MemoryHandle};
use crate::services::{HostLogger, HttpRequest, HttpResponse};
use crate::{Error, Result};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::thread::LocalKey;

mod sys {
    #[link(wasm_import_module = "extism:host/env")]
    extern "C" {
        pub fn input_length() -> u64;
        pub fn input_load_u8(offs: u64) -> u8;
        pub fn length(offs: u64) -> u64;
        pub fn alloc(length: u64) -> u64;
        pub fn output_set(offs: u64, length: u64);
        pub fn error_set(offs: u64);
        pub fn store_u8(offs: u64, data: u8);
        pub fn load_u8(offs: u64) -> u8;
        pub fn config_get(offs: u64) -> u64;
        pub fn var_get(offs: u64) -> u64;
        pub fn var_set(offs: u64, offs1: u64);
        pub fn http_request(req: u64, body: u64) -> u64;
        pub fn http_status_code() -> i32;
        pub fn http_headers() -> u64;
        pub fn log_trace(offs: u64);
        pub fn log_debug(offs: u64);
        pub fn log_info(offs: u64);
        pub fn log_warn(offs: u64);
        pub fn log_error(offs: u64);
    }

    #[link(wasm_import_module = "extism:host/user")]
    extern "C" {
        pub fn host_callback(typ: u64, payload: u64) -> u64;
    }
}

/// Slot 0 of every import table: the `extism:host/user` host callback.
pub fn host_callback_slot(args: &[u64]) -> Result<u64> {
    match args {
        [typ, payload] => Ok(unsafe { sys::host_callback(*typ, *payload) }),
        _ => Err(Error::Protocol(format!(
            "host callback takes 2 arguments, got {}",
            args.len()
        ))),
    }
}

/// Default import table: only the host callback, at slot 0.
pub static DEFAULT_IMPORTS: &[ImportSlot] = &[host_callback_slot];

/// [`Boundary`] implemented with the kernel imports.
#[derive(Clone, Copy)]
pub struct KernelBoundary {
    imports: ImportTable,
}

impl Default for KernelBoundary {
    fn default() -> Self {
        Self::with_imports(DEFAULT_IMPORTS)
    }
}

impl KernelBoundary {
    /// Use a custom import table. Slot 0 must remain the host callback.
    pub fn with_imports(imports: &'static [ImportSlot]) -> Self {
        Self {
            imports: ImportTable::new(imports),
        }
    }

    fn alloc_str(&mut self, text: &str) -> Result<MemoryHandle> {
        self.alloc(text.as_bytes())
    }

    fn read_offset(&self, offset: u64) -> Result<Option<Vec<u8>>> {
        match self.find(offset) {
            Some(handle) => Ok(Some(self.read(handle)?)),
            None => Ok(None),
        }
    }
}

impl Memory for KernelBoundary {
    fn alloc(&mut self, bytes: &[u8]) -> Result<MemoryHandle> {
        let length = bytes.len() as u64;
        let offset = unsafe { sys::alloc(length) };
        for (i, byte) in bytes.iter().enumerate() {
            unsafe { sys::store_u8(offset + i as u64, *byte) };
        }
        Ok(MemoryHandle::new(offset, length))
    }

    fn find(&self, offset: u64) -> Option<MemoryHandle> {
        if offset == 0 {
            return None;
        }
        match unsafe { sys::length(offset) } {
            0 => None,
            length => Some(MemoryHandle::new(offset, length)),
        }
    }

    fn read(&self, handle: MemoryHandle) -> Result<Vec<u8>> {
        Ok((0..handle.length())
            .map(|i| unsafe { sys::load_u8(handle.offset() + i) })
            .collect())
    }
}

impl Boundary for KernelBoundary {
    fn call_import(&mut self, index: u32, args: &[u64]) -> Result<u64> {
        self.imports.call(index, args)
    }

    fn input(&mut self) -> Result<Vec<u8>> {
        let length = unsafe { sys::input_length() };
        Ok((0..length)
            .map(|i| unsafe { sys::input_load_u8(i) })
            .collect())
    }

    fn set_output(&mut self, handle: MemoryHandle) {
        unsafe { sys::output_set(handle.offset(), handle.length()) }
    }

    fn set_error(&mut self, handle: MemoryHandle) {
        unsafe { sys::error_set(handle.offset()) }
    }

    fn var_get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = self.alloc_str(key)?;
        let offset = unsafe { sys::var_get(key.offset()) };
        self.read_offset(offset)
    }

    fn var_set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let key = self.alloc_str(key)?;
        let value = self.alloc(value)?;
        unsafe { sys::var_set(key.offset(), value.offset()) };
        Ok(())
    }

    fn var_remove(&mut self, key: &str) -> Result<()> {
        let key = self.alloc_str(key)?;
        unsafe { sys::var_set(key.offset(), 0) };
        Ok(())
    }

    fn config_get(&mut self, key: &str) -> Result<Option<String>> {
        let key = self.alloc_str(key)?;
        let offset = unsafe { sys::config_get(key.offset()) };
        self.read_offset(offset)?
            .map(|bytes| String::from_utf8(bytes).map_err(Error::from))
            .transpose()
    }

    fn log(&mut self, level: log::Level, message: &str) {
        let Ok(handle) = self.alloc_str(message) else {
            return;
        };
        let offset = handle.offset();
        unsafe {
            match level {
                log::Level::Trace => sys::log_trace(offset),
                log::Level::Debug => sys::log_debug(offset),
                log::Level::Info => sys::log_info(offset),
                log::Level::Warn => sys::log_warn(offset),
                log::Level::Error => sys::log_error(offset),
            }
        }
    }

    fn http_request(
        &mut self,
        request: &HttpRequest,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse> {
        let req = self.alloc(&serde_json::to_vec(request)?)?;
        let body = match body {
            Some(bytes) => self.alloc(bytes)?.offset(),
            None => 0,
        };

        let response = unsafe { sys::http_request(req.offset(), body) };
        let status = unsafe { sys::http_status_code() };
        if status <= 0 {
            return Err(Error::Http(format!(
                "{} {} failed with status {}",
                request.method, request.url, status
            )));
        }

        let data = self.read_offset(response)?.unwrap_or_default();
        let headers_offset = unsafe { sys::http_headers() };
        let headers: BTreeMap<String, String> = match self.read_offset(headers_offset)? {
            Some(raw) => serde_json::from_slice(&raw)?,
            None => BTreeMap::new(),
        };
        Ok(HttpResponse::new(status as u16, data, headers))
    }
}

fn log_sink(level: log::Level, message: &str) {
    KernelBoundary::default().log(level, message);
}

/// Body of the generated `__invoke*` exports.
///
/// Builds the plugin on first use, then dispatches with host imports served
/// from `imports`. Failures have already been written to the error channel by
/// the time the call traps.
pub fn invoke(
    slot: &'static LocalKey<OnceCell<Dispatcher>>,
    init: fn() -> Result<Dispatcher>,
    imports: &'static [ImportSlot],
    index: u32,
    shared: bool,
    args: &[u64],
) -> u64 {
    let mut boundary = KernelBoundary::with_imports(imports);
    slot.with(|cell| {
        let dispatcher = match cell.get() {
            Some(dispatcher) => dispatcher,
            None => match init() {
                Ok(dispatcher) => {
                    let _ = HostLogger::new(dispatcher.config().log_level, log_sink).install();
                    cell.get_or_init(|| dispatcher)
                }
                Err(err) => {
                    report_error(&mut boundary, &err);
                    std::process::abort();
                }
            },
        };

        match dispatcher.dispatch(&mut boundary, index, shared, args) {
            Ok(dispatched) => dispatched.word,
            Err(_) => std::process::abort(),
        }
    })
}
