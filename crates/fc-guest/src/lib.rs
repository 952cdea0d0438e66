//! # fc-guest
//!
//! Guest-side runtime bridge for plugins that run inside a sandboxed wasm
//! module and talk to their host through shared linear memory and a single
//! host callback.
//!
//! This crate provides:
//! - A value codec between native values and words/offsets on the wire
//! - An export table with plain, shared, query, signal and update roles
//! - A dispatcher behind one generic `__invoke` entry point
//! - The host callback protocol, including nested update/query servicing
//! - Blocking primitives (`sleep`, `wait_for_condition`) built on that protocol
//! - Thin wrappers for the host's variable store, configuration, HTTP and logging
//!
//! ## Example
//!
//! ```ignore
//! use fc_guest::{BridgeConfig, Dispatcher, ExportTable, SemanticType, Signature, Value};
//!
//! fn plugin() -> fc_guest::Result<Dispatcher> {
//!     let mut exports = ExportTable::new();
//!     exports.export(
//!         "greet",
//!         Signature::new().param("name", SemanticType::Utf8String),
//!         |_ctx, args| Ok(Value::from(format!("hello, {}", args.str("name")?))),
//!     )?;
//!     Ok(Dispatcher::new(exports, BridgeConfig::default()))
//! }
//!
//! fc_guest::register_plugin!(plugin);
//! ```

mod blocking;
pub mod boundary;
pub mod codec;
mod config;
mod context;
pub mod dispatch;
mod error;
pub mod exports;
mod imports;
mod io;
#[cfg(target_arch = "wasm32")]
pub mod kernel;
pub mod memory;
pub mod protocol;
pub mod services;
pub mod testing;
mod value;

pub use boundary::Boundary;
pub use codec::{Codec, Wire};
pub use config::{BridgeConfig, HOST_CALLBACK_INDEX};
pub use context::Context;
pub use dispatch::{format_error, report_error, Dispatched, Dispatcher};
pub use error::{Error, Result};
pub use exports::{ExportEntry, ExportTable, Param, Role, Signature};
pub use imports::{HostImport, ImportSlot, ImportTable};
pub use memory::{HeapArena, Memory, MemoryHandle};
pub use protocol::{ComputeFn, Discriminant, Envelope, HostReply};
pub use services::{HostLogger, HttpRequest, HttpResponse};
pub use value::{
    decode_bytes_base64, encode_bytes_base64, Args, EnumSchema, EnumValue, Enumeration,
    SemanticType, Value,
};

/// Export a plugin's entry points.
///
/// `$init` is a `fn() -> fc_guest::Result<Dispatcher>` that builds the export
/// table. It runs once, on the first call from the host. On wasm targets this
/// generates `__invoke(index, shared)` and `__invoke1`..`__invoke4` taking that
/// many extra raw argument words; elsewhere it only checks the signatures.
///
/// Plugins that call host functions besides the host callback pass their
/// import table as `imports = TABLE`, a `&'static [ImportSlot]` whose slot 0
/// is `kernel::host_callback_slot`. [`HostImport`] indices refer to its slots.
///
/// ```ignore
/// static IMPORTS: &[fc_guest::ImportSlot] =
///     &[fc_guest::kernel::host_callback_slot, fetch_rate_slot];
///
/// fc_guest::register_plugin!(plugin, imports = IMPORTS);
/// ```
#[macro_export]
macro_rules! register_plugin {
    (@entry_points $init:path, $imports:expr) => {
        ::std::thread_local! {
            static __FC_GUEST_DISPATCHER: ::std::cell::OnceCell<$crate::Dispatcher> =
                const { ::std::cell::OnceCell::new() };
        }

        #[no_mangle]
        pub extern "C" fn __invoke(index: u32, shared: u32) -> u64 {
            $crate::kernel::invoke(&__FC_GUEST_DISPATCHER, $init, $imports, index, shared != 0, &[])
        }

        #[no_mangle]
        pub extern "C" fn __invoke1(index: u32, shared: u32, a0: u64) -> u64 {
            $crate::kernel::invoke(
                &__FC_GUEST_DISPATCHER,
                $init,
                $imports,
                index,
                shared != 0,
                &[a0],
            )
        }

        #[no_mangle]
        pub extern "C" fn __invoke2(index: u32, shared: u32, a0: u64, a1: u64) -> u64 {
            $crate::kernel::invoke(
                &__FC_GUEST_DISPATCHER,
                $init,
                $imports,
                index,
                shared != 0,
                &[a0, a1],
            )
        }

        #[no_mangle]
        pub extern "C" fn __invoke3(index: u32, shared: u32, a0: u64, a1: u64, a2: u64) -> u64 {
            $crate::kernel::invoke(
                &__FC_GUEST_DISPATCHER,
                $init,
                $imports,
                index,
                shared != 0,
                &[a0, a1, a2],
            )
        }

        #[no_mangle]
        pub extern "C" fn __invoke4(
            index: u32,
            shared: u32,
            a0: u64,
            a1: u64,
            a2: u64,
            a3: u64,
        ) -> u64 {
            $crate::kernel::invoke(
                &__FC_GUEST_DISPATCHER,
                $init,
                $imports,
                index,
                shared != 0,
                &[a0, a1, a2, a3],
            )
        }
    };
    ($init:path, imports = $imports:expr) => {
        const _: fn() -> $crate::Result<$crate::Dispatcher> = $init;
        const _: fn() -> &'static [$crate::ImportSlot] = || $imports;

        #[cfg(target_arch = "wasm32")]
        $crate::register_plugin!(@entry_points $init, $imports);
    };
    ($init:path) => {
        const _: fn() -> $crate::Result<$crate::Dispatcher> = $init;

        #[cfg(target_arch = "wasm32")]
        $crate::register_plugin!(@entry_points $init, $crate::kernel::DEFAULT_IMPORTS);
    };
}
