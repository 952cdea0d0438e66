use crate::memory::{Memory, MemoryHandle};
use crate::services::{HttpRequest, HttpResponse};
use crate::Result;

/// Everything the guest core needs from the host side of the sandbox.
///
/// On wasm this is the kernel ABI (`kernel::KernelBoundary`); natively it is
/// whatever embeds the guest, usually [`crate::testing::ScriptedHost`].
pub trait Boundary: Memory {
    /// Call the host import at `index` with raw wire words.
    fn call_import(&mut self, index: u32, args: &[u64]) -> Result<u64>;

    /// Contents of the current call's input buffer.
    fn input(&mut self) -> Result<Vec<u8>>;

    /// Publish a region as the current call's output.
    fn set_output(&mut self, handle: MemoryHandle);

    /// Publish a region as the current call's error text.
    fn set_error(&mut self, handle: MemoryHandle);

    fn var_get(&mut self, key: &str) -> Result<Option<Vec<u8>>>;

    fn var_set(&mut self, key: &str, value: &[u8]) -> Result<()>;

    fn var_remove(&mut self, key: &str) -> Result<()>;

    fn config_get(&mut self, key: &str) -> Result<Option<String>>;

    fn log(&mut self, level: log::Level, message: &str);

    fn http_request(&mut self, request: &HttpRequest, body: Option<&[u8]>)
        -> Result<HttpResponse>;
}
