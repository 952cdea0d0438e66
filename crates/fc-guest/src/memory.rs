use crate::{Error, Result};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// A region of shared linear memory.
///
/// Handles are only meaningful for the duration of the call that produced
/// them. Two handles are equal when they point at the same offset.
#[derive(Debug, Clone, Copy)]
pub struct MemoryHandle {
    offset: u64,
    length: u64,
}

impl MemoryHandle {
    /// Create a handle for `length` bytes starting at `offset`.
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Offset of the region in shared memory.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the region in bytes.
    pub fn length(&self) -> u64 {
        self.length
    }
}

impl PartialEq for MemoryHandle {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl Eq for MemoryHandle {}

impl Hash for MemoryHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.offset.hash(state);
    }
}

/// Allocation and lookup in the shared arena.
///
/// Offset `0` never names a region; it is the wire sentinel for "no value".
pub trait Memory {
    /// Copy `bytes` into a fresh region.
    fn alloc(&mut self, bytes: &[u8]) -> Result<MemoryHandle>;

    /// Resolve an offset to the region starting there, if any.
    ///
    /// Zero-length regions never resolve. The kernel reports length `0` for
    /// offsets it does not know, so an empty region is indistinguishable
    /// from a missing one and every implementation treats it as absent.
    fn find(&self, offset: u64) -> Option<MemoryHandle>;

    /// Copy the contents of a region out of shared memory.
    fn read(&self, handle: MemoryHandle) -> Result<Vec<u8>>;
}

/// In-process arena used when the guest runs natively.
#[derive(Debug, Default)]
pub struct HeapArena {
    regions: BTreeMap<u64, Vec<u8>>,
    next_offset: u64,
}

impl HeapArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether nothing has been allocated.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Borrow the bytes stored at `offset`.
    pub fn bytes(&self, offset: u64) -> Option<&[u8]> {
        self.regions.get(&offset).map(Vec::as_slice)
    }
}

impl Memory for HeapArena {
    fn alloc(&mut self, bytes: &[u8]) -> Result<MemoryHandle> {
        // Offsets start past zero and every region reserves at least one byte,
        // so zero-length allocations still get distinct offsets.
        let offset = self.next_offset.max(1);
        self.next_offset = offset + (bytes.len() as u64).max(1);
        self.regions.insert(offset, bytes.to_vec());
        Ok(MemoryHandle::new(offset, bytes.len() as u64))
    }

    fn find(&self, offset: u64) -> Option<MemoryHandle> {
        self.regions
            .get(&offset)
            .filter(|bytes| !bytes.is_empty())
            .map(|bytes| MemoryHandle::new(offset, bytes.len() as u64))
    }

    fn read(&self, handle: MemoryHandle) -> Result<Vec<u8>> {
        self.regions.get(&handle.offset()).cloned().ok_or_else(|| {
            Error::InvalidInput(format!("no memory region at offset {}", handle.offset()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_never_returns_zero() {
        let mut arena = HeapArena::new();
        let first = arena.alloc(b"").unwrap();
        let second = arena.alloc(b"").unwrap();

        assert_ne!(first.offset(), 0);
        assert_ne!(first, second);
        assert!(arena.find(0).is_none());
    }

    #[test]
    fn test_find_and_read() {
        let mut arena = HeapArena::new();
        let handle = arena.alloc(b"hello").unwrap();

        let found = arena.find(handle.offset()).expect("region should resolve");
        assert_eq!(found.length(), 5);
        assert_eq!(arena.read(found).unwrap(), b"hello");
        assert!(arena.find(handle.offset() + 1).is_none());
    }

    #[test]
    fn test_empty_region_does_not_resolve() {
        let mut arena = HeapArena::new();
        let empty = arena.alloc(b"").unwrap();

        assert!(arena.find(empty.offset()).is_none());
        assert_eq!(arena.read(empty).unwrap(), b"");
    }

    #[test]
    fn test_handle_equality_is_by_offset() {
        assert_eq!(MemoryHandle::new(8, 1), MemoryHandle::new(8, 64));
        assert_ne!(MemoryHandle::new(8, 1), MemoryHandle::new(9, 1));
    }
}
