// In: src/store.rs

//! Minimal persistence seam for encoded containers.
//!
//! The codec itself never touches storage; callers hand finished container
//! bytes to an `EntryStore` and fetch them back by name. The in-memory
//! implementation backs tests and tooling; production embedders provide their
//! own (files, object stores, archive members).

use std::collections::HashMap;

use crate::error::CctfError;

/// A named blob store for encoded records. Writing an existing name replaces
/// the previous bytes.
pub trait EntryStore {
    fn write_entry(&mut self, name: &str, bytes: &[u8]) -> Result<(), CctfError>;

    /// Returns `EntryNotFound` for names never written.
    fn read_entry(&self, name: &str) -> Result<Vec<u8>, CctfError>;
}

/// HashMap-backed store. Owns copies of everything written to it.
#[derive(Debug, Default)]
pub struct MemoryEntryStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl EntryStore for MemoryEntryStore {
    fn write_entry(&mut self, name: &str, bytes: &[u8]) -> Result<(), CctfError> {
        self.entries.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read_entry(&self, name: &str) -> Result<Vec<u8>, CctfError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| CctfError::EntryNotFound(name.to_string()))
    }
}

//==================================================================================
// Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut store = MemoryEntryStore::new();
        store.write_entry("record_0001", b"payload").unwrap();
        assert_eq!(store.read_entry("record_0001").unwrap(), b"payload");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_overwrite_replaces() {
        let mut store = MemoryEntryStore::new();
        store.write_entry("r", b"old").unwrap();
        store.write_entry("r", b"new").unwrap();
        assert_eq!(store.read_entry("r").unwrap(), b"new");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_entry() {
        let store = MemoryEntryStore::new();
        let err = store.read_entry("nope").unwrap_err();
        assert!(matches!(err, CctfError::EntryNotFound(_)));
    }
}
