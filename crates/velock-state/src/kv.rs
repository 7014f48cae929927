//! Ordered key-value seam between the ledger and its storage.
//!
//! Queries only need `KvRead`; anything that writes needs `KvStore`, which
//! in practice is a `StagedStore` committed once per state transition.

use velock_core::error::VeError;

pub trait KvRead {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, VeError>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, VeError>;

    /// All entries with `start <= key < end`, in key order.
    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, VeError>;
}

pub trait KvStore: KvRead {
    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), VeError>;

    fn delete(&mut self, key: &[u8]) -> Result<(), VeError>;
}

impl<T: KvRead + ?Sized> KvRead for &T {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, VeError> {
        (**self).get(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, VeError> {
        (**self).scan_prefix(prefix)
    }

    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, VeError> {
        (**self).scan_range(start, end)
    }
}

impl<T: KvRead + ?Sized> KvRead for &mut T {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, VeError> {
        (**self).get(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, VeError> {
        (**self).scan_prefix(prefix)
    }

    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, VeError> {
        (**self).scan_range(start, end)
    }
}

impl<T: KvStore + ?Sized> KvStore for &mut T {
    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), VeError> {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), VeError> {
        (**self).delete(key)
    }
}
