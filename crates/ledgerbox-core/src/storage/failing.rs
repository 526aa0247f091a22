use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use super::{KeyValueStore, MemoryStore};
use crate::error::StoreError;

/// Store whose writes can be switched to fail, for exercising persistence
/// error paths. Reads always pass through.
#[derive(Clone, Default)]
pub(crate) struct FailingStore {
    inner: MemoryStore,
    fail_writes: Arc<AtomicBool>,
}

impl FailingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` and `remove` fail until switched back.
    pub(crate) fn fail_writes(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io("disk full".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.inner.remove(key)
    }
}
