//! Local persistence abstraction
//!
//! Trait-based abstraction over an opaque string key-value store. The trait is
//! synchronous (no async) to keep key loading and the readiness probe free of
//! suspension points while they hold internal locks.
//!
//! # Slots
//!
//! | Slot | Value |
//! |------|-------|
//! | `encryption_key:{account}:{app}` | base64 X25519 secret key |
//! | `access_key:{network}:{account}` | base64 Ed25519 seed (committed) |
//! | `pending_access_key:{network}:{account}` | base64 Ed25519 seed (awaiting injection) |

mod memory;
#[cfg(test)]
mod failing;

#[cfg(test)]
pub(crate) use failing::FailingStore;
pub use memory::MemoryStore;

use crate::{error::StoreError, key_store::Identity};

/// String key-value store for secrets and credentials.
///
/// Must be Clone (shared by the key store and the readiness handshake), Send +
/// Sync (thread-safe), and synchronous. Implementations typically share
/// internal state via Arc, so clones access the same underlying storage.
pub trait KeyValueStore: Clone + Send + Sync + 'static {
    /// Value stored under `key`. `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, overwriting any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete `key`. Removing an absent key is a no-op.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Slot holding the encryption secret key for an identity.
pub fn encryption_key_slot(identity: &Identity) -> String {
    format!("encryption_key:{}:{}", identity.account_id, identity.app_id)
}

/// Slot holding the committed access credential for an account.
pub fn access_key_slot(network_id: &str, account_id: &str) -> String {
    format!("access_key:{network_id}:{account_id}")
}

/// Slot holding a temporary access key awaiting injection.
pub fn pending_access_key_slot(network_id: &str, account_id: &str) -> String {
    format!("pending_access_key:{network_id}:{account_id}")
}
