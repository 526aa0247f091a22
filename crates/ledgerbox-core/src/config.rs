//! Client configuration.

use serde::{Deserialize, Serialize};

use crate::{call_queue::RetryPolicy, key_store::Identity};

/// How an application value is written to the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueProtection {
    /// Sealed under the storage key derived from the encryption secret.
    /// Only the owning identity can read it back.
    #[default]
    Sealed,
    /// JSON as is, readable by any account
    Plain,
}

/// Configuration for one [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Ledger network (e.g. `testnet`); scopes the access credential
    pub network_id: String,
    /// Signing account
    pub account_id: String,
    /// Application (contract) whose storage and messages are used
    pub app_id: String,
    /// Retry policy for queued remote writes
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Protection used by [`Client::set_value`](crate::Client::set_value)
    #[serde(default)]
    pub default_protection: ValueProtection,
}

impl ClientConfig {
    /// Configuration with default retry and protection.
    pub fn new(
        network_id: impl Into<String>,
        account_id: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            network_id: network_id.into(),
            account_id: account_id.into(),
            app_id: app_id.into(),
            retry: RetryPolicy::default(),
            default_protection: ValueProtection::default(),
        }
    }

    /// Use `retry` for queued writes.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Use `protection` when no protection is given explicitly.
    #[must_use]
    pub fn with_default_protection(mut self, protection: ValueProtection) -> Self {
        self.default_protection = protection;
        self
    }

    /// Identity owning the encryption key.
    pub fn identity(&self) -> Identity {
        Identity::new(&self.account_id, &self.app_id)
    }
}
