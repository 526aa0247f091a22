//! Ledgerbox Core
//!
//! Encrypted per-user storage and messaging on top of a shared ledger. Every
//! (account, app) identity owns an X25519 key pair: values it stores are
//! sealed under a key only it can derive, and messages to a peer are boxed to
//! the peer's published public key.
//!
//! # Components
//!
//! - [`KeyStore`]: Loads, generates and replaces the key pair per identity
//! - [`BoxCodec`]: Seals and opens boxes with environment-drawn nonces
//! - [`PeerKeyResolver`]: Finds and validates a peer's public key
//! - [`ReadinessHandshake`]: Gates writes on a committed access credential
//! - [`CallSerializer`]: Runs state-mutating remote calls one at a time, in
//!   submission order, with a bounded retry
//! - [`Client`]: Composes the above for one identity
//!
//! # Collaborators
//!
//! Local persistence ([`KeyValueStore`]) is synchronous; the ledger
//! ([`RemoteRead`], [`RemoteWrite`]) is async. In-memory implementations of
//! both ([`MemoryStore`], [`MemoryLedger`]) back the tests and simulations.
//!
//! # Concurrency
//!
//! Cooperative async on Tokio. Internal locks guard short synchronous sections
//! only and are never held across an await.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod call_queue;
mod client;
mod codec;
mod config;
pub mod encoding;
pub mod env;
mod error;
mod key_store;
mod peer_key;
pub mod readiness;
pub mod remote;
pub mod storage;

pub use call_queue::{CallFailed, CallSerializer, RetryPolicy};
pub use client::Client;
pub use codec::BoxCodec;
pub use config::{ClientConfig, ValueProtection};
pub use env::{Environment, SystemEnv};
pub use error::{Error, ErrorClass, RemoteError, StoreError};
pub use key_store::{Identity, KeyStore};
pub use peer_key::{PeerKeyRequest, PeerKeyResolver};
pub use readiness::{ReadinessHandshake, ReadinessState};
pub use remote::{InboxMessage, LedgerHandle, MemoryLedger, RemoteRead, RemoteWrite};
pub use storage::{KeyValueStore, MemoryStore};
