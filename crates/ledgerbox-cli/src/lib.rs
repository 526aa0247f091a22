//! Ledgerbox command-line tooling
//!
//! Durable local key storage ([`RedbStore`]) and the commands of the
//! `ledgerbox` binary: key management, sealing and opening boxes by hand, and
//! driving the access-credential handshake.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod commands;
mod error;
mod store;

pub use commands::{Command, Context, KeyCommand, run};
pub use error::CliError;
pub use store::RedbStore;
