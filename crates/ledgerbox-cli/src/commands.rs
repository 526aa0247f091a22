//! Command definitions and execution.
//!
//! Commands run against local state only: the key store and the readiness
//! handshake. Boxes are printed and read as base64 so they can be passed to
//! whatever submits them to the ledger.
//!
//! Peer keys are given on the command line and resolved through
//! [`PeerKeyRequest::local_key`], the same validation the client applies
//! before any ledger lookup. Account lookups need a ledger connection and are
//! not offered here.

use std::{io::Write, path::Path};

use clap::Subcommand;
use ledgerbox_core::{
    BoxCodec, ClientConfig, Environment, Error as CoreError, KeyStore, KeyValueStore,
    PeerKeyRequest, ReadinessHandshake, SystemEnv,
    encoding::{decode_box, decode_secret, encode},
};
use ledgerbox_crypto::{KEY_SIZE, PublicKey};
use tracing::info;

use crate::{error::CliError, store::RedbStore};

/// Top-level command.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Manage the encryption key pair
    #[command(subcommand)]
    Key(KeyCommand),

    /// Seal a message to a peer's public key
    Seal {
        /// Recipient public key (base64)
        #[arg(long)]
        to: String,
        /// Message text
        message: String,
    },

    /// Open a box a peer sealed to this identity
    Open {
        /// Sender public key (base64)
        #[arg(long)]
        from: String,
        /// Sealed box (base64)
        sealed: String,
    },

    /// Check for an access credential, minting a temporary key if none exists
    Ready,

    /// Commit the temporary key once it has been registered on the ledger
    Confirm,
}

/// Key management command.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum KeyCommand {
    /// Print the public key, generating the key pair on first use
    Show,

    /// Replace the key pair
    Rotate {
        /// New secret key (base64); random if omitted
        #[arg(long)]
        secret: Option<String>,
    },
}

/// Local state a command runs against.
pub struct Context<S: KeyValueStore, E: Environment> {
    store: S,
    env: E,
    config: ClientConfig,
}

impl<S: KeyValueStore, E: Environment> Context<S, E> {
    /// Create a context for the identity and network in `config`.
    pub fn new(store: S, env: E, config: ClientConfig) -> Self {
        Self { store, env, config }
    }

    fn key_store(&self) -> KeyStore<S, E> {
        KeyStore::new(self.store.clone(), self.env.clone())
    }

    fn readiness(&self) -> ReadinessHandshake<S, E> {
        ReadinessHandshake::new(
            self.store.clone(),
            self.env.clone(),
            &self.config.network_id,
            &self.config.account_id,
        )
    }
}

impl Context<RedbStore, SystemEnv> {
    /// Open the key database at `path` for the identity in `config`.
    ///
    /// # Errors
    ///
    /// - `Store`: if the database cannot be opened or created
    pub fn open(path: impl AsRef<Path>, config: ClientConfig) -> Result<Self, CliError> {
        Ok(Self::new(RedbStore::open(path)?, SystemEnv::new(), config))
    }
}

/// Execute `command`, writing its result to `out`.
///
/// # Errors
///
/// - `Core`: if a key or box argument is invalid or authentication fails
/// - `Store`: if the key database fails
/// - `Output`: if writing to `out` fails
pub fn run<S, E>(
    command: &Command,
    context: &Context<S, E>,
    out: &mut impl Write,
) -> Result<(), CliError>
where
    S: KeyValueStore,
    E: Environment,
{
    let identity = context.config.identity();

    match command {
        Command::Key(KeyCommand::Show) => {
            let public_key = context.key_store().public_key_encoded(&identity)?;
            writeln!(out, "{public_key}")?;
        },
        Command::Key(KeyCommand::Rotate { secret }) => {
            let secret = match secret {
                Some(encoded) => decode_secret(encoded)?,
                None => context.env.random_array::<KEY_SIZE>().to_vec().into(),
            };
            let mut keys = context.key_store();
            let pair = keys.update_key_pair(&identity, &secret)?;
            writeln!(out, "{}", encode(pair.public_key().as_bytes()))?;
        },
        Command::Seal { to, message } => {
            let recipient = peer_key(to)?;
            let mut keys = context.key_store();
            let pair = keys.get_or_create_key_pair(&identity)?;

            let sealed = BoxCodec::new(context.env.clone()).seal_box(
                message.as_bytes(),
                recipient.as_bytes(),
                pair.secret_key().as_bytes(),
            )?;
            writeln!(out, "{}", encode(sealed.as_bytes()))?;
        },
        Command::Open { from, sealed } => {
            let sender = peer_key(from)?;
            let sealed = decode_box(sealed)?;
            let mut keys = context.key_store();
            let pair = keys.get_or_create_key_pair(&identity)?;

            let plaintext = BoxCodec::new(context.env.clone()).open_box(
                &sealed,
                sender.as_bytes(),
                pair.secret_key().as_bytes(),
            )?;
            writeln!(out, "{}", String::from_utf8_lossy(&plaintext))?;
        },
        Command::Ready => {
            let readiness = context.readiness();
            if readiness.probe_ready()? {
                writeln!(out, "ready")?;
            } else if let Some(public_key) = readiness.pending_public_key() {
                info!(account_id = %context.config.account_id, "access key awaiting registration");
                writeln!(out, "pending {public_key}")?;
            }
        },
        Command::Confirm => {
            context.readiness().confirm_key_injected()?;
            writeln!(out, "ready")?;
        },
    }

    Ok(())
}

fn peer_key(encoded: &str) -> Result<PublicKey, CliError> {
    PeerKeyRequest::from_encoded(encoded)
        .local_key()?
        .ok_or(CliError::Core(CoreError::MissingParameters("peer public key")))
}

#[cfg(test)]
mod tests {
    use ledgerbox_core::MemoryStore;
    use ledgerbox_crypto::KeyPair;

    use super::*;

    fn context(store: &MemoryStore, account_id: &str) -> Context<MemoryStore, SystemEnv> {
        Context::new(
            store.clone(),
            SystemEnv::new(),
            ClientConfig::new("testnet", account_id, "chat"),
        )
    }

    fn output(command: &Command, context: &Context<MemoryStore, SystemEnv>) -> String {
        let mut out = Vec::new();
        run(command, context, &mut out).unwrap();
        String::from_utf8(out).unwrap().trim_end().to_string()
    }

    #[test]
    fn key_show_is_stable() {
        let store = MemoryStore::new();
        let context = context(&store, "alice.near");

        let first = output(&Command::Key(KeyCommand::Show), &context);
        let second = output(&Command::Key(KeyCommand::Show), &context);

        assert_eq!(first, second);
    }

    #[test]
    fn rotate_with_explicit_secret() {
        let store = MemoryStore::new();
        let context = context(&store, "alice.near");
        let secret = [0x11; KEY_SIZE];

        let rotated = output(
            &Command::Key(KeyCommand::Rotate { secret: Some(encode(&secret)) }),
            &context,
        );

        assert_eq!(rotated, encode(KeyPair::generate(secret).public_key().as_bytes()));
        assert_eq!(output(&Command::Key(KeyCommand::Show), &context), rotated);
    }

    #[test]
    fn seal_then_open_between_identities() {
        let alice_store = MemoryStore::new();
        let bob_store = MemoryStore::new();
        let alice = context(&alice_store, "alice.near");
        let bob = context(&bob_store, "bob.near");

        let alice_key = output(&Command::Key(KeyCommand::Show), &alice);
        let bob_key = output(&Command::Key(KeyCommand::Show), &bob);

        let sealed =
            output(&Command::Seal { to: bob_key, message: "see you at noon".to_string() }, &alice);
        let opened = output(&Command::Open { from: alice_key, sealed }, &bob);

        assert_eq!(opened, "see you at noon");
    }

    #[test]
    fn open_with_wrong_sender_fails() {
        let store = MemoryStore::new();
        let alice = context(&store, "alice.near");
        let bob = context(&MemoryStore::new(), "bob.near");
        let bob_key = output(&Command::Key(KeyCommand::Show), &bob);

        let sealed = output(&Command::Seal { to: bob_key.clone(), message: "hi".to_string() }, &alice);
        let result = run(&Command::Open { from: bob_key, sealed }, &bob, &mut Vec::new());

        assert!(matches!(result, Err(CliError::Core(_))));
    }

    #[test]
    fn seal_rejects_malformed_recipient_key() {
        let store = MemoryStore::new();
        let alice = context(&store, "alice.near");

        let result = run(
            &Command::Seal { to: encode(&[7u8; 20]), message: "hi".to_string() },
            &alice,
            &mut Vec::new(),
        );

        assert!(matches!(
            result,
            Err(CliError::Core(ledgerbox_core::Error::Crypto(
                ledgerbox_crypto::CryptoError::InvalidPeerKey { .. }
            )))
        ));
    }

    #[test]
    fn ready_then_confirm() {
        let store = MemoryStore::new();
        let context = context(&store, "alice.near");

        let pending = output(&Command::Ready, &context);
        assert!(pending.starts_with("pending ed25519:"));

        // Same temporary key on a second probe
        assert_eq!(output(&Command::Ready, &context), pending);

        assert_eq!(output(&Command::Confirm, &context), "ready");
        assert_eq!(output(&Command::Ready, &context), "ready");
    }

    #[test]
    fn confirm_without_pending_key_fails() {
        let store = MemoryStore::new();
        let result = run(&Command::Confirm, &context(&store, "alice.near"), &mut Vec::new());

        assert!(matches!(result, Err(CliError::Core(ledgerbox_core::Error::NothingPending))));
    }
}
