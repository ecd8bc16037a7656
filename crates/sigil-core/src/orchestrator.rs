//! Encrypted message construction.
//!
//! ```text
//! literal ─▶ [one-pass sign] ─▶ compress ─▶ SEIPD(session key)
//!                                                │
//! passphrases ─▶ SK-ESK (inline)                 │
//! recipients  ─▶ PK-ESK (JoinSet, one task each) ┴─▶ Message
//! ```
//!
//! Recipient wraps run concurrently. The join propagates the first failure,
//! honours a [`CancellationToken`] and an optional per-recipient timeout, and
//! aborts every task still in flight when it returns early (dropping the
//! [`JoinSet`] aborts its tasks). ESKs are emitted in caller order, not
//! completion order: passphrase ESKs first, then one PK-ESK per recipient.

use std::sync::Arc;

use sigil_crypto::{HashAlgorithm, SessionKey};
use sigil_proto::{LiteralData, PublicKey, PublicKeyEsk, SymEncryptedProtectedData, SymmetricKeyEsk};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::{
    block::{EncryptedData, EncryptedMessage, Esk, Message, MessageBody},
    config::OrchestratorConfig,
    env::Environment,
    error::{Error, Result},
    registry::AlgorithmRegistry,
    signing::SigningKey,
};

/// Hash used for one-pass message signatures.
const MESSAGE_HASH: HashAlgorithm = HashAlgorithm::Sha256;

/// Builds encrypted messages.
///
/// # Invariants
///
/// - One fresh session key per `construct` call; it never leaves the call.
/// - A failed or cancelled construction returns no message and leaves no
///   recipient task running.
#[derive(Debug, Clone)]
pub struct CipherOrchestrator<E: Environment> {
    env: E,
    registry: Arc<AlgorithmRegistry>,
    config: OrchestratorConfig,
}

impl<E: Environment> CipherOrchestrator<E> {
    /// Orchestrator with an explicit registry and configuration.
    pub fn new(env: E, registry: Arc<AlgorithmRegistry>, config: OrchestratorConfig) -> Self {
        Self { env, registry, config }
    }

    /// Orchestrator with the standard registry and default configuration.
    pub fn with_defaults(env: E) -> Self {
        Self::new(env, AlgorithmRegistry::standard(), OrchestratorConfig::default())
    }

    /// Active configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Encrypt `literal` to every public key and passphrase.
    ///
    /// With a signing key the literal is wrapped in a one-pass signature
    /// before compression.
    ///
    /// # Errors
    ///
    /// - `Error::Cancelled` if `cancel` fires before the join completes
    /// - `Error::Timeout` if a recipient exceeds the configured timeout
    /// - `Error::Unsupported` if a recipient's algorithm has no wrapper
    /// - any error from signing, compression or a recipient wrap
    pub async fn construct(
        &self,
        literal: LiteralData,
        public_keys: &[PublicKey],
        passphrases: &[&[u8]],
        signing_key: Option<&SigningKey>,
        cancel: &CancellationToken,
    ) -> Result<Message> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let session = SessionKey::generate(self.config.symmetric_algorithm, |buf| {
            self.env.random_bytes(buf);
        })?;

        let mut message = Message::from(literal);
        if let Some(key) = signing_key {
            message.sign_with_one_pass(&self.registry, key, MESSAGE_HASH, self.env.timestamp()).await?;
        }
        let inner = message.compress(self.config.compression)?.serialize()?;

        let mut prefix = vec![0u8; session.algorithm().block_size()?];
        self.env.random_bytes(&mut prefix);
        let data = SymEncryptedProtectedData::encrypt(&session, &prefix, &inner)?;

        let mut esks = Vec::with_capacity(passphrases.len() + public_keys.len());
        for passphrase in passphrases {
            let esk = SymmetricKeyEsk::construct(passphrase, &session, self.env.random_array())?;
            esks.push(Esk::Symmetric(esk));
        }
        esks.extend(self.wrap_all(&session, public_keys, cancel).await?.into_iter().map(Esk::PublicKey));

        info!(
            recipients = public_keys.len(),
            passphrases = passphrases.len(),
            signed = signing_key.is_some(),
            len = inner.len(),
            "encrypted message constructed"
        );
        Ok(Message::new(
            Vec::new(),
            MessageBody::Encrypted(EncryptedMessage { esks, data: EncryptedData::Protected(data) }),
        ))
    }

    /// Wrap the session key for every recipient concurrently.
    async fn wrap_all(
        &self,
        session: &SessionKey,
        public_keys: &[PublicKey],
        cancel: &CancellationToken,
    ) -> Result<Vec<PublicKeyEsk>> {
        // Nothing to join: never wait on a task set that was not started
        if public_keys.is_empty() {
            return Ok(Vec::new());
        }

        let plaintext = Arc::new(session.to_checksummed());
        let mut tasks = JoinSet::new();
        for (index, recipient) in public_keys.iter().enumerate() {
            let wrapper = self.registry.wrapper(recipient.algorithm())?;
            let mut ephemeral = Zeroizing::new(vec![0u8; wrapper.ephemeral_len()]);
            self.env.random_bytes(&mut ephemeral);

            let recipient = recipient.clone();
            let plaintext = Arc::clone(&plaintext);
            let timeout = self.config.recipient_timeout;
            tasks.spawn(async move {
                let wrap = wrapper.wrap(&recipient, &plaintext, ephemeral);
                let material = match timeout {
                    Some(after) => tokio::time::timeout(after, wrap)
                        .await
                        .map_err(|_| Error::Timeout { recipient: index, after })??,
                    None => wrap.await?,
                };
                debug!(recipient = index, key_id = %recipient.key_id(), "session key wrapped");
                Ok::<_, Error>((index, PublicKeyEsk {
                    key_id: recipient.key_id(),
                    algorithm: recipient.algorithm(),
                    material,
                }))
            });
        }

        let mut slots: Vec<Option<PublicKeyEsk>> = vec![None; public_keys.len()];
        loop {
            let joined = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(pending = tasks.len(), "construction cancelled");
                    return Err(Error::Cancelled);
                },
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else { break };
            let (index, esk) = match joined {
                Ok(result) => result?,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(_) => return Err(Error::Cancelled),
            };
            slots[index] = Some(esk);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| Error::InvalidArguments(format!("recipient {index} produced no key")))
            })
            .collect()
    }
}
