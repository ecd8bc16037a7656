//! Opening encrypted messages.
//!
//! Public-key session keys are tried first, with secret keys found by key
//! id (a wildcard id tries every key of the right algorithm). If none opens
//! the message, passphrase session keys are tried with passphrases from a
//! [`PassphraseProvider`], re-prompting until one works or the provider
//! gives up.
//!
//! Signature verification happens after decryption and never fails it: the
//! outcome is reported in [`Decrypted::verification`].

use std::collections::VecDeque;

use async_trait::async_trait;
use sigil_crypto::SessionKey;
use sigil_proto::{KeyId, LiteralData, PacketCodec, PublicKeyEsk, SecretKey, packets::UnlockedSecret};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::{
    block::{EncryptedMessage, Message, MessageBody, TransferableKey, VerifyResult, parse_message},
    config::ParseConfig,
    error::{Error, Result},
    registry::AlgorithmRegistry,
};

/// What a passphrase is wanted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassphraseRequest {
    /// A passphrase session key of the message
    Message,
    /// The protected secret key with this id
    Key(KeyId),
}

/// Supplies passphrases on demand.
#[async_trait]
pub trait PassphraseProvider: Send {
    /// Next candidate for `request`, or `None` to give up.
    ///
    /// Called again after a wrong passphrase.
    async fn passphrase(&mut self, request: PassphraseRequest) -> Option<Zeroizing<Vec<u8>>>;
}

/// Hands out a fixed list of passphrases in order, whatever the request.
#[derive(Default)]
pub struct StaticPassphrases {
    remaining: VecDeque<Zeroizing<Vec<u8>>>,
}

impl StaticPassphrases {
    /// Provider yielding `passphrases` once each.
    pub fn new<I, P>(passphrases: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let remaining = passphrases.into_iter().map(|p| Zeroizing::new(p.as_ref().to_vec())).collect();
        Self { remaining }
    }
}

impl std::fmt::Debug for StaticPassphrases {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticPassphrases").field("remaining", &self.remaining.len()).finish()
    }
}

#[async_trait]
impl PassphraseProvider for StaticPassphrases {
    async fn passphrase(&mut self, _request: PassphraseRequest) -> Option<Zeroizing<Vec<u8>>> {
        self.remaining.pop_front()
    }
}

/// A decrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    /// Plaintext
    pub literal: LiteralData,
    /// Innermost message, compression removed
    pub message: Message,
    /// Signature outcome; empty when the message is unsigned
    pub verification: VerifyResult,
}

/// Decrypts messages with a set of secret keys.
#[derive(Debug, Clone)]
pub struct Decryptor<'a> {
    registry: &'a AlgorithmRegistry,
    secret_keys: &'a [TransferableKey],
    verification_keys: &'a [TransferableKey],
    config: ParseConfig,
    now: u64,
}

impl<'a> Decryptor<'a> {
    /// Decryptor using `secret_keys`. Signatures are checked against the
    /// same keys unless [`Decryptor::verify_with`] says otherwise.
    #[must_use]
    pub fn new(registry: &'a AlgorithmRegistry, secret_keys: &'a [TransferableKey]) -> Self {
        Self {
            registry,
            secret_keys,
            verification_keys: secret_keys,
            config: ParseConfig::default(),
            now: 0,
        }
    }

    /// Keys used to check signatures.
    #[must_use]
    pub fn verify_with(mut self, keys: &'a [TransferableKey]) -> Self {
        self.verification_keys = keys;
        self
    }

    /// Limits for inner message parsing.
    #[must_use]
    pub fn with_config(mut self, config: ParseConfig) -> Self {
        self.config = config;
        self
    }

    /// Time against which signature expiry is judged.
    #[must_use]
    pub fn at(mut self, now: u64) -> Self {
        self.now = now;
        self
    }

    /// Decrypt (if encrypted), strip compression and verify.
    ///
    /// # Errors
    ///
    /// - `Error::MissingPassphrase` / `Error::WrongPassphrase` if the only
    ///   usable session keys need a passphrase that was not supplied
    /// - `Error::Decrypt` if no key opens the message
    /// - `Error::Parse` if the plaintext is not a literal message
    pub async fn decrypt(
        &self,
        message: &Message,
        provider: &mut (dyn PassphraseProvider + '_),
    ) -> Result<Decrypted> {
        let inner = match message.body() {
            MessageBody::Encrypted(encrypted) => self.open(encrypted, provider).await?,
            _ => message.clone(),
        };
        let (inner, verification) = inner
            .open_compression(self.registry, self.verification_keys, self.now, &self.config)
            .await?;
        let MessageBody::Literal(literal) = inner.body() else {
            return Err(Error::parse("decrypted message holds no literal data"));
        };
        let literal = literal.clone();

        info!(
            len = literal.data.len(),
            verified = verification.success.len(),
            failed = verification.failure.len(),
            "message decrypted"
        );
        Ok(Decrypted { literal, message: inner, verification })
    }

    /// Recover the session key and parse the inner message.
    ///
    /// # Errors
    ///
    /// See [`Decryptor::decrypt`].
    pub async fn open(
        &self,
        encrypted: &EncryptedMessage,
        provider: &mut (dyn PassphraseProvider + '_),
    ) -> Result<Message> {
        let mut last_error = None;

        for esk in encrypted.public_key_esks() {
            for secret in self.candidates(esk) {
                // any failure here only rules out this key
                let session = match self.recover_session_key(esk, secret, provider).await {
                    Ok(session) => session,
                    Err(err) => {
                        warn!(key_id = %secret.public.key_id(), %err, "session key not recovered");
                        last_error = Some(err);
                        continue;
                    },
                };
                match open_data(encrypted, &session) {
                    Ok(message) => return Ok(message),
                    Err(err) if is_fatal(&err) => return Err(err),
                    Err(err) => {
                        warn!(key_id = %secret.public.key_id(), %err, "session key did not open message");
                        last_error = Some(err);
                    },
                }
            }
        }

        if encrypted.symmetric_esks().next().is_none() {
            return Err(last_error.unwrap_or_else(|| Error::Decrypt("no keys found for message".into())));
        }

        let mut error = Error::MissingPassphrase;
        while let Some(passphrase) = provider.passphrase(PassphraseRequest::Message).await {
            for esk in encrypted.symmetric_esks() {
                let Some(session) = esk.decrypt_session_key(&passphrase)? else { continue };
                match open_data(encrypted, &session) {
                    Ok(message) => return Ok(message),
                    // a wrong passphrase can decode to any cipher id
                    Err(err @ (Error::Decrypt(_) | Error::Unsupported(_))) => {
                        debug!(%err, "passphrase session key rejected");
                    },
                    Err(err) => return Err(err),
                }
            }
            error = Error::WrongPassphrase;
        }
        Err(error)
    }

    fn candidates<'k>(&'k self, esk: &'k PublicKeyEsk) -> impl Iterator<Item = &'k SecretKey> + 'k {
        self.secret_keys.iter().flat_map(TransferableKey::secret_keys).filter(move |key| {
            if esk.key_id.is_wildcard() {
                key.public.algorithm() == esk.algorithm
            } else {
                key.public.key_id() == esk.key_id
            }
        })
    }

    async fn recover_session_key(
        &self,
        esk: &PublicKeyEsk,
        secret: &SecretKey,
        provider: &mut (dyn PassphraseProvider + '_),
    ) -> Result<SessionKey> {
        let wrapper = self.registry.wrapper(esk.algorithm)?;
        let unlocked = unlock(secret, provider).await?;
        let plaintext = wrapper.unwrap(&secret.public, &unlocked, &esk.material).await?;
        let session = SessionKey::from_checksummed(&plaintext)?;
        debug!(key_id = %secret.public.key_id(), algorithm = ?session.algorithm(), "session key recovered");
        Ok(session)
    }
}

/// Errors from the data packet that no other session key can fix.
fn is_fatal(err: &Error) -> bool {
    matches!(err, Error::Unsupported(_) | Error::Serialization(_) | Error::Cancelled)
}

async fn unlock(secret: &SecretKey, provider: &mut (dyn PassphraseProvider + '_)) -> Result<UnlockedSecret> {
    if !secret.is_protected() {
        return Ok(secret.unlock(None)?);
    }
    let request = PassphraseRequest::Key(secret.public.key_id());
    let mut error = Error::MissingPassphrase;
    while let Some(passphrase) = provider.passphrase(request).await {
        match secret.unlock(Some(passphrase.as_slice())) {
            Ok(unlocked) => return Ok(unlocked),
            Err(err) => {
                let err = Error::from(err);
                if err != Error::WrongPassphrase {
                    return Err(err);
                }
                error = err;
            },
        }
    }
    Err(error)
}

fn open_data(encrypted: &EncryptedMessage, session: &SessionKey) -> Result<Message> {
    let plaintext = encrypted.decrypt_data(session)?;
    let packets = PacketCodec::standard().parse_stream(&plaintext)?;
    parse_message(&packets)
}

#[cfg(test)]
mod tests {
    use sigil_crypto::SymmetricAlgorithm;
    use sigil_proto::{SymEncryptedProtectedData, SymmetricKeyEsk};

    use super::*;
    use crate::block::{EncryptedData, Esk};

    fn passphrase_message(passphrase: &[u8]) -> Message {
        let session = SessionKey::new(SymmetricAlgorithm::Aes128, &[4; 16]).unwrap();
        let inner = Message::construct_literal("secret", "", 0).serialize().unwrap();
        let data = SymEncryptedProtectedData::encrypt(&session, &[1; 16], &inner).unwrap();
        let esk = SymmetricKeyEsk::construct(passphrase, &session, [2; 8]).unwrap();
        Message::new(
            Vec::new(),
            MessageBody::Encrypted(EncryptedMessage {
                esks: vec![Esk::Symmetric(esk)],
                data: EncryptedData::Protected(data),
            }),
        )
    }

    #[tokio::test]
    async fn passphrase_is_reprompted_until_correct() {
        let registry = AlgorithmRegistry::standard();
        let message = passphrase_message(b"right");
        let mut provider = StaticPassphrases::new(["wrong", "also wrong", "right"]);

        let decrypted = Decryptor::new(&registry, &[]).decrypt(&message, &mut provider).await.unwrap();
        assert_eq!(decrypted.literal.data.as_ref(), b"secret");
        assert_eq!(decrypted.verification, VerifyResult::default());
    }

    #[tokio::test]
    async fn passphrase_errors_are_recoverable() {
        let registry = AlgorithmRegistry::standard();
        let message = passphrase_message(b"right");
        let decryptor = Decryptor::new(&registry, &[]);

        let err = decryptor.decrypt(&message, &mut StaticPassphrases::default()).await.unwrap_err();
        assert_eq!(err, Error::MissingPassphrase);
        assert!(err.is_recoverable());

        let err = decryptor.decrypt(&message, &mut StaticPassphrases::new(["no"])).await.unwrap_err();
        assert_eq!(err, Error::WrongPassphrase);
    }

    #[tokio::test]
    async fn plain_messages_pass_through() {
        let registry = AlgorithmRegistry::standard();
        let message = Message::construct_literal("open", "", 0);
        let decrypted = Decryptor::new(&registry, &[])
            .decrypt(&message, &mut StaticPassphrases::default())
            .await
            .unwrap();
        assert_eq!(decrypted.literal.data.as_ref(), b"open");
    }

    #[tokio::test]
    async fn no_matching_key_is_a_decrypt_error() {
        let registry = AlgorithmRegistry::standard();
        let message = passphrase_message(b"x");
        let MessageBody::Encrypted(mut encrypted) = message.body().clone() else { unreachable!() };
        encrypted.esks.clear();

        let err = Decryptor::new(&registry, &[])
            .open(&encrypted, &mut StaticPassphrases::default())
            .await
            .unwrap_err();
        insta::assert_snapshot!(err, @"decryption failed: no keys found for message");
    }
}
