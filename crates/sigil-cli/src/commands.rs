//! Subcommand implementations.

use std::{path::Path, slice, time::Duration};

use sigil_core::{
    AlgorithmRegistry, Block, CipherOrchestrator, ClearSignMessage, Decryptor, Environment,
    KeyGenerator, Message, MessageBody, OrchestratorConfig, ParseConfig, SigningKey,
    StaticPassphrases, SystemEnv, TransferableKey, VerifyResult,
    block::{EncryptedData, Esk, MessageSignature},
};
use sigil_crypto::{AesKeyWrap, SymmetricAlgorithm};
use sigil_proto::{LiteralData, PublicKey, packets::LiteralFormat};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::{
    cli::{Command, DecryptArgs, EncryptArgs, KeygenArgs, KeywrapOp},
    error::{CliError, Result},
    io::{parse_input, read_input, read_keys, report, write_output},
};

/// Run one subcommand to completion.
pub async fn run(command: Command) -> Result<()> {
    match command {
        Command::Inspect { input } => {
            let lines = inspect(&read_input(input.as_deref())?)?;
            write_output(None, lines_to_bytes(&lines).as_slice())
        },
        Command::Keygen(args) => {
            let (secret, public) = keygen(&args).await?;
            write_output(args.output.as_deref(), secret.as_bytes())?;
            match &args.public_output {
                Some(path) => write_output(Some(path), public.as_bytes()),
                None => Ok(()),
            }
        },
        Command::Encrypt(args) => {
            let data = read_input(args.input.as_deref())?;
            let output = encrypt(&args, data).await?;
            write_output(args.output.as_deref(), &output)
        },
        Command::Decrypt(args) => {
            let data = read_input(args.input.as_deref())?;
            let (plaintext, verification) = decrypt(&args, &data).await?;
            report(&verification_report(&verification))?;
            write_output(args.output.as_deref(), &plaintext)
        },
        Command::Keywrap { op } => {
            let mut hex = keywrap(&op)?;
            hex.push('\n');
            write_output(None, hex.as_bytes())
        },
    }
}

fn lines_to_bytes(lines: &[String]) -> Vec<u8> {
    lines.iter().flat_map(|line| line.bytes().chain(std::iter::once(b'\n'))).collect()
}

/// One line per block, packet group and key, indented by nesting depth.
pub fn inspect(data: &[u8]) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for block in parse_input(data)? {
        match &block {
            Block::Message(message) => describe_message(message, 0, &mut lines),
            Block::PublicKey(key) | Block::SecretKey(key) => describe_key(key, &mut lines),
            Block::ClearSign(message) => describe_clearsign(message, &mut lines),
        }
    }
    Ok(lines)
}

fn describe_message(message: &Message, depth: usize, lines: &mut Vec<String>) {
    let pad = "  ".repeat(depth);
    for signature in message.signatures() {
        match signature {
            MessageSignature::Plain(sig) => lines.push(format!(
                "{pad}signature by {} ({:?}, {:?})",
                sig.issuer(),
                sig.pk_algorithm,
                sig.hash_algorithm
            )),
            MessageSignature::OnePass(_) => {
                lines.push(format!("{pad}one-pass signature by {}", signature.key_id()));
            },
        }
    }

    match message.body() {
        MessageBody::Literal(literal) => lines.push(format!(
            "{pad}literal data: {:?}, {} bytes, filename {:?}",
            literal.format,
            literal.data.len(),
            String::from_utf8_lossy(&literal.filename)
        )),
        MessageBody::Compressed(compressed) => {
            lines.push(format!(
                "{pad}compressed data: {:?}, {} bytes",
                compressed.algorithm,
                compressed.data.len()
            ));
            match message.decompress(&ParseConfig::default()) {
                Ok(inner) => describe_message(&inner, depth + 1, lines),
                Err(err) => lines.push(format!("{pad}  cannot decompress: {err}")),
            }
        },
        MessageBody::Encrypted(encrypted) => {
            let protected = matches!(encrypted.data, EncryptedData::Protected(_));
            lines.push(format!(
                "{pad}encrypted data: {} session key(s), integrity protected: {protected}",
                encrypted.esks.len()
            ));
            for esk in &encrypted.esks {
                match esk {
                    Esk::PublicKey(esk) => {
                        lines.push(format!("{pad}  recipient {} ({:?})", esk.key_id, esk.algorithm));
                    },
                    Esk::Symmetric(esk) => lines.push(format!("{pad}  passphrase ({:?})", esk.algorithm)),
                }
            }
        },
    }
}

fn describe_key(key: &TransferableKey, lines: &mut Vec<String>) {
    let kind = if key.is_secret() { "secret" } else { "public" };
    let primary = key.primary_key();
    lines.push(format!("{kind} key {} ({:?})", key.key_id(), primary.algorithm()));
    for user_id in key.user_ids() {
        lines.push(format!("  user id: {user_id}"));
    }
    for subkey in key.subkeys() {
        let public = subkey.key.public();
        lines.push(format!("  subkey {} ({:?})", public.key_id(), public.algorithm()));
    }
    if let Some(encrypt) = key.key_to_encrypt() {
        lines.push(format!("  encrypts with {}", encrypt.key_id()));
    }
    if let Some(sign) = key.key_to_sign() {
        lines.push(format!("  signs with {}", sign.key_id()));
    }
}

fn describe_clearsign(message: &ClearSignMessage, lines: &mut Vec<String>) {
    lines.push(format!("cleartext signed text: {} bytes", message.text().len()));
    for sig in message.signatures() {
        lines.push(format!(
            "  signature by {} ({:?}, {:?})",
            sig.issuer(),
            sig.pk_algorithm,
            sig.hash_algorithm
        ));
    }
}

/// Generate a key; returns the armored secret and public keys.
pub async fn keygen(args: &KeygenArgs) -> Result<(String, String)> {
    let generator = KeyGenerator::new(SystemEnv::new(), AlgorithmRegistry::standard());
    let key = generator.generate(&args.user_id, args.passphrase.as_deref().map(str::as_bytes)).await?;
    let public = key.to_public();
    Ok((Block::SecretKey(key).to_armored()?, Block::PublicKey(public).to_armored()?))
}

fn encryption_key(key: &TransferableKey) -> Result<PublicKey> {
    key.key_to_encrypt()
        .cloned()
        .ok_or_else(|| CliError::Usage(format!("key {} has no encryption key", key.key_id())))
}

fn load_signing_key(path: &Path, passphrase: Option<&str>) -> Result<SigningKey> {
    let keys = read_keys(slice::from_ref(&path.to_path_buf()))?;
    let no_key = || CliError::Usage(format!("{}: no secret signing key", path.display()));
    let key = keys.iter().find(|key| key.is_secret()).ok_or_else(no_key)?;
    let public = key.key_to_sign().ok_or_else(no_key)?;
    let secret = key.secret_key_by_id(public.key_id()).ok_or_else(no_key)?;
    Ok(SigningKey::unlock(secret, passphrase.map(str::as_bytes))?)
}

/// Encrypt `data` as described by `args`; returns the encoded message.
///
/// Ctrl-c cancels the construction.
pub async fn encrypt(args: &EncryptArgs, data: Vec<u8>) -> Result<Vec<u8>> {
    let public_keys =
        read_keys(&args.recipient)?.iter().map(encryption_key).collect::<Result<Vec<_>>>()?;
    if public_keys.is_empty() && args.passphrase.is_empty() {
        return Err(CliError::Usage("need at least one --recipient or --passphrase".into()));
    }
    let signer = match &args.sign_key {
        Some(path) => Some(load_signing_key(path, args.sign_passphrase.as_deref())?),
        None => None,
    };

    let env = SystemEnv::new();
    let filename = args
        .input
        .as_deref()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let literal = LiteralData::new(LiteralFormat::Binary, filename, env.timestamp(), data);

    let defaults = OrchestratorConfig::default();
    let config = OrchestratorConfig {
        recipient_timeout: args.timeout_ms.map(Duration::from_millis).or(defaults.recipient_timeout),
        symmetric_algorithm: args.cipher.into(),
        compression: args.compression.into(),
    };
    let orchestrator = CipherOrchestrator::new(env, AlgorithmRegistry::standard(), config);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling encryption");
            on_interrupt.cancel();
        }
    });
    let passphrases: Vec<&[u8]> = args.passphrase.iter().map(String::as_bytes).collect();
    let result =
        orchestrator.construct(literal, &public_keys, &passphrases, signer.as_ref(), &cancel).await;
    watcher.abort();
    let message = result?;

    info!(recipients = public_keys.len(), armor = args.armor, "message written");
    if args.armor {
        Ok(Block::Message(message).to_armored()?.into_bytes())
    } else {
        Ok(message.serialize()?.to_vec())
    }
}

/// Decrypt the first message in `data`; returns the plaintext and the
/// signature outcome.
pub async fn decrypt(args: &DecryptArgs, data: &[u8]) -> Result<(Vec<u8>, VerifyResult)> {
    let keys = read_keys(&args.key)?;
    let verification_keys = if args.verify_key.is_empty() {
        keys.iter().map(TransferableKey::to_public).collect()
    } else {
        read_keys(&args.verify_key)?
    };

    let message = match parse_input(data)?.into_iter().next() {
        Some(Block::Message(message)) => message,
        Some(other) => {
            return Err(CliError::Usage(format!("expected a message, found {}", other.armor_label())));
        },
        None => return Err(CliError::Usage("input holds no message".into())),
    };

    let registry = AlgorithmRegistry::standard();
    let mut passphrases = StaticPassphrases::new(&args.passphrase);
    let decrypted = Decryptor::new(&registry, &keys)
        .verify_with(&verification_keys)
        .at(SystemEnv::new().wall_clock_secs())
        .decrypt(&message, &mut passphrases)
        .await?;
    Ok((decrypted.literal.data.to_vec(), decrypted.verification))
}

/// One line per checked signature.
pub fn verification_report(result: &VerifyResult) -> Vec<String> {
    let good = result.success.iter().map(|key_id| format!("good signature by {key_id}"));
    let bad = result
        .failure
        .iter()
        .map(|failure| format!("BAD signature by {}: {}", failure.key_id, failure.error));
    good.chain(bad).collect()
}

fn key_wrap(kek_hex: &str) -> Result<AesKeyWrap> {
    let kek = Zeroizing::new(hex::decode(kek_hex)?);
    let algorithm = match kek.len() {
        16 => SymmetricAlgorithm::Aes128,
        24 => SymmetricAlgorithm::Aes192,
        32 => SymmetricAlgorithm::Aes256,
        n => {
            return Err(CliError::Usage(format!("key-encryption key must be 16, 24 or 32 bytes, got {n}")));
        },
    };
    Ok(AesKeyWrap::new(algorithm, &kek)?)
}

/// RFC3394 wrap or unwrap; returns lowercase hex.
pub fn keywrap(op: &KeywrapOp) -> Result<String> {
    match op {
        KeywrapOp::Wrap { kek, data } => {
            let data = Zeroizing::new(hex::decode(data)?);
            Ok(hex::encode(key_wrap(kek)?.wrap(&data)?))
        },
        KeywrapOp::Unwrap { kek, data } => {
            let unwrapped = key_wrap(kek)?.unwrap(&hex::decode(data)?)?;
            Ok(hex::encode(unwrapped.as_slice()))
        },
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use sigil_core::Error;

    use super::*;
    use crate::cli::{CipherArg, CompressionArg};

    fn encrypt_args(recipient: Vec<PathBuf>, passphrase: Vec<String>) -> EncryptArgs {
        EncryptArgs {
            recipient,
            passphrase,
            sign_key: None,
            sign_passphrase: None,
            cipher: CipherArg::Aes128,
            compression: CompressionArg::Zip,
            timeout_ms: None,
            armor: true,
            input: Some(PathBuf::from("notes/plan.txt")),
            output: None,
        }
    }

    fn decrypt_args(key: Vec<PathBuf>, passphrase: Vec<String>) -> DecryptArgs {
        DecryptArgs { key, passphrase, verify_key: Vec::new(), input: None, output: None }
    }

    async fn write_key(dir: &Path, name: &str, passphrase: Option<&str>) -> (PathBuf, PathBuf) {
        let args = KeygenArgs {
            user_id: format!("{name} <{name}@example.org>"),
            passphrase: passphrase.map(str::to_owned),
            output: None,
            public_output: None,
        };
        let (secret, public) = keygen(&args).await.unwrap();
        let secret_path = dir.join(format!("{name}.sec.asc"));
        let public_path = dir.join(format!("{name}.asc"));
        std::fs::write(&secret_path, secret).unwrap();
        std::fs::write(&public_path, public).unwrap();
        (secret_path, public_path)
    }

    #[test]
    fn inspect_literal() {
        let bytes = Message::construct_literal("hello", "a.txt", 0).serialize().unwrap();
        insta::assert_snapshot!(inspect(&bytes).unwrap().join("\n"), @r#"literal data: Text, 5 bytes, filename "a.txt""#);
    }

    #[test]
    fn keywrap_rfc3394_vector() {
        let op = KeywrapOp::Wrap {
            kek: "000102030405060708090A0B0C0D0E0F".into(),
            data: "00112233445566778899AABBCCDDEEFF".into(),
        };
        let wrapped = keywrap(&op).unwrap();
        assert_eq!(wrapped, "1fa68b0a8112b447aef34bd8fb5a7b829d3e862371d2cfe5");

        let op = KeywrapOp::Unwrap { kek: "000102030405060708090A0B0C0D0E0F".into(), data: wrapped };
        assert_eq!(keywrap(&op).unwrap(), "00112233445566778899aabbccddeeff");
    }

    #[test]
    fn keywrap_rejects_odd_kek_length() {
        let op = KeywrapOp::Wrap { kek: "0011".into(), data: "00".repeat(16) };
        insta::assert_snapshot!(keywrap(&op).unwrap_err(), @"key-encryption key must be 16, 24 or 32 bytes, got 2");
    }

    #[tokio::test]
    async fn generated_key_inspects_as_secret() {
        let dir = tempfile::tempdir().unwrap();
        let (secret, public) = write_key(dir.path(), "alice", None).await;

        let lines = inspect(&std::fs::read(&secret).unwrap()).unwrap();
        assert!(lines[0].starts_with("secret key "));
        assert_eq!(lines[1], "  user id: alice <alice@example.org>");

        let lines = inspect(&std::fs::read(&public).unwrap()).unwrap();
        assert!(lines[0].starts_with("public key "));
    }

    #[tokio::test]
    async fn encrypt_then_decrypt_with_key() {
        let dir = tempfile::tempdir().unwrap();
        let (secret, public) = write_key(dir.path(), "bob", None).await;

        let armored = encrypt(&encrypt_args(vec![public], Vec::new()), b"attack at dawn".to_vec()).await.unwrap();
        assert!(armored.starts_with(b"-----BEGIN PGP MESSAGE-----"));

        let lines = inspect(&armored).unwrap();
        assert_eq!(lines[0], "encrypted data: 1 session key(s), integrity protected: true");

        let (plaintext, verification) =
            decrypt(&decrypt_args(vec![secret], Vec::new()), &armored).await.unwrap();
        assert_eq!(plaintext, b"attack at dawn");
        assert!(verification_report(&verification).is_empty());
    }

    #[tokio::test]
    async fn signed_message_reports_good_signature() {
        let dir = tempfile::tempdir().unwrap();
        let (alice_secret, alice_public) = write_key(dir.path(), "alice", Some("sign pass")).await;
        let (bob_secret, bob_public) = write_key(dir.path(), "bob", None).await;

        let mut args = encrypt_args(vec![bob_public], Vec::new());
        args.sign_key = Some(alice_secret);
        args.sign_passphrase = Some("sign pass".into());
        let message = encrypt(&args, b"signed".to_vec()).await.unwrap();

        let mut args = decrypt_args(vec![bob_secret], Vec::new());
        args.verify_key = vec![alice_public.clone()];
        let (plaintext, verification) = decrypt(&args, &message).await.unwrap();
        assert_eq!(plaintext, b"signed");

        let alice = read_keys(&[alice_public]).unwrap();
        assert_eq!(verification_report(&verification), vec![format!("good signature by {}", alice[0].key_id())]);
    }

    #[tokio::test]
    async fn passphrase_only_round_trip() {
        let message = encrypt(&encrypt_args(Vec::new(), vec!["open sesame".into()]), b"cave".to_vec())
            .await
            .unwrap();

        let err = decrypt(&decrypt_args(Vec::new(), vec!["open barley".into()]), &message).await.unwrap_err();
        assert!(matches!(err, CliError::Engine(Error::WrongPassphrase)));

        let (plaintext, _) =
            decrypt(&decrypt_args(Vec::new(), vec!["open sesame".into()]), &message).await.unwrap();
        assert_eq!(plaintext, b"cave");
    }

    #[tokio::test]
    async fn encrypt_needs_a_recipient() {
        let err = encrypt(&encrypt_args(Vec::new(), Vec::new()), b"x".to_vec()).await.unwrap_err();
        insta::assert_snapshot!(err, @"need at least one --recipient or --passphrase");
    }
}
