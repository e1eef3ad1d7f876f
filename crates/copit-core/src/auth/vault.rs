//! Encrypted on-disk storage for the GitHub credential.
//!
//! The token is sealed with ChaCha20-Poly1305 under a key derived (Argon2id)
//! from a machine passphrase built from the hostname and the local account
//! name, plus a random per-record salt. This keeps the token out of backups
//! and synced dotfiles in readable form. It does not protect against anyone
//! who can run code as the same account on the same machine: they can
//! rebuild the passphrase just as this process does.
//!
//! Older releases stored the token in plain JSON, either at the vault path or
//! in their own config file. Those are still accepted once, rewritten in the
//! encrypted format on load, and the old plaintext file is deleted.

use std::fmt;
use std::path::{Path, PathBuf};

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce, Tag};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use super::{Credential, VaultError};

/// Version written into every encrypted record.
pub const FORMAT_VERSION: u32 = 1;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Argon2id cost settings used to stretch the machine passphrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // OWASP baseline for Argon2id: 19 MiB, 2 passes, 1 lane.
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Low-entropy secret tied to this machine and account.
#[derive(Clone, PartialEq, Eq)]
pub struct MachinePassphrase(String);

impl MachinePassphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Build the passphrase from the hostname and the local account name.
    pub fn detect() -> Self {
        let host = match hostname::get() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                warn!(error = %e, "Could not read hostname, using placeholder");
                "localhost".to_string()
            }
        };

        let account = ["USER", "USERNAME", "LOGNAME"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
            .or_else(|| {
                dirs::home_dir()
                    .and_then(|home| home.file_name().map(|n| n.to_string_lossy().into_owned()))
            })
            .unwrap_or_default();

        Self(format!("{}:{}", host, account))
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for MachinePassphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MachinePassphrase(<redacted>)")
    }
}

/// Encrypted credential as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultRecord {
    pub cipher_text: String,
    pub salt: String,
    pub iv: String,
    pub auth_tag: String,
    pub username: String,
    pub format_version: u32,
}

/// Plaintext credential written by releases before encryption was added.
#[derive(Debug, Deserialize)]
struct LegacyRecord {
    token: String,
    username: String,
}

impl LegacyRecord {
    fn into_credential(self) -> Result<Credential, RecordError> {
        if self.token.is_empty() {
            return Err(RecordError::EmptyToken);
        }
        Ok(Credential::new(self.token, self.username))
    }
}

/// Any record shape that may be found on disk.
///
/// `#[serde(untagged)]` tries variants in order. `Encrypted` has to stay
/// first: a legacy record lacks its fields and falls through to `Legacy`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Encrypted(VaultRecord),
    Legacy(LegacyRecord),
}

/// Everything that can go wrong on the read path. Never leaves this module.
#[derive(Debug, Error)]
enum RecordError {
    #[error("no credential record")]
    Missing,
    #[error("failed to read record: {0}")]
    Unreadable(std::io::Error),
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported record version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid hex in {field}: {source}")]
    Encoding {
        field: &'static str,
        source: hex::FromHexError,
    },
    #[error("{field} has length {actual}, expected {expected}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("legacy record has an empty token")]
    EmptyToken,
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("authentication tag mismatch")]
    Verification,
    #[error("decrypted token is not UTF-8")]
    NotUtf8,
    #[error("decryption task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Reads and writes the encrypted credential record at a fixed path.
pub struct CredentialVault {
    path: PathBuf,
    legacy_path: Option<PathBuf>,
    passphrase: MachinePassphrase,
    kdf: KdfParams,
}

impl CredentialVault {
    /// Vault at `path` keyed by this machine's passphrase.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            legacy_path: None,
            passphrase: MachinePassphrase::detect(),
            kdf: KdfParams::default(),
        }
    }

    pub fn with_passphrase(mut self, passphrase: MachinePassphrase) -> Self {
        self.passphrase = passphrase;
        self
    }

    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Plaintext credential file of a previous install, consulted only while
    /// the vault itself holds no record.
    pub fn with_legacy_path(mut self, path: PathBuf) -> Self {
        self.legacy_path = Some(path);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encrypt and persist a credential, replacing any existing record.
    pub async fn save(&self, credential: &Credential) -> Result<(), VaultError> {
        let passphrase = self.passphrase.clone();
        let kdf = self.kdf;
        let credential = credential.clone();

        let record =
            tokio::task::spawn_blocking(move || seal(&passphrase, kdf, &credential)).await??;
        let contents = serde_json::to_string_pretty(&record)?;

        self.write_atomically(contents.as_bytes()).await?;
        debug!(path = %self.path.display(), "Credentials saved");
        Ok(())
    }

    /// Load the stored credential.
    ///
    /// Returns `None` when there is no usable record for any reason: missing,
    /// unparsable, written on another machine or account, or tampered with.
    pub async fn load(&self) -> Option<Credential> {
        match self.try_load().await {
            Ok(credential) => Some(credential),
            Err(RecordError::Missing) => {
                debug!(path = %self.path.display(), "No stored credentials");
                None
            }
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Ignoring unusable credential record");
                None
            }
        }
    }

    /// Delete the stored record, and any leftover legacy file. A missing
    /// record is not an error.
    pub async fn clear(&self) -> Result<(), VaultError> {
        for path in std::iter::once(&self.path).chain(self.legacy_path.as_ref()) {
            match fs::remove_file(path).await {
                Ok(()) => info!(path = %path.display(), "Credentials removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(VaultError::Removal {
                        path: path.clone(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }

    async fn try_load(&self) -> Result<Credential, RecordError> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return self.try_load_legacy_file().await
            }
            Err(e) => return Err(RecordError::Unreadable(e)),
        };

        match serde_json::from_slice::<StoredRecord>(&contents)? {
            StoredRecord::Encrypted(record) => {
                if record.format_version != FORMAT_VERSION {
                    return Err(RecordError::UnsupportedVersion(record.format_version));
                }
                let passphrase = self.passphrase.clone();
                let kdf = self.kdf;
                tokio::task::spawn_blocking(move || unseal(&passphrase, kdf, &record)).await?
            }
            StoredRecord::Legacy(legacy) => {
                let credential = legacy.into_credential()?;
                info!("Migrating plaintext credentials to encrypted format");
                if let Err(e) = self.save(&credential).await {
                    warn!(error = %e, "Failed to migrate plaintext credentials");
                }
                Ok(credential)
            }
        }
    }

    /// Import the plaintext file of a previous install. It is removed only
    /// once the encrypted copy is safely written.
    async fn try_load_legacy_file(&self) -> Result<Credential, RecordError> {
        let Some(ref legacy_path) = self.legacy_path else {
            return Err(RecordError::Missing);
        };
        let contents = match fs::read(legacy_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(RecordError::Missing),
            Err(e) => return Err(RecordError::Unreadable(e)),
        };

        let credential = serde_json::from_slice::<LegacyRecord>(&contents)?.into_credential()?;
        info!(from = %legacy_path.display(), "Migrating plaintext credentials from previous install");
        match self.save(&credential).await {
            Ok(()) => {
                if let Err(e) = fs::remove_file(legacy_path).await {
                    warn!(error = %e, path = %legacy_path.display(), "Failed to remove plaintext credentials");
                }
            }
            Err(e) => warn!(error = %e, "Failed to migrate plaintext credentials"),
        }
        Ok(credential)
    }

    /// Write to a sibling temp file, then rename over the record so readers
    /// never observe a partially written file.
    async fn write_atomically(&self, contents: &[u8]) -> Result<(), VaultError> {
        let persistence = |source| VaultError::Persistence {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(persistence)?;
        }

        let tmp_path = self.temp_path();
        fs::write(&tmp_path, contents).await.map_err(persistence)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = fs::set_permissions(&tmp_path, permissions).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(persistence(e));
            }
        }

        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(persistence(e));
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "credentials".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
    }
}

fn derive_key(
    passphrase: &MachinePassphrase,
    kdf: KdfParams,
    salt: &[u8],
) -> Result<[u8; KEY_LEN], argon2::Error> {
    let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(KEY_LEN))?;
    let mut key = [0u8; KEY_LEN];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params).hash_password_into(
        passphrase.as_bytes(),
        salt,
        &mut key,
    )?;
    Ok(key)
}

fn seal(
    passphrase: &MachinePassphrase,
    kdf: KdfParams,
    credential: &Credential,
) -> Result<VaultRecord, VaultError> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(passphrase, kdf, &salt)
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));

    let mut buffer = credential.token.as_bytes().to_vec();
    let tag = cipher
        .encrypt_in_place_detached(
            Nonce::from_slice(&iv),
            credential.username.as_bytes(),
            &mut buffer,
        )
        .map_err(|_| VaultError::Encryption)?;

    Ok(VaultRecord {
        cipher_text: hex::encode(&buffer),
        salt: hex::encode(salt),
        iv: hex::encode(iv),
        auth_tag: hex::encode(tag),
        username: credential.username.clone(),
        format_version: FORMAT_VERSION,
    })
}

fn unseal(
    passphrase: &MachinePassphrase,
    kdf: KdfParams,
    record: &VaultRecord,
) -> Result<Credential, RecordError> {
    let salt = decode_field("salt", &record.salt, None)?;
    let iv = decode_field("iv", &record.iv, Some(NONCE_LEN))?;
    let tag = decode_field("authTag", &record.auth_tag, Some(TAG_LEN))?;
    let mut buffer = decode_field("cipherText", &record.cipher_text, None)?;

    let key = derive_key(passphrase, kdf, &salt)
        .map_err(|e| RecordError::KeyDerivation(e.to_string()))?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));

    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&iv),
            record.username.as_bytes(),
            &mut buffer,
            Tag::from_slice(&tag),
        )
        .map_err(|_| RecordError::Verification)?;

    let token = String::from_utf8(buffer).map_err(|_| RecordError::NotUtf8)?;
    Ok(Credential::new(token, record.username.clone()))
}

fn decode_field(
    field: &'static str,
    value: &str,
    expected_len: Option<usize>,
) -> Result<Vec<u8>, RecordError> {
    let bytes = hex::decode(value).map_err(|source| RecordError::Encoding { field, source })?;
    match expected_len {
        Some(expected) if bytes.len() != expected => Err(RecordError::InvalidLength {
            field,
            expected,
            actual: bytes.len(),
        }),
        _ => Ok(bytes),
    }
}
