use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use nl2sql_core::{
    record::ConnectionRecord,
    storage::{ConfigStore, Loaded, StoreError},
};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use crate::key_provider::{FileKeyProvider, KeyError, KeyMaterial, KeyProvider};

/// Default configuration artifact name, relative to the data directory.
pub const CONFIG_FILE_NAME: &str = "db_config.encrypted";

const NONCE_LEN: usize = 12;

/// AES-GCM encrypted single-record store implementing the shared `ConfigStore`
/// contract. The key comes from a `KeyProvider` (a local key file in production).
pub struct EncryptedConfigStore<P: KeyProvider> {
    path: PathBuf,
    key_provider: P,
}

impl<P: KeyProvider> EncryptedConfigStore<P> {
    pub fn new(path: impl Into<PathBuf>, key_provider: P) -> Self {
        Self {
            path: path.into(),
            key_provider,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn key(&self) -> Result<KeyMaterial, StoreError> {
        self.key_provider
            .obtain()
            .await
            .map_err(|e| StoreError::Storage {
                reason: format!("key provider: {e}"),
            })
    }
}

impl EncryptedConfigStore<FileKeyProvider> {
    /// Store at `<dir>/db_config.encrypted` keyed by `<dir>/.env.key`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(CONFIG_FILE_NAME), FileKeyProvider::in_dir(dir))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredBlob {
    nonce: String,
    ciphertext: String,
}

/// Reasons a stored blob could not be turned back into a record.
#[derive(Debug, thiserror::Error)]
enum Unreadable {
    #[error("envelope: {0}")]
    Envelope(String),
    #[error("key: {0}")]
    Key(#[from] KeyError),
    #[error("decrypt failed")]
    Decrypt,
    #[error("record: {0}")]
    Record(String),
}

#[async_trait]
impl<P: KeyProvider> ConfigStore for EncryptedConfigStore<P> {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn save(&self, record: &ConnectionRecord) -> Result<(), StoreError> {
        let plaintext = serde_json::to_vec(record).map_err(storage_err)?;

        let key_material = self.key().await?;
        let cipher = build_cipher(&key_material).map_err(|e| StoreError::Storage {
            reason: format!("cipher init failed: {e}"),
        })?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|e| StoreError::Storage {
                reason: format!("encrypt failed: {e}"),
            })?;

        let blob = StoredBlob {
            nonce: URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        };

        write_blob(&self.path, &blob)?;
        debug!("connection record saved");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Loaded, StoreError> {
        let Some(raw) = read_raw(&self.path)? else {
            return Ok(Loaded::Absent);
        };

        let key_material = self.key().await?;
        match open_blob(&raw, &key_material) {
            Ok(record) => Ok(Loaded::Present(record)),
            Err(reason) => {
                warn!(%reason, "stored connection record is unreadable; treating as not configured");
                Ok(Loaded::Absent)
            }
        }
    }
}

fn open_blob(raw: &[u8], material: &KeyMaterial) -> Result<ConnectionRecord, Unreadable> {
    let blob: StoredBlob =
        serde_json::from_slice(raw).map_err(|e| Unreadable::Envelope(e.to_string()))?;
    let nonce_bytes = URL_SAFE_NO_PAD
        .decode(blob.nonce)
        .map_err(|e| Unreadable::Envelope(format!("nonce: {e}")))?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(Unreadable::Envelope(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce_bytes.len()
        )));
    }
    let ciphertext = URL_SAFE_NO_PAD
        .decode(blob.ciphertext)
        .map_err(|e| Unreadable::Envelope(format!("ciphertext: {e}")))?;

    let cipher = build_cipher(material)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|_| Unreadable::Decrypt)?;

    serde_json::from_slice(&plaintext).map_err(|e| Unreadable::Record(e.to_string()))
}

/// Replace the artifact in one rename so readers see the old or the new blob,
/// never a partial write.
fn write_blob(path: &Path, blob: &StoredBlob) -> Result<(), StoreError> {
    let parent = crate::parent_dir(path);
    fs::create_dir_all(parent).map_err(storage_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(storage_err)?;
    let json = serde_json::to_vec(blob).map_err(storage_err)?;
    tmp.write_all(&json).map_err(storage_err)?;
    tmp.flush().map_err(storage_err)?;
    tmp.as_file().sync_all().map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

fn read_raw(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(storage_err(err)),
    }
}

fn build_cipher(material: &KeyMaterial) -> Result<Aes256Gcm, KeyError> {
    let key = material.cipher_key()?;
    Aes256Gcm::new_from_slice(key.as_slice()).map_err(|e| KeyError::Decode(e.to_string()))
}

fn storage_err<E: ToString>(err: E) -> StoreError {
    StoreError::Storage {
        reason: err.to_string(),
    }
}
