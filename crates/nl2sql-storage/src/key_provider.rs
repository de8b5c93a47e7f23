use std::{
    fmt, fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Default key artifact name, relative to the data directory.
pub const KEY_FILE_NAME: &str = ".env.key";

// Salt and rounds are fixed so existing key files keep working; the key's
// secrecy comes from the random seed and the key file itself.
const KDF_SALT: &[u8] = b"static_salt";
const KDF_ROUNDS: u32 = 100_000;
const SEED_LEN: usize = 32;
const KEY_LEN: usize = 32;

/// Key artifact contents: URL-safe base64 of a 256-bit key.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    encoded: Vec<u8>,
}

impl KeyMaterial {
    pub fn from_bytes(encoded: Vec<u8>) -> Self {
        Self { encoded }
    }

    /// Bytes exactly as stored in the key artifact.
    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }

    /// Decode the artifact into a 256-bit cipher key.
    pub fn cipher_key(&self) -> Result<Zeroizing<[u8; KEY_LEN]>, KeyError> {
        let text = std::str::from_utf8(&self.encoded)
            .map_err(|e| KeyError::Decode(e.to_string()))?;
        let bytes = Zeroizing::new(
            URL_SAFE
                .decode(text.trim())
                .map_err(|e| KeyError::Decode(e.to_string()))?,
        );

        if bytes.len() != KEY_LEN {
            return Err(KeyError::Decode(format!(
                "expected {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let mut out = Zeroizing::new([0u8; KEY_LEN]);
        out.copy_from_slice(&bytes);
        Ok(out)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("len", &self.encoded.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key storage error: {0}")]
    Storage(String),
    #[error("key decode error: {0}")]
    Decode(String),
}

/// Provides the key used to encrypt the connection record.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn obtain(&self) -> Result<KeyMaterial, KeyError>;
}

/// Key kept in a local file. Created on first use and never rewritten.
pub struct FileKeyProvider {
    path: PathBuf,
    cached: Mutex<Option<KeyMaterial>>,
}

impl FileKeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(None),
        }
    }

    /// Provider for `<dir>/.env.key`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(KEY_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl KeyProvider for FileKeyProvider {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn obtain(&self) -> Result<KeyMaterial, KeyError> {
        if let Some(existing) = self.cached()? {
            return Ok(existing);
        }

        // File I/O and key derivation stay off the async workers. Racing first
        // calls all end up with the single file that won `persist_noclobber`.
        let path = self.path.clone();
        let material = tokio::task::spawn_blocking(move || load_or_create(&path))
            .await
            .map_err(|err| KeyError::Storage(format!("key task failed: {err}")))??;

        let mut guard = self
            .cached
            .lock()
            .map_err(|err| KeyError::Storage(format!("lock poisoned: {err}")))?;
        Ok(guard.get_or_insert(material).clone())
    }
}

impl FileKeyProvider {
    fn cached(&self) -> Result<Option<KeyMaterial>, KeyError> {
        let guard = self
            .cached
            .lock()
            .map_err(|err| KeyError::Storage(format!("lock poisoned: {err}")))?;
        Ok(guard.clone())
    }
}

/// In-memory key provider for tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    inner: Arc<Mutex<Option<KeyMaterial>>>,
}

impl InMemoryKeyProvider {
    pub fn with_material(material: KeyMaterial) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(material))),
        }
    }
}

#[async_trait]
impl KeyProvider for InMemoryKeyProvider {
    async fn obtain(&self) -> Result<KeyMaterial, KeyError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| KeyError::Storage(format!("lock poisoned: {err}")))?;

        if let Some(existing) = guard.clone() {
            return Ok(existing);
        }

        let material = derive_key();
        *guard = Some(material.clone());
        Ok(material)
    }
}

fn load_or_create(path: &Path) -> Result<KeyMaterial, KeyError> {
    match fs::read(path) {
        Ok(bytes) => {
            debug!("loaded existing key file");
            return Ok(KeyMaterial::from_bytes(bytes));
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(storage_err(err)),
    }

    let material = derive_key();
    match persist_new(path, &material) {
        Ok(()) => {
            info!("created new key file");
            Ok(material)
        }
        // Another creator got there first; its key is the one on disk.
        Err(err) if err.kind() == ErrorKind::AlreadyExists => fs::read(path)
            .map(KeyMaterial::from_bytes)
            .map_err(storage_err),
        Err(err) => Err(storage_err(err)),
    }
}

/// Write the key next to its final location and link it into place without
/// replacing anything already there.
fn persist_new(path: &Path, material: &KeyMaterial) -> std::io::Result<()> {
    let parent = crate::parent_dir(path);
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(material.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(path).map_err(|e| e.error)?;
    Ok(())
}

fn derive_key() -> KeyMaterial {
    let mut seed = Zeroizing::new([0u8; SEED_LEN]);
    OsRng.fill_bytes(&mut seed[..]);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(&seed[..], KDF_SALT, KDF_ROUNDS, &mut key[..]);

    KeyMaterial::from_bytes(URL_SAFE.encode(&key[..]).into_bytes())
}

fn storage_err(err: std::io::Error) -> KeyError {
    KeyError::Storage(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_key_once_and_reuses_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = FileKeyProvider::in_dir(dir.path());

        let first = provider.obtain().await.expect("first");
        let second = provider.obtain().await.expect("second");
        assert_eq!(first, second);

        // A fresh provider (new process) reads the same artifact.
        let restarted = FileKeyProvider::in_dir(dir.path());
        let third = restarted.obtain().await.expect("third");
        assert_eq!(first, third);
        assert_eq!(
            std::fs::read(dir.path().join(KEY_FILE_NAME)).expect("read"),
            first.as_bytes()
        );
    }

    #[tokio::test]
    async fn generated_key_decodes_to_256_bits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let material = FileKeyProvider::in_dir(dir.path())
            .obtain()
            .await
            .expect("obtain");

        assert_eq!(material.as_bytes().len(), 44);
        let key = material.cipher_key().expect("decode");
        assert_ne!(*key, [0u8; KEY_LEN]);
    }

    #[tokio::test]
    async fn existing_file_is_returned_verbatim() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(KEY_FILE_NAME);
        std::fs::write(&path, b"not-a-real-key").expect("write");

        let material = FileKeyProvider::new(&path).obtain().await.expect("obtain");
        assert_eq!(material.as_bytes(), b"not-a-real-key");
        assert_eq!(std::fs::read(&path).expect("read"), b"not-a-real-key");

        let err = material.cipher_key().expect_err("should not decode");
        assert!(matches!(err, KeyError::Decode(_)));
    }

    #[tokio::test]
    async fn unwritable_location_is_a_storage_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").expect("write");

        let err = FileKeyProvider::in_dir(&blocker)
            .obtain()
            .await
            .expect_err("should fail");
        assert!(matches!(err, KeyError::Storage(_)));
    }

    #[tokio::test]
    async fn unreadable_key_file_is_a_storage_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(KEY_FILE_NAME);
        std::fs::create_dir(&path).expect("mkdir");

        let err = FileKeyProvider::new(&path)
            .obtain()
            .await
            .expect_err("a directory is not a key");
        assert!(matches!(err, KeyError::Storage(_)));
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn concurrent_first_calls_agree_on_one_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = Arc::new(FileKeyProvider::in_dir(dir.path()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.obtain().await })
            })
            .collect();

        let mut keys = Vec::new();
        for handle in handles {
            keys.push(handle.await.expect("join").expect("obtain"));
        }
        let on_disk = std::fs::read(dir.path().join(KEY_FILE_NAME)).expect("read");
        assert!(keys.iter().all(|key| key.as_bytes() == on_disk.as_slice()));
    }

    #[test]
    fn persist_never_replaces_existing_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(KEY_FILE_NAME);
        std::fs::write(&path, b"original").expect("write");

        let err = persist_new(&path, &derive_key()).expect_err("should refuse");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&path).expect("read"), b"original");
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = KeyMaterial::from_bytes(b"abcd".to_vec())
            .cipher_key()
            .expect_err("should reject wrong length");
        assert!(matches!(err, KeyError::Decode(_)));
    }

    #[tokio::test]
    async fn memory_provider_returns_same_key() {
        let provider = InMemoryKeyProvider::default();
        let first = provider.obtain().await.expect("first");
        let second = provider.obtain().await.expect("second");
        assert_eq!(first, second);
    }
}
