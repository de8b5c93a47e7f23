use std::path::PathBuf;

use nl2sql_storage::{key_provider::FileKeyProvider, secure_file_store::EncryptedConfigStore};
use tracing::debug;

use crate::config::Config;

/// Directory for the key and connection artifacts: config override or the
/// working directory.
pub fn data_dir(config: &Config) -> PathBuf {
    config
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Build the encrypted connection store described by the config.
pub fn store_from_config(config: &Config) -> EncryptedConfigStore<FileKeyProvider> {
    let root = data_dir(config);
    debug!(?root, "initializing encrypted config store");
    EncryptedConfigStore::in_dir(root)
}

#[cfg(test)]
mod tests {
    use nl2sql_core::storage::{ConfigStore, Loaded};

    use super::*;

    #[test]
    fn defaults_to_working_directory() {
        assert_eq!(data_dir(&Config::default()), PathBuf::from("."));
    }

    #[tokio::test]
    async fn store_lives_under_configured_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            data_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        let store = store_from_config(&config);
        assert_eq!(store.load().await.expect("load"), Loaded::Absent);
        assert!(store.path().starts_with(dir.path()));
    }
}
