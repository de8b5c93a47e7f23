//! Filesystem-backed config storage with encryption at rest.
//! AES-256-GCM under a key derived once with PBKDF2 and kept in a local key file.

pub mod key_provider;
pub mod secure_file_store;

use std::path::Path;

/// Directory a file lives in; bare file names resolve to the working directory.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
