//! Loading the local root CA.
//!
//! The certificate is treated as opaque bytes. The tie-break signature is the
//! BLAKE3 digest of those bytes, so two nodes holding the same file agree on
//! it and two different files with the same `not_before` still order
//! deterministically.

use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use clustermesh_state::{RootCertificate, MAX_PAYLOAD_BYTES};

use crate::error::{Error, Result};

/// Read a root CA from `path`.
///
/// `not_before` defaults to the file's modification time in Unix millis.
pub fn load_root_certificate(path: &Path, not_before: Option<u64>) -> Result<RootCertificate> {
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(Error::Config(format!("root CA {} is empty", path.display())));
    }
    // must still fit in a payload once framed with the rest of the state
    if u64::try_from(bytes.len()).map_or(true, |len| len >= MAX_PAYLOAD_BYTES) {
        return Err(Error::Config(format!(
            "root CA {} is {} bytes, limit is {}",
            path.display(),
            bytes.len(),
            MAX_PAYLOAD_BYTES
        )));
    }

    let not_before = match not_before {
        Some(t) => t,
        None => modified_millis(path)?,
    };

    let signature = blake3::hash(&bytes).as_bytes().to_vec();
    tracing::debug!(
        "Loaded root CA {} ({} bytes, digest {}...)",
        path.display(),
        bytes.len(),
        hex::encode(&signature[..8])
    );

    Ok(RootCertificate::new(bytes, not_before, signature))
}

fn modified_millis(path: &Path) -> Result<u64> {
    let modified = std::fs::metadata(path)?.modified()?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Config(format!("root CA {} has a pre-epoch mtime: {e}", path.display())))?;
    unix_millis(since_epoch)
}

/// Convert a time since the Unix epoch to the millis used for `not_before`.
pub fn unix_millis(since_epoch: Duration) -> Result<u64> {
    u64::try_from(since_epoch.as_millis())
        .map_err(|_| Error::Config(format!("timestamp {since_epoch:?} does not fit in u64 millis")))
}
