//! Keyed archive envelope.
//!
//! Archived values are stored as a JSON envelope carrying the archiver name,
//! a format version, a timestamp and a SHA256 checksum of the root value.
//! Unarchiving rejects envelopes from another archiver, another version, or
//! whose root no longer matches its checksum.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::outcome::CacheError;

/// Identifies envelopes written by this crate.
pub const ARCHIVER_NAME: &str = "stowaway.keyed";

/// Current version of the archive format.
pub const ARCHIVE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveEnvelope {
    archiver: String,
    version: u32,
    created_at: DateTime<Utc>,
    /// SHA256 of the compact JSON form of `root`.
    checksum: String,
    root: Value,
}

fn checksum(root: &Value) -> Result<String, serde_json::Error> {
    // Value maps are key-sorted, so the compact form is stable across a round trip.
    let compact = serde_json::to_string(root)?;
    let mut hasher = Sha256::new();
    hasher.update(compact.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Serialize `value` into envelope bytes.
pub(crate) fn archive_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CacheError> {
    let root = serde_json::to_value(value).map_err(CacheError::Encode)?;
    let envelope = ArchiveEnvelope {
        archiver: ARCHIVER_NAME.to_string(),
        version: ARCHIVE_VERSION,
        created_at: Utc::now(),
        checksum: checksum(&root).map_err(CacheError::Encode)?,
        root,
    };
    serde_json::to_vec_pretty(&envelope).map_err(CacheError::Encode)
}

/// Parse and verify envelope bytes read from `path`, returning the root value.
pub(crate) fn unarchive_bytes(path: &Path, bytes: &[u8]) -> Result<Value, CacheError> {
    let invalid = |reason: String| CacheError::Archive {
        path: path.to_path_buf(),
        reason,
    };

    let envelope: ArchiveEnvelope =
        serde_json::from_slice(bytes).map_err(|e| invalid(format!("not an archive: {}", e)))?;

    if envelope.archiver != ARCHIVER_NAME {
        return Err(invalid(format!("unknown archiver {:?}", envelope.archiver)));
    }
    if envelope.version != ARCHIVE_VERSION {
        return Err(invalid(format!(
            "unsupported version {} (current is {})",
            envelope.version, ARCHIVE_VERSION
        )));
    }

    let calculated = checksum(&envelope.root).map_err(CacheError::Encode)?;
    if calculated != envelope.checksum {
        return Err(invalid("integrity check failed: checksum mismatch".to_string()));
    }

    Ok(envelope.root)
}
