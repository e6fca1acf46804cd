//! Cache key derivation
//!
//! Cache entries are keyed by the exact source URL. On-disk stores need a
//! filesystem-safe name, so the URL is hashed with SHA-256.

use sha2::{Digest, Sha256};

/// Filesystem-safe key for a source URL (lowercase hex SHA-256).
///
/// No normalization is applied: `https://a/x.mp3` and `https://a/x.mp3?v=1`
/// are different keys.
pub fn url_cache_key(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

/// File extension of the URL path, if any (query and fragment stripped)
///
/// Used as a format hint when decoding cached payloads.
pub fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
