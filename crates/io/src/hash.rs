// Content hashing and version tags

use std::fmt::Write as _;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Mapping version tag for an optional mapping file.
///
/// - file absent: `None`
/// - a `version:` line present: its value, quotes trimmed
/// - otherwise: `sha256:<first 12 hex chars>` of the content
pub fn mapping_version(path: &Path) -> Result<Option<String>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let text = String::from_utf8_lossy(&bytes);

    for line in text.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("version:") {
            let value = rest.trim().trim_matches(|c| c == '"' || c == '\'');
            if !value.is_empty() {
                return Ok(Some(value.to_string()));
            }
        }
    }

    let hash = sha256_hex(&bytes);
    Ok(Some(format!("sha256:{}", &hash[..12])))
}
