//! Tenant keys and their on-disk directory names.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::errors::{RetrievalError, Result};

const MAX_VERBATIM_LEN: usize = 64;
const HASH_HEX_LEN: usize = 12;

/// A validated tenant key.
///
/// Keys made only of lowercase ASCII letters, digits, `-` and `_` (up to
/// 64 chars) are used verbatim as the directory name. Anything else,
/// uppercase included, maps to `<lowercased prefix>~<sha256 prefix>`. No two
/// distinct keys share a directory even on a case-insensitive filesystem,
/// and `~` never appears in a verbatim name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TenantKey {
    key: String,
    dir: String,
}

impl TenantKey {
    /// Validate `key` and derive its directory name.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(RetrievalError::InvalidTenant("tenant key is blank".into()));
        }
        let dir = dir_name(&key);
        Ok(Self { key, dir })
    }

    /// The key as given.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Directory name under the data root.
    pub fn dir_name(&self) -> &str {
        &self.dir
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

fn is_verbatim(key: &str) -> bool {
    key.len() <= MAX_VERBATIM_LEN
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

fn dir_name(key: &str) -> String {
    if is_verbatim(key) {
        return key.to_string();
    }
    let prefix: String = key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .take(32)
        .collect();
    let hex: String = Sha256::digest(key.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    format!("{prefix}~{}", &hex[..HASH_HEX_LEN])
}
