//! Hashing utilities for input change detection and package digests.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::secret::Secret;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum HashError {
  #[error("failed to serialize value for hashing: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("invalid hash key")]
  InvalidKey,
}

/// A full 64-character SHA-256 hash.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

/// HMAC-SHA256 of the JSON serialization of a value, keyed by `key`.
///
/// `serde_json` maps are ordered by key, so equal values always produce
/// equal hashes. Without the key the digest cannot be recomputed, which
/// keeps secret inputs from being guessed offline from a stored hash.
pub fn keyed_hash_json<T: Serialize + ?Sized>(key: &Secret, value: &T) -> Result<ContentHash, HashError> {
  let serialized = serde_json::to_vec(value)?;
  let mut mac = HmacSha256::new_from_slice(key.expose().as_bytes()).map_err(|_| HashError::InvalidKey)?;
  mac.update(&serialized);
  Ok(ContentHash(hex::encode(mac.finalize().into_bytes())))
}
