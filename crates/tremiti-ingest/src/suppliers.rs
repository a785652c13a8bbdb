//! Supplier credential directory.
//!
//! Built once at startup from configuration and shared by reference with the
//! gateway. Credentials are held as SHA-256 digests; raw tokens never appear
//! in configuration.

use std::collections::HashMap;

use serde::Deserialize;
use sha2::{Digest as _, Sha256};
use thiserror::Error;
use tremiti_core::ticket::SupplierId;

/// One configured supplier.
#[derive(Debug, Clone, Deserialize)]
pub struct SupplierEntry {
  /// Human-readable label used in logs, e.g. `"nlg"`.
  pub name:         String,
  pub id:           SupplierId,
  /// Lowercase hex SHA-256 of the supplier's bearer token.
  pub token_sha256: String,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
  #[error("supplier {0:?}: token_sha256 must be 64 hex characters")]
  InvalidDigest(String),

  #[error("suppliers {0:?} and {1:?} share a token")]
  DuplicateToken(String, String),
}

#[derive(Debug, Clone, Default)]
pub struct SupplierDirectory {
  by_digest: HashMap<[u8; 32], (SupplierId, String)>,
}

impl SupplierDirectory {
  pub fn from_entries(
    entries: impl IntoIterator<Item = SupplierEntry>,
  ) -> Result<Self, DirectoryError> {
    let mut by_digest: HashMap<[u8; 32], (SupplierId, String)> = HashMap::new();
    for entry in entries {
      let digest: [u8; 32] = hex::decode(entry.token_sha256.trim())
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| DirectoryError::InvalidDigest(entry.name.clone()))?;

      if let Some((_, existing)) = by_digest.get(&digest) {
        return Err(DirectoryError::DuplicateToken(existing.clone(), entry.name));
      }
      by_digest.insert(digest, (entry.id, entry.name));
    }
    Ok(Self { by_digest })
  }

  /// Hex SHA-256 of `token`, the form stored in `token_sha256`.
  pub fn hash_token(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

  /// Map an `Authorization` header value to a supplier. Accepts the raw token
  /// or `Bearer <token>`.
  pub fn resolve(&self, credential: &str) -> Option<SupplierId> {
    let token = credential.trim();
    let token = token.strip_prefix("Bearer ").map(str::trim).unwrap_or(token);
    if token.is_empty() {
      return None;
    }
    let digest: [u8; 32] = Sha256::digest(token.as_bytes()).into();
    self.by_digest.get(&digest).map(|(id, _)| *id)
  }

  /// The configured name for `id`, for logging.
  pub fn name_of(&self, id: SupplierId) -> Option<&str> {
    self
      .by_digest
      .values()
      .find(|(sid, _)| *sid == id)
      .map(|(_, name)| name.as_str())
  }

  pub fn len(&self) -> usize { self.by_digest.len() }

  pub fn is_empty(&self) -> bool { self.by_digest.is_empty() }
}
