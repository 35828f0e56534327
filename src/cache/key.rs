//! Content-derived cache keys.
//!
//! A key is the SHA-256 digest of an operation's identity plus its resolved
//! input signature. Two operations with the same identity and semantically
//! equal inputs produce the same key, across runs and across processes.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// A content-derived cache key.
///
/// Opaque and immutable once created. Equality and hashing are defined over
/// the digest, so they track the signature's semantic meaning rather than any
/// in-memory representation of the inputs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Derive a key from an operation identity and its resolved input
    /// signature.
    ///
    /// The signature is serialized with `serde_json`, whose default
    /// `BTreeMap`-backed object representation keeps field order stable, so
    /// the digest is deterministic for semantically equal signatures.
    pub fn from_signature<S: Serialize>(
        op_identity: &str,
        inputs: &S,
    ) -> Result<Self, serde_json::Error> {
        let mut hasher = Sha256::new();
        hasher.update(op_identity.as_bytes());
        // Separator keeps ("ab", "c") and ("a", "bc") from colliding.
        hasher.update([0u8]);
        hasher.update(serde_json::to_vec(inputs)?);
        Ok(Self(hasher.finalize().into()))
    }

    /// Construct a key from a precomputed digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// Logs want a short, stable identifier, not 64 hex characters.
impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({self})")
    }
}
