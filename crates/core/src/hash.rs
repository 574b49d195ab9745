// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content hash used for I/O roots, state roots, and committee ids.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A 32-byte SHA-256 content hash.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Hash an arbitrary byte string.
    pub fn digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let out = hasher.finalize();
        let mut buf = [0u8; 32];
        buf.copy_from_slice(&out);
        Self(buf)
    }

    /// Hash the canonical CBOR encoding of a serializable value.
    pub fn digest_cbor<T: Serialize>(value: &T) -> Result<Self, ciborium_error::Wrapped> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).map_err(ciborium_error::Wrapped::from)?;
        Ok(Self::digest(&buf))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First `n` hex characters, for log lines.
    pub fn short(&self, n: usize) -> String {
        let full = self.to_string();
        full.chars().take(n).collect()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

/// Thin wrapper so `digest_cbor` doesn't force every caller to depend on
/// `ciborium`'s error type directly.
pub mod ciborium_error {
    use std::fmt;

    #[derive(Debug)]
    pub struct Wrapped(String);

    impl<T: fmt::Display> From<ciborium::ser::Error<T>> for Wrapped {
        fn from(e: ciborium::ser::Error<T>) -> Self {
            Self(e.to_string())
        }
    }

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "cbor encode error: {}", self.0)
        }
    }

    impl std::error::Error for Wrapped {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(Hash::digest(b"hello"), Hash::digest(b"hello"));
        assert_ne!(Hash::digest(b"hello"), Hash::digest(b"world"));
    }

    #[test]
    fn display_is_lowercase_hex() {
        let h = Hash::digest(b"x");
        assert_eq!(h.to_string().len(), 64);
        assert!(h.to_string().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
