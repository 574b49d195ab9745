// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signing primitives used for dispatcher, storage-receipt, and commitment
//! signatures. Wraps `ed25519-dalek` so the rest of the workspace never
//! reaches for the underlying crate directly.

use ed25519_dalek::{Signer as _, Verifier as _};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ed25519 public key, usable as a committee-membership set element.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub fn from_signing_key(key: &ed25519_dalek::SigningKey) -> Self {
        Self(key.verifying_key().to_bytes())
    }

    fn verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::MalformedKey)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

/// An ed25519 signature over some canonical message bytes.
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "signature_bytes")] pub [u8; 64]);

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.0[..] == other.0[..]
    }
}
impl Eq for Signature {}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(..)")
    }
}

mod signature_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 64], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 64], D::Error> {
        let v: Vec<u8> = Vec::deserialize(d)?;
        v.try_into().map_err(|_| serde::de::Error::custom("signature must be 64 bytes"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("malformed public key")]
    MalformedKey,
    #[error("signature verification failed")]
    VerificationFailed,
}

/// A signed-message verifier: `public_key` signed `message`, check it.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
    let verifying_key = public_key.verifying_key()?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &sig).map_err(|_| CryptoError::VerificationFailed)
}

/// Something that can sign messages on behalf of the node's own identity.
///
/// Kept as a trait (rather than a concrete `SigningKey` everywhere) so tests
/// can swap in a deterministic signer without touching call sites.
pub trait Signer: Send + Sync {
    fn public_key(&self) -> PublicKey;
    fn sign(&self, message: &[u8]) -> Signature;
}

/// Production signer backed by an in-memory ed25519 keypair loaded from disk.
pub struct IdentitySigner {
    key: ed25519_dalek::SigningKey,
}

impl IdentitySigner {
    pub fn from_signing_key(key: ed25519_dalek::SigningKey) -> Self {
        Self { key }
    }

    /// Load a 32-byte seed from a file and derive the signing key.
    pub fn load(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let seed: [u8; 32] = bytes
            .get(..32)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| std::io::Error::other("identity key file must contain a 32-byte seed"))?;
        Ok(Self { key: ed25519_dalek::SigningKey::from_bytes(&seed) })
    }
}

impl Signer for IdentitySigner {
    fn public_key(&self) -> PublicKey {
        PublicKey::from_signing_key(&self.key)
    }

    fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.key.sign(message);
        Signature(sig.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn sign_then_verify_succeeds() {
        let key = ed25519_dalek::SigningKey::generate(&mut OsRng);
        let signer = IdentitySigner::from_signing_key(key);
        let sig = signer.sign(b"message");
        verify(&signer.public_key(), b"message", &sig).expect("valid signature must verify");
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let key = ed25519_dalek::SigningKey::generate(&mut OsRng);
        let signer = IdentitySigner::from_signing_key(key);
        let sig = signer.sign(b"message");
        assert!(verify(&signer.public_key(), b"different", &sig).is_err());
    }
}
