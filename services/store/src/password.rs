//! Credential hashing
//!
//! New credentials are hashed with Argon2id and a per-user random salt, stored
//! as PHC strings. Unsalted SHA-256 hex digests written by earlier releases
//! are still accepted by [`PasswordHasher::verify`] so those accounts can log
//! in and be upgraded.

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{StoreError, StoreResult};

/// Length of a legacy hex digest (256 bits)
const LEGACY_DIGEST_LEN: usize = 64;

/// Hashes and verifies user credentials
#[derive(Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash a plaintext credential into a PHC string
    pub fn hash(&self, plaintext: &str) -> StoreResult<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| StoreError::Hashing(format!("Failed to hash password: {}", e)))
    }

    /// Check a plaintext credential against a stored digest
    ///
    /// Unparseable digests never match.
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        if is_legacy_digest(digest) {
            return verify_legacy(plaintext, digest);
        }

        match PasswordHash::new(digest) {
            Ok(parsed) => self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Whether a stored digest predates salted hashing
    pub fn needs_rehash(digest: &str) -> bool {
        is_legacy_digest(digest)
    }
}

/// Unsalted SHA-256 digest as lowercase hex, as older releases stored it
pub fn legacy_digest(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

/// Compared in constant time over the decoded bytes
fn verify_legacy(plaintext: &str, digest: &str) -> bool {
    match hex::decode(digest) {
        Ok(stored) => Sha256::digest(plaintext.as_bytes())
            .as_slice()
            .ct_eq(&stored)
            .into(),
        Err(_) => false,
    }
}

fn is_legacy_digest(digest: &str) -> bool {
    digest.len() == LEGACY_DIGEST_LEN
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
