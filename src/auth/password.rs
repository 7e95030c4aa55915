//! Password hashing with an adaptive, salted, slow hash
//!
//! Argon2id with a configurable work factor. The factor is clamped at
//! construction: below the floor the digest is too cheap to resist offline
//! cracking, above the ceiling each verify burns enough CPU to become a
//! denial-of-service lever.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version};

use crate::constants::{MAX_HASH_COST, MIN_HASH_COST};
use crate::error::{AuthError, Result};

/// One-way hash and verify for credentials. The salt is generated per hash
/// and embedded in the digest, so verification reads everything back from
/// the digest itself.
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create a hasher with the given work factor. Memory cost is
    /// `2^cost` KiB (cost 12 = 4 MiB), 3 iterations, 1 lane.
    pub fn new(cost: u32) -> Result<Self> {
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&cost) {
            return Err(AuthError::ConfigError(format!(
                "hash cost {} outside safe range [{}, {}]",
                cost, MIN_HASH_COST, MAX_HASH_COST
            )));
        }

        let params = Params::new(1 << cost, 3, 1, None)
            .map_err(|e| AuthError::ConfigError(format!("invalid argon2 parameters: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a plaintext password into a PHC-format digest
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|digest| digest.to_string())
            .map_err(|e| AuthError::Internal(format!("password hashing failed: {}", e)))
    }

    /// Verify a plaintext password against a stored digest. Malformed
    /// digests verify as false rather than erroring; a corrupt stored hash
    /// must read as a credential mismatch, not a 500.
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        match PasswordHash::new(digest) {
            Ok(parsed) => Argon2::default()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
