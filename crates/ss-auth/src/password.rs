//! Password hashing with Argon2id.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use ss_common::StaffSyncError;

#[derive(Default)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash a plaintext password with a fresh random salt. The output is a
    /// self-describing PHC string (`$argon2id$...`).
    pub fn hash(&self, plaintext: &str) -> Result<String, StaffSyncError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| StaffSyncError::internal(format!("Password hashing failed: {e}")))?;
        Ok(hash.to_string())
    }

    /// Constant-time verification. Unparseable hashes count as a mismatch
    /// rather than an error so login failures stay uniform.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let service = PasswordService::new();
        let a = service.hash("hunter22").unwrap();
        let b = service.hash("hunter22").unwrap();

        assert_ne!(a, b, "same password must not produce the same hash");
        assert!(a.starts_with("$argon2"));
        assert!(service.verify("hunter22", &a));
        assert!(!service.verify("wrong", &a));
    }

    #[test]
    fn garbage_hash_fails_closed() {
        let service = PasswordService::new();
        assert!(!service.verify("anything", "not-a-phc-string"));
    }
}
