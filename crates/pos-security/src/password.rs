//! Password hashing with Argon2
//!
//! Accounts imported from the previous back-office still carry bcrypt hashes
//! (`$2y$`, `$2a$`, `$2b$`); those verify through `bcrypt` and are re-hashed with
//! Argon2 by the caller on the next successful login.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distr::Alphanumeric, Rng};
use thiserror::Error;

use pos_shared::constants::{MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH, TEMP_PASSWORD_LENGTH};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Hash error: {0}")]
    HashError(String),
    #[error("Verification failed")]
    VerificationFailed,
    #[error("Password too short")]
    TooShort,
    #[error("Password too long")]
    TooLong,
    #[error("Password too weak")]
    TooWeak,
}

/// Minimum zxcvbn score (0..=4) accepted for new passwords.
const MIN_STRENGTH_SCORE: u8 = 2;

pub struct PasswordService;

impl PasswordService {
    pub fn hash(password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError::HashError(e.to_string()))
    }

    pub fn verify(password: &str, hash: &str) -> Result<bool, PasswordError> {
        if Self::is_legacy_hash(hash) {
            return bcrypt::verify(password, hash)
                .map_err(|e| PasswordError::HashError(e.to_string()));
        }

        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| PasswordError::HashError(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// True for bcrypt hashes that should be upgraded after a successful login.
    pub fn is_legacy_hash(hash: &str) -> bool {
        hash.starts_with("$2y$") || hash.starts_with("$2a$") || hash.starts_with("$2b$")
    }

    /// Length limits plus a zxcvbn score check. `user_inputs` are words the
    /// password must not lean on (email, display name, tenant name).
    pub fn check_strength(password: &str, user_inputs: &[&str]) -> Result<(), PasswordError> {
        let len = password.chars().count();
        if len < MIN_PASSWORD_LENGTH {
            return Err(PasswordError::TooShort);
        }
        if len > MAX_PASSWORD_LENGTH {
            return Err(PasswordError::TooLong);
        }

        let entropy = zxcvbn::zxcvbn(password, user_inputs);
        if (entropy.score() as u8) < MIN_STRENGTH_SCORE {
            return Err(PasswordError::TooWeak);
        }

        Ok(())
    }

    /// Random password handed out by a super admin reset.
    pub fn generate_temporary() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TEMP_PASSWORD_LENGTH)
            .map(char::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = PasswordService::hash("correct horse battery staple").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(PasswordService::verify("correct horse battery staple", &hash).unwrap());
        assert!(!PasswordService::verify("wrong", &hash).unwrap());
    }

    #[test]
    fn test_verify_legacy_bcrypt() {
        let hash = bcrypt::hash("kasir-lama-2019", 4).unwrap();
        assert!(PasswordService::is_legacy_hash(&hash));
        assert!(PasswordService::verify("kasir-lama-2019", &hash).unwrap());
        assert!(!PasswordService::verify("kasir-baru", &hash).unwrap());
    }

    #[test]
    fn test_strength() {
        assert_eq!(PasswordService::check_strength("short", &[]), Err(PasswordError::TooShort));
        assert_eq!(PasswordService::check_strength("password", &[]), Err(PasswordError::TooWeak));
        assert_eq!(
            PasswordService::check_strength(&"a".repeat(200), &[]),
            Err(PasswordError::TooLong)
        );
        assert!(PasswordService::check_strength("Gudang-Timur-Rak-42!", &["owner@example.com"]).is_ok());
    }

    #[test]
    fn test_temporary_password() {
        let pw = PasswordService::generate_temporary();
        assert_eq!(pw.len(), TEMP_PASSWORD_LENGTH);
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
