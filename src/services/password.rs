//! Password hashing
//!
//! Account passwords are stored as Argon2id PHC strings with a random salt per
//! hash. Plaintext passwords never reach the storage layer.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password using Argon2id with the crate's default parameters.
///
/// Returns the PHC string (algorithm, parameters, salt and hash).
///
/// ```ignore
/// use brigada::services::password::hash_password;
///
/// let hash = hash_password("correct horse battery")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Verify a password against a stored hash.
///
/// A wrong password is `Ok(false)`; only a malformed hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id() {
        let hash = hash_password("portal-password").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_same_password_different_salt() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_correct_and_incorrect() {
        let hash = hash_password("correct_password").unwrap();

        assert!(verify_password("correct_password", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_verify_invalid_hash_is_error() {
        assert!(verify_password("password", "invalid_hash_format").is_err());
    }

    #[test]
    fn test_unicode_password() {
        let password = "Şifrə-ğüöçə🔐";
        let hash = hash_password(password).unwrap();
        assert!(verify_password(password, &hash).unwrap());
    }

    #[test]
    fn test_hash_does_not_contain_password() {
        let password = "my_secret_password";
        let hash = hash_password(password).unwrap();
        assert!(!hash.contains(password));
    }
}
