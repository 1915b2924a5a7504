//! Password hashing (bcrypt) and password rules.

use arkpos_core::DomainError;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Reject passwords shorter than [`MIN_PASSWORD_LEN`] characters.
pub fn validate_new_password(plain: &str) -> Result<(), DomainError> {
    if plain.trim().is_empty() {
        return Err(DomainError::validation("password is required"));
    }
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn hash_password(plain: &str, cost: u32) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(plain, cost)?)
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, PasswordError> {
    Ok(bcrypt::verify(plain, hash)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_passwords_rejected() {
        assert!(validate_new_password("12345").is_err());
        assert!(validate_new_password("      ").is_err());
        assert!(validate_new_password("123456").is_ok());
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("secreto1", 4).unwrap();
        assert!(verify_password("secreto1", &hash).unwrap());
        assert!(!verify_password("secreto2", &hash).unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(verify_password("x", "not-a-bcrypt-hash").is_err());
    }
}
