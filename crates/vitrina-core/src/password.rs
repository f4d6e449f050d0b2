//! Password hashing (argon2, PHC string format).

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

use crate::error::ValidationError;
use crate::validation::validate_password;

/// A well-formed hash with the default parameters that matches no password.
///
/// Login verifies against it when the user is unknown or disabled, so
/// every rejected login costs one full argon2 run.
pub const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$0htNj6CmHOaBkuAE0g2JeQ$BD3R7jGfNW2wJDijarYKLfJhpf766pt1Ifw14A+LUnI";

/// Hashes a new password after checking the length rule.
pub fn hash_password(password: &str) -> Result<String, ValidationError> {
    validate_password(password)?;

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ValidationError::InvalidFormat {
            field: "password".to_string(),
            reason: e.to_string(),
        })
}

/// Checks a password against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret!").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret!", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(hash_password("abc").is_err());
    }

    #[test]
    fn test_dummy_hash_costs_like_a_real_one() {
        assert!(PasswordHash::new(DUMMY_HASH).is_ok());
        assert!(!verify_password("cambiar123", DUMMY_HASH));

        // Same algorithm, version and cost parameters as fresh hashes
        let fresh = hash_password("s3cret!").unwrap();
        let params = |h: &str| h.split('$').take(4).collect::<Vec<_>>().join("$");
        assert_eq!(params(&fresh), params(DUMMY_HASH));
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verify_password("anything", "plaintext"));
    }
}
