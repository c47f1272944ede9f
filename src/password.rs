//! Password hashing seam. The rest of the crate only ever calls
//! [`hash`] and [`verify`]; the algorithm behind them is not its business.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Argon2, Params, Version};
use std::sync::LazyLock;
use thiserror::Error;

static ARGON2: LazyLock<Argon2<'static>> = LazyLock::new(|| {
    let params = Params::new(64 * 1024, 3, 4, None).expect("static argon2 params are valid");
    Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params)
});

static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash("throwaway").unwrap_or_default());

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("hash error: {0}")]
    Hash(String),
}

/// Hash a plaintext password into a self-describing PHC string.
pub fn hash(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    ARGON2
        .hash_password(plain.as_bytes(), &salt)
        .map(|p| p.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Verify a plaintext password against a stored PHC string.
/// Errors only on a malformed stored hash, never on a mismatch.
pub fn verify(plain: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(ARGON2.verify_password(plain.as_bytes(), &parsed).is_ok())
}

/// Run a full verification against a fixed throwaway hash. Login paths that
/// found no user run this, keeping their cost identical to a real check.
pub fn verify_dummy(plain: &str) {
    let _ = verify(plain, &DUMMY_HASH);
}
