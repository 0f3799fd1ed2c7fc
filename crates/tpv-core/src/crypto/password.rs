//! Operator password hashing.
//!
//! Hashes are stored in the configuration table as
//! `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`.

use super::{constant_time_eq, random_bytes};
use crate::error::{Error, Result};
use hmac::Hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

/// PBKDF2 iterations for new hashes.
pub const PASSWORD_ITERATIONS: u32 = 100_000;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_SIZE: usize = 16;
const HASH_SIZE: usize = 32;

fn derive(password: &[u8], salt: &[u8], iterations: u32) -> Result<Zeroizing<[u8; HASH_SIZE]>> {
    let mut out = Zeroizing::new([0u8; HASH_SIZE]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, out.as_mut())
        .map_err(|_| Error::Encoding("PBKDF2 output length rejected".into()))?;
    Ok(out)
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(Error::Validation("password cannot be empty".into()));
    }
    let salt: [u8; SALT_SIZE] = random_bytes();
    let hash = derive(password.as_bytes(), &salt, PASSWORD_ITERATIONS)?;
    Ok(format!(
        "{}${}${}${}",
        SCHEME,
        PASSWORD_ITERATIONS,
        hex::encode(salt),
        hex::encode(hash.as_slice())
    ))
}

/// Check a password against a stored hash.
///
/// Malformed stored hashes are an encoding error, not a mismatch.
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(Error::Encoding("malformed password hash".into()));
    };

    if scheme != SCHEME {
        return Err(Error::Encoding(format!("unknown password scheme: {}", scheme)));
    }
    let iterations: u32 = iterations
        .parse()
        .map_err(|_| Error::Encoding("malformed iteration count".into()))?;
    let salt = hex::decode(salt).map_err(|e| Error::Encoding(e.to_string()))?;
    let expected = hex::decode(expected).map_err(|e| Error::Encoding(e.to_string()))?;

    let actual = derive(password.as_bytes(), &salt, iterations)?;
    Ok(constant_time_eq(actual.as_slice(), &expected))
}
