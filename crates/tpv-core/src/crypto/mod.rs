//! Cryptographic primitives for the store.
//!
//! - **SHA-256**: passphrase to key derivation
//! - **ChaCha20-Poly1305**: authenticated encryption of the store file
//! - **PBKDF2-HMAC-SHA256**: operator password hashing
//!
//! Key material is zeroized on drop.

mod aead;
mod key;
mod password;

use rand::{rngs::OsRng, RngCore};

pub use aead::{decrypt, encrypt, Cipher, Nonce, MAGIC, MIN_SEALED_LEN, NONCE_SIZE, TAG_SIZE};
pub use key::{StoreKey, ENCODED_KEY_LEN, SECRET_ENV_VAR};
pub use password::{hash_password, verify_password, PASSWORD_ITERATIONS};

/// Key size for ChaCha20-Poly1305.
pub const KEY_SIZE: usize = 32;

/// Fill a fixed-size array from the operating system RNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Compare two byte strings without an early exit on the first mismatch.
///
/// Length is not secret here, so differing lengths return at once.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes_differ() {
        let nonce_a: [u8; NONCE_SIZE] = random_bytes();
        let nonce_b: [u8; NONCE_SIZE] = random_bytes();
        assert_ne!(nonce_a, nonce_b);
    }

    #[test]
    fn test_constant_time_eq() {
        let digest = [7u8; KEY_SIZE];
        let mut flipped = digest;
        flipped[KEY_SIZE - 1] ^= 1;

        assert!(constant_time_eq(&digest, &digest));
        assert!(!constant_time_eq(&digest, &flipped));
        assert!(!constant_time_eq(&digest, &digest[..16]));
        assert!(constant_time_eq(b"", b""));
    }
}
