//! Authenticated encryption using ChaCha20-Poly1305.
//!
//! The whole store file is sealed as one opaque buffer. The authentication
//! tag makes any modification detectable, and the format magic is bound as
//! associated data so a foreign or truncated file never opens.

use super::key::StoreKey;
use super::{random_bytes, KEY_SIZE};
use crate::error::{Error, Result};
use crate::logging::RedactedBytes;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce as ChaNonce,
};
use zeroize::Zeroizing;

/// Size of nonce in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Size of authentication tag in bytes (128 bits).
pub const TAG_SIZE: usize = 16;

/// Leading bytes of every sealed buffer.
pub const MAGIC: &[u8; 4] = b"TPV\x01";

/// Smallest possible sealed buffer (empty plaintext).
pub const MIN_SEALED_LEN: usize = MAGIC.len() + NONCE_SIZE + TAG_SIZE;

/// Per-seal nonce.
///
/// Random per seal. The store is resealed once per session, far below the
/// birthday bound for 96-bit nonces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Draw a fresh nonce from the OS RNG.
    pub fn random() -> Self {
        Self(random_bytes())
    }

    /// Wrap nonce bytes read back from a sealed buffer.
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw nonce bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

fn aead(key: &[u8; KEY_SIZE]) -> ChaCha20Poly1305 {
    ChaCha20Poly1305::new(Key::from_slice(key))
}

/// Encrypt `plaintext`, binding `aad` into the tag.
///
/// The 16-byte tag is appended to the ciphertext.
pub fn encrypt(key: &[u8; KEY_SIZE], nonce: &Nonce, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let payload = Payload { msg: plaintext, aad };
    aead(key)
        .encrypt(ChaNonce::from_slice(nonce.as_bytes()), payload)
        .map_err(|_| Error::TamperOrWrongKey)
}

/// Decrypt and authenticate `ciphertext || tag`.
///
/// Any mismatch (key, nonce, ciphertext, tag or `aad`) is reported as
/// `TamperOrWrongKey` with no further detail.
pub fn decrypt(
    key: &[u8; KEY_SIZE],
    nonce: &Nonce,
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let payload = Payload { msg: ciphertext, aad };
    aead(key)
        .decrypt(ChaNonce::from_slice(nonce.as_bytes()), payload)
        .map(Zeroizing::new)
        .map_err(|_| Error::TamperOrWrongKey)
}

/// Seals and opens byte buffers with the store key.
///
/// Knows nothing about the relational schema.
#[derive(Debug, Clone)]
pub struct Cipher {
    key: StoreKey,
}

impl Cipher {
    /// Create a cipher bound to a derived key.
    pub fn new(key: StoreKey) -> Self {
        Self { key }
    }

    /// Encrypt a buffer.
    ///
    /// Output format: `magic (4) || nonce (12) || ciphertext || tag (16)`.
    /// Two seals of the same plaintext never produce the same output.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::random();
        let ciphertext = encrypt(self.key.as_bytes(), &nonce, plaintext, MAGIC)?;

        let mut output = Vec::with_capacity(MAGIC.len() + NONCE_SIZE + ciphertext.len());
        output.extend_from_slice(MAGIC);
        output.extend_from_slice(nonce.as_bytes());
        output.extend_from_slice(&ciphertext);

        tracing::trace!(plaintext = %RedactedBytes(plaintext), sealed = output.len(), "sealed buffer");
        Ok(output)
    }

    /// Decrypt a buffer produced by [`Cipher::seal`].
    pub fn open(&self, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if sealed.len() < MIN_SEALED_LEN || &sealed[..MAGIC.len()] != MAGIC {
            return Err(Error::TamperOrWrongKey);
        }

        let body = &sealed[MAGIC.len()..];
        let nonce = Nonce::from_bytes(
            body[..NONCE_SIZE]
                .try_into()
                .map_err(|_| Error::TamperOrWrongKey)?,
        );

        decrypt(self.key.as_bytes(), &nonce, &body[NONCE_SIZE..], MAGIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> Cipher {
        Cipher::new(StoreKey::derive("test secret").expect("derive"))
    }

    #[test]
    fn test_aad_is_authenticated() {
        let key = [42u8; KEY_SIZE];
        let nonce = Nonce::from_bytes([9u8; NONCE_SIZE]);

        let ciphertext = encrypt(&key, &nonce, b"store bytes", MAGIC).expect("encrypt");
        assert_eq!(ciphertext.len(), b"store bytes".len() + TAG_SIZE);
        assert!(matches!(
            decrypt(&key, &nonce, &ciphertext, b"TPV\x02"),
            Err(Error::TamperOrWrongKey)
        ));

        let decrypted = decrypt(&key, &nonce, &ciphertext, MAGIC).expect("decrypt");
        assert_eq!(&*decrypted, b"store bytes");
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let c = cipher();
        let sealed = c.seal(b"SQLite format 3\0").expect("seal");
        assert_eq!(sealed.len(), MIN_SEALED_LEN + 16);
        assert_eq!(&sealed[..4], MAGIC);

        let opened = c.open(&sealed).expect("open");
        assert_eq!(&*opened, b"SQLite format 3\0");
    }

    #[test]
    fn test_seal_is_not_deterministic() {
        let c = cipher();
        let a = c.seal(b"same plaintext").expect("seal");
        let b = c.seal(b"same plaintext").expect("seal");
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = cipher().seal(b"secret").expect("seal");
        let other = Cipher::new(StoreKey::derive("other secret").expect("derive"));
        assert!(matches!(other.open(&sealed), Err(Error::TamperOrWrongKey)));
    }

    #[test]
    fn test_every_flipped_byte_is_detected() {
        let c = cipher();
        let sealed = c.seal(b"ticket 42: 2x cafe").expect("seal");

        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0x01;
            assert!(
                matches!(c.open(&tampered), Err(Error::TamperOrWrongKey)),
                "flip at byte {} was not detected",
                i
            );
        }
    }

    #[test]
    fn test_truncated_input_fails() {
        let c = cipher();
        let sealed = c.seal(b"").expect("seal");
        assert_eq!(sealed.len(), MIN_SEALED_LEN);
        assert!(c.open(&sealed[..MIN_SEALED_LEN - 1]).is_err());
        assert!(c.open(&[]).is_err());
    }

    #[test]
    fn test_empty_plaintext() {
        let c = cipher();
        let sealed = c.seal(b"").expect("seal");
        assert!(c.open(&sealed).expect("open").is_empty());
    }
}
