//! Store key derivation.
//!
//! The application secret is either a pre-generated key in its encoded form
//! (44 characters of URL-safe base64 decoding to 32 bytes) or an arbitrary
//! passphrase. Encoded keys pass through unmodified; anything else is hashed
//! with SHA-256. Call sites never need to know which one they were given.

use super::KEY_SIZE;
use crate::error::{Error, Result};
use crate::logging::Redacted;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// Length of a key in its encoded (pass-through) form.
pub const ENCODED_KEY_LEN: usize = 44;

/// Environment variable holding the application secret.
pub const SECRET_ENV_VAR: &str = "TPV_SECRET";

/// Symmetric key used to seal and open the store.
///
/// Zeroized on drop; never printed.
#[derive(Clone)]
pub struct StoreKey(Zeroizing<[u8; KEY_SIZE]>);

impl StoreKey {
    /// Derive a key from an application secret.
    ///
    /// Only an empty secret is rejected.
    pub fn derive(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(Error::NoSecret);
        }

        if let Some(key) = Self::decode(secret) {
            tracing::debug!("using pass-through store key");
            return Ok(key);
        }

        let digest = Sha256::digest(secret);
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(&digest);
        Ok(Self(key))
    }

    /// Read the secret from the `TPV_SECRET` environment variable and derive.
    pub fn from_env() -> Result<Self> {
        let secret = Zeroizing::new(std::env::var(SECRET_ENV_VAR).map_err(|_| Error::NoSecret)?);
        Self::derive(secret.as_bytes())
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self(Zeroizing::new(super::random_bytes::<KEY_SIZE>()))
    }

    /// Encode the key in its pass-through form.
    ///
    /// Feeding the result back into [`StoreKey::derive`] yields the same key.
    pub fn encode(&self) -> Zeroizing<String> {
        Zeroizing::new(URL_SAFE.encode(self.0.as_slice()))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    fn decode(secret: &[u8]) -> Option<Self> {
        if secret.len() != ENCODED_KEY_LEN {
            return None;
        }
        let decoded = Zeroizing::new(URL_SAFE.decode(secret).ok()?);
        if decoded.len() != KEY_SIZE {
            return None;
        }
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(&decoded);
        Some(Self(key))
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StoreKey").field(&Redacted(())).finish()
    }
}

impl PartialEq for StoreKey {
    fn eq(&self, other: &Self) -> bool {
        super::constant_time_eq(self.0.as_slice(), other.0.as_slice())
    }
}

impl Eq for StoreKey {}
