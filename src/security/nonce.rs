use crate::constants::DEFAULT_NONCE_LENGTH;
use crate::error::CspError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use getrandom::getrandom;
use std::ops::Deref;

/// Produces base64 nonces from `length` random bytes.
#[derive(Debug, Clone)]
pub struct NonceGenerator {
    length: usize,
}

impl NonceGenerator {
    #[inline]
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }

    pub fn generate(&self) -> Result<String, CspError> {
        let mut buffer = vec![0u8; self.length];
        getrandom(&mut buffer).map_err(|e| CspError::CryptoError(e.to_string()))?;
        Ok(BASE64.encode(&buffer))
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for NonceGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_NONCE_LENGTH)
    }
}

/// The nonce issued for the current request, kept in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestNonce(pub String);

impl Deref for RequestNonce {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
