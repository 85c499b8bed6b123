//! XChaCha20-Poly1305 for encrypted move fields.
//!
//! Wire form of a sealed value: `nonce(24) || ciphertext`. The key is
//! supplied by configuration as 64 hex characters.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};

use crate::error::{ProtocolError, Result};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;

pub struct MoveCipher {
    cipher: XChaCha20Poly1305,
}

impl MoveCipher {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Build from a 64-character hex key.
    pub fn from_hex(key: &str) -> Result<Self> {
        let raw = hex::decode(key.trim())
            .map_err(|e| ProtocolError::ConfigError(format!("move key is not hex: {e}")))?;
        let key: [u8; KEY_LEN] = raw.as_slice().try_into().map_err(|_| {
            ProtocolError::ConfigError(format!(
                "move key must be {KEY_LEN} bytes, got {}",
                raw.len()
            ))
        })?;
        Ok(Self::new(&key))
    }

    pub fn generate_nonce() -> Result<[u8; NONCE_LEN]> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::fill(&mut nonce).map_err(|_| ProtocolError::EncryptionFailure)?;
        Ok(nonce)
    }

    pub fn encrypt(&self, plaintext: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<Vec<u8>> {
        self.cipher
            .encrypt(XNonce::from_slice(nonce), plaintext)
            .map_err(|_| ProtocolError::EncryptionFailure)
    }

    pub fn decrypt(&self, ciphertext: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<Vec<u8>> {
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| ProtocolError::DecryptionFailure)
    }

    /// Encrypt under a fresh nonce and prepend it.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Self::generate_nonce()?;
        let ciphertext = self.encrypt(plaintext, &nonce)?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Reverse of [`MoveCipher::seal`].
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(ProtocolError::DecryptionFailure);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| ProtocolError::DecryptionFailure)?;
        self.decrypt(ciphertext, &nonce)
    }
}

impl std::fmt::Debug for MoveCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MoveCipher(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_seal_open() {
        let cipher = MoveCipher::from_hex(KEY).unwrap();
        let sealed = cipher.seal(b"e2e4").unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + 4 + 16);
        assert_eq!(cipher.open(&sealed).unwrap(), b"e2e4");
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = MoveCipher::from_hex(KEY).unwrap().seal(b"e2e4").unwrap();
        let other = MoveCipher::new(&[7u8; KEY_LEN]);
        assert!(matches!(
            other.open(&sealed),
            Err(ProtocolError::DecryptionFailure)
        ));
    }

    #[test]
    fn test_short_input_fails() {
        let cipher = MoveCipher::new(&[1u8; KEY_LEN]);
        assert!(cipher.open(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_bad_hex_key() {
        assert!(MoveCipher::from_hex("zz").is_err());
        assert!(MoveCipher::from_hex("00ff").is_err());
    }
}
