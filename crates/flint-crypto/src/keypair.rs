//! Server RSA key pair for the encryption handshake.

use rand::rngs::OsRng;
use rsa::pkcs8::EncodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};

use crate::CryptoError;

/// Key size the vanilla server uses. The key never signs anything and lives
/// only as long as the process, so 1024 bits matches the ecosystem.
const KEY_BITS: usize = 1024;

/// Per-boot RSA key pair. Clients encrypt the shared secret and verify
/// token under the public half.
pub struct ServerKeyPair {
    private: RsaPrivateKey,
    public_der: Vec<u8>,
}

impl ServerKeyPair {
    /// Generate a fresh key pair and pre-encode the public half.
    pub fn generate() -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::new(&mut OsRng, KEY_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public_der = private
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?
            .into_vec();
        Ok(Self {
            private,
            public_der,
        })
    }

    /// SPKI DER encoding of the public key, as sent in Encryption Request.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_der
    }

    /// Decrypt a PKCS#1 v1.5 ciphertext produced with the public key.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.private
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))
    }

    /// Decrypt the shared secret and require an AES-128 sized key.
    pub fn decrypt_secret(&self, ciphertext: &[u8]) -> Result<[u8; 16], CryptoError> {
        let secret = self.decrypt(ciphertext)?;
        let len = secret.len();
        <[u8; 16]>::try_from(secret).map_err(|_| CryptoError::BadSecretLength(len))
    }
}
