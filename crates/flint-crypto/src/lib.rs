//! Cryptography: RSA key exchange, AES-128-CFB8 transport encryption,
//! session digests and proxy forwarding integrity.

pub mod aes;
pub mod digest;
pub mod integrity;
pub mod keypair;
pub mod player_key;

pub use aes::PacketEncryption;
pub use digest::{offline_player_uuid, server_hash};
pub use integrity::verify_forwarding_integrity;
pub use keypair::ServerKeyPair;
pub use player_key::{
    parse_public_key_der, validate_profile_key, verify_token_signature, KeyRejection,
    PlayerProfileKey,
};

/// Re-exported so dependents can hold client keys without their own rsa
/// dependency.
pub use rsa::RsaPublicKey;

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("RSA decryption failed: {0}")]
    Decrypt(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("shared secret must be 16 bytes, got {0}")]
    BadSecretLength(usize),
}
