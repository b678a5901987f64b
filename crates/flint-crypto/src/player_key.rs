//! Validation of the profile signing keys clients present at login.

use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use thiserror::Error;

use crate::CryptoError;

/// Why a presented profile key was not accepted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyRejection {
    #[error("expired profile public key")]
    Expired,
    #[error("malformed profile public key")]
    InvalidKey,
    #[error("invalid profile public key signature")]
    InvalidSignature,
}

/// A client profile key that passed validation.
#[derive(Debug, Clone)]
pub struct PlayerProfileKey {
    /// Expiry instant as epoch milliseconds.
    pub expires_at: i64,
    pub public_key: RsaPublicKey,
}

/// Parse an SPKI DER public key, as distributed for the services authority.
pub fn parse_public_key_der(der: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_der(der).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// Validate the key block from Login Start: parse the key, check expiry
/// against `now_millis`, and when a root key is configured verify the
/// authority signature over the ASCII expiry timestamp followed by the DER
/// key bytes (RSA over SHA-1).
pub fn validate_profile_key(
    expires_at: i64,
    key_der: &[u8],
    signature: &[u8],
    root_key: Option<&RsaPublicKey>,
    now_millis: i64,
) -> Result<PlayerProfileKey, KeyRejection> {
    let public_key =
        RsaPublicKey::from_public_key_der(key_der).map_err(|_| KeyRejection::InvalidKey)?;
    if expires_at < now_millis {
        return Err(KeyRejection::Expired);
    }
    if let Some(root) = root_key {
        let mut payload = expires_at.to_string().into_bytes();
        payload.extend_from_slice(key_der);
        let hashed = Sha1::digest(&payload);
        root.verify(Pkcs1v15Sign::new::<Sha1>(), &hashed, signature)
            .map_err(|_| KeyRejection::InvalidSignature)?;
    }
    Ok(PlayerProfileKey {
        expires_at,
        public_key,
    })
}

/// Check a salted signature over the verify token, made with the client's
/// validated profile key (RSA over SHA-256 of token then big-endian salt).
pub fn verify_token_signature(
    key: &RsaPublicKey,
    verify_token: &[u8],
    salt: i64,
    signature: &[u8],
) -> bool {
    let mut hasher = Sha256::new();
    hasher.update(verify_token);
    hasher.update(salt.to_be_bytes());
    key.verify(Pkcs1v15Sign::new::<Sha256>(), &hasher.finalize(), signature)
        .is_ok()
}
