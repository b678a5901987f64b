//! HMAC integrity check for modern proxy forwarding payloads.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Length of the HMAC-SHA256 tag prefixed to a forwarded payload.
pub const SIGNATURE_LEN: usize = 32;

/// Split a forwarding payload into signature and body, returning the body
/// only when the signature matches under the shared secret.
pub fn verify_forwarding_integrity<'a>(payload: &'a [u8], secret: &[u8]) -> Option<&'a [u8]> {
    if payload.len() < SIGNATURE_LEN {
        return None;
    }
    let (signature, body) = payload.split_at(SIGNATURE_LEN);
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).ok()?;
    mac.update(body);
    mac.verify_slice(signature).ok()?;
    Some(body)
}
