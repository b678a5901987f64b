//! Session digests and offline-mode identity.

use md5::Md5;
use num_bigint::BigInt;
use sha1::{Digest, Sha1};
use uuid::Uuid;

/// Hash a login attempt for the session service `hasJoined` query:
/// SHA-1 over the server ID, the shared secret and the server's public key,
/// rendered in the signed-magnitude hex form the service expects.
pub fn server_hash(server_id: &str, shared_secret: &[u8], public_key_der: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(server_id.as_bytes());
    hasher.update(shared_secret);
    hasher.update(public_key_der);
    signed_hex(&hasher.finalize())
}

/// Interpret a digest as a big-endian signed integer and render it in
/// lowercase hex without leading zeros. Negative digests keep their sign.
fn signed_hex(digest: &[u8]) -> String {
    BigInt::from_signed_bytes_be(digest).to_str_radix(16)
}

/// Offline-mode UUID for a username: the raw MD5 of `OfflinePlayer:{name}`
/// with name-based (version 3) UUID bits, matching what Java servers derive.
pub fn offline_player_uuid(name: &str) -> Uuid {
    let mut hasher = Md5::new();
    hasher.update(b"OfflinePlayer:");
    hasher.update(name.as_bytes());
    uuid::Builder::from_md5_bytes(hasher.finalize().into()).into_uuid()
}
