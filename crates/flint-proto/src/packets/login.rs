//! Login phase packets, both directions.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::profile::{GameProfile, ProfileProperty};
use crate::types::VarInt;

const MAX_USERNAME_LEN: usize = 16;
const MAX_KEY_LEN: usize = 512;
const MAX_KEY_SIGNATURE_LEN: usize = 4096;
const MAX_SECRET_LEN: usize = 256;
const MAX_TOKEN_SIGNATURE_LEN: usize = 1024;
const MAX_SERVER_ID_LEN: usize = 20;
const MAX_PROFILE_PROPERTIES: usize = 64;

// ---------------------------------------------------------------------------
// Serverbound
// ---------------------------------------------------------------------------

/// The profile signing key a client may present alongside its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileKeyData {
    /// Expiry instant as epoch milliseconds.
    pub expires_at: i64,
    /// RSA public key, DER-encoded.
    pub public_key: Vec<u8>,
    /// Signature binding expiry and key, issued by the services authority.
    pub signature: Vec<u8>,
}

impl ProtoEncode for ProfileKeyData {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.expires_at);
        codec::write_byte_array(buf, &self.public_key);
        codec::write_byte_array(buf, &self.signature);
    }
}

impl ProtoDecode for ProfileKeyData {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            expires_at: codec::read_i64(buf)?,
            public_key: codec::read_byte_array(buf, MAX_KEY_LEN)?,
            signature: codec::read_byte_array(buf, MAX_KEY_SIGNATURE_LEN)?,
        })
    }
}

/// Login Start (0x00) — Client → Server.
#[derive(Debug, Clone)]
pub struct LoginStart {
    /// Claimed username. Validated separately against the allowed charset.
    pub name: String,
    /// Profile signing key, when the client has one.
    pub key: Option<ProfileKeyData>,
}

impl ProtoEncode for LoginStart {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.name);
        match &self.key {
            Some(key) => {
                buf.put_u8(1);
                key.proto_encode(buf);
            }
            None => buf.put_u8(0),
        }
    }
}

impl ProtoDecode for LoginStart {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let name = codec::read_string_bounded(buf, MAX_USERNAME_LEN)?;
        let key = if codec::read_bool(buf)? {
            Some(ProfileKeyData::proto_decode(buf)?)
        } else {
            None
        };
        Ok(Self { name, key })
    }
}

/// Proof the client holds the shared secret: either the verify token
/// encrypted under the server's RSA key, or a salted signature made with the
/// client's profile key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenResponse {
    Encrypted(Vec<u8>),
    Signed { salt: i64, signature: Vec<u8> },
}

/// Encryption Response (0x01) — Client → Server.
#[derive(Debug, Clone)]
pub struct EncryptionResponse {
    /// AES shared secret, encrypted under the server's RSA public key.
    pub shared_secret: Vec<u8>,
    pub token: TokenResponse,
}

impl ProtoEncode for EncryptionResponse {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_byte_array(buf, &self.shared_secret);
        match &self.token {
            TokenResponse::Encrypted(token) => {
                buf.put_u8(1);
                codec::write_byte_array(buf, token);
            }
            TokenResponse::Signed { salt, signature } => {
                buf.put_u8(0);
                buf.put_i64(*salt);
                codec::write_byte_array(buf, signature);
            }
        }
    }
}

impl ProtoDecode for EncryptionResponse {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let shared_secret = codec::read_byte_array(buf, MAX_SECRET_LEN)?;
        let token = if codec::read_bool(buf)? {
            TokenResponse::Encrypted(codec::read_byte_array(buf, MAX_SECRET_LEN)?)
        } else {
            TokenResponse::Signed {
                salt: codec::read_i64(buf)?,
                signature: codec::read_byte_array(buf, MAX_TOKEN_SIGNATURE_LEN)?,
            }
        };
        Ok(Self {
            shared_secret,
            token,
        })
    }
}

/// Login Plugin Response (0x02) — Client → Server. `data` is `Some` when the
/// client understood the channel; the payload runs to the end of the packet.
#[derive(Debug, Clone)]
pub struct LoginPluginResponse {
    pub message_id: i32,
    pub data: Option<Vec<u8>>,
}

impl ProtoEncode for LoginPluginResponse {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.message_id).proto_encode(buf);
        match &self.data {
            Some(data) => {
                buf.put_u8(1);
                buf.put_slice(data);
            }
            None => buf.put_u8(0),
        }
    }
}

impl ProtoDecode for LoginPluginResponse {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let message_id = VarInt::proto_decode(buf)?.0;
        let data = if codec::read_bool(buf)? {
            Some(buf.copy_to_bytes(buf.remaining()).to_vec())
        } else {
            None
        };
        Ok(Self { message_id, data })
    }
}

// ---------------------------------------------------------------------------
// Clientbound
// ---------------------------------------------------------------------------

/// Login Disconnect (0x00) — Server → Client. The wire form is a JSON chat
/// component wrapping the plain reason text.
#[derive(Debug, Clone)]
pub struct LoginDisconnect {
    pub reason: String,
}

impl LoginDisconnect {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ProtoEncode for LoginDisconnect {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_chat_text(buf, &self.reason);
    }
}

impl ProtoDecode for LoginDisconnect {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            reason: codec::read_chat_text(buf)?,
        })
    }
}

/// Encryption Request (0x01) — Server → Client.
#[derive(Debug, Clone)]
pub struct EncryptionRequest {
    /// Hashed-server-id salt. Empty for modern clients.
    pub server_id: String,
    /// Server RSA public key, DER-encoded.
    pub public_key: Vec<u8>,
    /// Random bytes the client must echo back encrypted.
    pub verify_token: Vec<u8>,
}

impl ProtoEncode for EncryptionRequest {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.server_id);
        codec::write_byte_array(buf, &self.public_key);
        codec::write_byte_array(buf, &self.verify_token);
    }
}

impl ProtoDecode for EncryptionRequest {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            server_id: codec::read_string_bounded(buf, MAX_SERVER_ID_LEN)?,
            public_key: codec::read_byte_array(buf, MAX_KEY_LEN)?,
            verify_token: codec::read_byte_array(buf, MAX_SECRET_LEN)?,
        })
    }
}

/// Login Success (0x02) — Server → Client. Moves the connection to Play.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub profile: GameProfile,
}

impl ProtoEncode for LoginSuccess {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_uuid(buf, &self.profile.uuid);
        codec::write_string(buf, &self.profile.name);
        VarInt(self.profile.properties.len() as i32).proto_encode(buf);
        for property in &self.profile.properties {
            codec::write_string(buf, &property.name);
            codec::write_string(buf, &property.value);
            match &property.signature {
                Some(sig) => {
                    buf.put_u8(1);
                    codec::write_string(buf, sig);
                }
                None => buf.put_u8(0),
            }
        }
    }
}

impl ProtoDecode for LoginSuccess {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let uuid = codec::read_uuid(buf)?;
        let name = codec::read_string_bounded(buf, MAX_USERNAME_LEN)?;
        let count = VarInt::proto_decode(buf)?.0;
        if count < 0 || count as usize > MAX_PROFILE_PROPERTIES {
            return Err(ProtoError::InvalidData(format!(
                "bad profile property count {count}"
            )));
        }
        let mut properties = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = codec::read_string(buf)?;
            let value = codec::read_string(buf)?;
            let signature = if codec::read_bool(buf)? {
                Some(codec::read_string(buf)?)
            } else {
                None
            };
            properties.push(ProfileProperty {
                name,
                value,
                signature,
            });
        }
        Ok(Self {
            profile: GameProfile {
                uuid,
                name,
                properties,
            },
        })
    }
}

/// Set Compression (0x03) — Server → Client. Packets at or above `threshold`
/// bytes are compressed from the next frame on.
#[derive(Debug, Clone, Copy)]
pub struct SetCompression {
    pub threshold: i32,
}

impl ProtoEncode for SetCompression {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.threshold).proto_encode(buf);
    }
}

impl ProtoDecode for SetCompression {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            threshold: VarInt::proto_decode(buf)?.0,
        })
    }
}

/// Login Plugin Request (0x04) — Server → Client. `data` runs to the end of
/// the packet with no length prefix.
#[derive(Debug, Clone)]
pub struct LoginPluginRequest {
    pub message_id: i32,
    pub channel: String,
    pub data: Vec<u8>,
}

impl ProtoEncode for LoginPluginRequest {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.message_id).proto_encode(buf);
        codec::write_string(buf, &self.channel);
        buf.put_slice(&self.data);
    }
}

impl ProtoDecode for LoginPluginRequest {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            message_id: VarInt::proto_decode(buf)?.0,
            channel: codec::read_string(buf)?,
            data: buf.copy_to_bytes(buf.remaining()).to_vec(),
        })
    }
}
