//! Play phase packets the admission layer needs.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

/// Disconnect (0x19) — Server → Client. Used once a connection has reached
/// Play, where the login-phase disconnect is no longer valid.
#[derive(Debug, Clone)]
pub struct PlayDisconnect {
    pub reason: String,
}

impl PlayDisconnect {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ProtoEncode for PlayDisconnect {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_chat_text(buf, &self.reason);
    }
}

impl ProtoDecode for PlayDisconnect {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            reason: codec::read_chat_text(buf)?,
        })
    }
}
