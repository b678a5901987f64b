//! Status phase packets: list ping and latency probe.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

/// Status Request (0x00) — Client → Server. Carries no fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusRequest;

impl ProtoEncode for StatusRequest {
    fn proto_encode(&self, _buf: &mut impl BufMut) {}
}

impl ProtoDecode for StatusRequest {
    fn proto_decode(_buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(StatusRequest)
    }
}

/// Status Response (0x00) — Server → Client. The payload is the JSON status
/// document shown in the client's server list.
#[derive(Debug, Clone)]
pub struct StatusResponse {
    pub payload: String,
}

impl ProtoEncode for StatusResponse {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.payload);
    }
}

impl ProtoDecode for StatusResponse {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            payload: codec::read_string(buf)?,
        })
    }
}

/// Ping Request (0x01) — Client → Server. The payload is opaque to the
/// server and echoed back verbatim.
#[derive(Debug, Clone, Copy)]
pub struct StatusPing {
    pub payload: i64,
}

impl ProtoEncode for StatusPing {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.payload);
    }
}

impl ProtoDecode for StatusPing {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            payload: codec::read_i64(buf)?,
        })
    }
}

/// Ping Response (0x01) — Server → Client.
#[derive(Debug, Clone, Copy)]
pub struct StatusPong {
    pub payload: i64,
}

impl ProtoEncode for StatusPong {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.payload);
    }
}

impl ProtoDecode for StatusPong {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            payload: codec::read_i64(buf)?,
        })
    }
}
