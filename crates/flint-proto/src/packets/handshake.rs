//! Handshake (0x00) — Client → Server.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

/// Proxies append forwarding data to the address field, so the bound is far
/// larger than any real hostname.
const MAX_ADDRESS_LEN: usize = 4096;

/// State the client asks to move to after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    Status,
    Login,
}

impl TryFrom<i32> for NextState {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, i32> {
        match value {
            1 => Ok(NextState::Status),
            2 => Ok(NextState::Login),
            other => Err(other),
        }
    }
}

/// First packet of every connection. `next_state` is kept raw so a handler
/// can report unknown values instead of failing the decode.
#[derive(Debug, Clone)]
pub struct Handshake {
    /// Protocol version the client speaks.
    pub protocol_version: i32,
    /// Hostname or address the client connected to.
    pub server_address: String,
    /// Port the client connected to.
    pub server_port: u16,
    /// Requested next state (1 = status, 2 = login).
    pub next_state: i32,
}

impl Handshake {
    pub fn next_state(&self) -> Result<NextState, i32> {
        NextState::try_from(self.next_state)
    }
}

impl ProtoEncode for Handshake {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.protocol_version).proto_encode(buf);
        codec::write_string(buf, &self.server_address);
        buf.put_u16(self.server_port);
        VarInt(self.next_state).proto_encode(buf);
    }
}

impl ProtoDecode for Handshake {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            protocol_version: VarInt::proto_decode(buf)?.0,
            server_address: codec::read_string_bounded(buf, MAX_ADDRESS_LEN)?,
            server_port: codec::read_u16(buf)?,
            next_state: VarInt::proto_decode(buf)?.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn roundtrip() {
        let pkt = Handshake {
            protocol_version: 760,
            server_address: "play.example.com".into(),
            server_port: 25565,
            next_state: 2,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = Handshake::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.protocol_version, 760);
        assert_eq!(decoded.server_address, "play.example.com");
        assert_eq!(decoded.server_port, 25565);
        assert_eq!(decoded.next_state(), Ok(NextState::Login));
    }

    #[test]
    fn next_state_values() {
        assert_eq!(NextState::try_from(1), Ok(NextState::Status));
        assert_eq!(NextState::try_from(2), Ok(NextState::Login));
        assert_eq!(NextState::try_from(0), Err(0));
        assert_eq!(NextState::try_from(3), Err(3));
    }

    #[test]
    fn unknown_next_state_still_decodes() {
        let pkt = Handshake {
            protocol_version: 760,
            server_address: "localhost".into(),
            server_port: 25565,
            next_state: 7,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = Handshake::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.next_state(), Err(7));
    }

    #[test]
    fn address_carries_forwarding_payload() {
        // Proxies smuggle forwarding fields into the address, NUL-separated.
        let address = "play.example.com\x00192.168.1.5\x00069a79f444e94726a5befca90e38aaf5";
        let pkt = Handshake {
            protocol_version: 760,
            server_address: address.into(),
            server_port: 25565,
            next_state: 2,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = Handshake::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.server_address, address);
    }

    #[test]
    fn oversized_address_rejected() {
        let pkt = Handshake {
            protocol_version: 760,
            server_address: "x".repeat(MAX_ADDRESS_LEN + 1),
            server_port: 25565,
            next_state: 1,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        assert!(Handshake::proto_decode(&mut buf.freeze()).is_err());
    }
}
