//! Protocol encoding/decoding traits and helpers.

use bytes::{Buf, BufMut};
use uuid::Uuid;

use crate::error::ProtoError;
use crate::types::VarInt;

/// Default bound for protocol strings without a tighter field-specific limit.
pub const MAX_STRING_LEN: usize = 32767;

/// Encode a value onto a buffer.
pub trait ProtoEncode {
    fn proto_encode(&self, buf: &mut impl BufMut);
}

/// Decode a value from a buffer.
pub trait ProtoDecode: Sized {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError>;
}

fn ensure(buf: &impl Buf, needed: usize) -> Result<(), ProtoError> {
    if buf.remaining() < needed {
        return Err(ProtoError::BufferTooShort {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Write a protocol string (VarInt length + UTF-8).
pub fn write_string(buf: &mut impl BufMut, s: &str) {
    VarInt(s.len() as i32).proto_encode(buf);
    buf.put_slice(s.as_bytes());
}

/// Read a protocol string with the default length bound.
pub fn read_string(buf: &mut impl Buf) -> Result<String, ProtoError> {
    read_string_bounded(buf, MAX_STRING_LEN)
}

/// Read a protocol string (VarInt length + UTF-8), rejecting anything longer
/// than `max` characters. The declared byte length is checked against the
/// UTF-8 worst case before any allocation happens.
pub fn read_string_bounded(buf: &mut impl Buf, max: usize) -> Result<String, ProtoError> {
    let len = VarInt::proto_decode(buf)?.0;
    if len < 0 {
        return Err(ProtoError::InvalidData(format!(
            "negative string length {len}"
        )));
    }
    let len = len as usize;
    if len > max * 4 {
        return Err(ProtoError::StringTooLong { length: len, max });
    }
    ensure(buf, len)?;
    let data = buf.copy_to_bytes(len);
    let s = String::from_utf8(data.to_vec()).map_err(|_| ProtoError::InvalidUtf8)?;
    if s.chars().count() > max {
        return Err(ProtoError::StringTooLong { length: len, max });
    }
    Ok(s)
}

/// Write a length-prefixed byte array (VarInt length + raw bytes).
pub fn write_byte_array(buf: &mut impl BufMut, data: &[u8]) {
    VarInt(data.len() as i32).proto_encode(buf);
    buf.put_slice(data);
}

/// Read a length-prefixed byte array, rejecting anything longer than `max`.
pub fn read_byte_array(buf: &mut impl Buf, max: usize) -> Result<Vec<u8>, ProtoError> {
    let len = VarInt::proto_decode(buf)?.0;
    if len < 0 {
        return Err(ProtoError::InvalidData(format!(
            "negative array length {len}"
        )));
    }
    let len = len as usize;
    if len > max {
        return Err(ProtoError::ArrayTooLong { length: len, max });
    }
    ensure(buf, len)?;
    Ok(buf.copy_to_bytes(len).to_vec())
}

/// Write a UUID as sixteen big-endian bytes.
pub fn write_uuid(buf: &mut impl BufMut, uuid: &Uuid) {
    buf.put_u128(uuid.as_u128());
}

/// Read a UUID from sixteen big-endian bytes.
pub fn read_uuid(buf: &mut impl Buf) -> Result<Uuid, ProtoError> {
    ensure(buf, 16)?;
    Ok(Uuid::from_u128(buf.get_u128()))
}

/// Write plain text as a minimal JSON chat component.
pub fn write_chat_text(buf: &mut impl BufMut, text: &str) {
    write_string(buf, &serde_json::json!({ "text": text }).to_string());
}

/// Read a JSON chat component, extracting its `text` field. Payloads that
/// are not chat components come back verbatim.
pub fn read_chat_text(buf: &mut impl Buf) -> Result<String, ProtoError> {
    let raw = read_string(buf)?;
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(value) => match value.get("text").and_then(|t| t.as_str()) {
            Some(text) => Ok(text.to_owned()),
            None => Ok(raw),
        },
        Err(_) => Ok(raw),
    }
}

pub fn read_bool(buf: &mut impl Buf) -> Result<bool, ProtoError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8() != 0)
}

pub fn read_u8(buf: &mut impl Buf) -> Result<u8, ProtoError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

pub fn read_u16(buf: &mut impl Buf) -> Result<u16, ProtoError> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

pub fn read_i32(buf: &mut impl Buf) -> Result<i32, ProtoError> {
    ensure(buf, 4)?;
    Ok(buf.get_i32())
}

pub fn read_i64(buf: &mut impl Buf) -> Result<i64, ProtoError> {
    ensure(buf, 8)?;
    Ok(buf.get_i64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn string_roundtrip() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "Hello, world!");
        let result = read_string(&mut buf.freeze()).unwrap();
        assert_eq!(result, "Hello, world!");
    }

    #[test]
    fn string_empty() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "");
        let result = read_string(&mut buf.freeze()).unwrap();
        assert_eq!(result, "");
    }

    #[test]
    fn string_unicode() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "日本語テスト");
        let result = read_string(&mut buf.freeze()).unwrap();
        assert_eq!(result, "日本語テスト");
    }

    #[test]
    fn string_buffer_too_short() {
        // Write a string but truncate the buffer
        let mut buf = BytesMut::new();
        write_string(&mut buf, "Hello");
        let truncated = buf.freeze().slice(..3); // Only length prefix, not full data
        assert!(read_string(&mut truncated.clone()).is_err());
    }

    #[test]
    fn string_over_bound_rejected() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "seventeen chars!!");
        let err = read_string_bounded(&mut buf.freeze(), 16).unwrap_err();
        assert!(matches!(err, ProtoError::StringTooLong { .. }));
    }

    #[test]
    fn string_at_bound_accepted() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "sixteen chars!!!");
        let result = read_string_bounded(&mut buf.freeze(), 16).unwrap();
        assert_eq!(result, "sixteen chars!!!");
    }

    #[test]
    fn string_negative_length_rejected() {
        let mut buf = BytesMut::new();
        VarInt(-1).proto_encode(&mut buf);
        assert!(read_string(&mut buf.freeze()).is_err());
    }

    #[test]
    fn byte_array_roundtrip() {
        let mut buf = BytesMut::new();
        write_byte_array(&mut buf, &[1, 2, 3, 4, 5]);
        let result = read_byte_array(&mut buf.freeze(), 16).unwrap();
        assert_eq!(result, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn byte_array_over_bound_rejected() {
        let mut buf = BytesMut::new();
        write_byte_array(&mut buf, &[0u8; 32]);
        let err = read_byte_array(&mut buf.freeze(), 16).unwrap_err();
        assert!(matches!(err, ProtoError::ArrayTooLong { .. }));
    }

    #[test]
    fn uuid_roundtrip() {
        let uuid = Uuid::parse_str("069a79f4-44e9-4726-a5be-fca90e38aaf5").unwrap();
        let mut buf = BytesMut::new();
        write_uuid(&mut buf, &uuid);
        assert_eq!(buf.len(), 16);
        let result = read_uuid(&mut buf.freeze()).unwrap();
        assert_eq!(result, uuid);
    }

    #[test]
    fn primitive_reads_check_remaining() {
        assert!(read_bool(&mut &[][..]).is_err());
        assert!(read_u16(&mut &[0u8][..]).is_err());
        assert!(read_i64(&mut &[0u8; 7][..]).is_err());
        assert!(read_uuid(&mut &[0u8; 15][..]).is_err());
    }
}
