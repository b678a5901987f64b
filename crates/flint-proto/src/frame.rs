//! Packet framing: VarInt length prefixes and threshold-based zlib compression.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{VarInt, VarIntError};

/// Largest frame either peer may send (the most a three-byte VarInt can hold).
pub const MAX_FRAME_LEN: usize = 2_097_151;

fn compress(data: &[u8]) -> Result<Vec<u8>, ProtoError> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| ProtoError::CompressError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| ProtoError::CompressError(e.to_string()))
}

fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>, ProtoError> {
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    // Read one byte past the declared size so an oversized payload is caught
    // without inflating it in full.
    let mut output = Vec::with_capacity(expected_len);
    ZlibDecoder::new(data)
        .take(expected_len as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|e| ProtoError::DecompressError(e.to_string()))?;
    if output.len() != expected_len {
        return Err(ProtoError::BadlyCompressed(format!(
            "declared {expected_len} decompressed bytes but got {}",
            output.len()
        )));
    }
    Ok(output)
}

/// Stateful framer for one connection. Compression starts disabled and is
/// switched on at most once per connection; the threshold itself can be
/// re-configured afterwards without another wire exchange.
#[derive(Debug)]
pub struct FrameCodec {
    threshold: i32,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self { threshold: -1 }
    }

    /// Current compression threshold. Negative means compression is off.
    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: i32) {
        self.threshold = threshold;
    }

    pub fn compression_enabled(&self) -> bool {
        self.threshold >= 0
    }

    /// Frame a packet body into `out`.
    pub fn encode(&self, packet: &[u8], out: &mut BytesMut) -> Result<(), ProtoError> {
        if self.threshold < 0 {
            if packet.len() > MAX_FRAME_LEN {
                return Err(ProtoError::FrameTooLarge {
                    length: packet.len(),
                    max: MAX_FRAME_LEN,
                });
            }
            VarInt(packet.len() as i32).proto_encode(out);
            out.put_slice(packet);
            return Ok(());
        }

        let mut body = BytesMut::new();
        if packet.len() >= self.threshold as usize {
            let compressed = compress(packet)?;
            VarInt(packet.len() as i32).proto_encode(&mut body);
            body.put_slice(&compressed);
        } else {
            VarInt(0).proto_encode(&mut body);
            body.put_slice(packet);
        }
        if body.len() > MAX_FRAME_LEN {
            return Err(ProtoError::FrameTooLarge {
                length: body.len(),
                max: MAX_FRAME_LEN,
            });
        }
        VarInt(body.len() as i32).proto_encode(out);
        out.put_slice(&body);
        Ok(())
    }

    /// Extract the next packet body from `buf`, if a full frame has arrived.
    /// `Ok(None)` means more bytes are needed; consumed bytes are only
    /// removed from `buf` once a whole frame is available.
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Option<Bytes>, ProtoError> {
        let (length, prefix_len) = match VarInt::decode(buf) {
            Ok((v, used)) => (v.0, used),
            Err(VarIntError::BufferTooShort) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if length < 0 {
            return Err(ProtoError::InvalidData(format!(
                "negative frame length {length}"
            )));
        }
        let length = length as usize;
        if length > MAX_FRAME_LEN {
            return Err(ProtoError::FrameTooLarge {
                length,
                max: MAX_FRAME_LEN,
            });
        }
        if buf.len() - prefix_len < length {
            return Ok(None);
        }
        buf.advance(prefix_len);
        let mut frame = buf.split_to(length).freeze();

        if self.threshold < 0 {
            return Ok(Some(frame));
        }

        let data_len = VarInt::proto_decode(&mut frame)?.0;
        if data_len == 0 {
            // Sent raw. Anything at or above the threshold must be compressed.
            if frame.len() >= self.threshold as usize {
                return Err(ProtoError::BadlyCompressed(format!(
                    "{} raw bytes sent at or above the threshold of {}",
                    frame.len(),
                    self.threshold
                )));
            }
            return Ok(Some(frame));
        }
        if data_len < 0 {
            return Err(ProtoError::InvalidData(format!(
                "negative decompressed length {data_len}"
            )));
        }
        if (data_len as usize) < self.threshold as usize {
            return Err(ProtoError::BadlyCompressed(format!(
                "{data_len} bytes compressed below the threshold of {}",
                self.threshold
            )));
        }
        if data_len as usize > MAX_FRAME_LEN {
            return Err(ProtoError::FrameTooLarge {
                length: data_len as usize,
                max: MAX_FRAME_LEN,
            });
        }
        let decompressed = decompress(&frame, data_len as usize)?;
        Ok(Some(Bytes::from(decompressed)))
    }
}

/// Encode a packet ID plus body into a single un-framed buffer.
pub fn encode_body(id: i32, packet: &impl ProtoEncode) -> Bytes {
    let mut buf = BytesMut::new();
    VarInt(id).proto_encode(&mut buf);
    packet.proto_encode(&mut buf);
    buf.freeze()
}
