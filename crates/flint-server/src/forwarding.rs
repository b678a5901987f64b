//! Proxy forwarding: mode configuration, shape detection on the handshake
//! address field, and parsers for the three forwarding wire formats.

use flint_proto::codec::{self, ProtoDecode};
use flint_proto::error::ProtoError;
use flint_proto::packets::login::ProfileKeyData;
use flint_proto::profile::ProfileProperty;
use flint_proto::types::VarInt;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// Reserved plugin channel carrying modern forwarding data.
pub const VELOCITY_CHANNEL: &str = "velocity:player_info";

/// Highest modern forwarding version this server understands. Version 2 adds
/// the player key block.
pub const MAX_FORWARDING_VERSION: i32 = 2;

/// First modern forwarding version that carries a player key block.
const FORWARDING_WITH_KEY: i32 = 2;

const MAX_FORWARDED_PROPERTIES: usize = 64;

#[derive(Debug, Error)]
pub enum ForwardingError {
    #[error("expected {expected} {format} fields, got {actual}")]
    WrongFieldCount {
        format: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid forwarded uuid {0:?}")]
    InvalidUuid(String),
    #[error("invalid forwarded properties: {0}")]
    InvalidProperties(String),
    #[error("invalid forwarded address {0:?}")]
    InvalidAddress(String),
    #[error("unsupported forwarding version {0}, supported up to {MAX_FORWARDING_VERSION}")]
    UnsupportedVersion(i32),
    #[error(transparent)]
    Proto(#[from] ProtoError),
}

/// How (and whether) a fronting proxy hands us the real client identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardingMode {
    #[default]
    None,
    /// BungeeCord-style identity data smuggled into the handshake address field.
    Legacy,
    /// TCPShield real-IP data in the handshake address field.
    Tcpshield,
    /// Velocity-style login plugin message with an HMAC integrity check.
    Modern,
}

impl ForwardingMode {
    /// Whether the proxy already authenticated the client, making our own
    /// session-service round trip redundant. TCPShield only forwards the
    /// address; its clients still authenticate against the session service.
    pub fn authenticates_users(self) -> bool {
        matches!(self, Self::Legacy | Self::Modern)
    }
}

/// Forwarding format suggested by the raw handshake address field, before any
/// cross-check against the configured mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardingShape {
    Plain,
    Legacy,
    Tcpshield,
}

/// Classify the handshake address field by shape alone.
pub fn detect_shape(address: &str) -> ForwardingShape {
    if address.contains('\0') {
        ForwardingShape::Legacy
    } else if address.contains("///") {
        ForwardingShape::Tcpshield
    } else {
        ForwardingShape::Plain
    }
}

/// Client identity recovered from a proxy, whichever format carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedData {
    /// Real client address as reported by the proxy.
    pub address: String,
    /// Real client port, when the format carries one.
    pub port: Option<u16>,
    /// Authoritative UUID, when the format carries one.
    pub uuid: Option<Uuid>,
    pub properties: Vec<ProfileProperty>,
}

/// Parse BungeeCord-style legacy forwarding out of the handshake address
/// field: `host \0 real-ip \0 undashed-uuid [\0 properties-json]`.
///
/// Returns `Ok(None)` when the field carries no forwarding data at all, which
/// the caller treats as a direct connection.
pub fn parse_legacy(address: &str) -> Result<Option<ForwardedData>, ForwardingError> {
    if !address.contains('\0') {
        return Ok(None);
    }
    let fields: Vec<&str> = address.split('\0').collect();
    if fields.len() < 3 || fields.len() > 4 {
        return Err(ForwardingError::WrongFieldCount {
            format: "legacy",
            expected: 3,
            actual: fields.len(),
        });
    }

    let uuid = Uuid::parse_str(fields[2])
        .map_err(|_| ForwardingError::InvalidUuid(fields[2].to_owned()))?;
    let properties = match fields.get(3) {
        Some(json) => serde_json::from_str::<Vec<ProfileProperty>>(json)
            .map_err(|err| ForwardingError::InvalidProperties(err.to_string()))?,
        None => Vec::new(),
    };

    Ok(Some(ForwardedData {
        address: fields[1].to_owned(),
        port: None,
        uuid: Some(uuid),
        properties,
    }))
}

/// Parse TCPShield real-IP forwarding out of the handshake address field:
/// `host /// real-ip:port /// timestamp [/// signature]`. Trailing segments
/// beyond the required three are tolerated.
///
/// Returns `Ok(None)` when the field carries no forwarding data at all.
pub fn parse_tcpshield(address: &str) -> Result<Option<ForwardedData>, ForwardingError> {
    if !address.contains("///") {
        return Ok(None);
    }
    let fields: Vec<&str> = address.split("///").collect();
    if fields.len() < 3 {
        return Err(ForwardingError::WrongFieldCount {
            format: "TCPShield",
            expected: 3,
            actual: fields.len(),
        });
    }

    let (host, port) = fields[1]
        .rsplit_once(':')
        .ok_or_else(|| ForwardingError::InvalidAddress(fields[1].to_owned()))?;
    let port: u16 = port
        .parse()
        .map_err(|_| ForwardingError::InvalidAddress(fields[1].to_owned()))?;

    Ok(Some(ForwardedData {
        address: host.to_owned(),
        port: Some(port),
        uuid: None,
        properties: Vec::new(),
    }))
}

/// Identity data carried by a modern forwarding plugin response.
#[derive(Debug, Clone)]
pub struct VelocityData {
    pub version: i32,
    pub address: String,
    pub uuid: Uuid,
    pub username: String,
    pub properties: Vec<ProfileProperty>,
    /// Player key pre-validated by the proxy, present from version 2 on.
    pub key: Option<ProfileKeyData>,
}

/// Decode the payload that follows a verified forwarding signature.
pub fn decode_velocity_payload(payload: &[u8]) -> Result<VelocityData, ForwardingError> {
    let mut buf = payload;
    let version = VarInt::proto_decode(&mut buf)?.0;
    if version > MAX_FORWARDING_VERSION {
        return Err(ForwardingError::UnsupportedVersion(version));
    }

    let address = codec::read_string(&mut buf)?;
    let uuid = codec::read_uuid(&mut buf)?;
    let username = codec::read_string_bounded(&mut buf, 16)?;
    let properties = read_velocity_properties(&mut buf)?;
    let key = if version >= FORWARDING_WITH_KEY {
        Some(ProfileKeyData::proto_decode(&mut buf)?)
    } else {
        None
    };

    Ok(VelocityData {
        version,
        address,
        uuid,
        username,
        properties,
        key,
    })
}

fn read_velocity_properties(
    buf: &mut impl bytes::Buf,
) -> Result<Vec<ProfileProperty>, ForwardingError> {
    let count = VarInt::proto_decode(buf)?.0;
    if count < 0 || count as usize > MAX_FORWARDED_PROPERTIES {
        return Err(ForwardingError::InvalidProperties(format!(
            "bad property count {count}"
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
    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};
    use flint_proto::codec::ProtoEncode;

    #[test]
    fn shape_detection() {
        assert_eq!(detect_shape("mc.example.org"), ForwardingShape::Plain);
        assert_eq!(detect_shape("host\0ip\0uuid"), ForwardingShape::Legacy);
        assert_eq!(
            detect_shape("host///1.2.3.4:5///123"),
            ForwardingShape::Tcpshield
        );
    }

    #[test]
    fn legacy_parses_all_fields() {
        let address = concat!(
            "mc.example.org\0",
            "203.0.113.7\0",
            "069a79f444e94726a5befca90e38aaf5\0",
            r#"[{"name":"textures","value":"e30=","signature":"c2ln"}]"#
        );
        let data = parse_legacy(address).unwrap().unwrap();
        assert_eq!(data.address, "203.0.113.7");
        assert_eq!(
            data.uuid,
            Some(Uuid::parse_str("069a79f4-44e9-4726-a5be-fca90e38aaf5").unwrap())
        );
        assert_eq!(data.port, None);
        assert_eq!(data.properties.len(), 1);
        assert_eq!(data.properties[0].name, "textures");
    }

    #[test]
    fn legacy_properties_are_optional() {
        let address = "mc.example.org\0203.0.113.7\0069a79f444e94726a5befca90e38aaf5";
        let data = parse_legacy(address).unwrap().unwrap();
        assert!(data.properties.is_empty());
    }

    #[test]
    fn legacy_plain_address_is_none() {
        assert!(parse_legacy("mc.example.org").unwrap().is_none());
    }

    #[test]
    fn legacy_wrong_field_count_is_error() {
        assert!(parse_legacy("host\0onlytwo").is_err());
        assert!(parse_legacy("a\0b\0c\0d\0e").is_err());
    }

    #[test]
    fn legacy_bad_uuid_is_error() {
        let err = parse_legacy("host\0ip\0not-a-uuid").unwrap_err();
        assert!(matches!(err, ForwardingError::InvalidUuid(_)));
    }

    #[test]
    fn tcpshield_parses_real_address() {
        let data = parse_tcpshield("mc.example.org///203.0.113.7:61234///1626813299")
            .unwrap()
            .unwrap();
        assert_eq!(data.address, "203.0.113.7");
        assert_eq!(data.port, Some(61234));
        assert_eq!(data.uuid, None);
    }

    #[test]
    fn tcpshield_tolerates_trailing_signature() {
        let data = parse_tcpshield("host///1.2.3.4:5///123///c2lnbmF0dXJl")
            .unwrap()
            .unwrap();
        assert_eq!(data.address, "1.2.3.4");
        assert_eq!(data.port, Some(5));
    }

    #[test]
    fn tcpshield_plain_address_is_none() {
        assert!(parse_tcpshield("mc.example.org").unwrap().is_none());
    }

    #[test]
    fn tcpshield_missing_port_is_error() {
        let err = parse_tcpshield("host///203.0.113.7///123").unwrap_err();
        assert!(matches!(err, ForwardingError::InvalidAddress(_)));
    }

    #[test]
    fn parse_is_deterministic() {
        let address = "host\0203.0.113.7\0069a79f444e94726a5befca90e38aaf5";
        let first = parse_legacy(address).unwrap();
        let second = parse_legacy(address).unwrap();
        assert_eq!(first, second);
    }

    fn encode_velocity_v1(buf: &mut BytesMut) {
        VarInt(1).proto_encode(buf);
        codec::write_string(buf, "203.0.113.7");
        codec::write_uuid(
            buf,
            &Uuid::parse_str("069a79f4-44e9-4726-a5be-fca90e38aaf5").unwrap(),
        );
        codec::write_string(buf, "Notch");
        VarInt(1).proto_encode(buf);
        codec::write_string(buf, "textures");
        codec::write_string(buf, "e30=");
        buf.put_u8(1);
        codec::write_string(buf, "c2ln");
    }

    #[test]
    fn velocity_v1_payload_decodes() {
        let mut buf = BytesMut::new();
        encode_velocity_v1(&mut buf);
        let data = decode_velocity_payload(&buf).unwrap();
        assert_eq!(data.version, 1);
        assert_eq!(data.address, "203.0.113.7");
        assert_eq!(
            data.uuid,
            Uuid::parse_str("069a79f4-44e9-4726-a5be-fca90e38aaf5").unwrap()
        );
        assert_eq!(data.username, "Notch");
        assert_eq!(data.properties.len(), 1);
        assert_eq!(data.properties[0].signature.as_deref(), Some("c2ln"));
        assert!(data.key.is_none());
    }

    #[test]
    fn velocity_v2_payload_carries_key() {
        let mut buf = BytesMut::new();
        VarInt(2).proto_encode(&mut buf);
        codec::write_string(&mut buf, "203.0.113.7");
        codec::write_uuid(&mut buf, &Uuid::nil());
        codec::write_string(&mut buf, "Notch");
        VarInt(0).proto_encode(&mut buf);
        ProfileKeyData {
            expires_at: 1_700_000_000_000,
            public_key: vec![0x30, 0x81],
            signature: vec![0xAA; 16],
        }
        .proto_encode(&mut buf);

        let data = decode_velocity_payload(&buf).unwrap();
        let key = data.key.unwrap();
        assert_eq!(key.expires_at, 1_700_000_000_000);
        assert_eq!(key.public_key, vec![0x30, 0x81]);
    }

    #[test]
    fn velocity_unsupported_version_is_error() {
        let mut buf = BytesMut::new();
        VarInt(3).proto_encode(&mut buf);
        let err = decode_velocity_payload(&buf).unwrap_err();
        assert!(matches!(err, ForwardingError::UnsupportedVersion(3)));
    }

    #[test]
    fn velocity_truncated_payload_is_error() {
        let mut buf = BytesMut::new();
        encode_velocity_v1(&mut buf);
        let truncated = &buf[..buf.len() - 4];
        assert!(decode_velocity_payload(truncated).is_err());
    }

    #[test]
    fn mode_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Holder {
            mode: ForwardingMode,
        }
        let holder: Holder = toml::from_str(r#"mode = "tcpshield""#).unwrap();
        assert_eq!(holder.mode, ForwardingMode::Tcpshield);
        assert!(!holder.mode.authenticates_users());
        let holder: Holder = toml::from_str(r#"mode = "modern""#).unwrap();
        assert!(holder.mode.authenticates_users());
    }
}
