//! User-facing disconnect texts.
//!
//! Every rejection reason the server can send lives here, so handlers and
//! tests share one wording per cause and never drift apart.

/// Sent to clients declaring an older protocol version than ours.
pub fn outdated_client(version: &str) -> String {
    format!("Outdated client! Please use {version}")
}

/// Sent to clients declaring a newer protocol version than ours.
pub fn outdated_server(version: &str) -> String {
    format!("Outdated server! I'm still on {version}")
}

pub const SERVER_FULL: &str = "The server is full!";

// ---- proxy forwarding ----

pub const LEGACY_FORWARDING_NOT_ENABLED: &str = "This server cannot accept legacy forwarded \
    connections! Please ask the server administrators to enable legacy forwarding.";

pub const TCPSHIELD_FORWARDING_NOT_ENABLED: &str = "This server cannot accept TCPShield forwarded \
    connections! Please ask the server administrators to enable TCPShield forwarding.";

pub const FAILED_LEGACY_DECODE: &str =
    "Failed to decode legacy forwarded data! Please report this to the proxy administrators.";

pub const FAILED_TCPSHIELD_DECODE: &str =
    "Failed to decode TCPShield forwarded data! Please report this to the proxy administrators.";

pub const NO_DIRECT_CONNECT: &str =
    "This server does not accept direct connections! Please connect through the proxy.";

pub const VELOCITY_PROXY_REQUIRED: &str =
    "You must connect to this server through a Velocity proxy!";

pub const VELOCITY_NOT_VERIFIED: &str =
    "Response received from Velocity could not be verified!";

pub const UNEXPECTED_QUERY_RESPONSE: &str = "Unexpected custom data from client";

// ---- authentication ----

pub const VERIFY_TOKEN_MISMATCH: &str =
    "Verify tokens did not match! Your connection may have been intercepted.";

pub const UNVERIFIED_USERNAME: &str = "Failed to verify username!";

pub const INVALID_USERNAME: &str = "Invalid characters in username";

pub const UNEXPECTED_LOGIN_PACKET: &str = "Unexpected packet during login";

// ---- secure profiles ----

pub const MISSING_PUBLIC_KEY: &str =
    "Missing profile public key. This server requires secure profiles.";

pub const INVALID_PUBLIC_KEY: &str = "Invalid profile public key.";

pub const INVALID_PUBLIC_KEY_SIGNATURE: &str = "Invalid signature for profile public key.";

pub const EXPIRED_PUBLIC_KEY: &str = "Expired profile public key. Check that your system time \
    is synchronized and try restarting your game.";

// ---- admission policy ----

pub const KICKED: &str = "Kicked by an operator";

pub const NOT_WHITELISTED: &str = "You are not white-listed on this server!";

pub fn banned(reason: &str, expires: Option<&str>) -> String {
    match expires {
        Some(date) => {
            format!("You are banned from this server.\nReason: {reason}\nYour ban will be removed on {date}")
        }
        None => format!("You are banned from this server.\nReason: {reason}"),
    }
}

pub fn ip_banned(reason: &str, expires: Option<&str>) -> String {
    match expires {
        Some(date) => {
            format!("Your IP address is banned from this server.\nReason: {reason}\nYour ban will be removed on {date}")
        }
        None => format!("Your IP address is banned from this server.\nReason: {reason}"),
    }
}

// ---- status ----

pub const STATUS_ALREADY_HANDLED: &str = "Status request has already been handled";

// ---- internal ----

pub const UNEXPECTED_EXCEPTION: &str =
    "An unexpected exception occurred. Please contact the system administrator.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_messages_name_the_version() {
        assert_eq!(outdated_client("1.19.2"), "Outdated client! Please use 1.19.2");
        assert_eq!(outdated_server("1.19.2"), "Outdated server! I'm still on 1.19.2");
    }

    #[test]
    fn ban_message_includes_expiry_only_when_present() {
        let permanent = banned("griefing", None);
        assert!(permanent.contains("Reason: griefing"));
        assert!(!permanent.contains("will be removed"));

        let temporary = banned("griefing", Some("2026-01-01 00:00:00 UTC"));
        assert!(temporary.contains("will be removed on 2026-01-01 00:00:00 UTC"));
    }
}
