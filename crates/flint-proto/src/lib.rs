//! Minecraft Java Edition protocol types and packet definitions.

pub mod codec;
pub mod error;
pub mod frame;
pub mod packets;
pub mod profile;
pub mod types;

/// Protocol version this server speaks.
pub const PROTOCOL_VERSION: i32 = 760;

/// Human-readable game version matching [`PROTOCOL_VERSION`].
pub const GAME_VERSION: &str = "1.19.2";
