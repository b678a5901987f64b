//! Packet definitions for the handshake, status, login and play phases.

pub mod handshake;
pub mod login;
pub mod play;
pub mod status;

pub use handshake::{Handshake, NextState};
pub use login::{
    EncryptionRequest, EncryptionResponse, LoginDisconnect, LoginPluginRequest,
    LoginPluginResponse, LoginStart, LoginSuccess, ProfileKeyData, SetCompression, TokenResponse,
};
pub use play::PlayDisconnect;
pub use status::{StatusPing, StatusPong, StatusRequest, StatusResponse};

/// Packet IDs, grouped by connection state. Serverbound and clientbound IDs
/// share numeric space within a state.
pub mod id {
    pub mod handshake {
        pub const HANDSHAKE: i32 = 0x00;
    }

    pub mod status {
        pub const REQUEST: i32 = 0x00;
        pub const RESPONSE: i32 = 0x00;
        pub const PING: i32 = 0x01;
        pub const PONG: i32 = 0x01;
    }

    pub mod login {
        // Serverbound.
        pub const LOGIN_START: i32 = 0x00;
        pub const ENCRYPTION_RESPONSE: i32 = 0x01;
        pub const PLUGIN_RESPONSE: i32 = 0x02;
        // Clientbound.
        pub const DISCONNECT: i32 = 0x00;
        pub const ENCRYPTION_REQUEST: i32 = 0x01;
        pub const LOGIN_SUCCESS: i32 = 0x02;
        pub const SET_COMPRESSION: i32 = 0x03;
        pub const PLUGIN_REQUEST: i32 = 0x04;
    }

    pub mod play {
        pub const DISCONNECT: i32 = 0x19;
    }
}
