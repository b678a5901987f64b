//! Per-connection state machine: framing, encryption, compression and the
//! phase handlers that take a socket from handshake to play.

mod handshake;
mod login;
mod status;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use flint_crypto::{
    offline_player_uuid, parse_public_key_der, server_hash, validate_profile_key,
    verify_forwarding_integrity, verify_token_signature, CryptoError, KeyRejection,
    PacketEncryption, PlayerProfileKey,
};
use flint_proto::codec::{ProtoDecode, ProtoEncode};
use flint_proto::error::ProtoError;
use flint_proto::frame::{self, FrameCodec};
use flint_proto::packets::{
    id, EncryptionRequest, EncryptionResponse, Handshake, LoginDisconnect, LoginPluginRequest,
    LoginPluginResponse, LoginStart, LoginSuccess, NextState, PlayDisconnect, SetCompression,
    StatusPing, StatusPong, StatusResponse, TokenResponse,
};
use flint_proto::profile::GameProfile;
use flint_proto::types::VarInt;
use flint_proto::{GAME_VERSION, PROTOCOL_VERSION};

use crate::ext::{AuthDecision, HookOutcome, PermissionFunction};
use crate::forwarding::{
    self, ForwardedData, ForwardingError, ForwardingMode, ForwardingShape, VelocityData,
    VELOCITY_CHANNEL,
};
use crate::messages;
use crate::server::Server;

use handshake::HandshakeHandler;
use login::LoginHandler;
use status::StatusHandler;

/// How long a pre-play connection may sit between reads before it is dropped.
/// Play connections belong to the game layer's keep-alive cycle instead.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Protocol phases, in wire order. Transitions only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProtocolState {
    Handshake,
    Status,
    Login,
    Play,
}

#[derive(Debug, Error)]
pub enum ConnError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Proto(#[from] ProtoError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("forwarded login data rejected: {0}")]
    Forwarding(#[from] ForwardingError),

    #[error("connection closed mid-frame")]
    Closed,

    #[error("read timed out")]
    Timeout,

    #[error("encryption is already enabled")]
    EncryptionAlreadyEnabled,
}

/// One client socket plus its transport stages. Owned by a single task, so
/// every mutation happens on the connection's own execution context.
pub struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    state: ProtocolState,
    codec: FrameCodec,
    cipher: Option<PacketEncryption>,
    read_buf: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        Self {
            stream,
            addr,
            state: ProtocolState::Handshake,
            codec: FrameCodec::new(),
            cipher: None,
            read_buf: BytesMut::with_capacity(4096),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn set_state(&mut self, state: ProtocolState) {
        debug_assert!(state >= self.state, "state transitions are forward-only");
        self.state = state;
    }

    /// Read the next packet body. `Ok(None)` is a clean end of stream; EOF
    /// mid-frame is an error. Before play, each read runs under
    /// [`READ_TIMEOUT`] so abandoned handshakes cannot pin the task.
    pub async fn read_frame(&mut self) -> Result<Option<Bytes>, ConnError> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.read_buf)? {
                return Ok(Some(frame));
            }

            let len_before = self.read_buf.len();
            let read = if self.state == ProtocolState::Play {
                self.stream.read_buf(&mut self.read_buf).await?
            } else {
                match timeout(READ_TIMEOUT, self.stream.read_buf(&mut self.read_buf)).await {
                    Ok(result) => result?,
                    Err(_) => return Err(ConnError::Timeout),
                }
            };
            if read == 0 {
                if self.read_buf.is_empty() {
                    return Ok(None);
                }
                return Err(ConnError::Closed);
            }
            if let Some(cipher) = self.cipher.as_mut() {
                cipher.decrypt(&mut self.read_buf[len_before..]);
            }
        }
    }

    /// Frame, optionally compress and encrypt, then flush one packet.
    pub async fn send(&mut self, packet_id: i32, packet: &impl ProtoEncode) -> Result<(), ConnError> {
        let body = frame::encode_body(packet_id, packet);
        let mut framed = BytesMut::new();
        self.codec.encode(&body, &mut framed)?;
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.encrypt(&mut framed);
        }
        self.stream.write_all(&framed).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Flush a phase-appropriate disconnect packet (none exists before
    /// login), then close. Best effort: a peer that is already gone cannot
    /// stop us from tearing down.
    pub async fn disconnect(&mut self, reason: &str) {
        let attempt = match self.state {
            ProtocolState::Login => {
                self.send(id::login::DISCONNECT, &LoginDisconnect::new(reason))
                    .await
            }
            ProtocolState::Play => {
                self.send(id::play::DISCONNECT, &PlayDisconnect::new(reason))
                    .await
            }
            ProtocolState::Handshake | ProtocolState::Status => Ok(()),
        };
        if let Err(e) = attempt {
            debug!("Failed to flush disconnect to {}: {e}", self.addr);
        }
        self.close().await;
    }

    pub async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
    }

    /// Insert the symmetric cipher into both directions. The read loop only
    /// observes it between frames, so the cutover is atomic.
    pub fn enable_encryption(&mut self, secret: &[u8; 16]) -> Result<(), ConnError> {
        if self.cipher.is_some() {
            return Err(ConnError::EncryptionAlreadyEnabled);
        }
        self.cipher = Some(PacketEncryption::new(secret));
        Ok(())
    }

    /// Negotiate compression. The Set Compression packet goes out before the
    /// compressor is inserted so both ends agree on the cutover frame. Once
    /// compression is on, threshold changes apply in place with no further
    /// wire exchange; a negative threshold keeps compression off.
    pub async fn enable_compression(&mut self, threshold: i32) -> Result<(), ConnError> {
        if threshold < 0 {
            return Ok(());
        }
        if self.codec.compression_enabled() {
            if self.codec.threshold() != threshold {
                self.codec.set_threshold(threshold);
            }
            return Ok(());
        }
        self.send(id::login::SET_COMPRESSION, &SetCompression { threshold })
            .await?;
        self.codec.set_threshold(threshold);
        Ok(())
    }
}

/// The active phase handler. Swapped as the connection advances; exactly one
/// exists per connection at any time.
enum Handler {
    Handshake(HandshakeHandler),
    Status(StatusHandler),
    Login(Box<LoginHandler>),
    Play(PlayHandler),
}

/// What the session loop does after a packet has been handled.
enum Action {
    Continue,
    Transition(Handler),
    Close,
}

/// Terminal handler: the admission layer's work is done, the connection now
/// belongs to the game layer. Packets are drained so disconnects are seen.
pub(crate) struct PlayHandler {
    profile: GameProfile,
    #[allow(dead_code)]
    profile_key: Option<PlayerProfileKey>,
    #[allow(dead_code)]
    permissions: PermissionFunction,
}

impl PlayHandler {
    fn new(
        profile: GameProfile,
        profile_key: Option<PlayerProfileKey>,
        permissions: PermissionFunction,
    ) -> Self {
        Self {
            profile,
            profile_key,
            permissions,
        }
    }

    fn profile(&self) -> &GameProfile {
        &self.profile
    }

    async fn handle(
        &mut self,
        _conn: &mut Connection,
        _server: &Arc<Server>,
        packet_id: i32,
        _frame: &mut Bytes,
    ) -> Result<Action, ConnError> {
        debug!(
            "Ignoring play packet {packet_id:#04x} from {}",
            self.profile.name
        );
        Ok(Action::Continue)
    }
}

/// Entry point for one accepted socket: runs the handler state machine until
/// the peer goes away or a handler closes the connection, then cleans up.
pub async fn handle(stream: TcpStream, addr: SocketAddr, server: Arc<Server>) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY for {addr}: {e}");
    }

    let mut conn = Connection::new(stream, addr);
    let mut handler = Handler::Handshake(HandshakeHandler);

    match drive(&mut conn, &mut handler, &server).await {
        Ok(()) => {}
        Err(ConnError::Timeout) => debug!("Connection from {addr} timed out waiting for data"),
        Err(e) => debug!("Connection from {addr} ended with error: {e}"),
    }
    conn.close().await;

    if let Handler::Play(play) = &handler {
        let profile = play.profile();
        server.players().unregister(profile.uuid);
        info!("{} ({addr}) was disconnected", profile.name);
    }
}

async fn drive(
    conn: &mut Connection,
    handler: &mut Handler,
    server: &Arc<Server>,
) -> Result<(), ConnError> {
    while let Some(mut frame) = conn.read_frame().await? {
        let packet_id = VarInt::proto_decode(&mut frame)?.0;
        let action = match handler {
            Handler::Handshake(h) => h.handle(conn, server, packet_id, &mut frame).await?,
            Handler::Status(h) => h.handle(conn, server, packet_id, &mut frame).await?,
            Handler::Login(h) => h.handle(conn, server, packet_id, &mut frame).await?,
            Handler::Play(h) => h.handle(conn, server, packet_id, &mut frame).await?,
        };
        match action {
            Action::Continue => {}
            Action::Transition(next) => *handler = next,
            Action::Close => break,
        }
    }
    Ok(())
}
