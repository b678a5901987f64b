use super::*;

use std::net::IpAddr;

use rand::Rng;

use flint_proto::packets::ProfileKeyData;

/// Which packet the login conversation expects next. Anything else is a
/// protocol violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginStage {
    Start,
    EncryptionResponse,
    VelocityResponse,
}

/// Drives one login attempt from Login Start to the play handler, through
/// whichever flow applies: offline or legacy-forwarded, online with
/// encryption, or modern forwarding over a login plugin message.
pub(super) struct LoginHandler {
    stage: LoginStage,
    forwarded: Option<ForwardedData>,
    /// Claimed name, cached for logs before any profile exists.
    name: String,
    verify_token: [u8; 4],
    velocity_message_id: i32,
    profile_key: Option<PlayerProfileKey>,
}

impl LoginHandler {
    pub(super) fn new(forwarded: Option<ForwardedData>) -> Self {
        Self {
            stage: LoginStage::Start,
            forwarded,
            name: String::new(),
            verify_token: rand::random(),
            // Only needs to be unique within this connection.
            velocity_message_id: rand::thread_rng().gen_range(0..i16::MAX as i32),
            profile_key: None,
        }
    }

    pub(super) async fn handle(
        &mut self,
        conn: &mut Connection,
        server: &Arc<Server>,
        packet_id: i32,
        frame: &mut Bytes,
    ) -> Result<Action, ConnError> {
        match packet_id {
            id::login::LOGIN_START if self.stage == LoginStage::Start => {
                let packet = LoginStart::proto_decode(frame)?;
                self.handle_login_start(conn, server, packet).await
            }
            id::login::ENCRYPTION_RESPONSE if self.stage == LoginStage::EncryptionResponse => {
                let packet = EncryptionResponse::proto_decode(frame)?;
                self.handle_encryption_response(conn, server, packet).await
            }
            // Matched in every stage so a stray response gets the dedicated
            // message instead of the generic one.
            id::login::PLUGIN_RESPONSE => {
                let packet = LoginPluginResponse::proto_decode(frame)?;
                self.handle_plugin_response(conn, server, packet).await
            }
            other => {
                warn!(
                    "Unexpected login packet {other:#04x} from {} while awaiting {:?}",
                    conn.addr(),
                    self.stage
                );
                conn.disconnect(messages::UNEXPECTED_LOGIN_PACKET).await;
                Ok(Action::Close)
            }
        }
    }

    async fn handle_login_start(
        &mut self,
        conn: &mut Connection,
        server: &Arc<Server>,
        packet: LoginStart,
    ) -> Result<Action, ConnError> {
        if !is_valid_username(&packet.name) {
            conn.disconnect(messages::INVALID_USERNAME).await;
            return Ok(Action::Close);
        }
        self.name = packet.name;

        // Ignore online mode when the forwarding mode already authenticates
        // the user upstream.
        let config = server.config();
        if !config.server.online_mode || config.proxy.mode.authenticates_users() {
            if config.proxy.mode == ForwardingMode::Modern {
                self.stage = LoginStage::VelocityResponse;
                let request = LoginPluginRequest {
                    message_id: self.velocity_message_id,
                    channel: VELOCITY_CHANNEL.into(),
                    data: Vec::new(),
                };
                conn.send(id::login::PLUGIN_REQUEST, &request).await?;
                return Ok(Action::Continue);
            }
            return self.process_offline(conn, server).await;
        }

        match self.screen_profile_key(server, packet.key.as_ref()) {
            Ok(key) => self.profile_key = key,
            Err(reason) => {
                conn.disconnect(reason).await;
                return Ok(Action::Close);
            }
        }

        self.stage = LoginStage::EncryptionResponse;
        let request = EncryptionRequest {
            server_id: String::new(),
            public_key: server.key_pair().public_key_der().to_vec(),
            verify_token: self.verify_token.to_vec(),
        };
        conn.send(id::login::ENCRYPTION_REQUEST, &request).await?;
        Ok(Action::Continue)
    }

    /// Offline and legacy-forwarded logins: identity comes from the
    /// forwarded data when present, otherwise it is derived from the name.
    async fn process_offline(
        &mut self,
        conn: &mut Connection,
        server: &Arc<Server>,
    ) -> Result<Action, ConnError> {
        let forwarded = self.forwarded.as_ref();
        let uuid = forwarded
            .and_then(|data| data.uuid)
            .unwrap_or_else(|| offline_player_uuid(&self.name));
        let properties = forwarded
            .map(|data| data.properties.clone())
            .unwrap_or_default();
        let profile = GameProfile {
            uuid,
            name: self.name.clone(),
            properties,
        };
        self.admit(conn, server, profile).await
    }

    async fn handle_encryption_response(
        &mut self,
        conn: &mut Connection,
        server: &Arc<Server>,
        packet: EncryptionResponse,
    ) -> Result<Action, ConnError> {
        let key_pair = server.key_pair();

        // Signed-key clients prove the token with their profile key; plain
        // clients echo it encrypted under our RSA key. Mixing the two forms
        // is treated as a mismatch.
        let token_ok = match (&self.profile_key, &packet.token) {
            (Some(key), TokenResponse::Signed { salt, signature }) => {
                verify_token_signature(&key.public_key, &self.verify_token, *salt, signature)
            }
            (None, TokenResponse::Encrypted(encrypted)) => key_pair
                .decrypt(encrypted)
                .map(|token| token == self.verify_token)
                .unwrap_or(false),
            _ => false,
        };
        if !token_ok {
            error!(
                "Verify tokens for {} did not match! Their connection may have been intercepted.",
                self.name
            );
            conn.disconnect(messages::VERIFY_TOKEN_MISMATCH).await;
            return Ok(Action::Close);
        }

        let secret = key_pair.decrypt_secret(&packet.shared_secret)?;
        conn.enable_encryption(&secret)?;

        let profile = match server.extensions().authenticate(&self.name).await {
            AuthDecision::Deny(reason) => {
                conn.disconnect(reason.as_deref().unwrap_or(messages::KICKED))
                    .await;
                return Ok(Action::Close);
            }
            AuthDecision::Profile(profile) => profile,
            AuthDecision::Allow => {
                let hash = server_hash("", &secret, key_pair.public_key_der());
                let ip = server
                    .config()
                    .server
                    .prevent_proxy_connections
                    .then(|| conn.addr().ip().to_string());
                match server
                    .sessions()
                    .has_joined(&self.name, &hash, ip.as_deref())
                    .await
                {
                    Ok(Some(profile)) => profile,
                    Ok(None) => {
                        conn.disconnect(messages::UNVERIFIED_USERNAME).await;
                        return Ok(Action::Close);
                    }
                    Err(e) => {
                        error!("Failed to authenticate {} with the session service! Cause: {e}", self.name);
                        conn.disconnect(messages::UNVERIFIED_USERNAME).await;
                        return Ok(Action::Close);
                    }
                }
            }
        };
        self.admit(conn, server, profile).await
    }

    async fn handle_plugin_response(
        &mut self,
        conn: &mut Connection,
        server: &Arc<Server>,
        packet: LoginPluginResponse,
    ) -> Result<Action, ConnError> {
        if self.stage != LoginStage::VelocityResponse
            || packet.message_id != self.velocity_message_id
            || server.config().proxy.mode != ForwardingMode::Modern
        {
            conn.disconnect(messages::UNEXPECTED_QUERY_RESPONSE).await;
            return Ok(Action::Close);
        }
        let Some(data) = packet.data else {
            // The client does not understand the channel, so it cannot have
            // come through the proxy.
            conn.disconnect(messages::VELOCITY_PROXY_REQUIRED).await;
            return Ok(Action::Close);
        };
        if data.is_empty() {
            error!("Velocity sent no data in its login plugin response!");
            conn.close().await;
            return Ok(Action::Close);
        }

        let secret = server.config().proxy.secret.as_bytes();
        let Some(payload) = verify_forwarding_integrity(&data, secret) else {
            conn.disconnect(messages::VELOCITY_NOT_VERIFIED).await;
            return Ok(Action::Close);
        };
        // An unsupported version is a hard error; the rest of the payload
        // cannot be decoded without knowing its layout.
        let velocity = forwarding::decode_velocity_payload(payload)?;
        debug!("Detected Velocity login for {}", velocity.uuid);

        self.name = velocity.username.clone();
        // The proxy has already validated the key, so a local round-trip
        // would add nothing; it only has to parse.
        self.profile_key = velocity.key.as_ref().and_then(|key| {
            match parse_public_key_der(&key.public_key) {
                Ok(public_key) => Some(PlayerProfileKey {
                    expires_at: key.expires_at,
                    public_key,
                }),
                Err(e) => {
                    warn!(
                        "Ignoring unusable forwarded profile key for {}: {e}",
                        velocity.username
                    );
                    None
                }
            }
        });
        let profile = GameProfile {
            uuid: velocity.uuid,
            name: velocity.username,
            properties: velocity.properties,
        };
        // The proxy's address replaces the socket peer; the port stays local.
        self.forwarded = Some(ForwardedData {
            address: velocity.address,
            port: None,
            uuid: Some(velocity.uuid),
            properties: Vec::new(),
        });
        self.admit(conn, server, profile).await
    }

    /// Shared tail of every flow: admission policy, the login hook, then
    /// permissions and the switch to play.
    async fn admit(
        &mut self,
        conn: &mut Connection,
        server: &Arc<Server>,
        profile: GameProfile,
    ) -> Result<Action, ConnError> {
        let address = self.effective_address(conn);

        if let Some(denial) = server.players().check_can_join(&profile, Some(address.ip())) {
            conn.disconnect(&denial.message()).await;
            return Ok(Action::Close);
        }
        if let HookOutcome::Deny(reason) = server.extensions().login(&profile, address).await {
            conn.disconnect(reason.as_deref().unwrap_or(messages::KICKED))
                .await;
            return Ok(Action::Close);
        }
        let permissions = server.extensions().setup_permissions(&profile).await;
        self.finish_login(conn, server, profile, address, permissions)
            .await
    }

    /// Compression is negotiated first so Login Success already benefits,
    /// then the state flips to play and the profile is registered. A failed
    /// registration disconnects from play; the client already believes it
    /// is connected.
    async fn finish_login(
        &mut self,
        conn: &mut Connection,
        server: &Arc<Server>,
        profile: GameProfile,
        address: SocketAddr,
        permissions: PermissionFunction,
    ) -> Result<Action, ConnError> {
        conn.enable_compression(server.config().server.compression_threshold)
            .await?;
        conn.send(
            id::login::LOGIN_SUCCESS,
            &LoginSuccess {
                profile: profile.clone(),
            },
        )
        .await?;
        conn.set_state(ProtocolState::Play);

        if let Err(e) = server.players().register(profile.clone(), address) {
            error!(
                "Disconnecting player {} due to an error caught whilst attempting to load them in... Cause: {e}",
                profile.name
            );
            conn.disconnect(messages::UNEXPECTED_EXCEPTION).await;
            return Ok(Action::Close);
        }
        info!("Player {} logged in from {address}", profile.name);

        Ok(Action::Transition(Handler::Play(PlayHandler::new(
            profile,
            self.profile_key.take(),
            permissions,
        ))))
    }

    /// Apply the key policy from Login Start. A presented key must always
    /// be usable; a missing key is only an error when secure profiles are
    /// required.
    fn screen_profile_key(
        &self,
        server: &Server,
        key: Option<&ProfileKeyData>,
    ) -> Result<Option<PlayerProfileKey>, &'static str> {
        let Some(data) = key else {
            if server.config().server.require_secure_profile {
                return Err(messages::MISSING_PUBLIC_KEY);
            }
            return Ok(None);
        };
        let now = chrono::Utc::now().timestamp_millis();
        match validate_profile_key(
            data.expires_at,
            &data.public_key,
            &data.signature,
            server.services_root_key(),
            now,
        ) {
            Ok(key) => Ok(Some(key)),
            Err(KeyRejection::Expired) => Err(messages::EXPIRED_PUBLIC_KEY),
            Err(KeyRejection::InvalidKey) => Err(messages::INVALID_PUBLIC_KEY),
            Err(KeyRejection::InvalidSignature) => Err(messages::INVALID_PUBLIC_KEY_SIGNATURE),
        }
    }

    /// The address the rest of the server sees: the forwarded one when a
    /// proxy supplied it, the socket peer otherwise.
    fn effective_address(&self, conn: &Connection) -> SocketAddr {
        let raw = conn.addr();
        let Some(forwarded) = &self.forwarded else {
            return raw;
        };
        match forwarded.address.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, forwarded.port.unwrap_or_else(|| raw.port())),
            Err(_) => {
                warn!(
                    "Forwarded address {} is not an IP address, using the socket peer",
                    forwarded.address
                );
                raw
            }
        }
    }
}

fn is_valid_username(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 16
        && name
            .bytes()
            .all(|b| b == b'_' || b.is_ascii_alphanumeric())
}
