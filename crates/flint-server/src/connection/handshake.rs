use super::*;

/// Routes the first packet of every connection: version and capacity gates,
/// then the proxy forwarding checks, then the status or login handler.
pub(super) struct HandshakeHandler;

impl HandshakeHandler {
    pub(super) async fn handle(
        &mut self,
        conn: &mut Connection,
        server: &Arc<Server>,
        packet_id: i32,
        frame: &mut Bytes,
    ) -> Result<Action, ConnError> {
        if packet_id != id::handshake::HANDSHAKE {
            debug!(
                "Ignoring packet {packet_id:#04x} from {} before handshake",
                conn.addr()
            );
            return Ok(Action::Close);
        }
        let packet = Handshake::proto_decode(frame)?;
        match packet.next_state() {
            Ok(NextState::Login) => self.handle_login_request(conn, server, &packet).await,
            Ok(NextState::Status) => {
                conn.set_state(ProtocolState::Status);
                Ok(Action::Transition(Handler::Status(StatusHandler::new())))
            }
            Err(state) => {
                warn!("Received invalid handshake packet with state {state}. Ignoring...");
                Ok(Action::Continue)
            }
        }
    }

    async fn handle_login_request(
        &mut self,
        conn: &mut Connection,
        server: &Arc<Server>,
        packet: &Handshake,
    ) -> Result<Action, ConnError> {
        // Move to login immediately so nothing that follows can be
        // misinterpreted as another handshake.
        conn.set_state(ProtocolState::Login);

        if packet.protocol_version != PROTOCOL_VERSION {
            let reason = if packet.protocol_version < PROTOCOL_VERSION {
                messages::outdated_client(GAME_VERSION)
            } else {
                messages::outdated_server(GAME_VERSION)
            };
            conn.disconnect(&reason).await;
            return Ok(Action::Close);
        }

        // Capacity comes before the forwarding checks so a full server never
        // has to look at proxy data at all.
        let max_players = server.config().status.max_players as usize;
        if server.players().online_count() >= max_players {
            conn.disconnect(messages::SERVER_FULL).await;
            return Ok(Action::Close);
        }

        let mode = server.config().proxy.mode;
        match forwarding::detect_shape(&packet.server_address) {
            ForwardingShape::Legacy if mode != ForwardingMode::Legacy => {
                error!(
                    "User attempted legacy forwarded connection (most likely from a proxy such \
                     as BungeeCord or Velocity), but this server is not configured to use legacy \
                     forwarding!"
                );
                info!(
                    "If you wish to enable legacy forwarding, please do so in the configuration \
                     file by setting \"mode\" to \"legacy\" under the \"proxy\" section."
                );
                conn.disconnect(messages::LEGACY_FORWARDING_NOT_ENABLED).await;
                return Ok(Action::Close);
            }
            ForwardingShape::Tcpshield if mode != ForwardingMode::Tcpshield => {
                error!(
                    "User attempted TCPShield forwarded connection, but this server is not \
                     configured to use TCPShield forwarding!"
                );
                info!(
                    "If you wish to enable TCPShield forwarding, please do so in the \
                     configuration file by setting \"mode\" to \"tcpshield\" under the \"proxy\" \
                     section."
                );
                conn.disconnect(messages::TCPSHIELD_FORWARDING_NOT_ENABLED).await;
                return Ok(Action::Close);
            }
            _ => {}
        }

        let forwarded = match mode {
            ForwardingMode::Legacy => {
                match forwarding::parse_legacy(&packet.server_address) {
                    Ok(Some(data)) => {
                        debug!("Detected legacy forwarded login for {:?}", data.uuid);
                        Some(data)
                    }
                    Ok(None) => {
                        conn.disconnect(messages::NO_DIRECT_CONNECT).await;
                        warn!(
                            "Attempted direct connection from {} when legacy forwarding is enabled!",
                            conn.addr()
                        );
                        return Ok(Action::Close);
                    }
                    Err(e) => {
                        conn.disconnect(messages::FAILED_LEGACY_DECODE).await;
                        error!("Failed to decode legacy forwarded handshake data! Cause: {e}");
                        return Ok(Action::Close);
                    }
                }
            }
            ForwardingMode::Tcpshield => {
                match forwarding::parse_tcpshield(&packet.server_address) {
                    Ok(Some(data)) => {
                        debug!("Detected TCPShield forwarded connection from {}", data.address);
                        Some(data)
                    }
                    Ok(None) => {
                        conn.disconnect(messages::NO_DIRECT_CONNECT).await;
                        warn!(
                            "Attempted direct connection from {} when TCPShield forwarding is enabled!",
                            conn.addr()
                        );
                        return Ok(Action::Close);
                    }
                    Err(e) => {
                        conn.disconnect(messages::FAILED_TCPSHIELD_DECODE).await;
                        error!("Failed to decode TCPShield forwarded handshake data! Cause: {e}");
                        return Ok(Action::Close);
                    }
                }
            }
            _ => None,
        };

        Ok(Action::Transition(Handler::Login(Box::new(
            LoginHandler::new(forwarded),
        ))))
    }
}
