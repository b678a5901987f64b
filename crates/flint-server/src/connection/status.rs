use super::*;

/// Handles the status phase: one list-ping response, then an optional
/// latency probe. The pong always ends the connection; clients that want
/// another sample reconnect.
pub(super) struct StatusHandler {
    answered: bool,
}

impl StatusHandler {
    pub(super) fn new() -> Self {
        Self { answered: false }
    }

    pub(super) async fn handle(
        &mut self,
        conn: &mut Connection,
        server: &Arc<Server>,
        packet_id: i32,
        frame: &mut Bytes,
    ) -> Result<Action, ConnError> {
        match packet_id {
            id::status::REQUEST => {
                if self.answered {
                    conn.disconnect(messages::STATUS_ALREADY_HANDLED).await;
                    return Ok(Action::Close);
                }
                self.answered = true;
                let payload = status_payload(server);
                conn.send(id::status::RESPONSE, &StatusResponse { payload })
                    .await?;
                Ok(Action::Continue)
            }
            id::status::PING => {
                let ping = StatusPing::proto_decode(frame)?;
                conn.send(
                    id::status::PONG,
                    &StatusPong {
                        payload: ping.payload,
                    },
                )
                .await?;
                Ok(Action::Close)
            }
            other => {
                warn!("Unexpected status packet {other:#04x} from {}", conn.addr());
                Ok(Action::Close)
            }
        }
    }
}

/// Builds the JSON document shown in the client's server list.
fn status_payload(server: &Server) -> String {
    let config = server.config();
    serde_json::json!({
        "version": {
            "name": GAME_VERSION,
            "protocol": PROTOCOL_VERSION,
        },
        "players": {
            "max": config.status.max_players,
            "online": server.players().online_count(),
            "sample": [],
        },
        "description": {
            "text": config.status.motd,
        },
    })
    .to_string()
}
