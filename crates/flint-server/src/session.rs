//! Session service client for online-mode authentication.

use flint_proto::profile::GameProfile;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("session service returned status {0}")]
    UnexpectedStatus(u16),
}

/// Client for the `hasJoined` endpoint of a Mojang-compatible session server.
///
/// The server only ever has to make this one request: the client tells the
/// service it joined, and we ask the service to confirm it under the server
/// hash both sides derived from the encryption handshake.
pub struct SessionService {
    client: reqwest::Client,
    base_url: String,
}

impl SessionService {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Ask the session service whether `username` authenticated for this
    /// server hash. `ip` is forwarded when proxy connections are to be
    /// rejected by the service. `Ok(None)` means the service answered but
    /// did not verify the user.
    pub async fn has_joined(
        &self,
        username: &str,
        server_hash: &str,
        ip: Option<&str>,
    ) -> Result<Option<GameProfile>, SessionError> {
        let mut query: Vec<(&str, &str)> = vec![("username", username), ("serverId", server_hash)];
        if let Some(ip) = ip {
            query.push(("ip", ip));
        }

        let response = self
            .client
            .get(format!("{}/session/minecraft/hasJoined", self.base_url))
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT || status.is_client_error() {
            debug!("session service did not verify {username}: status {status}");
            error!("Failed to verify username {username}!");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SessionError::UnexpectedStatus(status.as_u16()));
        }

        let profile: GameProfile = response.json().await?;
        info!("UUID of player {} is {}", profile.name, profile.uuid);
        Ok(Some(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use uuid::Uuid;

    /// Serves a single canned HTTP response and reports the request line.
    async fn serve_once(response: String) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                request.extend_from_slice(&chunk[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let request = String::from_utf8_lossy(&request).into_owned();
            let first_line = request.lines().next().unwrap_or_default().to_owned();
            let _ = tx.send(first_line);
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        (format!("http://{addr}"), rx)
    }

    fn ok_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    #[tokio::test]
    async fn verified_user_yields_profile() {
        let body = r#"{"id":"069a79f444e94726a5befca90e38aaf5","name":"Notch","properties":[]}"#;
        let (base, request_line) = serve_once(ok_response(body)).await;

        let service = SessionService::new(&base);
        let profile = service
            .has_joined("Notch", "4ed1f46bbe04bc756bcb17c0c7ce3e4632f06a48", None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(profile.name, "Notch");
        assert_eq!(
            profile.uuid,
            Uuid::parse_str("069a79f4-44e9-4726-a5be-fca90e38aaf5").unwrap()
        );

        let line = request_line.await.unwrap();
        assert!(line.starts_with("GET /session/minecraft/hasJoined?"));
        assert!(line.contains("username=Notch"));
        assert!(line.contains("serverId=4ed1f46bbe04bc756bcb17c0c7ce3e4632f06a48"));
        assert!(!line.contains("ip="));
    }

    #[tokio::test]
    async fn no_content_means_unverified() {
        let (base, _) =
            serve_once("HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n".to_owned()).await;
        let service = SessionService::new(&base);
        let result = service.has_joined("Notch", "abc", None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn client_ip_is_forwarded_when_given() {
        let (base, request_line) =
            serve_once("HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n".to_owned()).await;
        let service = SessionService::new(&base);
        let _ = service
            .has_joined("Notch", "abc", Some("203.0.113.7"))
            .await
            .unwrap();
        let line = request_line.await.unwrap();
        assert!(line.contains("ip=203.0.113.7"));
    }

    #[tokio::test]
    async fn server_error_is_an_error() {
        let (base, _) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                .to_owned(),
        )
        .await;
        let service = SessionService::new(&base);
        let err = service.has_joined("Notch", "abc", None).await.unwrap_err();
        assert!(matches!(err, SessionError::UnexpectedStatus(500)));
    }
}
