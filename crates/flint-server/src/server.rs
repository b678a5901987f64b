//! Process-wide server state shared across connection tasks.

use std::path::Path;

use flint_crypto::{parse_public_key_der, RsaPublicKey, ServerKeyPair};
use tracing::warn;

use crate::config::ServerConfig;
use crate::ext::Extensions;
use crate::players::PlayerManager;
use crate::session::SessionService;

/// Everything a connection task needs, built once at startup and handed
/// around behind an `Arc`. The RSA key pair lives for the whole process;
/// clients only ever see its public half.
pub struct Server {
    config: ServerConfig,
    key_pair: ServerKeyPair,
    players: PlayerManager,
    sessions: SessionService,
    extensions: Extensions,
    /// Authority key for profile key signatures. Absent means signatures
    /// are not checked (expiry and key parsing still are).
    services_root_key: Option<RsaPublicKey>,
}

impl Server {
    /// Generate the key pair, load the policy stores from `data_dir` and
    /// build the session client.
    pub fn new(
        config: ServerConfig,
        data_dir: impl AsRef<Path>,
        extensions: Extensions,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let key_pair = ServerKeyPair::generate()?;

        let services_root_key = match &config.auth.services_key_file {
            Some(path) => Some(parse_public_key_der(&std::fs::read(path)?)?),
            None => None,
        };
        if config.server.require_secure_profile && services_root_key.is_none() {
            warn!(
                "Secure profiles are required, but no services key file is configured! \
                 Profile key signatures will not be verified."
            );
        }

        let players = PlayerManager::load(data_dir, config.server.whitelist);
        let sessions = SessionService::new(&config.auth.session_server);

        Ok(Self {
            config,
            key_pair,
            players,
            sessions,
            extensions,
            services_root_key,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn key_pair(&self) -> &ServerKeyPair {
        &self.key_pair
    }

    pub fn players(&self) -> &PlayerManager {
        &self.players
    }

    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn services_root_key(&self) -> Option<&RsaPublicKey> {
        self.services_root_key.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_file_is_an_error() {
        let mut config = ServerConfig::default();
        config.auth.services_key_file = Some("/nonexistent/services.der".into());
        assert!(Server::new(config, std::env::temp_dir(), Extensions::new()).is_err());
    }

    #[test]
    fn default_config_builds() {
        let server = Server::new(
            ServerConfig::default(),
            std::env::temp_dir().join(format!("flint_server_{}", rand::random::<u64>())),
            Extensions::new(),
        )
        .unwrap();
        assert!(server.services_root_key().is_none());
        assert_eq!(server.players().online_count(), 0);
        // DER public keys start with a SEQUENCE tag.
        assert_eq!(server.key_pair().public_key_der()[0], 0x30);
    }
}
