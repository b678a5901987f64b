use crate::forwarding::ForwardingMode;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub status: StatusSection,
    #[serde(default)]
    pub proxy: ProxySection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_online_mode")]
    pub online_mode: bool,
    /// Packets at or above this many bytes are compressed. -1 disables compression.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: i32,
    #[serde(default)]
    pub require_secure_profile: bool,
    /// Send the client IP along to the session service so it can reject proxied logins.
    #[serde(default)]
    pub prevent_proxy_connections: bool,
    #[serde(default)]
    pub whitelist: bool,
}

fn default_ip() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    25565
}

fn default_online_mode() -> bool {
    true
}

fn default_compression_threshold() -> i32 {
    256
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            online_mode: default_online_mode(),
            compression_threshold: default_compression_threshold(),
            require_secure_profile: false,
            prevent_proxy_connections: false,
            whitelist: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusSection {
    #[serde(default = "default_motd")]
    pub motd: String,
    #[serde(default = "default_max_players")]
    pub max_players: u32,
}

fn default_motd() -> String {
    "A Flint server".into()
}

fn default_max_players() -> u32 {
    20
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            motd: default_motd(),
            max_players: default_max_players(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProxySection {
    #[serde(default)]
    pub mode: ForwardingMode,
    /// Shared secret for modern (Velocity) forwarding integrity checks.
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthSection {
    #[serde(default = "default_session_server")]
    pub session_server: String,
    /// PEM/DER path for the services root key used to validate profile key signatures.
    #[serde(default)]
    pub services_key_file: Option<String>,
}

fn default_session_server() -> String {
    "https://sessionserver.mojang.com".into()
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            session_server: default_session_server(),
            services_key_file: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ServerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config() {
        let toml_str = r#"
            [server]
            ip = "127.0.0.1"
            port = 25577
            online_mode = false
            compression_threshold = 64

            [status]
            motd = "Test Server"
            max_players = 100

            [logging]
            level = "debug"
        "#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.ip, "127.0.0.1");
        assert_eq!(config.server.port, 25577);
        assert!(!config.server.online_mode);
        assert_eq!(config.server.compression_threshold, 64);
        assert!(!config.server.require_secure_profile); // default
        assert!(!config.server.whitelist); // default
        assert_eq!(config.status.motd, "Test Server");
        assert_eq!(config.status.max_players, 100);
        assert_eq!(config.logging.level, "debug");
        // proxy section defaults when absent
        assert_eq!(config.proxy.mode, ForwardingMode::None);
        assert!(config.proxy.secret.is_empty());
        // auth section defaults when absent
        assert_eq!(config.auth.session_server, "https://sessionserver.mojang.com");
        assert!(config.auth.services_key_file.is_none());
    }

    #[test]
    fn parse_config_with_proxy() {
        let toml_str = r#"
            [proxy]
            mode = "modern"
            secret = "hunter2"
        "#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.proxy.mode, ForwardingMode::Modern);
        assert_eq!(config.proxy.secret, "hunter2");
        // server section defaults when absent
        assert_eq!(config.server.ip, "0.0.0.0");
        assert_eq!(config.server.port, 25565);
        assert!(config.server.online_mode);
        assert_eq!(config.server.compression_threshold, 256);
        assert_eq!(config.status.max_players, 20);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn empty_config_is_all_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 25565);
        assert_eq!(config.proxy.mode, ForwardingMode::None);
        assert_eq!(config.status.motd, "A Flint server");
    }
}
