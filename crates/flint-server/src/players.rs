//! Online player registry and the admission policy stores (bans, whitelist).
//!
//! The stores are plain JSON files loaded once at startup and held in memory;
//! a missing file is an empty store.

use chrono::{DateTime, Utc};
use flint_proto::profile::GameProfile;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::messages;

pub const BANNED_PLAYERS_FILE: &str = "banned-players.json";
pub const BANNED_IPS_FILE: &str = "banned-ips.json";
pub const WHITELIST_FILE: &str = "whitelist.json";
pub const WHITELISTED_IPS_FILE: &str = "whitelisted-ips.json";

fn default_ban_reason() -> String {
    "Banned by an operator.".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BanEntry {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default = "default_ban_reason")]
    pub reason: String,
    /// Permanent when absent.
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpBanEntry {
    pub ip: IpAddr,
    #[serde(default = "default_ban_reason")]
    pub reason: String,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhitelistEntry {
    pub uuid: Uuid,
    pub name: String,
}

/// Why the admission policy turned a profile away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinDenial {
    Banned {
        reason: String,
        expires: Option<DateTime<Utc>>,
    },
    NotWhitelisted,
    IpBanned {
        reason: String,
        expires: Option<DateTime<Utc>>,
    },
}

impl JoinDenial {
    /// Disconnect text shown to the client.
    pub fn message(&self) -> String {
        match self {
            Self::Banned { reason, expires } => {
                messages::banned(reason, format_expiry(expires).as_deref())
            }
            Self::NotWhitelisted => messages::NOT_WHITELISTED.to_owned(),
            Self::IpBanned { reason, expires } => {
                messages::ip_banned(reason, format_expiry(expires).as_deref())
            }
        }
    }
}

fn format_expiry(expires: &Option<DateTime<Utc>>) -> Option<String> {
    expires.map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("player {0} is already connected")]
    AlreadyConnected(String),
}

struct OnlinePlayer {
    profile: GameProfile,
    #[allow(dead_code)]
    address: SocketAddr,
}

/// Tracks who is online and decides who may join.
pub struct PlayerManager {
    whitelist_enabled: bool,
    online: Mutex<HashMap<Uuid, OnlinePlayer>>,
    bans: Vec<BanEntry>,
    ip_bans: Vec<IpBanEntry>,
    whitelist: Vec<WhitelistEntry>,
    whitelisted_ips: Vec<IpAddr>,
}

impl PlayerManager {
    /// A manager with empty stores.
    pub fn new(whitelist_enabled: bool) -> Self {
        Self {
            whitelist_enabled,
            online: Mutex::new(HashMap::new()),
            bans: Vec::new(),
            ip_bans: Vec::new(),
            whitelist: Vec::new(),
            whitelisted_ips: Vec::new(),
        }
    }

    /// Load the policy stores from `data_dir`. Missing files are empty
    /// stores; malformed files are logged and treated as empty.
    pub fn load(data_dir: impl AsRef<Path>, whitelist_enabled: bool) -> Self {
        let dir = data_dir.as_ref();
        Self {
            whitelist_enabled,
            online: Mutex::new(HashMap::new()),
            bans: read_store(&dir.join(BANNED_PLAYERS_FILE)),
            ip_bans: read_store(&dir.join(BANNED_IPS_FILE)),
            whitelist: read_store(&dir.join(WHITELIST_FILE)),
            whitelisted_ips: read_store(&dir.join(WHITELISTED_IPS_FILE)),
        }
    }

    pub fn whitelist_enabled(&self) -> bool {
        self.whitelist_enabled
    }

    pub fn online_count(&self) -> usize {
        self.online.lock().unwrap().len()
    }

    /// Run the admission policy for `profile` connecting from `ip`: bans
    /// first, then the whitelist, then IP bans. `None` means the player may
    /// join.
    pub fn check_can_join(&self, profile: &GameProfile, ip: Option<IpAddr>) -> Option<JoinDenial> {
        let now = Utc::now();

        if let Some(entry) = self.active_ban(profile.uuid, now) {
            info!(
                "{} was disconnected as they are banned from this server.",
                profile.name
            );
            return Some(JoinDenial::Banned {
                reason: entry.reason.clone(),
                expires: entry.expires,
            });
        }

        if self.whitelist_enabled && !self.is_whitelisted(profile.uuid, ip) {
            info!(
                "{} was disconnected as this server is whitelisted and they are not on the whitelist.",
                profile.name
            );
            return Some(JoinDenial::NotWhitelisted);
        }

        if let Some(entry) = self.active_ip_ban(ip, now) {
            info!("{} disconnected. Reason: IP Banned", profile.name);
            return Some(JoinDenial::IpBanned {
                reason: entry.reason.clone(),
                expires: entry.expires,
            });
        }

        None
    }

    /// Add a player to the online set. Fails when the UUID is already
    /// connected.
    pub fn register(&self, profile: GameProfile, address: SocketAddr) -> Result<(), RegisterError> {
        let mut online = self.online.lock().unwrap();
        if online.contains_key(&profile.uuid) {
            return Err(RegisterError::AlreadyConnected(profile.name));
        }
        online.insert(profile.uuid, OnlinePlayer { profile, address });
        Ok(())
    }

    /// Remove a player from the online set, returning their profile if they
    /// were registered.
    pub fn unregister(&self, uuid: Uuid) -> Option<GameProfile> {
        self.online
            .lock()
            .unwrap()
            .remove(&uuid)
            .map(|player| player.profile)
    }

    fn active_ban(&self, uuid: Uuid, now: DateTime<Utc>) -> Option<&BanEntry> {
        self.bans
            .iter()
            .find(|entry| entry.uuid == uuid && entry.expires.is_none_or(|at| at > now))
    }

    fn active_ip_ban(&self, ip: Option<IpAddr>, now: DateTime<Utc>) -> Option<&IpBanEntry> {
        let ip = ip?;
        self.ip_bans
            .iter()
            .find(|entry| entry.ip == ip && entry.expires.is_none_or(|at| at > now))
    }

    fn is_whitelisted(&self, uuid: Uuid, ip: Option<IpAddr>) -> bool {
        self.whitelist.iter().any(|entry| entry.uuid == uuid)
            || ip.is_some_and(|ip| self.whitelisted_ips.contains(&ip))
    }
}

fn read_store<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => return Vec::new(),
    };
    match serde_json::from_str(&contents) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Ignoring malformed store {}: {e}", path.display());
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("flint_players_{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn profile(name: &str) -> GameProfile {
        GameProfile::new(flint_crypto::offline_player_uuid(name), name)
    }

    fn peer() -> Option<IpAddr> {
        Some("203.0.113.7".parse().unwrap())
    }

    #[test]
    fn empty_manager_admits_everyone() {
        let manager = PlayerManager::new(false);
        assert!(manager.check_can_join(&profile("Alice"), peer()).is_none());
    }

    #[test]
    fn missing_store_files_are_empty() {
        let dir = temp_dir();
        let manager = PlayerManager::load(&dir, false);
        assert!(manager.check_can_join(&profile("Alice"), peer()).is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn banned_player_is_denied_with_reason() {
        let dir = temp_dir();
        let alice = profile("Alice");
        std::fs::write(
            dir.join(BANNED_PLAYERS_FILE),
            format!(
                r#"[{{"uuid":"{}","name":"Alice","reason":"griefing"}}]"#,
                alice.uuid
            ),
        )
        .unwrap();

        let manager = PlayerManager::load(&dir, false);
        let denial = manager.check_can_join(&alice, peer()).unwrap();
        assert_eq!(
            denial,
            JoinDenial::Banned {
                reason: "griefing".into(),
                expires: None,
            }
        );
        assert!(denial.message().contains("griefing"));
        // Everyone else still gets in.
        assert!(manager.check_can_join(&profile("Bob"), peer()).is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn expired_ban_admits() {
        let dir = temp_dir();
        let alice = profile("Alice");
        std::fs::write(
            dir.join(BANNED_PLAYERS_FILE),
            format!(
                r#"[{{"uuid":"{}","name":"Alice","reason":"griefing","expires":"2001-01-01T00:00:00Z"}}]"#,
                alice.uuid
            ),
        )
        .unwrap();

        let manager = PlayerManager::load(&dir, false);
        assert!(manager.check_can_join(&alice, peer()).is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn whitelist_denies_unlisted_players() {
        let dir = temp_dir();
        let alice = profile("Alice");
        std::fs::write(
            dir.join(WHITELIST_FILE),
            format!(r#"[{{"uuid":"{}","name":"Alice"}}]"#, alice.uuid),
        )
        .unwrap();

        let manager = PlayerManager::load(&dir, true);
        assert!(manager.check_can_join(&alice, peer()).is_none());
        assert_eq!(
            manager.check_can_join(&profile("Bob"), peer()),
            Some(JoinDenial::NotWhitelisted)
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn whitelisted_ip_admits_unlisted_player() {
        let dir = temp_dir();
        std::fs::write(dir.join(WHITELISTED_IPS_FILE), r#"["203.0.113.7"]"#).unwrap();

        let manager = PlayerManager::load(&dir, true);
        assert!(manager.check_can_join(&profile("Bob"), peer()).is_none());
        // Same player from elsewhere is still denied.
        let other = Some("198.51.100.1".parse().unwrap());
        assert_eq!(
            manager.check_can_join(&profile("Bob"), other),
            Some(JoinDenial::NotWhitelisted)
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn banned_ip_is_denied() {
        let dir = temp_dir();
        std::fs::write(
            dir.join(BANNED_IPS_FILE),
            r#"[{"ip":"203.0.113.7","reason":"spam"}]"#,
        )
        .unwrap();

        let manager = PlayerManager::load(&dir, false);
        let denial = manager.check_can_join(&profile("Alice"), peer()).unwrap();
        assert!(matches!(denial, JoinDenial::IpBanned { .. }));
        assert!(denial.message().contains("spam"));
        // Unknown address cannot match an IP ban.
        assert!(manager.check_can_join(&profile("Alice"), None).is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn profile_ban_wins_over_whitelist() {
        let dir = temp_dir();
        let alice = profile("Alice");
        std::fs::write(
            dir.join(BANNED_PLAYERS_FILE),
            format!(
                r#"[{{"uuid":"{}","name":"Alice","reason":"griefing"}}]"#,
                alice.uuid
            ),
        )
        .unwrap();
        std::fs::write(
            dir.join(WHITELIST_FILE),
            format!(r#"[{{"uuid":"{}","name":"Alice"}}]"#, alice.uuid),
        )
        .unwrap();

        let manager = PlayerManager::load(&dir, true);
        assert!(matches!(
            manager.check_can_join(&alice, peer()),
            Some(JoinDenial::Banned { .. })
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn malformed_store_is_ignored() {
        let dir = temp_dir();
        std::fs::write(dir.join(BANNED_PLAYERS_FILE), "not json").unwrap();
        let manager = PlayerManager::load(&dir, false);
        assert!(manager.check_can_join(&profile("Alice"), peer()).is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn register_rejects_duplicate_uuid() {
        let manager = PlayerManager::new(false);
        let alice = profile("Alice");
        let addr: SocketAddr = "203.0.113.7:53612".parse().unwrap();

        manager.register(alice.clone(), addr).unwrap();
        assert_eq!(manager.online_count(), 1);
        assert!(matches!(
            manager.register(alice.clone(), addr),
            Err(RegisterError::AlreadyConnected(name)) if name == "Alice"
        ));

        let removed = manager.unregister(alice.uuid).unwrap();
        assert_eq!(removed.name, "Alice");
        assert_eq!(manager.online_count(), 0);
        manager.register(alice, addr).unwrap();
    }
}
