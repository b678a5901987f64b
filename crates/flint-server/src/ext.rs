//! Extension points exercised while a connection logs in.
//!
//! Extensions are registered at startup and consulted from the connection's
//! own task, so a slow hook stalls only the connection that triggered it.

use async_trait::async_trait;
use flint_proto::profile::GameProfile;
use std::net::SocketAddr;
use std::sync::Arc;

/// Permission lookup attached to a player once login finishes.
pub type PermissionFunction = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// The deny-all function players start with when no extension supplies one.
pub fn default_permissions() -> PermissionFunction {
    Arc::new(|_| false)
}

/// Outcome of a vetoable hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Allow,
    /// Veto, optionally with a custom disconnect reason.
    Deny(Option<String>),
}

/// Outcome of the authentication hook. Besides vetoing, it may substitute a
/// profile, which skips the session service entirely.
#[derive(Debug, Clone)]
pub enum AuthDecision {
    Allow,
    Deny(Option<String>),
    Profile(GameProfile),
}

/// Hooks observed during login. Every method has a pass-through default.
#[async_trait]
pub trait GateExtension: Send + Sync {
    /// Runs in online mode before the session service is consulted.
    async fn authenticate(&self, name: &str) -> AuthDecision {
        let _ = name;
        AuthDecision::Allow
    }

    /// Runs once a profile exists, before the player is registered.
    async fn login(&self, profile: &GameProfile, address: SocketAddr) -> HookOutcome {
        let _ = (profile, address);
        HookOutcome::Allow
    }

    /// Supplies the permission function for the joining player.
    async fn setup_permissions(&self, profile: &GameProfile) -> Option<PermissionFunction> {
        let _ = profile;
        None
    }
}

/// Registered extensions, consulted in registration order.
#[derive(Default)]
pub struct Extensions {
    extensions: Vec<Box<dyn GateExtension>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extension: Box<dyn GateExtension>) {
        self.extensions.push(extension);
    }

    /// First decision other than `Allow` wins.
    pub async fn authenticate(&self, name: &str) -> AuthDecision {
        for extension in &self.extensions {
            match extension.authenticate(name).await {
                AuthDecision::Allow => {}
                decision => return decision,
            }
        }
        AuthDecision::Allow
    }

    /// First veto wins.
    pub async fn login(&self, profile: &GameProfile, address: SocketAddr) -> HookOutcome {
        for extension in &self.extensions {
            if let HookOutcome::Deny(reason) = extension.login(profile, address).await {
                return HookOutcome::Deny(reason);
            }
        }
        HookOutcome::Allow
    }

    /// Last extension to supply a function wins; deny-all otherwise.
    pub async fn setup_permissions(&self, profile: &GameProfile) -> PermissionFunction {
        let mut function = default_permissions();
        for extension in &self.extensions {
            if let Some(supplied) = extension.setup_permissions(profile).await {
                function = supplied;
            }
        }
        function
    }
}
