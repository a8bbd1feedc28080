//! Saved connection profiles and the store that serves them.
//!
//! A profile names a remote machine by *device id* (`host:port`) and
//! carries the account to log in with. Account names may be qualified
//! either as `DOMAIN\user` or `user@domain`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::ConnectRequest;
use crate::error::ProfileError;

/// Port used when a device id does not carry one.
pub const DEFAULT_RDP_PORT: u16 = 3389;

// ── Profile ──────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Lookup key.
    pub name: String,
    /// `host:port`, e.g. `10.0.0.5:3389` or `rdp.example.com:3389`.
    pub device_id: String,
    /// `user`, `DOMAIN\user` or `user@domain`.
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Optional label for lists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("device_id", &self.device_id)
            .field("username", &self.username)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

impl Profile {
    pub fn new(
        name: impl Into<String>,
        device_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            device_id: device_id.into(),
            username: username.into(),
            password: password.into(),
            display_name: None,
        }
    }

    /// Label for lists: the display name when set, else the device id.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.device_id)
    }

    /// Host part of the device id.
    pub fn host(&self) -> &str {
        match self.device_id.rfind(':') {
            Some(i) if i > 0 => self.device_id[..i].trim(),
            _ => self.device_id.trim(),
        }
    }

    /// Port part of the device id, or 3389 when absent or unparsable.
    pub fn port(&self) -> u16 {
        match self.device_id.rfind(':') {
            Some(i) if i > 0 => self.device_id[i + 1..]
                .trim()
                .parse()
                .unwrap_or(DEFAULT_RDP_PORT),
            _ => DEFAULT_RDP_PORT,
        }
    }

    /// Windows domain, if the account name is qualified.
    pub fn domain(&self) -> Option<&str> {
        if let Some((domain, _)) = self.username.split_once('\\') {
            return Some(domain).filter(|d| !d.trim().is_empty());
        }
        if let Some((_, domain)) = self.username.split_once('@') {
            return Some(domain).filter(|d| !d.trim().is_empty());
        }
        None
    }

    /// Account name without its domain qualifier.
    pub fn plain_username(&self) -> &str {
        if let Some((_, user)) = self.username.split_once('\\') {
            return user;
        }
        if let Some((user, _)) = self.username.split_once('@') {
            return user;
        }
        &self.username
    }

    /// Check the fields required to attempt a connection.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.device_id.trim().is_empty() {
            return Err(ProfileError::MissingField("device id"));
        }
        if !is_valid_device_id(&self.device_id) {
            return Err(ProfileError::InvalidDeviceId(self.device_id.clone()));
        }
        if self.username.trim().is_empty() {
            return Err(ProfileError::MissingField("username"));
        }
        if self.password.trim().is_empty() {
            return Err(ProfileError::MissingField("password"));
        }
        Ok(())
    }

    /// Validate and resolve into engine parameters for a
    /// `width × height` desktop.
    pub fn to_connect_request(&self, width: u32, height: u32) -> Result<ConnectRequest, ProfileError> {
        self.validate()?;
        Ok(ConnectRequest {
            host: self.host().to_owned(),
            port: self.port(),
            domain: self.domain().map(str::to_owned),
            username: self.plain_username().to_owned(),
            password: self.password.clone(),
            width,
            height,
        })
    }
}

/// `host:port` with a non-empty host and a 1–5 digit port in `1..=65535`.
pub fn is_valid_device_id(input: &str) -> bool {
    let input = input.trim();
    let Some((host, port)) = input.split_once(':') else {
        return false;
    };
    !host.is_empty()
        && (1..=5).contains(&port.len())
        && port.bytes().all(|b| b.is_ascii_digit())
        && port.parse::<u16>().is_ok_and(|p| p != 0)
}

// ── ProfileStore ─────────────────────────────────────────────────

/// Read-only source of saved profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn profile(&self, name: &str) -> Result<Profile, ProfileError>;

    /// All profiles, in display order.
    async fn profiles(&self) -> Vec<Profile>;
}

/// In-memory store, typically filled from the client configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticProfileStore {
    profiles: Vec<Profile>,
}

impl StaticProfileStore {
    pub fn new(profiles: Vec<Profile>) -> Self {
        debug!(count = profiles.len(), "profile store loaded");
        Self { profiles }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl ProfileStore for StaticProfileStore {
    async fn profile(&self, name: &str) -> Result<Profile, ProfileError> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| ProfileError::NotFound(name.to_owned()))
    }

    async fn profiles(&self) -> Vec<Profile> {
        self.profiles.clone()
    }
}
