//! Connection settings with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. User config: `~/.config/docrepo/config.toml` (XDG) or platform config dir
//! 2. Project config: `docrepo.toml`
//! 3. Environment variables: `DOCREPO_*`
//!
//! ```toml
//! db_name = "inventory"
//! server = "db.internal"
//! port = 27017
//! user = "svc"
//! password = "secret"
//! tls = true
//! ```
//!
//! `server` may also be a full `mongodb://` URL, in which case it is used
//! verbatim and the credential/port/TLS fields are ignored. Settings are
//! resolved once when a connector is built and never re-validated per call.

use std::ops::Deref;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default MongoDB port.
pub const DEFAULT_PORT: u16 = 27017;

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Settings for reaching the document database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Database name (required). Also the authentication source for `user`.
    pub db_name: String,
    /// Server host name, or a complete `mongodb://` connection URL.
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Enable TLS on the connection.
    #[serde(default)]
    pub tls: bool,
}

fn default_server() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ConnectionSettings {
    /// Settings for `db_name` on `localhost:27017` without credentials.
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            server: default_server(),
            port: DEFAULT_PORT,
            user: String::new(),
            password: String::new(),
            tls: false,
        }
    }

    /// Returns true if `server` holds a full connection URL.
    pub fn is_url(&self) -> bool {
        self.server.contains("mongodb://")
    }

    /// Returns true if both a user name and a password are configured.
    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty() && !self.password.is_empty()
    }

    /// Load settings with layered resolution (user → project → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract().map_err(ConfigError::from)
    }

    /// The layered figment used by [`load`](Self::load).
    pub fn figment() -> Figment {
        Figment::new()
            // Layer 0: built-in defaults
            .merge(Serialized::default("server", default_server()))
            .merge(Serialized::default("port", DEFAULT_PORT))
            // Layer 1: User config (lowest priority)
            .merge(Toml::file(Self::user_config_path()))
            // Layer 2: Project config
            .merge(Toml::file("docrepo.toml"))
            // Layer 3: Environment variables (highest priority)
            .merge(Env::prefixed("DOCREPO_"))
    }

    /// User config path: ~/.config/docrepo/config.toml (XDG) or platform config dir.
    fn user_config_path() -> std::path::PathBuf {
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("docrepo").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        dirs::config_dir()
            .map(|p| p.join("docrepo").join("config.toml"))
            .unwrap_or_default()
    }
}
