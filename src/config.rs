use std::{
    fs,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::inventory::{DEFAULT_COLS, DEFAULT_ROWS, MAX_COLS, MAX_ROWS};

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_MAX_CONNECTIONS: usize = 5;
pub const DEFAULT_RETRIES: u32 = 5;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Settings of the ticket server
///
/// every key is optional in the TOML file, missing keys keep their default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub max_connections: usize,
    pub rows: usize,
    pub cols: usize,
    pub idle_timeout_secs: Option<u64>,
    pub drain_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED.into(),
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            idle_timeout_secs: None,
            drain_timeout_secs: 1,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::parse(&read(path)?)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Brings the seat map dimensions into range and validates the rest
    ///
    /// a zero dimension falls back to the default, a larger one than
    /// supported is capped.
    pub fn normalize(mut self) -> Result<Self, ConfigError> {
        self.rows = clamp_dimension(self.rows, DEFAULT_ROWS, MAX_ROWS);
        self.cols = clamp_dimension(self.cols, DEFAULT_COLS, MAX_COLS);

        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be at least 1".into(),
            ));
        }

        if self.idle_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "idle_timeout_secs must be at least 1 when set".into(),
            ));
        }

        Ok(self)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

fn clamp_dimension(value: usize, default: usize, max: usize) -> usize {
    match value {
        0 => default,
        value => value.min(max),
    }
}

/// Where the client finds the server, and how hard it tries to reach it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub ip: IpAddr,
    pub port: u16,
    // bare `key=value` settings files call this `timeout`
    #[serde(alias = "timeout")]
    pub retries: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::LOCALHOST.into(),
            port: DEFAULT_PORT,
            retries: DEFAULT_RETRIES,
        }
    }
}

impl ClientSettings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::parse(&read(path)?)
    }

    /// Parses a TOML settings file, or the bare `key=value` lines of older ones
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        match toml::from_str(text) {
            Ok(settings) => Ok(settings),
            Err(err) => match bare_table(text) {
                Some(table) => Ok(toml::Value::Table(table).try_into()?),
                None => Err(err.into()),
            },
        }
    }

    /// Loads the settings file, falling back to the defaults on any failure
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!("{}, using the default settings", err);
                Self::default()
            }
        }
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

// `ip=127.0.0.1` style lines, values are taken up to the end of the line unquoted.
// returns None unless every meaningful line is a `key=value` pair.
fn bare_table(text: &str) -> Option<toml::Table> {
    let mut table = toml::Table::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with(&['#', ';'][..]) {
            continue;
        }

        let (key, value) = line.split_once('=')?;
        let value = value.trim();
        let value = match value.parse::<i64>() {
            Ok(number) => toml::Value::Integer(number),
            Err(_) => toml::Value::String(value.to_owned()),
        };

        table.insert(key.trim().to_owned(), value);
    }

    (!table.is_empty()).then_some(table)
}
