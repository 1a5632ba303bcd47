use chrono_tz::Tz;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

use crate::db::models::ListScope;

#[derive(Parser, Debug)]
#[command(name = "together", about = "A little home server for two")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub board: BoardConfig,
    pub display: DisplayConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    /// Header an upstream identity proxy sets to the authenticated user id.
    /// Unset means only session cookies are accepted.
    pub identity_header: Option<String>,
    pub email_header: Option<String>,
    pub name_header: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BoardScope {
    /// Both partners see every note and memory.
    #[default]
    Shared,
    /// Each user only sees what they wrote.
    Personal,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct BoardConfig {
    pub scope: BoardScope,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    /// Viewer timezone when a dashboard request does not name one.
    pub local_timezone: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "together_session".to_string(),
            session_hours: 720,
            identity_header: None,
            email_header: None,
            name_header: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            local_timezone: "UTC".to_string(),
        }
    }
}

impl ServerConfig {
    /// Bind the listener. `host` may be a name such as `localhost` or a bare IPv6 address.
    pub async fn bind(&self) -> std::io::Result<tokio::net::TcpListener> {
        tokio::net::TcpListener::bind((self.host.as_str(), self.port)).await
    }
}

impl BoardConfig {
    pub fn scope_for(&self, user_id: &str) -> ListScope {
        match self.scope {
            BoardScope::Shared => ListScope::Shared,
            BoardScope::Personal => ListScope::Personal(user_id.to_string()),
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli)?;
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("together.db"));
        }

        config
            .display
            .local_timezone
            .parse::<Tz>()
            .map_err(|_| {
                anyhow::anyhow!(
                    "display.local_timezone is not a known timezone: {}",
                    config.display.local_timezone
                )
            })?;

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
        match &cli.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(".together"))
                .ok_or_else(|| anyhow::anyhow!("Could not determine home directory")),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("together.db"))
    }

    /// The configured fallback viewer timezone.
    pub fn local_timezone(&self) -> Tz {
        self.display.local_timezone.parse().unwrap_or(Tz::UTC)
    }
}
