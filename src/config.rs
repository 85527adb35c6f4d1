use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "shelfwise", about = "A book catalog with personal reading lists")]
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
    pub catalog: CatalogConfig,
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
    /// Lifetime of a plain login.
    pub session_hours: u64,
    /// Lifetime of a login with "remember me" ticked.
    pub remember_hours: u64,
}

/// Defaults applied to books created inline from a reading-list submission.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    pub default_cover: String,
    pub default_language: String,
    pub default_page_count: i64,
    pub search_limit: u32,
    pub max_search_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3333,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "shelfwise_session".to_string(),
            session_hours: 24,
            remember_hours: 720,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_cover:
                "https://images.unsplash.com/photo-1543002588-bfa74002ed7e?w=400&h=600&fit=crop"
                    .to_string(),
            default_language: "English".to_string(),
            default_page_count: 100,
            search_limit: 20,
            max_search_limit: 100,
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
            config.database.path = Some(data_dir.join("shelfwise.db"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
        match cli.data_dir.clone() {
            Some(dir) => Ok(dir),
            None => dirs::home_dir()
                .map(|home| home.join(".shelfwise"))
                .ok_or_else(|| anyhow::anyhow!("Could not determine home directory")),
        }
    }

    pub fn db_path(&self) -> anyhow::Result<&PathBuf> {
        self.database
            .path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("database path not resolved"))
    }

    /// Clamp a requested search limit into `1..=max_search_limit`, falling
    /// back to the configured default when none was given.
    pub fn search_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.catalog.search_limit)
            .clamp(1, self.catalog.max_search_limit.max(1))
    }
}
