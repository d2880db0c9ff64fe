use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Real-time chat backend with phone-number sign-in
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "webchat-server", version, about = "Real-time chat backend")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "WEBCHAT_PORT", default_value = "3001")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "WEBCHAT_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./webchat.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "WEBCHAT_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, keys, uploaded avatars)
    #[arg(long, env = "WEBCHAT_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Browser origins allowed by CORS (comma-separated; empty = allow any)
    #[arg(long, env = "WEBCHAT_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3001,
            bind_address: "0.0.0.0".to_string(),
            config: "./webchat.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (WEBCHAT_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            // cors_origins is list-valued; clap's env support parses it,
            // figment's would not
            .merge(Env::prefixed("WEBCHAT_").ignore(&["cors_origins"]))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Webchat Server Configuration
# Place this file at ./webchat.toml or specify with --config <path>
# All settings can be overridden via environment variables (WEBCHAT_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 3001)
# port = 3001

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database, JWT signing key, and avatars
# data_dir = "./data"

# Browser origins allowed by CORS. Empty list allows any origin,
# which is only appropriate for development.
# cors_origins = ["https://chat.example.com", "http://localhost:5173"]
"#
    .to_string()
}
