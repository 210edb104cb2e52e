use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_PATH: &str = "./bullride.toml";

/// Command-line flags. Only flags actually given override lower layers.
#[derive(Parser, Serialize, Debug, Default)]
#[command(name = "bullride-server", version, about = "Bullride backend server")]
pub struct Args {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,

    /// Data directory for the basket database
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Email domain whose addresses may join the admin chat
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_domain: Option<String>,
}

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub json_logs: bool,
    pub data_dir: String,
    /// Browser origin allowed by CORS (credentials included)
    pub allowed_origin: String,
    /// Email domain whose addresses may join the admin chat
    pub admin_domain: String,
    /// HS256 secret for admission tokens. When unset, token claims are
    /// decoded without any signature check.
    #[serde(default)]
    pub token_secret: Option<String>,
    #[serde(default)]
    pub alpaca: AlpacaConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

/// Brokerage market-data API settings (`[alpaca]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlpacaConfig {
    #[serde(default)]
    pub key_id: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default = "default_data_url")]
    pub data_url: String,
    #[serde(default = "default_trading_url")]
    pub trading_url: String,
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            key_id: None,
            secret_key: None,
            data_url: default_data_url(),
            trading_url: default_trading_url(),
        }
    }
}

fn default_data_url() -> String {
    "https://data.alpaca.markets/v2".to_string()
}

fn default_trading_url() -> String {
    "https://paper-api.alpaca.markets/v2".to_string()
}

/// Outbound mail settings (`[mail]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_mail_region")]
    pub region: String,
    #[serde(default = "default_mailbox")]
    pub sender: String,
    #[serde(default = "default_mailbox")]
    pub recipient: String,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            region: default_mail_region(),
            sender: default_mailbox(),
            recipient: default_mailbox(),
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

fn default_mail_region() -> String {
    "us-east-1".to_string()
}

fn default_mailbox() -> String {
    "info@bullride.us".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            data_dir: "./data".to_string(),
            allowed_origin: "https://bullride.us".to_string(),
            admin_domain: "bullride.us".to_string(),
            token_secret: None,
            alpaca: AlpacaConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (BULLRIDE_*) < CLI args
    ///
    /// Nested keys use a double underscore, e.g. `BULLRIDE_ALPACA__KEY_ID`.
    pub fn figment(args: &Args) -> Figment {
        let config_path = args
            .config
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("BULLRIDE_").split("__"))
            .merge(Serialized::defaults(args))
    }

    pub fn load(args: &Args) -> Result<Self, Box<figment::Error>> {
        let config: Self = Self::figment(args).extract().map_err(Box::new)?;
        config.validate().map_err(Box::new)?;
        Ok(config)
    }

    /// CORS credentials cannot be combined with a wildcard origin.
    fn validate(&self) -> Result<(), figment::Error> {
        let origin = self.allowed_origin.trim();
        if origin.is_empty() || origin.contains('*') {
            return Err(serde::de::Error::custom(format!(
                "allowed_origin must be a single explicit origin (got {:?}); \
                 a wildcard cannot be used with credentialed CORS",
                self.allowed_origin
            )));
        }
        Ok(())
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Bullride Server Configuration
# Place this file at ./bullride.toml or specify with --config <path>
# All settings can be overridden via environment variables (BULLRIDE_PORT,
# BULLRIDE_ALPACA__KEY_ID, etc.) or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0 - all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite basket store
# data_dir = "./data"

# Browser origin allowed to call the API with credentials
# allowed_origin = "https://bullride.us"

# Email domain whose addresses may join the admin chat
# admin_domain = "bullride.us"

# HS256 secret for admin chat tokens. Leave unset to accept tokens
# without a signature check (claims are trusted as presented).
# token_secret = ""

# ---- Market data ----
# [alpaca]
# key_id = ""
# secret_key = ""
# data_url = "https://data.alpaca.markets/v2"
# trading_url = "https://paper-api.alpaca.markets/v2"

# ---- Contact form mail (Amazon SES) ----
# Without credentials, contact messages are only logged.
# [mail]
# region = "us-east-1"
# sender = "info@bullride.us"
# recipient = "info@bullride.us"
# access_key_id = ""
# secret_access_key = ""
"#
    .to_string()
}
