use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketData {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_market_base_url")]
    pub base_url: String,
    #[serde(default = "default_market_timeout")]
    pub timeout_secs: u64,
}

fn default_market_base_url() -> String {
    "https://www.alphavantage.co/query".to_string()
}

fn default_market_timeout() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct Provider {
    /// SIMULATED (default) or METATRADER.
    #[serde(default = "default_provider_type")]
    pub provider_type: String,
    #[serde(default)]
    pub bridge_url: Option<String>,
    #[serde(default)]
    pub bridge_api_key: Option<String>,
    #[serde(default = "default_bridge_timeout")]
    pub timeout_secs: u64,
    /// Magic number attached to bridge orders so the terminal can tell
    /// engine trades apart from manual ones.
    #[serde(default = "default_magic_number")]
    pub magic_number: i64,
}

fn default_provider_type() -> String {
    "SIMULATED".to_string()
}

fn default_bridge_timeout() -> u64 {
    10
}

fn default_magic_number() -> i64 {
    880_021
}

#[derive(Debug, Clone, Deserialize)]
pub struct Email {
    #[serde(default)]
    pub sendgrid_api_key: Option<String>,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default = "default_email_timeout")]
    pub timeout_secs: u64,
}

fn default_email_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: Database,
    #[serde(default = "default_server")]
    pub server: Server,
    pub market_data: MarketData,
    #[serde(default = "default_provider")]
    pub provider: Provider,
    #[serde(default = "default_email")]
    pub email: Email,
}

fn default_server() -> Server {
    Server {
        host: default_host(),
        port: default_port(),
    }
}

fn default_provider() -> Provider {
    Provider {
        provider_type: default_provider_type(),
        bridge_url: None,
        bridge_api_key: None,
        timeout_secs: default_bridge_timeout(),
        magic_number: default_magic_number(),
    }
}

fn default_email() -> Email {
    Email {
        sendgrid_api_key: None,
        from_email: None,
        recipient: None,
        timeout_secs: default_email_timeout(),
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "default".into());

        let mut builder = Config::builder()
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false));

        // Environment always wins over file values.
        for (var, key) in [
            ("DATABASE_URL", "database.url"),
            ("MARKET_DATA_API_KEY", "market_data.api_key"),
            ("TRADE_PROVIDER_TYPE", "provider.provider_type"),
            ("MT_BRIDGE_URL", "provider.bridge_url"),
            ("MT_BRIDGE_API_KEY", "provider.bridge_api_key"),
            ("SENDGRID_API_KEY", "email.sendgrid_api_key"),
            ("FROM_EMAIL", "email.from_email"),
            ("NOTIFICATION_EMAIL_RECIPIENT", "email.recipient"),
            ("SERVER_HOST", "server.host"),
            ("SERVER_PORT", "server.port"),
        ] {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Startup validation: a missing store URL or market-data key is fatal.
    /// Bridge and email values are checked lazily by their consumers.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Message(
                "DATABASE_URL is required".to_string(),
            ));
        }
        if self.market_data.api_key.is_empty() {
            return Err(ConfigError::Message(
                "MARKET_DATA_API_KEY is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Presence map for `admin_get_env_variables_status`. Booleans only,
    /// never the values themselves.
    pub fn env_status(&self) -> BTreeMap<&'static str, bool> {
        let mut status = BTreeMap::new();
        status.insert("DATABASE_URL", !self.database.url.is_empty());
        status.insert("MARKET_DATA_API_KEY", !self.market_data.api_key.is_empty());
        status.insert("TRADE_PROVIDER_TYPE", !self.provider.provider_type.is_empty());
        status.insert(
            "MT_BRIDGE_URL",
            self.provider
                .bridge_url
                .as_deref()
                .is_some_and(|v| !v.is_empty()),
        );
        status.insert(
            "MT_BRIDGE_API_KEY",
            self.provider
                .bridge_api_key
                .as_deref()
                .is_some_and(|v| !v.is_empty()),
        );
        status.insert(
            "SENDGRID_API_KEY",
            self.email
                .sendgrid_api_key
                .as_deref()
                .is_some_and(|v| !v.is_empty()),
        );
        status.insert(
            "FROM_EMAIL",
            self.email
                .from_email
                .as_deref()
                .is_some_and(|v| !v.is_empty()),
        );
        status.insert(
            "NOTIFICATION_EMAIL_RECIPIENT",
            self.email
                .recipient
                .as_deref()
                .is_some_and(|v| !v.is_empty()),
        );
        status
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::test_settings;
    use super::*;

    #[test]
    fn env_status_reports_presence_not_values() {
        let settings = test_settings();
        let status = settings.env_status();
        assert_eq!(status["DATABASE_URL"], true);
        assert_eq!(status["MARKET_DATA_API_KEY"], true);
        assert_eq!(status["MT_BRIDGE_URL"], false);
        assert_eq!(status["SENDGRID_API_KEY"], false);
    }

    #[test]
    fn missing_database_url_fails_validation() {
        let mut settings = test_settings();
        settings.database.url.clear();
        assert!(settings.validate().is_err());
    }
}
