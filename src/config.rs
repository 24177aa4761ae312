use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub line_item_options: LineItemOptionsConfig,
    #[serde(default)]
    pub address: AddressConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote checkout gateway connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Storefront base URL (e.g. "https://shop.example.com")
    pub base_url: String,
    /// Name of the environment variable holding an API token, if the store needs one
    #[serde(default)]
    pub api_token_env: Option<String>,
    /// Transport timeout in seconds for each gateway call (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

/// Capabilities that toggle optional wizard behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    /// Require a delivery date on every item before it counts as configured
    #[serde(default)]
    pub delivery_dates_enabled: bool,
    /// Allow a gift message per item; disables auto-advance so one can be added
    #[serde(default)]
    pub gift_messages_enabled: bool,
    /// Pick the platform's recommended shipping option as soon as an address is accepted
    #[serde(default)]
    pub auto_recommend_option: bool,
    /// Re-create consignments the platform evicted, from the local cache
    #[serde(default = "default_resurrect")]
    pub resurrect_from_cache: bool,
}

fn default_resurrect() -> bool {
    true
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            delivery_dates_enabled: false,
            gift_messages_enabled: false,
            auto_recommend_option: false,
            resurrect_from_cache: default_resurrect(),
        }
    }
}

/// Product option ids used to carry per-item data on cart line items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemOptionsConfig {
    #[serde(default = "default_delivery_date_option")]
    pub delivery_date_option_id: String,
    #[serde(default = "default_gift_message_option")]
    pub gift_message_option_id: String,
}

fn default_delivery_date_option() -> String {
    "delivery_date".to_string()
}

fn default_gift_message_option() -> String {
    "gift_message".to_string()
}

impl Default for LineItemOptionsConfig {
    fn default() -> Self {
        Self {
            delivery_date_option_id: default_delivery_date_option(),
            gift_message_option_id: default_gift_message_option(),
        }
    }
}

/// Address completeness requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressConfig {
    /// Wire names of fields that must be non-empty
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<String>,
}

fn default_required_fields() -> Vec<String> {
    [
        "firstName",
        "lastName",
        "address1",
        "city",
        "countryCode",
        "postalCode",
    ]
    .iter()
    .map(|f| (*f).to_string())
    .collect()
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            required_fields: default_required_fields(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory for the consignment cache and logs
    pub state: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to log to a file under the state directory (false = stderr)
    #[serde(default = "default_log_to_file")]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_to_file() -> bool {
    false
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: default_log_to_file(),
        }
    }
}

impl Config {
    /// Path to the project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".multiship/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so the tool works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let project_config = Self::project_config_path();
        if project_config.exists() {
            builder = builder.add_source(config::File::from(project_config));
        }

        // User config in ~/.config/multiship/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("multiship").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with MULTISHIP_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("MULTISHIP")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to .multiship/config.toml
    pub fn save(&self) -> Result<()> {
        let config_path = Self::project_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(&config_path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }

    /// Get path to the consignment cache file for a checkout
    pub fn cache_path(&self, checkout_id: &str) -> PathBuf {
        let safe: String = checkout_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.state_path()
            .join("consignments")
            .join(format!("{}.json", safe))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                base_url: "http://localhost:3000".to_string(),
                api_token_env: None,
                timeout_secs: default_timeout(),
            },
            features: FeaturesConfig::default(),
            line_item_options: LineItemOptionsConfig::default(),
            address: AddressConfig::default(),
            paths: PathsConfig {
                state: ".multiship".to_string(),
            },
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.features.delivery_dates_enabled);
        assert!(!config.features.auto_recommend_option);
        assert!(config.features.resurrect_from_cache);
        assert_eq!(config.gateway.timeout_secs, 30);
        assert!(config
            .address
            .required_fields
            .contains(&"postalCode".to_string()));
    }

    #[test]
    fn test_partial_toml_uses_field_defaults() {
        let toml_str = r#"
            [gateway]
            base_url = "https://shop.example.com"

            [features]
            delivery_dates_enabled = true

            [paths]
            state = "/tmp/multiship"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.features.delivery_dates_enabled);
        assert!(config.features.resurrect_from_cache);
        assert_eq!(
            config.line_item_options.delivery_date_option_id,
            "delivery_date"
        );
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_cache_path_is_sanitized() {
        let mut config = Config::default();
        config.paths.state = "/tmp/ms".to_string();
        assert_eq!(
            config.cache_path("abc/../d e"),
            PathBuf::from("/tmp/ms/consignments/abc____d_e.json")
        );
    }

    #[test]
    fn test_logs_path_under_state() {
        let mut config = Config::default();
        config.paths.state = "/var/lib/multiship".to_string();
        assert_eq!(config.logs_path(), PathBuf::from("/var/lib/multiship/logs"));
    }
}
