use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub credentials: CredentialsConfig,
    pub poll: PollConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Cognito InitiateAuth endpoint for the vendor's user pool.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Timeout for authenticated vendor calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Timeout for the pre-flight reachability check.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    pub device_gid: u64,
    /// Sampling granularity, e.g. "1S".
    #[serde(default = "default_scale")]
    pub scale: String,
    #[serde(default = "default_unit")]
    pub unit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.emporiaenergy.com".into()
}

fn default_auth_url() -> String {
    "https://cognito-idp.us-east-2.amazonaws.com/".into()
}

fn default_client_id() -> String {
    "4qte47jbstod8apnfic0bunmrq".into()
}

fn default_request_timeout_secs() -> u64 {
    25
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_scale() -> String {
    "1S".into()
}

fn default_unit() -> String {
    "KilowattHours".into()
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from file with environment variable substitution.
    pub fn load() -> Result<Self> {
        let config_path =
            env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.yaml".to_string());

        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;

        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let expanded = substitute_env_vars(raw)?;
        serde_yaml::from_str(&expanded).context("Failed to parse config YAML")
    }
}

/// Substitute environment variables in format $(VAR_NAME)
fn substitute_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex::Regex::new(r"\$\(([A-Z_]+)\)").unwrap();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let var_value = env::var(var_name)
            .with_context(|| format!("Environment variable {} not set", var_name))?;
        result = result.replace(&format!("$({})", var_name), &var_value);
    }

    Ok(result)
}
