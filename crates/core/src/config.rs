use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `ADPILOT__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
}

/// Tunables for the Campaign Automation Controller. The threshold defaults
/// encode current product policy; operators override them per deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct AutomationConfig {
    /// Daily spend at or above which the controller stops acting and lets
    /// the platform's own budget cap govern the campaign.
    #[serde(default = "default_spend_threshold")]
    pub spend_threshold: f64,
    /// Remaining click capacity at or below which an active campaign is
    /// paused.
    #[serde(default = "default_low_capacity")]
    pub low_capacity: u64,
    /// Remaining click capacity at or above which a paused campaign is
    /// activated.
    #[serde(default = "default_high_capacity")]
    pub high_capacity: u64,
    /// Period of the per-campaign repeating monitor.
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,
    /// Period of the global all-campaigns sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Period of the global empty-capacity sweep.
    #[serde(default = "default_empty_capacity_interval_secs")]
    pub empty_capacity_interval_secs: u64,
}

/// Ad platform client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// "rest" for the live platform API, "simulated" for development.
    #[serde(default = "default_platform_mode")]
    pub mode: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Failure-injection rate for the simulated client (0.0 disables).
    #[serde(default)]
    pub simulated_fail_rate: f64,
}

// Default functions
fn default_node_id() -> String {
    "adpilot-01".to_string()
}
fn default_spend_threshold() -> f64 {
    10.0
}
fn default_low_capacity() -> u64 {
    5_000
}
fn default_high_capacity() -> u64 {
    15_000
}
fn default_monitor_interval_secs() -> u64 {
    60
}
fn default_sweep_interval_secs() -> u64 {
    300
}
fn default_empty_capacity_interval_secs() -> u64 {
    180
}
fn default_platform_mode() -> String {
    "simulated".to_string()
}
fn default_base_url() -> String {
    "https://api.adplatform.example/v2".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            spend_threshold: default_spend_threshold(),
            low_capacity: default_low_capacity(),
            high_capacity: default_high_capacity(),
            monitor_interval_secs: default_monitor_interval_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            empty_capacity_interval_secs: default_empty_capacity_interval_secs(),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            mode: default_platform_mode(),
            base_url: default_base_url(),
            api_token: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
            simulated_fail_rate: 0.0,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            automation: AutomationConfig::default(),
            platform: PlatformConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("ADPILOT")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy() {
        let cfg = AutomationConfig::default();
        assert_eq!(cfg.spend_threshold, 10.0);
        assert_eq!(cfg.low_capacity, 5_000);
        assert_eq!(cfg.high_capacity, 15_000);
        assert!(cfg.low_capacity < cfg.high_capacity);
        assert_eq!(cfg.monitor_interval_secs, 60);
    }
}
