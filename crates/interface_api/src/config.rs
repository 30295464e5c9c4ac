//! API configuration

use serde::Deserialize;
use std::time::Duration;

use domain_claims::adapters::HttpServicesConfig;
use domain_claims::WorkflowSettings;

/// API configuration
///
/// Every field can be set from an `API_`-prefixed environment variable
/// (`API_PORT`, `API_SERVICES_BASE_URL`, ...); unset fields keep their default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Base URL of the damage, estimate and review services
    pub services_base_url: String,
    /// Per-request timeout for those services
    pub services_timeout_secs: u64,
    /// JSON file backing the claim sessions
    pub store_path: String,
    /// Log level
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    pub analysis_timeout_secs: u64,
    pub automated_settle_delay_ms: u64,
    pub stage_gap_delay_ms: u64,
    pub handoff_delay_ms: u64,
    pub max_image_bytes: u64,
    pub policy_number: String,
    pub accident_description: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let workflow = WorkflowSettings::default();
        let services = HttpServicesConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            services_base_url: services.base_url,
            services_timeout_secs: services.timeout.as_secs(),
            store_path: "data/claims.json".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            analysis_timeout_secs: workflow.analysis_timeout.as_secs(),
            automated_settle_delay_ms: workflow.automated_settle_delay.as_millis() as u64,
            stage_gap_delay_ms: workflow.stage_gap_delay.as_millis() as u64,
            handoff_delay_ms: workflow.handoff_delay.as_millis() as u64,
            max_image_bytes: workflow.max_image_bytes,
            policy_number: workflow.policy_number,
            accident_description: workflow.accident_description,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings handed to every claim workflow
    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            analysis_timeout: Duration::from_secs(self.analysis_timeout_secs),
            automated_settle_delay: Duration::from_millis(self.automated_settle_delay_ms),
            stage_gap_delay: Duration::from_millis(self.stage_gap_delay_ms),
            handoff_delay: Duration::from_millis(self.handoff_delay_ms),
            max_image_bytes: self.max_image_bytes,
            policy_number: self.policy_number.clone(),
            accident_description: self.accident_description.clone(),
        }
    }

    pub fn services_config(&self) -> HttpServicesConfig {
        HttpServicesConfig {
            base_url: self.services_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.services_timeout_secs),
        }
    }

    /// Largest request body accepted, leaving room above the image limit
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_image_bytes)
            .unwrap_or(usize::MAX)
            .saturating_add(64 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_workflow_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.workflow_settings(), WorkflowSettings::default());
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_services_config_strips_trailing_slash() {
        let config = ApiConfig {
            services_base_url: "http://claims.internal:8000/".to_string(),
            services_timeout_secs: 5,
            ..ApiConfig::default()
        };
        let services = config.services_config();
        assert_eq!(services.base_url, "http://claims.internal:8000");
        assert_eq!(services.timeout, Duration::from_secs(5));
    }
}
