//! Workflow timing and intake limits

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default upper bound for an uploaded image
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Tunables for one claim workflow
///
/// The delays model processing time between automated steps; they are
/// plain `tokio::time::sleep` calls and can be zeroed for tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Upper bound on the damage-analysis call
    pub analysis_timeout: Duration,
    /// Wait before an automated pipeline starts analysing
    pub automated_settle_delay: Duration,
    /// Wait between damage analysis and estimate generation
    pub stage_gap_delay: Duration,
    /// Wait before control moves to the approval stage
    pub handoff_delay: Duration,
    pub max_image_bytes: u64,
    /// Contextual metadata sent with every analysis request
    pub policy_number: String,
    pub accident_description: String,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            analysis_timeout: Duration::from_secs(10),
            automated_settle_delay: Duration::from_secs(5),
            stage_gap_delay: Duration::from_secs(2),
            handoff_delay: Duration::from_secs(1),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            policy_number: "POL-12345".to_string(),
            accident_description: "Front-end collision".to_string(),
        }
    }
}

impl WorkflowSettings {
    /// Default settings without any deliberate delays
    pub fn immediate() -> Self {
        Self {
            automated_settle_delay: Duration::ZERO,
            stage_gap_delay: Duration::ZERO,
            handoff_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: u64) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }
}
