//! Configuration for the adjudication engine.

use serde::{Deserialize, Serialize};
use std::path::Path;

use registry::AdjudicationIssue;

use crate::types::{AdjudicationError, Result};

/// Configuration for the adjudication engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjudicationConfig {
    /// Ticket materializer configuration
    pub materializer: MaterializerConfig,
    /// Resolution engine configuration
    pub resolution: ResolutionConfig,
    /// Notification configuration
    pub notifications: NotificationConfig,
    /// General settings
    pub general: GeneralConfig,
}

impl AdjudicationConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Load config from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            AdjudicationError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&yaml).map_err(|e| {
            AdjudicationError::ConfigError(format!("cannot parse {}: {}", path.display(), e))
        })
    }
}

/// Which match list `score_min` / `score_max` are computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// Every golden-record hit of the anchor individual
    #[default]
    MainGoldenRecord,
    /// Only the anchor's hits that resolved to the ticket's duplicates
    PossibleDuplicates,
}

/// Ticket materializer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterializerConfig {
    /// Source of the ticket score bounds
    pub score_source: ScoreSource,
    /// Link all tickets created in one batch to each other
    pub link_batch_tickets: bool,
    /// Issue type when the request does not name one
    pub default_issue_type: AdjudicationIssue,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            score_source: ScoreSource::MainGoldenRecord,
            link_batch_tickets: true,
            default_issue_type: AdjudicationIssue::BiographicalDataSimilarity,
        }
    }
}

/// Resolution engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Refuse to close while a removed head of household keeps active members
    pub require_head_of_household_reassignment: bool,
    /// Recompute document statuses of individuals cleared as unique
    pub rerun_document_deduplication: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            require_head_of_household_reassignment: true,
            rerun_document_deduplication: true,
        }
    }
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Dispatch ticket events to sinks
    pub enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// General configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AdjudicationConfig::default();
        assert_eq!(config.materializer.score_source, ScoreSource::MainGoldenRecord);
        assert!(config.materializer.link_batch_tickets);
        assert!(config.resolution.require_head_of_household_reassignment);
        assert!(config.notifications.enabled);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "materializer:\n  score_source: possible_duplicates\n";
        let config = AdjudicationConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.materializer.score_source, ScoreSource::PossibleDuplicates);
        assert!(config.materializer.link_batch_tickets);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = AdjudicationConfig::default();
        config.notifications.enabled = false;
        let yaml = config.to_yaml().unwrap();
        let parsed = AdjudicationConfig::from_yaml(&yaml).unwrap();
        assert!(!parsed.notifications.enabled);
    }
}
