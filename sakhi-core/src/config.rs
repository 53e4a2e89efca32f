//! Configuration types

use crate::{ConfigError, SakhiError, SakhiResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Master configuration for the conversation core.
///
/// Every tunable the pipeline consults lives here; components receive the
/// config by reference and never read literals of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionConfig {
    /// Minimum confidence for a language-detection result to be accepted.
    pub confidence_threshold: f32,
    /// Fraction of alphanumeric characters that must fall inside a script
    /// block for the heuristic stage to claim that language.
    pub script_ratio_threshold: f32,
    /// Fixed confidence reported when the script heuristic fires.
    pub native_script_confidence: f32,
    /// Number of facts retrieved per message.
    pub retrieval_top_k: usize,
    /// Number of history turns loaded into the prompt.
    pub history_window: usize,
    /// Number of trailing history turns the extractor sees for
    /// pronoun/reference resolution.
    pub extraction_history_turns: usize,
    /// Daily call cap for the heavy (extraction) tier.
    pub heavy_tier_cap: u32,
    /// Daily call cap for the light (conversation) tier.
    pub light_tier_cap: u32,
    /// Upper bound on any single external-service call. A timeout follows
    /// the same degradation path as a hard provider failure.
    pub llm_timeout: Duration,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            script_ratio_threshold: 0.3,
            native_script_confidence: 0.95,
            retrieval_top_k: 5,
            history_window: 10,
            extraction_history_turns: 3,
            heavy_tier_cap: 1_000,
            light_tier_cap: 14_000,
            llm_timeout: Duration::from_secs(30),
        }
    }
}

impl CompanionConfig {
    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(SakhiError::Config) if invalid.
    pub fn validate(&self) -> SakhiResult<()> {
        for (field, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("script_ratio_threshold", self.script_ratio_threshold),
            ("native_script_confidence", self.native_script_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SakhiError::Config(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: "must be between 0.0 and 1.0".to_string(),
                }));
            }
        }

        if self.retrieval_top_k == 0 {
            return Err(SakhiError::Config(ConfigError::InvalidValue {
                field: "retrieval_top_k".to_string(),
                value: self.retrieval_top_k.to_string(),
                reason: "must be greater than 0".to_string(),
            }));
        }

        if self.history_window == 0 {
            return Err(SakhiError::Config(ConfigError::InvalidValue {
                field: "history_window".to_string(),
                value: self.history_window.to_string(),
                reason: "must be greater than 0".to_string(),
            }));
        }

        if self.heavy_tier_cap == 0 || self.light_tier_cap == 0 {
            return Err(SakhiError::Config(ConfigError::InvalidValue {
                field: "tier caps".to_string(),
                value: format!("heavy={} light={}", self.heavy_tier_cap, self.light_tier_cap),
                reason: "daily caps must be greater than 0".to_string(),
            }));
        }

        if self.llm_timeout.is_zero() {
            return Err(SakhiError::Config(ConfigError::InvalidValue {
                field: "llm_timeout".to_string(),
                value: format!("{:?}", self.llm_timeout),
                reason: "llm_timeout must be positive".to_string(),
            }));
        }

        Ok(())
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `SAKHI_CONFIDENCE_THRESHOLD`: detection acceptance threshold (default: 0.7)
    /// - `SAKHI_RETRIEVAL_TOP_K`: facts retrieved per message (default: 5)
    /// - `SAKHI_HISTORY_WINDOW`: history turns in the prompt (default: 10)
    /// - `SAKHI_HEAVY_TIER_CAP`: heavy tier daily cap (default: 1000)
    /// - `SAKHI_LIGHT_TIER_CAP`: light tier daily cap (default: 14000)
    /// - `SAKHI_LLM_TIMEOUT_SECS`: external call timeout (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            confidence_threshold: std::env::var("SAKHI_CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.confidence_threshold),
            retrieval_top_k: std::env::var("SAKHI_RETRIEVAL_TOP_K")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retrieval_top_k),
            history_window: std::env::var("SAKHI_HISTORY_WINDOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.history_window),
            heavy_tier_cap: std::env::var("SAKHI_HEAVY_TIER_CAP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.heavy_tier_cap),
            light_tier_cap: std::env::var("SAKHI_LIGHT_TIER_CAP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.light_tier_cap),
            llm_timeout: std::env::var("SAKHI_LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.llm_timeout),
            ..defaults
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CompanionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval_top_k, 5);
        assert_eq!(config.history_window, 10);
        assert!((config.confidence_threshold - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let config = CompanionConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let config = CompanionConfig {
            retrieval_top_k: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_caps() {
        let config = CompanionConfig {
            light_tier_cap: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = CompanionConfig {
            llm_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
