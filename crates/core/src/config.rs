//! Detection configuration with configurable thresholds
//!
//! All thresholds are configurable via file/env, not hardcoded.
//! The minimum-history requirements of the individual detectors are
//! deliberately different (each needs a different sample size to be
//! meaningful) but they are all named HERE, in one place.

use crate::signal::Severity;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-severity confidence table used by the rule and statistical detectors.
///
/// Tier confidences are fixed values, not a function of the measured
/// deviation: a critical rule signal always carries the critical confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierConfidence {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl TierConfidence {
    pub fn for_severity(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }
}

impl Default for TierConfidence {
    fn default() -> Self {
        Self {
            low: 0.6,
            medium: 0.7,
            high: 0.85,
            critical: 0.95,
        }
    }
}

/// Severity weight table for the composite 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl ScoreWeights {
    pub fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            low: 10.0,
            medium: 25.0,
            high: 50.0,
            critical: 80.0,
        }
    }
}

/// Weights for the longitudinal member risk blend.
/// The blended result is clamped to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LongitudinalWeights {
    pub alert_rate: f64,
    pub critical_fraction: f64,
    pub high_fraction: f64,
    pub unreviewed_fraction: f64,
}

impl Default for LongitudinalWeights {
    fn default() -> Self {
        Self {
            alert_rate: 0.4,
            critical_fraction: 0.25,
            high_fraction: 0.2,
            unreviewed_fraction: 0.15,
        }
    }
}

/// Configuration for the detection pipeline.
///
/// All thresholds can be overridden via config file. Defaults are
/// conservative (stricter limits).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    // === Rule-based detector ===
    /// Amount z-score (vs member profile) that triggers the rule
    #[serde(default = "default_zscore_threshold")]
    pub zscore_threshold: f64,

    /// Business hours window [open, close)
    #[serde(default = "default_business_open_hour")]
    pub business_open_hour: u32,
    #[serde(default = "default_business_close_hour")]
    pub business_close_hour: u32,

    /// Hours before this are treated as high-severity off-hours
    #[serde(default = "default_early_morning_end")]
    pub early_morning_end: u32,
    /// Hours at or after this are treated as high-severity off-hours
    #[serde(default = "default_late_night_start")]
    pub late_night_start: u32,

    /// Withdrawal count within the velocity window that triggers the rule
    #[serde(default = "default_rapid_withdrawal_count")]
    pub rapid_withdrawal_count: usize,
    #[serde(default = "default_rapid_withdrawal_window_minutes")]
    pub rapid_withdrawal_window_minutes: i64,

    /// Large transaction threshold (anchors the layering rule)
    #[serde(default = "default_large_tx_threshold")]
    pub large_tx_threshold: Decimal,

    /// Layering: withdrawal >= this fraction of a prior deposit
    #[serde(default = "default_layering_withdrawal_fraction")]
    pub layering_withdrawal_fraction: f64,
    /// Layering: the prior deposit must be >= this fraction of large_tx_threshold
    #[serde(default = "default_layering_deposit_fraction")]
    pub layering_deposit_fraction: f64,
    #[serde(default = "default_layering_window_hours")]
    pub layering_window_hours: i64,

    // === Minimum history (named once, deliberately divergent) ===
    #[serde(default = "default_min_history_statistical")]
    pub min_history_statistical: usize,
    #[serde(default = "default_min_history_behavioral")]
    pub min_history_behavioral: usize,
    #[serde(default = "default_min_peer_group")]
    pub min_peer_group: usize,

    // === Statistical detector ===
    /// Trailing-24h volume above this multiple of the 30-day daily average
    /// counts as a system-wide spike
    #[serde(default = "default_volume_spike_multiplier")]
    pub volume_spike_multiplier: f64,

    // === Peer comparison ===
    /// Peers are members whose mean amount is within this fraction
    #[serde(default = "default_peer_similarity_fraction")]
    pub peer_similarity_fraction: f64,
    /// Subject risk must exceed this multiple of the peer average
    #[serde(default = "default_peer_risk_multiplier")]
    pub peer_risk_multiplier: f64,
    /// Absolute risk floor below which the peer detector never fires
    #[serde(default = "default_peer_risk_floor")]
    pub peer_risk_floor: f64,

    // === Scoring ===
    #[serde(default)]
    pub tier_confidence: TierConfidence,
    #[serde(default)]
    pub score_weights: ScoreWeights,
    /// Composite score at or above this holds the transaction
    #[serde(default = "default_hold_threshold")]
    pub hold_threshold: f64,
    #[serde(default)]
    pub longitudinal: LongitudinalWeights,
}

// Default value functions for serde
fn default_zscore_threshold() -> f64 {
    2.5
}

fn default_business_open_hour() -> u32 {
    8
}

fn default_business_close_hour() -> u32 {
    18
}

fn default_early_morning_end() -> u32 {
    5
}

fn default_late_night_start() -> u32 {
    22
}

fn default_rapid_withdrawal_count() -> usize {
    3
}

fn default_rapid_withdrawal_window_minutes() -> i64 {
    60
}

fn default_large_tx_threshold() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_layering_withdrawal_fraction() -> f64 {
    0.8
}

fn default_layering_deposit_fraction() -> f64 {
    0.5
}

fn default_layering_window_hours() -> i64 {
    24
}

fn default_min_history_statistical() -> usize {
    5
}

fn default_min_history_behavioral() -> usize {
    10
}

fn default_min_peer_group() -> usize {
    3
}

fn default_volume_spike_multiplier() -> f64 {
    2.0
}

fn default_peer_similarity_fraction() -> f64 {
    0.5
}

fn default_peer_risk_multiplier() -> f64 {
    2.0
}

fn default_peer_risk_floor() -> f64 {
    0.5
}

fn default_hold_threshold() -> f64 {
    50.0
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            zscore_threshold: default_zscore_threshold(),
            business_open_hour: default_business_open_hour(),
            business_close_hour: default_business_close_hour(),
            early_morning_end: default_early_morning_end(),
            late_night_start: default_late_night_start(),
            rapid_withdrawal_count: default_rapid_withdrawal_count(),
            rapid_withdrawal_window_minutes: default_rapid_withdrawal_window_minutes(),
            large_tx_threshold: default_large_tx_threshold(),
            layering_withdrawal_fraction: default_layering_withdrawal_fraction(),
            layering_deposit_fraction: default_layering_deposit_fraction(),
            layering_window_hours: default_layering_window_hours(),
            min_history_statistical: default_min_history_statistical(),
            min_history_behavioral: default_min_history_behavioral(),
            min_peer_group: default_min_peer_group(),
            volume_spike_multiplier: default_volume_spike_multiplier(),
            peer_similarity_fraction: default_peer_similarity_fraction(),
            peer_risk_multiplier: default_peer_risk_multiplier(),
            peer_risk_floor: default_peer_risk_floor(),
            tier_confidence: TierConfidence::default(),
            score_weights: ScoreWeights::default(),
            hold_threshold: default_hold_threshold(),
            longitudinal: LongitudinalWeights::default(),
        }
    }
}

impl DetectionConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DetectionConfig::default();

        assert_eq!(config.zscore_threshold, 2.5);
        assert_eq!(config.business_open_hour, 8);
        assert_eq!(config.business_close_hour, 18);
        assert_eq!(config.rapid_withdrawal_count, 3);
        assert_eq!(config.large_tx_threshold, Decimal::new(10_000, 0));
        assert_eq!(config.min_history_statistical, 5);
        assert_eq!(config.min_history_behavioral, 10);
        assert_eq!(config.min_peer_group, 3);
        assert_eq!(config.hold_threshold, 50.0);
    }

    #[test]
    fn test_score_weight_table() {
        let weights = ScoreWeights::default();
        assert_eq!(weights.weight(Severity::Low), 10.0);
        assert_eq!(weights.weight(Severity::Medium), 25.0);
        assert_eq!(weights.weight(Severity::High), 50.0);
        assert_eq!(weights.weight(Severity::Critical), 80.0);
    }

    #[test]
    fn test_critical_tier_confidence_floor() {
        // Every critical rule signal must carry confidence >= 0.9
        let tiers = TierConfidence::default();
        assert!(tiers.for_severity(Severity::Critical) >= 0.9);
    }

    #[test]
    fn test_longitudinal_weights_sum_to_one() {
        let w = LongitudinalWeights::default();
        let sum = w.alert_rate + w.critical_fraction + w.high_fraction + w.unreviewed_fraction;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_config_partial_json() {
        // Missing fields fall back to defaults
        let json = r#"{ "zscore_threshold": 3.0, "large_tx_threshold": "5000" }"#;
        let config: DetectionConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.zscore_threshold, 3.0);
        assert_eq!(config.large_tx_threshold, Decimal::new(5_000, 0));
        assert_eq!(config.min_history_behavioral, 10); // default
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = DetectionConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("hold_threshold"));

        let parsed: DetectionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.hold_threshold, config.hold_threshold);
        assert_eq!(parsed.score_weights, config.score_weights);
    }
}
