use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub trend: TrendConfig,
    pub anomaly: AnomalyConfig,
    pub summary: SummaryConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Slope (score units per observation) below which a trend is stable.
    pub direction_epsilon: f64,
    /// `|slope|` at or above this is at least moderate.
    pub moderate_slope: f64,
    /// `|slope|` at or above this is strong.
    pub strong_slope: f64,
    /// Sample count at which confidence stops being discounted for size.
    pub full_confidence_samples: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            direction_epsilon: 0.5,
            moderate_slope: 2.0,
            strong_slope: 5.0,
            full_confidence_samples: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub z_threshold: f64,
    pub min_samples: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_threshold: 2.0,
            min_samples: 5,
        }
    }
}

/// Weights and windows for the dashboard roll-up.
///
/// `data_quality = 100 * (density_weight * density + recency_weight * recency)`
/// where density is logs per goal over `target_logs_per_goal` (capped at 1)
/// and recency is the share of goals logged within `recency_days`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub recent_window: usize,
    pub recency_days: i64,
    pub target_logs_per_goal: f64,
    pub density_weight: f64,
    pub recency_weight: f64,
    pub activity_days: usize,
    pub struggling_threshold: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            recent_window: 5,
            recency_days: 14,
            target_logs_per_goal: 10.0,
            density_weight: 0.5,
            recency_weight: 0.5,
            activity_days: 30,
            struggling_threshold: 60.0,
        }
    }
}

impl AnalyticsConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw).context("invalid analytics config")?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&raw)
    }
}
