use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

const MAX_CONFIG_BYTES: u64 = 1024 * 1024;
const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Weights for the five subscores. Must sum to 1.0 within tolerance.
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub q4: f64,
    pub q5: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self { q1: 0.30, q2: 0.20, q3: 0.25, q4: 0.10, q5: 0.15 }
    }
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.q1 + self.q2 + self.q3 + self.q4 + self.q5
    }
}

/// Funnel re-ranking knobs: how much of the head to inspect and what counts
/// as an oversized equal-score cohort.
#[derive(Debug, Clone, Copy)]
pub struct FunnelConfig {
    pub enabled: bool,
    pub top_k: usize,
    pub threshold: usize,
    pub equal_epsilon: f64,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self { enabled: true, top_k: 1000, threshold: 50, equal_epsilon: 1e-4 }
    }
}

/// Local multi-criteria weights used only inside funneled cohorts.
/// Benefit criteria except `effort`, which is a cost inverted internally.
#[derive(Debug, Clone, Copy)]
pub struct LocalWeights {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub q5: f64,
    pub epss: f64,
    pub occurrences: f64,
    pub confidence: f64,
    pub effort: f64,
}

impl Default for LocalWeights {
    fn default() -> Self {
        Self {
            q1: 0.22,
            q2: 0.18,
            q3: 0.26,
            q5: 0.14,
            epss: 0.08,
            occurrences: 0.06,
            confidence: 0.04,
            effort: 0.02,
        }
    }
}

/// RPI category thresholds, checked from critical downwards.
#[derive(Debug, Clone, Copy)]
pub struct CategoryThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for CategoryThresholds {
    fn default() -> Self {
        Self { critical: 80.0, high: 60.0, medium: 40.0, low: 20.0 }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default)]
pub struct RankConfig {
    pub weights: Weights,
    pub funnel: FunnelConfig,
    pub local_weights: LocalWeights,
    pub thresholds: CategoryThresholds,
    /// Worker threads for the scoring pool. 0 means rayon's default.
    pub threads: usize,
}

impl RankConfig {
    /// Startup validation. A weight table that does not sum to 1.0 is a
    /// configuration error, not a per-record condition.
    pub fn validate(&self) -> Result<()> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            bail!("5Q weights must sum to 1.0, got {sum:.4}");
        }
        if self.funnel.threshold == 0 {
            bail!("funnel threshold must be at least 1");
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        if meta.len() > MAX_CONFIG_BYTES {
            bail!("config file {} exceeds {} bytes", path.display(), MAX_CONFIG_BYTES);
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let file: FileConfig = toml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        let config = file.into_config();
        config.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

// TOML surface: every field optional, merged over the defaults.

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    weights: Option<WeightsFile>,
    funnel: Option<FunnelFile>,
    local_weights: Option<LocalWeightsFile>,
    thresholds: Option<ThresholdsFile>,
    processing: Option<ProcessingFile>,
}

#[derive(Debug, Deserialize)]
struct WeightsFile {
    q1: Option<f64>,
    q2: Option<f64>,
    q3: Option<f64>,
    q4: Option<f64>,
    q5: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FunnelFile {
    enabled: Option<bool>,
    top_k: Option<usize>,
    threshold: Option<usize>,
    equal_epsilon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LocalWeightsFile {
    q1: Option<f64>,
    q2: Option<f64>,
    q3: Option<f64>,
    q5: Option<f64>,
    epss: Option<f64>,
    occurrences: Option<f64>,
    confidence: Option<f64>,
    effort: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ThresholdsFile {
    critical: Option<f64>,
    high: Option<f64>,
    medium: Option<f64>,
    low: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProcessingFile {
    threads: Option<usize>,
}

impl FileConfig {
    fn into_config(self) -> RankConfig {
        let mut config = RankConfig::default();
        if let Some(w) = self.weights {
            config.weights.q1 = w.q1.unwrap_or(config.weights.q1);
            config.weights.q2 = w.q2.unwrap_or(config.weights.q2);
            config.weights.q3 = w.q3.unwrap_or(config.weights.q3);
            config.weights.q4 = w.q4.unwrap_or(config.weights.q4);
            config.weights.q5 = w.q5.unwrap_or(config.weights.q5);
        }
        if let Some(f) = self.funnel {
            config.funnel.enabled = f.enabled.unwrap_or(config.funnel.enabled);
            config.funnel.top_k = f.top_k.unwrap_or(config.funnel.top_k);
            config.funnel.threshold = f.threshold.unwrap_or(config.funnel.threshold);
            config.funnel.equal_epsilon = f.equal_epsilon.unwrap_or(config.funnel.equal_epsilon);
        }
        if let Some(l) = self.local_weights {
            config.local_weights.q1 = l.q1.unwrap_or(config.local_weights.q1);
            config.local_weights.q2 = l.q2.unwrap_or(config.local_weights.q2);
            config.local_weights.q3 = l.q3.unwrap_or(config.local_weights.q3);
            config.local_weights.q5 = l.q5.unwrap_or(config.local_weights.q5);
            config.local_weights.epss = l.epss.unwrap_or(config.local_weights.epss);
            config.local_weights.occurrences =
                l.occurrences.unwrap_or(config.local_weights.occurrences);
            config.local_weights.confidence =
                l.confidence.unwrap_or(config.local_weights.confidence);
            config.local_weights.effort = l.effort.unwrap_or(config.local_weights.effort);
        }
        if let Some(t) = self.thresholds {
            config.thresholds.critical = t.critical.unwrap_or(config.thresholds.critical);
            config.thresholds.high = t.high.unwrap_or(config.thresholds.high);
            config.thresholds.medium = t.medium.unwrap_or(config.thresholds.medium);
            config.thresholds.low = t.low.unwrap_or(config.thresholds.low);
        }
        if let Some(p) = self.processing {
            config.threads = p.threads.unwrap_or(config.threads);
        }
        config
    }
}
