use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::CategoryThresholds;
use crate::model::{RankedFinding, RpiCategory};
use crate::rank::categorize;

/// Aggregate statistics over a ranked batch.
#[derive(Debug, Default, Serialize)]
pub struct RpiStatistics {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub minimal: usize,

    pub max_rpi: f64,
    pub min_rpi: f64,
    pub avg_rpi: f64,
    pub median_rpi: f64,

    pub kev_count: usize,
    pub poc_count: usize,
    pub sla_violations: usize,
    pub verified_count: usize,
    pub dynamic_count: usize,

    pub domain_distribution: BTreeMap<String, usize>,
}

impl RpiStatistics {
    pub fn from_ranked(items: &[RankedFinding], thresholds: &CategoryThresholds) -> Self {
        let mut stats = Self { min_rpi: 100.0, ..Self::default() };
        if items.is_empty() {
            stats.min_rpi = 0.0;
            return stats;
        }
        stats.total = items.len();

        let mut scores: Vec<f64> = Vec::with_capacity(items.len());
        for item in items {
            let rpi = item.scores.rpi;
            scores.push(rpi);
            match categorize(rpi, thresholds) {
                RpiCategory::Critical => stats.critical += 1,
                RpiCategory::High => stats.high += 1,
                RpiCategory::Medium => stats.medium += 1,
                RpiCategory::Low => stats.low += 1,
                RpiCategory::Minimal => stats.minimal += 1,
            }
            if item.scores.has_kev {
                stats.kev_count += 1;
            }
            if item.scores.has_poc {
                stats.poc_count += 1;
            }
            if item.record.violates_sla {
                stats.sla_violations += 1;
            }
            if item.record.verified {
                stats.verified_count += 1;
            }
            if item.record.dynamic_finding {
                stats.dynamic_count += 1;
            }
            *stats
                .domain_distribution
                .entry(item.scores.domain.as_str().to_string())
                .or_default() += 1;
        }

        stats.max_rpi = scores.iter().cloned().fold(f64::MIN, f64::max);
        stats.min_rpi = scores.iter().cloned().fold(f64::MAX, f64::min);
        stats.avg_rpi = scores.iter().sum::<f64>() / scores.len() as f64;
        let mut sorted = scores;
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        stats.median_rpi = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        stats
    }
}

/// Pareto concentration metrics over the ranked list: how much of the total
/// RPI mass the head of the backlog captures.
#[derive(Debug, Serialize)]
pub struct Concentration {
    /// Share of total RPI captured by the top 20% of records.
    pub top20_share: f64,
    /// Smallest prefix reaching 80% of total RPI.
    pub k80: usize,
    /// That prefix as a fraction of the backlog.
    pub k80_fraction: f64,
    pub gini: f64,
    /// RPI share per successive 10% of the ranked list.
    pub decile_shares: Vec<f64>,
}

impl Concentration {
    pub fn from_ranked(items: &[RankedFinding]) -> Self {
        let scores: Vec<f64> = items.iter().map(|i| i.scores.rpi.max(0.0)).collect();
        Self {
            top20_share: top_p_share(&scores, 0.20),
            k80: prefix_for_share(&scores, 0.80).0,
            k80_fraction: prefix_for_share(&scores, 0.80).1,
            gini: gini(&scores),
            decile_shares: decile_shares(&scores),
        }
    }
}

fn sorted_desc(scores: &[f64]) -> Vec<f64> {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted
}

/// Cumulative RPI share captured by the top `p` fraction of the list.
pub fn top_p_share(scores: &[f64], p: f64) -> f64 {
    let sorted = sorted_desc(scores);
    let total: f64 = sorted.iter().sum();
    if sorted.is_empty() || total == 0.0 {
        return 0.0;
    }
    let n_top = ((sorted.len() as f64 * p).ceil() as usize).max(1);
    sorted[..n_top.min(sorted.len())].iter().sum::<f64>() / total
}

/// Smallest k whose cumulative share reaches `target`, with k/N.
pub fn prefix_for_share(scores: &[f64], target: f64) -> (usize, f64) {
    let sorted = sorted_desc(scores);
    let total: f64 = sorted.iter().sum();
    if sorted.is_empty() || total == 0.0 {
        return (0, 0.0);
    }
    let mut cumulative = 0.0;
    for (idx, score) in sorted.iter().enumerate() {
        cumulative += score;
        if cumulative / total >= target {
            return (idx + 1, (idx + 1) as f64 / sorted.len() as f64);
        }
    }
    (sorted.len(), 1.0)
}

/// Gini coefficient of the score distribution via the Lorenz area.
pub fn gini(scores: &[f64]) -> f64 {
    let n = scores.len();
    if n == 0 {
        return 0.0;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    let total: f64 = sorted.iter().sum();
    if total == 0.0 {
        return 0.0;
    }
    let mut cumulative = 0.0;
    let mut lorenz_area = 0.0;
    for score in &sorted {
        cumulative += score;
        lorenz_area += cumulative / total;
    }
    lorenz_area /= n as f64;
    1.0 - 2.0 * (0.5 - (lorenz_area - 0.5))
}

/// Share of total RPI per equal-population decile along the ranked order.
pub fn decile_shares(scores: &[f64]) -> Vec<f64> {
    const DECILES: usize = 10;
    let sorted = sorted_desc(scores);
    let total: f64 = sorted.iter().sum::<f64>().max(1.0);
    let n = sorted.len();
    (0..DECILES)
        .map(|d| {
            let start = (d * n + DECILES / 2) / DECILES;
            let end = ((d + 1) * n + DECILES / 2) / DECILES;
            sorted[start.min(n)..end.min(n)].iter().sum::<f64>() / total
        })
        .collect()
}
