//! Secondary local re-ranking for oversized equal-score cohorts.
//!
//! The primary score is too coarse when many findings land on the same
//! rounded RPI (commonly a wall of SLA-violated records pinned at the
//! override floor). When such a cohort appears in the head of the list, it
//! is reordered locally using coarse priority buckets plus a multi-criteria
//! closeness score, without touching any record outside the cohort.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::{FunnelConfig, LocalWeights};
use crate::model::RankedFinding;
use crate::tiebreak::parse_effort;

/// Effort cost assumed when the field is missing or unrecognized.
const NEUTRAL_EFFORT: f64 = 5.0;

/// Coarse cohort priority class. Lower ranks first.
fn cohort_bucket(item: &RankedFinding) -> u8 {
    if item.record.violates_sla {
        0
    } else if item.scores.has_kev {
        1
    } else if item.scores.has_poc {
        2
    } else if item.scores.epss_percentile >= 90.0 {
        3
    } else if item.scores.q2_exposure >= 80.0 && item.scores.q3_impact >= 80.0 {
        4
    } else {
        5
    }
}

/// TOPSIS-style closeness coefficient in [0,1] for a single cohort member.
///
/// Criteria are normalized against fixed global bounds (scores and EPSS
/// percentile over [0,100], confidence over [0,1], occurrences and effort
/// against per-item caps) so a member's closeness does not depend on which
/// other records happen to share its cohort.
fn closeness(item: &RankedFinding, weights: &LocalWeights) -> f64 {
    let scores = &item.scores;
    let record = &item.record;

    let occurrences = record.nb_occurences as f64;
    let occ_cap = 1.0 + occurrences.min(1e6);
    let confidence = record.scanner_confidence.unwrap_or(0.0);
    let effort = parse_effort(record.effort_for_fixing.as_deref()).unwrap_or(NEUTRAL_EFFORT);
    let effort_cap = effort.max(1.0);

    let weighted = [
        weights.q1 * (scores.q1_exploitability / 100.0),
        weights.q2 * (scores.q2_exposure / 100.0),
        weights.q3 * (scores.q3_impact / 100.0),
        weights.q5 * (scores.q5_urgency / 100.0),
        weights.epss * (scores.epss_percentile / 100.0),
        weights.occurrences * (occurrences.min(occ_cap) / occ_cap),
        weights.confidence * confidence.clamp(0.0, 1.0),
        // Cost criterion inverted into a benefit.
        weights.effort * (1.0 - effort.min(effort_cap) / effort_cap),
    ];

    let d_plus: f64 = weighted.iter().map(|w| (1.0 - w).powi(2)).sum::<f64>().sqrt();
    let d_minus: f64 = weighted.iter().map(|w| w.powi(2)).sum::<f64>().sqrt();
    if d_plus + d_minus == 0.0 {
        return 0.0;
    }
    d_minus / (d_plus + d_minus)
}

/// Re-rank the largest qualifying equal-RPI cohort in the head of the list.
///
/// A cohort qualifies when its members share an RPI rounded to 2 decimals,
/// its size reaches the configured threshold, and its true score spread is
/// within epsilon. Only the chosen cohort's internal order changes; its
/// members stay in their original list positions, and everything else keeps
/// its relative order. Returns the size of the reordered cohort.
pub fn apply_funnel(
    items: &mut [RankedFinding],
    funnel: &FunnelConfig,
    weights: &LocalWeights,
) -> Option<usize> {
    if !funnel.enabled || items.is_empty() {
        return None;
    }
    let head = items.len().min(funnel.top_k);

    // BTreeMap keeps candidate selection deterministic when two qualifying
    // groups have the same size.
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, item) in items[..head].iter().enumerate() {
        let key = (item.scores.rpi * 100.0).round() as i64;
        groups.entry(key).or_default().push(idx);
    }

    let mut candidate: Option<Vec<usize>> = None;
    for indices in groups.into_values() {
        if indices.len() < funnel.threshold {
            continue;
        }
        let scores: Vec<f64> = indices.iter().map(|&i| items[i].scores.rpi).collect();
        let spread = scores.iter().cloned().fold(f64::MIN, f64::max)
            - scores.iter().cloned().fold(f64::MAX, f64::min);
        if spread > funnel.equal_epsilon {
            continue;
        }
        if candidate.as_ref().map_or(true, |c| indices.len() > c.len()) {
            candidate = Some(indices);
        }
    }
    let positions = candidate?;
    debug!(cohort = positions.len(), head, "funnel cohort selected");

    let mut block: Vec<(u8, f64, RankedFinding)> = positions
        .iter()
        .map(|&i| {
            let member = items[i].clone();
            (cohort_bucket(&member), closeness(&member, weights), member)
        })
        .collect();
    block.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| b.1.total_cmp(&a.1))
            .then_with(|| a.2.key.cmp(&b.2.key))
    });
    let size = block.len();
    for ((_, _, member), &position) in block.into_iter().zip(positions.iter()) {
        items[position] = member;
    }
    info!(cohort = size, "funnel re-ranking applied");
    Some(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Domain, FindingRecord, RpiCategory, ScoreSet, ThreatTier};
    use crate::tiebreak::TieBreakKey;
    use serde_json::json;

    fn item(id: &str, rpi: f64) -> RankedFinding {
        let record = FindingRecord::from_json(
            json!({"title": id, "unique_id_from_tool": id}),
            0,
        );
        let scores = ScoreSet {
            q1_exploitability: 50.0,
            q2_exposure: 50.0,
            q3_impact: 50.0,
            q4_fixability: 50.0,
            q5_urgency: 50.0,
            rpi,
            domain: Domain::General,
            is_runtime: true,
            has_kev: false,
            has_poc: false,
            epss_score: 0.0,
            epss_percentile: 0.0,
            threat_tier: ThreatTier::None,
        };
        let key = TieBreakKey::build(&record, &scores);
        RankedFinding { record, scores, key, rank: 0, category: RpiCategory::Medium }
    }

    fn funnel_config(threshold: usize) -> FunnelConfig {
        FunnelConfig { enabled: true, top_k: 1000, threshold, equal_epsilon: 1e-4 }
    }

    #[test]
    fn no_cohort_below_threshold() {
        let mut items = vec![item("a", 85.0), item("b", 85.0), item("c", 70.0)];
        let moved = apply_funnel(&mut items, &funnel_config(5), &LocalWeights::default());
        assert!(moved.is_none());
        assert_eq!(items[0].record.stable_id(), "a");
    }

    #[test]
    fn reorders_only_the_cohort() {
        // d/e (distinct scores) must keep their positions around the cohort.
        let mut items = vec![item("d", 90.0)];
        for id in ["c3", "c1", "c2"] {
            items.push(item(id, 85.0));
        }
        items.push(item("e", 60.0));
        // Give c2 a KEV signal so bucket ordering pulls it first.
        items[3].scores.has_kev = true;
        items[3].key = TieBreakKey::build(&items[3].record, &items[3].scores);

        let moved = apply_funnel(&mut items, &funnel_config(3), &LocalWeights::default());
        assert_eq!(moved, Some(3));
        assert_eq!(items[0].record.stable_id(), "d");
        assert_eq!(items[4].record.stable_id(), "e");
        assert_eq!(items[1].record.stable_id(), "c2");
        // Remaining cohort members fall back to tie-break order.
        assert_eq!(items[2].record.stable_id(), "c1");
        assert_eq!(items[3].record.stable_id(), "c3");
    }

    #[test]
    fn disabled_funnel_is_inert() {
        let mut items: Vec<_> = (0..10).map(|i| item(&format!("r{i}"), 85.0)).collect();
        let config = FunnelConfig { enabled: false, ..funnel_config(3) };
        assert!(apply_funnel(&mut items, &config, &LocalWeights::default()).is_none());
    }

    #[test]
    fn spread_beyond_epsilon_disqualifies() {
        let mut items = vec![item("a", 85.001), item("b", 84.999), item("c", 85.0)];
        // All round to 85.00 but the spread exceeds the tight epsilon.
        let config = FunnelConfig { equal_epsilon: 1e-6, ..funnel_config(3) };
        assert!(apply_funnel(&mut items, &config, &LocalWeights::default()).is_none());
    }

    #[test]
    fn closeness_prefers_stronger_criteria() {
        let strong = {
            let mut it = item("s", 85.0);
            it.scores.q3_impact = 95.0;
            it.scores.epss_percentile = 99.0;
            it
        };
        let weak = item("w", 85.0);
        let w = LocalWeights::default();
        assert!(closeness(&strong, &w) > closeness(&weak, &w));
    }
}
