use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::{FindingRecord, ScoreSet};

/// Neutral defaults for missing tie-break inputs. Chosen so absence sorts a
/// record behind any record that carries the signal.
const DEFAULT_SLA_DAYS: f64 = 999_999.0;
const DEFAULT_SLA_DEADLINE: &str = "9999-12-31";
const DEFAULT_CONFIDENCE: f64 = 0.5;
const DEFAULT_EFFORT: f64 = 999_999.0;

/// Deterministic ordering key compared field by field in declaration order.
///
/// Heterogeneous tuple comparison is deliberately avoided: every field has
/// its own type and its own direction, applied explicitly in `cmp`. The
/// trailing stable id makes the order total across records whose signal
/// fields all coincide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieBreakKey {
    pub violates_sla: bool,
    pub sla_days_remaining: f64,
    pub sla_deadline: String,
    pub verified: bool,
    pub dynamic_finding: bool,
    pub false_positive: bool,
    pub is_mitigated: bool,
    pub risk_accepted: bool,
    pub scanner_confidence: f64,
    pub has_kev: bool,
    pub epss_percentile: f64,
    pub occurrences: u64,
    pub endpoint_count: usize,
    pub has_url: bool,
    pub cvss_score: f64,
    pub is_runtime: bool,
    pub fix_effort: f64,
    pub has_ticket: bool,
    pub stable_id: String,
}

impl TieBreakKey {
    pub fn build(record: &FindingRecord, scores: &ScoreSet) -> Self {
        Self {
            violates_sla: record.violates_sla,
            sla_days_remaining: record.sla_days_remaining.unwrap_or(DEFAULT_SLA_DAYS),
            sla_deadline: record
                .sla_deadline
                .clone()
                .unwrap_or_else(|| DEFAULT_SLA_DEADLINE.to_string()),
            verified: record.verified,
            dynamic_finding: record.dynamic_finding,
            false_positive: record.false_positive,
            is_mitigated: record.is_mitigated,
            risk_accepted: record.risk_accepted,
            scanner_confidence: record.scanner_confidence.unwrap_or(DEFAULT_CONFIDENCE),
            has_kev: scores.has_kev,
            epss_percentile: scores.epss_percentile,
            occurrences: record.nb_occurences,
            endpoint_count: record.endpoints.len(),
            has_url: record.url.is_some(),
            cvss_score: record.cvss_score.unwrap_or(0.0),
            is_runtime: scores.is_runtime,
            fix_effort: parse_effort(record.effort_for_fixing.as_deref())
                .unwrap_or(DEFAULT_EFFORT),
            has_ticket: record.has_ticket,
            stable_id: record.stable_id(),
        }
    }
}

/// Parse an effort field into a non-negative cost scalar: a number is used
/// as-is, LOW/MEDIUM/HIGH map to 1/5/10, anything else is unknown.
pub fn parse_effort(raw: Option<&str>) -> Option<f64> {
    let s = raw?.trim();
    if let Ok(v) = s.parse::<f64>() {
        return Some(v.max(0.0));
    }
    let upper = s.to_ascii_uppercase();
    if upper.contains("HIGH") || upper.contains("COMPLEX") {
        Some(10.0)
    } else if upper.contains("MEDIUM") || upper.contains("MODERATE") {
        Some(5.0)
    } else if upper.contains("LOW") || upper.contains("SIMPLE") {
        Some(1.0)
    } else {
        None
    }
}

// "First" preferences become descending comparisons; everything else is
// ascending. true-first for booleans, larger-first for desc numerics.
fn desc_bool(a: bool, b: bool) -> Ordering {
    b.cmp(&a)
}

fn desc_f64(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

impl Ord for TieBreakKey {
    fn cmp(&self, other: &Self) -> Ordering {
        desc_bool(self.violates_sla, other.violates_sla)
            .then_with(|| self.sla_days_remaining.total_cmp(&other.sla_days_remaining))
            .then_with(|| self.sla_deadline.cmp(&other.sla_deadline))
            .then_with(|| desc_bool(self.verified, other.verified))
            .then_with(|| desc_bool(self.dynamic_finding, other.dynamic_finding))
            .then_with(|| self.false_positive.cmp(&other.false_positive))
            .then_with(|| self.is_mitigated.cmp(&other.is_mitigated))
            .then_with(|| self.risk_accepted.cmp(&other.risk_accepted))
            .then_with(|| desc_f64(self.scanner_confidence, other.scanner_confidence))
            .then_with(|| desc_bool(self.has_kev, other.has_kev))
            .then_with(|| desc_f64(self.epss_percentile, other.epss_percentile))
            .then_with(|| other.occurrences.cmp(&self.occurrences))
            .then_with(|| other.endpoint_count.cmp(&self.endpoint_count))
            .then_with(|| desc_bool(self.has_url, other.has_url))
            .then_with(|| desc_f64(self.cvss_score, other.cvss_score))
            .then_with(|| desc_bool(self.is_runtime, other.is_runtime))
            .then_with(|| self.fix_effort.total_cmp(&other.fix_effort))
            .then_with(|| desc_bool(self.has_ticket, other.has_ticket))
            .then_with(|| self.stable_id.cmp(&other.stable_id))
    }
}

impl PartialOrd for TieBreakKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TieBreakKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TieBreakKey {}
