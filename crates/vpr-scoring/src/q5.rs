//! Q5: operational urgency.
//!
//! SLA pressure is the first engine; live threat evidence (EPSS, PoC, KEV)
//! the second; age the third, gated by threat so stale low-signal findings
//! cool down instead of creeping upward. Q1/Q3 modulate the threat block to
//! suppress false urgency, and Q4 nudges the result toward quick wins.

use tracing::debug;
use vpr_core::model::{FindingRecord, ThreatTier};

use crate::signal::SignalSummary;

/// Raw (pre-coupling) subscores Q1–Q4 feeding the urgency integration.
#[derive(Debug, Clone, Copy)]
pub struct RawSubscores {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub q4: f64,
}

/// SLA pressure in [0,100]. Unknown SLA data is mildly urgent, not zero.
fn sla_component(record: &FindingRecord) -> f64 {
    if record.violates_sla {
        return 100.0;
    }
    let Some(days) = record.sla_days_remaining else {
        return 25.0;
    };
    if days < 0.0 {
        100.0
    } else if days <= 3.0 {
        95.0
    } else if days <= 7.0 {
        90.0
    } else if days <= 14.0 {
        80.0
    } else if days <= 30.0 {
        70.0
    } else if days <= 60.0 {
        50.0
    } else if days <= 90.0 {
        30.0
    } else {
        20.0
    }
}

/// Continuous threat score 0..100 and its tier.
fn threat_block(signal: &SignalSummary) -> (f64, ThreatTier) {
    let mut threat =
        100.0 * (0.65 * signal.epss_score + 0.35 * (signal.epss_percentile / 100.0));
    if signal.has_poc {
        threat += 8.0;
    }
    if signal.has_kev {
        threat = threat.max(90.0);
        if signal.kev_recent {
            threat += 5.0;
        }
    }
    if signal.known_ransomware {
        threat = 100.0;
    }
    let threat = threat.clamp(0.0, 100.0);

    let tier = if signal.has_kev || signal.known_ransomware {
        ThreatTier::Critical
    } else if threat >= 80.0 {
        ThreatTier::High
    } else if threat >= 50.0 || signal.has_poc {
        ThreatTier::Medium
    } else if threat >= 20.0 {
        ThreatTier::Low
    } else {
        ThreatTier::None
    };
    (threat, tier)
}

/// Exposure modulation factor in [0.70, 1.00], preferring the computed Q2;
/// the URL/dynamic/runtime/production heuristic covers callers without one.
fn exposure_factor(record: &FindingRecord, q2: Option<f64>, is_runtime: bool) -> f64 {
    if let Some(q2) = q2 {
        return if q2 >= 60.0 {
            1.00
        } else if q2 >= 40.0 {
            0.90
        } else if q2 >= 20.0 {
            0.85
        } else {
            0.70
        };
    }

    let url = record.url.as_deref().unwrap_or("").to_ascii_lowercase();
    let context = format!(
        "{} {} {}",
        record.environment.as_deref().unwrap_or(""),
        record.service.as_deref().unwrap_or(""),
        url,
    )
    .to_ascii_lowercase();
    let publicish = ["http://", "https://", ".com", ".org", ".net", ".io", "public", "external"]
        .iter()
        .any(|m| url.contains(m));
    let is_prod = ["prod", "production", "prd", "live"].iter().any(|m| context.contains(m));

    let mut score = 0;
    if publicish {
        score += 40;
    }
    if record.dynamic_finding {
        score += 30;
    }
    if is_runtime {
        score += 20;
    }
    if is_prod {
        score += 20;
    }
    if score >= 70 {
        1.00
    } else if score >= 40 {
        0.90
    } else if score >= 20 {
        0.85
    } else {
        0.70
    }
}

/// Age urgency, capped by threat tier. Very old findings with no threat
/// signals get an extra cooldown instead of accumulating urgency forever.
fn age_urgency(record: &FindingRecord, tier: ThreatTier) -> f64 {
    let Some(days) = record.sla_age else {
        return 0.0;
    };
    let base: f64 = if days > 730.0 {
        20.0
    } else if days > 365.0 {
        18.0
    } else if days > 180.0 {
        16.0
    } else if days > 90.0 {
        12.0
    } else if days > 30.0 {
        8.0
    } else if days > 7.0 {
        4.0
    } else {
        0.0
    };

    let (cap, mult): (f64, f64) = match tier {
        ThreatTier::None => (10.0, 0.5),
        ThreatTier::Low => (20.0, 0.7),
        ThreatTier::Medium => (25.0, 0.9),
        ThreatTier::High => (30.0, 1.0),
        ThreatTier::Critical => (35.0, 1.1),
    };
    let mut capped = cap.min((base * mult).trunc());
    if days >= 730.0 && matches!(tier, ThreatTier::None | ThreatTier::Low) {
        capped = (capped - 8.0).max(0.0);
    }
    capped
}

/// Threat modulation from exploitability: low Q1 without corroborating
/// signals pulls the threat down; very high Q1 nudges it up.
fn exploit_factor(q1: f64, tier: ThreatTier, signal: &SignalSummary) -> f64 {
    if !signal.has_poc
        && !signal.has_kev
        && matches!(tier, ThreatTier::None | ThreatTier::Low)
    {
        return if q1 < 25.0 {
            0.75
        } else if q1 < 50.0 {
            0.90
        } else {
            1.00
        };
    }
    if q1 >= 85.0 {
        1.07
    } else if q1 >= 70.0 {
        1.04
    } else if q1 < 30.0 {
        0.95
    } else {
        1.00
    }
}

/// Threat modulation from impact. Never suppresses KEV or SLA-urgent
/// records.
fn impact_factor(q3: f64, has_kev: bool, sla_urgent: bool) -> f64 {
    if has_kev || sla_urgent {
        return 1.0;
    }
    if q3 < 30.0 {
        0.80
    } else if q3 < 50.0 {
        0.92
    } else if q3 < 70.0 {
        1.00
    } else if q3 >= 85.0 {
        1.06
    } else {
        1.02
    }
}

fn fixability_nudge(q4: f64) -> f64 {
    if q4 >= 80.0 {
        1.03
    } else if q4 <= 20.0 {
        0.97
    } else {
        1.00
    }
}

/// Urgency in [0,100] with the derived threat tier.
pub fn calculate_q5_urgency(
    record: &FindingRecord,
    raw: &RawSubscores,
    is_runtime: bool,
    signal: &SignalSummary,
) -> (f64, ThreatTier) {
    let sla = sla_component(record);
    let sla_urgent =
        record.violates_sla || record.sla_days_remaining.is_some_and(|d| d < 0.0);

    let (mut threat, tier) = threat_block(signal);
    threat = (threat * exposure_factor(record, Some(raw.q2), is_runtime)).min(100.0);

    let age = age_urgency(record, tier);

    threat *= exploit_factor(raw.q1, tier, signal);
    threat *= impact_factor(raw.q3, signal.has_kev, sla_urgent);
    threat = threat.clamp(0.0, 100.0);

    let (w_sla, w_threat, w_age) = match tier {
        ThreatTier::None | ThreatTier::Low => (0.65, 0.25, 0.10),
        ThreatTier::Critical => (0.45, 0.40, 0.15),
        ThreatTier::Medium | ThreatTier::High => (0.50, 0.35, 0.15),
    };
    let mut q5 = w_sla * sla + w_threat * threat + w_age * age;

    if record.verified {
        q5 *= 1.04;
    }
    if record.dynamic_finding {
        q5 *= 1.03;
    }

    if let Some(confidence) = record.scanner_confidence {
        if confidence < 0.5
            && !signal.has_kev
            && matches!(tier, ThreatTier::None | ThreatTier::Low)
        {
            q5 *= 0.85;
        }
    }

    q5 *= fixability_nudge(raw.q4);

    if record.risk_accepted {
        q5 *= 0.30;
    }
    if record.is_mitigated {
        q5 *= 0.50;
    }
    if record.false_positive {
        q5 *= 0.20;
    }

    if sla_urgent {
        q5 = q5.max(100.0);
    }
    let q5 = q5.clamp(0.0, 100.0);
    debug!(sla, threat, age, tier = tier.as_str(), q5, "urgency computed");
    (q5, tier)
}
