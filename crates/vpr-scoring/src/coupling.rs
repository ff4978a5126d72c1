//! Coupling & gate engine: combines the five raw subscores into the final
//! Risk-Priority Index.
//!
//! Couplings: exposure amplifies perceived exploitability (Q2 → Q1), the
//! environment scales exposure (env → Q2), exploit evidence amplifies
//! impact (Q1 signals → Q3), and urgency is modulated by all three.
//! Fixability stays uncoupled. Penalties for management state come last,
//! and the SLA override is applied after them so an SLA-violated record can
//! never be buried by a management flag.

use anyhow::{bail, Result};
use tracing::debug;

use vpr_core::config::Weights;
use vpr_core::model::{FindingRecord, ScoreSet};
use vpr_core::runner::RecordScorer;
use vpr_signals::SignalProvider;

use crate::classifier::{self, EnvContext};
use crate::q1::calculate_q1_exploitability;
use crate::q2::calculate_q2_exposure;
use crate::q3::calculate_q3_impact;
use crate::q4::calculate_q4_fixability;
use crate::q5::{calculate_q5_urgency, RawSubscores};
use crate::signal::SignalSummary;

const SLA_OVERRIDE_FLOOR: f64 = 85.0;

/// Exploit-evidence gate: KEV beats PoC beats EPSS bands.
fn exploit_gate(signal: &SignalSummary) -> f64 {
    if signal.has_kev {
        1.20
    } else if signal.has_poc {
        1.15
    } else if signal.epss_score >= 0.50 {
        1.10
    } else if signal.epss_score >= 0.20 {
        1.05
    } else {
        1.00
    }
}

/// Attack-surface gate from raw exposure.
fn surface_gate(q2: f64) -> f64 {
    if q2 >= 80.0 {
        1.15
    } else if q2 >= 60.0 {
        1.08
    } else {
        0.95
    }
}

/// Environment factor: production raises, dev/test lowers, ambiguity is
/// neutral.
fn env_factor(context: EnvContext) -> f64 {
    match context {
        EnvContext::Production => 1.10,
        EnvContext::Development => 0.85,
        EnvContext::Unknown => 1.00,
    }
}

fn occurrence_gate(occurrences: u64) -> f64 {
    if occurrences > 100 {
        1.5
    } else if occurrences > 50 {
        1.3
    } else if occurrences > 10 {
        1.15
    } else {
        1.0
    }
}

/// The full 5Q calculator: one instance per batch, shared read-only across
/// scoring workers.
pub struct RpiCalculator {
    weights: Weights,
    signals: Box<dyn SignalProvider>,
}

impl RpiCalculator {
    pub fn new(weights: Weights, signals: Box<dyn SignalProvider>) -> Self {
        Self { weights, signals }
    }

    fn calculate(&self, record: &FindingRecord) -> Result<ScoreSet> {
        if !record.has_minimal_identity() {
            bail!("record #{} has no title, identifier or component name", record.index);
        }

        let signal = SignalSummary::gather(record, self.signals.as_ref());
        let domain = classifier::classify_domain(record);
        let is_runtime = classifier::is_runtime_dependency(record);

        let q1 = calculate_q1_exploitability(record, &signal);
        let q2 = calculate_q2_exposure(record);
        let q3 = calculate_q3_impact(record);
        let q4 = calculate_q4_fixability(record);
        let raw = RawSubscores { q1, q2, q3, q4 };
        let (q5, tier) = calculate_q5_urgency(record, &raw, is_runtime, &signal);

        let g_exploit = exploit_gate(&signal);
        let g_surface = surface_gate(q2);
        let f_env = env_factor(classifier::environment_hint(record));

        let q1_coupled = (q1 * g_surface).min(100.0);
        let q2_coupled = (q2 * f_env).min(100.0);
        let mut q3_coupled = (q3 * g_exploit).min(100.0);
        q3_coupled = (q3_coupled * occurrence_gate(record.nb_occurences)).min(100.0);
        let q4_coupled = q4;
        let q5_coupled =
            (q5 * (0.7 + 0.3 * g_exploit) * (0.8 + 0.2 * g_surface) * f_env).min(100.0);

        let mut validation_boost = 1.0;
        if record.verified {
            validation_boost *= 1.15;
        }
        if record.dynamic_finding {
            validation_boost *= 1.10;
        }
        if record.scanner_confidence.is_some_and(|c| c < 0.5) {
            validation_boost *= 0.70;
        }

        let mut rpi = (self.weights.q1 * q1_coupled
            + self.weights.q2 * q2_coupled
            + self.weights.q3 * q3_coupled
            + self.weights.q4 * q4_coupled
            + self.weights.q5 * q5_coupled)
            * validation_boost;

        if record.risk_accepted {
            rpi *= 0.05;
        }
        if record.is_mitigated {
            rpi *= 0.10;
        }
        if record.false_positive {
            rpi *= 0.20;
        }

        // After penalties: an SLA violation always surfaces.
        if record.violates_sla {
            rpi = rpi.max(SLA_OVERRIDE_FLOOR);
        }
        let rpi = rpi.clamp(0.0, 100.0);

        debug!(
            g_exploit,
            g_surface,
            f_env,
            validation_boost,
            rpi,
            domain = domain.as_str(),
            "record scored",
        );
        Ok(ScoreSet {
            q1_exploitability: q1_coupled,
            q2_exposure: q2_coupled,
            q3_impact: q3_coupled,
            q4_fixability: q4_coupled,
            q5_urgency: q5_coupled,
            rpi,
            domain,
            is_runtime,
            has_kev: signal.has_kev,
            has_poc: signal.has_poc,
            epss_score: signal.epss_score,
            epss_percentile: signal.epss_percentile,
            threat_tier: tier,
        })
    }
}

impl RecordScorer for RpiCalculator {
    fn score(&self, record: &FindingRecord) -> Result<ScoreSet> {
        self.calculate(record)
    }
}
