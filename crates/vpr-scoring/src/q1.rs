//! Q1: how exploitable is this, in practice?

use tracing::debug;
use vpr_core::model::FindingRecord;

use crate::classifier;
use crate::cwe;
use crate::signal::SignalSummary;

const RUNTIME_ENV_FIT: f64 = 80.0;
const DEV_ENV_FIT: f64 = 30.0;
const PLATFORM_BONUS: f64 = 10.0;

const PLATFORM_MARKERS: &[&str] =
    &["spring", "tomcat", "nginx", "apache", "postgres", "mysql", "redis", "elastic", "solr"];

/// Exploitability in [0,100].
///
/// Base blend: 0.5 PoC maturity + 0.3 environment fit + 0.2 weakness class
/// weight. When EPSS is present, the raw score adds up to 20 points and the
/// percentile up to 10 more, capped at 100.
pub fn calculate_q1_exploitability(record: &FindingRecord, signal: &SignalSummary) -> f64 {
    let poc_maturity = signal.poc_maturity;

    let env_fit_base = if classifier::is_runtime_dependency(record) {
        RUNTIME_ENV_FIT
    } else {
        DEV_ENV_FIT
    };
    let component_text = format!(
        "{} {}",
        record.component_name.as_deref().unwrap_or(""),
        record.service.as_deref().unwrap_or(""),
    )
    .to_ascii_lowercase();
    let platform_bonus = if PLATFORM_MARKERS.iter().any(|m| component_text.contains(m)) {
        PLATFORM_BONUS
    } else {
        0.0
    };
    let env_fit = (env_fit_base + platform_bonus).min(100.0);

    let codes = record.cwe.as_deref().map(cwe::codes_from_text).unwrap_or_default();
    let class_weight = cwe::weakness_class_weight(&codes);

    let mut q1 = 0.5 * poc_maturity + 0.3 * env_fit + 0.2 * class_weight;

    if signal.epss_score > 0.0 {
        q1 += 20.0 * signal.epss_score + 0.1 * signal.epss_percentile;
    }

    let q1 = q1.min(100.0);
    debug!(
        poc_maturity,
        env_fit,
        class_weight,
        epss = signal.epss_score,
        q1,
        "exploitability computed",
    );
    q1
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> FindingRecord {
        FindingRecord::from_json(value, 0)
    }

    #[test]
    fn baseline_without_signals() {
        // Runtime env fit 80, default class weight 50: 0 + 24 + 10.
        let q1 = calculate_q1_exploitability(&record(json!({})), &SignalSummary::default());
        assert!((q1 - 34.0).abs() < 1e-9);
    }

    #[test]
    fn weaponized_poc_dominates() {
        let signal = SignalSummary { has_poc: true, poc_maturity: 100.0, ..Default::default() };
        let q1 = calculate_q1_exploitability(&record(json!({})), &signal);
        assert!((q1 - 84.0).abs() < 1e-9);
    }

    #[test]
    fn epss_adds_bounded_bonus() {
        let signal = SignalSummary { epss_score: 1.0, epss_percentile: 100.0, ..Default::default() };
        let base = calculate_q1_exploitability(&record(json!({})), &SignalSummary::default());
        let boosted = calculate_q1_exploitability(&record(json!({})), &signal);
        assert!((boosted - (base + 30.0)).abs() < 1e-9);
    }

    #[test]
    fn dev_path_lowers_environment_fit() {
        let dev = record(json!({"file_path": "tests/fixtures/dep.jar"}));
        let prod = record(json!({"file_path": "BOOT-INF/lib/dep.jar"}));
        let neutral = SignalSummary::default();
        assert!(
            calculate_q1_exploitability(&dev, &neutral)
                < calculate_q1_exploitability(&prod, &neutral)
        );
    }

    #[test]
    fn platform_component_gets_bonus() {
        let plain = record(json!({"component_name": "left-pad"}));
        let platform = record(json!({"component_name": "tomcat-embed-core"}));
        let neutral = SignalSummary::default();
        let delta = calculate_q1_exploitability(&platform, &neutral)
            - calculate_q1_exploitability(&plain, &neutral);
        assert!((delta - 3.0).abs() < 1e-9);
    }

    #[test]
    fn critical_cwe_raises_class_weight() {
        let rce = record(json!({"cwe": "CWE-78"}));
        let info = record(json!({"cwe": "CWE-200"}));
        let neutral = SignalSummary::default();
        let delta = calculate_q1_exploitability(&rce, &neutral)
            - calculate_q1_exploitability(&info, &neutral);
        assert!((delta - 10.0).abs() < 1e-9);
    }

    #[test]
    fn never_exceeds_hundred() {
        let signal = SignalSummary {
            has_poc: true,
            poc_maturity: 100.0,
            epss_score: 1.0,
            epss_percentile: 100.0,
            ..Default::default()
        };
        let q1 = calculate_q1_exploitability(
            &record(json!({"component_name": "apache-struts", "cwe": "CWE-502"})),
            &signal,
        );
        assert_eq!(q1, 100.0);
    }
}
