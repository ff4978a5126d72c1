//! Q3: how bad is the damage if it goes wrong?

use tracing::debug;
use vpr_core::model::{Domain, FindingRecord};

use crate::classifier;

const DEFAULT_BASE_IMPACT: f64 = 50.0;

const SENSITIVITY_KEYWORDS: &[&str] = &[
    "auth",
    "authentication",
    "authorization",
    "crypto",
    "cryptograph",
    "encrypt",
    "password",
    "passwd",
    "credential",
    "token",
    "jwt",
    "oauth",
    "saml",
    "session",
    "cookie",
    "payment",
    "credit",
    "card",
    "billing",
    "personal",
    "pii",
    "gdpr",
    "sensitive",
];

fn severity_base(severity: &str) -> f64 {
    match severity.to_ascii_lowercase().as_str() {
        "critical" | "s4" => 90.0,
        "high" | "s3" => 70.0,
        "medium" | "s2" => 50.0,
        "low" | "s1" => 30.0,
        "informational" | "info" | "s0" => 10.0,
        _ => DEFAULT_BASE_IMPACT,
    }
}

/// Non-linear occurrence amplifier: log-scaled below 5 occurrences, stepped
/// tiers above. Many instances of one weakness mean a much larger attack
/// surface than the base score suggests.
fn occurrence_multiplier(occurrences: u64) -> f64 {
    match occurrences {
        0 | 1 => 1.0,
        n if n >= 500 => 2.5,
        n if n >= 100 => 2.0,
        n if n >= 50 => 1.6,
        n if n >= 20 => 1.4,
        n if n >= 10 => 1.3,
        n if n >= 5 => 1.2,
        n => 1.0 + (n as f64).log10() * 0.2,
    }
}

fn criticality_multiplier(criticality: u32) -> f64 {
    match criticality {
        c if c >= 9 => 1.4,
        8 => 1.3,
        7 => 1.2,
        6 => 1.1,
        c if c <= 3 => 0.8,
        _ => 1.0,
    }
}

fn domain_impact_multiplier(domain: Domain) -> f64 {
    match domain {
        Domain::Database => 1.4,
        Domain::Infrastructure => 1.3,
        Domain::SearchIndex => 1.2,
        Domain::Backend => 1.15,
        Domain::WebApi => 1.1,
        Domain::Messaging => 1.05,
        Domain::Frontend => 0.9,
        Domain::BuildTools => 0.7,
        _ => 1.0,
    }
}

/// Impact in [0,100]: CVSS (or severity text) scaled by attack surface,
/// asset criticality, component domain and data sensitivity.
pub fn calculate_q3_impact(record: &FindingRecord) -> f64 {
    let mut impact = match record.cvss_score {
        Some(cvss) if cvss > 0.0 => cvss * 10.0,
        _ => record.severity.as_deref().map(severity_base).unwrap_or(DEFAULT_BASE_IMPACT),
    };

    impact *= occurrence_multiplier(record.nb_occurences);

    if let Some(criticality) = record.criticality {
        impact *= criticality_multiplier(criticality);
    }

    let domain = classifier::classify_domain(record);
    impact *= domain_impact_multiplier(domain);

    let haystack = format!(
        "{} {} {}",
        record.component_name.as_deref().unwrap_or(""),
        record.title.as_deref().unwrap_or(""),
        record.description.as_deref().unwrap_or(""),
    )
    .to_ascii_lowercase();
    let sensitivity = SENSITIVITY_KEYWORDS.iter().filter(|k| haystack.contains(*k)).count();
    if sensitivity >= 3 {
        impact *= 1.3;
    } else if sensitivity >= 1 {
        impact *= 1.15;
    }

    if record.verified {
        impact *= 1.05;
    }

    let q3 = impact.clamp(0.0, 100.0);
    debug!(
        occurrences = record.nb_occurences,
        domain = domain.as_str(),
        sensitivity,
        q3,
        "impact computed",
    );
    q3
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> FindingRecord {
        FindingRecord::from_json(value, 0)
    }

    #[test]
    fn cvss_beats_severity_text() {
        let with_cvss = record(json!({"cvssv3_score": 9.8, "severity": "low"}));
        assert_eq!(calculate_q3_impact(&with_cvss), 98.0);
    }

    #[test]
    fn severity_fallback_table() {
        assert_eq!(calculate_q3_impact(&record(json!({"severity": "critical"}))), 90.0);
        assert_eq!(calculate_q3_impact(&record(json!({"severity": "s3"}))), 70.0);
        assert_eq!(calculate_q3_impact(&record(json!({"severity": "info"}))), 10.0);
        assert_eq!(calculate_q3_impact(&record(json!({}))), 50.0);
    }

    #[test]
    fn occurrence_steps() {
        assert_eq!(occurrence_multiplier(1), 1.0);
        assert!((occurrence_multiplier(2) - 1.0602).abs() < 1e-3);
        assert_eq!(occurrence_multiplier(5), 1.2);
        assert_eq!(occurrence_multiplier(10), 1.3);
        assert_eq!(occurrence_multiplier(20), 1.4);
        assert_eq!(occurrence_multiplier(50), 1.6);
        assert_eq!(occurrence_multiplier(150), 2.0);
        assert_eq!(occurrence_multiplier(500), 2.5);
    }

    #[test]
    fn database_domain_amplifies() {
        // severity medium 50 × database 1.4 = 70.
        let q3 = calculate_q3_impact(&record(
            json!({"severity": "medium", "component_name": "postgres-driver"}),
        ));
        assert!((q3 - 70.0).abs() < 1e-9);
    }

    #[test]
    fn widespread_database_finding_hits_cap() {
        // 9.8 × 10 × 2.0 (150 occurrences) × 1.4 (database) clamps at 100.
        let q3 = calculate_q3_impact(&record(json!({
            "cvssv3_score": 9.8,
            "nb_occurences": 150,
            "component_name": "mysql-connector",
        })));
        assert_eq!(q3, 100.0);
    }

    #[test]
    fn sensitivity_keywords_raise_impact() {
        let plain = record(json!({"severity": "medium", "title": "outdated library"}));
        let sensitive = record(json!({
            "severity": "medium",
            "title": "password and token exposure in payment flow",
        }));
        assert!(calculate_q3_impact(&sensitive) > calculate_q3_impact(&plain));
    }

    #[test]
    fn low_criticality_discounts() {
        let minor = record(json!({"severity": "high", "criticality": 2}));
        assert!((calculate_q3_impact(&minor) - 56.0).abs() < 1e-9);
    }
}
