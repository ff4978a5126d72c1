use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::model::RankedFinding;
use crate::stats::RpiStatistics;

const TITLE_WIDTH: usize = 70;
const MITIGATION_WIDTH: usize = 100;

/// Machine-readable run summary emitted alongside the ranked records.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub unique: usize,
    pub errors: usize,
    pub funneled: Option<usize>,
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let cut: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{cut}...")
}

/// Concise justification line for why a record ranks where it does.
fn priority_reason(item: &RankedFinding) -> String {
    let mut reasons = Vec::new();
    if item.scores.has_kev {
        reasons.push("active exploitation confirmed".to_string());
    } else if item.scores.has_poc {
        reasons.push("public PoC available".to_string());
    }
    if item.scores.q2_exposure > 70.0 {
        reasons.push("high exposure".to_string());
    }
    if item.scores.q3_impact > 80.0 {
        reasons.push("critical impact".to_string());
    }
    if item.record.violates_sla {
        reasons.push("SLA violated".to_string());
    } else if item.record.sla_days_remaining.is_some_and(|d| d < 7.0) {
        reasons.push("SLA deadline close".to_string());
    }
    if reasons.is_empty() {
        reasons.push("elevated aggregate risk".to_string());
    }
    reasons.join(", ")
}

fn signal_markers(item: &RankedFinding) -> Vec<String> {
    let mut markers = Vec::new();
    if item.scores.has_kev {
        markers.push("KEV".to_string());
    }
    if item.scores.has_poc {
        markers.push("PoC".to_string());
    }
    if item.scores.epss_score > 0.5 {
        markers.push(format!("EPSS {:.0}%", item.scores.epss_score * 100.0));
    }
    if item.record.violates_sla {
        markers.push("SLA violated".to_string());
    }
    markers
}

/// Render the top-N ranked findings as a plain-text report with a per-domain
/// distribution footer.
pub fn render_text(items: &[RankedFinding], stats: &RpiStatistics, top_n: usize) -> String {
    let mut out = String::new();
    let rule = "=".repeat(80);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "VULNERABILITY PRIORITIES - RISK-PRIORITY INDEX (5Q)");
    let _ = writeln!(out, "{rule}");
    let shown = items.len().min(top_n);
    let _ = writeln!(out, "\nTOP {shown} OF {}", items.len());
    let _ = writeln!(out, "{}", "-".repeat(40));

    for item in &items[..shown] {
        let title = item.record.title.as_deref().unwrap_or("(untitled)");
        let _ = writeln!(out, "\n#{}. {}", item.rank, truncate(title, TITLE_WIDTH));
        let _ = writeln!(
            out,
            "    CVE: {} | RPI: {:.2} ({})",
            item.record.cve_id.as_deref().unwrap_or("n/a"),
            item.scores.rpi,
            item.category.as_str(),
        );
        let _ = writeln!(
            out,
            "    Domain: {} | Component: {} v{}",
            item.scores.domain.as_str(),
            item.record.component_name.as_deref().unwrap_or("n/a"),
            item.record.component_version.as_deref().unwrap_or("n/a"),
        );
        let _ = writeln!(
            out,
            "    Q1={:.1} Q2={:.1} Q3={:.1} Q4={:.1} Q5={:.1}",
            item.scores.q1_exploitability,
            item.scores.q2_exposure,
            item.scores.q3_impact,
            item.scores.q4_fixability,
            item.scores.q5_urgency,
        );
        let markers = signal_markers(item);
        if !markers.is_empty() {
            let _ = writeln!(out, "    Signals: {}", markers.join(" | "));
        }
        let _ = writeln!(out, "    Why now: {}", priority_reason(item));
        if let Some(mitigation) = &item.record.mitigation {
            let _ = writeln!(out, "    Fix: {}", truncate(mitigation, MITIGATION_WIDTH));
        }
    }

    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "DOMAIN DISTRIBUTION");
    let _ = writeln!(out, "{}", "-".repeat(40));
    let mut by_domain: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for item in &items[..shown] {
        let entry = by_domain.entry(item.scores.domain.as_str()).or_default();
        entry.0 += 1;
        entry.1 += item.scores.rpi;
    }
    for (domain, (count, total)) in by_domain {
        let _ = writeln!(
            out,
            "{}: {} findings (avg RPI {:.1})",
            domain,
            count,
            total / count as f64,
        );
    }

    let _ = writeln!(
        out,
        "\nTotals: {} ranked | critical {} | high {} | medium {} | low {} | minimal {}",
        stats.total, stats.critical, stats.high, stats.medium, stats.low, stats.minimal,
    );
    let _ = writeln!(
        out,
        "Signals: KEV {} | PoC {} | SLA violated {} | verified {} | dynamic {}",
        stats.kev_count,
        stats.poc_count,
        stats.sla_violations,
        stats.verified_count,
        stats.dynamic_count,
    );
    out
}
