//! Ranked-output rendering: the full CSV table and the annotated JSON view.

use std::fmt::Write as _;

use serde_json::{json, Value};

use vpr_core::model::RankedFinding;
use vpr_core::report::RunSummary;
use vpr_core::stats::{Concentration, RpiStatistics};

const CSV_HEADER: &str = "rank,cve_id,title,component,version,rpi_score,\
q1_exploitability,q2_exposure,q3_impact,q4_fixability,q5_urgency,domain,\
has_kev,has_poc,epss_score,sla_days_remaining,severity";

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render the full ranked table as CSV.
pub fn to_csv(items: &[RankedFinding]) -> String {
    let mut out = String::with_capacity(items.len() * 128);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for item in items {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{:.2},{:.1},{:.1},{:.1},{:.1},{:.1},{},{},{},{:.4},{},{}",
            item.rank,
            csv_escape(item.record.cve_id.as_deref().unwrap_or("")),
            csv_escape(item.record.title.as_deref().unwrap_or("")),
            csv_escape(item.record.component_name.as_deref().unwrap_or("")),
            csv_escape(item.record.component_version.as_deref().unwrap_or("")),
            item.scores.rpi,
            item.scores.q1_exploitability,
            item.scores.q2_exposure,
            item.scores.q3_impact,
            item.scores.q4_fixability,
            item.scores.q5_urgency,
            item.scores.domain.as_str(),
            item.scores.has_kev,
            item.scores.has_poc,
            item.scores.epss_score,
            item.record
                .sla_days_remaining
                .map(|d| format!("{d:.0}"))
                .unwrap_or_default(),
            csv_escape(item.record.severity.as_deref().unwrap_or("")),
        );
    }
    out
}

/// One finding as its original mapping annotated with the computed fields.
fn annotated(item: &RankedFinding) -> Value {
    let mut object = match &item.record.raw {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("raw".to_string(), other.clone());
            map
        }
    };
    object.insert("priority_rank".to_string(), json!(item.rank));
    object.insert("rpi_score".to_string(), json!(item.scores.rpi));
    object.insert("rpi_category".to_string(), json!(item.category.as_str()));
    object.insert("domain".to_string(), json!(item.scores.domain.as_str()));
    object.insert("q1_exploitability".to_string(), json!(item.scores.q1_exploitability));
    object.insert("q2_exposure".to_string(), json!(item.scores.q2_exposure));
    object.insert("q3_impact".to_string(), json!(item.scores.q3_impact));
    object.insert("q4_fixability".to_string(), json!(item.scores.q4_fixability));
    object.insert("q5_urgency".to_string(), json!(item.scores.q5_urgency));
    object.insert("has_kev".to_string(), json!(item.scores.has_kev));
    object.insert("has_poc".to_string(), json!(item.scores.has_poc));
    object.insert("epss_score".to_string(), json!(item.scores.epss_score));
    object.insert("epss_percentile".to_string(), json!(item.scores.epss_percentile));
    object.insert("threat_tier".to_string(), json!(item.scores.threat_tier.as_str()));
    object.insert("is_runtime".to_string(), json!(item.scores.is_runtime));
    object.insert(
        "tie_breaker_key".to_string(),
        serde_json::to_value(&item.key).unwrap_or(Value::Null),
    );
    Value::Object(object)
}

/// Full JSON document: run summary, statistics, concentration metrics and
/// the annotated records in final order.
pub fn to_json(
    items: &[RankedFinding],
    summary: &RunSummary,
    stats: &RpiStatistics,
    concentration: &Concentration,
) -> Value {
    json!({
        "summary": summary,
        "statistics": stats,
        "concentration": concentration,
        "results": items.iter().map(annotated).collect::<Vec<_>>(),
    })
}
