use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::fields;
use crate::tiebreak::TieBreakKey;
use vpr_signals::extract_cve_id;

/// Coarse component domain used by exposure, impact and fixability scoring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub enum Domain {
    WebApi,
    Backend,
    Database,
    SearchIndex,
    Messaging,
    Infrastructure,
    Frontend,
    BuildTools,
    BigData,
    General,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::WebApi => "web_api",
            Domain::Backend => "backend",
            Domain::Database => "database",
            Domain::SearchIndex => "search_index",
            Domain::Messaging => "messaging",
            Domain::Infrastructure => "infrastructure",
            Domain::Frontend => "frontend",
            Domain::BuildTools => "build_tools",
            Domain::BigData => "big_data",
            Domain::General => "general",
        }
    }
}

/// Threat tier derived from KEV/EPSS/PoC evidence during urgency scoring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd)]
pub enum ThreatTier {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatTier::None => "none",
            ThreatTier::Low => "low",
            ThreatTier::Medium => "medium",
            ThreatTier::High => "high",
            ThreatTier::Critical => "critical",
        }
    }
}

/// RPI band used for reporting and statistics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub enum RpiCategory {
    Critical,
    High,
    Medium,
    Low,
    Minimal,
}

impl RpiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpiCategory::Critical => "critical",
            RpiCategory::High => "high",
            RpiCategory::Medium => "medium",
            RpiCategory::Low => "low",
            RpiCategory::Minimal => "minimal",
        }
    }
}

/// One vulnerability finding with its fields resolved to typed values.
///
/// Scanners emit open mappings with inconsistent key names and `"NaN"`
/// placeholders; resolution happens once here so every later stage works on
/// typed data with documented neutral defaults. The raw mapping is retained
/// for output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingRecord {
    /// Position in the input batch. Unique by construction; used as the
    /// last-resort deduplication identity and is part of no score.
    pub index: usize,

    pub title: Option<String>,
    pub vulnerability_ids: Option<String>,
    /// Normalized CVE id extracted from `vulnerability_ids`, if any.
    pub cve_id: Option<String>,
    pub component_name: Option<String>,
    pub component_version: Option<String>,
    pub file_path: Option<String>,
    pub url: Option<String>,
    pub endpoints: Vec<String>,
    pub service: Option<String>,
    pub product: Option<String>,
    pub engagement: Option<String>,
    pub environment: Option<String>,
    pub scanner_kind: Option<String>,
    pub description: Option<String>,
    pub mitigation: Option<String>,

    pub cvss_score: Option<f64>,
    pub severity: Option<String>,
    pub cwe: Option<String>,
    /// Occurrence count; rewritten by deduplication. Default 1.
    pub nb_occurences: u64,
    /// Asset criticality 1..10 when provided.
    pub criticality: Option<u32>,

    pub verified: bool,
    pub dynamic_finding: bool,
    pub static_finding: bool,
    /// Scanner confidence normalized into 0..1. Default 0.5 when absent.
    pub scanner_confidence: Option<f64>,

    pub violates_sla: bool,
    pub sla_days_remaining: Option<f64>,
    pub sla_deadline: Option<String>,
    pub sla_age: Option<f64>,

    pub risk_accepted: bool,
    pub is_mitigated: bool,
    pub false_positive: bool,

    pub effort_for_fixing: Option<String>,
    pub has_ticket: bool,

    pub hash_code: Option<String>,
    pub tool_unique_id: Option<String>,

    pub raw: Value,
}

impl FindingRecord {
    pub fn from_json(raw: Value, index: usize) -> Self {
        let vulnerability_ids =
            fields::get_str(&raw, &["vulnerability_ids", "cve", "cve_id"]).map(str::to_string);
        let cve_id = vulnerability_ids.as_deref().and_then(extract_cve_id);
        let scanner_confidence = fields::get_f64(&raw, &["scanner_confidence"]).map(|c| {
            let c = if c > 1.0 { c / 100.0 } else { c };
            c.clamp(0.0, 1.0)
        });
        Self {
            index,
            title: fields::get_str(&raw, &["title"]).map(str::to_string),
            vulnerability_ids,
            cve_id,
            component_name: fields::get_str(&raw, &["component_name", "component"])
                .map(str::to_string),
            component_version: fields::get_str(&raw, &["component_version", "version"])
                .map(str::to_string),
            file_path: fields::get_str(&raw, &["file_path", "sourcefile", "path"])
                .map(str::to_string),
            url: fields::get_str(&raw, &["url"]).map(str::to_string),
            endpoints: parse_endpoints(&raw),
            service: fields::get_str(&raw, &["service"]).map(str::to_string),
            product: fields::get_str(&raw, &["product"]).map(str::to_string),
            engagement: fields::get_str(&raw, &["engagement"]).map(str::to_string),
            environment: fields::get_str(&raw, &["environment", "env"]).map(str::to_string),
            scanner_kind: fields::get_str(&raw, &["test", "test_type", "scanner"])
                .map(str::to_string),
            description: fields::get_str(&raw, &["description"]).map(str::to_string),
            mitigation: fields::get_str(&raw, &["mitigation"]).map(str::to_string),
            cvss_score: fields::get_f64(&raw, &["cvssv3_score", "cvss_score", "cvssv3"]),
            severity: fields::get_str(&raw, &["severity", "numerical_severity"])
                .map(str::to_string),
            cwe: fields::get_str(&raw, &["cwe"]).map(str::to_string).or_else(|| {
                fields::get_f64(&raw, &["cwe"]).map(|n| format!("{n:.0}"))
            }),
            nb_occurences: fields::get_f64(&raw, &["nb_occurences", "nb_occurrences"])
                .map(|v| v.max(1.0) as u64)
                .unwrap_or(1),
            criticality: fields::get_f64(&raw, &["criticality"]).map(|v| v as u32).or_else(|| {
                fields::get_str(&raw, &["criticality"])
                    .and_then(|s| s.trim_start_matches('0').parse::<u32>().ok())
            }),
            verified: fields::get_bool(&raw, &["verified"]),
            dynamic_finding: fields::get_bool(&raw, &["dynamic_finding"]),
            static_finding: fields::get_bool(&raw, &["static_finding"]),
            scanner_confidence,
            violates_sla: fields::get_bool(&raw, &["violates_sla"]),
            sla_days_remaining: fields::get_f64(&raw, &["sla_days_remaining"]),
            sla_deadline: fields::get_str(&raw, &["sla_deadline"]).map(str::to_string),
            sla_age: fields::get_f64(&raw, &["sla_age", "age"]),
            risk_accepted: fields::get_bool(&raw, &["risk_accepted"]),
            is_mitigated: fields::get_bool(&raw, &["is_mitigated"]),
            false_positive: fields::get_bool(&raw, &["false_p", "false_positive"]),
            effort_for_fixing: fields::get_str(&raw, &["effort_for_fixing", "effort"])
                .map(str::to_string)
                .or_else(|| {
                    fields::get_f64(&raw, &["effort_for_fixing"]).map(|v| v.to_string())
                }),
            has_ticket: fields::get_bool(&raw, &["has_jira_issue", "has_ticket"]),
            hash_code: fields::get_str(&raw, &["hash_code"]).map(str::to_string),
            tool_unique_id: fields::get_str(&raw, &["unique_id_from_tool", "id"])
                .map(str::to_string)
                .or_else(|| fields::get_f64(&raw, &["id"]).map(|v| format!("{v:.0}"))),
            raw,
        }
    }

    /// True when the record carries enough identity to be scored at all.
    pub fn has_minimal_identity(&self) -> bool {
        self.title.is_some() || self.vulnerability_ids.is_some() || self.component_name.is_some()
    }

    /// Deduplication identity, in order of preference: normalized CVE id,
    /// scanner content hash, tool-assigned unique id, then a hash of the
    /// descriptive fields for records with no id at all, and finally the
    /// batch position (unique by construction, so distinct unidentifiable
    /// records never collapse). A record with its own tool id is never
    /// folded into another record just because their text matches.
    pub fn dedup_identity(&self) -> String {
        if let Some(cve) = &self.cve_id {
            return cve.clone();
        }
        if let Some(hash) = &self.hash_code {
            return format!("hash:{hash}");
        }
        if let Some(id) = &self.tool_unique_id {
            return format!("tool:{id}");
        }
        if let Some(hash) = self.content_hash() {
            return format!("content:{hash}");
        }
        format!("#{}", self.index)
    }

    /// Stable identifier used as the final tie-break field.
    pub fn stable_id(&self) -> String {
        self.tool_unique_id.clone().unwrap_or_else(|| self.dedup_identity())
    }

    fn content_hash(&self) -> Option<String> {
        let parts = [
            self.title.as_deref(),
            self.component_name.as_deref(),
            self.component_version.as_deref(),
            self.file_path.as_deref(),
            self.cwe.as_deref(),
        ];
        if parts.iter().all(Option::is_none) {
            return None;
        }
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.unwrap_or(""));
            hasher.update([0u8]);
        }
        Some(format!("{:x}", hasher.finalize()))
    }
}

fn parse_endpoints(raw: &Value) -> Vec<String> {
    match raw.get("endpoints") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => {
            let Some(text) = fields::get_str(raw, &["endpoints"]) else {
                return Vec::new();
            };
            let sep = [',', ';', '\n']
                .into_iter()
                .find(|sep| text.contains(*sep))
                .unwrap_or(',');
            text.split(sep)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }
    }
}

/// The five coupled subscores plus derived metadata, written once by the
/// coupling stage and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSet {
    pub q1_exploitability: f64,
    pub q2_exposure: f64,
    pub q3_impact: f64,
    pub q4_fixability: f64,
    pub q5_urgency: f64,
    pub rpi: f64,

    pub domain: Domain,
    pub is_runtime: bool,
    pub has_kev: bool,
    pub has_poc: bool,
    pub epss_score: f64,
    pub epss_percentile: f64,
    pub threat_tier: ThreatTier,
}

/// A scored record with its deterministic ordering key and final position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedFinding {
    pub record: FindingRecord,
    pub scores: ScoreSet,
    pub key: TieBreakKey,
    /// 1-based position in the final order. 0 until ranks are assigned.
    pub rank: usize,
    pub category: RpiCategory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_typed_fields() {
        let record = FindingRecord::from_json(
            json!({
                "title": "RCE in log4j",
                "vulnerability_ids": "cve-2021-44228",
                "cvssv3_score": "10.0",
                "nb_occurences": 3,
                "scanner_confidence": 85,
                "verified": "true",
                "endpoints": "a.example.com, b.example.com",
            }),
            0,
        );
        assert_eq!(record.cve_id.as_deref(), Some("CVE-2021-44228"));
        assert_eq!(record.cvss_score, Some(10.0));
        assert_eq!(record.nb_occurences, 3);
        assert_eq!(record.scanner_confidence, Some(0.85));
        assert!(record.verified);
        assert_eq!(record.endpoints.len(), 2);
    }

    #[test]
    fn identity_precedence() {
        let with_cve = FindingRecord::from_json(
            json!({"vulnerability_ids": "cve-2020-12345", "hash_code": "abc"}),
            0,
        );
        assert_eq!(with_cve.dedup_identity(), "CVE-2020-12345");
        let with_hash = FindingRecord::from_json(json!({"hash_code": "abc"}), 1);
        assert_eq!(with_hash.dedup_identity(), "hash:abc");
        let with_tool_id =
            FindingRecord::from_json(json!({"title": "x", "unique_id_from_tool": "t9"}), 2);
        assert_eq!(with_tool_id.dedup_identity(), "tool:t9");
        let with_content = FindingRecord::from_json(json!({"title": "x"}), 3);
        assert!(with_content.dedup_identity().starts_with("content:"));
        let bare = FindingRecord::from_json(json!({}), 7);
        assert_eq!(bare.dedup_identity(), "#7");
    }

    #[test]
    fn identical_content_hashes_equal() {
        let a = FindingRecord::from_json(json!({"title": "x", "component_name": "c"}), 0);
        let b = FindingRecord::from_json(json!({"title": "x", "component_name": "c"}), 1);
        assert_eq!(a.dedup_identity(), b.dedup_identity());
    }

    #[test]
    fn minimal_identity() {
        assert!(FindingRecord::from_json(json!({"title": "t"}), 0).has_minimal_identity());
        assert!(!FindingRecord::from_json(json!({"url": "http://x"}), 0).has_minimal_identity());
    }
}
