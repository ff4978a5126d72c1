use chrono::{NaiveDate, NaiveDateTime, Utc};
use vpr_core::model::FindingRecord;
use vpr_signals::SignalProvider;

const KEV_RECENT_DAYS: i64 = 60;

/// Per-record view of the external signals, gathered once before scoring so
/// every calculator reads the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct SignalSummary {
    pub has_kev: bool,
    pub kev_recent: bool,
    pub known_ransomware: bool,
    pub has_poc: bool,
    pub poc_maturity: f64,
    pub epss_score: f64,
    pub epss_percentile: f64,
}

impl SignalSummary {
    pub fn gather(record: &FindingRecord, signals: &dyn SignalProvider) -> Self {
        let Some(cve) = record.cve_id.as_deref() else {
            return Self::default();
        };
        let mut summary = Self::default();
        if let Some(kev) = signals.kev(cve) {
            summary.has_kev = true;
            summary.known_ransomware = kev.known_ransomware;
            summary.kev_recent = kev
                .date_added
                .as_deref()
                .and_then(parse_date_days_ago)
                .is_some_and(|days| days <= KEV_RECENT_DAYS);
        }
        if let Some(epss) = signals.epss(cve) {
            summary.epss_score = epss.score;
            summary.epss_percentile = epss.percentile;
        }
        let poc = signals.poc(cve);
        summary.has_poc = poc.has_poc;
        summary.poc_maturity = poc.maturity;
        summary
    }
}

fn parse_date_days_ago(raw: &str) -> Option<i64> {
    let parsed = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()?;
    Some((Utc::now().naive_utc() - parsed).num_days())
}
