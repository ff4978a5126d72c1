use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One KEV catalog entry for a CVE with confirmed active exploitation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KevEntry {
    pub date_added: Option<String>,
    pub vendor: Option<String>,
    pub product: Option<String>,
    #[serde(default)]
    pub known_ransomware: bool,
}

/// EPSS probability of exploitation. `score` is 0..1, `percentile` 0..100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EpssScore {
    pub score: f64,
    pub percentile: f64,
}

/// Proof-of-concept availability. `maturity` is 0..100 and approximates how
/// weaponized the public exploit code is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PocInfo {
    pub has_poc: bool,
    pub maturity: f64,
    #[serde(default)]
    pub weaponized: bool,
}

/// Read-only signal source shared by all scoring tasks in a batch.
///
/// Absence of a signal is never an error: the neutral answers are
/// KEV = none, EPSS = zero, PoC = none.
pub trait SignalProvider: Send + Sync {
    fn kev(&self, cve_id: &str) -> Option<KevEntry>;
    fn epss(&self, cve_id: &str) -> Option<EpssScore>;
    fn poc(&self, cve_id: &str) -> PocInfo;
}

/// A fully materialized signal snapshot keyed by normalized CVE id.
///
/// Used offline (loaded from a JSON file) and in tests. An empty set is a
/// valid provider: every lookup answers with the neutral absence value.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SignalSet {
    #[serde(default)]
    pub kev: HashMap<String, KevEntry>,
    #[serde(default)]
    pub epss: HashMap<String, EpssScore>,
    #[serde(default)]
    pub poc: HashMap<String, PocInfo>,
}

impl SignalSet {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("reading signal snapshot {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing signal snapshot {}", path.display()))
    }

    pub fn is_empty(&self) -> bool {
        self.kev.is_empty() && self.epss.is_empty() && self.poc.is_empty()
    }
}

impl SignalProvider for SignalSet {
    fn kev(&self, cve_id: &str) -> Option<KevEntry> {
        self.kev.get(cve_id).cloned()
    }

    fn epss(&self, cve_id: &str) -> Option<EpssScore> {
        self.epss.get(cve_id).copied()
    }

    fn poc(&self, cve_id: &str) -> PocInfo {
        self.poc.get(cve_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_answers_neutral() {
        let set = SignalSet::default();
        assert!(set.kev("CVE-2024-0001").is_none());
        assert!(set.epss("CVE-2024-0001").is_none());
        let poc = set.poc("CVE-2024-0001");
        assert!(!poc.has_poc);
        assert_eq!(poc.maturity, 0.0);
    }

    #[test]
    fn snapshot_round_trips() {
        let mut set = SignalSet::default();
        set.epss.insert(
            "CVE-2021-44228".into(),
            EpssScore { score: 0.97, percentile: 99.9 },
        );
        let json = serde_json::to_string(&set).unwrap();
        let back: SignalSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.epss["CVE-2021-44228"].percentile, 99.9);
    }
}
