use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cve::extract_cve_id;
use crate::model::{EpssScore, KevEntry, PocInfo, SignalProvider};

const KEV_URL: &str =
    "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json";
const EPSS_URL: &str = "https://api.first.org/data/v1/epss";
const NVD_URL: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";

const EPSS_BATCH: usize = 100;
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "vpr/0.6";

/// Blocking HTTP client for the public KEV, EPSS and NVD feeds.
pub struct FeedClient {
    http: reqwest::blocking::Client,
    nvd_api_key: Option<String>,
}

#[derive(Deserialize)]
struct KevCatalog {
    #[serde(default)]
    vulnerabilities: Vec<KevCatalogEntry>,
}

#[derive(Deserialize)]
struct KevCatalogEntry {
    #[serde(rename = "cveID", default)]
    cve_id: String,
    #[serde(rename = "dateAdded")]
    date_added: Option<String>,
    #[serde(rename = "vendorProject")]
    vendor: Option<String>,
    product: Option<String>,
    #[serde(rename = "knownRansomwareCampaignUse")]
    known_ransomware: Option<String>,
}

#[derive(Deserialize)]
struct EpssResponse {
    #[serde(default)]
    data: Vec<EpssRow>,
}

#[derive(Deserialize)]
struct EpssRow {
    cve: Option<String>,
    epss: Option<String>,
    percentile: Option<String>,
}

#[derive(Deserialize)]
struct NvdResponse {
    #[serde(default)]
    vulnerabilities: Vec<NvdVuln>,
}

#[derive(Deserialize)]
struct NvdVuln {
    cve: NvdCve,
}

#[derive(Deserialize)]
struct NvdCve {
    #[serde(default)]
    references: Vec<NvdReference>,
}

#[derive(Deserialize)]
struct NvdReference {
    #[serde(default)]
    url: String,
    #[serde(default)]
    tags: Vec<String>,
}

impl FeedClient {
    pub fn new(nvd_api_key: Option<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("building feed client")?;
        Ok(Self { http, nvd_api_key })
    }

    /// Download the full KEV catalog, keyed by normalized CVE id.
    pub fn fetch_kev(&self) -> Result<HashMap<String, KevEntry>> {
        let catalog: KevCatalog = self
            .http
            .get(KEV_URL)
            .send()
            .and_then(|r| r.error_for_status())
            .context("fetching KEV catalog")?
            .json()
            .context("parsing KEV catalog")?;

        let mut out = HashMap::new();
        for entry in catalog.vulnerabilities {
            let Some(cve) = extract_cve_id(&entry.cve_id) else { continue };
            out.insert(
                cve,
                KevEntry {
                    date_added: entry.date_added,
                    vendor: entry.vendor,
                    product: entry.product,
                    known_ransomware: entry.known_ransomware.as_deref() == Some("Known"),
                },
            );
        }
        info!(entries = out.len(), "KEV catalog loaded");
        Ok(out)
    }

    /// Fetch EPSS scores for a set of CVE ids, batched per request.
    ///
    /// The API reports percentile as a 0..1 fraction; it is normalized to
    /// 0..100 here so consumers see one scale.
    pub fn fetch_epss(&self, ids: &BTreeSet<String>) -> Result<HashMap<String, EpssScore>> {
        let mut out = HashMap::new();
        let ids: Vec<&String> = ids.iter().collect();
        for batch in ids.chunks(EPSS_BATCH) {
            let joined = batch.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(",");
            let resp: EpssResponse = self
                .http
                .get(EPSS_URL)
                .query(&[("cve", joined.as_str())])
                .send()
                .and_then(|r| r.error_for_status())
                .context("fetching EPSS scores")?
                .json()
                .context("parsing EPSS response")?;
            for row in resp.data {
                let Some(cve) = row.cve.as_deref().and_then(extract_cve_id) else { continue };
                let score = row.epss.as_deref().and_then(|v| v.parse::<f64>().ok()).unwrap_or(0.0);
                let mut percentile = row
                    .percentile
                    .as_deref()
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(0.0);
                if percentile <= 1.0 {
                    percentile *= 100.0;
                }
                out.insert(cve, EpssScore { score, percentile });
            }
        }
        info!(scores = out.len(), "EPSS scores loaded");
        Ok(out)
    }

    /// Infer PoC availability and maturity from NVD reference metadata.
    ///
    /// Maturity ladder: exploit-tagged reference 70, Nuclei template 55,
    /// Exploit-DB 90 (weaponized), Metasploit 100 (weaponized). A KEV entry
    /// with known ransomware use floors maturity at 95.
    pub fn check_poc(&self, cve_id: &str, kev: Option<&KevEntry>) -> Result<PocInfo> {
        let mut req = self.http.get(NVD_URL).query(&[("cveId", cve_id)]);
        if let Some(key) = &self.nvd_api_key {
            req = req.header("apiKey", key);
        }
        let resp: NvdResponse = req
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("fetching NVD references for {cve_id}"))?
            .json()
            .context("parsing NVD response")?;

        let mut poc = PocInfo::default();
        let refs = resp.vulnerabilities.first().map(|v| v.cve.references.as_slice());
        for reference in refs.unwrap_or_default() {
            let url = reference.url.to_ascii_lowercase();
            let exploit_tagged = reference.tags.iter().any(|t| {
                let t = t.to_ascii_lowercase();
                t == "exploit" || t.contains("proof of concept") || t.contains("proof-of-concept")
            });
            if exploit_tagged {
                poc.has_poc = true;
                poc.maturity = poc.maturity.max(70.0);
            }
            if url.contains("exploit-db.com") {
                poc.has_poc = true;
                poc.weaponized = true;
                poc.maturity = poc.maturity.max(90.0);
            }
            if url.contains("metasploit") || url.contains("rapid7.com") {
                poc.has_poc = true;
                poc.weaponized = true;
                poc.maturity = poc.maturity.max(100.0);
            }
            if url.contains("nuclei-templates") {
                poc.has_poc = true;
                poc.maturity = poc.maturity.max(55.0);
            }
        }
        if kev.is_some_and(|k| k.known_ransomware) {
            poc.maturity = poc.maturity.max(95.0).min(100.0);
        }
        debug!(cve = cve_id, has_poc = poc.has_poc, maturity = poc.maturity, "PoC check");
        Ok(poc)
    }
}

/// Live signal provider: KEV and EPSS prefetched for the whole batch, PoC
/// resolved lazily through an identifier-keyed cache.
///
/// The cache guarantees at most one observable answer per identifier;
/// recomputation after a racing miss is harmless since writes are idempotent.
pub struct FeedSignals {
    kev: HashMap<String, KevEntry>,
    epss: HashMap<String, EpssScore>,
    poc_cache: Mutex<HashMap<String, PocInfo>>,
    client: FeedClient,
}

impl FeedSignals {
    /// Run the synchronous batch prefetch. Feed failures degrade to signal
    /// absence with a warning; they never abort the batch.
    pub fn prefetch(client: FeedClient, cve_ids: &BTreeSet<String>) -> Self {
        let kev = match client.fetch_kev() {
            Ok(kev) => kev,
            Err(err) => {
                warn!(error = %err, "KEV catalog unavailable, treating all records as non-KEV");
                HashMap::new()
            }
        };
        let epss = if cve_ids.is_empty() {
            HashMap::new()
        } else {
            match client.fetch_epss(cve_ids) {
                Ok(epss) => epss,
                Err(err) => {
                    warn!(error = %err, "EPSS scores unavailable, using zero scores");
                    HashMap::new()
                }
            }
        };
        Self { kev, epss, poc_cache: Mutex::new(HashMap::new()), client }
    }
}

impl SignalProvider for FeedSignals {
    fn kev(&self, cve_id: &str) -> Option<KevEntry> {
        self.kev.get(cve_id).cloned()
    }

    fn epss(&self, cve_id: &str) -> Option<EpssScore> {
        self.epss.get(cve_id).copied()
    }

    fn poc(&self, cve_id: &str) -> PocInfo {
        if let Some(hit) = self.poc_cache.lock().ok().and_then(|c| c.get(cve_id).cloned()) {
            return hit;
        }
        let info = match self.client.check_poc(cve_id, self.kev.get(cve_id)) {
            Ok(info) => info,
            Err(err) => {
                debug!(cve = cve_id, error = %err, "PoC check failed, assuming none");
                PocInfo::default()
            }
        };
        if let Ok(mut cache) = self.poc_cache.lock() {
            cache.insert(cve_id.to_string(), info.clone());
        }
        info
    }
}
