//! Q2: is this exposed and reachable?

use tracing::debug;
use vpr_core::model::{Domain, FindingRecord};

use crate::classifier::{self, EnvContext};

const BASE_EXPOSURE: f64 = 20.0;
const BASE_REACHABILITY: f64 = 30.0;

const PUBLIC_URL_MARKERS: &[&str] = &[".com", ".org", ".net", ".io", "public", "external"];
const INTERNAL_URL_MARKERS: &[&str] = &["localhost", "127.0.0.1", "internal", "private"];
const PUBLIC_SERVICE_MARKERS: &[&str] = &[
    "auth", "login", "gateway", "api", "edge", "public", "portal", "www", "web", "frontend",
    "customer",
];

fn domain_reach_multiplier(domain: Domain) -> f64 {
    match domain {
        Domain::WebApi => 1.3,
        Domain::Database => 1.2,
        Domain::Infrastructure => 1.2,
        Domain::SearchIndex => 1.15,
        Domain::Messaging => 1.1,
        Domain::Backend => 1.05,
        Domain::Frontend => 0.9,
        Domain::BuildTools => 0.7,
        _ => 1.0,
    }
}

/// Exposure in [0,100]: 60% exposure evidence, 40% reachability.
///
/// A dynamic finding is the strongest exposure evidence (a running system
/// produced it); URLs and endpoints raise it further, the deployment
/// context scales both components, and runtime classification plus the
/// component domain drive reachability.
pub fn calculate_q2_exposure(record: &FindingRecord) -> f64 {
    let mut exposure = BASE_EXPOSURE;
    let mut reachability = BASE_REACHABILITY;

    if record.dynamic_finding {
        exposure = 75.0;
    } else if record.static_finding {
        exposure = 35.0;
    }

    if record.verified {
        let factor = if record.dynamic_finding { 1.2 } else { 1.15 };
        exposure = (exposure * factor).min(100.0);
    }

    if let Some(url) = record.url.as_deref() {
        exposure = exposure.max(85.0);
        let url = url.to_ascii_lowercase();
        if ["https://", "http://", "ws://", "wss://"].iter().any(|s| url.contains(s)) {
            exposure = exposure.max(90.0);
        }
        if PUBLIC_URL_MARKERS.iter().any(|m| url.contains(m)) {
            exposure = 95.0;
        } else if INTERNAL_URL_MARKERS.iter().any(|m| url.contains(m)) {
            exposure = exposure.min(60.0);
        }
    }

    let endpoint_count = record.endpoints.len();
    if endpoint_count > 0 {
        exposure = exposure.max(50.0 + (endpoint_count as f64 * 5.0).min(40.0));
        let joined = record.endpoints.join(" ").to_ascii_lowercase();
        if ["/api/", "/rest/", "/graphql", "/ws"].iter().any(|m| joined.contains(m)) {
            exposure = exposure.max(70.0);
        }
        if ["/admin", "/manage", "/config"].iter().any(|m| joined.contains(m)) {
            exposure = exposure.max(60.0);
        }
    }

    match classifier::environment_hint(record) {
        EnvContext::Production => {
            exposure = (exposure * 1.3).min(100.0);
            reachability = (reachability * 1.3).min(100.0);
        }
        EnvContext::Development => {
            exposure = (exposure * 0.7).max(10.0);
            reachability = (reachability * 0.7).max(10.0);
        }
        EnvContext::Unknown => {}
    }

    if classifier::is_runtime_dependency(record) {
        reachability = reachability.max(70.0);
    } else {
        reachability = reachability.min(40.0);
    }

    let domain = classifier::classify_domain(record);
    reachability = (reachability * domain_reach_multiplier(domain)).min(100.0);

    if let Some(service) = record.service.as_deref() {
        let service = service.to_ascii_lowercase();
        if PUBLIC_SERVICE_MARKERS.iter().any(|m| service.contains(m)) {
            exposure = exposure.max(60.0);
        }
    }

    let q2 = (0.6 * exposure + 0.4 * reachability).clamp(0.0, 100.0);
    debug!(exposure, reachability, domain = domain.as_str(), q2, "exposure computed");
    q2
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> FindingRecord {
        FindingRecord::from_json(value, 0)
    }

    #[test]
    fn dynamic_findings_outrank_static() {
        let dynamic = calculate_q2_exposure(&record(json!({"dynamic_finding": true})));
        let static_only = calculate_q2_exposure(&record(json!({"static_finding": true})));
        let neither = calculate_q2_exposure(&record(json!({})));
        assert!(dynamic > static_only);
        assert!(static_only > neither);
    }

    #[test]
    fn public_url_maximizes_exposure() {
        let public = record(json!({"url": "https://shop.example.com/checkout"}));
        let internal = record(json!({"url": "http://localhost:8080/debug"}));
        assert!(calculate_q2_exposure(&public) > calculate_q2_exposure(&internal));
    }

    #[test]
    fn endpoint_surface_scales_with_count() {
        let few = record(json!({"endpoints": "one.example"}));
        let many = record(json!({"endpoints": (0..12).map(|i| format!("e{i}.example"))
            .collect::<Vec<_>>().join(",")}));
        assert!(calculate_q2_exposure(&many) > calculate_q2_exposure(&few));
    }

    #[test]
    fn production_context_raises_dev_lowers() {
        let prod = record(json!({"service": "payments-production"}));
        let dev = record(json!({"service": "sandbox-payments-x"}));
        assert!(calculate_q2_exposure(&prod) > calculate_q2_exposure(&dev));
    }

    #[test]
    fn dev_dependency_caps_reachability() {
        let dev = record(json!({"file_path": "tests/mocks/dep.js", "component_name": "left-pad-x"}));
        let runtime = record(json!({"file_path": "node_modules/dep.js", "component_name": "left-pad-x"}));
        assert!(calculate_q2_exposure(&runtime) > calculate_q2_exposure(&dev));
    }

    #[test]
    fn stays_in_range() {
        let maxed = record(json!({
            "dynamic_finding": true,
            "verified": true,
            "url": "https://public.example.com",
            "endpoints": "/api/a,/api/b,/api/c,/admin",
            "service": "prod-gateway",
        }));
        let q2 = calculate_q2_exposure(&maxed);
        assert!((0.0..=100.0).contains(&q2));
        assert!(q2 > 85.0);
    }
}
