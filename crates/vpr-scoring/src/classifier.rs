//! Domain and context classification shared by every calculator.
//!
//! All pattern tables live here so exposure, impact and fixability agree on
//! what a component is and where it runs.

use vpr_core::model::{Domain, FindingRecord};

/// Component substring patterns checked in declaration order; first match
/// wins. Checked against component name, file path and service.
const DOMAIN_PATTERNS: &[(Domain, &[&str])] = &[
    (
        Domain::WebApi,
        &[
            "spring", "struts", "tomcat", "jetty", "express", "fastapi", "django", "flask",
            "rails", "asp.net", "nginx", "apache",
        ],
    ),
    (
        Domain::Backend,
        &["java", "python", "node", "dotnet", "golang", "rust", "spring-security", "auth", "jwt",
            "oauth"],
    ),
    (
        Domain::Database,
        &["mysql", "postgres", "oracle", "mongodb", "redis", "elastic", "jdbc", "odbc",
            "hibernate", "sqlalchemy"],
    ),
    (Domain::SearchIndex, &["solr", "elastic", "lucene", "sphinx", "algolia"]),
    (Domain::Messaging, &["kafka", "rabbitmq", "activemq", "redis", "zeromq", "nats"]),
    (Domain::Infrastructure, &["docker", "kubernetes", "terraform", "ansible", "aws", "azure"]),
    (
        Domain::Frontend,
        &["react", "vue", "angular", "jquery", "bootstrap", "webpack", "babel", "postcss",
            "sass", "less"],
    ),
    (Domain::BuildTools, &["maven", "gradle", "npm", "yarn", "webpack", "rollup", "vite"]),
    (Domain::BigData, &["hadoop", "spark", "hive", "presto", "flink", "storm"]),
];

const RUNTIME_PATH_MARKERS: &[&str] = &[
    "boot-inf/lib",
    "web-inf/lib",
    "/lib/",
    ".jar",
    ".war",
    "node_modules",
    "vendor/",
    "site-packages",
    "requirements.txt",
];

const DEV_PATH_MARKERS: &[&str] = &[
    "test/",
    "tests/",
    "spec/",
    "mock/",
    "dev-dependencies",
    "devdependencies",
    "test-",
    "-test",
    "example/",
    "sample/",
];

const PROD_CONTEXT: &[&str] = &["prod", "production", "prd", "live", "release"];

const DEV_CONTEXT: &[&str] = &[
    "dev", "development", "test", "testing", "stage", "staging", "stg", "homolog", "hml", "qa",
    "uat", "sandbox", "demo",
];

/// Deployment context inferred from free-text fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvContext {
    Production,
    Development,
    Unknown,
}

pub fn classify_domain(record: &FindingRecord) -> Domain {
    let component = lower(record.component_name.as_deref());
    let file_path = lower(record.file_path.as_deref());
    let service = lower(record.service.as_deref());

    for (domain, patterns) in DOMAIN_PATTERNS {
        for pattern in *patterns {
            if component.contains(pattern) || file_path.contains(pattern) || service.contains(pattern)
            {
                return *domain;
            }
        }
    }

    // Scanner kind gives a coarse fallback when the component is anonymous.
    let kind = lower(record.scanner_kind.as_deref());
    if kind.contains("dependency") {
        if kind.contains("frontend") {
            return Domain::Frontend;
        }
        return Domain::Backend;
    }
    if kind.contains("sast") {
        return Domain::Backend;
    }
    if kind.contains("infrastructure") || kind.contains("prowler") {
        return Domain::Infrastructure;
    }
    Domain::General
}

/// Runtime vs dev/test dependency. Dev markers are more specific and are
/// checked first; a path without any marker counts as runtime.
pub fn is_runtime_dependency(record: &FindingRecord) -> bool {
    let file_path = lower(record.file_path.as_deref());
    if DEV_PATH_MARKERS.iter().any(|m| file_path.contains(m)) {
        return false;
    }
    if RUNTIME_PATH_MARKERS.iter().any(|m| file_path.contains(m)) {
        return true;
    }
    true
}

/// Production/development hint from the record's free-text context fields.
/// Ambiguous text (both or neither) resolves to `Unknown`.
pub fn environment_hint(record: &FindingRecord) -> EnvContext {
    let context = [
        record.environment.as_deref(),
        record.product.as_deref(),
        record.service.as_deref(),
        record.url.as_deref(),
        record.title.as_deref(),
        record.engagement.as_deref(),
    ]
    .iter()
    .flatten()
    .map(|s| s.to_ascii_lowercase())
    .collect::<Vec<_>>()
    .join(" ");

    let prod = PROD_CONTEXT.iter().any(|m| context.contains(m));
    let dev = DEV_CONTEXT.iter().any(|m| context.contains(m));
    match (prod, dev) {
        (true, false) => EnvContext::Production,
        (false, true) => EnvContext::Development,
        _ => EnvContext::Unknown,
    }
}

fn lower(value: Option<&str>) -> String {
    value.unwrap_or("").to_ascii_lowercase()
}
