use once_cell::sync::Lazy;
use regex::Regex;

static CVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)CVE-\d{4}-\d{4,7}").expect("cve pattern"));

/// Extract a normalized CVE id (`CVE-2015-4852`) from free text.
///
/// Accepts mixed case, surrounding text, and comma-joined lists; the first
/// match wins. Returns `None` when no CVE pattern is present.
pub fn extract_cve_id(raw: &str) -> Option<String> {
    CVE_RE.find(raw).map(|m| m.as_str().to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_noise() {
        assert_eq!(
            extract_cve_id("  fixed in cve-2021-44228 (log4shell)"),
            Some("CVE-2021-44228".to_string())
        );
    }

    #[test]
    fn first_of_list_wins() {
        assert_eq!(
            extract_cve_id("CVE-2020-1111,CVE-2020-2222"),
            Some("CVE-2020-1111".to_string())
        );
    }

    #[test]
    fn none_without_pattern() {
        assert_eq!(extract_cve_id("GHSA-xxxx-yyyy"), None);
        assert_eq!(extract_cve_id(""), None);
    }
}
