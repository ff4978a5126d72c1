//! CWE exposure-precondition hints and weakness class weights.
//!
//! Each entry approximates how the weakness is typically exploited so the
//! calculators can bias exploitability without overruling stronger evidence
//! (dynamic finding, verified, public URL). Unknown codes fall back to
//! family heuristics by their hundreds range.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Typical attack vector, after CVSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vector {
    Network,
    Adjacent,
    Local,
    Physical,
}

/// Privileges typically required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privileges {
    None,
    Low,
    High,
}

/// Coarse weakness category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaknessKind {
    Rce,
    Injection,
    Ssrf,
    Auth,
    Session,
    Traversal,
    Upload,
    Exposure,
    Permissions,
    Xxe,
    Xss,
    Csrf,
    Redirect,
    Info,
    Crypto,
    Dos,
    Misconfig,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CweHint {
    pub vector: Vector,
    pub user_interaction: bool,
    pub privileges: Privileges,
    pub kind: WeaknessKind,
}

impl Default for CweHint {
    fn default() -> Self {
        Self {
            vector: Vector::Network,
            user_interaction: false,
            privileges: Privileges::None,
            kind: WeaknessKind::Unknown,
        }
    }
}

const fn hint(user_interaction: bool, privileges: Privileges, kind: WeaknessKind) -> CweHint {
    CweHint { vector: Vector::Network, user_interaction, privileges, kind }
}

/// Curated hints by numeric CWE code. Duplicate codes are a table bug and
/// are rejected when the map is built.
const CWE_TABLE: &[(&str, CweHint)] = &[
    // RCE / code injection
    ("78", hint(false, Privileges::None, WeaknessKind::Rce)),
    ("77", hint(false, Privileges::None, WeaknessKind::Rce)),
    ("94", hint(false, Privileges::None, WeaknessKind::Rce)),
    ("98", hint(false, Privileges::None, WeaknessKind::Rce)),
    ("502", hint(false, Privileges::None, WeaknessKind::Rce)),
    // Injection
    ("74", hint(false, Privileges::None, WeaknessKind::Injection)),
    ("89", hint(false, Privileges::None, WeaknessKind::Injection)),
    ("564", hint(false, Privileges::None, WeaknessKind::Injection)),
    ("90", hint(false, Privileges::None, WeaknessKind::Injection)),
    ("644", hint(false, Privileges::None, WeaknessKind::Injection)),
    ("943", hint(false, Privileges::None, WeaknessKind::Injection)),
    // SSRF
    ("918", hint(false, Privileges::None, WeaknessKind::Ssrf)),
    // Authn/authz
    ("287", hint(false, Privileges::None, WeaknessKind::Auth)),
    ("306", hint(false, Privileges::None, WeaknessKind::Auth)),
    ("862", hint(false, Privileges::None, WeaknessKind::Auth)),
    ("863", hint(false, Privileges::None, WeaknessKind::Auth)),
    ("522", hint(false, Privileges::None, WeaknessKind::Auth)),
    ("521", hint(false, Privileges::None, WeaknessKind::Auth)),
    ("613", hint(false, Privileges::None, WeaknessKind::Session)),
    ("614", hint(false, Privileges::None, WeaknessKind::Session)),
    // Path traversal / file system
    ("22", hint(false, Privileges::None, WeaknessKind::Traversal)),
    ("23", hint(false, Privileges::None, WeaknessKind::Traversal)),
    ("35", hint(false, Privileges::None, WeaknessKind::Traversal)),
    ("73", hint(false, Privileges::None, WeaknessKind::Traversal)),
    // Upload / storage exposure
    ("434", hint(false, Privileges::None, WeaknessKind::Upload)),
    ("552", hint(false, Privileges::None, WeaknessKind::Exposure)),
    ("548", hint(false, Privileges::None, WeaknessKind::Exposure)),
    ("276", hint(false, Privileges::None, WeaknessKind::Permissions)),
    ("732", hint(false, Privileges::None, WeaknessKind::Permissions)),
    // XXE
    ("611", hint(false, Privileges::None, WeaknessKind::Xxe)),
    ("827", hint(false, Privileges::None, WeaknessKind::Xxe)),
    // XSS
    ("79", hint(true, Privileges::None, WeaknessKind::Xss)),
    ("80", hint(true, Privileges::None, WeaknessKind::Xss)),
    ("116", hint(true, Privileges::None, WeaknessKind::Xss)),
    // CSRF
    ("352", hint(true, Privileges::Low, WeaknessKind::Csrf)),
    // Redirects
    ("601", hint(true, Privileges::None, WeaknessKind::Redirect)),
    // Information exposure
    ("200", hint(false, Privileges::None, WeaknessKind::Info)),
    ("209", hint(false, Privileges::None, WeaknessKind::Info)),
    ("319", hint(false, Privileges::None, WeaknessKind::Info)),
    ("532", hint(false, Privileges::None, WeaknessKind::Info)),
    ("359", hint(false, Privileges::None, WeaknessKind::Info)),
    ("922", hint(false, Privileges::None, WeaknessKind::Info)),
    // Cryptography
    ("321", hint(false, Privileges::None, WeaknessKind::Crypto)),
    ("326", hint(false, Privileges::None, WeaknessKind::Crypto)),
    ("327", hint(false, Privileges::None, WeaknessKind::Crypto)),
    ("330", hint(false, Privileges::None, WeaknessKind::Crypto)),
    ("331", hint(false, Privileges::None, WeaknessKind::Crypto)),
    ("337", hint(false, Privileges::None, WeaknessKind::Crypto)),
    ("338", hint(false, Privileges::None, WeaknessKind::Crypto)),
    // Memory safety, service-facing
    ("119", hint(false, Privileges::None, WeaknessKind::Rce)),
    ("120", hint(false, Privileges::None, WeaknessKind::Rce)),
    ("125", hint(false, Privileges::None, WeaknessKind::Dos)),
    ("787", hint(false, Privileges::None, WeaknessKind::Rce)),
    ("476", hint(false, Privileges::None, WeaknessKind::Dos)),
    // DoS / resource exhaustion
    ("400", hint(false, Privileges::None, WeaknessKind::Dos)),
    ("770", hint(false, Privileges::None, WeaknessKind::Dos)),
    ("834", hint(false, Privileges::None, WeaknessKind::Dos)),
    // Misconfiguration
    ("16", hint(false, Privileges::None, WeaknessKind::Misconfig)),
    ("1188", hint(false, Privileges::None, WeaknessKind::Misconfig)),
];

static CWE_HINTS: Lazy<HashMap<&'static str, CweHint>> = Lazy::new(|| {
    let mut map = HashMap::with_capacity(CWE_TABLE.len());
    for (code, hint) in CWE_TABLE {
        let previous = map.insert(*code, *hint);
        assert!(previous.is_none(), "duplicate CWE code {code} in hint table");
    }
    map
});

/// Family fallback by hundreds range for codes outside the curated table.
fn family_fallback(code: &str) -> Option<CweHint> {
    if code.len() != 3 {
        return None;
    }
    let kind = match code.as_bytes()[0] {
        b'2' => WeaknessKind::Info,
        b'3' => WeaknessKind::Crypto,
        b'4' => WeaknessKind::Upload,
        b'5' => WeaknessKind::Exposure,
        b'6' => WeaknessKind::Xxe,
        b'7' => WeaknessKind::Dos,
        b'9' => WeaknessKind::Auth,
        _ => return None,
    };
    Some(CweHint { kind, ..CweHint::default() })
}

/// Strip a CWE code to its numeric part: `CWE-552` becomes `552`.
pub fn normalize_cwe_code(raw: &str) -> Option<String> {
    let digits: String =
        raw.chars().skip_while(|c| !c.is_ascii_digit()).take_while(char::is_ascii_digit).collect();
    if (2..=4).contains(&digits.len()) {
        Some(digits)
    } else {
        None
    }
}

/// Best-effort hint for a single CWE code, curated table first, family
/// heuristics second, neutral default last.
pub fn hint_for_cwe(raw: &str) -> CweHint {
    let Some(code) = normalize_cwe_code(raw) else {
        return CweHint::default();
    };
    if let Some(hint) = CWE_HINTS.get(code.as_str()) {
        return *hint;
    }
    family_fallback(&code).unwrap_or_default()
}

/// All numeric CWE codes present in a free-text field such as
/// `"CWE-89, CWE-564"`.
pub fn codes_from_text(raw: &str) -> Vec<String> {
    let mut codes = Vec::new();
    let mut current = String::new();
    for c in raw.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else {
            if (2..=4).contains(&current.len()) && !codes.contains(&current) {
                codes.push(current.clone());
            }
            current.clear();
        }
    }
    if (2..=4).contains(&current.len()) && !codes.contains(&current) {
        codes.push(current);
    }
    codes
}

/// Weakness class weight for exploitability: the most severe class among
/// the record's codes decides (critical exploit classes, then XSS/CSRF,
/// then info/DoS, then the neutral default).
pub fn weakness_class_weight(codes: &[String]) -> f64 {
    let kinds: Vec<WeaknessKind> = codes.iter().map(|c| hint_for_cwe(c).kind).collect();
    let is_critical = |k: &WeaknessKind| {
        matches!(
            k,
            WeaknessKind::Rce
                | WeaknessKind::Injection
                | WeaknessKind::Ssrf
                | WeaknessKind::Auth
                | WeaknessKind::Traversal
                | WeaknessKind::Xxe
        )
    };
    if kinds.iter().any(is_critical) {
        90.0
    } else if kinds.iter().any(|k| matches!(k, WeaknessKind::Xss | WeaknessKind::Csrf)) {
        60.0
    } else if kinds.iter().any(|k| matches!(k, WeaknessKind::Info | WeaknessKind::Dos)) {
        40.0
    } else {
        50.0
    }
}
