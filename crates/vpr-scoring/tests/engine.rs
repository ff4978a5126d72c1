//! End-to-end pipeline behavior: dedup, scoring, ordering, funnel.

use std::cmp::Ordering;

use serde_json::{json, Value};

use vpr_core::config::RankConfig;
use vpr_core::model::FindingRecord;
use vpr_core::runner::{run_batch, BatchOutcome};
use vpr_scoring::RpiCalculator;
use vpr_signals::{EpssScore, KevEntry, SignalSet};

fn records(values: Vec<Value>) -> Vec<FindingRecord> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| FindingRecord::from_json(value, index))
        .collect()
}

fn run(values: Vec<Value>, signals: SignalSet, config: &RankConfig) -> BatchOutcome {
    let calculator = RpiCalculator::new(config.weights, Box::new(signals));
    run_batch(records(values), &calculator, config).expect("batch run")
}

fn ids(outcome: &BatchOutcome) -> Vec<String> {
    outcome.ranked.iter().map(|r| r.record.stable_id()).collect()
}

#[test]
fn all_scores_stay_in_range() {
    let mut signals = SignalSet::default();
    signals.kev.insert(
        "CVE-2024-0001".into(),
        KevEntry { known_ransomware: true, ..Default::default() },
    );
    signals
        .epss
        .insert("CVE-2024-0001".into(), EpssScore { score: 0.97, percentile: 99.9 });

    let batch = vec![
        json!({
            "title": "worst case bundle",
            "vulnerability_ids": "CVE-2024-0001",
            "cvssv3_score": 10.0,
            "nb_occurences": 1000,
            "criticality": 10,
            "verified": true,
            "dynamic_finding": true,
            "violates_sla": true,
            "url": "https://public.example.com",
            "component_name": "postgres",
        }),
        json!({"title": "mildest case", "severity": "info", "false_p": true}),
    ];
    let outcome = run(batch, signals, &RankConfig::default());
    for item in &outcome.ranked {
        for value in [
            item.scores.q1_exploitability,
            item.scores.q2_exposure,
            item.scores.q3_impact,
            item.scores.q4_fixability,
            item.scores.q5_urgency,
            item.scores.rpi,
        ] {
            assert!((0.0..=100.0).contains(&value), "out of range: {value}");
        }
    }
}

#[test]
fn duplicate_database_record_amplifies_impact() {
    // One widespread database finding submitted twice: dedup folds it into a
    // single record, and the occurrence amplifier plus the database domain
    // multiplier saturate impact.
    let finding = json!({
        "title": "outdated driver",
        "vulnerability_ids": "CVE-2024-2222",
        "cvssv3_score": 9.8,
        "nb_occurences": 150,
        "component_name": "postgres-driver",
        "violates_sla": false,
    });
    let outcome =
        run(vec![finding.clone(), finding], SignalSet::default(), &RankConfig::default());
    assert_eq!(outcome.summary.unique, 1);
    let item = &outcome.ranked[0];
    assert_eq!(item.record.nb_occurences, 151);
    assert_eq!(item.scores.q3_impact, 100.0);
}

#[test]
fn sla_override_dominates_even_with_penalties() {
    let batch = vec![
        json!({
            "title": "risk accepted but overdue",
            "violates_sla": true,
            "risk_accepted": true,
            "is_mitigated": true,
            "false_p": true,
        }),
        json!({"title": "fresh critical", "cvssv3_score": 9.8}),
    ];
    let outcome = run(batch, SignalSet::default(), &RankConfig::default());
    let overdue = outcome
        .ranked
        .iter()
        .find(|r| r.record.violates_sla)
        .expect("overdue record present");
    assert!(overdue.scores.rpi >= 85.0);
    assert_eq!(outcome.ranked[0].record.stable_id(), overdue.record.stable_id());
}

#[test]
fn primary_order_is_total() {
    let batch: Vec<Value> = (0..200)
        .map(|i| {
            json!({
                "title": "identical finding",
                "component_name": "zlib",
                "unique_id_from_tool": format!("finding-{i:04}"),
            })
        })
        .collect();
    let outcome = run(batch, SignalSet::default(), &RankConfig::default());
    assert_eq!(outcome.ranked.len(), 200);
    for pair in outcome.ranked.windows(2) {
        assert_ne!(
            pair[0].key.cmp(&pair[1].key),
            Ordering::Equal,
            "two distinct records compared equal",
        );
    }
}

#[test]
fn rerun_is_deterministic() {
    let batch: Vec<Value> = (0..120)
        .map(|i| {
            json!({
                "title": format!("finding {i}"),
                "unique_id_from_tool": format!("id-{i}"),
                "cvssv3_score": ((i * 7) % 100) as f64 / 10.0,
                "nb_occurences": (i % 13) + 1,
                "verified": i % 3 == 0,
                "violates_sla": i % 11 == 0,
            })
        })
        .collect();
    let config = RankConfig::default();
    let first = run(batch.clone(), SignalSet::default(), &config);
    let second = run(batch, SignalSet::default(), &config);
    assert_eq!(ids(&first), ids(&second));
    let rpis = |o: &BatchOutcome| o.ranked.iter().map(|r| r.scores.rpi).collect::<Vec<_>>();
    assert_eq!(rpis(&first), rpis(&second));
}

#[test]
fn funnel_reorders_only_the_pinned_cohort() {
    // SLA-violated, risk-accepted records pin at exactly RPI 85, giving an
    // oversized equal-score cohort at the head. The verified record wins the
    // primary tie-break; the widespread high-CVSS record wins the funnel's
    // local closeness. Records below the cohort must not move.
    let mut batch = vec![
        json!({
            "title": "verified member",
            "unique_id_from_tool": "m-verified",
            "violates_sla": true,
            "risk_accepted": true,
            "verified": true,
        }),
        json!({
            "title": "widespread member",
            "unique_id_from_tool": "m-widespread",
            "violates_sla": true,
            "risk_accepted": true,
            "cvssv3_score": 9.9,
            "nb_occurences": 150,
        }),
    ];
    for i in 0..6 {
        batch.push(json!({
            "title": "filler member",
            "unique_id_from_tool": format!("m-filler-{i}"),
            "violates_sla": true,
            "risk_accepted": true,
        }));
    }
    batch.push(json!({"title": "tail b", "unique_id_from_tool": "t-b", "severity": "medium"}));
    batch.push(json!({"title": "tail a", "unique_id_from_tool": "t-a", "severity": "low"}));

    let mut config = RankConfig::default();
    config.funnel.threshold = 5;

    let with_funnel = run(batch.clone(), SignalSet::default(), &config);
    config.funnel.enabled = false;
    let without_funnel = run(batch, SignalSet::default(), &config);

    // Cohort pins at 85 and outranks the tail in both runs.
    assert!(with_funnel.ranked[0].scores.rpi >= 85.0);
    assert_eq!(with_funnel.summary.funneled, Some(8));
    assert_eq!(without_funnel.summary.funneled, None);

    // Primary tie-break puts the verified member first; the funnel's local
    // closeness pulls the widespread one ahead of it.
    assert_eq!(ids(&without_funnel)[0], "m-verified");
    assert_eq!(ids(&with_funnel)[0], "m-widespread");
    assert_eq!(ids(&with_funnel)[1], "m-verified");

    // The tail keeps its relative order in both runs.
    let tail = |outcome: &BatchOutcome| {
        ids(outcome).into_iter().filter(|id| id.starts_with("t-")).collect::<Vec<_>>()
    };
    assert_eq!(tail(&with_funnel), tail(&without_funnel));
}

#[test]
fn management_penalties_rank_below_clean_findings() {
    let batch = vec![
        json!({"title": "clean", "unique_id_from_tool": "clean", "cvssv3_score": 7.0}),
        json!({
            "title": "accepted twin",
            "unique_id_from_tool": "accepted",
            "cvssv3_score": 7.0,
            "risk_accepted": true,
        }),
    ];
    let outcome = run(batch, SignalSet::default(), &RankConfig::default());
    assert_eq!(ids(&outcome), vec!["clean", "accepted"]);
    assert!(outcome.ranked[1].scores.rpi < outcome.ranked[0].scores.rpi * 0.1);
}

#[test]
fn kev_signal_outranks_equal_cvss() {
    let mut signals = SignalSet::default();
    signals.kev.insert("CVE-2024-9999".into(), KevEntry::default());
    let batch = vec![
        json!({
            "title": "no kev",
            "unique_id_from_tool": "plain",
            "vulnerability_ids": "CVE-2024-8888",
            "cvssv3_score": 8.0,
        }),
        json!({
            "title": "kev listed",
            "unique_id_from_tool": "listed",
            "vulnerability_ids": "CVE-2024-9999",
            "cvssv3_score": 8.0,
        }),
    ];
    let outcome = run(batch, signals, &RankConfig::default());
    assert_eq!(ids(&outcome)[0], "listed");
}
