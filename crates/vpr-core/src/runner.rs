use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::RankConfig;
use crate::dedup::deduplicate;
use crate::funnel::apply_funnel;
use crate::model::{FindingRecord, RankedFinding, RpiCategory, ScoreSet};
use crate::rank::{assign_ranks, primary_sort};
use crate::report::RunSummary;
use crate::tiebreak::TieBreakKey;

/// Scoring seam between the pipeline and the calculator stack.
///
/// Implementations must be safe to call from many worker threads at once:
/// a scoring call reads only its record plus read-only, pre-populated
/// signal caches.
pub trait RecordScorer: Send + Sync {
    fn score(&self, record: &FindingRecord) -> Result<ScoreSet>;
}

/// Result of a full batch run: the final order plus processing counts.
#[derive(Debug)]
pub struct BatchOutcome {
    pub ranked: Vec<RankedFinding>,
    pub summary: RunSummary,
}

fn score_one(record: FindingRecord, scorer: &dyn RecordScorer) -> Result<RankedFinding> {
    let scores = scorer.score(&record)?;
    let key = TieBreakKey::build(&record, &scores);
    Ok(RankedFinding { record, scores, key, rank: 0, category: RpiCategory::Minimal })
}

/// Run the full ranking pipeline over a raw batch.
///
/// Stages: deduplicate, score unique records in parallel, primary sort,
/// funnel re-rank, assign ranks. Records the scorer rejects are dropped and
/// counted; they never abort the batch. Output order is deterministic for a
/// given input and signal state.
pub fn run_batch(
    records: Vec<FindingRecord>,
    scorer: &dyn RecordScorer,
    config: &RankConfig,
) -> Result<BatchOutcome> {
    config.validate()?;
    let span = tracing::info_span!("rank_batch", total = records.len());
    let _guard = span.enter();

    let processed = records.len();
    let unique = deduplicate(records);
    let unique_count = unique.len();
    info!(processed, unique = unique_count, "scoring unique records");

    let results: Vec<Result<RankedFinding>> = match rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
    {
        Ok(pool) => pool.install(|| {
            use rayon::prelude::*;
            unique.into_par_iter().map(|record| score_one(record, scorer)).collect()
        }),
        Err(err) => {
            warn!(error = %err, "failed to build scoring pool; falling back to sequential");
            unique.into_iter().map(|record| score_one(record, scorer)).collect()
        }
    };

    let mut ranked = Vec::with_capacity(results.len());
    let mut errors = 0usize;
    for result in results {
        match result {
            Ok(item) => ranked.push(item),
            Err(err) => {
                errors += 1;
                debug!(error = %err, "record rejected");
            }
        }
    }
    if errors > 0 {
        warn!(errors, scored = ranked.len(), "some records were rejected");
    }

    primary_sort(&mut ranked);
    let funneled = apply_funnel(&mut ranked, &config.funnel, &config.local_weights);
    assign_ranks(&mut ranked, &config.thresholds);

    if let Some(top) = ranked.first() {
        info!(
            rank = top.rank,
            rpi = top.scores.rpi,
            title = top.record.title.as_deref().unwrap_or("(untitled)"),
            "top finding",
        );
    }
    Ok(BatchOutcome {
        ranked,
        summary: RunSummary { processed, unique: unique_count, errors, funneled },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Domain, ThreatTier};
    use anyhow::bail;
    use serde_json::json;

    /// Deterministic scorer: RPI derived from the cvss field, metadata
    /// neutral. Rejects records without minimal identity like the real
    /// calculator does.
    struct CvssScorer;

    impl RecordScorer for CvssScorer {
        fn score(&self, record: &FindingRecord) -> Result<ScoreSet> {
            if !record.has_minimal_identity() {
                bail!("record has no identity");
            }
            let rpi = record.cvss_score.unwrap_or(0.0) * 10.0;
            Ok(ScoreSet {
                q1_exploitability: 50.0,
                q2_exposure: 50.0,
                q3_impact: rpi,
                q4_fixability: 50.0,
                q5_urgency: 50.0,
                rpi,
                domain: Domain::General,
                is_runtime: true,
                has_kev: false,
                has_poc: false,
                epss_score: 0.0,
                epss_percentile: 0.0,
                threat_tier: ThreatTier::None,
            })
        }
    }

    fn record(value: serde_json::Value, index: usize) -> FindingRecord {
        FindingRecord::from_json(value, index)
    }

    #[test]
    fn ranks_by_score_and_counts_errors() {
        let records = vec![
            record(json!({"title": "low", "cvssv3_score": 3.0, "unique_id_from_tool": "l"}), 0),
            record(json!({"url": "http://no-identity"}), 1),
            record(json!({"title": "high", "cvssv3_score": 9.0, "unique_id_from_tool": "h"}), 2),
        ];
        let outcome = run_batch(records, &CvssScorer, &RankConfig::default()).unwrap();
        assert_eq!(outcome.summary.processed, 3);
        assert_eq!(outcome.summary.errors, 1);
        assert_eq!(outcome.ranked.len(), 2);
        assert_eq!(outcome.ranked[0].record.title.as_deref(), Some("high"));
        assert_eq!(outcome.ranked[0].rank, 1);
        assert_eq!(outcome.ranked[1].rank, 2);
    }

    #[test]
    fn duplicate_records_collapse_before_scoring() {
        let a = json!({"title": "dup", "vulnerability_ids": "CVE-2024-1234", "cvssv3_score": 5.0});
        let outcome = run_batch(
            vec![record(a.clone(), 0), record(a, 1)],
            &CvssScorer,
            &RankConfig::default(),
        )
        .unwrap();
        assert_eq!(outcome.summary.unique, 1);
        assert_eq!(outcome.ranked[0].record.nb_occurences, 2);
    }

    #[test]
    fn rerun_is_byte_identical() {
        let records: Vec<_> = (0..50)
            .map(|i| {
                record(
                    json!({
                        "title": format!("finding {i}"),
                        "unique_id_from_tool": format!("id-{i}"),
                        "cvssv3_score": (i % 5) as f64,
                    }),
                    i,
                )
            })
            .collect();
        let first = run_batch(records.clone(), &CvssScorer, &RankConfig::default()).unwrap();
        let second = run_batch(records, &CvssScorer, &RankConfig::default()).unwrap();
        let order = |outcome: &BatchOutcome| {
            outcome.ranked.iter().map(|r| r.record.stable_id()).collect::<Vec<_>>()
        };
        assert_eq!(order(&first), order(&second));
    }

    #[test]
    fn invalid_config_is_fatal() {
        let mut config = RankConfig::default();
        config.weights.q1 = 0.9;
        assert!(run_batch(Vec::new(), &CvssScorer, &config).is_err());
    }

    #[test]
    fn empty_batch_yields_empty_outcome() {
        let outcome = run_batch(Vec::new(), &CvssScorer, &RankConfig::default()).unwrap();
        assert!(outcome.ranked.is_empty());
        assert_eq!(outcome.summary.errors, 0);
    }
}
