use std::collections::HashMap;

use tracing::debug;

use crate::model::FindingRecord;

/// Collapse raw findings that share an identity into one record each.
///
/// The first occurrence of an identity is kept verbatim; later occurrences
/// only increment its `nb_occurences`. Input order of first occurrences is
/// preserved. Empty input yields empty output.
pub fn deduplicate(records: Vec<FindingRecord>) -> Vec<FindingRecord> {
    let total = records.len();
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<FindingRecord> = Vec::new();

    for record in records {
        let identity = record.dedup_identity();
        match position.get(&identity) {
            Some(&idx) => unique[idx].nb_occurences += 1,
            None => {
                position.insert(identity, unique.len());
                unique.push(record);
            }
        }
    }

    debug!(total, unique = unique.len(), "deduplication complete");
    unique
}
