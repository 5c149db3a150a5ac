//! Merge engine - fold a fresh batch into the persisted table

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::domain::{normalize_id, CanonicalRecord, PersistedTable};

/// Counters describing one merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub existing: usize,
    /// Ids not present before this merge
    pub inserted: usize,
    /// Ids present before whose row was superseded by the batch
    pub updated: usize,
    pub blank_ids_dropped: usize,
    pub final_rows: usize,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub table: PersistedTable,
    pub stats: MergeStats,
}

/// Combine the existing table with a new batch.
///
/// The logical sequence is existing rows followed by new rows. Rows with a
/// blank id are dropped, each id keeps its last occurrence (so a batch row
/// always supersedes the stored one), and the survivors are ordered by date
/// descending with undated rows last. Ties keep their sequence order.
pub fn merge(existing: &PersistedTable, incoming: Vec<CanonicalRecord>) -> MergeOutcome {
    let mut stats = MergeStats {
        existing: existing.len(),
        ..MergeStats::default()
    };

    // (record, came from the batch)
    let sequence: Vec<(CanonicalRecord, bool)> = existing
        .records()
        .iter()
        .cloned()
        .map(|r| (r, false))
        .chain(incoming.into_iter().map(|r| (r, true)))
        .filter_map(|(mut record, from_batch)| {
            record.id = normalize_id(&record.id);
            if record.id.is_empty() {
                stats.blank_ids_dropped += 1;
                None
            } else {
                Some((record, from_batch))
            }
        })
        .collect();

    let previously_stored: HashSet<&str> = sequence
        .iter()
        .filter(|(_, from_batch)| !from_batch)
        .map(|(r, _)| r.id.as_str())
        .collect();

    // Position of the last occurrence of each id
    let mut last_index: HashMap<&str, usize> = HashMap::with_capacity(sequence.len());
    for (i, (record, _)) in sequence.iter().enumerate() {
        last_index.insert(record.id.as_str(), i);
    }

    let mut survivors: Vec<CanonicalRecord> = Vec::with_capacity(last_index.len());
    for (i, (record, from_batch)) in sequence.iter().enumerate() {
        if last_index.get(record.id.as_str()) != Some(&i) {
            continue;
        }
        if *from_batch {
            if previously_stored.contains(record.id.as_str()) {
                stats.updated += 1;
            } else {
                stats.inserted += 1;
            }
        }
        survivors.push(record.clone());
    }

    // sort_by is stable
    survivors.sort_by(compare_dates_desc);

    stats.final_rows = survivors.len();
    MergeOutcome {
        table: PersistedTable::new(survivors),
        stats,
    }
}

fn compare_dates_desc(a: &CanonicalRecord, b: &CanonicalRecord) -> Ordering {
    match (a.date, b.date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
