//! Joining count and duration result streams
//!
//! Operation counts and per-operation duration percentiles are computed by
//! independent queries over the exact same sample population, so they must
//! agree on identity. The join is a strict lookup: a count record without a
//! duration entry is a broken invariant, not a default.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::{DurationPercentiles, MergedOperation, OperationRecord};

use super::percentile;

/// Join operation records with their duration percentiles, keyed by
/// operation hash, ordered by descending request count (stable for ties).
pub fn merge(
    records: Vec<OperationRecord>,
    durations: &HashMap<String, DurationPercentiles>,
) -> Result<Vec<MergedOperation>> {
    let mut merged = Vec::with_capacity(records.len());

    for record in records {
        let duration = durations.get(&record.operation_hash).ok_or_else(|| {
            Error::MissingDurationData {
                operation_hash: record.operation_hash.clone(),
            }
        })?;

        merged.push(MergedOperation {
            id: stable_operation_id(&record.operation_name, &record.operation_hash),
            duration: percentile::transform(duration),
            operation_hash: record.operation_hash,
            name: record.operation_name,
            kind: record.kind,
            count: record.count,
            count_ok: record.count_ok,
            percentage: record.percentage,
        });
    }

    merged.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(merged)
}

/// Deterministic opaque identifier for an operation, independent of
/// storage-internal ordering
pub fn stable_operation_id(name: &str, hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b"__");
    hasher.update(hash.as_bytes());
    hex::encode(hasher.finalize())
}
