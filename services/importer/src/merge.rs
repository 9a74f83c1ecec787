//! Dedup & Merge Engine
//!
//! - Import time: write-or-replace each record under its natural key, so the
//!   same file imported twice leaves one record per key.
//! - Maintenance: collapse records that already share a key, keeping the one
//!   with the lowest insertion sequence. The delete is a single transaction.

use crate::error::StoreError;
use crate::model::CutoffRecord;
use crate::store::{Store, UpsertOutcome};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DedupReport {
    pub dry_run: bool,
    pub records_before: u64,
    pub records_after: u64,
    /// Natural keys held by more than one record
    pub groups: usize,
    pub removed: u64,
    /// Surviving sequence number of each group
    pub retained_seqs: Vec<i64>,
}

#[derive(Clone)]
pub struct MergeEngine {
    store: Arc<dyn Store>,
}

impl MergeEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, record: &CutoffRecord) -> Result<UpsertOutcome, StoreError> {
        self.store.upsert_cutoff(record).await
    }

    pub async fn collapse_duplicates(&self, dry_run: bool) -> Result<DedupReport, StoreError> {
        let records_before = self.store.cutoff_count().await?;
        let groups = self.store.duplicate_groups().await?;

        let mut retained_seqs = Vec::with_capacity(groups.len());
        let mut doomed = Vec::new();
        for group in &groups {
            let Some((keep, rest)) = group.seqs.split_first() else {
                continue;
            };
            retained_seqs.push(*keep);
            doomed.extend_from_slice(rest);
        }

        tracing::info!(
            groups = groups.len(),
            planned = doomed.len(),
            records_before,
            dry_run,
            "duplicate scan complete"
        );

        let removed = if dry_run || doomed.is_empty() {
            0
        } else {
            self.store.delete_cutoffs(&doomed).await?
        };

        let records_after = if dry_run {
            records_before.saturating_sub(doomed.len() as u64)
        } else {
            self.store.cutoff_count().await?
        };

        Ok(DedupReport {
            dry_run,
            records_before,
            records_after,
            groups: groups.len(),
            removed: if dry_run { doomed.len() as u64 } else { removed },
            retained_seqs,
        })
    }
}
