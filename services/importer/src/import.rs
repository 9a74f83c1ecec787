//! Import Orchestrator
//!
//! Drives one spreadsheet at a time: filename -> context, first sheet -> grid,
//! then every column independently through
//! normalize -> classify -> track -> synthesize -> resolve -> upsert.
//!
//! Columns share nothing but the entity resolver and the store, so they run
//! on a bounded pool of tokio tasks. Per-record failures are counted; only a
//! lost store connection stops the batch.

use crate::classify::RowClassifier;
use crate::config::ImportRules;
use crate::error::{ConfigError, ImportError, ResolveError, SheetError, StoreError};
use crate::filename::FilenameParser;
use crate::header::HeaderStrategy;
use crate::hierarchy::{scan_column, RecordSynthesizer};
use crate::merge::MergeEngine;
use crate::model::{CutoffRecord, EntityKind, ImportContext};
use crate::normalize::Normalizer;
use crate::resolve::EntityResolver;
use crate::sheet::{read_grid, Cell, Grid, SUPPORTED_EXTENSIONS};
use crate::store::{Store, UpsertOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

/// Counts surfaced to the caller for every file, even when nothing was written
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rows_seen: u64,
    pub records_synthesized: u64,
    pub records_written: u64,
    pub dropped_missing_context: u64,
    pub dropped_bad_rank: u64,
    pub dropped_unresolved_entity: u64,
    /// Subset of `records_written` that overwrote an existing key
    pub records_replaced: u64,
    pub rows_unknown: u64,
    pub write_failures: u64,
    pub entities_created: u64,
    pub columns_processed: u64,
    pub columns_skipped: u64,
}

impl AddAssign for ImportSummary {
    fn add_assign(&mut self, other: Self) {
        self.rows_seen += other.rows_seen;
        self.records_synthesized += other.records_synthesized;
        self.records_written += other.records_written;
        self.dropped_missing_context += other.dropped_missing_context;
        self.dropped_bad_rank += other.dropped_bad_rank;
        self.dropped_unresolved_entity += other.dropped_unresolved_entity;
        self.records_replaced += other.records_replaced;
        self.rows_unknown += other.rows_unknown;
        self.write_failures += other.write_failures;
        self.entities_created += other.entities_created;
        self.columns_processed += other.columns_processed;
        self.columns_skipped += other.columns_skipped;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileImport {
    pub file: String,
    pub context: ImportContext,
    pub run_id: Uuid,
    pub imported_at: DateTime<Utc>,
    pub summary: ImportSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Imported(FileImport),
    Skipped { file: String, reason: String },
    /// `summary` counts what was committed before the store was lost
    Failed {
        file: String,
        reason: String,
        summary: ImportSummary,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileOutcome>,
    pub totals: ImportSummary,
    /// Set when a lost store connection stopped the batch
    pub aborted: Option<String>,
}

/// Stateless pipeline stages plus the shared resolver and merge engine
struct Pipeline {
    normalizer: Normalizer,
    classifier: RowClassifier,
    resolver: EntityResolver,
    merge: MergeEngine,
}

/// Everything one column task needs, owned
struct ColumnJob {
    column: usize,
    /// Set once any column loses the store; other columns stop at the next record
    halted: Arc<AtomicBool>,
    cells: Vec<Cell>,
    strategy: HeaderStrategy,
    context: ImportContext,
    source_file: String,
    run_id: Uuid,
    imported_at: DateTime<Utc>,
}

pub struct Importer {
    pipeline: Arc<Pipeline>,
    rules: ImportRules,
    filenames: FilenameParser,
    workers: usize,
}

impl Importer {
    pub fn new(rules: ImportRules, store: Arc<dyn Store>, workers: usize) -> Result<Self, ConfigError> {
        let pipeline = Pipeline {
            normalizer: Normalizer::new(&rules.typos)?,
            classifier: RowClassifier::new(&rules.classifier)?,
            resolver: EntityResolver::new(store.clone()),
            merge: MergeEngine::new(store),
        };
        Ok(Self {
            pipeline: Arc::new(pipeline),
            filenames: FilenameParser::new(&rules.counselling_types),
            rules,
            workers: workers.max(1),
        })
    }

    /// Import every file in order. Unreadable or unrecognized files are
    /// skipped; a lost store connection stops the batch.
    pub async fn import_paths(&self, paths: &[PathBuf]) -> BatchReport {
        let mut report = BatchReport::default();

        for path in paths {
            let file = path.display().to_string();
            match self.import_file(path).await {
                Ok(import) => {
                    report.totals += import.summary.clone();
                    report.files.push(FileOutcome::Imported(import));
                }
                Err(err) if err.is_fatal_to_run() => {
                    tracing::error!(file = %file, error = %err, "aborting batch");
                    let summary = err.partial_summary().cloned().unwrap_or_default();
                    report.totals += summary.clone();
                    report.aborted = Some(err.to_string());
                    report.files.push(FileOutcome::Failed {
                        file,
                        reason: err.to_string(),
                        summary,
                    });
                    break;
                }
                Err(err) => {
                    tracing::warn!(file = %file, error = %err, "skipping file");
                    report.files.push(FileOutcome::Skipped {
                        file,
                        reason: err.to_string(),
                    });
                }
            }
        }

        report
    }

    pub async fn import_file(&self, path: &Path) -> Result<FileImport, ImportError> {
        let file = path.display().to_string();
        let context = self
            .filenames
            .parse(path)
            .ok_or_else(|| ImportError::UnrecognizedFilename(file.clone()))?;

        let owned = path.to_path_buf();
        let grid = tokio::task::spawn_blocking(move || read_grid(&owned))
            .await
            .map_err(|e| SheetError::Workbook {
                path: path.to_path_buf(),
                message: e.to_string(),
            })??;

        tracing::info!(
            file = %file,
            counselling_type = %context.counselling_type,
            year = context.year,
            round = context.round,
            rows = grid.height(),
            columns = grid.width(),
            "importing"
        );

        let run_id = Uuid::new_v4();
        let imported_at = Utc::now();
        let summary = self
            .run_grid(&grid, &context, &file, run_id, imported_at)
            .await?;

        tracing::info!(
            file = %file,
            run_id = %run_id,
            rows_seen = summary.rows_seen,
            synthesized = summary.records_synthesized,
            written = summary.records_written,
            dropped_missing_context = summary.dropped_missing_context,
            dropped_bad_rank = summary.dropped_bad_rank,
            dropped_unresolved_entity = summary.dropped_unresolved_entity,
            "imported"
        );

        Ok(FileImport {
            file,
            context,
            run_id,
            imported_at,
            summary,
        })
    }

    /// Import an already loaded grid under an explicit context
    pub async fn import_grid(
        &self,
        grid: &Grid,
        context: &ImportContext,
        source_file: &str,
    ) -> Result<ImportSummary, ImportError> {
        self.run_grid(grid, context, source_file, Uuid::new_v4(), Utc::now())
            .await
    }

    async fn run_grid(
        &self,
        grid: &Grid,
        context: &ImportContext,
        source_file: &str,
        run_id: Uuid,
        imported_at: DateTime<Utc>,
    ) -> Result<ImportSummary, ImportError> {
        let strategy = self.rules.header_strategy(&context.counselling_type).clone();
        let permits = Arc::new(Semaphore::new(self.workers));
        let halted = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for column in 0..grid.width() {
            let job = ColumnJob {
                column,
                halted: halted.clone(),
                cells: grid.column(column),
                strategy: strategy.clone(),
                context: context.clone(),
                source_file: source_file.to_string(),
                run_id,
                imported_at,
            };
            let pipeline = self.pipeline.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                // the semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();
                import_column(&pipeline, job).await
            });
        }

        // Drain every column so work committed before a failure is still counted
        let mut summary = ImportSummary::default();
        let mut fatal = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(ColumnResult { summary: column, error }) => {
                    summary += column;
                    if let Some(err) = error {
                        halted.store(true, Ordering::Relaxed);
                        fatal.get_or_insert(err);
                    }
                }
                Err(join_err) => {
                    halted.store(true, Ordering::Relaxed);
                    fatal.get_or_insert(StoreError::Unavailable(format!(
                        "column worker failed: {}",
                        join_err
                    )));
                }
            }
        }

        match fatal {
            Some(error) => Err(ImportError::StoreUnavailable {
                error,
                partial: summary,
            }),
            None => Ok(summary),
        }
    }
}

/// A column's counts, plus the store error that stopped it early
struct ColumnResult {
    summary: ImportSummary,
    error: Option<StoreError>,
}

impl ColumnResult {
    fn done(summary: ImportSummary) -> Self {
        Self {
            summary,
            error: None,
        }
    }

    fn lost(summary: ImportSummary, error: StoreError) -> Self {
        Self {
            summary,
            error: Some(error),
        }
    }
}

/// Run one column to completion, or until the store is lost
async fn import_column(pipeline: &Pipeline, job: ColumnJob) -> ColumnResult {
    let mut summary = ImportSummary::default();
    if job.halted.load(Ordering::Relaxed) {
        return ColumnResult::done(summary);
    }

    let header = job.cells.first().map(Cell::as_text).unwrap_or_default();
    let header = pipeline.normalizer.normalize(header.trim());
    let Some(institution_name) = job.strategy.institution_name(&header) else {
        // data rows under a missing header are seen, just never synthesized
        summary.rows_seen = job.cells.iter().skip(1).filter(|c| !c.is_empty()).count() as u64;
        if summary.rows_seen > 0 {
            tracing::warn!(column = job.column, file = %job.source_file, "column has data but no header");
        }
        summary.columns_skipped += 1;
        return ColumnResult::done(summary);
    };
    summary.columns_processed += 1;

    let synthesizer = RecordSynthesizer {
        institution_name: &institution_name,
        context: &job.context,
        column: job.column,
    };
    let scan = scan_column(
        &job.cells,
        &pipeline.normalizer,
        &pipeline.classifier,
        &synthesizer,
    );
    summary.rows_seen = scan.rows_seen;
    summary.rows_unknown = scan.rows_unknown;
    summary.dropped_missing_context = scan.dropped_missing_context;
    summary.dropped_bad_rank = scan.dropped_bad_rank;
    summary.records_synthesized = scan.candidates.len() as u64;

    for candidate in &scan.candidates {
        if job.halted.load(Ordering::Relaxed) {
            break;
        }
        let resolved = async {
            let institution = pipeline
                .resolver
                .resolve(EntityKind::Institution, &candidate.institution_name)
                .await?;
            let program = pipeline
                .resolver
                .resolve(EntityKind::Program, &candidate.program_name)
                .await?;
            Ok::<_, ResolveError>((institution, program))
        }
        .await;

        let (institution, program) = match resolved {
            Ok(pair) => pair,
            Err(ResolveError::Store(err)) if err.is_unavailable() => {
                return ColumnResult::lost(summary, err)
            }
            Err(err) => {
                tracing::debug!(
                    column = job.column,
                    row = candidate.source_row,
                    error = %err,
                    "unresolved entity"
                );
                summary.dropped_unresolved_entity += 1;
                continue;
            }
        };
        summary.entities_created += u64::from(institution.created) + u64::from(program.created);

        let record = CutoffRecord::new(
            candidate,
            institution.id,
            program.id,
            &job.source_file,
            job.run_id,
            job.imported_at,
        );
        match pipeline.merge.upsert(&record).await {
            Ok(outcome) => {
                summary.records_written += 1;
                if outcome == UpsertOutcome::Replaced {
                    summary.records_replaced += 1;
                }
            }
            Err(err) if err.is_unavailable() => return ColumnResult::lost(summary, err),
            Err(err) => {
                tracing::warn!(key = %record.key, error = %err, "upsert failed");
                summary.write_failures += 1;
            }
        }
    }

    tracing::debug!(
        column = job.column,
        institution = %institution_name,
        written = summary.records_written,
        "column done"
    );
    ColumnResult::done(summary)
}

/// Expand directories (one level) into supported spreadsheet files, sorted
pub fn discover_inputs(paths: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries = Vec::new();
            for entry in std::fs::read_dir(path)? {
                let candidate = entry?.path();
                if candidate.is_file() && is_supported(&candidate) {
                    entries.push(candidate);
                }
            }
            entries.sort();
            found.extend(entries);
        } else {
            found.push(path.clone());
        }
    }
    Ok(found)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::BTreeSet;

    fn context() -> ImportContext {
        ImportContext {
            counselling_type: "AIQ".into(),
            year: 2023,
            round: 1,
        }
    }

    fn importer(store: Arc<MemoryStore>, workers: usize) -> Importer {
        Importer::new(ImportRules::default(), store, workers).unwrap()
    }

    fn sample_grid() -> Grid {
        Grid::from_text_rows(&[
            &[
                "Example Medical College, City, State",
                "Grant Medical College, Grant Medical College, Mumbai",
                "",
            ],
            &["M.D. General Medicine", "MS General Surgery", ""],
            &["OPEN", "OBC", ""],
            &["ALL INDIA QUOTA", "MANAGE MENT QUOTA", ""],
            &["1024 8", "5000", "stray"],
            &["10248 0", "", ""],
            &["OBC", "6000 1", ""],
            &["2000", "", ""],
        ])
    }

    /// Natural keys rendered with entity names, independent of id assignment
    async fn named_keys(store: &MemoryStore) -> BTreeSet<(String, String, String, String, u32)> {
        let institutions = store.entities(EntityKind::Institution).await;
        let programs = store.entities(EntityKind::Program).await;
        let name = |list: &[crate::model::Entity], id| {
            list.iter()
                .find(|e| e.id == id)
                .map(|e| e.name.clone())
                .unwrap_or_default()
        };
        store
            .records()
            .await
            .into_iter()
            .map(|(_, r)| {
                (
                    name(&institutions, r.key.institution_id),
                    name(&programs, r.key.program_id),
                    r.key.category,
                    r.key.quota,
                    r.key.rank,
                )
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // END TO END
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_grid_import_counts() {
        let store = Arc::new(MemoryStore::new());
        let summary = importer(store.clone(), 2)
            .import_grid(&sample_grid(), &context(), "AIQ_2023_R1.xlsx")
            .await
            .unwrap();

        // column 0: 7 rows, 2 records, last rank follows a category reset
        // column 1: 5 rows, 2 records
        // column 2: header empty -> skipped, its one data row still seen
        assert_eq!(summary.rows_seen, 13);
        assert_eq!(summary.records_synthesized, 4);
        assert_eq!(summary.records_written, 4);
        assert_eq!(summary.dropped_missing_context, 1);
        assert_eq!(summary.columns_processed, 2);
        assert_eq!(summary.columns_skipped, 1);
        assert_eq!(summary.entities_created, 4);

        let keys = named_keys(&store).await;
        assert!(keys.contains(&(
            "Example Medical College".into(),
            "M.D. General Medicine".into(),
            "OPEN".into(),
            "ALL INDIA QUOTA".into(),
            10248
        )));
        assert!(keys.contains(&(
            "Grant Medical College".into(),
            "MS General Surgery".into(),
            "OBC".into(),
            "MANAGEMENT QUOTA".into(),
            5000
        )));
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let importer = importer(store.clone(), 4);

        importer.import_grid(&sample_grid(), &context(), "a.xlsx").await.unwrap();
        let count_once = store.cutoff_count().await.unwrap();
        let keys_once = named_keys(&store).await;

        let second = importer.import_grid(&sample_grid(), &context(), "a.xlsx").await.unwrap();

        assert_eq!(store.cutoff_count().await.unwrap(), count_once);
        assert_eq!(named_keys(&store).await, keys_once);
        assert_eq!(second.records_replaced, second.records_written);
        assert_eq!(second.entities_created, 0);
    }

    #[tokio::test]
    async fn test_column_order_does_not_change_result() {
        let forward = Arc::new(MemoryStore::new());
        importer(forward.clone(), 1)
            .import_grid(&sample_grid(), &context(), "a.xlsx")
            .await
            .unwrap();

        let g = sample_grid();
        let reversed_rows: Vec<Vec<Cell>> = (0..g.height())
            .map(|r| (0..g.width()).rev().map(|c| g.cell(r, c).clone()).collect())
            .collect();
        let backward = Arc::new(MemoryStore::new());
        importer(backward.clone(), 3)
            .import_grid(&Grid::from_rows(reversed_rows), &context(), "a.xlsx")
            .await
            .unwrap();

        assert_eq!(named_keys(&forward).await, named_keys(&backward).await);
    }

    #[tokio::test]
    async fn test_unresolvable_entity_drops_only_that_record() {
        let store = Arc::new(MemoryStore::new());
        store.fail_lookups_for("MS General Surgery").await;
        let summary = importer(store.clone(), 2)
            .import_grid(&sample_grid(), &context(), "a.xlsx")
            .await
            .unwrap();
        assert_eq!(summary.dropped_unresolved_entity, 2);
        assert_eq!(summary.records_written, 2);
    }

    #[tokio::test]
    async fn test_lost_store_aborts_with_error() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true).await;
        let err = importer(store, 2)
            .import_grid(&sample_grid(), &context(), "a.xlsx")
            .await
            .unwrap_err();
        assert!(err.is_fatal_to_run());
    }

    #[tokio::test]
    async fn test_label_spacing_and_case_map_to_one_record() {
        let store = Arc::new(MemoryStore::new());
        let importer = importer(store.clone(), 1);
        for (category, quota) in [("EWS PWD", "ALL INDIA QUOTA"), ("ews   pwd", "All India  Quota")] {
            let grid = Grid::from_text_rows(&[
                &["College, City"],
                &["MD Medicine"],
                &[category],
                &[quota],
                &["100"],
            ]);
            importer.import_grid(&grid, &context(), "a.xlsx").await.unwrap();
        }
        assert_eq!(store.cutoff_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_headerless_column_rows_are_seen() {
        let store = Arc::new(MemoryStore::new());
        let grid = Grid::from_text_rows(&[&[""], &["MD Medicine"], &[""], &["100"]]);
        let summary = importer(store, 1).import_grid(&grid, &context(), "a.xlsx").await.unwrap();
        assert_eq!(summary.columns_skipped, 1);
        assert_eq!(summary.rows_seen, 2);
        assert_eq!(summary.records_synthesized, 0);
    }

    #[tokio::test]
    async fn test_no_matches_still_reports_summary() {
        let store = Arc::new(MemoryStore::new());
        let grid = Grid::from_text_rows(&[&["College, City"], &["OPEN"], &["1024 8"]]);
        let summary = importer(store, 1).import_grid(&grid, &context(), "a.xlsx").await.unwrap();
        assert_eq!(summary.records_written, 0);
        assert_eq!(summary.dropped_missing_context, 1);
        assert_eq!(summary.rows_seen, 2);
    }

    // -------------------------------------------------------------------------
    // FILES AND BATCHES
    // -------------------------------------------------------------------------

    fn write_csv(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(
            &path,
            "\"Example Medical College, City, State\"\nMD Medicine\nOPEN\nALL INDIA QUOTA\n1024 8\n",
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_batch_skips_unrecognized_and_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_csv(dir.path(), "AIQ_2023_R1.csv");
        let unnamed = write_csv(dir.path(), "cutoffs.csv");
        let missing = dir.path().join("AIQ_2023_R2.xlsx");

        let store = Arc::new(MemoryStore::new());
        let report = importer(store.clone(), 2)
            .import_paths(&[unnamed, missing, good])
            .await;

        assert!(report.aborted.is_none());
        assert!(matches!(report.files[0], FileOutcome::Skipped { .. }));
        assert!(matches!(report.files[1], FileOutcome::Skipped { .. }));
        let FileOutcome::Imported(import) = &report.files[2] else {
            panic!("expected import, got {:?}", report.files[2]);
        };
        assert_eq!(import.context, context());
        assert_eq!(import.summary.records_written, 1);
        assert_eq!(report.totals.records_written, 1);

        let records = store.records().await;
        assert_eq!(records[0].1.provenance.import_run, import.run_id);
    }

    #[tokio::test]
    async fn test_batch_stops_when_store_is_lost() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_csv(dir.path(), "AIQ_2023_R1.csv");
        let second = write_csv(dir.path(), "AIQ_2023_R2.csv");

        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true).await;
        let report = importer(store, 1).import_paths(&[first, second]).await;

        assert!(report.aborted.is_some());
        assert_eq!(report.files.len(), 1);
        assert!(matches!(report.files[0], FileOutcome::Failed { .. }));
    }

    /// Memory store that loses its connection after a fixed number of upserts
    struct DroppingStore {
        inner: MemoryStore,
        upserts_left: std::sync::atomic::AtomicUsize,
    }

    impl DroppingStore {
        fn new(upserts: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                upserts_left: std::sync::atomic::AtomicUsize::new(upserts),
            }
        }
    }

    #[async_trait::async_trait]
    impl Store for DroppingStore {
        async fn find_entity(
            &self,
            kind: EntityKind,
            name: &str,
        ) -> Result<Option<crate::model::EntityId>, StoreError> {
            self.inner.find_entity(kind, name).await
        }

        async fn insert_entity(
            &self,
            kind: EntityKind,
            name: &str,
        ) -> Result<crate::model::EntityId, StoreError> {
            self.inner.insert_entity(kind, name).await
        }

        async fn upsert_cutoff(&self, record: &CutoffRecord) -> Result<UpsertOutcome, StoreError> {
            self.upserts_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .map_err(|_| StoreError::Unavailable("connection lost".into()))?;
            self.inner.upsert_cutoff(record).await
        }

        async fn duplicate_groups(&self) -> Result<Vec<crate::store::DuplicateGroup>, StoreError> {
            self.inner.duplicate_groups().await
        }

        async fn delete_cutoffs(&self, seqs: &[i64]) -> Result<u64, StoreError> {
            self.inner.delete_cutoffs(seqs).await
        }

        async fn cutoff_count(&self) -> Result<u64, StoreError> {
            self.inner.cutoff_count().await
        }

        async fn entity_count(&self, kind: EntityKind) -> Result<u64, StoreError> {
            self.inner.entity_count(kind).await
        }
    }

    #[tokio::test]
    async fn test_store_lost_mid_file_keeps_partial_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AIQ_2023_R1.csv");
        std::fs::write(
            &path,
            "\"Example Medical College, City\"\nMD Medicine\nOPEN\nALL INDIA QUOTA\n100\n200\n300\n400\n",
        )
        .unwrap();

        let store = Arc::new(DroppingStore::new(2));
        let importer = Importer::new(ImportRules::default(), store.clone(), 1).unwrap();
        let report = importer.import_paths(&[path]).await;

        assert_eq!(store.inner.cutoff_count().await.unwrap(), 2);
        assert_eq!(report.totals.records_written, 2);
        assert_eq!(report.totals.records_synthesized, 4);
        let FileOutcome::Failed { reason, summary, .. } = &report.files[0] else {
            panic!("expected failure, got {:?}", report.files[0]);
        };
        assert_eq!(summary.records_written, 2);
        assert_eq!(reason, "store unavailable: connection lost");
        assert_eq!(report.aborted.as_deref(), Some("store unavailable: connection lost"));
    }

    #[tokio::test]
    async fn test_lost_store_error_carries_partial_summary() {
        let store = Arc::new(DroppingStore::new(3));
        let err = Importer::new(ImportRules::default(), store, 2)
            .unwrap()
            .import_grid(&sample_grid(), &context(), "a.xlsx")
            .await
            .unwrap_err();
        assert!(err.is_fatal_to_run());
        let partial = err.partial_summary().unwrap();
        assert_eq!(partial.records_written, 3);
        assert!(partial.rows_seen > 0);
    }

    #[test]
    fn test_discover_inputs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "b_AIQ_2023_R1.csv");
        write_csv(dir.path(), "a_KEA_2023_R1.csv");
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let found = discover_inputs(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_KEA_2023_R1.csv", "b_AIQ_2023_R1.csv"]);
    }
}
