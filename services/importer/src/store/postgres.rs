use super::{DuplicateGroup, Store, UpsertOutcome};
use crate::error::StoreError;
use crate::model::{CutoffRecord, EntityId, EntityKind, NaturalKey};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

const SCHEMA: &str = include_str!("../../sql/schema.sql");

/// Natural-key columns, in key order
const KEY_COLUMNS: &str =
    "institution_id, program_id, counselling_type, year, round, category, quota, rank";

const KEY_MATCH: &str = "institution_id = $1 AND program_id = $2 AND counselling_type = $3 \
     AND year = $4 AND round = $5 AND category = $6 AND quota = $7 AND rank = $8";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct DuplicateRow {
    institution_id: i64,
    program_id: i64,
    counselling_type: String,
    year: i32,
    round: i64,
    category: String,
    quota: String,
    rank: i64,
    seqs: Vec<i64>,
}

impl TryFrom<DuplicateRow> for DuplicateGroup {
    type Error = StoreError;

    fn try_from(row: DuplicateRow) -> Result<Self, Self::Error> {
        let narrow = |value: i64, column: &str| {
            u32::try_from(value)
                .map_err(|_| StoreError::Query(format!("{} out of range: {}", column, value)))
        };
        Ok(DuplicateGroup {
            key: NaturalKey {
                institution_id: EntityId(row.institution_id),
                program_id: EntityId(row.program_id),
                counselling_type: row.counselling_type,
                year: row.year,
                round: narrow(row.round, "round")?,
                category: row.category,
                quota: row.quota,
                rank: narrow(row.rank, "rank")?,
            },
            seqs: row.seqs,
        })
    }
}

impl PgStore {
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Create tables and indexes if missing
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_entity(
        &self,
        kind: EntityKind,
        name: &str,
    ) -> Result<Option<EntityId>, StoreError> {
        let sql = format!("SELECT id FROM {} WHERE name = $1", kind.table());
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id,)| EntityId(id)))
    }

    async fn insert_entity(&self, kind: EntityKind, name: &str) -> Result<EntityId, StoreError> {
        // DO UPDATE (not DO NOTHING) so RETURNING yields the winner's id on conflict
        let sql = format!(
            "INSERT INTO {} (name) VALUES ($1) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id",
            kind.table()
        );
        let (id,): (i64,) = sqlx::query_as(&sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(EntityId(id))
    }

    async fn upsert_cutoff(&self, record: &CutoffRecord) -> Result<UpsertOutcome, StoreError> {
        let key = &record.key;
        let source = &record.provenance;
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key.to_string())
            .execute(&mut *tx)
            .await?;

        let update = format!(
            "UPDATE cutoffs SET source_file = $9, source_row = $10, source_column = $11, \
             import_run = $12, imported_at = $13 WHERE {}",
            KEY_MATCH
        );
        let updated = sqlx::query(&update)
            .bind(key.institution_id.0)
            .bind(key.program_id.0)
            .bind(&key.counselling_type)
            .bind(key.year)
            .bind(i64::from(key.round))
            .bind(&key.category)
            .bind(&key.quota)
            .bind(i64::from(key.rank))
            .bind(&source.source_file)
            .bind(source.source_row as i64)
            .bind(source.source_column as i64)
            .bind(source.import_run)
            .bind(source.imported_at)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let outcome = if updated > 0 {
            UpsertOutcome::Replaced
        } else {
            let insert = format!(
                "INSERT INTO cutoffs ({}, source_file, source_row, source_column, import_run, imported_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
                KEY_COLUMNS
            );
            sqlx::query(&insert)
                .bind(key.institution_id.0)
                .bind(key.program_id.0)
                .bind(&key.counselling_type)
                .bind(key.year)
                .bind(i64::from(key.round))
                .bind(&key.category)
                .bind(&key.quota)
                .bind(i64::from(key.rank))
                .bind(&source.source_file)
                .bind(source.source_row as i64)
                .bind(source.source_column as i64)
                .bind(source.import_run)
                .bind(source.imported_at)
                .execute(&mut *tx)
                .await?;
            UpsertOutcome::Inserted
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn duplicate_groups(&self) -> Result<Vec<DuplicateGroup>, StoreError> {
        let sql = format!(
            "SELECT {cols}, array_agg(seq ORDER BY seq) AS seqs \
             FROM cutoffs GROUP BY {cols} HAVING COUNT(*) > 1 \
             ORDER BY {cols}",
            cols = KEY_COLUMNS
        );
        let rows: Vec<DuplicateRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(DuplicateGroup::try_from).collect()
    }

    async fn delete_cutoffs(&self, seqs: &[i64]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM cutoffs WHERE seq = ANY($1)")
            .bind(seqs)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted != seqs.len() as u64 {
            tx.rollback().await?;
            return Err(StoreError::Integrity(format!(
                "planned to delete {} records, statement matched {}",
                seqs.len(),
                deleted
            )));
        }

        tx.commit().await?;
        Ok(deleted)
    }

    async fn cutoff_count(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cutoffs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn entity_count(&self, kind: EntityKind) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(count as u64)
    }
}
