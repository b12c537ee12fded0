//! Persistence for profiles and their embedding vectors.
//!
//! The external store is a table-scoped key-value service with upsert and
//! select; everything else lives here. Writing is a fixed four-step
//! protocol:
//!
//! ```text
//! 1. upsert entity rows keyed on the natural key
//! 2. read surrogate ids back for those keys
//! 3. map key -> id, dropping (and logging) keys the store did not return
//! 4. upsert embedding rows keyed on the surrogate id, in bounded batches
//! ```
//!
//! The read-back in step 2 exists because upsert responses cannot be trusted
//! to include ids for conflicted rows on every backend. There is no
//! cross-batch transaction: a failure aborts the write but batches already
//! committed stay committed.

pub mod postgrest;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::types::{EmbeddedProfiles, PipelineError, Profile};

pub use postgrest::PostgrestStore;

/// Embedding rows written per upsert request unless configured otherwise.
pub const DEFAULT_WRITE_BATCH: usize = 50;

/// Table and column names for one entity family.
#[derive(Clone, Copy, Debug)]
pub struct TableSpec {
    pub entities: &'static str,
    pub key_column: &'static str,
    pub embeddings: &'static str,
    pub fk_column: &'static str,
}

pub const COMPANY_TABLES: TableSpec = TableSpec {
    entities: "companies",
    key_column: "business_id",
    embeddings: "company_embeddings",
    fk_column: "company_id",
};

pub const INVESTOR_TABLES: TableSpec = TableSpec {
    entities: "investors",
    key_column: "investor_key",
    embeddings: "investor_embeddings",
    fk_column: "investor_id",
};

/// Surrogate id paired with the natural key it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyedId {
    pub id: i64,
    pub key: String,
}

/// The two primitives the external store exposes.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Insert-or-update `rows` in `table`, treating `conflict_key` as the
    /// uniqueness column. Conflicting rows are replaced, their surrogate id
    /// is preserved.
    async fn upsert(
        &self,
        table: &str,
        conflict_key: &str,
        rows: &[Value],
    ) -> Result<(), PipelineError>;

    /// Surrogate ids currently assigned to `keys` in `table`.
    async fn select_ids(
        &self,
        table: &str,
        key_column: &str,
        keys: &[String],
    ) -> Result<Vec<KeyedId>, PipelineError>;
}

/// Counts reported by a completed write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub entities: usize,
    pub embeddings: usize,
    pub skipped: usize,
}

/// Drives the write protocol against any [`Backend`].
pub struct UpsertWriter<B> {
    backend: B,
    write_batch_size: usize,
}

impl<B: Backend> UpsertWriter<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            write_batch_size: DEFAULT_WRITE_BATCH,
        }
    }

    #[must_use]
    pub fn with_write_batch_size(mut self, size: usize) -> Self {
        self.write_batch_size = if size == 0 { DEFAULT_WRITE_BATCH } else { size };
        self
    }

    /// Upserts entity rows only. Used when embeddings are disabled.
    pub async fn write_entities(
        &self,
        tables: &TableSpec,
        profiles: &[Profile],
    ) -> Result<usize, PipelineError> {
        if profiles.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Value> = profiles.iter().map(|p| entity_row(tables, p)).collect();
        self.backend
            .upsert(tables.entities, tables.key_column, &rows)
            .await?;
        Ok(rows.len())
    }

    /// Runs the full four-step protocol for an embedded batch.
    pub async fn write(
        &self,
        tables: &TableSpec,
        batch: EmbeddedProfiles,
    ) -> Result<WriteReport, PipelineError> {
        if batch.is_empty() {
            return Ok(WriteReport::default());
        }
        let items = batch.into_items();

        let rows: Vec<Value> = items
            .iter()
            .map(|(profile, _)| entity_row(tables, profile))
            .collect();
        self.backend
            .upsert(tables.entities, tables.key_column, &rows)
            .await?;

        let keys: Vec<String> = items.iter().map(|(profile, _)| profile.key.clone()).collect();
        let ids = self
            .backend
            .select_ids(tables.entities, tables.key_column, &keys)
            .await?;
        let by_key: HashMap<String, i64> = ids.into_iter().map(|row| (row.key, row.id)).collect();

        let mut embedding_rows = Vec::with_capacity(items.len());
        let mut skipped = 0usize;
        for (profile, vector) in &items {
            match by_key.get(&profile.key) {
                Some(id) => embedding_rows.push(embedding_row(tables, *id, vector)),
                None => {
                    skipped += 1;
                    warn!(key = %profile.key, "store returned no id for profile, embedding skipped");
                }
            }
        }

        for chunk in embedding_rows.chunks(self.write_batch_size) {
            self.backend
                .upsert(tables.embeddings, tables.fk_column, chunk)
                .await?;
        }

        let report = WriteReport {
            entities: items.len(),
            embeddings: embedding_rows.len(),
            skipped,
        };
        info!(
            entities = report.entities,
            embeddings = report.embeddings,
            skipped = report.skipped,
            table = tables.entities,
            "store write complete"
        );
        Ok(report)
    }
}

fn entity_row(tables: &TableSpec, profile: &Profile) -> Value {
    let mut row = Map::new();
    row.insert(
        tables.key_column.to_string(),
        Value::String(profile.key.clone()),
    );
    row.insert("name".to_string(), Value::String(profile.name.clone()));
    row.insert("details".to_string(), Value::Object(profile.details.clone()));
    Value::Object(row)
}

fn embedding_row(tables: &TableSpec, id: i64, vector: &[f32]) -> Value {
    let mut row = Map::new();
    row.insert(tables.fk_column.to_string(), Value::from(id));
    row.insert(
        "embedding".to_string(),
        Value::Array(vector.iter().map(|component| Value::from(*component)).collect()),
    );
    Value::Object(row)
}
