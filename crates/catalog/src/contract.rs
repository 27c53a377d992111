//! The table-format catalog client contract (§6.3). The catalog backend
//! itself (REST-style metastore or cloud metastore) is out of scope; this
//! crate only defines and implements the narrow interface the engine
//! consumes.

use acidlake_core::{EngineResult, TableIdent, TableSchema};
use acidlake_sql::CatalogPredicate;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One file entry a scan must read for a given snapshot (`scan().plan_files()`).
#[derive(Debug, Clone)]
pub struct ScanTask {
    pub file_path: String,
    pub file_size_bytes: u64,
    pub record_count: u64,
}

/// One entry in a table's snapshot history.
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub snapshot_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// A loaded, mutable handle on one catalog table.
#[async_trait]
pub trait Table: Send + Sync {
    /// URL of the metadata document for the table's current snapshot.
    fn metadata_location(&self) -> String;

    /// The table's schema (system columns + user columns).
    fn schema(&self) -> &TableSchema;

    /// Append a batch as a new snapshot.
    async fn append(&mut self, batch: RecordBatch) -> EngineResult<()>;

    /// Replace the tenant-scoped file set with `batch` as a new snapshot.
    async fn overwrite(&mut self, batch: RecordBatch) -> EngineResult<()>;

    /// Physically remove rows matching `predicate`, committing a new
    /// snapshot. Returns the number of files rewritten.
    async fn delete(&mut self, predicate: &CatalogPredicate) -> EngineResult<u64>;

    /// List of files the current snapshot's scan must read.
    async fn plan_files(&self) -> EngineResult<Vec<ScanTask>>;

    /// This table's full snapshot history, oldest first.
    async fn history(&self) -> EngineResult<Vec<SnapshotInfo>>;

    /// Expire snapshots older than `older_than`, keeping at least the
    /// current one. Returns the number of snapshots expired.
    async fn expire_snapshots(&mut self, older_than: DateTime<Utc>) -> EngineResult<u64>;
}

/// Uniform interface over table-format catalogs (§6.3).
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn create_namespace(&self, namespace: &str) -> EngineResult<()>;

    /// Returns `true` if the table was newly created, `false` if it
    /// already existed.
    async fn create_table(&self, identifier: &TableIdent, schema: &TableSchema)
        -> EngineResult<bool>;

    async fn load_table(&self, identifier: &TableIdent) -> EngineResult<Option<Box<dyn Table>>>;

    async fn list_tables(&self, tenant_id: &str, namespace: &str) -> EngineResult<Vec<String>>;

    /// Returns `true` if a table existed and was dropped.
    async fn drop_table(&self, identifier: &TableIdent, purge: bool) -> EngineResult<bool>;

    /// Returns `(existed, dropped)`. The namespace must be empty.
    async fn drop_namespace(&self, tenant_id: &str, namespace: &str) -> EngineResult<bool>;

    async fn namespace_is_empty(&self, tenant_id: &str, namespace: &str) -> EngineResult<bool>;
}
