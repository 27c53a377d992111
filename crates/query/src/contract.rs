//! The embedded query-engine client contract (§6.4). The engine itself
//! (DataFusion) is out of scope as a component; this crate only defines
//! and implements the narrow interface that executes a parameterized plan
//! against a resolved set of scan tasks.

use acidlake_catalog::ScanTask;
use acidlake_core::EngineResult;
use acidlake_sql::Plan;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

/// A connection to the embedded columnar query engine, configured once at
/// startup (§5 Shared resources: "configured once... assumed thread-safe
/// for concurrent read scans").
#[async_trait]
pub trait QueryEngineClient: Send + Sync {
    /// Read the files named by `tasks` into `schema`-shaped batches.
    async fn scan_files(
        &self,
        tasks: &[ScanTask],
        schema: SchemaRef,
    ) -> EngineResult<Vec<RecordBatch>>;

    /// Execute `plan` against an in-memory relation built from `batches`,
    /// returning the result set as record batches.
    async fn execute(
        &self,
        plan: &Plan,
        metadata_pointer: &str,
        batches: Vec<RecordBatch>,
        schema: SchemaRef,
    ) -> EngineResult<Vec<RecordBatch>>;
}
