//! The request-scoped operation engine (§2 Control flow, §5 Concurrency).
//!
//! One `Engine` instance is built once per process (§4.10, §5) and shared
//! across concurrent requests. It owns the catalog client, the query
//! engine connection, and the two TTL caches; operation implementations
//! live in sibling modules as `impl Engine` blocks.

use crate::schema_bridge::to_arrow_schema;
use crate::cache::Caches;
use crate::config::EngineConfig;
use crate::object_store_builder::build_object_store;
use acidlake_catalog::{CatalogClient, WarehouseCatalog};
use acidlake_core::{EngineError, EngineResult, OperationKind, Request, Response, TableIdent, TableSchema};
use acidlake_query::{DataFusionEngine, EngineResources, QueryEngineClient};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Per-request cooperative deadline (§5 Cancellation, §4.10 `TIMEOUT`).
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget_ms: u64,
}

impl Deadline {
    pub fn with_budget_ms(budget_ms: u64) -> Self {
        Self {
            started: Instant::now(),
            budget_ms,
        }
    }

    /// Returns a timeout error if the deadline has already passed.
    pub fn check(&self) -> EngineResult<()> {
        let elapsed = self.started.elapsed().as_millis() as u64;
        if elapsed >= self.budget_ms {
            return Err(EngineError::timeout(elapsed));
        }
        Ok(())
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl Default for Deadline {
    /// A generous default for callers that don't carry a host-provided
    /// remaining-time budget; the transport layer normally supplies one
    /// (§4.10: "host's remaining time minus a 5s grace").
    fn default() -> Self {
        Self::with_budget_ms(30_000)
    }
}

pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) catalog: Arc<dyn CatalogClient>,
    pub(crate) query_engine: Arc<dyn QueryEngineClient>,
    pub(crate) caches: Mutex<Caches>,
    pub(crate) snapshot_counters: Mutex<HashMap<String, u64>>,
    pub(crate) last_compaction_check: Mutex<HashMap<String, Instant>>,
}

impl Engine {
    /// Build from already-constructed collaborators. Used directly by
    /// tests; production startup goes through [`Self::from_config`].
    pub fn new(
        config: EngineConfig,
        catalog: Arc<dyn CatalogClient>,
        query_engine: Arc<dyn QueryEngineClient>,
    ) -> Self {
        Self {
            config,
            catalog,
            query_engine,
            caches: Mutex::new(Caches::new()),
            snapshot_counters: Mutex::new(HashMap::new()),
            last_compaction_check: Mutex::new(HashMap::new()),
        }
    }

    /// Build the engine from a loaded [`EngineConfig`]: configures the
    /// shared object store, the reference catalog, and the embedded query
    /// engine (§5: "configured once at startup").
    pub fn from_config(config: EngineConfig) -> EngineResult<Self> {
        let store = build_object_store(&config.s3)?;
        let catalog: Arc<dyn CatalogClient> =
            Arc::new(WarehouseCatalog::new(store.clone(), config.s3.warehouse_path.clone()));
        let resources = EngineResources {
            threads: config.duckdb.threads,
            memory_limit_bytes: None,
        };
        let query_engine: Arc<dyn QueryEngineClient> = Arc::new(DataFusionEngine::new(store, resources));
        Ok(Self::new(config, catalog, query_engine))
    }

    /// Load `config.json` from `path` (§6.5) and build the engine.
    pub fn from_config_file(path: &Path) -> EngineResult<Self> {
        Self::from_config(EngineConfig::from_file(path)?)
    }

    pub(crate) fn ident(tenant_id: &str, namespace: &str, table: &str) -> TableIdent {
        TableIdent::new(tenant_id, namespace, table)
    }

    pub(crate) fn full_arrow_schema(user_schema: &TableSchema) -> ::arrow_schema::SchemaRef {
        to_arrow_schema(&crate::schema_bridge::full_schema(user_schema))
    }

    /// Dispatch a parsed request to its operation handler, wrapping the
    /// typed result in the uniform response envelope (§4.1, §2 Control
    /// flow). The out-of-scope operations (`EXPORT_CSV`, `GET_UPLOAD_URL`,
    /// `GET_DOWNLOAD_URL`) never reach this method: they have no [`Request`]
    /// variant to construct one with.
    pub async fn dispatch(&self, request: Request) -> Response<serde_json::Value> {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let deadline = Deadline::default();

        let result = self.route(request, deadline).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(value) => Response::ok(value, request_id, elapsed_ms),
            Err(err) => Response::err(err.to_detail(), request_id, elapsed_ms),
        }
    }

    async fn route(&self, request: Request, deadline: Deadline) -> EngineResult<serde_json::Value> {
        let value = match request {
            Request::Query(req) => serde_json::to_value(self.query(&req).await?),
            Request::Write(req) => serde_json::to_value(self.write(&req).await?),
            Request::Update(req) => serde_json::to_value(self.update(&req).await?),
            Request::Delete(req) => serde_json::to_value(self.soft_delete(&req).await?),
            Request::HardDelete(req) => serde_json::to_value(self.hard_delete(&req, deadline).await?),
            Request::Upsert(req) => serde_json::to_value(self.upsert(&req).await?),
            Request::Compact(req) => serde_json::to_value(self.compact(&req, deadline).await?),
            Request::CreateTable(req) => serde_json::to_value(self.create_table(&req).await?),
            Request::ListTables(req) => serde_json::to_value(self.list_tables(&req).await?),
            Request::DescribeTable(req) => serde_json::to_value(self.describe_table(&req).await?),
            Request::DropTable(req) => serde_json::to_value(self.drop_table(&req).await?),
            Request::DropNamespace(req) => serde_json::to_value(self.drop_namespace(&req).await?),
        };
        value.map_err(EngineError::from)
    }
}

/// Named purely for exhaustiveness-checking against §4.1's operation list;
/// transport adapters map the wire `operation` string to this before (or
/// instead of) constructing a [`Request`].
pub fn operation_kind_is_engine_handled(kind: OperationKind) -> bool {
    !matches!(
        kind,
        OperationKind::ExportCsv | OperationKind::GetUploadUrl | OperationKind::GetDownloadUrl
    )
}

