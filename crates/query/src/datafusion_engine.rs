//! DataFusion-backed [`QueryEngineClient`]: registers the resolved scan
//! set as an in-memory table per query and executes the parameterized SQL
//! plan against it (§6.4).

use crate::contract::QueryEngineClient;
use acidlake_catalog::ScanTask;
use acidlake_core::{EngineError, EngineResult};
use acidlake_sql::Plan;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use datafusion::scalar::ScalarValue;
use object_store::path::Path as ObjPath;
use object_store::ObjectStore;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

/// Resource caps configured once at startup (§6.5's `duckdb.threads` /
/// `duckdb.memory_limit` keys, carried over to the DataFusion session).
#[derive(Debug, Clone, Copy)]
pub struct EngineResources {
    pub threads: usize,
    pub memory_limit_bytes: Option<usize>,
}

impl Default for EngineResources {
    fn default() -> Self {
        Self {
            threads: 4,
            memory_limit_bytes: None,
        }
    }
}

pub struct DataFusionEngine {
    ctx: SessionContext,
    store: Arc<dyn ObjectStore>,
}

impl DataFusionEngine {
    pub fn new(store: Arc<dyn ObjectStore>, resources: EngineResources) -> Self {
        // `memory_limit_bytes` is plumbed through for callers that build a
        // custom `RuntimeEnv` with a bounded `MemoryPool`; the default
        // session here only pins the partition count.
        let _ = resources.memory_limit_bytes;
        let config = datafusion::execution::context::SessionConfig::new()
            .with_target_partitions(resources.threads);
        Self {
            ctx: SessionContext::new_with_config(config),
            store,
        }
    }
}

#[async_trait]
impl QueryEngineClient for DataFusionEngine {
    async fn scan_files(
        &self,
        tasks: &[ScanTask],
        schema: SchemaRef,
    ) -> EngineResult<Vec<RecordBatch>> {
        let mut batches = Vec::with_capacity(tasks.len());
        for task in tasks {
            let path = ObjPath::from(task.file_path.clone());
            let bytes = self
                .store
                .get(&path)
                .await
                .map_err(|e| EngineError::query(e.to_string()))?
                .bytes()
                .await
                .map_err(|e| EngineError::query(e.to_string()))?;
            let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
                .map_err(|e| EngineError::query(e.to_string()))?
                .build()
                .map_err(|e| EngineError::query(e.to_string()))?;
            for batch in reader {
                batches.push(batch.map_err(|e| EngineError::query(e.to_string()))?);
            }
        }
        if batches.is_empty() {
            batches.push(RecordBatch::new_empty(schema));
        }
        Ok(batches)
    }

    async fn execute(
        &self,
        plan: &Plan,
        metadata_pointer: &str,
        batches: Vec<RecordBatch>,
        schema: SchemaRef,
    ) -> EngineResult<Vec<RecordBatch>> {
        let table_name = format!("scan_{}", Uuid::new_v4().simple());
        let mem_table = MemTable::try_new(schema, vec![batches])
            .map_err(|e| EngineError::query(e.to_string()))?;
        self.ctx
            .register_table(&table_name, Arc::new(mem_table))
            .map_err(|e| EngineError::query(e.to_string()))?;

        let placeholder = format!("scan('{metadata_pointer}')");
        let sql = plan.sql.replace(&placeholder, &table_name);

        let result = self.execute_sql(&sql, &plan.params).await;

        let _ = self.ctx.deregister_table(&table_name);
        result
    }
}

impl DataFusionEngine {
    async fn execute_sql(&self, sql: &str, params: &[JsonValue]) -> EngineResult<Vec<RecordBatch>> {
        let df = self
            .ctx
            .sql(sql)
            .await
            .map_err(|e| EngineError::query(e.to_string()))?;

        let scalars: Vec<ScalarValue> = params.iter().map(json_to_scalar).collect::<EngineResult<_>>()?;

        let df = if scalars.is_empty() {
            df
        } else {
            df.with_param_values(scalars)
                .map_err(|e| EngineError::query(e.to_string()))?
        };

        df.collect()
            .await
            .map_err(|e| EngineError::query(e.to_string()))
    }
}

fn json_to_scalar(value: &JsonValue) -> EngineResult<ScalarValue> {
    Ok(match value {
        JsonValue::String(s) => ScalarValue::Utf8(Some(s.clone())),
        JsonValue::Bool(b) => ScalarValue::Boolean(Some(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                ScalarValue::Int64(Some(i))
            } else if let Some(f) = n.as_f64() {
                ScalarValue::Float64(Some(f))
            } else {
                return Err(EngineError::query(format!("unrepresentable number: {n}")));
            }
        }
        JsonValue::Null => ScalarValue::Utf8(None),
        other => {
            return Err(EngineError::query(format!(
                "unsupported filter value type for SQL binding: {other}"
            )))
        }
    })
}
