//! The versioned read path (§4.4): resolve the metadata pointer (via the
//! metadata cache), build the ranked-CTE query plan, execute it against
//! the resolved scan set, and convert the result back to wire records.

use crate::engine::Engine;
use crate::schema_bridge::{batch_to_records, estimate_scanned_bytes};
use acidlake_core::{EngineResult, QueryMetadata, QueryRequest, QueryResponseData};
use acidlake_sql::build_query_plan;
use std::time::Instant;
use uuid::Uuid;

impl Engine {
    pub async fn query(&self, req: &QueryRequest) -> EngineResult<QueryResponseData> {
        let ident = Self::ident(&req.tenant_id, &req.namespace, &req.table);
        let metadata_key = ident.catalog_name();
        let result_key = normalized_query_key(req);

        if let Some(mut cached) = self.caches.lock().get_result(&result_key) {
            tracing::debug!(tenant_id = %req.tenant_id, table = %req.table, "query result cache hit");
            cached.query_metadata.cache_hit = true;
            cached.query_metadata.query_id = Uuid::new_v4().to_string();
            return Ok(cached);
        }
        tracing::debug!(tenant_id = %req.tenant_id, table = %req.table, "query result cache miss");

        let started = Instant::now();

        let Some(table) = self.catalog.load_table(&ident).await? else {
            // A non-existent table is a successful empty result, not an
            // error (§4.4).
            return Ok(QueryResponseData {
                records: vec![],
                query_metadata: QueryMetadata {
                    row_count: 0,
                    execution_time_ms: started.elapsed().as_millis() as u64,
                    scanned_rows: Some(0),
                    scanned_bytes: Some(0),
                    cache_hit: false,
                    query_id: Uuid::new_v4().to_string(),
                },
            });
        };

        let pointer = table.metadata_location();
        self.caches.lock().put_metadata(metadata_key, pointer.clone());

        let plan = build_query_plan(req, &pointer)?;
        let tasks = table.plan_files().await?;
        let schema = Self::full_arrow_schema(table.schema());
        let source_batches = self.query_engine.scan_files(&tasks, schema.clone()).await?;
        let result_batches = self
            .query_engine
            .execute(&plan, &pointer, source_batches, schema)
            .await?;

        let scanned_bytes = estimate_scanned_bytes(&result_batches);
        let mut records = Vec::new();
        for batch in &result_batches {
            records.extend(batch_to_records(batch)?);
        }
        let row_count = records.len() as u64;

        let response = QueryResponseData {
            records,
            query_metadata: QueryMetadata {
                row_count,
                execution_time_ms: started.elapsed().as_millis() as u64,
                scanned_rows: Some(row_count),
                scanned_bytes: Some(scanned_bytes),
                cache_hit: false,
                query_id: Uuid::new_v4().to_string(),
            },
        };

        self.caches.lock().put_result(result_key, response.clone());
        Ok(response)
    }
}

/// Digest of the normalized request used as the query-result cache key
/// (§4.6). `QueryRequest`'s field order is fixed at the type level, so
/// `serde_json`'s struct serialization is already a stable normal form.
fn normalized_query_key(req: &QueryRequest) -> String {
    serde_json::to_string(req).unwrap_or_default()
}
