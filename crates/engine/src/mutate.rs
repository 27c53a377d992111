//! Update, soft-delete, and upsert (§4.5): all three read the current row
//! set through the same ranked-CTE selection the read path uses, then
//! append new versions. `apply_versioned_batch` (here: [`apply_patch`] +
//! the per-mode wrappers) is the one routine both upsert modes and update
//! funnel through, per the Open Question decision in SPEC_FULL.md §D.1.

use crate::engine::Engine;
use crate::schema_bridge::{batch_to_records, records_to_batch};
use crate::write_path::enrich_records;
use acidlake_catalog::Table;
use acidlake_core::{
    DeleteRequest, DeleteResponseData, EngineError, EngineResult, Filter, Operator, QueryRequest,
    Record, TableIdent, UpdateRequest, UpdateResponseData, UpsertRequest, UpsertResponseData,
    COL_DELETED, COL_DELETED_AT, COL_RECORD_ID, COL_VERSION,
};
use acidlake_sql::build_query_plan;
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;

impl Engine {
    pub async fn update(&self, req: &UpdateRequest) -> EngineResult<UpdateResponseData> {
        let (ident, mut table, matched) = self
            .select_current_rows(
                &req.tenant_id,
                &req.namespace,
                &req.table,
                &req.filters,
                EngineError::update,
            )
            .await?;

        let new_versions = apply_patch(&matched, Some(&req.updates), false);
        let records_updated = new_versions.len() as u64;
        self.commit_new_versions(&ident, table.as_mut(), new_versions).await?;
        Ok(UpdateResponseData { records_updated })
    }

    pub async fn soft_delete(&self, req: &DeleteRequest) -> EngineResult<DeleteResponseData> {
        let (ident, mut table, matched) = self
            .select_current_rows(
                &req.tenant_id,
                &req.namespace,
                &req.table,
                &req.filters,
                EngineError::delete,
            )
            .await?;

        let new_versions = apply_patch(&matched, None, true);
        let records_deleted = new_versions.len() as u64;
        self.commit_new_versions(&ident, table.as_mut(), new_versions).await?;
        Ok(DeleteResponseData { records_deleted })
    }

    pub async fn upsert(&self, req: &UpsertRequest) -> EngineResult<UpsertResponseData> {
        match (&req.records, &req.filters, &req.updates) {
            (Some(records), _, _) => {
                let ident = Self::ident(&req.tenant_id, &req.namespace, &req.table);
                let mut table = self
                    .catalog
                    .load_table(&ident)
                    .await?
                    .ok_or_else(|| {
                        EngineError::update(format!("table {} does not exist", ident.catalog_name()))
                    })?;
                let enriched = enrich_records(records, &req.tenant_id);
                let result = self.apply_records_upsert(&ident, table.as_mut(), &enriched).await?;
                Ok(result)
            }
            (None, Some(filters), Some(updates)) => {
                let (ident, mut table, matched) = self
                    .select_current_rows(
                        &req.tenant_id,
                        &req.namespace,
                        &req.table,
                        filters,
                        EngineError::update,
                    )
                    .await?;
                let new_versions = apply_patch(&matched, Some(updates), false);
                let records_updated = new_versions.len() as u64;
                self.commit_new_versions(&ident, table.as_mut(), new_versions).await?;
                Ok(UpsertResponseData {
                    records_inserted: 0,
                    records_updated,
                    total_affected: records_updated,
                })
            }
            _ => Err(EngineError::validation(
                "upsert requires either 'records', or both 'filters' and 'updates'",
            )),
        }
    }

    /// Records-only upsert mode (§4.5): each incoming record's
    /// digest-derived `_record_id` is the natural key. A match against an
    /// existing, non-deleted current row produces a new version carrying
    /// the incoming payload; a miss inserts at `_version = 1`.
    pub(crate) async fn apply_records_upsert(
        &self,
        ident: &TableIdent,
        table: &mut dyn Table,
        enriched: &[Record],
    ) -> EngineResult<UpsertResponseData> {
        let ids: Vec<JsonValue> = enriched
            .iter()
            .filter_map(|r| r.get(COL_RECORD_ID).cloned())
            .collect();

        let existing_versions = if ids.is_empty() {
            HashMap::new()
        } else {
            let filter = Filter {
                field: COL_RECORD_ID.to_string(),
                operator: Operator::In,
                value: JsonValue::Array(ids),
            };
            let current = self.run_select(ident, table, &[filter]).await?;
            let mut map = HashMap::with_capacity(current.len());
            for row in current {
                if let (Some(id), Some(version)) = (
                    row.get(COL_RECORD_ID).and_then(|v| v.as_str()),
                    row.get(COL_VERSION).and_then(|v| v.as_i64()),
                ) {
                    map.insert(id.to_string(), version);
                }
            }
            map
        };

        let mut records_inserted = 0u64;
        let mut records_updated = 0u64;
        let mut final_rows = Vec::with_capacity(enriched.len());

        for mut row in enriched.iter().cloned() {
            let id = row
                .get(COL_RECORD_ID)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            match existing_versions.get(&id) {
                Some(current_version) => {
                    row.insert(COL_VERSION.to_string(), json!(current_version + 1));
                    records_updated += 1;
                }
                None => {
                    records_inserted += 1;
                }
            }
            final_rows.push(row);
        }

        if !final_rows.is_empty() {
            let schema = Self::full_arrow_schema(table.schema());
            let batch = records_to_batch(&final_rows, schema)?;
            table.append(batch).await?;
            self.caches.lock().invalidate_metadata(ident.catalog_name());
        }

        Ok(UpsertResponseData {
            records_inserted,
            records_updated,
            total_affected: records_inserted + records_updated,
        })
    }

    async fn commit_new_versions(
        &self,
        ident: &TableIdent,
        table: &mut dyn Table,
        new_versions: Vec<Record>,
    ) -> EngineResult<()> {
        if new_versions.is_empty() {
            return Ok(());
        }
        let schema = Self::full_arrow_schema(table.schema());
        let batch = records_to_batch(&new_versions, schema)?;
        table.append(batch).await?;
        self.caches.lock().invalidate_metadata(ident.catalog_name());
        Ok(())
    }

    /// Load the table and select its current, non-deleted row set matching
    /// `filters` (§4.5's "same CTE-with-ROW_NUMBER projection used for
    /// reads, constrained by the update's filters").
    pub(crate) async fn select_current_rows(
        &self,
        tenant_id: &str,
        namespace: &str,
        table_name: &str,
        filters: &[Filter],
        error_kind: impl Fn(String) -> EngineError,
    ) -> EngineResult<(TableIdent, Box<dyn Table>, Vec<Record>)> {
        let ident = Self::ident(tenant_id, namespace, table_name);
        let table = self
            .catalog
            .load_table(&ident)
            .await?
            .ok_or_else(|| error_kind(format!("table {} does not exist", ident.catalog_name())))?;
        let matched = self.run_select(&ident, table.as_ref(), filters).await?;
        Ok((ident, table, matched))
    }

    pub(crate) async fn run_select(
        &self,
        ident: &TableIdent,
        table: &dyn Table,
        filters: &[Filter],
    ) -> EngineResult<Vec<Record>> {
        let pointer = table.metadata_location();
        let synthetic = QueryRequest {
            tenant_id: ident.tenant_id.clone(),
            namespace: ident.namespace.clone(),
            table: ident.table.clone(),
            projection: None,
            aggregations: None,
            filters: filters.to_vec(),
            group_by: vec![],
            having: vec![],
            sort: vec![],
            limit: None,
            offset: None,
            include_deleted: false,
            distinct: false,
        };
        let plan = build_query_plan(&synthetic, &pointer)?;
        let tasks = table.plan_files().await?;
        let schema = Self::full_arrow_schema(table.schema());
        let source = self.query_engine.scan_files(&tasks, schema.clone()).await?;
        let result = self.query_engine.execute(&plan, &pointer, source, schema).await?;
        let mut records = Vec::new();
        for batch in &result {
            records.extend(batch_to_records(batch)?);
        }
        Ok(records)
    }
}

/// Produce new versions for each matched row (§4.5): bump `_version`,
/// refresh `_timestamp`, normalize the `_deleted_at` sentinel, then either
/// mark the row deleted or apply the update patch over it.
fn apply_patch(matched: &[Record], patch: Option<&Record>, soft_delete: bool) -> Vec<Record> {
    matched
        .iter()
        .map(|row| {
            let mut new_row = row.clone();
            let current_version = new_row.get(COL_VERSION).and_then(|v| v.as_i64()).unwrap_or(0);
            new_row.insert(COL_VERSION.to_string(), json!(current_version + 1));
            new_row.insert(
                acidlake_core::COL_TIMESTAMP.to_string(),
                json!(Utc::now().timestamp_millis()),
            );
            normalize_deleted_at(&mut new_row);

            if soft_delete {
                new_row.insert(COL_DELETED.to_string(), json!(true));
                new_row.insert(COL_DELETED_AT.to_string(), json!(Utc::now().timestamp_millis()));
            } else if let Some(patch) = patch {
                for (k, v) in patch {
                    new_row.insert(k.clone(), v.clone());
                }
            }
            new_row
        })
        .collect()
}

/// Clear NaT-like sentinel values on `_deleted_at` before a patch applies
/// (§C.6, grounded in the Python update path's explicit `NaT` string check).
fn normalize_deleted_at(row: &mut Record) {
    let is_nat_like = match row.get(COL_DELETED_AT) {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.is_empty() || s.eq_ignore_ascii_case("nat"),
        _ => false,
    };
    if is_nat_like {
        row.insert(COL_DELETED_AT.to_string(), JsonValue::Null);
    }
}
