//! The write path (§4.3): system-column enrichment, schema reconciliation,
//! snapshot commit, cache invalidation, and the opportunistic compaction
//! probe.

use crate::engine::Engine;
use crate::schema_bridge::records_to_batch;
use acidlake_core::{
    derive_record_id, EngineError, EngineResult, Record, WriteMode, WriteRequest,
    WriteResponseData, COL_RECORD_ID, COL_TENANT_ID, COL_TIMESTAMP, COL_VERSION,
};
use chrono::Utc;
use serde_json::json;

impl Engine {
    pub async fn write(&self, req: &WriteRequest) -> EngineResult<WriteResponseData> {
        let ident = Self::ident(&req.tenant_id, &req.namespace, &req.table);
        let mut table = self
            .catalog
            .load_table(&ident)
            .await?
            .ok_or_else(|| EngineError::write(format!("table {} does not exist", ident.catalog_name())))?;

        let enriched = enrich_records(&req.records, &req.tenant_id);

        if matches!(req.mode, WriteMode::Upsert) {
            let upserted = self.apply_records_upsert(&ident, table.as_mut(), &enriched).await?;
            self.caches.lock().invalidate_metadata(ident.catalog_name());
            let (recommended, small_files) = self.opportunistic_probe(&ident, table.as_ref()).await;
            self.note_compaction_recommendation(&ident, recommended);
            return Ok(WriteResponseData {
                records_written: upserted.total_affected,
                compaction_recommended: recommended,
                small_files_count: small_files,
            });
        }

        let schema = Self::full_arrow_schema(table.schema());
        let batch = records_to_batch(&enriched, schema)?;

        match req.mode {
            WriteMode::Append => table.append(batch).await?,
            WriteMode::Overwrite => table.overwrite(batch).await?,
            WriteMode::Upsert => unreachable!("handled above"),
        }

        self.caches.lock().invalidate_metadata(ident.catalog_name());
        let (recommended, small_files) = self.opportunistic_probe(&ident, table.as_ref()).await;
        self.note_compaction_recommendation(&ident, recommended);

        Ok(WriteResponseData {
            records_written: enriched.len() as u64,
            compaction_recommended: recommended,
            small_files_count: small_files,
        })
    }

    /// Every Nth committed snapshot (§4.8 trigger (b)), inspect the
    /// table's current scan set and recommend compaction when the
    /// small-file count crosses the configured threshold. Never fails the
    /// write that triggered it (§7 Recovery: probe failures are swallowed
    /// and logged).
    pub(crate) async fn opportunistic_probe(
        &self,
        ident: &acidlake_core::TableIdent,
        table: &dyn acidlake_catalog::Table,
    ) -> (bool, Option<u64>) {
        if !self.config.iceberg.compaction.enabled {
            return (false, None);
        }

        let key = ident.catalog_name();
        let count = {
            let mut counters = self.snapshot_counters.lock();
            let entry = counters.entry(key).or_insert(0);
            *entry += 1;
            *entry
        };

        if count % self.config.iceberg.compaction.opportunistic_check_interval != 0 {
            return (false, None);
        }

        match table.plan_files().await {
            Ok(tasks) => {
                let threshold_bytes =
                    self.config.iceberg.compaction.small_file_threshold_mb * 1024 * 1024;
                let small_count = tasks
                    .iter()
                    .filter(|t| t.file_size_bytes < threshold_bytes)
                    .count() as u64;
                let recommended = small_count >= self.config.iceberg.compaction.min_files_to_compact as u64;
                (recommended, Some(small_count))
            }
            Err(e) => {
                tracing::warn!(error = %e, "opportunistic compaction probe failed, ignoring");
                (false, None)
            }
        }
    }
}

/// Enrich each record with the six system columns (§4.3 step 1).
/// `_record_id` is a digest of the payload's non-system keys; `_version`
/// starts at 1 for every plain write (append/overwrite bring new logical
/// rows — `_version` only advances through update/upsert).
pub(crate) fn enrich_records(records: &[Record], tenant_id: &str) -> Vec<Record> {
    records
        .iter()
        .map(|record| {
            let mut enriched = record.clone();
            let record_id = derive_record_id(record);
            enriched.insert(COL_TENANT_ID.to_string(), json!(tenant_id));
            enriched.insert(COL_RECORD_ID.to_string(), json!(record_id));
            enriched.insert(COL_TIMESTAMP.to_string(), json!(Utc::now().timestamp_millis()));
            enriched.insert(COL_VERSION.to_string(), json!(1));
            enriched
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enrichment_adds_all_system_columns() {
        let mut rec = Record::new();
        rec.insert("name".to_string(), json!("A"));
        let enriched = enrich_records(&[rec], "t1");
        let r = &enriched[0];
        assert_eq!(r.get(COL_TENANT_ID).unwrap(), &json!("t1"));
        assert_eq!(r.get(COL_VERSION).unwrap(), &json!(1));
        assert!(r.contains_key(COL_RECORD_ID));
        assert!(r.contains_key(COL_TIMESTAMP));
    }

    #[test]
    fn identical_payloads_collide_on_record_id() {
        let mut a = Record::new();
        a.insert("name".to_string(), json!("A"));
        let mut b = Record::new();
        b.insert("name".to_string(), json!("A"));
        let enriched = enrich_records(&[a, b], "t1");
        assert_eq!(
            enriched[0].get(COL_RECORD_ID),
            enriched[1].get(COL_RECORD_ID)
        );
    }
}
