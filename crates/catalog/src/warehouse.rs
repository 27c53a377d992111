//! Reference [`CatalogClient`] implementation over the `object_store`
//! crate: table metadata as a JSON document, data files as Parquet,
//! everything under a configured warehouse prefix. Used for local
//! development and the test suite; a production deployment would instead
//! point the engine at a real REST-style or cloud metastore satisfying
//! the same contract.

use crate::contract::{CatalogClient, ScanTask, SnapshotInfo, Table};
use crate::predicate_eval::eval_keep_mask;
use acidlake_core::{EngineError, EngineResult, TableIdent, TableSchema};
use acidlake_sql::CatalogPredicate;
use arrow::array::{Array, StringArray};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use object_store::path::Path as ObjPath;
use object_store::ObjectStore;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DataFileDoc {
    path: String,
    size_bytes: u64,
    record_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotDoc {
    snapshot_id: i64,
    timestamp_ms: i64,
    data_files: Vec<DataFileDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableMetadataDoc {
    schema: TableSchema,
    snapshots: Vec<SnapshotDoc>,
}

impl TableMetadataDoc {
    fn current(&self) -> &SnapshotDoc {
        self.snapshots.last().expect("at least one snapshot always exists")
    }
}

/// Object-store-backed catalog. `root` is the warehouse prefix within the
/// store (e.g. `warehouse/` under an S3 bucket, or a tempdir for tests).
pub struct WarehouseCatalog {
    store: Arc<dyn ObjectStore>,
    root: ObjPath,
}

impl WarehouseCatalog {
    pub fn new(store: Arc<dyn ObjectStore>, root: impl Into<String>) -> Self {
        Self {
            store,
            root: ObjPath::from(root.into()),
        }
    }

    fn table_prefix(&self, identifier: &TableIdent) -> ObjPath {
        self.root
            .child(identifier.catalog_namespace())
            .child(identifier.table.clone())
    }

    fn metadata_path(&self, identifier: &TableIdent) -> ObjPath {
        self.table_prefix(identifier).child("metadata").child("current.json")
    }

    fn data_prefix(&self, identifier: &TableIdent) -> ObjPath {
        self.table_prefix(identifier).child("data")
    }

    async fn read_doc(&self, path: &ObjPath) -> EngineResult<Option<TableMetadataDoc>> {
        match self.store.get(path).await {
            Ok(result) => {
                let bytes = result
                    .bytes()
                    .await
                    .map_err(|e| EngineError::storage(e.to_string()))?;
                let doc: TableMetadataDoc =
                    serde_json::from_slice(&bytes).map_err(EngineError::from)?;
                Ok(Some(doc))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(EngineError::storage(e.to_string())),
        }
    }

    async fn write_doc(&self, path: &ObjPath, doc: &TableMetadataDoc) -> EngineResult<()> {
        let bytes = serde_json::to_vec(doc).map_err(EngineError::from)?;
        self.store
            .put(path, bytes.into())
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CatalogClient for WarehouseCatalog {
    async fn create_namespace(&self, namespace: &str) -> EngineResult<()> {
        let marker = self.root.child(namespace).child(".namespace");
        self.store
            .put(&marker, Vec::new().into())
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?;
        Ok(())
    }

    async fn create_table(
        &self,
        identifier: &TableIdent,
        schema: &TableSchema,
    ) -> EngineResult<bool> {
        let path = self.metadata_path(identifier);
        if self.read_doc(&path).await?.is_some() {
            return Ok(false);
        }
        let doc = TableMetadataDoc {
            schema: schema.clone(),
            snapshots: vec![SnapshotDoc {
                snapshot_id: 1,
                timestamp_ms: Utc::now().timestamp_millis(),
                data_files: Vec::new(),
            }],
        };
        self.write_doc(&path, &doc).await?;
        Ok(true)
    }

    async fn load_table(&self, identifier: &TableIdent) -> EngineResult<Option<Box<dyn Table>>> {
        let metadata_path = self.metadata_path(identifier);
        let Some(doc) = self.read_doc(&metadata_path).await? else {
            return Ok(None);
        };
        Ok(Some(Box::new(WarehouseTable {
            store: self.store.clone(),
            metadata_path,
            data_prefix: self.data_prefix(identifier),
            doc,
        })))
    }

    async fn list_tables(&self, tenant_id: &str, namespace: &str) -> EngineResult<Vec<String>> {
        let prefix = self
            .root
            .child(TableIdent::new(tenant_id, namespace, "").catalog_namespace());
        let listing = self
            .store
            .list_with_delimiter(Some(&prefix))
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?;
        Ok(listing
            .common_prefixes
            .into_iter()
            .filter_map(|p| p.filename().map(|s| s.to_string()))
            .collect())
    }

    async fn drop_table(&self, identifier: &TableIdent, _purge: bool) -> EngineResult<bool> {
        let metadata_path = self.metadata_path(identifier);
        if self.read_doc(&metadata_path).await?.is_none() {
            return Ok(false);
        }
        let prefix = self.table_prefix(identifier);
        let mut stream = self.store.list(Some(&prefix));
        use futures_util::StreamExt;
        let mut to_delete = Vec::new();
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(|e| EngineError::storage(e.to_string()))?;
            to_delete.push(meta.location);
        }
        for path in to_delete {
            self.store
                .delete(&path)
                .await
                .map_err(|e| EngineError::storage(e.to_string()))?;
        }
        Ok(true)
    }

    async fn drop_namespace(&self, tenant_id: &str, namespace: &str) -> EngineResult<bool> {
        if !self.namespace_is_empty(tenant_id, namespace).await? {
            return Err(EngineError::drop_namespace("namespace is not empty"));
        }
        let catalog_namespace = TableIdent::new(tenant_id, namespace, "").catalog_namespace();
        let marker = self.root.child(catalog_namespace).child(".namespace");
        match self.store.delete(&marker).await {
            Ok(()) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(EngineError::storage(e.to_string())),
        }
    }

    async fn namespace_is_empty(&self, tenant_id: &str, namespace: &str) -> EngineResult<bool> {
        let tables = self.list_tables(tenant_id, namespace).await?;
        Ok(tables.is_empty())
    }
}

struct WarehouseTable {
    store: Arc<dyn ObjectStore>,
    metadata_path: ObjPath,
    data_prefix: ObjPath,
    doc: TableMetadataDoc,
}

impl WarehouseTable {
    fn tenant_of(batch: &RecordBatch) -> EngineResult<String> {
        let column = batch
            .column_by_name("_tenant_id")
            .ok_or_else(|| EngineError::write("batch is missing _tenant_id"))?;
        let strings = column
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| EngineError::write("_tenant_id must be a string column"))?;
        if strings.is_empty() {
            return Err(EngineError::write("cannot derive tenant from an empty batch"));
        }
        Ok(strings.value(0).to_string())
    }

    async fn write_parquet(&self, tenant: &str, batch: &RecordBatch) -> EngineResult<DataFileDoc> {
        let mut buf = Vec::new();
        {
            let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None)
                .map_err(|e| EngineError::write(e.to_string()))?;
            writer
                .write(batch)
                .map_err(|e| EngineError::write(e.to_string()))?;
            writer.close().map_err(|e| EngineError::write(e.to_string()))?;
        }
        let file_name = format!("{}.parquet", Uuid::new_v4());
        let path = self.data_prefix.child(tenant.to_string()).child(file_name);
        let size_bytes = buf.len() as u64;
        self.store
            .put(&path, buf.into())
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?;
        Ok(DataFileDoc {
            path: path.to_string(),
            size_bytes,
            record_count: batch.num_rows() as u64,
        })
    }

    async fn read_parquet(&self, path: &str) -> EngineResult<RecordBatch> {
        let obj_path = ObjPath::from(path.to_string());
        let bytes = self
            .store
            .get(&obj_path)
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
            .map_err(|e| EngineError::storage(e.to_string()))?
            .build()
            .map_err(|e| EngineError::storage(e.to_string()))?;
        let batches: Vec<RecordBatch> = reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EngineError::storage(e.to_string()))?;
        arrow::compute::concat_batches(&batches[0].schema(), &batches)
            .map_err(|e| EngineError::storage(e.to_string()))
    }

    fn push_snapshot(&mut self, data_files: Vec<DataFileDoc>) {
        let next_id = self.doc.current().snapshot_id + 1;
        self.doc.snapshots.push(SnapshotDoc {
            snapshot_id: next_id,
            timestamp_ms: Utc::now().timestamp_millis(),
            data_files,
        });
    }

    async fn persist(&self) -> EngineResult<()> {
        let bytes = serde_json::to_vec(&self.doc).map_err(EngineError::from)?;
        self.store
            .put(&self.metadata_path, bytes.into())
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Table for WarehouseTable {
    fn metadata_location(&self) -> String {
        self.metadata_path.to_string()
    }

    fn schema(&self) -> &TableSchema {
        &self.doc.schema
    }

    async fn append(&mut self, batch: RecordBatch) -> EngineResult<()> {
        let tenant = Self::tenant_of(&batch)?;
        let new_file = self.write_parquet(&tenant, &batch).await?;
        let mut files = self.doc.current().data_files.clone();
        files.push(new_file);
        self.push_snapshot(files);
        self.persist().await
    }

    async fn overwrite(&mut self, batch: RecordBatch) -> EngineResult<()> {
        let tenant = Self::tenant_of(&batch)?;
        let tenant_prefix = self.data_prefix.child(tenant.clone()).to_string();

        let mut to_delete = Vec::new();
        let mut remaining = Vec::new();
        for file in &self.doc.current().data_files {
            if file.path.starts_with(&tenant_prefix) {
                to_delete.push(file.path.clone());
            } else {
                remaining.push(file.clone());
            }
        }

        let new_file = self.write_parquet(&tenant, &batch).await?;
        remaining.push(new_file);

        for path in to_delete {
            let _ = self.store.delete(&ObjPath::from(path)).await;
        }

        self.push_snapshot(remaining);
        self.persist().await
    }

    async fn delete(&mut self, predicate: &CatalogPredicate) -> EngineResult<u64> {
        let mut new_files = Vec::new();
        let mut files_rewritten = 0u64;

        for file in self.doc.current().data_files.clone() {
            let batch = self.read_parquet(&file.path).await?;
            let keep_mask = eval_keep_mask(&batch, predicate)?;
            let kept = arrow::compute::filter_record_batch(&batch, &keep_mask)
                .map_err(|e| EngineError::hard_delete(e.to_string()))?;

            if kept.num_rows() == batch.num_rows() {
                new_files.push(file);
                continue;
            }

            files_rewritten += 1;
            self.store
                .delete(&ObjPath::from(file.path.clone()))
                .await
                .map_err(|e| EngineError::storage(e.to_string()))?;

            if kept.num_rows() > 0 {
                let tenant = Self::tenant_of(&kept)?;
                new_files.push(self.write_parquet(&tenant, &kept).await?);
            }
        }

        self.push_snapshot(new_files);
        self.persist().await?;
        Ok(files_rewritten)
    }

    async fn plan_files(&self) -> EngineResult<Vec<ScanTask>> {
        Ok(self
            .doc
            .current()
            .data_files
            .iter()
            .map(|f| ScanTask {
                file_path: f.path.clone(),
                file_size_bytes: f.size_bytes,
                record_count: f.record_count,
            })
            .collect())
    }

    async fn history(&self) -> EngineResult<Vec<SnapshotInfo>> {
        Ok(self
            .doc
            .snapshots
            .iter()
            .map(|s| SnapshotInfo {
                snapshot_id: s.snapshot_id,
                timestamp: DateTime::from_timestamp_millis(s.timestamp_ms).unwrap_or_else(Utc::now),
            })
            .collect())
    }

    async fn expire_snapshots(&mut self, older_than: DateTime<Utc>) -> EngineResult<u64> {
        let cutoff_ms = older_than.timestamp_millis();
        let current_id = self.doc.current().snapshot_id;

        let (expired, kept): (Vec<_>, Vec<_>) = self
            .doc
            .snapshots
            .drain(..)
            .partition(|s| s.snapshot_id != current_id && s.timestamp_ms < cutoff_ms);

        let live_paths: std::collections::HashSet<&str> = kept
            .iter()
            .flat_map(|s| s.data_files.iter().map(|f| f.path.as_str()))
            .collect();

        for snapshot in &expired {
            for file in &snapshot.data_files {
                if !live_paths.contains(file.path.as_str()) {
                    let _ = self.store.delete(&ObjPath::from(file.path.clone())).await;
                }
            }
        }

        self.doc.snapshots = kept;
        self.persist().await?;
        Ok(expired.len() as u64)
    }
}
