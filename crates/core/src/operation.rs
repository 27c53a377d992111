//! The operation envelope: typed requests, responses, and metadata (§4.1).
//!
//! Transport adapters (HTTP gateway, function-URL dispatcher) are out of
//! scope; they are expected to deserialize a raw request body into
//! [`Request`] and serialize a [`Response`] verbatim. `EXPORT_CSV`,
//! `GET_UPLOAD_URL` and `GET_DOWNLOAD_URL` are carried in [`OperationKind`]
//! for wire completeness but have no engine-side payload type: they are
//! handled entirely by the (out-of-scope) storage/export collaborators.

use crate::error::ErrorDetail;
use crate::filter::{AggregateField, Filter, ProjectionField, SortField};
use crate::schema::TableSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Every operation the wire format can name (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Query,
    Write,
    Update,
    Delete,
    HardDelete,
    Upsert,
    Compact,
    CreateTable,
    ListTables,
    DescribeTable,
    DropTable,
    DropNamespace,
    ExportCsv,
    GetUploadUrl,
    GetDownloadUrl,
}

/// A typed, already-dispatched operation request. Values of the three
/// out-of-scope kinds above never construct this enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Query(QueryRequest),
    Write(WriteRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
    HardDelete(HardDeleteRequest),
    Upsert(UpsertRequest),
    Compact(CompactRequest),
    CreateTable(CreateTableRequest),
    ListTables(ListTablesRequest),
    DescribeTable(DescribeTableRequest),
    DropTable(DropTableRequest),
    DropNamespace(DropNamespaceRequest),
}

fn default_namespace() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    pub tenant_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub table: String,
    pub records: Vec<Map<String, JsonValue>>,
    #[serde(default)]
    pub mode: WriteMode,
    #[serde(default)]
    pub partition: Option<JsonValue>,
    #[serde(default)]
    pub properties: Option<JsonValue>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    #[default]
    Append,
    Overwrite,
    Upsert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResponseData {
    pub records_written: u64,
    pub compaction_recommended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_files_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub tenant_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub table: String,
    #[serde(default)]
    pub projection: Option<Vec<ProjectionField>>,
    #[serde(default)]
    pub aggregations: Option<Vec<AggregateField>>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub having: Vec<Filter>,
    #[serde(default)]
    pub sort: Vec<SortField>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub include_deleted: bool,
    #[serde(default)]
    pub distinct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponseData {
    pub records: Vec<Map<String, JsonValue>>,
    pub query_metadata: QueryMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub row_count: u64,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned_rows: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned_bytes: Option<u64>,
    pub cache_hit: bool,
    pub query_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub tenant_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub table: String,
    pub updates: Map<String, JsonValue>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResponseData {
    pub records_updated: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub tenant_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub table: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponseData {
    pub records_deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardDeleteRequest {
    pub tenant_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub table: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardDeleteResponseData {
    pub records_deleted: u64,
    pub files_rewritten: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertRequest {
    pub tenant_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub table: String,
    #[serde(default)]
    pub records: Option<Vec<Map<String, JsonValue>>>,
    #[serde(default)]
    pub filters: Option<Vec<Filter>>,
    #[serde(default)]
    pub updates: Option<Map<String, JsonValue>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertResponseData {
    pub records_inserted: u64,
    pub records_updated: u64,
    pub total_affected: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactRequest {
    pub tenant_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub table: String,
    #[serde(default)]
    pub force: bool,
    /// Target size for each rewritten output file (§4.8 step 4, "rewrite
    /// into larger files"). The merged tenant batch is split into
    /// contiguous row chunks sized against an in-memory bytes-per-row
    /// estimate, so actual on-disk Parquet file sizes only approximate
    /// this value. `None` commits the merged batch as a single output
    /// file, same as omitting the field.
    #[serde(default)]
    pub target_file_size_mb: Option<u64>,
    #[serde(default)]
    pub expire_snapshots: bool,
    #[serde(default)]
    pub snapshot_retention_hours: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactResponseData {
    pub compacted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CompactionStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionStats {
    pub files_before: u64,
    pub files_after: u64,
    pub files_compacted: u64,
    pub files_removed: u64,
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub bytes_saved: u64,
    pub snapshots_expired: u64,
    pub compaction_time_ms: u64,
    pub small_files_remaining: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTableRequest {
    pub tenant_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub table: String,
    pub schema: TableSchema,
    #[serde(default = "default_true")]
    pub if_not_exists: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTableResponseData {
    pub table_created: bool,
    pub table_existed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTablesRequest {
    pub tenant_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTablesResponseData {
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeTableRequest {
    pub tenant_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeTableResponseData {
    pub description: TableDescription,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescription {
    pub schema: TableSchema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_snapshot_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropTableRequest {
    pub tenant_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropTableResponseData {
    pub table_dropped: bool,
    pub table_existed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropNamespaceRequest {
    pub tenant_id: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropNamespaceResponseData {
    pub namespace_dropped: bool,
    pub namespace_existed: bool,
}

/// Standard response metadata carried on every response (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub request_id: String,
    pub execution_time_ms: u64,
}

/// The uniform response envelope: `{success, data?, metadata, error?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub metadata: ResponseMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl<T> Response<T> {
    pub fn ok(data: T, request_id: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            metadata: ResponseMetadata {
                request_id: request_id.into(),
                execution_time_ms,
            },
            error: None,
        }
    }

    pub fn err(
        error: ErrorDetail,
        request_id: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            success: false,
            data: None,
            metadata: ResponseMetadata {
                request_id: request_id.into(),
                execution_time_ms,
            },
            error: Some(error),
        }
    }
}
