//! Core types for the acidlake operation engine.
//!
//! This crate defines the envelope the rest of the workspace dispatches on:
//! - `error`: the unified `EngineError`/`EngineResult` and wire error shape.
//! - `record`: system columns and `_record_id` derivation.
//! - `schema`: table identity and user-column schema types.
//! - `filter`: the structured filter/projection/sort/aggregation types
//!   carried on the wire (lowering to SQL lives in `acidlake-sql`).
//! - `operation`: the request/response envelope, one pair per operation.

pub mod error;
pub mod filter;
pub mod operation;
pub mod record;
pub mod schema;

pub use error::{EngineError, EngineResult, ErrorDetail};
pub use filter::{
    AggregateField, AggregateFunction, DateTransform, Filter, Operator, ProjectionField,
    SortField, SortOrder, StringTransform,
};
pub use operation::{
    CompactRequest, CompactResponseData, CompactionStats, CreateTableRequest,
    CreateTableResponseData, DeleteRequest, DeleteResponseData, DescribeTableRequest,
    DescribeTableResponseData, DropNamespaceRequest, DropNamespaceResponseData, DropTableRequest,
    DropTableResponseData, HardDeleteRequest, HardDeleteResponseData, ListTablesRequest,
    ListTablesResponseData, OperationKind, QueryMetadata, QueryRequest, QueryResponseData,
    Request, Response, ResponseMetadata, TableDescription, UpdateRequest, UpdateResponseData,
    UpsertRequest, UpsertResponseData, WriteMode, WriteRequest, WriteResponseData,
};
pub use record::{derive_record_id, Record, COL_DELETED, COL_DELETED_AT, COL_RECORD_ID,
    COL_TENANT_ID, COL_TIMESTAMP, COL_VERSION, SYSTEM_COLUMNS};
pub use schema::{ColumnType, FieldDef, TableIdent, TableSchema};
