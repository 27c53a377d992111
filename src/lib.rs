//! # acidlake
//!
//! A multi-tenant ACID database service over object storage: tabular data
//! as immutable Parquet files, tracked by a table-format catalog's
//! append-only snapshot sequence, with tenant-scoped reads, versioned
//! writes, soft/hard delete, and compaction.
//!
//! This crate is the integration surface over the workspace's member
//! crates: [`acidlake_core`] for the operation envelope and error model,
//! [`acidlake_sql`] for filter/projection lowering, [`acidlake_catalog`]
//! for the table-format catalog contract and its reference implementation,
//! [`acidlake_query`] for the embedded query engine, and [`acidlake_engine`]
//! for the request-scoped engine that ties them together.
//!
//! ```no_run
//! use acidlake::{Engine, EngineConfig, Request, WriteRequest, WriteMode};
//!
//! # async fn run() -> acidlake::EngineResult<()> {
//! let config = EngineConfig::from_file(std::path::Path::new("config.json"))?;
//! let engine = Engine::from_config(config)?;
//!
//! let response = engine.dispatch(Request::Write(WriteRequest {
//!     tenant_id: "acme-corp".to_string(),
//!     namespace: "default".to_string(),
//!     table: "users".to_string(),
//!     records: vec![],
//!     mode: WriteMode::Append,
//!     partition: None,
//!     properties: None,
//! })).await;
//! assert!(response.success);
//! # Ok(())
//! # }
//! ```

pub use acidlake_core::*;
pub use acidlake_engine::{global, Deadline, Engine, EngineConfig};
