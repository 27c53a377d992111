//! Unified error type for the engine and its adapters.
//!
//! Every operation boundary returns `EngineResult<T>`. Errors carry enough
//! structure to be turned into the wire-level `{code, message, field?,
//! details?, suggestion?}` shape (see [`ErrorDetail`]) without the caller
//! ever seeing a language exception.

use std::collections::HashMap;
use thiserror::Error;

/// Crate-wide result alias.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Error classification for the engine's operation boundary.
///
/// One variant per error kind in the failure-semantics table. Each carries
/// a human-readable message; some carry additional structured context used
/// to populate [`ErrorDetail::field`] / [`ErrorDetail::details`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("table already exists: {table}")]
    TableExists { table: String },

    #[error("hard delete requires confirm=true")]
    ConfirmationRequired,

    #[error("write failed: {message}")]
    Write { message: String },

    #[error("query failed: {message}")]
    Query { message: String },

    #[error("update failed: {message}")]
    Update { message: String },

    #[error("delete failed: {message}")]
    Delete { message: String },

    #[error("hard delete failed: {message}")]
    HardDelete { message: String },

    #[error("compaction failed: {message}")]
    Compact { message: String },

    #[error("create table failed: {message}")]
    Create { message: String },

    #[error("list tables failed: {message}")]
    List { message: String },

    #[error("describe table failed: {message}")]
    Describe { message: String },

    #[error("drop table failed: {message}")]
    DropTable { message: String },

    #[error("drop namespace failed: {message}")]
    DropNamespace { message: String },

    #[error("storage error: {message}")]
    Storage { message: String },

    #[error("request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("engine failed to initialize: {message}")]
    InitFailure { message: String },
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn table_exists(table: impl Into<String>) -> Self {
        Self::TableExists {
            table: table.into(),
        }
    }

    pub fn write(message: impl Into<String>) -> Self {
        Self::Write {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    pub fn update(message: impl Into<String>) -> Self {
        Self::Update {
            message: message.into(),
        }
    }

    pub fn delete(message: impl Into<String>) -> Self {
        Self::Delete {
            message: message.into(),
        }
    }

    pub fn hard_delete(message: impl Into<String>) -> Self {
        Self::HardDelete {
            message: message.into(),
        }
    }

    pub fn compact(message: impl Into<String>) -> Self {
        Self::Compact {
            message: message.into(),
        }
    }

    pub fn create(message: impl Into<String>) -> Self {
        Self::Create {
            message: message.into(),
        }
    }

    pub fn list(message: impl Into<String>) -> Self {
        Self::List {
            message: message.into(),
        }
    }

    pub fn describe(message: impl Into<String>) -> Self {
        Self::Describe {
            message: message.into(),
        }
    }

    pub fn drop_table(message: impl Into<String>) -> Self {
        Self::DropTable {
            message: message.into(),
        }
    }

    pub fn drop_namespace(message: impl Into<String>) -> Self {
        Self::DropNamespace {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn timeout(elapsed_ms: u64) -> Self {
        Self::Timeout { elapsed_ms }
    }

    pub fn init_failure(message: impl Into<String>) -> Self {
        Self::InitFailure {
            message: message.into(),
        }
    }

    /// Wire-level error code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::TableExists { .. } => "TABLE_EXISTS",
            Self::ConfirmationRequired => "CONFIRMATION_REQUIRED",
            Self::Write { .. } => "WRITE_ERROR",
            Self::Query { .. } => "QUERY_ERROR",
            Self::Update { .. } => "UPDATE_ERROR",
            Self::Delete { .. } => "DELETE_ERROR",
            Self::HardDelete { .. } => "HARD_DELETE_ERROR",
            Self::Compact { .. } => "COMPACT_ERROR",
            Self::Create { .. } => "CREATE_ERROR",
            Self::List { .. } => "LIST_ERROR",
            Self::Describe { .. } => "DESCRIBE_ERROR",
            Self::DropTable { .. } => "DROP_TABLE_ERROR",
            Self::DropNamespace { .. } => "DROP_NAMESPACE_ERROR",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::InitFailure { .. } => "INIT_FAILURE",
        }
    }

    /// True for process-terminal failures: once seen, the engine instance
    /// must not be reused (§4.10 — the caller restarts the process).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::InitFailure { .. })
    }

    /// True when re-issuing the same request might succeed without any
    /// state change by the caller (cache misses, transient catalog RPCs).
    /// Catalog commit conflicts are deliberately *not* retryable here: the
    /// engine never retries writes on the caller's behalf (§5 Isolation).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Storage { .. })
    }

    /// True for the pre-dispatch validation class, which maps to HTTP 400
    /// at the (out-of-scope) transport layer regardless of operation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Render the wire-level error shape (§4.1, §7).
    pub fn to_detail(&self) -> ErrorDetail {
        let (field, details) = match self {
            Self::Validation { field, .. } => (field.clone(), None),
            Self::TableExists { table } => {
                let mut d = HashMap::new();
                d.insert("table".to_string(), table.clone());
                (None, Some(d))
            }
            _ => (None, None),
        };
        ErrorDetail {
            code: self.code().to_string(),
            message: self.to_string(),
            field,
            details,
            suggestion: self.suggestion(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Self::TableExists { .. } => {
                Some("pass if_not_exists=true to treat this as a no-op".to_string())
            }
            Self::ConfirmationRequired => Some("re-issue with confirm=true".to_string()),
            Self::Write { .. } => {
                Some("re-issue the write; _record_id is not retry-safe".to_string())
            }
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        Self::storage(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::validation(format!("invalid JSON: {e}"))
    }
}

/// Wire-level failure body, see §4.1: `{code, message, field?, details?, suggestion?}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_spec_table() {
        assert_eq!(EngineError::validation("bad").code(), "VALIDATION_ERROR");
        assert_eq!(EngineError::table_exists("t").code(), "TABLE_EXISTS");
        assert_eq!(
            EngineError::ConfirmationRequired.code(),
            "CONFIRMATION_REQUIRED"
        );
        assert_eq!(EngineError::timeout(10).code(), "TIMEOUT");
        assert_eq!(EngineError::init_failure("boom").code(), "INIT_FAILURE");
    }

    #[test]
    fn init_failure_is_terminal_only() {
        assert!(EngineError::init_failure("x").is_terminal());
        assert!(!EngineError::timeout(1).is_terminal());
        assert!(!EngineError::write("x").is_terminal());
    }

    #[test]
    fn to_detail_carries_field_for_validation() {
        let err = EngineError::validation_field("unknown operator", "filters[0].operator");
        let detail = err.to_detail();
        assert_eq!(detail.code, "VALIDATION_ERROR");
        assert_eq!(detail.field.as_deref(), Some("filters[0].operator"));
    }

    #[test]
    fn table_exists_suggests_idempotent_flag() {
        let detail = EngineError::table_exists("t_default.users").to_detail();
        assert!(detail.suggestion.unwrap().contains("if_not_exists"));
    }
}
