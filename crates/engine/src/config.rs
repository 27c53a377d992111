//! Engine configuration (§6.5): a single JSON file with per-environment
//! sections, selected by an environment variable, with `${VAR}` references
//! substituted from the process environment at load time.
//!
//! Mirrors `original_source/src/config.py`'s `Config` class: no hardcoded
//! defaults for anything environment-specific, eager validation, a missing
//! `${VAR}` reference fails the whole load rather than silently passing
//! through.

use acidlake_core::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;

/// Name of the environment variable selecting which section of the config
/// file to load (`development|staging|production|testing`).
pub const ENVIRONMENT_VAR: &str = "ACIDLAKE_ENV";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket_name: String,
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_true")]
    pub use_ssl: bool,
    #[serde(default)]
    pub path_style_access: bool,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    pub warehouse_path: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(rename = "type")]
    pub catalog_type: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuckdbConfig {
    pub threads: usize,
    #[serde(default)]
    pub memory_limit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub max_retries: u32,
    pub query_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_check_interval")]
    pub opportunistic_check_interval: u64,
    #[serde(default = "default_small_file_threshold_mb")]
    pub small_file_threshold_mb: u64,
    #[serde(default = "default_min_files_to_compact")]
    pub min_files_to_compact: usize,
    #[serde(default = "default_max_files_per_compaction")]
    pub max_files_per_compaction: usize,
}

fn default_check_interval() -> u64 {
    100
}
fn default_small_file_threshold_mb() -> u64 {
    64
}
fn default_min_files_to_compact() -> usize {
    10
}
fn default_max_files_per_compaction() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcebergConfig {
    pub compaction: CompactionConfig,
}

/// One environment's fully-resolved settings (§6.5 table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub s3: S3Config,
    pub catalog: CatalogConfig,
    pub duckdb: DuckdbConfig,
    pub performance: PerformanceConfig,
    pub iceberg: IcebergConfig,
}

/// Loaded, environment-selected configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub environment: String,
    pub inner: EnvironmentConfig,
}

impl std::ops::Deref for EngineConfig {
    type Target = EnvironmentConfig;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl EngineConfig {
    /// Load from a JSON file, selecting the section named by
    /// `ACIDLAKE_ENV`. Missing environment variable, missing section, or an
    /// unresolved `${VAR}` reference are all startup failures (§4.10
    /// `INIT_FAILURE`).
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let environment = env::var(ENVIRONMENT_VAR).map_err(|_| {
            EngineError::init_failure(format!(
                "{ENVIRONMENT_VAR} not set. Must be one of: development, staging, production, testing"
            ))
        })?;

        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::init_failure(format!("configuration file not found: {e}")))?;

        Self::from_str_for_environment(&raw, &environment)
    }

    /// Same as [`Self::from_file`] but over an already-read JSON document;
    /// split out so tests can exercise substitution without touching disk.
    pub fn from_str_for_environment(raw: &str, environment: &str) -> EngineResult<Self> {
        let mut all: HashMap<String, serde_json::Value> =
            serde_json::from_str(raw).map_err(|e| {
                EngineError::init_failure(format!("config.json is not valid JSON: {e}"))
            })?;

        let section = all.remove(environment).ok_or_else(|| {
            let available: Vec<String> = {
                let mut keys: Vec<String> = serde_json::from_str::<HashMap<String, serde_json::Value>>(raw)
                    .map(|m| m.into_keys().collect())
                    .unwrap_or_default();
                keys.sort();
                keys
            };
            EngineError::init_failure(format!(
                "environment '{environment}' not found in config.json. Available: {available:?}"
            ))
        })?;

        let substituted = substitute_env_vars(section, environment)?;
        let inner: EnvironmentConfig = serde_json::from_value(substituted).map_err(|e| {
            EngineError::init_failure(format!(
                "config.json section '{environment}' does not match the expected shape: {e}"
            ))
        })?;

        Ok(Self {
            environment: environment.to_string(),
            inner,
        })
    }
}

/// Recursively substitute `${VAR_NAME}` references with process environment
/// variables. A reference to a variable that is not set fails the whole
/// load (§6.5: "missing variable = startup failure").
fn substitute_env_vars(value: serde_json::Value, environment: &str) -> EngineResult<serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k, substitute_env_vars(v, environment)?);
            }
            Ok(serde_json::Value::Object(out))
        }
        serde_json::Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(substitute_env_vars(item, environment)?);
            }
            Ok(serde_json::Value::Array(out))
        }
        serde_json::Value::String(s) => Ok(serde_json::Value::String(substitute_string(&s, environment)?)),
        other => Ok(other),
    }
}

fn substitute_string(input: &str, environment: &str) -> EngineResult<String> {
    let mut result = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = input[i + 2..].find('}') {
                let var_name = &input[i + 2..i + 2 + end];
                let is_var_name = !var_name.is_empty()
                    && var_name.chars().all(|c| c.is_ascii_uppercase() || c == '_');
                if is_var_name {
                    let value = env::var(var_name).map_err(|_| {
                        EngineError::init_failure(format!(
                            "environment variable '{var_name}' not set, required by config for environment '{environment}'"
                        ))
                    })?;
                    result.push_str(&value);
                    i += 2 + end + 1;
                    continue;
                }
            }
        }
        let ch = input[i..].chars().next().expect("i < len");
        result.push(ch);
        i += ch.len_utf8();
    }
    Ok(result)
}

/// Derive an S3 Express One Zone endpoint from a bucket name ending in
/// `--x-s3` (§9 design note, grounded in `_init_duckdb`'s bucket-name
/// parsing). Returns `None` when the bucket is not express-tier, an
/// endpoint is already configured, or the bucket name doesn't carry a zone
/// segment.
pub fn derive_express_endpoint(s3: &S3Config) -> Option<String> {
    if s3.endpoint.is_some() {
        return None;
    }
    if !s3.bucket_name.ends_with("--x-s3") {
        return None;
    }
    let parts: Vec<&str> = s3.bucket_name.split("--").collect();
    if parts.len() < 3 {
        return None;
    }
    let zone_id = parts[parts.len() - 2];
    Some(format!("s3express-{zone_id}.{}.amazonaws.com", s3.region))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // `std::env::set_var` mutates process-global state; serialize the
    // tests that touch it so they don't race under the test harness.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn sample_json() -> &'static str {
        r#"{
            "testing": {
                "s3": {
                    "bucket_name": "acidlake-test",
                    "region": "us-east-1",
                    "warehouse_path": "warehouse/"
                },
                "catalog": { "type": "rest", "uri": "${CATALOG_URI}" },
                "duckdb": { "threads": 4 },
                "performance": { "max_retries": 3, "query_timeout_ms": 30000 },
                "iceberg": { "compaction": { "min_files_to_compact": 10 } }
            }
        }"#
    }

    #[test]
    fn missing_env_var_fails_the_load() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("CATALOG_URI");
        let err = EngineConfig::from_str_for_environment(sample_json(), "testing").unwrap_err();
        assert_eq!(err.code(), "INIT_FAILURE");
    }

    #[test]
    fn present_env_var_is_substituted() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("CATALOG_URI", "https://catalog.example.com");
        let cfg = EngineConfig::from_str_for_environment(sample_json(), "testing").unwrap();
        assert_eq!(
            cfg.catalog.uri.as_deref(),
            Some("https://catalog.example.com")
        );
        std::env::remove_var("CATALOG_URI");
    }

    #[test]
    fn unknown_environment_is_reported() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("CATALOG_URI", "x");
        let err = EngineConfig::from_str_for_environment(sample_json(), "production").unwrap_err();
        assert!(err.to_string().contains("production"));
        std::env::remove_var("CATALOG_URI");
    }

    fn s3(bucket: &str) -> S3Config {
        S3Config {
            bucket_name: bucket.to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            use_ssl: true,
            path_style_access: false,
            access_key_id: None,
            secret_access_key: None,
            warehouse_path: "warehouse/".to_string(),
        }
    }

    #[test]
    fn express_endpoint_derived_from_zone_segment() {
        let cfg = s3("mybucket--use1-az4--x-s3");
        assert_eq!(
            derive_express_endpoint(&cfg).as_deref(),
            Some("s3express-use1-az4.us-east-1.amazonaws.com")
        );
    }

    #[test]
    fn non_express_bucket_has_no_derived_endpoint() {
        assert_eq!(derive_express_endpoint(&s3("plain-bucket")), None);
    }

    #[test]
    fn too_few_segments_skip_derivation() {
        assert_eq!(derive_express_endpoint(&s3("bucket--x-s3")), None);
    }

    #[test]
    fn explicit_endpoint_overrides_derivation() {
        let mut cfg = s3("mybucket--use1-az4--x-s3");
        cfg.endpoint = Some("http://localhost:9000".to_string());
        assert_eq!(derive_express_endpoint(&cfg), None);
    }
}
