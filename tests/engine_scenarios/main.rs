//! End-to-end engine scenarios (§8): one in-process `Engine` per test, an
//! in-memory object store standing in for S3, and the reference warehouse
//! catalog + embedded query engine wired exactly as `Engine::from_config`
//! would wire them against real collaborators.

use acidlake::{
    CompactRequest, CreateTableRequest, DeleteRequest, Engine, EngineConfig, Filter,
    HardDeleteRequest, Operator, ProjectionField, QueryRequest, Request, SortField, SortOrder,
    TableSchema, UpdateRequest, WriteMode, WriteRequest,
};
use acidlake_catalog::WarehouseCatalog;
use acidlake_core::{ColumnType, FieldDef};
use acidlake_engine::config::{
    CatalogConfig, CompactionConfig, DuckdbConfig, EnvironmentConfig, IcebergConfig,
    PerformanceConfig, S3Config,
};
use acidlake_query::{DataFusionEngine, EngineResources};
use object_store::memory::InMemory;
use serde_json::{json, Map, Value as JsonValue};
use std::sync::Arc;

fn test_config(small_file_threshold_mb: u64, min_files_to_compact: usize) -> EngineConfig {
    EngineConfig {
        environment: "testing".to_string(),
        inner: EnvironmentConfig {
            s3: S3Config {
                bucket_name: "test-bucket".to_string(),
                region: "us-east-1".to_string(),
                endpoint: None,
                use_ssl: true,
                path_style_access: false,
                access_key_id: None,
                secret_access_key: None,
                warehouse_path: "warehouse".to_string(),
            },
            catalog: CatalogConfig {
                catalog_type: "warehouse".to_string(),
                uri: None,
                region: None,
                name: None,
            },
            duckdb: DuckdbConfig {
                threads: 2,
                memory_limit: None,
            },
            performance: PerformanceConfig {
                max_retries: 3,
                query_timeout_ms: 30_000,
            },
            iceberg: IcebergConfig {
                compaction: CompactionConfig {
                    enabled: true,
                    opportunistic_check_interval: 100,
                    small_file_threshold_mb,
                    min_files_to_compact,
                    max_files_per_compaction: 100,
                },
            },
        },
    }
}

/// One `Engine` per test, backed by a fresh in-memory store — mirrors
/// `Engine::from_config` but swaps the S3 client for `InMemory` (§6.2/§6.3).
fn test_engine(small_file_threshold_mb: u64, min_files_to_compact: usize) -> Engine {
    let store = Arc::new(InMemory::new());
    let config = test_config(small_file_threshold_mb, min_files_to_compact);
    let catalog = Arc::new(WarehouseCatalog::new(
        store.clone(),
        config.s3.warehouse_path.clone(),
    ));
    let query_engine = Arc::new(DataFusionEngine::new(
        store,
        EngineResources {
            threads: config.duckdb.threads,
            memory_limit_bytes: None,
        },
    ));
    Engine::new(config, catalog, query_engine)
}

fn users_schema() -> TableSchema {
    TableSchema {
        fields: vec![
            FieldDef {
                name: "name".to_string(),
                ty: ColumnType::String,
                nullable: true,
            },
            FieldDef {
                name: "age".to_string(),
                ty: ColumnType::Int32,
                nullable: true,
            },
        ],
    }
}

fn record(pairs: &[(&str, JsonValue)]) -> Map<String, JsonValue> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

async fn create_users_table(engine: &Engine, tenant_id: &str) {
    let resp = engine
        .dispatch(Request::CreateTable(CreateTableRequest {
            tenant_id: tenant_id.to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            schema: users_schema(),
            if_not_exists: true,
        }))
        .await;
    assert!(resp.success, "create_table failed: {:?}", resp.error);
}

async fn seed_s1(engine: &Engine, tenant_id: &str) {
    create_users_table(engine, tenant_id).await;
    let resp = engine
        .dispatch(Request::Write(WriteRequest {
            tenant_id: tenant_id.to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            records: vec![
                record(&[("name", json!("A")), ("age", json!(30))]),
                record(&[("name", json!("B")), ("age", json!(25))]),
            ],
            mode: WriteMode::Append,
            partition: None,
            properties: None,
        }))
        .await;
    assert!(resp.success, "seed write failed: {:?}", resp.error);
}

#[tokio::test]
async fn s1_create_write_query() {
    let engine = test_engine(64, 10);
    seed_s1(&engine, "t1").await;

    let resp = engine
        .dispatch(Request::Query(QueryRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            projection: Some(vec![
                ProjectionField::Column("name".to_string()),
                ProjectionField::Column("age".to_string()),
            ]),
            aggregations: None,
            filters: vec![],
            group_by: vec![],
            having: vec![],
            sort: vec![SortField {
                field: "age".to_string(),
                order: SortOrder::Desc,
                nulls_first: None,
            }],
            limit: None,
            offset: None,
            include_deleted: false,
            distinct: false,
        }))
        .await;

    assert!(resp.success, "query failed: {:?}", resp.error);
    let data = resp.data.unwrap();
    assert_eq!(data["query_metadata"]["row_count"], json!(2));
    let records = data["records"].as_array().unwrap();
    assert_eq!(records[0]["name"], json!("A"));
    assert_eq!(records[0]["age"], json!(30));
    assert_eq!(records[1]["name"], json!("B"));
    assert_eq!(records[1]["age"], json!(25));
}

#[tokio::test]
async fn s2_update_then_latest_wins() {
    let engine = test_engine(64, 10);
    seed_s1(&engine, "t1").await;

    let update = engine
        .dispatch(Request::Update(UpdateRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            updates: record(&[("age", json!(31))]),
            filters: vec![Filter {
                field: "name".to_string(),
                operator: Operator::Eq,
                value: json!("A"),
            }],
        }))
        .await;
    assert!(update.success, "update failed: {:?}", update.error);
    assert_eq!(update.data.unwrap()["records_updated"], json!(1));

    let query = engine
        .dispatch(Request::Query(QueryRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            projection: None,
            aggregations: None,
            filters: vec![Filter {
                field: "name".to_string(),
                operator: Operator::Eq,
                value: json!("A"),
            }],
            group_by: vec![],
            having: vec![],
            sort: vec![],
            limit: None,
            offset: None,
            include_deleted: false,
            distinct: false,
        }))
        .await;
    assert!(query.success, "query failed: {:?}", query.error);
    let data = query.data.unwrap();
    let records = data["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["age"], json!(31));
    assert_eq!(records[0]["_version"], json!(2));
}

#[tokio::test]
async fn s3_soft_delete_and_include_deleted() {
    let engine = test_engine(64, 10);
    seed_s1(&engine, "t1").await;

    let delete = engine
        .dispatch(Request::Delete(DeleteRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            filters: vec![Filter {
                field: "name".to_string(),
                operator: Operator::Eq,
                value: json!("B"),
            }],
        }))
        .await;
    assert!(delete.success, "delete failed: {:?}", delete.error);
    assert_eq!(delete.data.unwrap()["records_deleted"], json!(1));

    let default_query = engine
        .dispatch(Request::Query(QueryRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            projection: None,
            aggregations: None,
            filters: vec![],
            group_by: vec![],
            having: vec![],
            sort: vec![],
            limit: None,
            offset: None,
            include_deleted: false,
            distinct: false,
        }))
        .await;
    let records = default_query.data.unwrap()["records"].as_array().unwrap().clone();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["name"], json!("A"));

    let all_query = engine
        .dispatch(Request::Query(QueryRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            projection: None,
            aggregations: None,
            filters: vec![],
            group_by: vec![],
            having: vec![],
            sort: vec![],
            limit: None,
            offset: None,
            include_deleted: true,
            distinct: false,
        }))
        .await;
    let records = all_query.data.unwrap()["records"].as_array().unwrap().clone();
    assert_eq!(records.len(), 2);
    let b_row = records.iter().find(|r| r["name"] == json!("B")).unwrap();
    assert_eq!(b_row["_deleted"], json!(true));
    assert!(!b_row["_deleted_at"].is_null());
}

#[tokio::test]
async fn s4_hard_delete_requires_confirm() {
    let engine = test_engine(64, 10);
    seed_s1(&engine, "t1").await;

    let refused = engine
        .dispatch(Request::HardDelete(HardDeleteRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            filters: vec![Filter {
                field: "name".to_string(),
                operator: Operator::Eq,
                value: json!("B"),
            }],
            confirm: false,
        }))
        .await;
    assert!(!refused.success);
    assert_eq!(refused.error.unwrap().code, "CONFIRMATION_REQUIRED");

    let confirmed = engine
        .dispatch(Request::HardDelete(HardDeleteRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            filters: vec![Filter {
                field: "name".to_string(),
                operator: Operator::Eq,
                value: json!("B"),
            }],
            confirm: true,
        }))
        .await;
    assert!(confirmed.success, "hard delete failed: {:?}", confirmed.error);
    assert_eq!(confirmed.data.unwrap()["records_deleted"], json!(1));
}

#[tokio::test]
async fn s5_compaction_shrinks_file_count() {
    let engine = test_engine(64, 10);
    create_users_table(&engine, "t1").await;

    for i in 0..20u32 {
        let resp = engine
            .dispatch(Request::Write(WriteRequest {
                tenant_id: "t1".to_string(),
                namespace: "default".to_string(),
                table: "users".to_string(),
                records: vec![record(&[("name", json!(format!("user-{i}"))), ("age", json!(20))])],
                mode: WriteMode::Append,
                partition: None,
                properties: None,
            }))
            .await;
        assert!(resp.success, "seed write {i} failed: {:?}", resp.error);
    }

    let compact = engine
        .dispatch(Request::Compact(CompactRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            force: true,
            target_file_size_mb: Some(128),
            expire_snapshots: false,
            snapshot_retention_hours: None,
        }))
        .await;
    assert!(compact.success, "compact failed: {:?}", compact.error);
    let data = compact.data.unwrap();
    assert_eq!(data["compacted"], json!(true));
    assert_eq!(data["stats"]["files_before"], json!(20));
    assert!(data["stats"]["files_after"].as_u64().unwrap() <= 2);
    assert_eq!(data["stats"]["small_files_remaining"], json!(0));

    let query = engine
        .dispatch(Request::Query(QueryRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            projection: None,
            aggregations: None,
            filters: vec![],
            group_by: vec![],
            having: vec![],
            sort: vec![],
            limit: None,
            offset: None,
            include_deleted: false,
            distinct: false,
        }))
        .await;
    assert!(query.success, "post-compaction query failed: {:?}", query.error);
    assert_eq!(query.data.unwrap()["query_metadata"]["row_count"], json!(20));
}

#[tokio::test]
async fn s6_aggregation() {
    use acidlake_core::{AggregateField, AggregateFunction};

    let engine = test_engine(64, 10);
    let resp = engine
        .dispatch(Request::CreateTable(CreateTableRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "sales".to_string(),
            schema: TableSchema {
                fields: vec![
                    FieldDef {
                        name: "customer".to_string(),
                        ty: ColumnType::String,
                        nullable: true,
                    },
                    FieldDef {
                        name: "amount".to_string(),
                        ty: ColumnType::Int32,
                        nullable: true,
                    },
                ],
            },
            if_not_exists: true,
        }))
        .await;
    assert!(resp.success);

    let write = engine
        .dispatch(Request::Write(WriteRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "sales".to_string(),
            records: vec![
                record(&[("customer", json!("A")), ("amount", json!(10))]),
                record(&[("customer", json!("A")), ("amount", json!(20))]),
                record(&[("customer", json!("B")), ("amount", json!(5))]),
            ],
            mode: WriteMode::Append,
            partition: None,
            properties: None,
        }))
        .await;
    assert!(write.success, "seed write failed: {:?}", write.error);

    let query = engine
        .dispatch(Request::Query(QueryRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "sales".to_string(),
            projection: None,
            aggregations: Some(vec![AggregateField {
                function: AggregateFunction::Sum,
                field: Some("amount".to_string()),
                alias: "total".to_string(),
                distinct: false,
                percentile_value: None,
            }]),
            filters: vec![],
            group_by: vec!["customer".to_string()],
            having: vec![Filter {
                field: "total".to_string(),
                operator: Operator::Gt,
                value: json!(10),
            }],
            sort: vec![],
            limit: None,
            offset: None,
            include_deleted: false,
            distinct: false,
        }))
        .await;
    assert!(query.success, "aggregation query failed: {:?}", query.error);
    let data = query.data.unwrap();
    let records = data["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["customer"], json!("A"));
    assert_eq!(records[0]["total"], json!(30));
}

#[tokio::test]
async fn property_tenant_isolation() {
    let engine = test_engine(64, 10);
    create_users_table(&engine, "tenant-a").await;
    create_users_table(&engine, "tenant-b").await;

    for tenant in ["tenant-a", "tenant-b"] {
        let resp = engine
            .dispatch(Request::Write(WriteRequest {
                tenant_id: tenant.to_string(),
                namespace: "default".to_string(),
                table: "users".to_string(),
                records: vec![record(&[("name", json!(tenant)), ("age", json!(1))])],
                mode: WriteMode::Append,
                partition: None,
                properties: None,
            }))
            .await;
        assert!(resp.success);
    }

    let query = engine
        .dispatch(Request::Query(QueryRequest {
            tenant_id: "tenant-a".to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            projection: None,
            aggregations: None,
            filters: vec![],
            group_by: vec![],
            having: vec![],
            sort: vec![],
            limit: None,
            offset: None,
            include_deleted: false,
            distinct: false,
        }))
        .await;
    let records = query.data.unwrap()["records"].as_array().unwrap().clone();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["_tenant_id"], json!("tenant-a"));
    assert!(records.iter().all(|r| r["_tenant_id"] == json!("tenant-a")));
}

#[tokio::test]
async fn property_idempotent_create() {
    let engine = test_engine(64, 10);

    let first = engine
        .dispatch(Request::CreateTable(CreateTableRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            schema: users_schema(),
            if_not_exists: true,
        }))
        .await;
    assert!(first.success);
    assert_eq!(first.data.as_ref().unwrap()["table_created"], json!(true));
    assert_eq!(first.data.unwrap()["table_existed"], json!(false));

    for _ in 0..3 {
        let again = engine
            .dispatch(Request::CreateTable(CreateTableRequest {
                tenant_id: "t1".to_string(),
                namespace: "default".to_string(),
                table: "users".to_string(),
                schema: users_schema(),
                if_not_exists: true,
            }))
            .await;
        assert!(again.success);
        let data = again.data.unwrap();
        assert_eq!(data["table_created"], json!(false));
        assert_eq!(data["table_existed"], json!(true));
    }
}

#[tokio::test]
async fn property_filter_value_is_parameterized_not_interpolated() {
    let engine = test_engine(64, 10);
    seed_s1(&engine, "t1").await;

    let injected = engine
        .dispatch(Request::Query(QueryRequest {
            tenant_id: "t1".to_string(),
            namespace: "default".to_string(),
            table: "users".to_string(),
            projection: None,
            aggregations: None,
            filters: vec![Filter {
                field: "name".to_string(),
                operator: Operator::Eq,
                value: json!("' OR 1=1 --"),
            }],
            group_by: vec![],
            having: vec![],
            sort: vec![],
            limit: None,
            offset: None,
            include_deleted: false,
            distinct: false,
        }))
        .await;
    assert!(injected.success, "query failed: {:?}", injected.error);
    let records = injected.data.unwrap()["records"].as_array().unwrap().clone();
    assert!(records.is_empty(), "a literal-match filter value must not widen the match set");
}
