//! Assembles the full versioned-read query (§4.4): a `ROW_NUMBER() OVER
//! (PARTITION BY _record_id ORDER BY _version DESC)` CTE, tenant-scoped,
//! soft-delete filtered by default, with the caller's projection,
//! aggregation, filters, grouping, having, sort, limit and offset applied
//! on top.

use crate::predicate::build_predicate;
use crate::projection::{aggregate_sql, projection_sql, sort_sql};
use acidlake_core::{EngineError, EngineResult, QueryRequest};
use serde_json::Value as JsonValue;

/// A fully-built query: SQL text plus its positional bind parameters, in
/// the order the placeholders appear.
pub struct Plan {
    pub sql: String,
    pub params: Vec<JsonValue>,
}

/// Build the query plan for a [`QueryRequest`] against a resolved metadata
/// pointer (the table-format scan target, already opaque to this crate).
pub fn build_query_plan(request: &QueryRequest, metadata_pointer: &str) -> EngineResult<Plan> {
    if request.having.iter().next().is_some() && request.group_by.is_empty() {
        return Err(EngineError::validation_field(
            "'having' is only valid together with 'group_by'",
            "having",
        ));
    }

    let mut params = Vec::new();
    params.push(JsonValue::String(request.tenant_id.clone()));

    let select_list = select_list_sql(request)?;

    let mut sql = format!(
        "WITH ranked AS (\n  SELECT *,\n         ROW_NUMBER() OVER (PARTITION BY \"_record_id\" ORDER BY \"_version\" DESC) AS rn\n  FROM scan('{metadata_pointer}')\n  WHERE \"_tenant_id\" = $1\n)\nSELECT {select_list}\nFROM ranked\nWHERE rn = 1"
    );

    if !request.include_deleted {
        sql.push_str("\n  AND (\"_deleted\" IS NULL OR \"_deleted\" = false)");
    }

    if !request.filters.is_empty() {
        let predicate = build_predicate(&request.filters, params.len() + 1)?;
        sql.push_str(&format!("\n  AND {}", predicate.sql));
        params.extend(predicate.params);
    }

    if !request.group_by.is_empty() {
        let cols: Vec<String> = request.group_by.iter().map(|c| quote_ident(c)).collect();
        sql.push_str(&format!("\nGROUP BY {}", cols.join(", ")));
    }

    if !request.having.is_empty() {
        let predicate = build_predicate(&request.having, params.len() + 1)?;
        sql.push_str(&format!("\nHAVING {}", predicate.sql));
        params.extend(predicate.params);
    }

    if !request.sort.is_empty() {
        let items: Vec<String> = request.sort.iter().map(sort_sql).collect();
        sql.push_str(&format!("\nORDER BY {}", items.join(", ")));
    }

    if let Some(limit) = request.limit {
        sql.push_str(&format!("\nLIMIT {limit}"));
    }
    if let Some(offset) = request.offset {
        sql.push_str(&format!("\nOFFSET {offset}"));
    }

    Ok(Plan { sql, params })
}

fn select_list_sql(request: &QueryRequest) -> EngineResult<String> {
    let distinct = if request.distinct { "DISTINCT " } else { "" };

    if let Some(aggregations) = &request.aggregations {
        let mut items = Vec::with_capacity(aggregations.len() + request.group_by.len());
        for col in &request.group_by {
            items.push(quote_ident(col));
        }
        for agg in aggregations {
            items.push(aggregate_sql(agg)?);
        }
        if items.is_empty() {
            return Err(EngineError::validation("aggregations produced an empty select list"));
        }
        return Ok(format!("{distinct}{}", items.join(", ")));
    }

    match &request.projection {
        Some(fields) if !fields.is_empty() => {
            let items: Vec<String> = fields.iter().map(projection_sql).collect();
            Ok(format!("{distinct}{}", items.join(", ")))
        }
        _ => Ok(format!("{distinct}*")),
    }
}

fn quote_ident(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use acidlake_core::{Filter, Operator, SortField, SortOrder};

    fn base_request() -> QueryRequest {
        QueryRequest {
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
        }
    }

    #[test]
    fn default_read_excludes_soft_deleted() {
        let plan = build_query_plan(&base_request(), "s3://bucket/meta.json").unwrap();
        assert!(plan.sql.contains("_deleted\" IS NULL OR"));
        assert_eq!(plan.params[0], JsonValue::String("t1".to_string()));
    }

    #[test]
    fn include_deleted_skips_the_clause() {
        let mut req = base_request();
        req.include_deleted = true;
        let plan = build_query_plan(&req, "s3://bucket/meta.json").unwrap();
        assert!(!plan.sql.contains("_deleted\" IS NULL OR"));
    }

    #[test]
    fn having_without_group_by_is_rejected() {
        let mut req = base_request();
        req.having = vec![Filter {
            field: "total".to_string(),
            operator: Operator::Gt,
            value: serde_json::json!(10),
        }];
        assert!(build_query_plan(&req, "ptr").is_err());
    }

    #[test]
    fn sort_and_limit_applied() {
        let mut req = base_request();
        req.sort = vec![SortField {
            field: "age".to_string(),
            order: SortOrder::Desc,
            nulls_first: None,
        }];
        req.limit = Some(10);
        let plan = build_query_plan(&req, "ptr").unwrap();
        assert!(plan.sql.ends_with("ORDER BY \"age\" DESC\nLIMIT 10"));
    }
}
