//! Structured filter/projection/sort/aggregation types carried on the wire
//! (§4.2). The lowering of these types to SQL or catalog-native predicates
//! lives in `acidlake-sql`, which depends on this crate for the shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Operators supported by the *parameterized-SQL* lowering. The
/// catalog-native lowering (row-level delete) supports all but `Like`
/// (§4.2 — "`like` unsupported and rejected").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Like,
}

impl Operator {
    /// Supported by the catalog-native row-filter lowering used for hard
    /// delete (§4.2, §4.7).
    pub fn catalog_native_supported(self) -> bool {
        !matches!(self, Operator::Like)
    }
}

/// A single flat filter atom. Filters AND-join (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: Operator,
    pub value: JsonValue,
}

/// String transforms applicable to a projected field (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringTransform {
    Upper,
    Lower,
    Trim,
}

/// Date/time transforms applicable to a projected field (§4.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DateTransform {
    DateTrunc { unit: String },
    Extract { part: String },
    DateFormat { format: String },
}

/// A projected column: a bare name, or a field object with alias/cast/
/// transform/substring (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectionField {
    Column(String),
    Field {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cast: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        string_transform: Option<StringTransform>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        substring: Option<(u32, u32)>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date_transform: Option<DateTransform>,
    },
}

/// Supported aggregation functions (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Median,
    Percentile,
}

/// `{function, field?, alias, distinct?, percentile_value?}` (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateField {
    pub function: AggregateFunction,
    #[serde(default)]
    pub field: Option<String>,
    pub alias: String,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub percentile_value: Option<f64>,
}

/// Sort order for a single field (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
    #[serde(default)]
    pub nulls_first: Option<bool>,
}
