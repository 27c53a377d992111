//! Parameterized-SQL lowering for filter atoms (§4.2, §8 property 8).
//!
//! Values are never interpolated into the SQL text: each atom contributes
//! one or more `$N` placeholders (DataFusion's own parameter syntax) and
//! pushes the literal value onto a parallel `params` vector that the
//! caller binds with `LogicalPlan::with_param_values`.

use acidlake_core::{EngineError, EngineResult, Filter, Operator};
use serde_json::Value as JsonValue;

/// A filter lowered to SQL text plus its positional parameter values.
pub struct SqlPredicate {
    pub sql: String,
    pub params: Vec<JsonValue>,
}

/// AND-join a flat filter list into one parameterized predicate, starting
/// placeholder numbering at `next_param`. Returns the predicate and the
/// next free placeholder index (so callers can keep appending clauses).
pub fn build_predicate(filters: &[Filter], next_param: usize) -> EngineResult<SqlPredicate> {
    let mut clauses = Vec::with_capacity(filters.len());
    let mut params = Vec::new();
    let mut n = next_param;

    for filter in filters {
        let field = quote_ident(&filter.field);
        match filter.operator {
            Operator::Eq => {
                clauses.push(format!("{field} = ${n}"));
                params.push(filter.value.clone());
                n += 1;
            }
            Operator::Ne => {
                clauses.push(format!("{field} != ${n}"));
                params.push(filter.value.clone());
                n += 1;
            }
            Operator::Gt => {
                clauses.push(format!("{field} > ${n}"));
                params.push(filter.value.clone());
                n += 1;
            }
            Operator::Gte => {
                clauses.push(format!("{field} >= ${n}"));
                params.push(filter.value.clone());
                n += 1;
            }
            Operator::Lt => {
                clauses.push(format!("{field} < ${n}"));
                params.push(filter.value.clone());
                n += 1;
            }
            Operator::Lte => {
                clauses.push(format!("{field} <= ${n}"));
                params.push(filter.value.clone());
                n += 1;
            }
            Operator::In => {
                let values = filter.value.as_array().ok_or_else(|| {
                    EngineError::validation_field(
                        "operator 'in' requires an array value",
                        filter.field.clone(),
                    )
                })?;
                if values.is_empty() {
                    // An empty IN-list matches nothing; encode it directly
                    // rather than emitting invalid SQL syntax.
                    clauses.push("1 = 0".to_string());
                    continue;
                }
                let placeholders: Vec<String> = (0..values.len())
                    .map(|i| format!("${}", n + i))
                    .collect();
                clauses.push(format!("{field} IN ({})", placeholders.join(", ")));
                params.extend(values.iter().cloned());
                n += values.len();
            }
            Operator::Like => {
                clauses.push(format!("{field} LIKE ${n}"));
                params.push(filter.value.clone());
                n += 1;
            }
        }
    }

    Ok(SqlPredicate {
        sql: clauses.join(" AND "),
        params,
    })
}

/// Quote a column identifier defensively. Field names come from the
/// request body, not from executed SQL text, but we never trust them to
/// be free of quote characters either.
fn quote_ident(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// A catalog-native predicate atom, used for row-level hard delete where
/// the catalog client evaluates the expression itself rather than through
/// SQL (§4.7, §6.3). `like` has no catalog-native counterpart (§4.2).
#[derive(Debug, Clone)]
pub enum CatalogPredicate {
    Eq(String, JsonValue),
    Ne(String, JsonValue),
    Gt(String, JsonValue),
    Gte(String, JsonValue),
    Lt(String, JsonValue),
    Lte(String, JsonValue),
    In(String, Vec<JsonValue>),
    And(Vec<CatalogPredicate>),
}

/// Lower a flat filter list to a catalog-native AND predicate. Rejects
/// `like`, which the catalog-native target cannot express (§4.2).
pub fn build_catalog_predicate(filters: &[Filter]) -> EngineResult<CatalogPredicate> {
    let mut atoms = Vec::with_capacity(filters.len());
    for filter in filters {
        if !filter.operator.catalog_native_supported() {
            return Err(EngineError::validation_field(
                "operator 'like' is not supported in catalog-native row filters",
                filter.field.clone(),
            ));
        }
        let atom = match filter.operator {
            Operator::Eq => CatalogPredicate::Eq(filter.field.clone(), filter.value.clone()),
            Operator::Ne => CatalogPredicate::Ne(filter.field.clone(), filter.value.clone()),
            Operator::Gt => CatalogPredicate::Gt(filter.field.clone(), filter.value.clone()),
            Operator::Gte => CatalogPredicate::Gte(filter.field.clone(), filter.value.clone()),
            Operator::Lt => CatalogPredicate::Lt(filter.field.clone(), filter.value.clone()),
            Operator::Lte => CatalogPredicate::Lte(filter.field.clone(), filter.value.clone()),
            Operator::In => {
                let values = filter.value.as_array().cloned().ok_or_else(|| {
                    EngineError::validation_field(
                        "operator 'in' requires an array value",
                        filter.field.clone(),
                    )
                })?;
                CatalogPredicate::In(filter.field.clone(), values)
            }
            Operator::Like => unreachable!("rejected above"),
        };
        atoms.push(atom);
    }
    Ok(CatalogPredicate::And(atoms))
}
