//! Evaluates a [`CatalogPredicate`] against an in-memory `RecordBatch`,
//! producing the boolean mask the reference catalog uses to implement
//! row-level hard delete (§4.7, §6.3's `delete(expression)`).

use acidlake_core::{EngineError, EngineResult};
use acidlake_sql::CatalogPredicate;
use arrow::array::{Array, ArrayRef, BooleanArray};
use arrow::compute::kernels::boolean::{and, not, or};
use arrow::record_batch::RecordBatch;
use serde_json::Value as JsonValue;

/// Evaluate `predicate` over every row of `batch`, returning a mask that is
/// `true` for rows the predicate matches.
pub fn eval_mask(batch: &RecordBatch, predicate: &CatalogPredicate) -> EngineResult<BooleanArray> {
    match predicate {
        CatalogPredicate::And(atoms) => {
            let mut mask: Option<BooleanArray> = None;
            for atom in atoms {
                let m = eval_mask(batch, atom)?;
                mask = Some(match mask {
                    Some(acc) => and(&acc, &m).map_err(|e| EngineError::storage(e.to_string()))?,
                    None => m,
                });
            }
            mask.ok_or_else(|| EngineError::validation("empty predicate"))
        }
        CatalogPredicate::Eq(field, value) => compare(batch, field, value, Cmp::Eq),
        CatalogPredicate::Ne(field, value) => compare(batch, field, value, Cmp::Ne),
        CatalogPredicate::Gt(field, value) => compare(batch, field, value, Cmp::Gt),
        CatalogPredicate::Gte(field, value) => compare(batch, field, value, Cmp::Gte),
        CatalogPredicate::Lt(field, value) => compare(batch, field, value, Cmp::Lt),
        CatalogPredicate::Lte(field, value) => compare(batch, field, value, Cmp::Lte),
        CatalogPredicate::In(field, values) => {
            let mut mask: Option<BooleanArray> = None;
            for value in values {
                let m = compare(batch, field, value, Cmp::Eq)?;
                mask = Some(match mask {
                    Some(acc) => or(&acc, &m).map_err(|e| EngineError::storage(e.to_string()))?,
                    None => m,
                });
            }
            mask.ok_or_else(|| EngineError::validation("'in' with an empty value list"))
        }
    }
}

/// Mask of rows that do *not* match the predicate (the rows to keep when
/// physically deleting matches).
pub fn eval_keep_mask(
    batch: &RecordBatch,
    predicate: &CatalogPredicate,
) -> EngineResult<BooleanArray> {
    let matches = eval_mask(batch, predicate)?;
    not(&matches).map_err(|e| EngineError::storage(e.to_string()))
}

#[derive(Clone, Copy)]
enum Cmp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

fn compare(batch: &RecordBatch, field: &str, value: &JsonValue, cmp: Cmp) -> EngineResult<BooleanArray> {
    let column: ArrayRef = batch
        .column_by_name(field)
        .ok_or_else(|| EngineError::validation_field(format!("unknown column '{field}'"), field))?
        .clone();

    let mut out = Vec::with_capacity(column.len());
    for i in 0..column.len() {
        out.push(Some(row_matches(&column, i, value, cmp)?));
    }
    Ok(BooleanArray::from(out))
}

fn row_matches(column: &ArrayRef, i: usize, value: &JsonValue, cmp: Cmp) -> EngineResult<bool> {
    use arrow::array::{
        BooleanArray as BoolArr, Float64Array, Int32Array, Int64Array, StringArray,
    };
    use arrow_schema::DataType;

    if column.is_null(i) {
        return Ok(false);
    }

    let ordering = match column.data_type() {
        DataType::Utf8 => {
            let arr = column.as_any().downcast_ref::<StringArray>().unwrap();
            let other = value
                .as_str()
                .ok_or_else(|| EngineError::validation("expected string value"))?;
            arr.value(i).cmp(other)
        }
        DataType::Int32 => {
            let arr = column.as_any().downcast_ref::<Int32Array>().unwrap();
            let other = value
                .as_i64()
                .ok_or_else(|| EngineError::validation("expected integer value"))?
                as i32;
            arr.value(i).cmp(&other)
        }
        DataType::Int64 => {
            let arr = column.as_any().downcast_ref::<Int64Array>().unwrap();
            let other = value
                .as_i64()
                .ok_or_else(|| EngineError::validation("expected integer value"))?;
            arr.value(i).cmp(&other)
        }
        DataType::Float64 => {
            let arr = column.as_any().downcast_ref::<Float64Array>().unwrap();
            let other = value
                .as_f64()
                .ok_or_else(|| EngineError::validation("expected numeric value"))?;
            arr.value(i)
                .partial_cmp(&other)
                .unwrap_or(std::cmp::Ordering::Less)
        }
        DataType::Boolean => {
            let arr = column.as_any().downcast_ref::<BoolArr>().unwrap();
            let other = value
                .as_bool()
                .ok_or_else(|| EngineError::validation("expected boolean value"))?;
            arr.value(i).cmp(&other)
        }
        other => {
            return Err(EngineError::validation(format!(
                "unsupported column type for predicate evaluation: {other:?}"
            )))
        }
    };

    Ok(match cmp {
        Cmp::Eq => ordering.is_eq(),
        Cmp::Ne => !ordering.is_eq(),
        Cmp::Gt => ordering.is_gt(),
        Cmp::Gte => ordering.is_ge(),
        Cmp::Lt => ordering.is_lt(),
        Cmp::Lte => ordering.is_le(),
    })
}
