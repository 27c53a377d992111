//! Bridges the wire-level [`TableSchema`]/[`Record`] shapes to Arrow
//! [`RecordBatch`]es (§4.3 steps 1-4, §4.4 result conversion).
//!
//! Gap-fill and reorder fall out of `arrow-json`'s own schema-directed
//! decoder: it matches incoming JSON object keys to schema fields by name,
//! filling any field absent from a given row with null and ignoring
//! column order in the input. Casting to the exact declared type happens
//! as part of that same decode.

use acidlake_core::{ColumnType, EngineError, EngineResult, FieldDef, Record, TableSchema, SYSTEM_COLUMNS};
use arrow::json::reader::ReaderBuilder;
use arrow::json::writer::record_batches_to_json_rows;
use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field, Fields, Schema, SchemaRef, TimeUnit};
use std::sync::Arc;

/// Prepend the six reserved system columns (§3) to a user-supplied schema,
/// in the fixed order every table carries them.
pub fn full_schema(user_schema: &TableSchema) -> TableSchema {
    let mut fields = vec![
        FieldDef { name: SYSTEM_COLUMNS[0].to_string(), ty: ColumnType::String, nullable: false },
        FieldDef { name: SYSTEM_COLUMNS[1].to_string(), ty: ColumnType::String, nullable: false },
        FieldDef { name: SYSTEM_COLUMNS[2].to_string(), ty: ColumnType::Timestamp, nullable: false },
        FieldDef { name: SYSTEM_COLUMNS[3].to_string(), ty: ColumnType::Int32, nullable: false },
        FieldDef { name: SYSTEM_COLUMNS[4].to_string(), ty: ColumnType::Bool, nullable: true },
        FieldDef { name: SYSTEM_COLUMNS[5].to_string(), ty: ColumnType::Timestamp, nullable: true },
    ];
    fields.extend(user_schema.fields.iter().cloned());
    TableSchema { fields }
}

/// Convert a [`TableSchema`] (already including system columns, see
/// [`full_schema`]) to the Arrow schema the catalog and query adapters
/// read and write.
pub fn to_arrow_schema(schema: &TableSchema) -> SchemaRef {
    let fields: Vec<Field> = schema
        .fields
        .iter()
        .map(|f| Field::new(&f.name, column_type_to_arrow(&f.ty), f.nullable))
        .collect();
    Arc::new(Schema::new(fields))
}

fn column_type_to_arrow(ty: &ColumnType) -> DataType {
    match ty {
        ColumnType::String => DataType::Utf8,
        ColumnType::Int32 => DataType::Int32,
        ColumnType::Int64 => DataType::Int64,
        ColumnType::Float32 => DataType::Float32,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Bool => DataType::Boolean,
        ColumnType::Date => DataType::Date32,
        ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Millisecond, None),
        ColumnType::Decimal => DataType::Decimal128(38, 9),
        ColumnType::Binary => DataType::Binary,
        ColumnType::List(inner) => {
            DataType::List(Arc::new(Field::new("item", column_type_to_arrow(inner), true)))
        }
        ColumnType::Map(_key, value) => {
            let entries = Field::new(
                "entries",
                DataType::Struct(Fields::from(vec![
                    Field::new("keys", DataType::Utf8, false),
                    Field::new("values", column_type_to_arrow(value), true),
                ])),
                false,
            );
            DataType::Map(Arc::new(entries), false)
        }
        ColumnType::Struct(fields) => {
            let inner: Vec<Field> = fields
                .iter()
                .map(|f| Field::new(&f.name, column_type_to_arrow(&f.ty), f.nullable))
                .collect();
            DataType::Struct(Fields::from(inner))
        }
    }
}

/// Decode a batch of wire records against `schema`, gap-filling absent
/// columns with null and casting present ones to the declared type (§4.3
/// steps 3-4).
pub fn records_to_batch(records: &[Record], schema: SchemaRef) -> EngineResult<RecordBatch> {
    let mut decoder = ReaderBuilder::new(schema)
        .build_decoder()
        .map_err(|e| EngineError::write(format!("schema decoder setup failed: {e}")))?;
    decoder
        .serialize(records)
        .map_err(|e| EngineError::write(format!("record batch did not match table schema: {e}")))?;
    decoder
        .flush()
        .map_err(|e| EngineError::write(e.to_string()))?
        .ok_or_else(|| EngineError::write("no rows to write"))
}

/// Convert a result set back to wire-level record maps (§4.4).
pub fn batch_to_records(batch: &RecordBatch) -> EngineResult<Vec<Record>> {
    if batch.num_rows() == 0 {
        return Ok(Vec::new());
    }
    let mut rows =
        record_batches_to_json_rows(&[batch]).map_err(|e| EngineError::query(e.to_string()))?;
    // The ranked CTE's row-numbering column (§4.4) rides along on a bare
    // `SELECT *`; it's an implementation detail of latest-wins selection,
    // never part of a record's wire shape.
    for row in &mut rows {
        row.remove("rn");
    }
    Ok(rows)
}

/// Best-effort `scanned_bytes` estimate (§C.3): the sum of each returned
/// batch's in-memory array buffer size. Cheap, approximate, never treated
/// as authoritative.
pub fn estimate_scanned_bytes(batches: &[RecordBatch]) -> u64 {
    batches
        .iter()
        .map(|b| b.get_array_memory_size() as u64)
        .sum()
}
