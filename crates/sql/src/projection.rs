//! Projection, aggregation, and sort lowering (§4.2).

use acidlake_core::{
    AggregateField, AggregateFunction, DateTransform, EngineError, EngineResult, ProjectionField,
    SortField, SortOrder, StringTransform,
};

/// Render one projection field as a `SELECT` list item.
pub fn projection_sql(field: &ProjectionField) -> String {
    match field {
        ProjectionField::Column(name) => quote_ident(name),
        ProjectionField::Field {
            field,
            alias,
            cast,
            string_transform,
            substring,
            date_transform,
        } => {
            let mut expr = quote_ident(field);

            if let Some((start, length)) = substring {
                expr = format!("SUBSTRING({expr}, {start}, {length})");
            }
            if let Some(t) = string_transform {
                expr = match t {
                    StringTransform::Upper => format!("UPPER({expr})"),
                    StringTransform::Lower => format!("LOWER({expr})"),
                    StringTransform::Trim => format!("TRIM({expr})"),
                };
            }
            if let Some(t) = date_transform {
                expr = match t {
                    DateTransform::DateTrunc { unit } => format!("DATE_TRUNC('{unit}', {expr})"),
                    DateTransform::Extract { part } => format!("EXTRACT({part} FROM {expr})"),
                    DateTransform::DateFormat { format } => {
                        format!("DATE_FORMAT({expr}, '{format}')")
                    }
                };
            }
            if let Some(cast) = cast {
                expr = format!("CAST({expr} AS {cast})");
            }
            match alias {
                Some(alias) => format!("{expr} AS {}", quote_ident(alias)),
                None => expr,
            }
        }
    }
}

/// Render one aggregation field as a `SELECT` list item.
pub fn aggregate_sql(agg: &AggregateField) -> EngineResult<String> {
    let distinct = if agg.distinct { "DISTINCT " } else { "" };
    let expr = match agg.function {
        AggregateFunction::Count => match &agg.field {
            Some(field) => format!("COUNT({distinct}{})", quote_ident(field)),
            None => "COUNT(*)".to_string(),
        },
        AggregateFunction::Sum => format!("SUM({distinct}{})", field_or_err(agg)?),
        AggregateFunction::Avg => format!("AVG({distinct}{})", field_or_err(agg)?),
        AggregateFunction::Min => format!("MIN({distinct}{})", field_or_err(agg)?),
        AggregateFunction::Max => format!("MAX({distinct}{})", field_or_err(agg)?),
        AggregateFunction::Median => format!("MEDIAN({distinct}{})", field_or_err(agg)?),
        AggregateFunction::Percentile => {
            let p = agg.percentile_value.ok_or_else(|| {
                EngineError::validation_field(
                    "aggregation 'percentile' requires percentile_value",
                    agg.alias.clone(),
                )
            })?;
            if !(0.0..=1.0).contains(&p) {
                return Err(EngineError::validation_field(
                    "percentile_value must be within [0, 1]",
                    agg.alias.clone(),
                ));
            }
            format!(
                "PERCENTILE_CONT({p}) WITHIN GROUP (ORDER BY {})",
                field_or_err(agg)?
            )
        }
    };
    Ok(format!("{expr} AS {}", quote_ident(&agg.alias)))
}

fn field_or_err(agg: &AggregateField) -> EngineResult<String> {
    agg.field
        .as_ref()
        .map(|f| quote_ident(f))
        .ok_or_else(|| {
            EngineError::validation_field(
                format!("aggregation '{:?}' requires a field", agg.function),
                agg.alias.clone(),
            )
        })
}

/// Render one sort field as an `ORDER BY` item.
pub fn sort_sql(field: &SortField) -> String {
    let order = match field.order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    let nulls = match field.nulls_first {
        Some(true) => " NULLS FIRST",
        Some(false) => " NULLS LAST",
        None => "",
    };
    format!("{} {order}{nulls}", quote_ident(&field.field))
}

fn quote_ident(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_star_when_field_absent() {
        let agg = AggregateField {
            function: AggregateFunction::Count,
            field: None,
            alias: "n".to_string(),
            distinct: false,
            percentile_value: None,
        };
        assert_eq!(aggregate_sql(&agg).unwrap(), "COUNT(*) AS \"n\"");
    }

    #[test]
    fn percentile_out_of_range_is_rejected() {
        let agg = AggregateField {
            function: AggregateFunction::Percentile,
            field: Some("amount".to_string()),
            alias: "p".to_string(),
            distinct: false,
            percentile_value: Some(1.5),
        };
        assert!(aggregate_sql(&agg).is_err());
    }

    #[test]
    fn projection_chains_transforms_in_order() {
        let field = ProjectionField::Field {
            field: "name".to_string(),
            alias: Some("n".to_string()),
            cast: None,
            string_transform: Some(acidlake_core::StringTransform::Upper),
            substring: Some((1, 3)),
            date_transform: None,
        };
        let sql = projection_sql(&field);
        assert_eq!(sql, "UPPER(SUBSTRING(\"name\", 1, 3)) AS \"n\"");
    }
}
