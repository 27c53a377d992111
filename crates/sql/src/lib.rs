//! Lowers the structured filter/projection/sort/aggregation model
//! (`acidlake_core::filter`) to parameterized SQL for the query engine and
//! to catalog-native predicates for row-level hard delete (§4.2).

pub mod predicate;
pub mod projection;
pub mod query_plan;

pub use predicate::{build_catalog_predicate, build_predicate, CatalogPredicate, SqlPredicate};
pub use projection::{aggregate_sql, projection_sql, sort_sql};
pub use query_plan::{build_query_plan, Plan};
