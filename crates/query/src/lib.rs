//! The query-engine adapter (§4.4's execution leg, §6.4): configures the
//! embedded columnar engine and executes parameterized plans produced by
//! `acidlake-sql` against scan tasks resolved from the catalog.

pub mod contract;
pub mod datafusion_engine;

pub use contract::QueryEngineClient;
pub use datafusion_engine::{DataFusionEngine, EngineResources};
