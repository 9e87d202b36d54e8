//! SQL dialect abstractions for the supported warehouses.
//!
//! Each dialect is implemented in its own file.

use crate::sql_ast::{Aggregation, TablePath};

/// Dialects render identifiers, placeholders and the few statement shapes the
/// reports need. Query structure lives in the query builder.
pub trait Dialect {
    fn quote_ident(&self, ident: &str) -> String;

    /// Table paths are allow-listed on construction and rendered bare so the
    /// warehouse applies its own case rules.
    fn qualify_table(&self, path: &TablePath) -> String {
        path.segments().join(".")
    }

    /// Placeholder for the `idx`-th bound value (1-based).
    fn placeholder(&self, idx: usize) -> String;

    fn render_aggregation(&self, agg: &Aggregation, expr: &str) -> String {
        match agg {
            Aggregation::Sum => format!("SUM({expr})"),
            Aggregation::Avg => format!("AVG({expr})"),
        }
    }

    /// `SHOW TABLES`, scoped to a catalog/database and schema when known.
    fn show_tables(&self, scope: Option<(&str, &str)>) -> String;
}

mod databricks;
pub use databricks::DatabricksDialect;

mod snowflake;
pub use snowflake::SnowflakeDialect;
