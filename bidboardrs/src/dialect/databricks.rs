//! Databricks SQL dialect implementation.

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct DatabricksDialect;

impl Dialect for DatabricksDialect {
    fn quote_ident(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn placeholder(&self, idx: usize) -> String {
        format!(":p{idx}")
    }

    fn show_tables(&self, scope: Option<(&str, &str)>) -> String {
        match scope {
            Some((catalog, schema)) => format!("SHOW TABLES IN {catalog}.{schema}"),
            None => "SHOW TABLES".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_with_backticks() {
        assert_eq!(DatabricksDialect.quote_ident("Conv. rate"), "`Conv. rate`");
        assert_eq!(DatabricksDialect.quote_ident("a`b"), "`a``b`");
    }

    #[test]
    fn show_tables_scoped() {
        assert_eq!(
            DatabricksDialect.show_tables(Some(("default", "bid_sample"))),
            "SHOW TABLES IN default.bid_sample"
        );
        assert_eq!(DatabricksDialect.show_tables(None), "SHOW TABLES");
    }
}
