//! Snowflake dialect implementation.

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct SnowflakeDialect;

impl Dialect for SnowflakeDialect {
    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn placeholder(&self, _idx: usize) -> String {
        "?".to_string()
    }

    fn show_tables(&self, scope: Option<(&str, &str)>) -> String {
        match scope {
            Some((database, schema)) => format!("SHOW TABLES IN SCHEMA {database}.{schema}"),
            None => "SHOW TABLES".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_with_double_quotes() {
        assert_eq!(SnowflakeDialect.quote_ident("Sales Val"), "\"Sales Val\"");
        assert_eq!(SnowflakeDialect.quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(SnowflakeDialect.placeholder(3), "?");
    }
}
