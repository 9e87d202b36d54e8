use serde_json::Value;

use crate::dialect::Dialect;
use crate::error::{BidboardError, Result};

/// A SQL statement together with the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl BoundQuery {
    /// Statement without bound values (ad hoc passthrough, diagnostics).
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Avg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub enum SqlExpr {
    Column(String),
    /// User supplied value; always rendered as a placeholder.
    Param(Value),
    /// Trusted SQL fragment such as `1=1`.
    Raw(String),
    Aggregate {
        agg: Aggregation,
        expr: Box<SqlExpr>,
    },
    Eq {
        left: Box<SqlExpr>,
        right: Box<SqlExpr>,
    },
    IsNotNull(Box<SqlExpr>),
}

impl SqlExpr {
    pub fn column(name: &str) -> Self {
        SqlExpr::Column(name.to_string())
    }

    pub fn eq_param(column: &str, value: impl Into<Value>) -> Self {
        SqlExpr::Eq {
            left: Box::new(SqlExpr::column(column)),
            right: Box::new(SqlExpr::Param(value.into())),
        }
    }

    pub fn aggregate(agg: Aggregation, column: &str) -> Self {
        SqlExpr::Aggregate {
            agg,
            expr: Box::new(SqlExpr::column(column)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectItem {
    pub expr: SqlExpr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn aliased(expr: SqlExpr, alias: &str) -> Self {
        Self {
            expr,
            alias: Some(alias.to_string()),
        }
    }
}

/// Configuration controlled `catalog.schema.table` reference.
///
/// Each segment must match `[A-Za-z_][A-Za-z0-9_]*`, so the path can be
/// interpolated into SQL verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TablePath {
    catalog: Option<String>,
    schema: Option<String>,
    table: String,
}

impl TablePath {
    pub fn new(catalog: Option<&str>, schema: Option<&str>, table: &str) -> Result<Self> {
        let segment = |s: Option<&str>| -> Result<Option<String>> {
            match s.map(str::trim).filter(|s| !s.is_empty()) {
                Some(s) => {
                    validate_identifier(s)?;
                    Ok(Some(s.to_string()))
                }
                None => Ok(None),
            }
        };
        let catalog = segment(catalog)?;
        let schema = segment(schema)?;
        if let (Some(catalog), None) = (&catalog, &schema) {
            return Err(BidboardError::Config(format!(
                "catalog '{catalog}' is set but no schema is configured"
            )));
        }
        validate_identifier(table.trim())?;
        Ok(Self {
            catalog,
            schema,
            table: table.trim().to_string(),
        })
    }

    /// Same catalog and schema, different table.
    pub fn with_table(&self, table: &str) -> Result<Self> {
        Self::new(self.catalog.as_deref(), self.schema.as_deref(), table)
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Catalog and schema when both are configured.
    pub fn scope(&self) -> Option<(&str, &str)> {
        match (&self.catalog, &self.schema) {
            (Some(c), Some(s)) => Some((c, s)),
            _ => None,
        }
    }

    /// Catalog, schema and table, skipping the unset leading parts.
    pub fn segments(&self) -> Vec<&str> {
        [self.catalog(), self.schema(), Some(self.table())]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Reject anything outside the identifier allow-list.
pub fn validate_identifier(ident: &str) -> Result<()> {
    let mut chars = ident.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(BidboardError::Config(format!(
            "identifier '{ident}' is not allowed (expected letters, digits and underscores)"
        )))
    }
}

#[derive(Debug, Clone)]
pub struct OrderItem {
    pub expr: SqlExpr,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    pub distinct: bool,
    pub select: Vec<SelectItem>,
    pub from: TablePath,
    pub filters: Vec<SqlExpr>,
    pub group_by: Vec<SqlExpr>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<u64>,
}

pub struct SqlRenderer<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> SqlRenderer<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    pub fn render_select(&self, query: &SelectQuery) -> BoundQuery {
        let mut params = Vec::new();

        let select_items: Vec<String> = query
            .select
            .iter()
            .map(|item| {
                let expr_sql = self.render_expr(&item.expr, &mut params);
                match &item.alias {
                    Some(alias) => format!("{expr_sql} AS {}", self.dialect.quote_ident(alias)),
                    None => expr_sql,
                }
            })
            .collect();

        let distinct = if query.distinct { "DISTINCT " } else { "" };
        let mut sql = format!(
            "SELECT {distinct}{} FROM {}",
            select_items.join(", "),
            self.dialect.qualify_table(&query.from)
        );

        if !query.filters.is_empty() {
            let filters: Vec<String> = query
                .filters
                .iter()
                .map(|f| self.render_expr(f, &mut params))
                .collect();
            sql.push_str(&format!(" WHERE {}", filters.join(" AND ")));
        }

        if !query.group_by.is_empty() {
            let groups: Vec<String> = query
                .group_by
                .iter()
                .map(|g| self.render_expr(g, &mut params))
                .collect();
            sql.push_str(&format!(" GROUP BY {}", groups.join(", ")));
        }

        if !query.order_by.is_empty() {
            let orders: Vec<String> = query
                .order_by
                .iter()
                .map(|o| {
                    let expr = self.render_expr(&o.expr, &mut params);
                    let dir = match o.direction {
                        SortDirection::Asc => "ASC",
                        SortDirection::Desc => "DESC",
                    };
                    format!("{expr} {dir}")
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        BoundQuery { sql, params }
    }

    fn render_expr(&self, expr: &SqlExpr, params: &mut Vec<Value>) -> String {
        match expr {
            SqlExpr::Column(name) => self.dialect.quote_ident(name),
            SqlExpr::Param(value) => {
                params.push(value.clone());
                self.dialect.placeholder(params.len())
            }
            SqlExpr::Raw(fragment) => fragment.clone(),
            SqlExpr::Aggregate { agg, expr } => {
                let inner = self.render_expr(expr, params);
                self.dialect.render_aggregation(agg, &inner)
            }
            SqlExpr::Eq { left, right } => {
                let left = self.render_expr(left, params);
                let right = self.render_expr(right, params);
                format!("{left} = {right}")
            }
            SqlExpr::IsNotNull(inner) => format!("{} IS NOT NULL", self.render_expr(inner, params)),
        }
    }
}
