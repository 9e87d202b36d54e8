//! Report query construction.
//!
//! Every builder is pure: the same arguments always produce the same SQL text
//! and bound values. Filter values travel as bound parameters.

pub mod filters;
pub mod metrics;

pub use filters::{Dimension, ReportFilter, ALL_CAMPAIGNS, ALL_KEYWORDS};
pub use metrics::KpiMetric;

use crate::backends::dialect_for;
use crate::config::WarehouseKind;
use crate::dialect::Dialect;
use crate::sql_ast::{
    Aggregation, BoundQuery, OrderItem, SelectItem, SelectQuery, SortDirection, SqlExpr,
    SqlRenderer, TablePath,
};

/// Source columns of the keyword performance table.
pub mod columns {
    pub const KEYWORD: &str = "Key";
    pub const CAMPAIGN: &str = "Name";
    pub const IMPRESSIONS: &str = "Imp";
    pub const CLICKS: &str = "Clicks";
    pub const SALES: &str = "Sales";
    pub const AVG_RANK: &str = "Average auction ad rank";
    pub const CTR: &str = "CTR";
    pub const CONVERSION_RATE: &str = "Conv. rate";
    pub const CPC: &str = "CPC";
    pub const CPA: &str = "CPA";
    pub const COST: &str = "Cost";
    pub const SALES_VALUE: &str = "Sales Val";
    pub const ROAS: &str = "ROAS";
    pub const WEEK: &str = "Week Commencing";
    pub const CURRENT_BID: &str = "Current Bid";
    pub const NEW_BIDS: &str = "NewBids";
    pub const COMMENTS: &str = "comments";
    pub const CATEGORY: &str = "Category";
}

/// (source column, alias) pairs of the raw performance report.
const PERFORMANCE_COLUMNS: [(&str, &str); 18] = [
    (columns::KEYWORD, "keyword"),
    (columns::CAMPAIGN, "campaign_name"),
    (columns::IMPRESSIONS, "impressions"),
    (columns::CLICKS, "clicks"),
    (columns::SALES, "sales_count"),
    (columns::AVG_RANK, "avg_rank"),
    (columns::CTR, "ctr"),
    (columns::CONVERSION_RATE, "conversion_rate"),
    (columns::CPC, "cpc"),
    (columns::CPA, "cpa"),
    (columns::COST, "spend"),
    (columns::SALES_VALUE, "sales_value"),
    (columns::ROAS, "roas"),
    (columns::WEEK, "week_commencing"),
    (columns::CURRENT_BID, "current_bid"),
    (columns::NEW_BIDS, "new_bids"),
    (columns::COMMENTS, "comments"),
    (columns::CATEGORY, "category"),
];

/// Aliases of the KPI summary row.
pub mod summary {
    pub const TOTAL_IMPRESSIONS: &str = "total_impressions";
    pub const AVG_CPA: &str = "avg_cpa";
    pub const AVG_ROAS: &str = "avg_roas";
    pub const AVG_CTR: &str = "avg_ctr";
    pub const AVG_CONVERSION_RATE: &str = "avg_conversion_rate";
    pub const AVG_CPC: &str = "avg_cpc";
    pub const TOTAL_CLICKS: &str = "total_clicks";
    pub const AVG_RANK: &str = "avg_rank";
    pub const TOTAL_SPEND: &str = "total_spend";
    pub const TOTAL_SALES_COUNT: &str = "total_sales_count";
    pub const TOTAL_SALES_VALUE: &str = "total_sales_value";
}

const SUMMARY_COLUMNS: [(Aggregation, &str, &str); 11] = [
    (Aggregation::Sum, columns::IMPRESSIONS, summary::TOTAL_IMPRESSIONS),
    (Aggregation::Avg, columns::CPA, summary::AVG_CPA),
    (Aggregation::Avg, columns::ROAS, summary::AVG_ROAS),
    (Aggregation::Avg, columns::CTR, summary::AVG_CTR),
    (Aggregation::Avg, columns::CONVERSION_RATE, summary::AVG_CONVERSION_RATE),
    (Aggregation::Avg, columns::CPC, summary::AVG_CPC),
    (Aggregation::Sum, columns::CLICKS, summary::TOTAL_CLICKS),
    (Aggregation::Avg, columns::AVG_RANK, summary::AVG_RANK),
    (Aggregation::Sum, columns::COST, summary::TOTAL_SPEND),
    (Aggregation::Sum, columns::SALES, summary::TOTAL_SALES_COUNT),
    (Aggregation::Sum, columns::SALES_VALUE, summary::TOTAL_SALES_VALUE),
];

/// Builds the fixed family of report statements against one table.
#[derive(Clone)]
pub struct ReportQueryBuilder {
    dialect: &'static (dyn Dialect + Send + Sync),
    table: TablePath,
}

impl ReportQueryBuilder {
    pub fn new(dialect: &'static (dyn Dialect + Send + Sync), table: TablePath) -> Self {
        Self { dialect, table }
    }

    pub fn for_backend(kind: WarehouseKind, table: TablePath) -> Self {
        Self::new(dialect_for(kind), table)
    }

    pub fn table(&self) -> &TablePath {
        &self.table
    }

    pub fn dialect(&self) -> &(dyn Dialect + Send + Sync) {
        self.dialect
    }

    fn render(&self, query: &SelectQuery) -> BoundQuery {
        SqlRenderer::new(self.dialect).render_select(query)
    }

    /// Raw performance rows, newest week first.
    pub fn performance_rows(&self, filter: &ReportFilter) -> BoundQuery {
        let mut filters = vec![SqlExpr::Raw("1=1".to_string())];
        filters.extend(filter.predicates());
        let query = SelectQuery {
            select: PERFORMANCE_COLUMNS
                .iter()
                .map(|(column, alias)| SelectItem::aliased(SqlExpr::column(column), alias))
                .collect(),
            from: self.table.clone(),
            filters,
            order_by: vec![
                OrderItem {
                    expr: SqlExpr::column(columns::WEEK),
                    direction: SortDirection::Desc,
                },
                OrderItem {
                    expr: SqlExpr::column(columns::KEYWORD),
                    direction: SortDirection::Asc,
                },
            ],
            ..Default::default()
        };
        self.render(&query)
    }

    /// One aggregate row: sums for additive metrics, averages for ratios.
    pub fn kpi_summary(&self, week: Option<&str>) -> BoundQuery {
        let mut filters = vec![SqlExpr::Raw("1=1".to_string())];
        if let Some(week) = week.filter(|w| !w.is_empty()) {
            filters.push(SqlExpr::eq_param(columns::WEEK, week));
        }
        let query = SelectQuery {
            select: SUMMARY_COLUMNS
                .iter()
                .map(|(agg, column, alias)| {
                    SelectItem::aliased(SqlExpr::aggregate(*agg, column), alias)
                })
                .collect(),
            from: self.table.clone(),
            filters,
            ..Default::default()
        };
        self.render(&query)
    }

    /// Weekly series of SUM(primary) and AVG(secondary), oldest week first.
    pub fn time_series(&self, primary: KpiMetric, secondary: KpiMetric) -> BoundQuery {
        let week = SqlExpr::column(columns::WEEK);
        let query = SelectQuery {
            select: vec![
                SelectItem::aliased(week.clone(), "week"),
                SelectItem::aliased(
                    SqlExpr::aggregate(Aggregation::Sum, primary.column()),
                    "primary_value",
                ),
                SelectItem::aliased(
                    SqlExpr::aggregate(Aggregation::Avg, secondary.column()),
                    "secondary_value",
                ),
            ],
            from: self.table.clone(),
            group_by: vec![week.clone()],
            order_by: vec![OrderItem {
                expr: week,
                direction: SortDirection::Asc,
            }],
            ..Default::default()
        };
        self.render(&query)
    }

    /// Distinct non-null values of a dropdown dimension.
    pub fn distinct_values(&self, dimension: Dimension) -> BoundQuery {
        let column = SqlExpr::column(dimension.column());
        let query = SelectQuery {
            distinct: true,
            select: vec![SelectItem::aliased(column.clone(), dimension.alias())],
            from: self.table.clone(),
            filters: vec![SqlExpr::IsNotNull(Box::new(column.clone()))],
            order_by: vec![OrderItem {
                expr: column,
                direction: dimension.sort(),
            }],
            ..Default::default()
        };
        self.render(&query)
    }

    /// `SELECT *` preview of any allow-listed table.
    pub fn sample_rows(&self, table: &TablePath, limit: u64) -> BoundQuery {
        let query = SelectQuery {
            select: vec![SelectItem {
                expr: SqlExpr::Raw("*".to_string()),
                alias: None,
            }],
            from: table.clone(),
            limit: Some(limit),
            ..Default::default()
        };
        self.render(&query)
    }

    /// Table listing scoped to the configured catalog and schema when both are set.
    pub fn show_tables(&self) -> BoundQuery {
        BoundQuery::raw(self.dialect.show_tables(self.table.scope()))
    }
}
