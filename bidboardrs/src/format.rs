//! Display formatting for KPI tiles.

use serde::Serialize;
use serde_json::Value;

use crate::executor::TabularResult;
use crate::query_builder::summary;

/// Compact magnitude: `1.5K`, `2.3M`, or a whole number below a thousand.
pub fn format_magnitude(value: Option<f64>) -> String {
    match value.filter(|v| !v.is_nan()) {
        None => "0".to_string(),
        Some(v) if v >= 1_000_000.0 => format!("{:.1}M", v / 1_000_000.0),
        Some(v) if v >= 1_000.0 => format!("{:.1}K", v / 1_000.0),
        Some(v) => format!("{v:.0}"),
    }
}

pub fn format_decimal(value: Option<f64>) -> String {
    format!("{:.2}", value.filter(|v| !v.is_nan()).unwrap_or(0.0))
}

pub fn format_percent(value: Option<f64>) -> String {
    format!("{}%", format_decimal(value))
}

/// Accepts JSON numbers and numeric strings; anything else is missing.
pub fn numeric(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Formatted dashboard tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiSummary {
    pub impressions: String,
    pub cpa: String,
    pub roas: String,
    pub ctr: String,
    pub conversion_rate: String,
    pub cpc: String,
    pub clicks: String,
    pub avg_rank: String,
    pub spend: String,
    pub sales_count: String,
    pub sales_value: String,
}

impl KpiSummary {
    /// Format the first row of a KPI aggregate. `None` when there is no row or
    /// every aggregate is NULL (no data matched).
    pub fn from_row(table: &TabularResult) -> Option<Self> {
        if table.is_empty() {
            return None;
        }
        let get = |alias: &str| numeric(table.cell(0, alias));
        let aliases = [
            summary::TOTAL_IMPRESSIONS,
            summary::AVG_CPA,
            summary::AVG_ROAS,
            summary::AVG_CTR,
            summary::AVG_CONVERSION_RATE,
            summary::AVG_CPC,
            summary::TOTAL_CLICKS,
            summary::AVG_RANK,
            summary::TOTAL_SPEND,
            summary::TOTAL_SALES_COUNT,
            summary::TOTAL_SALES_VALUE,
        ];
        if aliases.iter().all(|alias| get(alias).is_none()) {
            return None;
        }

        Some(Self {
            impressions: format_magnitude(get(summary::TOTAL_IMPRESSIONS)),
            cpa: format_decimal(get(summary::AVG_CPA)),
            roas: format_decimal(get(summary::AVG_ROAS)),
            ctr: format_percent(get(summary::AVG_CTR)),
            conversion_rate: format_percent(get(summary::AVG_CONVERSION_RATE)),
            cpc: format_decimal(get(summary::AVG_CPC)),
            clicks: format_magnitude(get(summary::TOTAL_CLICKS)),
            avg_rank: format_decimal(get(summary::AVG_RANK)),
            spend: format_magnitude(get(summary::TOTAL_SPEND)),
            sales_count: format_magnitude(get(summary::TOTAL_SALES_COUNT)),
            sales_value: format_magnitude(get(summary::TOTAL_SALES_VALUE)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ColumnMeta;
    use serde_json::json;

    #[test]
    fn magnitude_bands() {
        assert_eq!(format_magnitude(Some(999.0)), "999");
        assert_eq!(format_magnitude(Some(1500.0)), "1.5K");
        assert_eq!(format_magnitude(Some(2_300_000.0)), "2.3M");
        assert_eq!(format_magnitude(Some(1_000.0)), "1.0K");
        assert_eq!(format_magnitude(None), "0");
        assert_eq!(format_magnitude(Some(f64::NAN)), "0");
    }

    #[test]
    fn decimals_and_percentages() {
        assert_eq!(format_decimal(Some(2.581)), "2.58");
        assert_eq!(format_percent(Some(3.456)), "3.46%");
        assert_eq!(format_percent(None), "0.00%");
    }

    #[test]
    fn numeric_accepts_strings() {
        assert_eq!(numeric(Some(&json!("12.5"))), Some(12.5));
        assert_eq!(numeric(Some(&json!(7))), Some(7.0));
        assert_eq!(numeric(Some(&json!("n/a"))), None);
        assert_eq!(numeric(Some(&Value::Null)), None);
        assert_eq!(numeric(None), None);
    }

    #[test]
    fn all_null_aggregates_mean_no_data() {
        let table = TabularResult::new(
            vec![
                ColumnMeta::new(summary::TOTAL_IMPRESSIONS),
                ColumnMeta::new(summary::AVG_ROAS),
            ],
            vec![vec![Value::Null, Value::Null]],
        )
        .unwrap();
        assert_eq!(KpiSummary::from_row(&table), None);
        assert_eq!(KpiSummary::from_row(&TabularResult::empty()), None);
    }
}
