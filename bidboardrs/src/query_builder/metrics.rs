//! KPI selector used by the performance chart.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::columns;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KpiMetric {
    Impressions,
    Clicks,
    Ctr,
    ConversionRate,
    Roas,
    Cpa,
    Cpc,
    Spend,
}

static BY_DISPLAY_NAME: Lazy<HashMap<&'static str, KpiMetric>> = Lazy::new(|| {
    KpiMetric::ALL
        .iter()
        .map(|m| (m.display_name(), *m))
        .collect()
});

impl KpiMetric {
    pub const ALL: [KpiMetric; 8] = [
        KpiMetric::Impressions,
        KpiMetric::Clicks,
        KpiMetric::Ctr,
        KpiMetric::ConversionRate,
        KpiMetric::Roas,
        KpiMetric::Cpa,
        KpiMetric::Cpc,
        KpiMetric::Spend,
    ];

    /// Fallback for an unrecognized primary selection.
    pub const DEFAULT_PRIMARY: KpiMetric = KpiMetric::Impressions;
    /// Fallback for an unrecognized secondary selection.
    pub const DEFAULT_SECONDARY: KpiMetric = KpiMetric::Roas;

    pub fn display_name(&self) -> &'static str {
        match self {
            KpiMetric::Impressions => "Impressions",
            KpiMetric::Clicks => "Clicks",
            KpiMetric::Ctr => "CTR",
            KpiMetric::ConversionRate => "Conversion Rate",
            KpiMetric::Roas => "ROAS",
            KpiMetric::Cpa => "CPA",
            KpiMetric::Cpc => "CPC",
            KpiMetric::Spend => "Spend",
        }
    }

    /// Warehouse column holding the metric.
    pub fn column(&self) -> &'static str {
        match self {
            KpiMetric::Impressions => columns::IMPRESSIONS,
            KpiMetric::Clicks => columns::CLICKS,
            KpiMetric::Ctr => columns::CTR,
            KpiMetric::ConversionRate => columns::CONVERSION_RATE,
            KpiMetric::Roas => columns::ROAS,
            KpiMetric::Cpa => columns::CPA,
            KpiMetric::Cpc => columns::CPC,
            KpiMetric::Spend => columns::COST,
        }
    }

    pub fn from_display_name(name: &str) -> Option<KpiMetric> {
        BY_DISPLAY_NAME.get(name.trim()).copied()
    }

    pub fn primary_or_default(name: &str) -> KpiMetric {
        Self::from_display_name(name).unwrap_or(Self::DEFAULT_PRIMARY)
    }

    pub fn secondary_or_default(name: &str) -> KpiMetric {
        Self::from_display_name(name).unwrap_or(Self::DEFAULT_SECONDARY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_selector_maps_to_one_column() {
        for metric in KpiMetric::ALL {
            assert_eq!(KpiMetric::from_display_name(metric.display_name()), Some(metric));
        }
        assert_eq!(KpiMetric::Spend.column(), "Cost");
        assert_eq!(KpiMetric::ConversionRate.column(), "Conv. rate");
    }

    #[test]
    fn unknown_selectors_fall_back() {
        assert_eq!(KpiMetric::from_display_name("Revenue"), None);
        assert_eq!(KpiMetric::primary_or_default("Revenue"), KpiMetric::Impressions);
        assert_eq!(KpiMetric::secondary_or_default(""), KpiMetric::Roas);
    }
}
