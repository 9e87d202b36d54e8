use crate::sql_ast::{SortDirection, SqlExpr};

use super::columns;

/// Dropdown entry meaning "no campaign restriction".
pub const ALL_CAMPAIGNS: &str = "All Campaign";
/// Dropdown entry meaning "no keyword restriction".
pub const ALL_KEYWORDS: &str = "All Keywords";

/// Optional equality predicates narrowing a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    campaign: Option<String>,
    keyword: Option<String>,
    week: Option<String>,
}

/// Empty strings and the "All ..." sentinels both mean unset. Anything else is
/// bound byte for byte.
fn normalize(value: &str, sentinel: Option<&str>) -> Option<String> {
    if value.is_empty() || Some(value) == sentinel {
        None
    } else {
        Some(value.to_string())
    }
}

impl ReportFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw dropdown selections.
    pub fn from_selection(campaign: &str, keyword: &str, week: Option<&str>) -> Self {
        let filter = Self::new().with_campaign(campaign).with_keyword(keyword);
        match week {
            Some(week) => filter.with_week(week),
            None => filter,
        }
    }

    pub fn with_campaign(mut self, campaign: &str) -> Self {
        self.campaign = normalize(campaign, Some(ALL_CAMPAIGNS));
        self
    }

    pub fn with_keyword(mut self, keyword: &str) -> Self {
        self.keyword = normalize(keyword, Some(ALL_KEYWORDS));
        self
    }

    pub fn with_week(mut self, week: &str) -> Self {
        self.week = normalize(week, None);
        self
    }

    pub fn campaign(&self) -> Option<&str> {
        self.campaign.as_deref()
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    pub fn week(&self) -> Option<&str> {
        self.week.as_deref()
    }

    /// One bound equality predicate per set field, in campaign, keyword, week order.
    pub(crate) fn predicates(&self) -> Vec<SqlExpr> {
        [
            (columns::CAMPAIGN, &self.campaign),
            (columns::KEYWORD, &self.keyword),
            (columns::WEEK, &self.week),
        ]
        .into_iter()
        .filter_map(|(column, value)| {
            value
                .as_deref()
                .map(|v| SqlExpr::eq_param(column, v))
        })
        .collect()
    }
}

/// Dimensions offered as filter dropdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Campaign,
    Keyword,
    Week,
}

impl Dimension {
    pub fn column(&self) -> &'static str {
        match self {
            Dimension::Campaign => columns::CAMPAIGN,
            Dimension::Keyword => columns::KEYWORD,
            Dimension::Week => columns::WEEK,
        }
    }

    /// Alias of the single column returned by the distinct lookup.
    pub fn alias(&self) -> &'static str {
        match self {
            Dimension::Campaign => "campaign_name",
            Dimension::Keyword => "keyword",
            Dimension::Week => "week",
        }
    }

    /// Most recent weeks first; names alphabetically.
    pub fn sort(&self) -> SortDirection {
        match self {
            Dimension::Week => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    /// Synthetic first entry of the dropdown, when the dimension has one.
    pub fn sentinel(&self) -> Option<&'static str> {
        match self {
            Dimension::Campaign => Some(ALL_CAMPAIGNS),
            Dimension::Keyword => Some(ALL_KEYWORDS),
            Dimension::Week => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_mean_unset() {
        let f = ReportFilter::from_selection(ALL_CAMPAIGNS, ALL_KEYWORDS, None);
        assert_eq!(f, ReportFilter::new());
        assert!(f.predicates().is_empty());
    }

    #[test]
    fn empty_values_mean_unset() {
        let f = ReportFilter::new().with_campaign("").with_week("");
        assert_eq!(f.campaign(), None);
        assert_eq!(f.week(), None);
    }

    #[test]
    fn set_values_match_exactly() {
        let f = ReportFilter::from_selection("Spring Sale ", "crisps", Some("2025-02-24"));
        assert_eq!(f.campaign(), Some("Spring Sale "));
        assert_eq!(f.keyword(), Some("crisps"));
        assert_eq!(f.week(), Some("2025-02-24"));
        assert_eq!(f.predicates().len(), 3);
    }
}
