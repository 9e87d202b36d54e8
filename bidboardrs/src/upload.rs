//! Keyword CSV upload and per-keyword bid constraints.

use std::collections::HashSet;
use std::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{BidboardError, Result};

/// Header names tried, in order, before falling back to the first column.
const KEY_COLUMNS: [&str; 2] = ["Search Term", "Key"];

/// Distinct keywords from an uploaded CSV, in first-seen order.
pub fn parse_keyword_csv<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(BidboardError::Upload("CSV file has no header row".to_string()));
    }

    let idx = KEY_COLUMNS
        .iter()
        .find_map(|name| headers.iter().position(|h| h.trim() == *name))
        .unwrap_or(0);
    tracing::debug!(column = headers.get(idx).unwrap_or_default(), "keyword column selected");

    let mut seen = HashSet::new();
    let mut keywords = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let Some(value) = record.get(idx).map(str::trim) else {
            continue;
        };
        if !value.is_empty() && seen.insert(value.to_string()) {
            keywords.push(value.to_string());
        }
    }
    tracing::info!(keywords = keywords.len(), "parsed keyword upload");
    Ok(keywords)
}

/// Allowed week-on-week bid movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Volatility {
    #[default]
    Five,
    Ten,
    Fifteen,
    Twenty,
}

impl Volatility {
    pub fn percent(&self) -> u8 {
        match self {
            Volatility::Five => 5,
            Volatility::Ten => 10,
            Volatility::Fifteen => 15,
            Volatility::Twenty => 20,
        }
    }
}

impl fmt::Display for Volatility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidConstraint {
    pub keyword: String,
    pub min_bid: f64,
    pub max_bid: f64,
    pub volatility: Volatility,
    pub roas_target: f64,
}

impl BidConstraint {
    pub const DEFAULT_MIN_BID: f64 = 0.30;
    pub const DEFAULT_MAX_BID: f64 = 0.50;
    pub const DEFAULT_ROAS_TARGET: f64 = 2.50;

    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            min_bid: Self::DEFAULT_MIN_BID,
            max_bid: Self::DEFAULT_MAX_BID,
            volatility: Volatility::default(),
            roas_target: Self::DEFAULT_ROAS_TARGET,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(BidboardError::Upload(format!("{}: {msg}", self.keyword)));
        if !self.min_bid.is_finite() || !self.max_bid.is_finite() || self.min_bid < 0.0 {
            return fail("bids must be non-negative numbers".to_string());
        }
        if self.min_bid > self.max_bid {
            return fail(format!(
                "min bid {:.2} exceeds max bid {:.2}",
                self.min_bid, self.max_bid
            ));
        }
        if !(self.roas_target > 0.0) {
            return fail("ROAS target must be positive".to_string());
        }
        Ok(())
    }
}

pub fn default_constraints(keywords: &[String]) -> Vec<BidConstraint> {
    keywords.iter().map(BidConstraint::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_search_term_column() {
        let data = "Key,Search Term\nk1,crisps\nk2,dip\nk3,crisps\n";
        let keywords = parse_keyword_csv(data.as_bytes()).unwrap();
        assert_eq!(keywords, vec!["crisps", "dip"]);
    }

    #[test]
    fn falls_back_to_key_then_first_column() {
        let data = "Clicks,Key\n1,crisps\n2,\n3,salsa\n";
        assert_eq!(parse_keyword_csv(data.as_bytes()).unwrap(), vec!["crisps", "salsa"]);

        let data = "Term,Clicks\nnachos,1\n nachos ,2\n";
        assert_eq!(parse_keyword_csv(data.as_bytes()).unwrap(), vec!["nachos"]);
    }

    #[test]
    fn empty_file_is_rejected() {
        let err = parse_keyword_csv("".as_bytes()).unwrap_err();
        assert!(matches!(err, BidboardError::Upload(_)));
    }

    #[test]
    fn default_constraints_validate() {
        let rows = default_constraints(&["crisps".to_string()]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].min_bid, 0.30);
        assert_eq!(rows[0].max_bid, 0.50);
        assert_eq!(rows[0].volatility.to_string(), "5%");
        assert_eq!(rows[0].roas_target, 2.50);
        assert!(rows[0].validate().is_ok());
    }

    #[test]
    fn inverted_bids_fail_validation() {
        let mut row = BidConstraint::new("crisps");
        row.min_bid = 0.9;
        assert!(row.validate().is_err());
        row.min_bid = 0.1;
        row.roas_target = 0.0;
        assert!(row.validate().is_err());
    }
}
