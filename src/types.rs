use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabled::Tabled;

/// A single spreadsheet cell as decoded from a workbook. Exports are
/// loosely typed, so a cell is either text, a number, or blank.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Text(String),
    Number(f64),
    Empty,
}

impl RawCell {
    /// String form of the cell, with blank cells rendering as `""` so a
    /// ragged row never surfaces a missing value as anything but empty.
    pub fn as_text(&self) -> String {
        match self {
            RawCell::Text(s) => s.clone(),
            RawCell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            RawCell::Empty => String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RawCell::Text(s) => s.trim().is_empty(),
            RawCell::Number(_) => false,
            RawCell::Empty => true,
        }
    }
}

/// Rows-by-columns cell grid produced by decoding one sheet. Created once
/// per uploaded file and discarded after normalization.
pub type RawGrid = Vec<Vec<RawCell>>;

/// A header-keyed record before canonical field resolution. The XML
/// decoder emits these directly; the grid path builds them from the
/// header row. `BTreeMap` keeps iteration deterministic so normalization
/// is idempotent.
pub type RawRecord = BTreeMap<String, String>;

/// A flat record with canonical fields, the unit every downstream
/// component operates on. Field aliasing has already happened: whatever
/// header text the source used, the value lives under exactly one of
/// these names. `amount` and `qty` are always numeric (0 on unparsable
/// input, never NaN), and total/summary source lines are never
/// materialized as a `NormalizedRow` at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRow {
    pub date: Option<NaiveDate>,
    pub party_name: String,
    pub item_name: String,
    pub item_category: String,
    pub item_group: String,
    pub salesman: String,
    pub city: String,
    pub qty: f64,
    pub amount: f64,
    /// Sales target, when the source carried a Target column; 0 otherwise.
    #[serde(default)]
    pub target: f64,
    /// Explicit achievement figure. `None` when the source had no such
    /// column, in which case the target report falls back to `amount`.
    #[serde(default)]
    pub achievement: Option<f64>,
    /// Unmapped original fields, passed through for display.
    #[serde(default)]
    pub extras: RawRecord,
}

impl NormalizedRow {
    /// The achievement measure for target reports: the explicit column
    /// when present, otherwise the row amount.
    pub fn achievement_or_amount(&self) -> f64 {
        self.achievement.unwrap_or(self.amount)
    }
}

/// Accumulator for one group-by key: the ordered dimension values plus a
/// running sum and contributing-row count. Built fresh per aggregation
/// call, never reused across calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationBucket {
    pub dimensions: Vec<String>,
    pub sum: f64,
    pub count: usize,
}

/// Per-salesman (or other dimension) target bucket. `achievement_percent`
/// is `None` when no target is set; the projection renders that as a
/// dash, never as 0% or a division blow-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetBucket {
    pub dimension: String,
    pub target: f64,
    pub achievement: f64,
    pub achievement_percent: Option<f64>,
    pub count: usize,
}

/// Per-group bucket carrying the single highest-selling dealer within the
/// group. Ties go to the dealer encountered first in row order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupBucket {
    pub group: String,
    pub total: f64,
    pub count: usize,
    pub top_dealer: String,
    pub top_dealer_amount: f64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DealerSummaryRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Dealer")]
    #[tabled(rename = "Dealer")]
    pub dealer: String,
    #[serde(rename = "TotalAmount")]
    #[tabled(rename = "TotalAmount")]
    pub total_amount: String,
    #[serde(rename = "Bills")]
    #[tabled(rename = "Bills")]
    pub bills: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ProductSummaryRow {
    #[serde(rename = "Item")]
    #[tabled(rename = "Item")]
    pub item: String,
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
    #[serde(rename = "TotalQty")]
    #[tabled(rename = "TotalQty")]
    pub total_qty: String,
    #[serde(rename = "TotalAmount")]
    #[tabled(rename = "TotalAmount")]
    pub total_amount: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct AreaSummaryRow {
    #[serde(rename = "City")]
    #[tabled(rename = "City")]
    pub city: String,
    #[serde(rename = "TotalAmount")]
    #[tabled(rename = "TotalAmount")]
    pub total_amount: String,
    #[serde(rename = "Bills")]
    #[tabled(rename = "Bills")]
    pub bills: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct TargetReportRow {
    #[serde(rename = "Salesman")]
    #[tabled(rename = "Salesman")]
    pub salesman: String,
    #[serde(rename = "Target")]
    #[tabled(rename = "Target")]
    pub target: String,
    #[serde(rename = "Achievement")]
    #[tabled(rename = "Achievement")]
    pub achievement: String,
    #[serde(rename = "AchievementPct")]
    #[tabled(rename = "AchievementPct")]
    pub achievement_pct: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupSummaryRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "TotalAmount")]
    #[tabled(rename = "TotalAmount")]
    pub total_amount: String,
    #[serde(rename = "TopDealer")]
    #[tabled(rename = "TopDealer")]
    pub top_dealer: String,
    #[serde(rename = "TopDealerAmount")]
    #[tabled(rename = "TopDealerAmount")]
    pub top_dealer_amount: String,
}

/// Fallback projection for an unrecognized report shape: the source row's
/// main fields verbatim.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GenericReportRow {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Party")]
    #[tabled(rename = "Party")]
    pub party: String,
    #[serde(rename = "Product")]
    #[tabled(rename = "Product")]
    pub product: String,
    #[serde(rename = "Salesman")]
    #[tabled(rename = "Salesman")]
    pub salesman: String,
    #[serde(rename = "Area")]
    #[tabled(rename = "Area")]
    pub area: String,
    #[serde(rename = "Amount")]
    #[tabled(rename = "Amount")]
    pub amount: String,
}

/// Global stats written alongside the per-shape reports.
#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub total_rows: usize,
    pub total_parties: usize,
    pub total_items: usize,
    pub total_salesmen: usize,
    pub total_qty: f64,
    pub total_amount: f64,
}
