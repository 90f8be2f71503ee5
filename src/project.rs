// Report Projection: shape an aggregation result into the exact column
// set one report view expects. Amounts stay raw `f64` inside the engine;
// this module is the presentation boundary where locale formatting
// happens.
use crate::aggregate::{self, SortOrder};
use crate::error::Result;
use crate::types::{
    AggregationBucket, AreaSummaryRow, DealerSummaryRow, GenericReportRow, GroupBucket,
    GroupSummaryRow, NormalizedRow, ProductSummaryRow, SummaryStats, TargetBucket,
    TargetReportRow,
};
use crate::util::format_number;

/// The report shapes the UI can ask for. Anything unrecognized falls
/// back to `Raw`, the generic verbatim projection; that path is a
/// fallback, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportShape {
    Dealer,
    Product,
    Area,
    Target,
    Group,
    Raw,
}

impl ReportShape {
    pub fn parse(s: &str) -> ReportShape {
        match s.trim().to_lowercase().as_str() {
            "dealer" => ReportShape::Dealer,
            "product" => ReportShape::Product,
            "area" => ReportShape::Area,
            "target" => ReportShape::Target,
            "group" => ReportShape::Group,
            _ => ReportShape::Raw,
        }
    }
}

/// One rendered report, whichever shape was requested.
#[derive(Debug)]
pub enum ProjectedReport {
    Dealer(Vec<DealerSummaryRow>),
    Product(Vec<ProductSummaryRow>),
    Area(Vec<AreaSummaryRow>),
    Target(Vec<TargetReportRow>),
    Group(Vec<GroupSummaryRow>),
    Raw(Vec<GenericReportRow>),
}

impl ProjectedReport {
    pub fn len(&self) -> usize {
        match self {
            ProjectedReport::Dealer(r) => r.len(),
            ProjectedReport::Product(r) => r.len(),
            ProjectedReport::Area(r) => r.len(),
            ProjectedReport::Target(r) => r.len(),
            ProjectedReport::Group(r) => r.len(),
            ProjectedReport::Raw(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Aggregate and project one report shape. This is the single entry
/// point every report view goes through.
pub fn run_report(rows: &[NormalizedRow], shape: ReportShape) -> Result<ProjectedReport> {
    Ok(match shape {
        ReportShape::Dealer => {
            let buckets = aggregate::aggregate(rows, &["partyName"], "amount", None)?;
            ProjectedReport::Dealer(project_dealer(&buckets))
        }
        ReportShape::Product => {
            let buckets =
                aggregate::aggregate(rows, &["itemName", "itemCategory"], "amount", None)?;
            let qty = aggregate::aggregate_sorted(
                rows,
                &["itemName", "itemCategory"],
                "qty",
                None,
                SortOrder::DimensionAsc,
            )?;
            ProjectedReport::Product(project_product(&buckets, &qty))
        }
        ReportShape::Area => {
            let buckets = aggregate::aggregate(rows, &["city"], "amount", None)?;
            ProjectedReport::Area(project_area(&buckets))
        }
        ReportShape::Target => {
            let buckets = aggregate::aggregate_target(rows, "salesman")?;
            ProjectedReport::Target(project_target(&buckets))
        }
        ReportShape::Group => {
            let buckets = aggregate::aggregate_group_top_dealer(rows, "itemGroup")?;
            ProjectedReport::Group(project_group(&buckets))
        }
        ReportShape::Raw => ProjectedReport::Raw(project_raw(rows)),
    })
}

pub fn project_dealer(buckets: &[AggregationBucket]) -> Vec<DealerSummaryRow> {
    buckets
        .iter()
        .enumerate()
        .map(|(i, b)| DealerSummaryRow {
            rank: i + 1,
            dealer: b.dimensions.first().cloned().unwrap_or_default(),
            total_amount: format_number(b.sum, 2),
            bills: b.count,
        })
        .collect()
}

/// Product rows carry both amount and qty, so the qty aggregation is
/// joined in by dimension key.
pub fn project_product(
    amount_buckets: &[AggregationBucket],
    qty_buckets: &[AggregationBucket],
) -> Vec<ProductSummaryRow> {
    let qty_by_key: std::collections::HashMap<&[String], f64> = qty_buckets
        .iter()
        .map(|q| (q.dimensions.as_slice(), q.sum))
        .collect();
    amount_buckets
        .iter()
        .map(|b| {
            let qty = qty_by_key
                .get(b.dimensions.as_slice())
                .copied()
                .unwrap_or(0.0);
            ProductSummaryRow {
                item: b.dimensions.first().cloned().unwrap_or_default(),
                category: b.dimensions.get(1).cloned().unwrap_or_default(),
                total_qty: format_number(qty, 0),
                total_amount: format_number(b.sum, 2),
            }
        })
        .collect()
}

pub fn project_area(buckets: &[AggregationBucket]) -> Vec<AreaSummaryRow> {
    buckets
        .iter()
        .map(|b| AreaSummaryRow {
            city: b.dimensions.first().cloned().unwrap_or_default(),
            total_amount: format_number(b.sum, 2),
            bills: b.count,
        })
        .collect()
}

pub fn project_target(buckets: &[TargetBucket]) -> Vec<TargetReportRow> {
    buckets
        .iter()
        .map(|b| TargetReportRow {
            salesman: b.dimension.clone(),
            target: format_number(b.target, 2),
            achievement: format_number(b.achievement, 2),
            // No target set renders as a dash, never "0.00" or infinity.
            achievement_pct: match b.achievement_percent {
                Some(p) => format_number(p, 2),
                None => "-".to_string(),
            },
        })
        .collect()
}

pub fn project_group(buckets: &[GroupBucket]) -> Vec<GroupSummaryRow> {
    buckets
        .iter()
        .map(|b| GroupSummaryRow {
            group: b.group.clone(),
            total_amount: format_number(b.total, 2),
            top_dealer: b.top_dealer.clone(),
            top_dealer_amount: format_number(b.top_dealer_amount, 2),
        })
        .collect()
}

/// Generic fallback: the main fields of each source row, verbatim.
pub fn project_raw(rows: &[NormalizedRow]) -> Vec<GenericReportRow> {
    rows.iter()
        .map(|r| GenericReportRow {
            date: r.date.map(|d| d.to_string()).unwrap_or_default(),
            party: r.party_name.clone(),
            product: r.item_name.clone(),
            salesman: r.salesman.clone(),
            area: r.city.clone(),
            amount: format_number(r.amount, 2),
        })
        .collect()
}

/// Global stats for the summary JSON written next to the reports.
pub fn summarize(rows: &[NormalizedRow]) -> SummaryStats {
    let mut parties = std::collections::HashSet::new();
    let mut items = std::collections::HashSet::new();
    let mut salesmen = std::collections::HashSet::new();
    let mut total_qty = 0.0;
    let mut total_amount = 0.0;
    for r in rows {
        if !r.party_name.trim().is_empty() {
            parties.insert(r.party_name.as_str());
        }
        if !r.item_name.trim().is_empty() {
            items.insert(r.item_name.as_str());
        }
        if !r.salesman.trim().is_empty() {
            salesmen.insert(r.salesman.as_str());
        }
        total_qty += r.qty;
        total_amount += r.amount;
    }
    SummaryStats {
        total_rows: rows.len(),
        total_parties: parties.len(),
        total_items: items.len(),
        total_salesmen: salesmen.len(),
        total_qty,
        total_amount,
    }
}
