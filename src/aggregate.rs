// Aggregation Engine: the one shared group-by routine every report view
// calls instead of hand-rolling its own loop. Pure over its input: no
// caching, no mutation, so concurrent report requests can share one
// normalized row sequence.
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{PipelineError, Result};
use crate::types::{AggregationBucket, GroupBucket, NormalizedRow, TargetBucket};
use crate::util::contains_total_marker;

/// Fields usable as grouping dimensions.
const DIMENSION_FIELDS: [&str; 6] = [
    "partyName",
    "itemName",
    "itemCategory",
    "itemGroup",
    "salesman",
    "city",
];

/// Fields usable as the summed measure.
const MEASURE_FIELDS: [&str; 4] = ["amount", "qty", "target", "achievement"];

/// Label used when a row has no value for a grouping dimension. The
/// source reports disagreed between "Unknown" and "-"; this codebase
/// uses one fallback everywhere.
pub const MISSING_DIMENSION: &str = "Unknown";

/// Row predicate applied before grouping (e.g. one salesman only).
pub type RowFilter<'a> = &'a dyn Fn(&NormalizedRow) -> bool;

/// Bucket ordering. The default is summed measure, descending; ties keep
/// first-encounter order either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    MeasureDesc,
    DimensionAsc,
}

/// Group `rows` by one or two dimension fields and sum `measure`,
/// descending by sum. Unknown field names are an `InvalidAggregationSpec`
/// error naming the field, never an empty result.
pub fn aggregate(
    rows: &[NormalizedRow],
    dimensions: &[&str],
    measure: &str,
    filter: Option<RowFilter>,
) -> Result<Vec<AggregationBucket>> {
    aggregate_sorted(rows, dimensions, measure, filter, SortOrder::MeasureDesc)
}

pub fn aggregate_sorted(
    rows: &[NormalizedRow],
    dimensions: &[&str],
    measure: &str,
    filter: Option<RowFilter>,
    order: SortOrder,
) -> Result<Vec<AggregationBucket>> {
    for dim in dimensions {
        validate_dimension(dim)?;
    }
    validate_measure(measure)?;

    let mut buckets: Vec<AggregationBucket> = Vec::new();
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();

    for row in rows {
        if is_noise_row(row) {
            continue;
        }
        if let Some(pred) = filter {
            if !pred(row) {
                continue;
            }
        }
        let key: Vec<String> = dimensions.iter().map(|d| dimension_value(row, d)).collect();
        let value = measure_value(row, measure);
        match index.get(&key) {
            Some(&i) => {
                buckets[i].sum += value;
                buckets[i].count += 1;
            }
            None => {
                index.insert(key.clone(), buckets.len());
                buckets.push(AggregationBucket {
                    dimensions: key,
                    sum: value,
                    count: 1,
                });
            }
        }
    }

    sort_buckets(&mut buckets, order);
    Ok(buckets)
}

/// Per-group target vs achievement for the ASM target report. The
/// achievement sum falls back to `amount` for rows without an explicit
/// achievement column. A group with zero target gets a `None` percent:
/// "no target set", rendered downstream as a dash, never 0% or a
/// division blow-up.
pub fn aggregate_target(rows: &[NormalizedRow], dimension: &str) -> Result<Vec<TargetBucket>> {
    validate_dimension(dimension)?;

    let mut buckets: Vec<TargetBucket> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        if is_noise_row(row) {
            continue;
        }
        let key = dimension_value(row, dimension);
        let i = match index.get(&key) {
            Some(&i) => i,
            None => {
                index.insert(key.clone(), buckets.len());
                buckets.push(TargetBucket {
                    dimension: key,
                    target: 0.0,
                    achievement: 0.0,
                    achievement_percent: None,
                    count: 0,
                });
                buckets.len() - 1
            }
        };
        buckets[i].target += row.target;
        buckets[i].achievement += row.achievement_or_amount();
        buckets[i].count += 1;
    }

    for b in &mut buckets {
        b.achievement_percent = if b.target != 0.0 {
            Some((b.achievement / b.target) * 100.0)
        } else {
            None
        };
    }

    buckets.sort_by(|a, b| {
        b.achievement
            .partial_cmp(&a.achievement)
            .unwrap_or(Ordering::Equal)
    });
    Ok(buckets)
}

/// Per-group totals plus the single highest-summing dealer within each
/// group, for the party-group report. Dealer ties break toward the
/// dealer first encountered in row order.
pub fn aggregate_group_top_dealer(
    rows: &[NormalizedRow],
    group_dimension: &str,
) -> Result<Vec<GroupBucket>> {
    validate_dimension(group_dimension)?;

    struct Acc {
        group: String,
        total: f64,
        count: usize,
        dealer_order: Vec<String>,
        dealer_sums: HashMap<String, f64>,
    }

    let mut accs: Vec<Acc> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        if is_noise_row(row) {
            continue;
        }
        let key = dimension_value(row, group_dimension);
        let i = match index.get(&key) {
            Some(&i) => i,
            None => {
                index.insert(key.clone(), accs.len());
                accs.push(Acc {
                    group: key,
                    total: 0.0,
                    count: 0,
                    dealer_order: Vec::new(),
                    dealer_sums: HashMap::new(),
                });
                accs.len() - 1
            }
        };
        let acc = &mut accs[i];
        acc.total += row.amount;
        acc.count += 1;
        let dealer = dimension_value(row, "partyName");
        if !acc.dealer_sums.contains_key(&dealer) {
            acc.dealer_order.push(dealer.clone());
        }
        *acc.dealer_sums.entry(dealer).or_insert(0.0) += row.amount;
    }

    let mut buckets: Vec<GroupBucket> = accs
        .into_iter()
        .map(|acc| {
            // Scan in first-encounter order with strict greater-than so a
            // tie keeps the earlier dealer.
            let mut top_dealer = String::new();
            let mut top_amount = f64::NEG_INFINITY;
            for dealer in &acc.dealer_order {
                let sum = acc.dealer_sums[dealer];
                if sum > top_amount {
                    top_amount = sum;
                    top_dealer = dealer.clone();
                }
            }
            GroupBucket {
                group: acc.group,
                total: acc.total,
                count: acc.count,
                top_dealer,
                top_dealer_amount: if top_amount.is_finite() { top_amount } else { 0.0 },
            }
        })
        .collect();

    buckets.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));
    Ok(buckets)
}

/// Second line of defense against summary lines: even if a total row
/// survived grid-level trailing-row removal, it never contributes to a
/// bucket.
pub fn is_noise_row(row: &NormalizedRow) -> bool {
    let mut joined = String::new();
    for field in [
        &row.party_name,
        &row.item_name,
        &row.item_category,
        &row.item_group,
        &row.salesman,
        &row.city,
    ] {
        joined.push_str(field);
        joined.push(' ');
    }
    for value in row.extras.values() {
        joined.push_str(value);
        joined.push(' ');
    }
    contains_total_marker(&joined)
}

fn dimension_value(row: &NormalizedRow, field: &str) -> String {
    let raw = match field {
        "partyName" => row.party_name.as_str(),
        "itemName" => row.item_name.as_str(),
        "itemCategory" => row.item_category.as_str(),
        "itemGroup" => row.item_group.as_str(),
        "salesman" => row.salesman.as_str(),
        "city" => row.city.as_str(),
        _ => "",
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        MISSING_DIMENSION.to_string()
    } else {
        trimmed.to_string()
    }
}

fn measure_value(row: &NormalizedRow, field: &str) -> f64 {
    match field {
        "amount" => row.amount,
        "qty" => row.qty,
        "target" => row.target,
        "achievement" => row.achievement_or_amount(),
        _ => 0.0,
    }
}

fn validate_dimension(field: &str) -> Result<()> {
    if DIMENSION_FIELDS.contains(&field) {
        Ok(())
    } else {
        Err(PipelineError::InvalidAggregationSpec {
            field: field.to_string(),
        })
    }
}

fn validate_measure(field: &str) -> Result<()> {
    if MEASURE_FIELDS.contains(&field) {
        Ok(())
    } else {
        Err(PipelineError::InvalidAggregationSpec {
            field: field.to_string(),
        })
    }
}

fn sort_buckets(buckets: &mut [AggregationBucket], order: SortOrder) {
    match order {
        // `sort_by` is stable, so equal sums keep discovery order.
        SortOrder::MeasureDesc => {
            buckets.sort_by(|a, b| b.sum.partial_cmp(&a.sum).unwrap_or(Ordering::Equal));
        }
        SortOrder::DimensionAsc => {
            buckets.sort_by(|a, b| a.dimensions.cmp(&b.dimensions));
        }
    }
}
