// Row Normalizer: turn a decoded cell grid or a voucher record sequence
// into the canonical `NormalizedRow` shape. All header aliasing happens
// here, once, so downstream code never repeats `row["Party Name"] ||
// row["Dealer"]`-style lookup chains.
use std::collections::BTreeSet;

use crate::types::{NormalizedRow, RawGrid, RawRecord};
use crate::util::{coerce_number, contains_total_marker, parse_date_lenient};

// Ordered header synonyms per canonical field. Lookup is case-insensitive
// on the trimmed header text; the first alias with a non-empty value wins.
// The Tally XML tag names are included so voucher records resolve through
// the same table as spreadsheet headers.
const DATE_ALIASES: &[&str] = &["date", "bill date", "invoice date", "voucher date"];
const PARTY_ALIASES: &[&str] =
    &["party name", "partyname", "dealer", "party", "customer", "customer name"];
// "party name" is a deliberate last resort for the item field: some
// exports list one row per party with no item column at all.
const ITEM_ALIASES: &[&str] =
    &["item name", "itemname", "item", "product name", "stockitemname", "party name"];
const CATEGORY_ALIASES: &[&str] = &["item category", "itemcategory", "category"];
const GROUP_ALIASES: &[&str] = &["item group", "itemgroup", "product group", "group"];
const SALESMAN_ALIASES: &[&str] =
    &["salesman", "sales man", "salesman name", "asm", "basicsalesname"];
const CITY_ALIASES: &[&str] = &["city", "area", "town", "district"];
const QTY_ALIASES: &[&str] = &["qty", "quantity", "billedqty", "billed qty"];
const AMOUNT_ALIASES: &[&str] = &["amount", "net amount", "bill amount", "sales value", "value"];
const TARGET_ALIASES: &[&str] = &["target", "target amount"];
const ACHIEVEMENT_ALIASES: &[&str] = &["achievement", "achieved", "ach"];

/// Normalize a decoded grid: row index 1 is the header row, data starts
/// at index 2 (row 0 is the export's title line). Grids with no data
/// rows produce an empty sequence.
pub fn normalize_grid(grid: &RawGrid) -> Vec<NormalizedRow> {
    normalize_records(&grid_to_records(grid))
}

/// Build header-keyed records from a grid. Blank header cells get
/// positional `COL_<n>` names (1-based) so every column has a unique,
/// present key. If the last data row mentions "total" anywhere it is a
/// trailing summary line and is dropped here; the broader noise filter
/// in `normalize_records` still applies to every row after that.
pub fn grid_to_records(grid: &RawGrid) -> Vec<RawRecord> {
    if grid.len() < 3 {
        return Vec::new();
    }
    let headers: Vec<String> = grid[1]
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let h = cell.as_text().trim().to_string();
            if h.is_empty() {
                format!("COL_{}", i + 1)
            } else {
                h
            }
        })
        .collect();

    let mut data: Vec<&Vec<_>> = grid[2..].iter().collect();
    if let Some(last) = data.last() {
        let has_total = last
            .iter()
            .any(|cell| cell.as_text().to_lowercase().contains("total"));
        if has_total {
            data.pop();
        }
    }

    data.iter()
        .map(|row| {
            let mut record = RawRecord::new();
            for (i, header) in headers.iter().enumerate() {
                let value = row.get(i).map(|c| c.as_text()).unwrap_or_default();
                record.insert(header.clone(), value);
            }
            record
        })
        .collect()
}

/// Normalize header-keyed records (from either the grid path or the
/// voucher decoder) into canonical rows. Noise rows (all-blank rows and
/// anything carrying a grand/sub/overall total marker) are never
/// materialized. Output preserves source row order.
pub fn normalize_records(records: &[RawRecord]) -> Vec<NormalizedRow> {
    records
        .iter()
        .filter(|r| !is_noise_record(r))
        .map(normalize_one)
        .collect()
}

fn normalize_one(record: &RawRecord) -> NormalizedRow {
    let mut consumed: BTreeSet<String> = BTreeSet::new();

    let date_raw = resolve(record, DATE_ALIASES, &mut consumed);
    let party_name = resolve(record, PARTY_ALIASES, &mut consumed);
    let item_name = resolve(record, ITEM_ALIASES, &mut consumed);
    let item_category = resolve(record, CATEGORY_ALIASES, &mut consumed);
    let item_group = resolve(record, GROUP_ALIASES, &mut consumed);
    let salesman = resolve(record, SALESMAN_ALIASES, &mut consumed);
    let city = resolve(record, CITY_ALIASES, &mut consumed);
    let qty_raw = resolve(record, QTY_ALIASES, &mut consumed);
    let amount_raw = resolve(record, AMOUNT_ALIASES, &mut consumed);
    let target_raw = resolve(record, TARGET_ALIASES, &mut consumed);
    let achievement_raw = resolve_present(record, ACHIEVEMENT_ALIASES, &mut consumed);

    let extras: RawRecord = record
        .iter()
        .filter(|(k, _)| !consumed.contains(*k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    NormalizedRow {
        date: parse_date_lenient(&date_raw),
        party_name: party_name.trim().to_string(),
        item_name: item_name.trim().to_string(),
        item_category: item_category.trim().to_string(),
        item_group: item_group.trim().to_string(),
        salesman: salesman.trim().to_string(),
        city: city.trim().to_string(),
        qty: coerce_number(&qty_raw),
        amount: coerce_number(&amount_raw),
        target: coerce_number(&target_raw),
        achievement: achievement_raw.map(|v| coerce_number(&v)),
        extras,
    }
}

/// First alias (in order) whose header is present with a non-empty
/// value; empty string when none matches. The chosen source header is
/// recorded so it does not also land in the passthrough extras.
fn resolve(record: &RawRecord, aliases: &[&str], consumed: &mut BTreeSet<String>) -> String {
    for alias in aliases {
        if let Some((key, value)) = lookup(record, alias) {
            if !value.trim().is_empty() {
                consumed.insert(key);
                return value;
            }
        }
    }
    String::new()
}

/// Like `resolve`, but distinguishes "column absent" from "column
/// present but blank": the target report needs to know whether the
/// source carried an explicit achievement column at all.
fn resolve_present(
    record: &RawRecord,
    aliases: &[&str],
    consumed: &mut BTreeSet<String>,
) -> Option<String> {
    for alias in aliases {
        if let Some((key, value)) = lookup(record, alias) {
            consumed.insert(key);
            return Some(value);
        }
    }
    None
}

fn lookup(record: &RawRecord, alias: &str) -> Option<(String, String)> {
    record
        .iter()
        .find(|(k, _)| k.trim().to_lowercase() == alias)
        .map(|(k, v)| (k.clone(), v.clone()))
}

/// A record is noise when every value is blank or when its concatenated
/// values mention a subtotal/grand-total marker anywhere.
pub fn is_noise_record(record: &RawRecord) -> bool {
    let all_blank = record.values().all(|v| v.trim().is_empty());
    if all_blank {
        return true;
    }
    let joined: String = record.values().map(|v| v.as_str()).collect::<Vec<_>>().join(" ");
    contains_total_marker(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawCell;

    fn text(s: &str) -> RawCell {
        RawCell::Text(s.to_string())
    }

    fn grid(rows: &[&[&str]]) -> RawGrid {
        rows.iter()
            .map(|r| r.iter().map(|c| text(c)).collect())
            .collect()
    }

    #[test]
    fn header_on_row_two_data_from_row_three() {
        let g = grid(&[
            &["Sales Report"],
            &["Party Name", "Amount"],
            &["Alpha", "100"],
            &["Beta", "250"],
        ]);
        let rows = normalize_grid(&g);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].party_name, "Alpha");
        assert_eq!(rows[1].amount, 250.0);
    }

    #[test]
    fn short_grids_normalize_to_nothing() {
        let g = grid(&[&["Party Name", "Amount"], &["Alpha", "100"]]);
        assert!(normalize_grid(&g).is_empty());
    }

    #[test]
    fn trailing_total_row_is_dropped() {
        let g = grid(&[
            &["Report"],
            &["Party Name", "Amount"],
            &["A", "100"],
            &["B", "200"],
            &["TOTAL", "300"],
        ]);
        let rows = normalize_grid(&g);
        assert_eq!(rows.len(), 2);

        let no_total = grid(&[
            &["Report"],
            &["Party Name", "Amount"],
            &["A", "100"],
            &["B", "200"],
        ]);
        assert_eq!(normalize_grid(&no_total).len(), 2);
    }

    #[test]
    fn mid_sequence_total_rows_are_noise() {
        let g = grid(&[
            &["Report"],
            &["Party Name", "Amount"],
            &["A", "100"],
            &["Grand Total", "5000"],
            &["B", "200"],
        ]);
        let rows = normalize_grid(&g);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| !r.party_name.contains("Total")));
    }

    #[test]
    fn blank_rows_are_noise() {
        let g = grid(&[
            &["Report"],
            &["Party Name", "Amount"],
            &["A", "100"],
            &["", ""],
            &["B", "200"],
        ]);
        assert_eq!(normalize_grid(&g).len(), 2);
    }

    #[test]
    fn dealer_and_party_name_headers_alias_to_the_same_field() {
        let dealer = grid(&[&["T"], &["Dealer", "Amount"], &["Alpha", "10"]]);
        let party = grid(&[&["T"], &["Party Name", "Amount"], &["Alpha", "10"]]);
        let a = normalize_grid(&dealer);
        let b = normalize_grid(&party);
        assert_eq!(a[0].party_name, "Alpha");
        assert_eq!(a[0].party_name, b[0].party_name);
        assert_eq!(a[0].amount, b[0].amount);
    }

    #[test]
    fn blank_header_cells_get_positional_names() {
        let g = grid(&[&["T", ""], &["Party Name", ""], &["Alpha", "note"]]);
        let records = grid_to_records(&g);
        assert_eq!(records[0]["COL_2"], "note");
        let rows = normalize_records(&records);
        assert_eq!(rows[0].extras["COL_2"], "note");
    }

    #[test]
    fn numeric_coercion_never_produces_nan() {
        let g = grid(&[
            &["T"],
            &["Party Name", "Qty", "Amount"],
            &["A", "N/A", "₹1,234.50"],
        ]);
        let rows = normalize_grid(&g);
        assert_eq!(rows[0].qty, 0.0);
        assert_eq!(rows[0].amount, 1234.5);
    }

    #[test]
    fn voucher_records_resolve_through_the_same_aliases() {
        let mut record = RawRecord::new();
        record.insert("VOUCHERTYPENAME".into(), "Sales".into());
        record.insert("DATE".into(), "20230401".into());
        record.insert("PARTYNAME".into(), "Alpha".into());
        record.insert("STOCKITEMNAME".into(), "Widget".into());
        record.insert("BILLEDQTY".into(), "3".into());
        record.insert("AMOUNT".into(), "450".into());
        record.insert("BASICSALESNAME".into(), "Ravi".into());
        let rows = normalize_records(&[record]);
        assert_eq!(rows[0].party_name, "Alpha");
        assert_eq!(rows[0].item_name, "Widget");
        assert_eq!(rows[0].qty, 3.0);
        assert_eq!(rows[0].salesman, "Ravi");
        assert_eq!(rows[0].date, chrono::NaiveDate::from_ymd_opt(2023, 4, 1));
        // Voucher type has no canonical field; it passes through.
        assert_eq!(rows[0].extras["VOUCHERTYPENAME"], "Sales");
    }

    #[test]
    fn normalization_is_idempotent() {
        let g = grid(&[
            &["T"],
            &["Party Name", "Amount", "Note"],
            &["A", "100", "x"],
            &["B", "200", "y"],
        ]);
        let first = normalize_grid(&g);
        let second = normalize_grid(&g);
        assert_eq!(first, second);
        let a = serde_json::to_string(&first).unwrap();
        let b = serde_json::to_string(&second).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn achievement_column_presence_is_preserved() {
        let with = grid(&[
            &["T"],
            &["Salesman", "Target", "Achievement"],
            &["Ravi", "1000", "800"],
        ]);
        let rows = normalize_grid(&with);
        assert_eq!(rows[0].achievement, Some(800.0));

        let without = grid(&[&["T"], &["Salesman", "Amount"], &["Ravi", "800"]]);
        let rows = normalize_grid(&without);
        assert_eq!(rows[0].achievement, None);
        assert_eq!(rows[0].achievement_or_amount(), 800.0);
    }
}
