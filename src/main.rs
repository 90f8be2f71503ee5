// Entry point and high-level CLI flow.
//
// - Option [1] imports a Tally export (xlsx/xls/csv or voucher XML),
//   normalizes it, and saves it to the import store.
// - Option [2] generates the five report shapes plus a JSON summary
//   from the current import.
// - Options [3]-[5] manage the stored imports and the current pointer.
mod aggregate;
mod decode;
mod error;
mod normalize;
mod output;
mod project;
mod store;
mod types;
mod util;
mod xml;

use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::sync::Mutex;

use error::Result;
use project::{ProjectedReport, ReportShape};
use store::ImportStore;
use types::NormalizedRow;

/// Directory holding saved import documents and the current pointer.
const DATA_DIR: &str = "imports";

// In-memory cache of the current dataset so one session can generate
// reports repeatedly without re-reading the store each time.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { rows: None }));

struct AppState {
    rows: Option<Vec<NormalizedRow>>,
}

/// Read a single line of input after printing the given prompt.
fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Handle option [1]: decode, normalize, and persist one export file.
///
/// A decode failure aborts this import only and reports the filename;
/// per-row failures inside a file are skipped and surface as a smaller
/// row count, not as an error.
fn handle_import() {
    let path = read_line("File to import (xlsx/xls/csv/xml): ");
    if path.is_empty() {
        println!("No file given.\n");
        return;
    }
    match import_file(&path) {
        Ok((meta, filtered)) => {
            println!(
                "Imported {} rows from {} (id {}).",
                util::format_int(meta.row_count as i64),
                meta.original_name,
                meta.id
            );
            if meta.skipped > 0 {
                println!(
                    "Note: {} records skipped due to extraction errors.",
                    util::format_int(meta.skipped as i64)
                );
            }
            if filtered > 0 {
                println!(
                    "Info: {} blank/total rows filtered out.",
                    util::format_int(filtered as i64)
                );
            }
            println!("");
            let mut state = APP_STATE.lock().unwrap();
            state.rows = None;
        }
        Err(e) => {
            eprintln!("Failed to import file: {}\n", e);
        }
    }
}

fn import_file(path: &str) -> Result<(store::ImportMeta, usize)> {
    let name = path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(path)
        .to_string();
    let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();

    let (rows, skipped, raw_count) = if ext == "xml" {
        let text = std::fs::read_to_string(path)?;
        let batch = xml::decode_vouchers(&text);
        let raw_count = batch.records.len();
        let rows = normalize::normalize_records(&batch.records);
        (rows, batch.skipped, raw_count)
    } else {
        let bytes = std::fs::read(path)?;
        let grid = decode::decode_tabular(&name, &bytes)?;
        let records = normalize::grid_to_records(&grid);
        let raw_count = records.len();
        let rows = normalize::normalize_records(&records);
        (rows, 0, raw_count)
    };

    let filtered = raw_count.saturating_sub(rows.len());
    let store = ImportStore::open(DATA_DIR)?;
    let meta = store.save(&name, rows, skipped)?;
    Ok((meta, filtered))
}

/// Handle option [2]: render all five report shapes from the current
/// import, exporting each to CSV with a console preview, plus a JSON
/// summary.
fn handle_generate_reports() {
    let rows = {
        let mut state = APP_STATE.lock().unwrap();
        if state.rows.is_none() {
            match ImportStore::open(DATA_DIR).and_then(|s| s.current()) {
                Ok(doc) => {
                    println!(
                        "Using import {} ({}, {} rows)\n",
                        doc.meta.id,
                        doc.meta.original_name,
                        util::format_int(doc.meta.row_count as i64)
                    );
                    state.rows = Some(doc.rows);
                }
                Err(e) => {
                    println!("Error: {}. Import a file first (option 1).\n", e);
                    return;
                }
            }
        }
        state.rows.clone().unwrap()
    };

    println!("Generating reports...");
    println!("Outputs saved to individual files...\n");

    let shapes = [
        (ReportShape::Dealer, "Dealer Sales Summary", "report_dealer_summary.csv"),
        (ReportShape::Product, "Product Sales Summary", "report_product_summary.csv"),
        (ReportShape::Area, "Area Sales Summary", "report_area_summary.csv"),
        (ReportShape::Target, "ASM Target vs Achievement", "report_asm_target.csv"),
        (ReportShape::Group, "Party Group Top Dealers", "report_party_group.csv"),
    ];
    for (shape, title, file) in shapes {
        match project::run_report(&rows, shape) {
            Ok(report) => {
                if let Err(e) = write_report(file, &report) {
                    eprintln!("Write error: {}", e);
                }
                println!("{} ({} rows)\n", title, report.len());
                preview_report(&report, 3);
                println!("(Full table exported to {})\n", file);
            }
            Err(e) => eprintln!("Report error: {}", e),
        }
    }

    let summary = project::summarize(&rows);
    if let Err(e) = output::write_json("summary.json", &summary) {
        eprintln!("Write error: {}", e);
    }
    println!("Summary Stats (summary.json):");
    println!(
        "{{\"total_rows\": {}, \"total_amount\": {}}}\n",
        summary.total_rows,
        util::format_number(summary.total_amount, 2)
    );
}

fn write_report(path: &str, report: &ProjectedReport) -> Result<()> {
    match report {
        ProjectedReport::Dealer(rows) => output::write_csv(path, rows),
        ProjectedReport::Product(rows) => output::write_csv(path, rows),
        ProjectedReport::Area(rows) => output::write_csv(path, rows),
        ProjectedReport::Target(rows) => output::write_csv(path, rows),
        ProjectedReport::Group(rows) => output::write_csv(path, rows),
        ProjectedReport::Raw(rows) => output::write_csv(path, rows),
    }
}

fn preview_report(report: &ProjectedReport, max_rows: usize) {
    match report {
        ProjectedReport::Dealer(rows) => output::preview_table_rows(rows, max_rows),
        ProjectedReport::Product(rows) => output::preview_table_rows(rows, max_rows),
        ProjectedReport::Area(rows) => output::preview_table_rows(rows, max_rows),
        ProjectedReport::Target(rows) => output::preview_table_rows(rows, max_rows),
        ProjectedReport::Group(rows) => output::preview_table_rows(rows, max_rows),
        ProjectedReport::Raw(rows) => output::preview_table_rows(rows, max_rows),
    }
}

/// Handle option [3]: list saved imports, newest first.
fn handle_list_imports() {
    let metas = match ImportStore::open(DATA_DIR).and_then(|s| s.list()) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Failed to list imports: {}\n", e);
            return;
        }
    };
    if metas.is_empty() {
        println!("No imports saved yet.\n");
        return;
    }
    for m in metas {
        println!(
            "{}  {}  {} rows  ({})",
            m.id,
            m.uploaded_at.format("%Y-%m-%d %H:%M:%S"),
            util::format_int(m.row_count as i64),
            m.original_name
        );
    }
    println!("");
}

/// Handle option [4]: point the store at a specific saved import.
fn handle_set_current() {
    let id = read_line("Import id: ");
    match ImportStore::open(DATA_DIR).and_then(|s| s.set_current(&id)) {
        Ok(()) => {
            println!("Current import set to {}.\n", id);
            let mut state = APP_STATE.lock().unwrap();
            state.rows = None;
        }
        Err(e) => eprintln!("Failed to set current import: {}\n", e),
    }
}

/// Handle option [5]: delete a saved import.
fn handle_delete_import() {
    let id = read_line("Import id to delete: ");
    match ImportStore::open(DATA_DIR).and_then(|s| s.delete(&id)) {
        Ok(()) => {
            println!("Deleted import {}.\n", id);
            let mut state = APP_STATE.lock().unwrap();
            state.rows = None;
        }
        Err(e) => eprintln!("Failed to delete import: {}\n", e),
    }
}

fn main() {
    env_logger::init();
    loop {
        println!("Tally Report Pipeline:");
        println!("[1] Import a file");
        println!("[2] Generate Reports");
        println!("[3] List Imports");
        println!("[4] Set Current Import");
        println!("[5] Delete Import");
        println!("[0] Exit\n");
        match read_line("Enter choice: ").as_str() {
            "1" => handle_import(),
            "2" => {
                println!("");
                handle_generate_reports();
            }
            "3" => handle_list_imports(),
            "4" => handle_set_current(),
            "5" => handle_delete_import(),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => {
                println!("Invalid choice. Please enter 0-5.\n");
            }
        }
    }
}
