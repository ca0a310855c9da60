use std::path::Path;

use calamine::{open_workbook_auto, Reader};
use chrono::NaiveDate;

use core::error::EtlError;
use core::semantic_type::SemanticType;
use core::source_spec::SourceSpec;

use super::{missing_required_columns, RawRecord};

/// Excel's epoch (1899-12-30, to account for the spreadsheet's famous
/// 1900-leap-year bug where serial day 60 is the nonexistent 1900-02-29).
fn excel_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("valid date")
}

/// Reads an `.xls`/`.xlsx` worksheet into `RawRecord`s.
///
/// Grounded on the original's `ExcelReader`: row 1 is the header row
/// (`skip_rows` further rows are skipped after that), and any column
/// declared `Date`/`Datetime` in `spec` has its Excel serial-number cells
/// converted to an ISO date string before coercion runs, matching the
/// original's `_convert_excel_dates`.
pub fn read(path: &Path, spec: &SourceSpec, sheet_name: Option<&str>, skip_rows: usize) -> Result<Vec<RawRecord>, EtlError> {
    let filename = path.to_string_lossy().to_string();
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| EtlError::CodeDefect(anyhow::anyhow!("unable to open workbook {filename}: {e}")))?;

    let sheet = match sheet_name {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| EtlError::MissingHeader { filename: filename.clone(), missing: vec!["(no worksheets)".to_string()] })?,
    };

    let range = workbook
        .worksheet_range(&sheet)
        .ok_or_else(|| EtlError::MissingHeader { filename: filename.clone(), missing: vec![format!("sheet '{sheet}'")] })?
        .map_err(|e| EtlError::CodeDefect(anyhow::anyhow!("unable to read sheet '{sheet}' of {filename}: {e}")))?;

    let mut rows = range.rows();
    let header_row = rows.next().ok_or_else(|| EtlError::MissingHeader {
        filename: filename.clone(),
        missing: vec!["(empty sheet)".to_string()],
    })?;

    let headers: Vec<String> = header_row.iter().map(|c| cell_to_string(c).to_ascii_lowercase()).collect();
    if headers.is_empty() || headers.iter().all(|h| is_blank_or_placeholder(h)) {
        return Err(EtlError::MissingHeader { filename: filename.clone(), missing: vec!["(all blank)".to_string()] });
    }

    let missing = missing_required_columns(spec, &headers);
    if !missing.is_empty() {
        return Err(EtlError::MissingColumns { filename: filename.clone(), missing });
    }

    let date_columns: std::collections::HashSet<String> = spec
        .fields()
        .iter()
        .filter(|f| matches!(f.semantic_type().inner(), SemanticType::Date | SemanticType::Datetime))
        .map(|f| f.alias().to_ascii_lowercase())
        .collect();

    let mut records = Vec::new();
    for (i, row) in rows.enumerate() {
        if i < skip_rows {
            continue;
        }
        let mut record = RawRecord::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            let value = if date_columns.contains(header) {
                excel_serial_to_date_string(cell).unwrap_or_else(|| cell_to_string(cell))
            } else {
                cell_to_string(cell)
            };
            record.insert(header.clone(), value);
        }
        records.push(record);
    }

    Ok(records)
}

fn cell_to_string(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty => String::new(),
        calamine::Data::String(s) => s.clone(),
        calamine::Data::Float(f) => f.to_string(),
        calamine::Data::Int(i) => i.to_string(),
        calamine::Data::Bool(b) => if *b { "1".to_string() } else { "0".to_string() },
        other => other.to_string(),
    }
}

/// `-N`-shaped placeholder names the spreadsheet library emits for
/// unnamed columns, matching the original's `isdigit()`-after-`lstrip('-')`
/// check in `excel_reader.py`.
fn is_blank_or_placeholder(header: &str) -> bool {
    let trimmed = header.trim();
    trimmed.is_empty() || trimmed.trim_start_matches('-').chars().all(|c| c.is_ascii_digit())
}

fn excel_serial_to_date_string(cell: &calamine::Data) -> Option<String> {
    let serial = match cell {
        calamine::Data::Float(f) => *f,
        calamine::Data::Int(i) => *i as f64,
        _ => return None,
    };
    let days = serial.trunc() as i64;
    let date = excel_epoch().checked_add_signed(chrono::Duration::days(days))?;
    let fractional = serial - serial.trunc();
    if fractional > 0.0 {
        let seconds = (fractional * 86_400.0) as i64;
        let datetime = date.and_hms_opt(0, 0, 0)?.checked_add_signed(chrono::Duration::seconds(seconds))?;
        Some(datetime.format("%Y-%m-%d %H:%M:%S").to_string())
    } else {
        Some(date.format("%Y-%m-%d").to_string())
    }
}
