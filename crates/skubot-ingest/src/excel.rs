//! Excel workbook loading via calamine.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use skubot_core::{Error, Result};

use crate::record::{CellValue, RawRow};

fn cell_to_value(cell: &Data) -> Option<CellValue> {
    match cell {
        Data::Empty => None,
        Data::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| CellValue::Text(t.to_string()))
        }
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Bool(b) => Some(CellValue::Text(if *b { "Yes" } else { "No" }.to_string())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
        Data::Error(_) => None,
    }
}

/// Load the first worksheet into keyed rows. Headers come from the first
/// row, trimmed so stray spaces don't break column lookups.
pub fn load_rows(path: &Path) -> Result<Vec<RawRow>> {
    if !path.exists() {
        return Err(Error::Ingest(format!(
            "could not find data file at '{}'; set DATA_XLSX_PATH or place the workbook there",
            path.display()
        )));
    }
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::Ingest(format!("cannot open '{}': {e}", path.display())))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let first = sheet_names
        .first()
        .ok_or_else(|| Error::Ingest("workbook has no sheets".into()))?;
    let range = workbook
        .worksheet_range(first)
        .map_err(|e| Error::Ingest(format!("cannot read sheet '{first}': {e}")))?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .ok_or_else(|| Error::Ingest("workbook sheet is empty".into()))?
        .iter()
        .map(|c| match c {
            Data::String(s) => s.trim().to_string(),
            other => other.to_string().trim().to_string(),
        })
        .collect();
    if !headers.iter().any(|h| h == "Product Number") {
        return Err(Error::Ingest(
            "the workbook is missing the required 'Product Number' column".into(),
        ));
    }

    let mut rows = Vec::new();
    for raw in rows_iter {
        let mut row = RawRow::new();
        for (header, cell) in headers.iter().zip(raw) {
            if header.is_empty() {
                continue;
            }
            if let Some(v) = cell_to_value(cell) {
                row.set(header.clone(), v);
            }
        }
        rows.push(row);
    }
    tracing::info!(rows = rows.len(), sheet = %first, "workbook loaded");
    Ok(rows)
}
