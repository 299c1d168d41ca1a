//! Workbook reading is an external collaborator per spec.md §1 — only the
//! contract matters: "an ordered column list and ordered rows of cell
//! values" per sheet. This module defines that contract as a trait plus a
//! `calamine`-backed default implementation so the crate is runnable without
//! a separate service.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::AppError;

/// One sheet's worth of tabular data: an ordered column list and ordered
/// rows of cell values, rendered by the reader's natural string conversion
/// (no type coercion, per spec.md §4.7).
#[derive(Debug, Clone)]
pub struct SheetData {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// The workbook-reading contract consumed by the corpus builder.
pub trait WorkbookReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Vec<SheetData>, AppError>;
}

/// Default implementation backed by `calamine`, supporting `.xlsx`, `.xls`,
/// `.xlsb`, and `.ods` via format auto-detection.
#[derive(Debug, Default)]
pub struct CalamineWorkbookReader;

impl WorkbookReader for CalamineWorkbookReader {
    fn read(&self, path: &Path) -> Result<Vec<SheetData>, AppError> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| AppError::UpstreamFailure(format!("opening workbook: {e}")))?;

        let sheet_names = workbook.sheet_names().to_owned();
        let mut sheets = Vec::with_capacity(sheet_names.len());

        for name in sheet_names {
            let range = match workbook.worksheet_range(&name) {
                Ok(range) => range,
                Err(e) => {
                    return Err(AppError::UpstreamFailure(format!(
                        "reading sheet '{name}': {e}"
                    )))
                }
            };

            let mut rows_iter = range.rows();
            let Some(header_row) = rows_iter.next() else {
                sheets.push(SheetData {
                    name,
                    columns: Vec::new(),
                    rows: Vec::new(),
                });
                continue;
            };

            let columns: Vec<String> = header_row.iter().map(cell_to_string).collect();
            let rows: Vec<Vec<String>> = rows_iter
                .map(|row| row.iter().map(cell_to_string).collect())
                .collect();

            sheets.push(SheetData {
                name,
                columns,
                rows,
            });
        }

        Ok(sheets)
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
    }
}
