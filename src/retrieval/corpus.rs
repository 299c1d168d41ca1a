//! Corpus construction: linearizes workbook rows into `[sheet] col: val; ...`
//! snippets, grounded on `table_linearizer.py` and `table_main.py::load_excel_data`
//! from the original system, and on the teacher's `metadata/src/data.rs` chunk
//! bookkeeping style.

use crate::retrieval::bm25::Bm25Stats;
use crate::workbook::SheetData;

/// One linearized spreadsheet row, prefixed with its sheet name.
///
/// `id` is the snippet's position in the corpus and is the row index into
/// the parallel [`crate::retrieval::vector_index::VectorIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub id: usize,
    pub text: String,
    pub sheet: String,
}

/// The ordered set of snippets derived from one workbook ingestion, together
/// with the BM25 statistics computed over it. Wholesale-replaced on every
/// `initialize` call; never mutated in place.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub snippets: Vec<Snippet>,
    pub bm25: Bm25Stats,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    pub fn text(&self, id: usize) -> Option<&str> {
        self.snippets.get(id).map(|s| s.text.as_str())
    }

    pub fn texts(&self) -> Vec<&str> {
        self.snippets.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Linearize one sheet's rows into snippets, in row order, left-to-right
/// column order, joined as `"col: value"` pairs separated by `"; "` and
/// prefixed with `"[sheet_name] "`. Empty sheets contribute no snippets.
pub fn linearize_sheet(sheet: &SheetData) -> Vec<String> {
    sheet
        .rows
        .iter()
        .map(|row| {
            let parts: Vec<String> = sheet
                .columns
                .iter()
                .zip(row.iter())
                .map(|(col, val)| format!("{col}: {val}"))
                .collect();
            format!("[{}] {}", sheet.name, parts.join("; "))
        })
        .collect()
}

/// Build the full corpus from a sequence of sheets, in insertion order.
pub fn build_corpus(sheets: &[SheetData]) -> Corpus {
    let mut snippets = Vec::new();
    for sheet in sheets {
        for text in linearize_sheet(sheet) {
            snippets.push(Snippet {
                id: snippets.len(),
                sheet: sheet.name.clone(),
                text,
            });
        }
    }
    let texts: Vec<&str> = snippets.iter().map(|s| s.text.as_str()).collect();
    let bm25 = Bm25Stats::build(&texts);
    Corpus { snippets, bm25 }
}
