use std::ops::Range;

use crate::domain::Row;
use crate::error::ImportError;

pub const FORMAT_MARKER: &str = "SimaPro";
pub const PROJECT_TOKEN: &str = "Project";
pub const PROCESS_TOKEN: &str = "Process";
pub const PRODUCTS_TOKEN: &str = "Products";

/// Rows 0 and 1 carry the format line and the project line.
pub const HEADER_ROWS: usize = 2;

/// Category labels for flows exchanged with the environment. Rows under them are skipped.
pub const BIOSPHERE_LABELS: [&str; 4] = [
    "Resources",
    "Emissions to air",
    "Emissions to water",
    "Emissions to soil",
];

pub fn is_biosphere_label(label: &str) -> bool {
    BIOSPHERE_LABELS.contains(&label)
}

/// Checks the export header and returns the format identifier (row 0, field 0).
pub fn verify_format(rows: &[Row]) -> Result<&str, ImportError> {
    let first = rows
        .first()
        .and_then(|row| row.first())
        .ok_or_else(|| ImportError::Format("file is empty".to_string()))?;
    if !first.contains(FORMAT_MARKER) {
        return Err(ImportError::Format(format!(
            "first line doesn't mention {FORMAT_MARKER}: `{first}`"
        )));
    }
    Ok(first)
}

/// Collection name taken from the `Project` header row.
pub fn project_name(rows: &[Row]) -> Result<String, ImportError> {
    match rows.get(1).map(Vec::as_slice) {
        Some([token, name, ..]) if token == PROJECT_TOKEN && !name.trim().is_empty() => {
            Ok(name.trim().to_string())
        }
        _ => Err(ImportError::MissingProjectName),
    }
}

/// Contiguous rows belonging to one `Process` section, marker row excluded.
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    /// Index of the first content row in the whole file.
    pub offset: usize,
    pub rows: &'a [Row],
}

impl<'a> Block<'a> {
    /// 1-based file line of a block-relative row index.
    pub fn line(&self, index: usize) -> usize {
        self.offset + index + 1
    }

    /// 1-based file line of the `Process` marker that opens the block.
    pub fn marker_line(&self) -> usize {
        self.offset
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.rows.len()
    }

    pub fn row(&self, index: usize) -> Option<&'a Row> {
        self.rows.get(index)
    }
}

fn is_marker(row: &Row, token: &str) -> bool {
    row.len() == 1 && row[0] == token
}

/// Indices of the `Process` marker rows.
pub fn process_indices(rows: &[Row]) -> Vec<usize> {
    (HEADER_ROWS..rows.len())
        .filter(|&index| is_marker(&rows[index], PROCESS_TOKEN))
        .collect()
}

/// Splits the export into one block per `Process` marker. The last block runs to the
/// end of input; rows before the first marker are header rows and belong to no block.
pub fn segment(rows: &[Row]) -> Vec<Block<'_>> {
    let markers = process_indices(rows);
    markers
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = markers.get(i + 1).copied().unwrap_or(rows.len());
            Block {
                offset: start + 1,
                rows: &rows[start + 1..end],
            }
        })
        .collect()
}
