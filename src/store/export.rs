//! CSV export and import. The format is deliberately naive: fields are joined
//! with commas and never quoted, so a comma inside a text field corrupts that
//! row. Import reads the same shape back and rejects rows that do not split
//! into exactly seven columns.

use std::io::{self, BufRead, Write};

use crate::models::Book;

pub const CSV_HEADER: &str = "ID,Title,Author,Year,ISBN,Category,Status";
const COLUMNS: usize = 7;

/// Write the header line followed by one row per book.
pub fn write_csv<W: Write>(out: &mut W, books: &[Book]) -> io::Result<()> {
    writeln!(out, "{CSV_HEADER}")?;
    for book in books {
        writeln!(out, "{}", book.to_csv_row())?;
    }
    out.flush()
}

/// One data row of an import file, before store validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub line: usize,
    pub title: String,
    pub author: String,
    pub year: i32,
    pub isbn: String,
    pub category: String,
    pub borrowed: bool,
}

/// Outcome of `CatalogStore::import_csv`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Ids assigned to the imported books, in file order.
    pub imported: Vec<i32>,
    /// `(line number, reason)` for every row that was not imported.
    pub skipped: Vec<(usize, String)>,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        if self.skipped.is_empty() {
            format!("Imported {} books.", self.imported.len())
        } else {
            format!(
                "Imported {} books, skipped {} rows (first: line {}: {}).",
                self.imported.len(),
                self.skipped.len(),
                self.skipped[0].0,
                self.skipped[0].1
            )
        }
    }
}

/// Split an import file into parsed rows and per-line parse failures. Blank
/// lines and a leading header line are ignored. Line numbers are 1-based.
pub fn read_csv<R: BufRead>(input: R) -> io::Result<(Vec<CsvRow>, Vec<(usize, String)>)> {
    let mut rows = Vec::new();
    let mut rejected = Vec::new();

    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let number = idx + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || (number == 1 && line.trim() == CSV_HEADER) {
            continue;
        }
        match parse_row(number, line) {
            Ok(row) => rows.push(row),
            Err(reason) => rejected.push((number, reason)),
        }
    }

    Ok((rows, rejected))
}

fn parse_row(line: usize, text: &str) -> Result<CsvRow, String> {
    let fields: Vec<&str> = text.split(',').collect();
    if fields.len() != COLUMNS {
        return Err(format!(
            "expected {COLUMNS} columns, found {}",
            fields.len()
        ));
    }

    let year = fields[3]
        .trim()
        .parse::<i32>()
        .map_err(|_| format!("year '{}' is not a number", fields[3]))?;
    let borrowed = match fields[6].trim() {
        "Available" => false,
        "Borrowed" => true,
        other => return Err(format!("unknown status '{other}'")),
    };

    Ok(CsvRow {
        line,
        title: fields[1].to_string(),
        author: fields[2].to_string(),
        year,
        isbn: fields[4].trim().to_string(),
        category: fields[5].to_string(),
        borrowed,
    })
}
