use std::fs::File;
use std::io::{BufReader, Read};

use camino::Utf8Path;
use csv::{ByteRecord, ReaderBuilder, Terminator};
use flate2::read::GzDecoder;

use crate::domain::Row;
use crate::error::ImportError;

/// Reads a delimited export from disk. `.gz` inputs are decompressed on the fly.
pub fn read_rows(path: &Utf8Path, delimiter: u8) -> Result<Vec<Row>, ImportError> {
    if !path.as_std_path().exists() {
        return Err(ImportError::InputNotFound(path.to_path_buf()));
    }
    let file = File::open(path.as_std_path())
        .map_err(|err| ImportError::InputRead(format!("open {path}: {err}")))?;
    let reader = BufReader::new(file);
    if path.extension() == Some("gz") {
        parse_rows(GzDecoder::new(reader), delimiter)
    } else {
        parse_rows(reader, delimiter)
    }
}

/// Tokenizes delimited text into rows, one per input line.
///
/// Blank lines are structure in the export, so every physical line becomes a row and a
/// blank line is a zero-field row. Newlines inside quoted fields do not end a line, and
/// `\r\n` endings are accepted. Fields are decoded lossily since exports are often not
/// UTF-8.
pub fn parse_rows<R: Read>(mut input: R, delimiter: u8) -> Result<Vec<Row>, ImportError> {
    let mut bytes = Vec::new();
    input
        .read_to_end(&mut bytes)
        .map_err(|err| ImportError::InputRead(err.to_string()))?;

    let mut builder = ReaderBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'));

    split_lines(&bytes, delimiter)
        .into_iter()
        .map(|line| parse_line(&builder, line))
        .collect()
}

#[derive(Clone, Copy)]
enum Scan {
    FieldStart,
    Unquoted,
    Quoted,
    /// A quote inside a quoted field: either the closing quote or the first half of `""`.
    QuotedQuote,
}

/// Physical lines without their terminator. Quotes only open at the start of a field, as
/// in the CSV reader; a trailing terminator does not open an extra line.
fn split_lines(bytes: &[u8], delimiter: u8) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut state = Scan::FieldStart;
    for (index, &byte) in bytes.iter().enumerate() {
        state = match (state, byte) {
            (Scan::Quoted, b'"') => Scan::QuotedQuote,
            (Scan::Quoted, _) => Scan::Quoted,
            (Scan::QuotedQuote, b'"') => Scan::Quoted,
            (_, b'\n') => {
                lines.push(trim_cr(&bytes[start..index]));
                start = index + 1;
                Scan::FieldStart
            }
            (Scan::FieldStart, b'"') => Scan::Quoted,
            (_, byte) if byte == delimiter => Scan::FieldStart,
            _ => Scan::Unquoted,
        };
    }
    if start < bytes.len() {
        lines.push(trim_cr(&bytes[start..]));
    }
    lines
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn parse_line(builder: &ReaderBuilder, line: &[u8]) -> Result<Row, ImportError> {
    if line.is_empty() {
        return Ok(Row::new());
    }
    let mut reader = builder.from_reader(line);
    let mut record = ByteRecord::new();
    let found = reader
        .read_byte_record(&mut record)
        .map_err(|err| ImportError::InputRead(err.to_string()))?;
    if !found {
        return Ok(Row::new());
    }
    Ok(record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect())
}

/// Parses a user-facing delimiter spelling into a single byte.
pub fn parse_delimiter(value: &str) -> Result<u8, ImportError> {
    match value {
        "\t" | "\\t" | "tab" | "TAB" => Ok(b'\t'),
        _ => {
            let mut bytes = value.bytes();
            match (bytes.next(), bytes.next()) {
                (Some(byte), None) if byte.is_ascii() && byte != b'\n' && byte != b'"' => {
                    Ok(byte)
                }
                _ => Err(ImportError::InvalidDelimiter(value.to_string())),
            }
        }
    }
}
