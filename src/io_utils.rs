//! Delimited-file reading.
//!
//! The whole file is read into a [`RawTable`] once; the inference sample is a
//! prefix of those records and the loader walks the same records afterwards.
//! Input is UTF-8 unless an explicit encoding label is configured. There is
//! no automatic detection.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use encoding_rs::{Encoding, UTF_8};

use crate::error::{ImportError, ImportResult};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_CSV_QUOTE: u8 = b'"';

/// Header row plus every data record, each padded to the header width.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl RawTable {
    /// The leading records used for type inference.
    pub fn sample(&self, sample_size: usize) -> &[Vec<String>] {
        let end = sample_size.min(self.records.len());
        &self.records[..end]
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }
}

pub fn resolve_encoding(label: Option<&str>) -> ImportResult<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| ImportError::Configuration(format!("Unknown encoding '{value}'"))),
        None => Ok(UTF_8),
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, quote: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .quote(quote)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> ImportResult<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(ImportError::Input(format!(
            "Failed to decode text with encoding {}",
            encoding.name()
        )))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> ImportResult<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Reads a header row and all records from any reader.
///
/// Short records are padded with empty cells, which load as `NULL`. A record
/// wider than the header is rejected.
pub fn read_table<R>(
    reader: R,
    delimiter: u8,
    quote: u8,
    encoding: &'static Encoding,
) -> ImportResult<RawTable>
where
    R: Read,
{
    let mut csv_reader = open_csv_reader(reader, delimiter, quote);
    let header_record = csv_reader
        .byte_headers()
        .map_err(|err| ImportError::Input(format!("Reading header row: {err}")))?
        .clone();
    let headers = decode_record(&header_record, encoding)?;
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(ImportError::Input("Input has no header row".to_string()));
    }

    let mut records = Vec::new();
    let mut record = csv::ByteRecord::new();
    loop {
        let more = csv_reader.read_byte_record(&mut record).map_err(|err| {
            ImportError::Input(format!("Reading data row {}: {err}", records.len() + 1))
        })?;
        if !more {
            break;
        }
        let mut decoded = decode_record(&record, encoding)?;
        if decoded.len() > headers.len() {
            return Err(ImportError::Input(format!(
                "Data row {} has {} field(s) but the header has {}",
                records.len() + 1,
                decoded.len(),
                headers.len()
            )));
        }
        decoded.resize(headers.len(), String::new());
        records.push(decoded);
    }
    Ok(RawTable { headers, records })
}

pub fn read_table_from_path(
    path: &Path,
    delimiter: u8,
    quote: u8,
    encoding: &'static Encoding,
) -> ImportResult<RawTable> {
    let file = File::open(path).map_err(|err| {
        ImportError::Configuration(format!("Opening input file {}: {err}", path.display()))
    })?;
    read_table(BufReader::new(file), delimiter, quote, encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn read_table_pads_short_rows() {
        let input = "a,b,c\n1,2,3\n4,5\n";
        let table = read_table(input.as_bytes(), b',', b'"', UTF_8).unwrap();
        assert_eq!(table.headers, vec!["a", "b", "c"]);
        assert_eq!(table.records[1], vec!["4", "5", ""]);
    }

    #[test]
    fn read_table_rejects_wide_rows() {
        let input = "a,b\n1,2,3\n";
        let err = read_table(input.as_bytes(), b',', b'"', UTF_8).unwrap_err();
        assert!(err.to_string().contains("Data row 1 has 3 field(s)"));
    }

    #[test]
    fn read_table_honours_custom_quote_and_delimiter() {
        let input = "name;note\n'Smith; John';'it''s'\n";
        let table = read_table(input.as_bytes(), b';', b'\'', UTF_8).unwrap();
        assert_eq!(table.records[0], vec!["Smith; John", "it's"]);
    }

    #[test]
    fn read_table_decodes_explicit_encoding() {
        let (encoded, _, _) = WINDOWS_1252.encode("id,name\n1,Caf\u{e9}\n");
        let table = read_table(encoded.as_ref(), b',', b'"', WINDOWS_1252).unwrap();
        assert_eq!(table.records[0][1], "Café");
    }

    #[test]
    fn sample_is_a_bounded_prefix() {
        let input = "v\n1\n2\n3\n";
        let table = read_table(input.as_bytes(), b',', b'"', UTF_8).unwrap();
        assert_eq!(table.sample(2).len(), 2);
        assert_eq!(table.sample(10).len(), 3);
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn unknown_encoding_is_a_configuration_error() {
        assert!(matches!(
            resolve_encoding(Some("klingon")),
            Err(ImportError::Configuration(_))
        ));
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
    }
}
