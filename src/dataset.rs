use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashSet;

use crate::error::IngestError;
use crate::models::{DatasetKind, DatasetTable};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// The pair of files selected together by the user. Either may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetUpload {
    pub salas: Option<String>,
    pub horarios: Option<String>,
}

impl DatasetUpload {
    pub fn new(salas: impl Into<String>, horarios: impl Into<String>) -> Self {
        Self {
            salas: Some(salas.into()),
            horarios: Some(horarios.into()),
        }
    }

    /// Parse both files. Nothing is parsed unless both are present, and the
    /// pair is only returned when both parses succeed.
    pub fn parse(&self) -> Result<(DatasetTable, DatasetTable), IngestError> {
        let missing: Vec<DatasetKind> = [
            (DatasetKind::Salas, &self.salas),
            (DatasetKind::Horarios, &self.horarios),
        ]
        .into_iter()
        .filter(|(_, file)| file.is_none())
        .map(|(kind, _)| kind)
        .collect();

        let (Some(salas), Some(horarios)) = (&self.salas, &self.horarios) else {
            return Err(IngestError::MissingInput(missing));
        };

        let salas = parse_dataset(DatasetKind::Salas, salas.as_bytes())?;
        let horarios = parse_dataset(DatasetKind::Horarios, horarios.as_bytes())?;
        Ok((salas, horarios))
    }
}

/// Parse CSV bytes into a table. The first row is the header, blank lines
/// are skipped and the delimiter is detected from the header line.
pub fn parse_dataset(kind: DatasetKind, bytes: &[u8]) -> Result<DatasetTable, IngestError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let delimiter = detect_delimiter(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|source| IngestError::Csv { kind, source })?
        .clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(IngestError::MissingHeader(kind));
    }

    let columns = unique_headers(headers.iter());
    let width = columns.len();
    let mut table = DatasetTable::new(columns);

    for result in reader.records() {
        let record = result.map_err(|source| IngestError::Csv { kind, source })?;
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }
        if record.len() > width {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            warn!(
                "{} line {}: {} fields for {} columns, extra fields dropped",
                kind,
                line,
                record.len(),
                width
            );
        }
        table.push_row(record.iter().map(str::to_string).collect());
    }

    debug!(
        "parsed {} dataset: {} columns, {} records, delimiter {:?}",
        kind,
        width,
        table.len(),
        delimiter as char
    );
    Ok(table)
}

/// Pick the candidate that occurs most often (outside quotes) on the first
/// non-blank line. Comma wins ties and is used when none occurs.
fn detect_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes
        .split(|&b| b == b'\n')
        .find(|line| line.iter().any(|b| !b.is_ascii_whitespace()))
        .unwrap_or_default();

    let mut counts = [0usize; CANDIDATE_DELIMITERS.len()];
    let mut quoted = false;
    for &b in header {
        if b == b'"' {
            quoted = !quoted;
        } else if !quoted {
            if let Some(i) = CANDIDATE_DELIMITERS.iter().position(|&d| d == b) {
                counts[i] += 1;
            }
        }
    }

    let mut best = 0;
    for i in 1..counts.len() {
        if counts[i] > counts[best] {
            best = i;
        }
    }
    CANDIDATE_DELIMITERS[best]
}

/// Repeated header names get `_1`, `_2`, ... suffixes.
fn unique_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut columns = Vec::new();

    for header in headers {
        let mut name = header.to_string();
        let mut n = 1;
        while seen.contains(&name) {
            name = format!("{}_{}", header, n);
            n += 1;
        }
        seen.insert(name.clone());
        columns.push(name);
    }

    columns
}
