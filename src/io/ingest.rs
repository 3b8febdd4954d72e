//! Data ingest.
//!
//! Two input formats are accepted:
//! - CSV with a header row (`.csv`); the observable column is picked by name,
//!   falling back to the first column when no name is requested and the
//!   default name is absent
//! - plain text with one value per line; blank lines and `#` comments are skipped
//!
//! Every value must parse to a finite number. Errors carry 1-based line numbers.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use csv::StringRecord;
use log::{debug, info};

use crate::error::{FitError, Result};

/// Values read from a data file.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub values: Vec<f64>,
    /// Column the values came from; `None` for plain text input.
    pub column: Option<String>,
}

/// Read the observable values from `path`.
///
/// `column` is the requested CSV column; `default_column` (normally the
/// observable name) is tried when none is requested.
pub fn read_data(path: &Path, column: Option<&str>, default_column: &str) -> Result<Dataset> {
    let file = File::open(path).map_err(|e| FitError::io(path, e))?;
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let data = if is_csv {
        read_csv(file, column, default_column)?
    } else {
        if column.is_some() {
            return Err(FitError::InvalidData(format!(
                "'{}' is not a CSV file, a column cannot be selected",
                path.display()
            )));
        }
        read_text(BufReader::new(file))?
    };
    info!(
        "Read {} values from '{}'{}",
        data.values.len(),
        path.display(),
        data.column.as_deref().map(|c| format!(" (column '{c}')")).unwrap_or_default()
    );
    Ok(data)
}

/// Read one column of a headed CSV.
pub fn read_csv<R: Read>(reader: R, column: Option<&str>, default_column: &str) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(FitError::InvalidData("CSV file has no header".to_string()));
    }
    let header_map = build_header_map(&headers);

    let idx = match column {
        Some(name) => *header_map
            .get(&normalize_header_name(name))
            .ok_or_else(|| FitError::InvalidData(format!("Missing column `{name}` in CSV header")))?,
        None => match header_map.get(&normalize_header_name(default_column)) {
            Some(idx) => *idx,
            None => {
                debug!("No `{default_column}` column, using the first column");
                0
            }
        },
    };
    let column_name = headers.get(idx).unwrap_or_default().trim_start_matches('\u{feff}').to_string();

    let mut values = Vec::new();
    for (i, result) in reader.records().enumerate() {
        // header is line 1
        let line = i + 2;
        let record = result.map_err(|e| FitError::InvalidData(format!("line {line}: CSV parse error: {e}")))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let field = record
            .get(idx)
            .ok_or_else(|| FitError::InvalidData(format!("line {line}: missing column `{column_name}`")))?;
        values.push(parse_value(field, line)?);
    }
    Ok(Dataset {
        values,
        column: Some(column_name),
    })
}

/// Read one value per line, skipping blanks and `#` comments.
pub fn read_text<R: BufRead>(reader: R) -> Result<Dataset> {
    let mut values = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|e| FitError::InvalidData(format!("line {line_no}: {e}")))?;
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        values.push(parse_value(content, line_no)?);
    }
    Ok(Dataset { values, column: None })
}

fn parse_value(field: &str, line: usize) -> Result<f64> {
    let v: f64 = field
        .trim()
        .parse()
        .map_err(|_| FitError::InvalidData(format!("line {line}: cannot parse `{field}` as a number")))?;
    if !v.is_finite() {
        return Err(FitError::InvalidData(format!("line {line}: non-finite value `{field}`")));
    }
    Ok(v)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // first occurrence wins for duplicated headers
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}
