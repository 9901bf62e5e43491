use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde_json::{Map, Value};

use crate::errors::Result;
use crate::models::RowError;

/// Unicode whitespace stripped from values on import, beyond what an
/// ordinary trim removes: NBSP, ogham space mark, en/em and friends,
/// narrow NBSP, medium mathematical space, ideographic space.
const EXOTIC_WHITESPACE: [char; 4] = ['\u{00A0}', '\u{202F}', '\u{205F}', '\u{3000}'];

/// Outcome of parsing one CSV stream. `rows` holds only rows that carried
/// data; blank and malformed rows land in `validation_errors`.
#[derive(Debug, Default)]
pub struct ParsedCsv {
    pub rows: Vec<Map<String, Value>>,
    pub column_order: Vec<String>,
    pub validation_errors: Vec<RowError>,
}

pub fn parse_csv_file(path: &Path) -> Result<ParsedCsv> {
    parse_csv_reader(File::open(path)?)
}

/// Streaming row-by-row parse; memory use is bounded by record buffering,
/// not file size.
pub fn parse_csv_reader<R: Read>(reader: R) -> Result<ParsedCsv> {
    let mut csv_reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let column_order: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| clean_value(h))
        .collect();

    let mut parsed = ParsedCsv {
        column_order,
        ..Default::default()
    };

    let mut row_number = 0usize;
    for result in csv_reader.records() {
        row_number += 1;

        let record = match result {
            Ok(record) => record,
            Err(err) => {
                parsed.validation_errors.push(RowError {
                    row: row_number,
                    errors: vec![format!("Malformed CSV row: {}", err)],
                });
                continue;
            }
        };

        let mut row = Map::new();
        for (i, header) in parsed.column_order.iter().enumerate() {
            let raw = record.get(i).unwrap_or("");
            row.insert(header.clone(), Value::String(clean_value(raw)));
        }

        let has_data = row
            .values()
            .any(|v| v.as_str().is_some_and(|s| !s.trim().is_empty()));
        if !has_data {
            parsed.validation_errors.push(RowError {
                row: row_number,
                errors: vec!["Row contains no data".to_string()],
            });
            continue;
        }

        parsed.rows.push(row);
    }

    Ok(parsed)
}

fn clean_value(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !EXOTIC_WHITESPACE.contains(c) && !('\u{2000}'..='\u{200A}').contains(c) && *c != '\u{1680}')
        .collect::<String>()
        .trim()
        .to_string()
}
