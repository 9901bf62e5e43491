use serde_json::Value;

use gridstore_core::models::Record;
use gridstore_core::schema::InferredColumn;

use crate::client::{ClientError, Result};

/// Serialize the currently loaded rows (not the full matching set) to CSV.
/// Headers are the raw field names so a re-upload reproduces the same keys;
/// the `csv` crate handles quoting of commas, quotes and newlines.
pub fn export_csv(rows: &[Record], columns: &[InferredColumn]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(columns.iter().map(|c| c.field.as_str()))?;

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| cell_text(&row.data, &c.field))
            .collect();
        writer.write_record(&cells)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ClientError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ClientError::Export(e.to_string()))
}

fn cell_text(data: &Value, field: &str) -> String {
    match data.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use gridstore_core::schema::infer_columns;
    use gridstore_core::storage::parse_csv_reader;

    use super::*;

    fn record(data: Value) -> Record {
        Record {
            id: uuid::Uuid::new_v4().to_string(),
            data,
            added_by: "u1".to_string(),
            grid_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn awkward_values_are_quoted() {
        let rows = [record(json!({
            "Name": "Ann, \"the boss\"",
            "Note": "line one\nline two",
        }))];
        let columns = infer_columns(&rows, Some(&["Name".to_string(), "Note".to_string()]));

        let out = export_csv(&rows, &columns).unwrap();

        let reparsed = parse_csv_reader(out.as_bytes()).unwrap();
        assert_eq!(reparsed.rows[0]["Name"], "Ann, \"the boss\"");
        assert_eq!(reparsed.rows[0]["Note"], "line one\nline two");
    }

    #[test]
    fn export_then_reupload_preserves_field_values() {
        let rows = [
            record(json!({"Brand": "BMW", "Range": "420"})),
            record(json!({"Brand": "Kia", "Range": ""})),
        ];
        let columns = infer_columns(&rows, Some(&["Brand".to_string(), "Range".to_string()]));

        let out = export_csv(&rows, &columns).unwrap();
        let reparsed = parse_csv_reader(out.as_bytes()).unwrap();

        assert_eq!(reparsed.column_order, vec!["Brand", "Range"]);
        assert_eq!(reparsed.rows.len(), 2);
        for (row, original) in reparsed.rows.iter().zip(&rows) {
            for field in ["Brand", "Range"] {
                assert_eq!(row[field], original.data[field]);
            }
        }
    }

    #[test]
    fn missing_fields_export_as_empty_cells() {
        let rows = [record(json!({"A": "1"}))];
        let columns = infer_columns(&rows, Some(&["A".to_string(), "B".to_string()]));

        let out = export_csv(&rows, &columns).unwrap();
        assert_eq!(out, "A,B\n1,\n");
    }
}
