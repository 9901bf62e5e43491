use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Record;
use crate::query::FilterOperator;

/// Inferred rendering type for one field. Guessed from a single sample
/// value (the first row), not a full-column scan, so an atypical first row
/// can mis-infer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferredType {
    Text,
    Number,
    Date,
}

impl InferredType {
    /// Filter operators offered for fields of this type.
    pub fn operators(&self) -> &'static [FilterOperator] {
        match self {
            InferredType::Text => &[
                FilterOperator::Contains,
                FilterOperator::Equals,
                FilterOperator::StartsWith,
                FilterOperator::EndsWith,
                FilterOperator::IsEmpty,
            ],
            InferredType::Number | InferredType::Date => &[
                FilterOperator::Equals,
                FilterOperator::GreaterThan,
                FilterOperator::LessThan,
            ],
        }
    }
}

/// One rendering column, computed once per result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferredColumn {
    pub field: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub ty: InferredType,
}

impl InferredColumn {
    pub fn operators(&self) -> &'static [FilterOperator] {
        self.ty.operators()
    }
}

/// Derive the rendering schema for a page of records.
///
/// A persisted `column_order` is authoritative for both column identity and
/// order; otherwise the key set of the first row's payload is used. Types
/// are sampled from the first row only.
pub fn infer_columns(rows: &[Record], column_order: Option<&[String]>) -> Vec<InferredColumn> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let sample = match &first.data {
        Value::Object(map) => map,
        _ => return Vec::new(),
    };

    let fields: Vec<String> = match column_order {
        Some(order) => order.to_vec(),
        None => sample.keys().cloned().collect(),
    };

    fields
        .into_iter()
        .map(|field| {
            let ty = infer_type(sample.get(&field));
            InferredColumn {
                display_name: display_name(&field),
                field,
                ty,
            }
        })
        .collect()
}

/// Type guess for one sample value: Number for JSON numbers and
/// numeric-looking strings, Date for strings containing `-` or `/` that
/// parse as a date, Text otherwise.
pub fn infer_type(sample: Option<&Value>) -> InferredType {
    let Some(value) = sample else {
        return InferredType::Text;
    };

    let mut inferred = InferredType::Text;

    match value {
        Value::Number(_) => inferred = InferredType::Number,
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() && trimmed.parse::<f64>().is_ok() {
                inferred = InferredType::Number;
            }
        }
        _ => {}
    }

    // The date check runs after the numeric one, as in the original: a
    // value like "2024-05-01" contains '-' and parses as a date, which
    // overrides a numeric guess for strings like "2024".
    if let Value::String(s) = value {
        if (s.contains('-') || s.contains('/')) && parses_as_date(s) {
            inferred = InferredType::Date;
        }
    }

    inferred
}

fn parses_as_date(s: &str) -> bool {
    let trimmed = s.trim();
    const FORMATS: [&str; 6] = [
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%d-%m-%Y",
        "%d/%m/%Y",
        "%m/%d/%Y",
        "%Y-%m-%dT%H:%M:%S",
    ];
    FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(trimmed, fmt).is_ok())
        || chrono::DateTime::parse_from_rfc3339(trimmed).is_ok()
}

/// Header prettification: underscores to spaces, camelCase split, leading
/// capital.
pub fn display_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    let mut prev_lower = false;
    for ch in field.chars() {
        if ch == '_' {
            out.push(' ');
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        out.push(ch);
    }
    let trimmed = out.trim().to_string();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn record(data: Value) -> Record {
        Record {
            id: "r1".into(),
            data,
            added_by: "u1".into(),
            grid_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn column_order_wins_over_row_keys() {
        let rows = [record(json!({"B": "1", "A": "2"}))];
        let order = vec!["A".to_string(), "B".to_string(), "Gone".to_string()];
        let cols = infer_columns(&rows, Some(&order));
        let fields: Vec<_> = cols.iter().map(|c| c.field.as_str()).collect();
        // Order is verbatim, even for fields absent from the data.
        assert_eq!(fields, vec!["A", "B", "Gone"]);
        assert_eq!(cols[2].ty, InferredType::Text);
    }

    #[test]
    fn numbers_and_numeric_strings_infer_number() {
        assert_eq!(infer_type(Some(&json!(42))), InferredType::Number);
        assert_eq!(infer_type(Some(&json!("42.5"))), InferredType::Number);
        assert_eq!(infer_type(Some(&json!(" 7 "))), InferredType::Number);
    }

    #[test]
    fn date_like_strings_infer_date() {
        assert_eq!(infer_type(Some(&json!("2024-05-01"))), InferredType::Date);
        assert_eq!(infer_type(Some(&json!("01/05/2024"))), InferredType::Date);
    }

    #[test]
    fn plain_and_missing_values_infer_text() {
        assert_eq!(infer_type(Some(&json!("hello"))), InferredType::Text);
        assert_eq!(infer_type(Some(&json!(""))), InferredType::Text);
        assert_eq!(infer_type(None), InferredType::Text);
        // Dashes alone are not a date.
        assert_eq!(infer_type(Some(&json!("a-b-c"))), InferredType::Text);
    }

    #[test]
    fn single_sample_heuristic_can_mis_infer() {
        // First row atypical: a numeric-looking value in a text column
        // drives the guess for the whole result set. Documented behavior.
        let rows = [
            record(json!({"Code": "123"})),
            record(json!({"Code": "abc"})),
        ];
        let cols = infer_columns(&rows, None);
        assert_eq!(cols[0].ty, InferredType::Number);
    }

    #[test]
    fn operator_sets_follow_type() {
        assert!(InferredType::Text
            .operators()
            .contains(&FilterOperator::Contains));
        assert!(InferredType::Number
            .operators()
            .contains(&FilterOperator::GreaterThan));
        assert!(!InferredType::Number
            .operators()
            .contains(&FilterOperator::Contains));
    }

    #[test]
    fn display_names_are_prettified() {
        assert_eq!(display_name("first_name"), "First name");
        assert_eq!(display_name("BodyStyle"), "Body Style");
        assert_eq!(display_name("plugType"), "Plug Type");
    }

    #[test]
    fn empty_result_set_yields_no_columns() {
        assert!(infer_columns(&[], None).is_empty());
    }
}
