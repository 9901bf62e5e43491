use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One imported row, stored as an arbitrary JSON object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub data: Value,
    pub added_by: String,
    pub grid_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A named collection of imported rows sharing the column layout of the
/// CSV that created it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Grid {
    pub id: String,
    pub name: String,
    pub added_by: String,
    /// Header order of the originating CSV. Not guaranteed to match the
    /// runtime key set after a structurally different replacement upload.
    pub column_order: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    /// Live count, computed per listing (correlated subquery, not
    /// denormalized).
    #[serde(default)]
    pub record_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
}

/// Page envelope returned by the data listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        let total_pages = total.div_ceil(limit.max(1) as u64);
        Page {
            data,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// Outcome of a bulk CSV import. Blank rows become validation errors,
/// per-row insert failures become skips; neither aborts the batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub total_records: usize,
    pub inserted_count: usize,
    pub skipped_count: usize,
    pub validation_errors: Vec<RowError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row: usize,
    pub errors: Vec<String>,
}
