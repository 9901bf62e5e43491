pub mod client;
pub mod controller;
pub mod export;

pub use client::{ClientError, GridClient};
pub use controller::{ActiveFilter, FilterState, GridView};
pub use export::export_csv;

// Column inference runs client-side over whatever rows arrived.
pub use gridstore_core::schema::{infer_columns, InferredColumn, InferredType};
