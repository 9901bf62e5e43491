pub mod csv_import;
pub mod pool;
pub mod store;

pub use csv_import::{parse_csv_file, parse_csv_reader, ParsedCsv};
pub use pool::{Pool, PooledConnection};
pub use store::Store;
