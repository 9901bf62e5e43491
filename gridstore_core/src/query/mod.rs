pub mod compiler;
pub mod models;
pub mod parser;

pub use compiler::{compile, CompiledQuery};
pub use models::{FieldLogic, FilterCondition, FilterOperator, ListRequest, SortOrder};
pub use parser::parse_list_request;
