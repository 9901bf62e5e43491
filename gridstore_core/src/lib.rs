pub(crate) const POOL_SIZE: usize = 10;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 500;

// Seven days, matching the token contract of the HTTP API.
pub const TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

pub mod auth;
pub mod configuration;
pub mod errors;
pub mod models;
pub mod query;
pub mod schema;
pub mod storage;
