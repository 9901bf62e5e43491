use std::env;

#[derive(Clone)]
pub struct Configuration {
    pub location: Option<String>,
    pub pool_size: Option<usize>,
    pub token_secret: Option<String>,
    /// Fields probed with a case-insensitive LIKE by the free-text search,
    /// in addition to the document-wide probes.
    pub search_fields: Vec<String>,
}

impl Configuration {
    pub fn from_env() -> Self {
        let search_fields = env::var("GRIDSTORE_SEARCH_FIELDS")
            .map(|raw| {
                raw.split(',')
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Configuration {
            location: env::var("GRIDSTORE_DB").ok(),
            pool_size: env::var("GRIDSTORE_POOL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok()),
            token_secret: env::var("GRIDSTORE_TOKEN_SECRET").ok(),
            search_fields,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            location: None,
            pool_size: None,
            token_secret: None,
            search_fields: Vec::new(),
        }
    }
}
