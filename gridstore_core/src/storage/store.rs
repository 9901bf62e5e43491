use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::configuration::Configuration;
use crate::errors::{GridError, Result};
use crate::models::{Grid, Page, Record, User};
use crate::query::{compile, ListRequest};
use crate::storage::pool::Pool;
use crate::POOL_SIZE;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS universal_data (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    added_by TEXT NOT NULL,
    grid_id TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_universal_added_by ON universal_data (added_by);
CREATE INDEX IF NOT EXISTS idx_universal_grid_id ON universal_data (grid_id);
CREATE INDEX IF NOT EXISTS idx_universal_added_by_grid ON universal_data (added_by, grid_id);
CREATE TABLE IF NOT EXISTS user_grids (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    added_by TEXT NOT NULL,
    column_order TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_grids_added_by ON user_grids (added_by);
";

/// The grid/record store. Owns the connection pool; every query is scoped
/// by owner id, and cross-user access surfaces as not-found.
#[derive(Clone)]
pub struct Store {
    pool: Arc<Pool>,
    search_fields: Arc<Vec<String>>,
}

impl Store {
    pub fn open(config: &Configuration) -> Result<Store> {
        let path = PathBuf::from(
            config
                .location
                .clone()
                .unwrap_or_else(|| "gridstore.db".to_string()),
        );

        {
            let conn = Connection::open(&path)?;
            conn.execute_batch(SCHEMA_SQL)?;
        }

        let pool = Pool::open(&path, config.pool_size.unwrap_or(POOL_SIZE))?;
        info!("store ready at {}", path.display());

        Ok(Store {
            pool: Arc::new(pool),
            search_fields: Arc::new(config.search_fields.clone()),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut conn = self.pool.acquire().await?;
        tokio::task::spawn_blocking(move || f(&mut conn))
            .await
            .map_err(|e| GridError::Internal(format!("blocking task failed: {}", e)))?
    }

    // ---- records ----

    pub async fn list_records(&self, owner: &str, request: ListRequest) -> Result<Page<Record>> {
        let compiled = compile(owner, &request, &self.search_fields);
        let (page, limit, offset) = (request.page, request.limit, request.offset());

        self.with_conn(move |conn| {
            let total: u64 = conn.query_row(
                &compiled.count_sql(),
                params_from_iter(compiled.count_params()),
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&compiled.select_sql())?;
            let raw_rows = stmt
                .query_map(
                    params_from_iter(compiled.select_params(limit, offset)),
                    map_raw_record,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let data = raw_rows
                .into_iter()
                .map(RawRecord::into_record)
                .collect::<Result<Vec<_>>>()?;

            Ok(Page::new(data, total, page, limit))
        })
        .await
    }

    pub async fn get_record(&self, owner: &str, id: &str) -> Result<Record> {
        let (owner, id) = (owner.to_string(), id.to_string());
        self.with_conn(move |conn| {
            let raw = conn
                .query_row(
                    "SELECT id, data, added_by, grid_id, created_at FROM universal_data
                     WHERE id = ? AND added_by = ?",
                    params![id, owner],
                    map_raw_record,
                )
                .optional()?;
            raw.ok_or(GridError::NotFound("record"))?.into_record()
        })
        .await
    }

    pub async fn delete_record(&self, owner: &str, id: &str) -> Result<()> {
        let (owner, id) = (owner.to_string(), id.to_string());
        self.with_conn(move |conn| {
            let affected = conn.execute(
                "DELETE FROM universal_data WHERE id = ? AND added_by = ?",
                params![id, owner],
            )?;
            if affected == 0 {
                return Err(GridError::NotFound("record"));
            }
            Ok(())
        })
        .await
    }

    /// Bulk insert for the plain upload path: failures are caught per row
    /// and counted as skipped rather than aborting the batch.
    pub async fn bulk_insert(
        &self,
        owner: &str,
        grid_id: Option<String>,
        rows: Vec<Map<String, Value>>,
    ) -> Result<(usize, usize)> {
        let owner = owner.to_string();
        self.with_conn(move |conn| {
            if let Some(grid_id) = &grid_id {
                require_grid(conn, &owner, grid_id)?;
            }

            let mut inserted = 0usize;
            let mut skipped = 0usize;

            for row in rows {
                let id = Uuid::new_v4().to_string();
                let payload = Value::Object(row).to_string();
                let outcome = conn.execute(
                    "INSERT INTO universal_data (id, data, added_by, grid_id, created_at)
                     VALUES (?, ?, ?, ?, ?)",
                    params![id, payload, owner, grid_id, Utc::now().to_rfc3339()],
                );
                match outcome {
                    Ok(_) => inserted += 1,
                    Err(err) => {
                        error!("row insert failed, skipping: {}", err);
                        skipped += 1;
                    }
                }
            }

            Ok((inserted, skipped))
        })
        .await
    }

    // ---- grids ----

    /// Create a grid from a parsed CSV, or replace/extend an existing one.
    /// Runs in a single transaction: a failure mid-insert rolls everything
    /// back instead of leaving a partial grid behind.
    pub async fn create_grid(
        &self,
        owner: &str,
        name: &str,
        existing_grid_id: Option<String>,
        is_replacement: bool,
        column_order: Vec<String>,
        rows: Vec<Map<String, Value>>,
    ) -> Result<(String, usize)> {
        let owner = owner.to_string();
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(GridError::validation("Grid name is required"));
        }

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let grid_id = existing_grid_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            if let Some(existing) = &existing_grid_id {
                require_grid(&tx, &owner, existing)?;
                if is_replacement {
                    let removed = tx.execute(
                        "DELETE FROM universal_data WHERE grid_id = ? AND added_by = ?",
                        params![existing, owner],
                    )?;
                    info!("replacing grid {}: removed {} records", existing, removed);
                }
            } else {
                tx.execute(
                    "INSERT INTO user_grids (id, name, added_by, column_order, created_at)
                     VALUES (?, ?, ?, NULL, ?)",
                    params![grid_id, name, owner, Utc::now().to_rfc3339()],
                )?;
            }

            let mut inserted = 0usize;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO universal_data (id, data, added_by, grid_id, created_at)
                     VALUES (?, ?, ?, ?, ?)",
                )?;
                for row in rows {
                    stmt.execute(params![
                        Uuid::new_v4().to_string(),
                        Value::Object(row).to_string(),
                        owner,
                        grid_id,
                        Utc::now().to_rfc3339(),
                    ])?;
                    inserted += 1;
                }
            }

            // Column order reflects the most recent CSV, also on replace.
            tx.execute(
                "UPDATE user_grids SET column_order = ? WHERE id = ? AND added_by = ?",
                params![serde_json::to_string(&column_order)?, grid_id, owner],
            )?;

            tx.commit()?;
            Ok((grid_id, inserted))
        })
        .await
    }

    pub async fn list_grids(&self, owner: &str) -> Result<Vec<Grid>> {
        let owner = owner.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, added_by, column_order, created_at,
                        (SELECT COUNT(*) FROM universal_data WHERE grid_id = user_grids.id)
                 FROM user_grids WHERE added_by = ? ORDER BY created_at DESC, id DESC",
            )?;
            let raw = stmt
                .query_map(params![owner], map_raw_grid)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            raw.into_iter().map(RawGrid::into_grid).collect()
        })
        .await
    }

    pub async fn get_grid(&self, owner: &str, id: &str) -> Result<Grid> {
        let (owner, id) = (owner.to_string(), id.to_string());
        self.with_conn(move |conn| {
            let raw = conn
                .query_row(
                    "SELECT id, name, added_by, column_order, created_at,
                            (SELECT COUNT(*) FROM universal_data WHERE grid_id = user_grids.id)
                     FROM user_grids WHERE id = ? AND added_by = ?",
                    params![id, owner],
                    map_raw_grid,
                )
                .optional()?;
            raw.ok_or(GridError::NotFound("grid"))?.into_grid()
        })
        .await
    }

    pub async fn rename_grid(&self, owner: &str, id: &str, name: &str) -> Result<()> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(GridError::validation("Grid name is required"));
        }
        let (owner, id) = (owner.to_string(), id.to_string());
        self.with_conn(move |conn| {
            let affected = conn.execute(
                "UPDATE user_grids SET name = ? WHERE id = ? AND added_by = ?",
                params![name, id, owner],
            )?;
            if affected == 0 {
                return Err(GridError::NotFound("grid"));
            }
            Ok(())
        })
        .await
    }

    /// Deleting a grid cascades to every record carrying its id.
    pub async fn delete_grid(&self, owner: &str, id: &str) -> Result<()> {
        let (owner, id) = (owner.to_string(), id.to_string());
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM universal_data WHERE grid_id = ? AND added_by = ?",
                params![id, owner],
            )?;
            let affected = tx.execute(
                "DELETE FROM user_grids WHERE id = ? AND added_by = ?",
                params![id, owner],
            )?;
            if affected == 0 {
                // Rolls back the (empty) record delete as well.
                return Err(GridError::NotFound("grid"));
            }
            tx.commit()?;
            info!("deleted grid {} and {} records", id, removed);
            Ok(())
        })
        .await
    }

    // ---- users ----

    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User> {
        let (name, email, password_hash) = (
            name.to_string(),
            email.to_string(),
            password_hash.to_string(),
        );
        self.with_conn(move |conn| {
            let exists: Option<String> = conn
                .query_row(
                    "SELECT id FROM users WHERE email = ?",
                    params![email],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                return Err(GridError::EmailTaken);
            }

            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO users (id, email, name, password_hash, status, created_at)
                 VALUES (?, ?, ?, ?, 'active', ?)",
                params![id, email, name, password_hash, Utc::now().to_rfc3339()],
            )?;

            Ok(User { id, email, name })
        })
        .await
    }

    /// Returns the user and the stored password hash; the caller verifies.
    pub async fn user_by_email(&self, email: &str) -> Result<Option<(User, String)>> {
        let email = email.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, email, name, password_hash FROM users WHERE email = ?",
                    params![email],
                    |row| {
                        Ok((
                            User {
                                id: row.get(0)?,
                                email: row.get(1)?,
                                name: row.get(2)?,
                            },
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?;
            Ok(row)
        })
        .await
    }

    pub async fn set_user_status(&self, id: &str, status: &str) -> Result<()> {
        let (id, status) = (id.to_string(), status.to_string());
        self.with_conn(move |conn| {
            let affected = conn.execute(
                "UPDATE users SET status = ? WHERE id = ?",
                params![status, id],
            )?;
            if affected == 0 {
                warn!("status update for unknown user {}", id);
            }
            Ok(())
        })
        .await
    }
}

fn require_grid(conn: &Connection, owner: &str, grid_id: &str) -> Result<()> {
    let exists: Option<String> = conn
        .query_row(
            "SELECT id FROM user_grids WHERE id = ? AND added_by = ?",
            params![grid_id, owner],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(GridError::NotFound("grid"));
    }
    Ok(())
}

struct RawRecord {
    id: String,
    data: String,
    added_by: String,
    grid_id: Option<String>,
    created_at: String,
}

fn map_raw_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: row.get(0)?,
        data: row.get(1)?,
        added_by: row.get(2)?,
        grid_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl RawRecord {
    fn into_record(self) -> Result<Record> {
        Ok(Record {
            data: serde_json::from_str(&self.data)?,
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            added_by: self.added_by,
            grid_id: self.grid_id,
        })
    }
}

struct RawGrid {
    id: String,
    name: String,
    added_by: String,
    column_order: Option<String>,
    created_at: String,
    record_count: i64,
}

fn map_raw_grid(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawGrid> {
    Ok(RawGrid {
        id: row.get(0)?,
        name: row.get(1)?,
        added_by: row.get(2)?,
        column_order: row.get(3)?,
        created_at: row.get(4)?,
        record_count: row.get(5)?,
    })
}

impl RawGrid {
    fn into_grid(self) -> Result<Grid> {
        let column_order = match self.column_order {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        Ok(Grid {
            column_order,
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            name: self.name,
            added_by: self.added_by,
            record_count: self.record_count,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GridError::Internal(format!("bad timestamp {:?}: {}", raw, e)))
}
