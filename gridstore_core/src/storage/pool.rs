use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use log::debug;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::errors::{GridError, Result};

/// Bounded pool of SQLite connections. One connection is acquired per
/// request and returned when the guard drops.
pub struct Pool {
    queue: Arc<ArrayQueue<Connection>>,
    semaphore: Arc<Semaphore>,
}

impl Pool {
    pub fn open(path: &Path, size: usize) -> Result<Pool> {
        let queue = Arc::new(ArrayQueue::new(size));

        for i in 0..size {
            let conn = Connection::open(path)?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "busy_timeout", 5000_i64)?;
            register_functions(&conn)?;
            if queue.push(conn).is_err() {
                return Err(GridError::Internal(format!(
                    "connection pool rejected connection {}",
                    i
                )));
            }
        }

        debug!("opened pool of {} connections at {}", size, path.display());

        Ok(Pool {
            queue,
            semaphore: Arc::new(Semaphore::new(size)),
        })
    }

    pub async fn acquire(&self) -> Result<PooledConnection> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GridError::Internal("connection pool closed".to_string()))?;

        // The permit guarantees a connection is in the queue.
        let conn = self
            .queue
            .pop()
            .ok_or_else(|| GridError::Internal("connection pool empty".to_string()))?;

        Ok(PooledConnection {
            conn: Some(conn),
            queue: self.queue.clone(),
            _permit: permit,
        })
    }
}

pub struct PooledConnection {
    conn: Option<Connection>,
    queue: Arc<ArrayQueue<Connection>>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection taken")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection taken")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = self.queue.push(conn);
        }
    }
}

/// Register the `to_number` scalar: REAL for numeric input, NULL
/// otherwise. Comparison predicates against NULL never match, which is
/// exactly the contract for numeric filters over free-form JSON values.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "to_number",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let out: Option<f64> = match ctx.get_raw(0) {
                ValueRef::Integer(i) => Some(i as f64),
                ValueRef::Real(f) => Some(f),
                ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                    .ok()
                    .and_then(|s| s.trim().parse::<f64>().ok()),
                _ => None,
            };
            Ok(out)
        },
    )
}
