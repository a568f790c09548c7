use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::spawn_blocking;

use crate::error::DriverError;
use crate::executor::{Cursor, QueryExecutor};
use crate::types::RowValues;

use super::params::Params;
use super::query::build_cursor;

pub(crate) type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// `SQLite` executor over one shared rusqlite connection.
///
/// rusqlite calls run on the blocking pool; the connection is locked for the duration of each
/// call.
///
/// `query` steps the statement to completion and buffers every row before returning the
/// cursor, so the cursor only replays rows already read. Cancelling during the scan stops the
/// replay but never interrupts SQLite work; cancelling during `query` abandons the wait while
/// the blocking task still runs to completion.
#[derive(Clone)]
pub struct SqliteExecutor {
    conn: SharedSqliteConnection,
}

impl SqliteExecutor {
    /// Open (or create) a database file.
    ///
    /// # Errors
    ///
    /// Returns `DriverError::SqliteError` if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref().to_path_buf();
        let conn = spawn_blocking(move || rusqlite::Connection::open(path))
            .await
            .map_err(join_error)??;
        tracing::debug!("opened sqlite database");
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns `DriverError::SqliteError` if the connection cannot be created.
    pub fn open_in_memory() -> Result<Self, DriverError> {
        Ok(Self::from_connection(rusqlite::Connection::open_in_memory()?))
    }

    #[must_use]
    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a batch of statements with no parameters (schema setup, fixtures).
    ///
    /// # Errors
    ///
    /// Returns `DriverError::SqliteError` if any statement fails.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), DriverError> {
        let sql_owned = sql.to_owned();
        run_blocking(Arc::clone(&self.conn), move |guard| {
            guard.execute_batch(&sql_owned).map_err(DriverError::from)
        })
        .await
    }
}

impl std::fmt::Debug for SqliteExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteExecutor").finish_non_exhaustive()
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn query(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn Cursor>, DriverError> {
        let sql_owned = sql.to_owned();
        let params_owned = Params::convert(params);
        let cursor = run_blocking(Arc::clone(&self.conn), move |guard| {
            let mut stmt = guard.prepare(&sql_owned)?;
            build_cursor(&mut stmt, &params_owned)
        })
        .await?;
        Ok(Box::new(cursor))
    }
}

fn join_error(e: tokio::task::JoinError) -> DriverError {
    DriverError::ConnectionError(format!("sqlite spawn_blocking join error: {e}"))
}

async fn run_blocking<F, R>(conn: SharedSqliteConnection, func: F) -> Result<R, DriverError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, DriverError> + Send + 'static,
    R: Send + 'static,
{
    spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(join_error)?
}
