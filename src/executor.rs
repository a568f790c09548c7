use async_trait::async_trait;

use crate::error::DriverError;
use crate::types::RowValues;

/// Forward-only result cursor.
#[async_trait]
pub trait Cursor: Send {
    /// Result column names, in row value order.
    fn columns(&self) -> &[String];

    /// Fetch the next row. `Ok(None)` means the cursor is exhausted; an error is terminal.
    ///
    /// # Errors
    ///
    /// Returns `DriverError` if the driver fails while producing the row.
    async fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, DriverError>;

    /// Release driver resources. Must tolerate being called more than once.
    fn close(&mut self);
}

/// Issues a SELECT and hands back its cursor.
#[async_trait]
pub trait QueryExecutor: Send {
    /// Run `sql` with `params`.
    ///
    /// # Errors
    ///
    /// Returns `DriverError` if the statement cannot be prepared or executed.
    async fn query(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn Cursor>, DriverError>;
}

/// Exclusive owner of an open cursor; closes it when dropped, on every exit path.
pub struct CursorGuard {
    cursor: Box<dyn Cursor>,
}

impl CursorGuard {
    #[must_use]
    pub fn new(cursor: Box<dyn Cursor>) -> Self {
        Self { cursor }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.cursor.columns()
    }

    /// # Errors
    ///
    /// Returns the cursor's terminal error.
    pub async fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, DriverError> {
        self.cursor.next_row().await
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.cursor.close();
    }
}

impl std::fmt::Debug for CursorGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorGuard")
            .field("columns", &self.cursor.columns())
            .finish()
    }
}

/// In-memory cursor over rows that were already fetched.
///
/// An optional terminal error is returned once the buffered rows run out, which lets an
/// executor that reads eagerly still report a failure after the rows that preceded it.
#[derive(Debug, Default)]
pub struct BufferedCursor {
    columns: Vec<String>,
    rows: std::collections::VecDeque<Vec<RowValues>>,
    terminal: Option<DriverError>,
    closed: bool,
}

impl BufferedCursor {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<RowValues>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            terminal: None,
            closed: false,
        }
    }

    /// Fail with `err` after the buffered rows are consumed.
    #[must_use]
    pub fn with_terminal_error(mut self, err: DriverError) -> Self {
        self.terminal = Some(err);
        self
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl Cursor for BufferedCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, DriverError> {
        if self.closed {
            return Ok(None);
        }
        if let Some(row) = self.rows.pop_front() {
            return Ok(Some(row));
        }
        match self.terminal.take() {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.rows.clear();
        self.terminal = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buffered_cursor_replays_rows_then_error() {
        let mut cursor = BufferedCursor::new(
            vec!["n".into()],
            vec![vec![RowValues::Int(1)], vec![RowValues::Int(2)]],
        )
        .with_terminal_error(DriverError::Other("boom".into()));

        assert_eq!(cursor.next_row().await.unwrap(), Some(vec![RowValues::Int(1)]));
        assert_eq!(cursor.next_row().await.unwrap(), Some(vec![RowValues::Int(2)]));
        assert!(cursor.next_row().await.is_err());
        assert_eq!(cursor.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn closed_cursor_yields_nothing() {
        let mut cursor = BufferedCursor::new(vec!["n".into()], vec![vec![RowValues::Int(1)]]);
        cursor.close();
        cursor.close();
        assert!(cursor.is_closed());
        assert_eq!(cursor.next_row().await.unwrap(), None);
    }
}
