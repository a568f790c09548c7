use std::any::Any;
use std::collections::HashMap;

use crate::error::QueryError;
use crate::instrument::TraceContext;
use crate::types::RowValues;

/// Side-channel keys understood by the query stage.
pub mod keys {
    /// Presence skips the query stage entirely (results were already fetched).
    pub const SKIP_QUERY: &str = "orm:skip_query_callback";
    /// Presence skips the query stage because only associations are being preloaded.
    pub const PRELOAD_ONLY: &str = "orm:only_preload";
    /// Boxed `Vec<M>`, `Vec<Box<M>>` or `M` used instead of the caller's destination.
    pub const QUERY_DESTINATION: &str = "orm:query_destination";
    /// Direction (`"ASC"`/`"DESC"`) for ordering by the model's primary key.
    pub const ORDER_BY_PRIMARY_KEY: &str = "orm:order_by_primary_key";
    /// Raw text (`String` or `&'static str`) prepended to the final SQL. Trusted input only: it
    /// is not escaped. A value of any other type fails preparation.
    pub const QUERY_HINT: &str = "orm:query_hint";
    /// [`TraceContext`](crate::instrument::TraceContext) the stage's spans are parented to.
    pub const TRACE_CONTEXT: &str = "orm:trace_context";
}

/// SELECT description consumed by a [`StatementBuilder`](crate::statement::StatementBuilder).
#[derive(Debug, Clone, Default)]
pub struct Search {
    /// Column list; `*` when empty.
    pub select: Option<String>,
    /// WHERE fragments joined with AND, each with its own bound parameters.
    pub conditions: Vec<(String, Vec<RowValues>)>,
    /// ORDER BY fragments in the order they were added.
    pub orders: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Complete statement text used instead of a generated SELECT.
    pub raw: Option<(String, Vec<RowValues>)>,
}

impl Search {
    #[must_use]
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.select = Some(columns.into());
        self
    }

    #[must_use]
    pub fn where_clause(mut self, condition: impl Into<String>, params: Vec<RowValues>) -> Self {
        self.conditions.push((condition.into(), params));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn raw(mut self, sql: impl Into<String>, params: Vec<RowValues>) -> Self {
        self.raw = Some((sql.into(), params));
        self
    }

    /// Append an ORDER BY fragment.
    pub fn order(&mut self, fragment: impl Into<String>) {
        self.orders.push(fragment.into());
    }
}

/// Per-operation context passed through every stage of a query chain.
///
/// Holds the statement being built, the first error raised by any stage, and a string-keyed
/// side channel for flags and overrides (see [`keys`]).
#[derive(Default)]
pub struct Scope {
    /// Final SQL text, filled in by statement preparation.
    pub sql: String,
    /// Parameters bound to `sql`, in placeholder order.
    pub params: Vec<RowValues>,
    /// Rows read by the last query stage.
    pub rows_affected: usize,
    pub search: Search,
    error: Option<QueryError>,
    values: HashMap<String, Box<dyn Any + Send>>,
}

impl Scope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope that prepares its SQL from `search`.
    #[must_use]
    pub fn with_search(search: Search) -> Self {
        Self {
            search,
            ..Self::default()
        }
    }

    /// Record `err` unless an error is already present. Returns the error now held.
    pub fn err(&mut self, err: QueryError) -> &QueryError {
        self.error.get_or_insert(err)
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    #[must_use]
    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    /// Remove and return the held error.
    pub fn take_error(&mut self) -> Option<QueryError> {
        self.error.take()
    }

    /// Store `value` under `key`, replacing anything already there.
    pub fn set<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Store an already boxed value under `key`.
    pub fn set_boxed(&mut self, key: impl Into<String>, value: Box<dyn Any + Send>) {
        self.values.insert(key.into(), value);
    }

    /// Typed read of the value under `key`; `None` if absent or of another type.
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Box<dyn Any + Send>> {
        self.values.remove(key)
    }

    /// Remove the value under `key` if it has type `T`. Values of other types are left in place.
    pub fn take<T: Any>(&mut self, key: &str) -> Option<T> {
        if self.get::<T>(key).is_none() {
            return None;
        }
        self.values
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|b| *b)
    }

    /// String value under `key`, accepting `String` or `&'static str`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get::<String>(key)
            .map(String::as_str)
            .or_else(|| self.get::<&'static str>(key).copied())
    }

    /// Trace context attached under [`keys::TRACE_CONTEXT`], if any.
    #[must_use]
    pub fn trace_context(&self) -> Option<&TraceContext> {
        self.get::<TraceContext>(keys::TRACE_CONTEXT)
    }

    /// Quote an identifier with double quotes, doubling embedded quotes.
    #[must_use]
    pub fn quote(ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("Scope")
            .field("sql", &self.sql)
            .field("params", &self.params)
            .field("rows_affected", &self.rows_affected)
            .field("search", &self.search)
            .field("error", &self.error)
            .field("keys", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_slot_is_sticky() {
        let mut scope = Scope::new();
        scope.err(QueryError::RecordNotFound);
        scope.err(QueryError::Preparation("late".into()));
        assert!(scope.error().is_some_and(QueryError::is_record_not_found));
        assert!(scope.take_error().is_some());
        assert!(!scope.has_error());
    }

    #[test]
    fn side_channel_is_typed() {
        let mut scope = Scope::new();
        scope.set(keys::QUERY_HINT, "/*+ INDEX(users idx) */ ");
        scope.set("count", 3_u32);

        assert_eq!(scope.get_str(keys::QUERY_HINT), Some("/*+ INDEX(users idx) */ "));
        assert_eq!(scope.get::<u32>("count"), Some(&3));
        assert_eq!(scope.get::<i64>("count"), None);

        assert_eq!(scope.take::<i64>("count"), None);
        assert!(scope.contains("count"));
        assert_eq!(scope.take::<u32>("count"), Some(3));
        assert!(!scope.contains("count"));
    }

    #[test]
    fn quote_escapes_embedded_quotes() {
        assert_eq!(Scope::quote("users"), "\"users\"");
        assert_eq!(Scope::quote("we\"ird"), "\"we\"\"ird\"");
    }
}
