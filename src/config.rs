use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::QueryError;
use crate::instrument::{LogTracer, TraceContext};

/// Settings for the query stage.
///
/// ```rust
/// use sql_materialize::prelude::*;
///
/// let config = QueryConfig::default()
///     .with_span_prefix("app:query")
///     .with_slow_query_threshold(std::time::Duration::from_millis(250));
/// # let _ = config;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Root span name; child spans append `:prepare`, `:execute` and `:scan`.
    pub span_prefix: String,
    /// Emit `tracing` spans when the scope has no trace context attached.
    pub trace_spans: bool,
    /// Include SQL text in the statement log line.
    pub log_sql: bool,
    /// Statements at or above this duration are logged at `warn`.
    pub slow_query_threshold_ms: Option<u64>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            span_prefix: "orm:query".to_string(),
            trace_spans: true,
            log_sql: true,
            slow_query_threshold_ms: None,
        }
    }
}

impl QueryConfig {
    #[must_use]
    pub fn with_span_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.span_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_trace_spans(mut self, enabled: bool) -> Self {
        self.trace_spans = enabled;
        self
    }

    #[must_use]
    pub fn with_sql_logging(mut self, enabled: bool) -> Self {
        self.log_sql = enabled;
        self
    }

    #[must_use]
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold_ms = Some(u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn slow_query_threshold(&self) -> Option<Duration> {
        self.slow_query_threshold_ms.map(Duration::from_millis)
    }

    /// Trace context used when the scope does not carry one.
    #[must_use]
    pub fn default_trace_context(&self) -> TraceContext {
        if self.trace_spans {
            TraceContext::new(Arc::new(LogTracer))
        } else {
            TraceContext::noop()
        }
    }

    /// Parse a JSON document; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Config` if the document is not valid.
    pub fn from_json_str(json: &str) -> Result<Self, QueryError> {
        serde_json::from_str(json).map_err(|e| QueryError::Config(format!("invalid query config: {e}")))
    }

    /// Read and parse a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Config` if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, QueryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| QueryError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }
}
