//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::callbacks::QueryChain;
pub use crate::config::QueryConfig;
pub use crate::destination::Destination;
pub use crate::error::{DriverError, FieldError, QueryError};
pub use crate::executor::{Cursor, QueryExecutor};
pub use crate::instrument::{LogTracer, NoopTracer, TraceContext, Tracer};
pub use crate::model::{AfterFind, HookError, Model};
pub use crate::scope::{Scope, Search, keys};
pub use crate::types::{FromRowValue, RowValues};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteExecutor;
