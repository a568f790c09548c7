//! Query stage for an ORM pipeline.
//!
//! Takes a prepared SELECT from a [`Scope`], runs it through a [`QueryExecutor`], and
//! materializes the rows into a model value, a `Vec<M>` or a `Vec<Box<M>>`. Preparation,
//! execution and scanning are each wrapped in a child span of one root span.
//!
//! ```rust
//! use sql_materialize::prelude::*;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! sql_materialize::model! {
//!     User in "users" { primary_key id, name }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut executor = SqliteExecutor::open_in_memory()?;
//! executor
//!     .execute_batch("CREATE TABLE users (id INTEGER, name TEXT); INSERT INTO users VALUES (1, 'a'), (2, 'b');")
//!     .await?;
//!
//! let mut users: Vec<User> = Vec::new();
//! let mut scope = Scope::new();
//! QueryChain::default()
//!     .find(&mut scope, &mut executor, Destination::Sequence(&mut users))
//!     .await?;
//! assert_eq!(users[1], User { id: 2, name: "b".into() });
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

pub mod callbacks;
pub mod config;
pub mod destination;
pub mod error;
pub mod executor;
pub mod instrument;
pub mod mapper;
pub mod model;
pub mod prelude;
pub mod scope;
pub mod statement;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use callbacks::QueryChain;
pub use config::QueryConfig;
pub use destination::Destination;
pub use error::{DriverError, FieldError, QueryError};
pub use executor::{BufferedCursor, Cursor, CursorGuard, QueryExecutor};
pub use instrument::{LogTracer, NoopTracer, Span, SpanGuard, SpanId, TraceContext, Tracer};
pub use model::{AfterFind, FieldDef, HookError, Model, Schema};
pub use scope::{Scope, Search, keys};
pub use statement::{SelectBuilder, StatementBuilder, TableInfo};
pub use types::{FromRowValue, RowValues};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteExecutor;
