// Query callback chain
//
// - query: statement preparation, execution, row materialization, tracing
// - after_query: post-query model hooks

mod after_query;
mod query;

use std::sync::Arc;

use crate::config::QueryConfig;
use crate::destination::Destination;
use crate::error::QueryError;
use crate::executor::QueryExecutor;
use crate::model::Model;
use crate::scope::Scope;
use crate::statement::{SelectBuilder, StatementBuilder};

/// The query stages of an ORM find, run in order against one [`Scope`].
///
/// ```rust,no_run
/// use sql_materialize::prelude::*;
///
/// #[derive(Debug, Default)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// sql_materialize::model! {
///     User in "users" { primary_key id, name }
/// }
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let mut executor = SqliteExecutor::open("app.db").await?;
/// let chain = QueryChain::default();
///
/// let mut users: Vec<User> = Vec::new();
/// let mut scope = Scope::new();
/// let rows = chain
///     .find(&mut scope, &mut executor, Destination::Sequence(&mut users))
///     .await?;
/// assert_eq!(rows, users.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QueryChain {
    pub(crate) config: QueryConfig,
    pub(crate) builder: Arc<dyn StatementBuilder>,
}

impl Default for QueryChain {
    fn default() -> Self {
        Self::new(QueryConfig::default())
    }
}

impl QueryChain {
    #[must_use]
    pub fn new(config: QueryConfig) -> Self {
        Self {
            config,
            builder: Arc::new(SelectBuilder),
        }
    }

    /// Replace the statement builder used for preparation.
    #[must_use]
    pub fn with_statement_builder(mut self, builder: Arc<dyn StatementBuilder>) -> Self {
        self.builder = builder;
        self
    }

    #[must_use]
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Run the query stage and then the after-query hooks.
    ///
    /// Each stage's error lands in the scope's sticky slot, so the first failure wins and
    /// later stages see it. An error already held by the scope skips the query entirely.
    /// Returns the number of rows read.
    ///
    /// # Errors
    ///
    /// The first error recorded on the scope, which is taken out of it.
    pub async fn find<M, E>(
        &self,
        scope: &mut Scope,
        executor: &mut E,
        mut destination: Destination<'_, M>,
    ) -> Result<usize, QueryError>
    where
        M: Model,
        E: QueryExecutor + ?Sized,
    {
        if !scope.has_error() {
            if let Err(err) = self
                .query_callback(scope, executor, destination.reborrow())
                .await
            {
                scope.err(err);
            }
        }

        if let Err(err) = self.after_query_callback(scope, destination) {
            scope.err(err);
        }

        match scope.take_error() {
            Some(err) => Err(err),
            None => Ok(scope.rows_affected),
        }
    }
}

impl std::fmt::Debug for QueryChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryChain")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
