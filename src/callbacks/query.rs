use std::time::{Duration, Instant};

use crate::destination::Destination;
use crate::error::QueryError;
use crate::executor::{CursorGuard, QueryExecutor};
use crate::instrument::TraceContext;
use crate::mapper::ColumnPlan;
use crate::model::Model;
use crate::scope::{Scope, keys};
use crate::statement::TableInfo;

use super::QueryChain;

impl QueryChain {
    /// Run the scope's SELECT and materialize its rows into `destination`.
    ///
    /// A destination stored under [`keys::QUERY_DESTINATION`] replaces `destination`; it is put
    /// back into the scope before returning. With [`keys::SKIP_QUERY`] or
    /// [`keys::PRELOAD_ONLY`] set this returns immediately without touching anything.
    ///
    /// On error the destination may hold the rows read before the failure.
    ///
    /// # Errors
    ///
    /// One of `UnsupportedDestination`, `Preparation`, `Execution`, `RowIteration` or
    /// `RecordNotFound`, in that order of precedence.
    pub async fn query_callback<M, E>(
        &self,
        scope: &mut Scope,
        executor: &mut E,
        destination: Destination<'_, M>,
    ) -> Result<(), QueryError>
    where
        M: Model,
        E: QueryExecutor + ?Sized,
    {
        if scope.contains(keys::SKIP_QUERY) || scope.contains(keys::PRELOAD_ONLY) {
            return Ok(());
        }

        let trace = scope
            .trace_context()
            .cloned()
            .unwrap_or_else(|| self.config.default_trace_context());
        let (mut root, root_ctx) = trace.start_span(&self.config.span_prefix);

        let result = match scope.remove(keys::QUERY_DESTINATION) {
            Some(mut value) => {
                let result = match Destination::<M>::from_any(value.as_mut()) {
                    Ok(dest) => self.run_query(scope, executor, dest, &root_ctx).await,
                    Err(err) => Err(err),
                };
                scope.set_boxed(keys::QUERY_DESTINATION, value);
                result
            }
            None => self.run_query(scope, executor, destination, &root_ctx).await,
        };

        if let Err(err) = &result {
            root.set_tag("error", &err.to_string());
        }
        root.finish();
        result
    }

    async fn run_query<M, E>(
        &self,
        scope: &mut Scope,
        executor: &mut E,
        mut dest: Destination<'_, M>,
        ctx: &TraceContext,
    ) -> Result<(), QueryError>
    where
        M: Model,
        E: QueryExecutor + ?Sized,
    {
        let schema = M::schema();
        let prefix = &self.config.span_prefix;
        dest.reset();

        if scope.contains(keys::ORDER_BY_PRIMARY_KEY) {
            if let Some(pk) = schema.primary_field() {
                let column = format!(
                    "{}.{}",
                    Scope::quote(schema.table_name()),
                    Scope::quote(pk.column)
                );
                let fragment = match scope.get_str(keys::ORDER_BY_PRIMARY_KEY).map(str::trim) {
                    Some(direction) if !direction.is_empty() => format!("{column} {direction}"),
                    _ => column,
                };
                scope.search.order(fragment);
            }
        }

        let (mut prepare_span, _) = ctx.start_span(&format!("{prefix}:prepare"));
        let table = TableInfo {
            table: schema.table_name(),
            primary_key: schema.primary_field().map(|f| f.column),
        };
        let prepared = self
            .builder
            .prepare(scope, table)
            .map_err(|err| match err {
                QueryError::Preparation(_) => err,
                other => QueryError::Preparation(other.to_string()),
            })
            .and_then(|()| apply_hint(scope));
        if let Err(err) = &prepared {
            prepare_span.set_tag("error", &err.to_string());
        }
        prepare_span.finish();
        prepared?;

        scope.rows_affected = 0;
        let started = Instant::now();

        let (mut execute_span, _) = ctx.start_span(&format!("{prefix}:execute"));
        let executed = ctx.run(executor.query(&scope.sql, &scope.params)).await;
        if let Err(err) = &executed {
            execute_span.set_tag("error", &err.to_string());
        }
        execute_span.finish();

        let mut cursor = match executed {
            Ok(cursor) => CursorGuard::new(cursor),
            Err(err) => {
                let err = QueryError::Execution(err);
                self.log_statement(scope, started.elapsed(), Some(&err));
                return Err(err);
            }
        };

        let (mut scan_span, _) = ctx.start_span(&format!("{prefix}:scan"));
        let scanned = match scan_rows(scope, &mut cursor, &mut dest, ctx).await {
            Ok(()) if scope.rows_affected == 0 && !dest.is_sequence() => {
                Err(QueryError::RecordNotFound)
            }
            other => other,
        };
        if let Err(err) = &scanned {
            scan_span.set_tag("rows.err", &err.to_string());
        }
        scan_span.finish();
        drop(cursor);

        self.log_statement(scope, started.elapsed(), scanned.as_ref().err());
        scanned
    }

    fn log_statement(&self, scope: &Scope, elapsed: Duration, error: Option<&QueryError>) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let sql = if self.config.log_sql {
            scope.sql.as_str()
        } else {
            "<redacted>"
        };
        let slow = self
            .config
            .slow_query_threshold()
            .is_some_and(|threshold| elapsed >= threshold);

        if slow {
            tracing::warn!(
                sql = %sql,
                params = scope.params.len(),
                rows_affected = scope.rows_affected,
                elapsed_ms,
                error = ?error,
                "slow query"
            );
        } else {
            tracing::debug!(
                sql = %sql,
                params = scope.params.len(),
                rows_affected = scope.rows_affected,
                elapsed_ms,
                error = ?error,
                "query"
            );
        }
    }
}

/// Prepend the query hint, if one is set. Hints are trusted input and spliced in verbatim.
fn apply_hint(scope: &mut Scope) -> Result<(), QueryError> {
    if !scope.contains(keys::QUERY_HINT) {
        return Ok(());
    }
    let hint = scope
        .get_str(keys::QUERY_HINT)
        .map(str::to_owned)
        .ok_or_else(|| QueryError::Preparation("query hint must be a String or &str".to_string()))?;
    scope.sql = format!("{hint}{}", scope.sql);
    Ok(())
}

async fn scan_rows<M: Model>(
    scope: &mut Scope,
    cursor: &mut CursorGuard,
    dest: &mut Destination<'_, M>,
    ctx: &TraceContext,
) -> Result<(), QueryError> {
    let plan = ColumnPlan::resolve(M::schema(), cursor.columns());

    while let Some(row) = ctx
        .run(cursor.next_row())
        .await
        .map_err(QueryError::RowIteration)?
    {
        scope.rows_affected += 1;

        match dest {
            Destination::Single(target) => {
                plan.apply(target, &row).map_err(QueryError::RowIteration)?;
            }
            Destination::Sequence(items) => {
                let mut elem = M::default();
                plan.apply(&mut elem, &row)
                    .map_err(QueryError::RowIteration)?;
                items.push(elem);
            }
            Destination::BoxedSequence(items) => {
                let mut elem = Box::<M>::default();
                plan.apply(&mut elem, &row)
                    .map_err(QueryError::RowIteration)?;
                items.push(elem);
            }
        }
    }

    Ok(())
}
