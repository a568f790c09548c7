use crate::error::QueryError;
use crate::scope::Scope;

/// Table metadata the statement builder needs from the model.
#[derive(Debug, Clone, Copy)]
pub struct TableInfo<'a> {
    pub table: &'a str,
    pub primary_key: Option<&'a str>,
}

/// Turns a scope's [`Search`](crate::scope::Search) into final SQL text and parameters.
pub trait StatementBuilder: Send + Sync {
    /// Fill `scope.sql` and `scope.params`.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Preparation` if no statement can be produced.
    fn prepare(&self, scope: &mut Scope, table: TableInfo<'_>) -> Result<(), QueryError>;
}

/// Builds `SELECT ... FROM "table" [WHERE] [ORDER BY] [LIMIT] [OFFSET]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectBuilder;

impl StatementBuilder for SelectBuilder {
    fn prepare(&self, scope: &mut Scope, table: TableInfo<'_>) -> Result<(), QueryError> {
        let search = &scope.search;
        let mut sql = String::with_capacity(64);
        let mut params = Vec::new();

        if let Some((raw, raw_params)) = &search.raw {
            if raw.trim().is_empty() {
                return Err(QueryError::Preparation("raw SQL is empty".to_string()));
            }
            sql.push_str(raw.trim_end());
            params.extend(raw_params.iter().cloned());
        } else {
            if table.table.is_empty() {
                return Err(QueryError::Preparation(
                    "model has no table name".to_string(),
                ));
            }
            sql.push_str("SELECT ");
            sql.push_str(search.select.as_deref().unwrap_or("*"));
            sql.push_str(" FROM ");
            sql.push_str(&Scope::quote(table.table));

            for (idx, (condition, condition_params)) in search.conditions.iter().enumerate() {
                sql.push_str(if idx == 0 { " WHERE (" } else { " AND (" });
                sql.push_str(condition);
                sql.push(')');
                params.extend(condition_params.iter().cloned());
            }
        }

        if !search.orders.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&search.orders.join(", "));
        }

        if search.raw.is_none() {
            match (search.limit, search.offset) {
                (Some(limit), offset) => {
                    sql.push_str(&format!(" LIMIT {limit}"));
                    if let Some(offset) = offset {
                        sql.push_str(&format!(" OFFSET {offset}"));
                    }
                }
                // sqlite rejects OFFSET without LIMIT
                (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
                (None, None) => {}
            }
        }

        scope.sql = sql;
        scope.params = params;
        Ok(())
    }
}
