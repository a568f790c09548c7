use std::collections::HashMap;

use crate::error::FieldError;
use crate::types::RowValues;

/// Assigns one converted driver value into a field of `M`.
pub type FieldSetter<M> = fn(&mut M, &RowValues) -> Result<(), FieldError>;

/// Error type returned by model lifecycle hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// A single column-to-field binding.
pub struct FieldDef<M> {
    /// Rust field name
    pub name: &'static str,
    /// Column name as returned by the database
    pub column: &'static str,
    pub(crate) set: FieldSetter<M>,
}

impl<M> FieldDef<M> {
    #[must_use]
    pub fn new(name: &'static str, column: &'static str, set: FieldSetter<M>) -> Self {
        Self { name, column, set }
    }

    /// Convert `value` and store it into `target`.
    ///
    /// # Errors
    ///
    /// Returns `FieldError` if the value cannot be converted to the field type.
    pub fn assign(&self, target: &mut M, value: &RowValues) -> Result<(), FieldError> {
        (self.set)(target, value)
    }
}

impl<M> std::fmt::Debug for FieldDef<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

/// Table metadata and field bindings for one model type, built once per type.
#[derive(Debug)]
pub struct Schema<M> {
    table: &'static str,
    fields: Vec<FieldDef<M>>,
    by_column: HashMap<&'static str, usize>,
    primary_key: Option<usize>,
}

impl<M> Schema<M> {
    #[must_use]
    pub fn new(table: &'static str, fields: Vec<FieldDef<M>>) -> Self {
        let mut by_column = HashMap::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            by_column.entry(field.column).or_insert(idx);
        }
        Self {
            table,
            fields,
            by_column,
            primary_key: None,
        }
    }

    /// Mark the field with Rust name `field` as the primary key. Unknown names are ignored.
    #[must_use]
    pub fn with_primary_key(mut self, field: Option<&str>) -> Self {
        self.primary_key = field.and_then(|name| self.fields.iter().position(|f| f.name == name));
        self
    }

    #[must_use]
    pub fn table_name(&self) -> &'static str {
        self.table
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDef<M>] {
        &self.fields
    }

    #[must_use]
    pub fn primary_field(&self) -> Option<&FieldDef<M>> {
        self.primary_key.and_then(|idx| self.fields.get(idx))
    }

    /// Index of the field bound to `column`: exact match first, then case-insensitive.
    #[must_use]
    pub fn field_index(&self, column: &str) -> Option<usize> {
        if let Some(&idx) = self.by_column.get(column) {
            return Some(idx);
        }
        self.fields
            .iter()
            .position(|f| f.column.eq_ignore_ascii_case(column) || f.name.eq_ignore_ascii_case(column))
    }
}

/// A struct that rows can be materialized into.
///
/// Usually implemented through [`model!`](crate::model!) rather than by hand.
pub trait Model: Default + Send + 'static {
    /// Schema shared by every instance of the type.
    fn schema() -> &'static Schema<Self>;

    /// Hook run on every materialized value once a query succeeds. No-op unless overridden.
    ///
    /// # Errors
    ///
    /// Whatever the hook reports; it is recorded as `QueryError::Hook`.
    fn after_find(&mut self) -> Result<(), HookError> {
        Ok(())
    }
}

/// Post-query hook for models registered with `#[after_find]` in [`model!`](crate::model!).
pub trait AfterFind {
    /// # Errors
    ///
    /// Any error the hook wants surfaced to the caller.
    fn after_find(&mut self) -> Result<(), HookError>;
}

/// Implement [`Model`] for an existing struct.
///
/// Columns default to the field name; `=> "column"` overrides it. `primary_key` marks the
/// first field as the primary key, and a leading `#[after_find]` routes the post-query hook to
/// the type's [`AfterFind`] impl.
///
/// ```rust
/// #[derive(Debug, Default)]
/// struct User {
///     id: i64,
///     name: String,
///     email: Option<String>,
/// }
///
/// sql_materialize::model! {
///     User in "users" {
///         primary_key id,
///         name,
///         email => "email_address",
///     }
/// }
/// ```
#[macro_export]
macro_rules! model {
    (@column $field:ident) => {
        stringify!($field)
    };
    (@column $field:ident => $col:literal) => {
        $col
    };
    (@impl $model:ty, $table:literal, $pk:expr, [$($hook:ident)?], $([$field:ident $(=> $col:literal)?])*) => {
        impl $crate::model::Model for $model {
            fn schema() -> &'static $crate::model::Schema<Self> {
                static SCHEMA: ::std::sync::OnceLock<$crate::model::Schema<$model>> =
                    ::std::sync::OnceLock::new();
                SCHEMA.get_or_init(|| {
                    $crate::model::Schema::new(
                        $table,
                        vec![
                            $(
                                $crate::model::FieldDef::new(
                                    stringify!($field),
                                    $crate::model!(@column $field $(=> $col)?),
                                    |m: &mut $model,
                                     v: &$crate::types::RowValues|
                                     -> Result<(), $crate::error::FieldError> {
                                        m.$field = $crate::types::FromRowValue::from_row_value(v)?;
                                        Ok(())
                                    },
                                ),
                            )*
                        ],
                    )
                    .with_primary_key($pk)
                })
            }

            $(
                fn after_find(&mut self) -> Result<(), $crate::model::HookError> {
                    $crate::model::AfterFind::$hook(self)
                }
            )?
        }
    };
    (
        $(#[$hook:ident])?
        $model:ident in $table:literal {
            primary_key $pk:ident $(=> $pkcol:literal)?
            $(, $field:ident $(=> $col:literal)?)* $(,)?
        }
    ) => {
        $crate::model!(
            @impl $model, $table, Some(stringify!($pk)), [$($hook)?],
            [$pk $(=> $pkcol)?] $([$field $(=> $col)?])*
        );
    };
    (
        $(#[$hook:ident])?
        $model:ident in $table:literal {
            $($field:ident $(=> $col:literal)?),* $(,)?
        }
    ) => {
        $crate::model!(
            @impl $model, $table, None, [$($hook)?],
            $([$field $(=> $col)?])*
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Account {
        id: i64,
        owner: String,
        balance: Option<f64>,
    }

    crate::model! {
        Account in "accounts" {
            primary_key id => "account_id",
            owner,
            balance => "Balance",
        }
    }

    #[derive(Debug, Default)]
    struct Tag {
        label: String,
    }

    crate::model! {
        Tag in "tags" { label }
    }

    #[test]
    fn schema_is_built_from_macro() {
        let schema = Account::schema();
        assert_eq!(schema.table_name(), "accounts");
        assert_eq!(schema.fields().len(), 3);
        let pk = schema.primary_field().expect("primary key");
        assert_eq!(pk.name, "id");
        assert_eq!(pk.column, "account_id");
        assert!(Tag::schema().primary_field().is_none());
    }

    #[test]
    fn field_lookup_falls_back_to_case_insensitive() {
        let schema = Account::schema();
        assert_eq!(schema.field_index("account_id"), Some(0));
        assert_eq!(schema.field_index("OWNER"), Some(1));
        assert_eq!(schema.field_index("balance"), Some(2));
        assert_eq!(schema.field_index("missing"), None);
    }

    #[test]
    fn setters_convert_values() {
        let schema = Account::schema();
        let mut account = Account::default();
        schema.fields()[0].assign(&mut account, &RowValues::Int(9)).unwrap();
        schema.fields()[2].assign(&mut account, &RowValues::Null).unwrap();
        assert_eq!(account.id, 9);
        assert_eq!(account.balance, None);
        assert!(schema.fields()[1].assign(&mut account, &RowValues::Null).is_err());
        assert!(account.owner.is_empty());
    }
}
