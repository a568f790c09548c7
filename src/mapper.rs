//! Column-to-field resolution for one statement.
//!
//! The plan is resolved once from the cursor's column names and then applied to every row,
//! so per-row work is a slice walk with no name lookups.

use crate::error::DriverError;
use crate::model::{FieldDef, Schema};
use crate::types::RowValues;

/// Field binding per result column, in column order. `None` marks a column with no field.
pub struct ColumnPlan<'s, M> {
    columns: Vec<String>,
    slots: Vec<Option<&'s FieldDef<M>>>,
}

impl<'s, M> ColumnPlan<'s, M> {
    /// Bind each column to a field of `schema`.
    ///
    /// Unknown columns are skipped. When two columns resolve to the same field the first one
    /// keeps it and the later one is skipped.
    #[must_use]
    pub fn resolve(schema: &'s Schema<M>, columns: &[String]) -> Self {
        let mut claimed = vec![false; schema.fields().len()];
        let slots = columns
            .iter()
            .map(|column| {
                let idx = schema.field_index(column)?;
                if claimed[idx] {
                    return None;
                }
                claimed[idx] = true;
                schema.fields().get(idx)
            })
            .collect();

        Self {
            columns: columns.to_vec(),
            slots,
        }
    }

    /// Number of columns that map to a field.
    #[must_use]
    pub fn mapped_len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Assign the row's values into `target`.
    ///
    /// Values beyond the column list are ignored; a short row leaves the remaining fields as
    /// they are.
    ///
    /// # Errors
    ///
    /// Returns `DriverError::Field` for the first value that does not convert. Fields assigned
    /// before it keep their new values.
    pub fn apply(&self, target: &mut M, row: &[RowValues]) -> Result<(), DriverError> {
        for ((slot, value), column) in self.slots.iter().zip(row).zip(&self.columns) {
            if let Some(field) = slot {
                field
                    .assign(target, value)
                    .map_err(|source| DriverError::Field {
                        column: column.clone(),
                        source,
                    })?;
            }
        }
        Ok(())
    }
}

impl<M> std::fmt::Debug for ColumnPlan<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnPlan")
            .field("columns", &self.columns)
            .field("mapped", &self.mapped_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        id: i64,
        name: String,
        nickname: Option<String>,
    }

    crate::model! {
        Person in "people" {
            primary_key id,
            name,
            nickname,
        }
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn maps_by_name_not_position() {
        let plan = ColumnPlan::resolve(Person::schema(), &cols(&["name", "extra", "id"]));
        assert_eq!(plan.mapped_len(), 2);

        let mut person = Person::default();
        plan.apply(
            &mut person,
            &[
                RowValues::Text("ada".into()),
                RowValues::Int(99),
                RowValues::Int(7),
            ],
        )
        .unwrap();
        assert_eq!(
            person,
            Person {
                id: 7,
                name: "ada".into(),
                nickname: None,
            }
        );
    }

    #[test]
    fn duplicate_columns_keep_first_binding() {
        let plan = ColumnPlan::resolve(Person::schema(), &cols(&["id", "ID"]));
        assert_eq!(plan.mapped_len(), 1);

        let mut person = Person::default();
        plan.apply(&mut person, &[RowValues::Int(1), RowValues::Int(2)])
            .unwrap();
        assert_eq!(person.id, 1);
    }

    #[test]
    fn conversion_failure_names_the_column() {
        let plan = ColumnPlan::resolve(Person::schema(), &cols(&["id", "name"]));
        let mut person = Person::default();
        let err = plan
            .apply(&mut person, &[RowValues::Int(3), RowValues::Null])
            .unwrap_err();
        match err {
            DriverError::Field { column, .. } => assert_eq!(column, "name"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(person.id, 3);
    }
}
