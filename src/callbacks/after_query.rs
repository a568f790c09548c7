use crate::destination::Destination;
use crate::error::QueryError;
use crate::model::Model;
use crate::scope::{Scope, keys};

use super::QueryChain;

impl QueryChain {
    /// Run [`Model::after_find`] on every materialized value.
    ///
    /// Does nothing if the scope already holds an error. Values are visited in destination
    /// order and dispatch stops at the first hook that fails.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Hook` with the failing hook's message, or
    /// `QueryError::UnsupportedDestination` if an override destination has the wrong type.
    pub fn after_query_callback<M: Model>(
        &self,
        scope: &mut Scope,
        mut destination: Destination<'_, M>,
    ) -> Result<(), QueryError> {
        if scope.has_error() {
            return Ok(());
        }

        match scope.remove(keys::QUERY_DESTINATION) {
            Some(mut value) => {
                let result = Destination::<M>::from_any(value.as_mut())
                    .and_then(|mut dest| dispatch_after_find(&mut dest));
                scope.set_boxed(keys::QUERY_DESTINATION, value);
                result
            }
            None => dispatch_after_find(&mut destination),
        }
    }
}

fn dispatch_after_find<M: Model>(dest: &mut Destination<'_, M>) -> Result<(), QueryError> {
    dest.try_for_each_mut(|value| {
        value
            .after_find()
            .map_err(|e| QueryError::Hook(e.to_string()))
    })
}
