use std::any::Any;

use crate::error::QueryError;
use crate::model::Model;

/// Where materialized rows go, resolved once before any SQL is issued.
#[derive(Debug)]
pub enum Destination<'a, M> {
    /// One model value, overwritten by each row.
    Single(&'a mut M),
    /// Growable sequence; one fresh element per row.
    Sequence(&'a mut Vec<M>),
    /// Growable sequence of boxed elements; one fresh allocation per row.
    BoxedSequence(&'a mut Vec<Box<M>>),
}

impl<'a, M: Model> Destination<'a, M> {
    /// Resolve a type-erased value into a destination for `M`.
    ///
    /// Accepts `M`, `Vec<M>` and `Vec<Box<M>>`.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::UnsupportedDestination` for any other type.
    pub fn from_any(value: &'a mut dyn Any) -> Result<Self, QueryError> {
        if value.is::<Vec<M>>() {
            return value
                .downcast_mut::<Vec<M>>()
                .map(Destination::Sequence)
                .ok_or(QueryError::UnsupportedDestination);
        }
        if value.is::<Vec<Box<M>>>() {
            return value
                .downcast_mut::<Vec<Box<M>>>()
                .map(Destination::BoxedSequence)
                .ok_or(QueryError::UnsupportedDestination);
        }
        value
            .downcast_mut::<M>()
            .map(Destination::Single)
            .ok_or(QueryError::UnsupportedDestination)
    }
}

impl<M> Destination<'_, M> {
    /// Borrow the same target for a shorter lifetime.
    pub fn reborrow(&mut self) -> Destination<'_, M> {
        match self {
            Destination::Single(value) => Destination::Single(&mut **value),
            Destination::Sequence(items) => Destination::Sequence(&mut **items),
            Destination::BoxedSequence(items) => Destination::BoxedSequence(&mut **items),
        }
    }

    #[must_use]
    pub fn is_sequence(&self) -> bool {
        !matches!(self, Destination::Single(_))
    }

    /// Drop existing elements of a sequence destination. Capacity is kept.
    pub fn reset(&mut self) {
        match self {
            Destination::Single(_) => {}
            Destination::Sequence(items) => items.clear(),
            Destination::BoxedSequence(items) => items.clear(),
        }
    }

    /// Visit every held value in order.
    pub(crate) fn try_for_each_mut<E>(
        &mut self,
        mut f: impl FnMut(&mut M) -> Result<(), E>,
    ) -> Result<(), E> {
        match self {
            Destination::Single(value) => f(&mut **value),
            Destination::Sequence(items) => items.iter_mut().try_for_each(f),
            Destination::BoxedSequence(items) => items.iter_mut().try_for_each(|b| f(&mut **b)),
        }
    }
}
