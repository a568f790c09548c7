// SQLite backend for the query stage
//
// - params: conversion from middleware values to rusqlite values
// - query: row extraction and cursor building
// - executor: the `QueryExecutor` implementation

pub mod executor;
pub mod params;
pub mod query;

pub use executor::SqliteExecutor;
pub use params::Params as SqliteParams;
pub use query::{build_cursor, sqlite_extract_value_sync};
