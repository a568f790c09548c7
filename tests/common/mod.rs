#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sql_materialize::prelude::*;
use sql_materialize::{Span, SpanId};

/// Scripted executor that records every statement it receives.
#[derive(Default)]
pub struct FakeExecutor {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RowValues>>,
    /// Returned by the cursor after all rows were produced.
    pub terminal_error: Option<String>,
    /// Returned by `query` instead of a cursor.
    pub execute_error: Option<String>,
    /// Cursor blocks forever after this many rows.
    pub hang_after: Option<usize>,
    /// Cursor panics after this many rows.
    pub panic_after: Option<usize>,
    pub calls: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub statements: Arc<Mutex<Vec<(String, Vec<RowValues>)>>>,
}

impl FakeExecutor {
    pub fn with_rows(columns: &[&str], rows: Vec<Vec<RowValues>>) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn last_sql(&self) -> Option<String> {
        self.statements
            .lock()
            .unwrap()
            .last()
            .map(|(sql, _)| sql.clone())
    }

    pub fn last_params(&self) -> Vec<RowValues> {
        self.statements
            .lock()
            .unwrap()
            .last()
            .map(|(_, p)| p.clone())
            .unwrap_or_default()
    }
}

struct FakeCursor {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<RowValues>>,
    terminal_error: Option<String>,
    hang_after: Option<usize>,
    panic_after: Option<usize>,
    produced: usize,
    closed: Arc<AtomicUsize>,
    is_closed: AtomicBool,
}

#[async_trait]
impl Cursor for FakeCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, DriverError> {
        if self.hang_after == Some(self.produced) {
            std::future::pending::<()>().await;
        }
        if self.panic_after == Some(self.produced) {
            panic!("cursor failed hard after {} rows", self.produced);
        }
        match self.rows.next() {
            Some(row) => {
                self.produced += 1;
                Ok(Some(row))
            }
            None => match self.terminal_error.take() {
                Some(msg) => Err(DriverError::Other(msg)),
                None => Ok(None),
            },
        }
    }

    fn close(&mut self) {
        if !self.is_closed.swap(true, Ordering::SeqCst) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl QueryExecutor for FakeExecutor {
    async fn query(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn Cursor>, DriverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        if let Some(msg) = &self.execute_error {
            return Err(DriverError::Other(msg.clone()));
        }
        Ok(Box::new(FakeCursor {
            columns: self.columns.clone(),
            rows: self.rows.clone().into_iter(),
            terminal_error: self.terminal_error.clone(),
            hang_after: self.hang_after,
            panic_after: self.panic_after,
            produced: 0,
            closed: Arc::clone(&self.closed),
            is_closed: AtomicBool::new(false),
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub id: SpanId,
    pub parent: Option<SpanId>,
    pub name: String,
    pub tags: Vec<(String, String)>,
    pub finish_count: usize,
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub spans: Vec<SpanRecord>,
    /// `start:<name>` / `finish:<name>` in the order they happened.
    pub events: Vec<String>,
}

/// Tracer that keeps every span it hands out.
#[derive(Clone, Default)]
pub struct RecordingTracer {
    pub recorded: Arc<Mutex<Recorded>>,
}

struct RecordingSpan {
    idx: usize,
    id: SpanId,
    recorded: Arc<Mutex<Recorded>>,
}

impl Span for RecordingSpan {
    fn id(&self) -> Option<SpanId> {
        Some(self.id)
    }

    fn set_tag(&mut self, key: &str, value: &str) {
        let mut rec = self.recorded.lock().unwrap();
        rec.spans[self.idx]
            .tags
            .push((key.to_string(), value.to_string()));
    }

    fn finish(self: Box<Self>) {
        let mut rec = self.recorded.lock().unwrap();
        rec.spans[self.idx].finish_count += 1;
        let name = rec.spans[self.idx].name.clone();
        rec.events.push(format!("finish:{name}"));
    }
}

impl Tracer for RecordingTracer {
    fn start_span(&self, parent: Option<SpanId>, name: &str) -> Box<dyn Span> {
        let mut rec = self.recorded.lock().unwrap();
        let idx = rec.spans.len();
        let id = SpanId(idx as u64 + 1);
        rec.spans.push(SpanRecord {
            id,
            parent,
            name: name.to_string(),
            tags: Vec::new(),
            finish_count: 0,
        });
        rec.events.push(format!("start:{name}"));
        Box::new(RecordingSpan {
            idx,
            id,
            recorded: Arc::clone(&self.recorded),
        })
    }
}

impl RecordingTracer {
    pub fn context(&self) -> TraceContext {
        TraceContext::new(Arc::new(self.clone()))
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.recorded.lock().unwrap().spans.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.recorded.lock().unwrap().events.clone()
    }

    pub fn span(&self, name: &str) -> Option<SpanRecord> {
        self.spans().into_iter().find(|s| s.name == name)
    }

    /// Every started span was finished exactly once.
    pub fn all_finished_once(&self) -> bool {
        self.spans().iter().all(|s| s.finish_count == 1)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Widget {
    pub id: i64,
    pub name: String,
}

sql_materialize::model! {
    Widget in "widgets" {
        primary_key id,
        name,
    }
}

pub fn widget_rows(rows: &[(i64, &str)]) -> Vec<Vec<RowValues>> {
    rows.iter()
        .map(|(id, name)| vec![RowValues::Int(*id), RowValues::Text((*name).to_string())])
        .collect()
}
