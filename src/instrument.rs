//! Span instrumentation for the query stage.
//!
//! Spans are opaque handles produced by a [`Tracer`]. The stage only starts, tags and finishes
//! them; it never reads anything back, so swapping the tracer cannot change query results.
//! [`LogTracer`] forwards spans to the `tracing` crate and [`NoopTracer`] discards them.

use std::future::Future;
use std::num::NonZeroU64;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::DriverError;

/// Opaque span identifier used to parent child spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(pub u64);

/// A started span.
pub trait Span: Send {
    /// Identifier children are parented to, if the backend assigns one.
    fn id(&self) -> Option<SpanId>;

    fn set_tag(&mut self, key: &str, value: &str);

    /// Close the span. Called exactly once per span.
    fn finish(self: Box<Self>);
}

/// Span factory.
pub trait Tracer: Send + Sync {
    fn start_span(&self, parent: Option<SpanId>, name: &str) -> Box<dyn Span>;
}

/// Tracer that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

struct NoopSpan;

impl Span for NoopSpan {
    fn id(&self) -> Option<SpanId> {
        None
    }

    fn set_tag(&mut self, _key: &str, _value: &str) {}

    fn finish(self: Box<Self>) {}
}

impl Tracer for NoopTracer {
    fn start_span(&self, _parent: Option<SpanId>, _name: &str) -> Box<dyn Span> {
        Box::new(NoopSpan)
    }
}

/// Tracer backed by `tracing` spans.
///
/// Root spans inherit the caller's current `tracing` span. Without an installed subscriber the
/// spans are disabled and cost next to nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

struct LogSpan {
    span: tracing::Span,
}

impl Span for LogSpan {
    fn id(&self) -> Option<SpanId> {
        self.span.id().map(|id| SpanId(id.into_u64()))
    }

    fn set_tag(&mut self, key: &str, value: &str) {
        // undeclared keys are dropped by `record`, so also emit them as an event
        self.span.record(key, value);
        tracing::debug!(parent: &self.span, tag = key, value);
    }

    fn finish(self: Box<Self>) {
        drop(self.span);
    }
}

impl Tracer for LogTracer {
    fn start_span(&self, parent: Option<SpanId>, name: &str) -> Box<dyn Span> {
        let span = match parent.and_then(|p| NonZeroU64::new(p.0)) {
            Some(id) => tracing::debug_span!(
                parent: Some(tracing::Id::from_non_zero_u64(id)),
                "orm_query",
                otel.name = name,
                rows.err = tracing::field::Empty,
                error = tracing::field::Empty
            ),
            None => tracing::debug_span!(
                "orm_query",
                otel.name = name,
                rows.err = tracing::field::Empty,
                error = tracing::field::Empty
            ),
        };
        Box::new(LogSpan { span })
    }
}

/// Parent span, tracer and optional cancellation for one operation.
///
/// Attach it to a scope under [`keys::TRACE_CONTEXT`](crate::scope::keys::TRACE_CONTEXT) to
/// parent the stage's spans under your own.
#[derive(Clone)]
pub struct TraceContext {
    tracer: Arc<dyn Tracer>,
    parent: Option<SpanId>,
    cancel: Option<CancellationToken>,
}

impl TraceContext {
    #[must_use]
    pub fn new(tracer: Arc<dyn Tracer>) -> Self {
        Self {
            tracer,
            parent: None,
            cancel: None,
        }
    }

    /// Context whose spans are all no-ops.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopTracer))
    }

    /// Parent new spans under `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: Option<SpanId>) -> Self {
        self.parent = parent;
        self
    }

    /// Cancel in-flight execution and scanning when `token` fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub fn parent(&self) -> Option<SpanId> {
        self.parent
    }

    #[must_use]
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// Start a span under this context and return it with the context for its children.
    #[must_use]
    pub fn start_span(&self, name: &str) -> (SpanGuard, TraceContext) {
        let span = self.tracer.start_span(self.parent, name);
        let child = TraceContext {
            tracer: Arc::clone(&self.tracer),
            parent: span.id(),
            cancel: self.cancel.clone(),
        };
        (SpanGuard { span: Some(span) }, child)
    }

    /// Await `fut`, giving up with `DriverError::Cancelled` if the context is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns the future's own error, or `DriverError::Cancelled`.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, DriverError>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => Err(DriverError::Cancelled),
                    res = fut => res,
                }
            }
            None => fut.await,
        }
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::noop()
    }
}

impl std::fmt::Debug for TraceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceContext")
            .field("parent", &self.parent)
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

/// Owns a started span and finishes it exactly once, on [`finish`](Self::finish) or on drop.
pub struct SpanGuard {
    span: Option<Box<dyn Span>>,
}

impl SpanGuard {
    pub fn set_tag(&mut self, key: &str, value: &str) {
        if let Some(span) = self.span.as_mut() {
            span.set_tag(key, value);
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<SpanId> {
        self.span.as_ref().and_then(|s| s.id())
    }

    pub fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(span) = self.span.take() {
            span.finish();
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SpanGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanGuard")
            .field("open", &self.span.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Counting {
        started: Mutex<Vec<(String, Option<SpanId>)>>,
        finished: Arc<Mutex<usize>>,
    }

    struct CountingSpan {
        id: SpanId,
        finished: Arc<Mutex<usize>>,
    }

    impl Span for CountingSpan {
        fn id(&self) -> Option<SpanId> {
            Some(self.id)
        }

        fn set_tag(&mut self, _key: &str, _value: &str) {}

        fn finish(self: Box<Self>) {
            *self.finished.lock().unwrap() += 1;
        }
    }

    impl Tracer for Counting {
        fn start_span(&self, parent: Option<SpanId>, name: &str) -> Box<dyn Span> {
            let mut started = self.started.lock().unwrap();
            started.push((name.to_string(), parent));
            Box::new(CountingSpan {
                id: SpanId(started.len() as u64),
                finished: Arc::clone(&self.finished),
            })
        }
    }

    #[test]
    fn guard_finishes_once_and_parents_children() {
        let tracer = Arc::new(Counting::default());
        let ctx = TraceContext::new(tracer.clone());

        let (root, root_ctx) = ctx.start_span("root");
        let (child, _) = root_ctx.start_span("child");
        child.finish();
        drop(root);

        let started = tracer.started.lock().unwrap();
        assert_eq!(started[0], ("root".to_string(), None));
        assert_eq!(started[1], ("child".to_string(), Some(SpanId(1))));
        assert_eq!(*tracer.finished.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = TraceContext::noop().with_cancellation(token);
        let res: Result<(), DriverError> = ctx
            .run(async {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        assert!(matches!(res, Err(DriverError::Cancelled)));
    }
}
