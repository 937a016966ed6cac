//! The pipeline: an ordered list of registered features bound to a backend.
//!
//! Every `execute` builds a fresh [`Builder`], so one [`Endpoint`] can serve
//! many requests concurrently through `&self`.

use crate::backend::Backend;
use crate::error::{FacetError, Result};
use crate::feature::Feature;
use crate::query::builder::Builder;
use crate::query::QueryDescription;
use crate::request::Request;
use crate::response::ResponseAssembler;
use crate::settings::EndpointSettings;
use crate::types::Response;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Per-call execution context: an optional deadline for the backend round
/// trip and an optional cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct Context {
    timeout: Option<Duration>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Cancels every [`Context`] created from it.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context plus the handle that cancels it.
    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Context {
            timeout: None,
            cancel: Some(rx),
        };
        (ctx, CancelHandle { tx })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the context is cancelled; never resolves otherwise.
    async fn cancelled(&self) {
        if let Some(mut rx) = self.cancel.clone() {
            if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

async fn with_deadline<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| FacetError::Timeout(limit))?,
        None => fut.await,
    }
}

#[derive(Debug)]
pub struct Endpoint {
    backend: Backend,
    settings: EndpointSettings,
    features: Vec<Feature>,
    assembler: ResponseAssembler,
}

impl Endpoint {
    pub fn new(backend: impl Into<Backend>, settings: EndpointSettings) -> Self {
        Endpoint {
            backend: backend.into(),
            settings,
            features: Vec::new(),
            assembler: ResponseAssembler::new(),
        }
    }

    pub fn settings(&self) -> &EndpointSettings {
        &self.settings
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Append features. The whole batch is checked against the features
    /// already registered before any of it is kept.
    ///
    /// # Errors
    ///
    /// [`FacetError::DuplicateAggregation`] for the first aggregation name
    /// claimed by two features. The endpoint is left unchanged.
    pub fn register(&mut self, features: impl IntoIterator<Item = Feature>) -> Result<()> {
        let added: Vec<Feature> = features.into_iter().collect();

        let mut probe = Builder::new(self.settings.limits());
        let empty = Request::default();
        for feature in self.features.iter().chain(added.iter()) {
            feature.apply(&empty, &mut probe)?;
        }

        tracing::debug!(
            "[REGISTER] added={} total={}",
            added.len(),
            self.features.len() + added.len()
        );
        self.features.extend(added);
        Ok(())
    }

    /// Build the query for `request` without running it.
    pub fn build_query(&self, request: &Request) -> Result<QueryDescription> {
        let mut builder = Builder::new(self.settings.limits());
        for feature in &self.features {
            feature.apply(request, &mut builder)?;
        }
        Ok(builder.build())
    }

    /// Apply every feature to `request`, run the query, and decode the result.
    ///
    /// The backend call is raced against `ctx`: cancellation yields
    /// [`FacetError::Cancelled`], an elapsed deadline [`FacetError::Timeout`].
    pub async fn execute(&self, ctx: &Context, request: &Request) -> Result<Response> {
        let t0 = Instant::now();
        let query = self.build_query(request)?;
        let t_build = t0.elapsed();

        let search = self.backend.search(&self.settings.indices, &query);
        let raw = tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                tracing::debug!("[EXEC] cancelled after {:?}", t0.elapsed());
                return Err(FacetError::Cancelled);
            }
            result = with_deadline(ctx.timeout(), search) => result?,
        };
        let t_search = t0.elapsed();

        let response = self.assembler.assemble(raw, &query)?;
        tracing::debug!(
            "[EXEC] backend={} params={} build={:?} search={:?} assemble={:?} total={}",
            self.backend.name(),
            request.len(),
            t_build,
            t_search.saturating_sub(t_build),
            t0.elapsed().saturating_sub(t_search),
            response.total
        );
        Ok(response)
    }
}
