//! Generation Gateway: serialized access to the single generation backend.
//!
//! A bounded `mpsc` channel feeds one worker task. The worker takes jobs in
//! submission order and runs them one at a time, so there is never more than
//! one call in flight against the backend. Each job carries a private
//! `oneshot` sender for its result.
//!
//! # Contract
//!
//! - [`GenerationGateway::submit`] never waits for queue space: a full
//!   channel fails immediately with [`RagError::GatewayBusy`].
//! - Once enqueued, the caller waits for its own result for at most
//!   `submit_timeout`, then receives [`RagError::GenerationTimeout`]. A job
//!   whose caller gave up while it was still queued is skipped by the worker
//!   and never reaches the backend. A call already running is not aborted;
//!   when it finishes, the worker's send fails because the receiver is gone,
//!   and the result is dropped.
//! - Backend errors and panics are delivered to the caller as values. The
//!   worker keeps serving the next job.
//!
//! With capacity 1, one job can be executing while one more waits in the
//! channel; a third concurrent submission is rejected.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::backend::GenerationBackend;
use crate::error::RagError;

/// A pending unit of work, consumed exactly once by the worker.
struct GenerationJob {
    id: Uuid,
    prompt: String,
    reply: oneshot::Sender<Result<String, RagError>>,
}

#[derive(Clone)]
pub struct GenerationGateway {
    tx: mpsc::Sender<GenerationJob>,
    backend: Arc<dyn GenerationBackend>,
    submit_timeout: Duration,
}

impl GenerationGateway {
    /// Start the worker task and return a handle to its queue.
    ///
    /// Must be called from within a tokio runtime. The worker exits once
    /// every handle has been dropped.
    pub fn spawn(
        backend: Arc<dyn GenerationBackend>,
        capacity: usize,
        submit_timeout: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run_worker(backend.clone(), rx));
        tracing::info!(
            model = backend.model_name(),
            capacity = capacity.max(1),
            timeout_secs = submit_timeout.as_secs(),
            "generation gateway started"
        );
        Self {
            tx,
            backend,
            submit_timeout,
        }
    }

    /// Enqueue `prompt` and wait for its completion.
    pub async fn submit(&self, prompt: String) -> Result<String, RagError> {
        let (reply, rx) = oneshot::channel();
        let job = GenerationJob {
            id: Uuid::new_v4(),
            prompt,
            reply,
        };
        let id = job.id;

        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("generation queue full, rejecting request");
                return Err(RagError::GatewayBusy);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                return Err(RagError::Backend("generation worker stopped".into()));
            }
        }
        tracing::debug!(job = %id, "generation job enqueued");

        match tokio::time::timeout(self.submit_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RagError::Backend("generation worker dropped the job".into())),
            Err(_) => {
                tracing::warn!(
                    job = %id,
                    timeout_secs = self.submit_timeout.as_secs(),
                    "generation timed out"
                );
                Err(RagError::GenerationTimeout(self.submit_timeout))
            }
        }
    }

    /// True when the next `submit` would be rejected as busy.
    pub fn is_saturated(&self) -> bool {
        self.tx.capacity() == 0
    }

    /// Probe the backend directly; does not go through the queue.
    pub async fn backend_health(&self) -> Result<(), RagError> {
        self.backend.health().await
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}

async fn run_worker(backend: Arc<dyn GenerationBackend>, mut rx: mpsc::Receiver<GenerationJob>) {
    while let Some(job) = rx.recv().await {
        if job.reply.is_closed() {
            tracing::debug!(job = %job.id, "caller gone before start, skipping job");
            continue;
        }
        tracing::debug!(job = %job.id, "generation started");
        let started = Instant::now();
        let result = execute(backend.clone(), job.prompt).await;

        match &result {
            Ok(_) => tracing::info!(
                job = %job.id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "generation finished"
            ),
            Err(e) => tracing::error!(
                job = %job.id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "generation failed"
            ),
        }

        if job.reply.send(result).is_err() {
            tracing::debug!(job = %job.id, "caller gone, discarding result");
        }
    }
    tracing::debug!("generation worker stopped");
}

/// Run one backend call in its own task so a panic becomes an error value.
async fn execute(backend: Arc<dyn GenerationBackend>, prompt: String) -> Result<String, RagError> {
    let handle = tokio::spawn(async move { backend.generate(&prompt).await });
    match handle.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(RagError::Backend("generation task panicked".into())),
        Err(e) => Err(RagError::Backend(format!("generation task failed: {}", e))),
    }
}
