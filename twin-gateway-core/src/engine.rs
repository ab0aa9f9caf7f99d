//! Single-worker command execution engine.
//!
//! Every twin read and write runs as a command on one worker task, so
//! commands observe and mutate the twin strictly one at a time, in submission
//! order. Submitting returns a [`CommandFuture`] immediately; awaiting it
//! yields the command's result once the worker has run it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use twin_gateway_error::{TGError, TGResult};
use twin_gateway_models::{GatewayMetrics, Settings, TwinEvent};

use crate::session::NotificationHub;
use crate::twin::model::ModelRegistry;
use crate::twin::{Resource, ResourcePath, TwinStore};

/// State owned exclusively by the worker task.
struct EngineState {
    twin: TwinStore,
    models: ModelRegistry,
    /// Events emitted by the running command, fanned out after it completes.
    events: Vec<TwinEvent>,
}

/// Twin-scoped view handed to [`CommandEngine::submit`] closures.
pub struct TwinTxn<'a> {
    pub twin: &'a mut TwinStore,
    pub events: &'a mut Vec<TwinEvent>,
}

impl TwinTxn<'_> {
    #[inline]
    pub fn emit(&mut self, event: TwinEvent) {
        self.events.push(event);
    }
}

/// Model-aware view handed to [`CommandEngine::submit_model_aware`] closures.
pub struct ModelTxn<'a> {
    pub twin: &'a mut TwinStore,
    pub models: &'a mut ModelRegistry,
    pub events: &'a mut Vec<TwinEvent>,
}

impl ModelTxn<'_> {
    #[inline]
    pub fn emit(&mut self, event: TwinEvent) {
        self.events.push(event);
    }
}

type Job = Box<dyn FnOnce(&mut EngineState) + Send + 'static>;

/// Handle to a submitted command's eventual result.
///
/// Resolves with [`TGError::EngineClosed`] if the engine shut down before the
/// command could run.
pub struct CommandFuture<T> {
    rx: oneshot::Receiver<TGResult<T>>,
}

impl<T> Future for CommandFuture<T> {
    type Output = TGResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(TGError::EngineClosed),
        })
    }
}

/// The serialized command executor.
pub struct CommandEngine {
    tx: mpsc::Sender<Job>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown_timeout: Duration,
    metrics: Arc<GatewayMetrics>,
}

impl CommandEngine {
    /// Spawn the worker task and return the engine handle.
    pub fn start(
        settings: &Settings,
        hub: Arc<NotificationHub>,
        metrics: Arc<GatewayMetrics>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel::<Job>(settings.engine.queue_capacity);
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(Self::worker_loop(
            rx,
            cancel.clone(),
            hub,
            Arc::clone(&metrics),
        ));
        Arc::new(Self {
            tx,
            cancel,
            worker: Mutex::new(Some(worker)),
            shutdown_timeout: Duration::from_millis(settings.engine.shutdown_timeout_ms),
            metrics,
        })
    }

    async fn worker_loop(
        mut rx: mpsc::Receiver<Job>,
        cancel: CancellationToken,
        hub: Arc<NotificationHub>,
        metrics: Arc<GatewayMetrics>,
    ) {
        info!("⚙️ Command engine worker started");
        let mut state = EngineState {
            twin: TwinStore::new(),
            models: ModelRegistry::new(),
            events: Vec::new(),
        };
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Refuse new submissions, then drain what was already queued.
                    rx.close();
                    let mut drained = 0usize;
                    while let Some(job) = rx.recv().await {
                        Self::run_job(&mut state, job, &hub, &metrics);
                        drained += 1;
                    }
                    debug!(drained, "Command engine drained on shutdown");
                    break;
                }
                job = rx.recv() => match job {
                    Some(job) => Self::run_job(&mut state, job, &hub, &metrics),
                    None => break,
                },
            }
        }
        info!("⚙️ Command engine worker stopped");
    }

    fn run_job(
        state: &mut EngineState,
        job: Job,
        hub: &NotificationHub,
        metrics: &GatewayMetrics,
    ) {
        job(state);
        GatewayMetrics::incr(&metrics.commands_executed);
        // Fan out synchronously between commands: listeners observe a twin no
        // later command has touched yet.
        if !state.events.is_empty() {
            let events = std::mem::take(&mut state.events);
            for event in &events {
                hub.notify(event);
            }
        }
    }

    async fn enqueue(&self, job: Job) {
        if self.tx.send(job).await.is_err() {
            // Dropping the job drops its oneshot sender, so the caller's
            // future resolves with EngineClosed.
            warn!("Command rejected: engine queue is closed");
        }
    }

    /// Submit a twin-scoped command.
    pub async fn submit<T, F>(&self, f: F) -> CommandFuture<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut TwinTxn<'_>) -> TGResult<T> + Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        self.enqueue(Box::new(move |state| {
            let mut txn = TwinTxn {
                twin: &mut state.twin,
                events: &mut state.events,
            };
            let _ = done.send(f(&mut txn));
        }))
        .await;
        CommandFuture { rx }
    }

    /// Submit a command scoped to a single resource.
    ///
    /// Resolves `Ok(None)` without invoking the closure when the path does not
    /// name an existing resource.
    pub async fn submit_resource<T, F>(&self, path: ResourcePath, f: F) -> CommandFuture<Option<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut Resource) -> TGResult<T> + Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        self.enqueue(Box::new(move |state| {
            let result = match state.twin.resource_mut(&path) {
                Some(resource) => f(resource).map(Some),
                None => Ok(None),
            };
            let _ = done.send(result);
        }))
        .await;
        CommandFuture { rx }
    }

    /// Submit a command that also needs the model registry.
    pub async fn submit_model_aware<T, F>(&self, f: F) -> CommandFuture<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut ModelTxn<'_>) -> TGResult<T> + Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        self.enqueue(Box::new(move |state| {
            let mut txn = ModelTxn {
                twin: &mut state.twin,
                models: &mut state.models,
                events: &mut state.events,
            };
            let _ = done.send(f(&mut txn));
        }))
        .await;
        CommandFuture { rx }
    }

    #[inline]
    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    /// Stop accepting commands, drain the queue, and join the worker.
    pub async fn stop(&self) -> TGResult<()> {
        self.cancel.cancel();
        let handle = self.worker.lock().await.take();
        let Some(handle) = handle else {
            return Ok(());
        };
        match tokio::time::timeout(self.shutdown_timeout, handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TGError::JoinError(e)),
            Err(_) => Err(TGError::ShutdownError(
                "command engine worker did not drain in time".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionRegistry;
    use twin_gateway_models::{ResourceKind, TimedValue, TwinValue};

    fn test_engine() -> Arc<CommandEngine> {
        let settings = Settings::default();
        let metrics = Arc::new(GatewayMetrics::default());
        let sessions = Arc::new(SessionRegistry::new(&settings, Arc::clone(&metrics)));
        let hub = Arc::new(NotificationHub::new(sessions, Arc::clone(&metrics)));
        CommandEngine::start(&settings, hub, metrics)
    }

    #[tokio::test]
    async fn commands_run_in_submission_order() {
        let engine = test_engine();
        let mut futures = Vec::new();
        for i in 0..10i64 {
            let fut = engine
                .submit(move |txn| {
                    let path = ResourcePath::new("m", "p", "s", "seq");
                    let (res, _) = txn.twin.ensure_path(&path, ResourceKind::Data, None);
                    res.value = TimedValue::now(TwinValue::Int64(i));
                    Ok(i)
                })
                .await;
            futures.push(fut);
        }
        for (i, fut) in futures.into_iter().enumerate() {
            assert_eq!(fut.await.unwrap(), i as i64);
        }
        // Last writer wins under FIFO execution.
        let value = engine
            .submit(|txn| {
                Ok(txn
                    .twin
                    .resource(&ResourcePath::new("m", "p", "s", "seq"))
                    .and_then(|r| r.value.value.clone()))
            })
            .await
            .await
            .unwrap();
        assert_eq!(value, Some(TwinValue::Int64(9)));
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn resource_command_resolves_none_for_missing_path() {
        let engine = test_engine();
        let got = engine
            .submit_resource(ResourcePath::new("m", "ghost", "s", "r"), |res| {
                Ok(res.value.clone())
            })
            .await
            .await
            .unwrap();
        assert!(got.is_none());
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn failing_command_does_not_poison_the_worker() {
        let engine = test_engine();
        let failed: TGResult<()> = engine
            .submit(|_| Err(TGError::from("deliberate failure")))
            .await
            .await;
        assert!(failed.is_err());

        let ok = engine.submit(|_| Ok(41 + 1)).await.await.unwrap();
        assert_eq!(ok, 42);
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn submit_after_stop_resolves_engine_closed() {
        let engine = test_engine();
        engine.stop().await.unwrap();
        let result: TGResult<()> = engine.submit(|_| Ok(())).await.await;
        assert!(matches!(result, Err(TGError::EngineClosed)));
    }
}
