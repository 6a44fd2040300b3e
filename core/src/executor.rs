//! Asynchronous execution of a single request.
//!
//! # Design
//! A `RequestExecutor` owns at most one in-flight task and moves through
//! `Idle → Running → {Completed | Failed | Cancelled}`; terminal states are
//! final. The task runs on the tokio runtime that called `execute` and
//! drives the transport: headers first, then body chunks in delivery order,
//! then completion.
//!
//! Every terminal outcome goes through `Shared::emit`, which flips the state
//! under the executor's lock, takes the callbacks exactly once and notifies
//! the observers. `cancel` takes the same lock, so whichever of completion
//! and cancellation gets there first decides the outcome; the loser is
//! dropped silently.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::BytesMut;
use futures::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{Error, ExecuteError};
use crate::http::{HttpRequest, RawResponse};
use crate::timeline::ClockTimeline;
use crate::transport::{Connector, ReqwestConnector, TransportResponse};

/// Lifecycle of an executor's task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Cancelled)
    }
}

/// Receives lifecycle notifications alongside the per-call callbacks.
pub trait ExecutorObserver: Send + Sync {
    fn on_finished(&self) {}

    fn on_failed(&self, _error: &Error) {}

    fn on_cancelled(&self) {}
}

/// Terminal result of `RequestExecutor::send`.
#[derive(Debug)]
pub enum Outcome {
    Completed(RawResponse),
    Failed(Error),
    Cancelled,
}

type SuccessFn = Box<dyn FnOnce(RawResponse) + Send>;
type FailureFn = Box<dyn FnOnce(Error) + Send>;

struct Callbacks {
    on_success: SuccessFn,
    on_failure: FailureFn,
}

enum Event {
    Finished(RawResponse),
    Failed(Error),
}

struct Inner {
    state: TaskState,
    callbacks: Option<Callbacks>,
    request: Option<Arc<HttpRequest>>,
    abort: Option<AbortHandle>,
    observers: Vec<Arc<dyn ExecutorObserver>>,
}

struct Shared {
    id: Uuid,
    inner: Mutex<Inner>,
    paused: watch::Sender<bool>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: Event) {
        let (callbacks, observers) = {
            let mut inner = self.lock();
            if inner.state != TaskState::Running {
                tracing::debug!(task_id = %self.id, state = ?inner.state, "suppressing late transport signal");
                return;
            }
            inner.state = match event {
                Event::Finished(_) => TaskState::Completed,
                Event::Failed(_) => TaskState::Failed,
            };
            inner.abort = None;
            inner.request = None;
            self.paused.send_replace(false);
            (inner.callbacks.take(), inner.observers.clone())
        };

        match event {
            Event::Finished(response) => {
                for observer in &observers {
                    observer.on_finished();
                }
                if let Some(callbacks) = callbacks {
                    (callbacks.on_success)(response);
                }
            }
            Event::Failed(error) => {
                for observer in &observers {
                    observer.on_failed(&error);
                }
                if let Some(callbacks) = callbacks {
                    (callbacks.on_failure)(error);
                }
            }
        }
    }
}

/// Runs one request against a transport and reports its outcome.
pub struct RequestExecutor {
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
}

impl Default for RequestExecutor {
    fn default() -> Self {
        Self::new(ReqwestConnector)
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl RequestExecutor {
    pub fn new(connector: impl Connector + 'static) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            connector: Arc::new(connector),
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                inner: Mutex::new(Inner {
                    state: TaskState::Idle,
                    callbacks: None,
                    request: None,
                    abort: None,
                    observers: Vec::new(),
                }),
                paused,
            }),
        }
    }

    /// Identifier used in this executor's log events.
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn state(&self) -> TaskState {
        self.shared.lock().state
    }

    pub fn is_suspended(&self) -> bool {
        *self.shared.paused.borrow()
    }

    /// The request of the running task, if any.
    pub fn request(&self) -> Option<Arc<HttpRequest>> {
        self.shared.lock().request.clone()
    }

    pub fn add_observer(&self, observer: Arc<dyn ExecutorObserver>) {
        self.shared.lock().observers.push(observer);
    }

    /// Start `request` on the current tokio runtime.
    ///
    /// Exactly one of `on_success` and `on_failure` runs, once, unless the
    /// task is cancelled first, in which case neither does. An executor runs
    /// a single task; calling this on an executor that is not idle returns
    /// `ExecuteError::AlreadyStarted`.
    pub fn execute<S, F>(&self, request: HttpRequest, on_success: S, on_failure: F) -> Result<(), ExecuteError>
    where
        S: FnOnce(RawResponse) + Send + 'static,
        F: FnOnce(Error) + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| ExecuteError::NoRuntime)?;
        let request = Arc::new(request);

        {
            let mut inner = self.shared.lock();
            if inner.state != TaskState::Idle {
                return Err(ExecuteError::AlreadyStarted(inner.state));
            }
            inner.callbacks = Some(Callbacks {
                on_success: Box::new(on_success),
                on_failure: Box::new(on_failure),
            });
            inner.request = Some(Arc::clone(&request));
            inner.state = TaskState::Running;
        }

        let mut timeline = ClockTimeline::new();
        timeline.mark_start();

        let span = tracing::info_span!(
            "request",
            task_id = %self.shared.id,
            method = %request.method,
            url = %request.url,
        );
        let task = drive(
            Arc::clone(&self.shared),
            Arc::clone(&self.connector),
            request,
            timeline,
        );
        let handle = runtime.spawn(task.instrument(span));

        let mut inner = self.shared.lock();
        match inner.state {
            TaskState::Running => inner.abort = Some(handle.abort_handle()),
            TaskState::Cancelled => handle.abort(),
            _ => {}
        }
        Ok(())
    }

    /// Run `request` and wait for its outcome.
    pub async fn send(&self, request: HttpRequest) -> Result<Outcome, ExecuteError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let failure_tx = tx.clone();
        self.execute(
            request,
            move |response| {
                let _ = tx.send(Outcome::Completed(response));
            },
            move |error| {
                let _ = failure_tx.send(Outcome::Failed(error));
            },
        )?;
        // Cancellation drops both callbacks, closing the channel.
        Ok(rx.recv().await.unwrap_or(Outcome::Cancelled))
    }

    /// Pause the running task between transport reads. No-op without one.
    pub fn suspend(&self) {
        self.set_paused(true);
    }

    pub fn resume(&self) {
        self.set_paused(false);
    }

    // Held under the state lock so a terminal transition, which clears the
    // flag, cannot interleave with the check.
    fn set_paused(&self, paused: bool) {
        let inner = self.shared.lock();
        if inner.state != TaskState::Running {
            return;
        }
        tracing::debug!(task_id = %self.shared.id, paused, "updating suspension");
        self.shared.paused.send_replace(paused);
        drop(inner);
    }

    /// Abort the running task and discard anything it received. Neither
    /// callback fires afterwards; observers get `on_cancelled`. No-op unless
    /// a task is running.
    pub fn cancel(&self) {
        let observers = {
            let mut inner = self.shared.lock();
            if inner.state != TaskState::Running {
                return;
            }
            inner.state = TaskState::Cancelled;
            inner.callbacks = None;
            inner.request = None;
            if let Some(abort) = inner.abort.take() {
                abort.abort();
            }
            self.shared.paused.send_replace(false);
            inner.observers.clone()
        };

        tracing::info!(task_id = %self.shared.id, "request cancelled");
        for observer in &observers {
            observer.on_cancelled();
        }
    }
}

async fn drive(
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    request: Arc<HttpRequest>,
    mut timeline: ClockTimeline,
) {
    let mut paused = shared.paused.subscribe();
    wait_while_paused(&mut paused).await;

    let session = match connector.connect(&request.transport) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "failed to open transport session");
            shared.emit(Event::Failed(Error::transport(e, Some(request))));
            return;
        }
    };

    tracing::debug!("dispatching request");
    let response = match session.send(&request).await {
        Ok(response) => response,
        Err(e) => {
            timeline.mark_completion();
            tracing::warn!(error = %e, "transport failed before response headers");
            shared.emit(Event::Failed(Error::transport(e, Some(request))));
            return;
        }
    };
    timeline.mark_first_byte();

    let TransportResponse {
        url,
        status,
        headers,
        mut body,
    } = response;
    let raw = RawResponse::new(url, status, headers)
        .with_rejected_statuses(request.rejected_statuses.clone());
    tracing::debug!(status, "response headers received");

    if raw.is_rejected() {
        // Dropping the body stream aborts the transfer before any byte is read.
        drop(body);
        timeline.mark_completion();
        tracing::info!(status, "status code rejected");
        let raw = Arc::new(raw.with_timeline(timeline));
        shared.emit(Event::Failed(Error::status_rejected(raw, Some(request))));
        return;
    }

    let mut buffer = BytesMut::new();
    loop {
        wait_while_paused(&mut paused).await;
        match body.next().await {
            Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
            Some(Err(e)) => {
                timeline.mark_completion();
                tracing::warn!(error = %e, received = buffer.len(), "transport failed while streaming body");
                let raw = Arc::new(raw.with_timeline(timeline));
                shared.emit(Event::Failed(Error::transport(e, Some(request)).with_response(raw)));
                return;
            }
            None => break,
        }
    }

    timeline.mark_completion();
    let elapsed_ms = timeline
        .latency_breakdown()
        .map(|breakdown| breakdown.total.as_millis() as u64)
        .unwrap_or_default();
    tracing::info!(status, bytes = buffer.len(), elapsed_ms, "request completed");

    let raw = raw.with_timeline(timeline).with_body(buffer.freeze());
    shared.emit(Event::Finished(raw));
}

async fn wait_while_paused(paused: &mut watch::Receiver<bool>) {
    // The sender lives in `Shared`, which outlives this task.
    let _ = paused.wait_for(|suspended| !*suspended).await;
}
