//! Mock implementations for testing
//!
//! These mocks enable session tests without real I/O.

use super::{SessionController, SessionUpdate};
use crate::reveal::{RevealScheduler, DEFAULT_TICK};
use crate::state_machine::{SessionContext, TurnOutcome};
use crate::transport::{Request, Response, Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Transport
// ============================================================================

/// Mock transport that returns queued results immediately
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<Response, TransportError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<Request>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(Response::new(response)));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: TransportError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn next_result(&self) -> Result<Response, TransportError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("No mock response queued")))
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: &Request,
        _cancel: CancellationToken,
    ) -> Result<Response, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.next_result()
    }

    fn endpoint(&self) -> &str {
        "mock://backend"
    }
}

// ============================================================================
// Delayed Mock Transport (for cancellation testing)
// ============================================================================

/// Mock transport that takes `delay` to answer and honours cancellation
pub struct DelayedMockTransport {
    inner: MockTransport,
    delay: Duration,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
}

/// Counts a request as in flight until dropped, however the call ends
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[allow(dead_code)]
impl DelayedMockTransport {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockTransport::new(),
            delay,
            request_started: Arc::new(Notify::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn queue_response(&self, response: &str) {
        self.inner.queue_response(response);
    }

    pub fn queue_error(&self, error: TransportError) {
        self.inner.queue_error(error);
    }

    pub fn recorded_requests(&self) -> Vec<Request> {
        self.inner.recorded_requests()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous requests seen
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for DelayedMockTransport {
    async fn send(
        &self,
        request: &Request,
        cancel: CancellationToken,
    ) -> Result<Response, TransportError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(Arc::clone(&self.in_flight));
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // Stores a permit if nobody is waiting yet
        self.request_started.notify_one();

        tokio::select! {
            biased;

            () = cancel.cancelled() => Err(TransportError::cancelled()),

            () = tokio::time::sleep(self.delay) => self.inner.next_result(),
        }
    }

    fn endpoint(&self) -> &str {
        "mock://delayed-backend"
    }
}

// ============================================================================
// Test Session Builder
// ============================================================================

/// A session plus a subscription to its updates
pub struct TestSession<T: Transport + 'static> {
    pub session: SessionController<T>,
    updates: broadcast::Receiver<SessionUpdate>,
    seen: Vec<SessionUpdate>,
}

impl TestSession<Arc<MockTransport>> {
    pub fn builder() -> TestSessionBuilder<Arc<MockTransport>> {
        TestSessionBuilder {
            transport: Arc::new(MockTransport::new()),
            tick: DEFAULT_TICK,
            stop_grace: SessionContext::default().stop_grace,
        }
    }
}

pub struct TestSessionBuilder<T> {
    transport: T,
    tick: Duration,
    stop_grace: Duration,
}

#[allow(dead_code)]
impl<T: Transport + 'static> TestSessionBuilder<T> {
    pub fn transport<U: Transport + 'static>(self, transport: U) -> TestSessionBuilder<U> {
        TestSessionBuilder {
            transport,
            tick: self.tick,
            stop_grace: self.stop_grace,
        }
    }

    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn stop_grace(mut self, stop_grace: Duration) -> Self {
        self.stop_grace = stop_grace;
        self
    }

    pub fn build(self) -> TestSession<T> {
        let session = SessionController::new(
            self.transport,
            RevealScheduler::new(self.tick),
            SessionContext {
                stop_grace: self.stop_grace,
            },
        );
        let updates = session.updates();
        TestSession {
            session,
            updates,
            seen: Vec::new(),
        }
    }
}

#[allow(dead_code)]
impl<T: Transport + 'static> TestSession<T> {
    /// Drive the session until the current turn has finished
    pub async fn run_until_idle(&mut self) {
        tokio::time::timeout(Duration::from_secs(60), self.session.settle())
            .await
            .expect("turn should finish");
    }

    /// Every update published since the session was built
    pub fn received_updates(&mut self) -> Vec<SessionUpdate> {
        while let Ok(update) = self.updates.try_recv() {
            self.seen.push(update);
        }
        self.seen.clone()
    }

    /// How each finished turn ended, oldest first
    pub fn outcomes(&mut self) -> Vec<TurnOutcome> {
        self.received_updates()
            .into_iter()
            .filter_map(|u| match u {
                SessionUpdate::TurnFinished { outcome } => Some(outcome),
                _ => None,
            })
            .collect()
    }
}
