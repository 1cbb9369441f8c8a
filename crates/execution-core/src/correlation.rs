//! Request-id correlation between synchronous callers and venue callbacks.
//!
//! Flow of a correlated call:
//! 1. `register()` allocates the next request id and parks a completion slot
//! 2. The caller dispatches the venue request tagged with that id
//! 3. The delivery context posts `complete()` or `fail()` when the terminal
//!    callback arrives
//! 4. The caller's `wait()` resolves, or times out and removes the slot
//!
//! Registration happens before dispatch so a callback that overtakes the
//! caller still finds its slot. Posting to an id with no slot (already
//! completed, timed out or never issued) is a no-op.

use crate::error::{CorrelationError, VenueRejection};
use common::{RequestId, RequestIdSequence};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

type Slot<T> = oneshot::Sender<Result<T, CorrelationError>>;

/// An in-flight request awaiting its result.
struct PendingRequest<T> {
    issued_at: Instant,
    slot: Slot<T>,
}

/// Caller-side handle of a registered request.
#[derive(Debug)]
pub struct PendingCall<T> {
    request_id: RequestId,
    issued_at: Instant,
    receiver: oneshot::Receiver<Result<T, CorrelationError>>,
}

impl<T> PendingCall<T> {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}

/// Thread-safe table of in-flight correlated requests.
///
/// At most one pending entry exists per request id, and ids come from a
/// strictly increasing sequence, so an id is never reused while outstanding.
pub struct CorrelationTable<T> {
    ids: Arc<RequestIdSequence>,
    pending: DashMap<RequestId, PendingRequest<T>>,
}

impl<T> CorrelationTable<T> {
    /// Create an empty table drawing ids from `ids`.
    pub fn new(ids: Arc<RequestIdSequence>) -> Self {
        Self {
            ids,
            pending: DashMap::new(),
        }
    }

    /// Allocate a request id without registering a pending call.
    ///
    /// Used for fire-and-forget requests whose outcome arrives as pushes.
    pub fn next_request_id(&self) -> RequestId {
        self.ids.next_id()
    }

    /// Record a request id seen on an incoming callback.
    pub fn observe(&self, request_id: RequestId) {
        self.ids.observe(request_id);
    }

    /// Allocate a request id and park a completion slot for it.
    pub fn register(&self) -> PendingCall<T> {
        let request_id = self.ids.next_id();
        let issued_at = Instant::now();
        let (slot, receiver) = oneshot::channel();

        self.pending
            .insert(request_id, PendingRequest { issued_at, slot });

        PendingCall {
            request_id,
            issued_at,
            receiver,
        }
    }

    /// Wait for the result of a registered call.
    ///
    /// On timeout the slot is removed, so a completion arriving afterwards is
    /// discarded. A timeout means the outcome is unknown, not that the request
    /// failed at the venue.
    pub async fn wait(
        &self,
        mut call: PendingCall<T>,
        timeout: Duration,
    ) -> Result<T, CorrelationError> {
        let request_id = call.request_id;

        match tokio::time::timeout(timeout, &mut call.receiver).await {
            Ok(Ok(result)) => {
                tracing::trace!(
                    request_id,
                    elapsed_ms = call.issued_at.elapsed().as_millis() as u64,
                    "Request resolved"
                );
                result
            }
            Ok(Err(_)) => Err(CorrelationError::Abandoned { request_id }),
            Err(_) => {
                self.pending.remove(&request_id);
                // A completion may have landed between the timer firing and the removal.
                match call.receiver.try_recv() {
                    Ok(result) => result,
                    Err(_) => Err(CorrelationError::Timeout { request_id }),
                }
            }
        }
    }

    /// Post the result of a request.
    ///
    /// Returns `true` if a waiting caller received it.
    pub fn complete(&self, request_id: RequestId, value: T) -> bool {
        self.post(request_id, Ok(value))
    }

    /// Post a venue rejection for a request.
    pub fn fail(&self, request_id: RequestId, rejection: VenueRejection) -> bool {
        self.post(
            request_id,
            Err(CorrelationError::Rejected {
                request_id,
                rejection,
            }),
        )
    }

    /// Remove a pending entry without posting anything.
    ///
    /// Used when the request could not be dispatched at all.
    pub fn abandon(&self, request_id: RequestId) -> bool {
        self.pending.remove(&request_id).is_some()
    }

    /// Fail every pending request with `error`, returning how many were pending.
    pub fn fail_all(&self, error: CorrelationError) -> usize {
        let ids: Vec<RequestId> = self.pending.iter().map(|e| *e.key()).collect();
        let mut failed = 0;
        for request_id in ids {
            if let Some((_, pending)) = self.pending.remove(&request_id) {
                let _ = pending.slot.send(Err(error.clone()));
                failed += 1;
            }
        }
        failed
    }

    /// Whether a request is still awaiting its result.
    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.pending.contains_key(&request_id)
    }

    /// Age of a pending request.
    pub fn age_of(&self, request_id: RequestId) -> Option<Duration> {
        self.pending
            .get(&request_id)
            .map(|entry| entry.issued_at.elapsed())
    }

    /// Get the number of pending requests.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn post(&self, request_id: RequestId, result: Result<T, CorrelationError>) -> bool {
        match self.pending.remove(&request_id) {
            Some((_, pending)) => pending.slot.send(result).is_ok(),
            None => {
                tracing::debug!(request_id, "Result for unknown or expired request dropped");
                false
            }
        }
    }
}

/// Shared handle to a correlation table.
pub type SharedCorrelationTable<T> = Arc<CorrelationTable<T>>;

/// Create a new shared correlation table.
pub fn create_correlation_table<T>(ids: Arc<RequestIdSequence>) -> SharedCorrelationTable<T> {
    Arc::new(CorrelationTable::new(ids))
}
