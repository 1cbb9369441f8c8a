use std::sync::atomic::{AtomicI32, Ordering};

/// Request id as carried by every venue request and callback.
pub type RequestId = i32;

/// Monotonically increasing request-id counter shared by everything that
/// issues venue requests on one session.
#[derive(Debug, Default)]
pub struct RequestIdSequence {
    last: AtomicI32,
}

impl RequestIdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next request id.
    pub fn next_id(&self) -> RequestId {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Advance the counter to at least `seen`.
    ///
    /// Callbacks may echo ids this process never issued (e.g. after a restart
    /// of the venue client); later allocations must stay above them.
    pub fn observe(&self, seen: RequestId) {
        self.last.fetch_max(seen, Ordering::SeqCst);
    }

    /// Last id handed out (0 if none).
    pub fn last(&self) -> RequestId {
        self.last.load(Ordering::SeqCst)
    }
}
