//! Incremental aggregation of multi-fragment query responses.
//!
//! A query answer may be spread over any number of callbacks, each carrying
//! at most one record and a "last" flag. Records are upserted per request id
//! into a [`FragmentAccumulator`] keyed by the record's natural key; the
//! fragment flagged last freezes the collection and completes the matching
//! request in the [`CorrelationTable`].

use std::collections::HashMap;
use std::hash::Hash;

use common::RequestId;
use model::{CommissionRate, InstrumentSnapshot};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::account::Account;
use crate::correlation::SharedCorrelationTable;
use crate::error::VenueRejection;
use crate::order::Order;
use crate::position::PositionSnapshot;

/// A record that can be accumulated by natural key.
pub trait Aggregate {
    type Key: Eq + Hash + Clone + std::fmt::Debug;

    /// Natural key of the entity (instrument id, order id, ...).
    fn key(&self) -> Self::Key;

    /// Fold a later fragment with the same key into this one.
    fn merge(&mut self, later: Self);
}

/// Completed result of an aggregated query.
pub type Collection<V> = HashMap<<V as Aggregate>::Key, V>;

/// Partial collection for one request id.
#[derive(Debug)]
pub struct FragmentAccumulator<V: Aggregate> {
    request_id: RequestId,
    entries: Collection<V>,
    fragments: usize,
}

impl<V: Aggregate> FragmentAccumulator<V> {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            entries: HashMap::new(),
            fragments: 0,
        }
    }

    /// Upsert one fragment, merging with an existing entry of the same key.
    pub fn upsert(&mut self, fragment: V) {
        self.fragments += 1;
        let key = fragment.key();
        match self.entries.get_mut(&key) {
            Some(existing) => existing.merge(fragment),
            None => {
                self.entries.insert(key, fragment);
            }
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Number of fragments seen so far, including merged duplicates.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Number of distinct keys seen so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze the partial collection into the final result.
    pub fn freeze(self) -> Collection<V> {
        self.entries
    }
}

/// What happened to a fragment handed to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// More fragments are expected.
    Pending,
    /// The collection was completed with `entries` distinct records.
    /// `delivered` is false when nobody was waiting any more.
    Completed { entries: usize, delivered: bool },
    /// A non-final fragment for a request nobody waits for; nothing is kept.
    Discarded,
}

/// Routes fragments of one query kind into per-request accumulators.
///
/// `R` is the value type of the correlation table; every completed
/// collection is converted into it.
pub struct QueryAggregator<V: Aggregate, R> {
    table: SharedCorrelationTable<R>,
    open: Mutex<HashMap<RequestId, FragmentAccumulator<V>>>,
}

impl<V, R> QueryAggregator<V, R>
where
    V: Aggregate,
    R: From<Collection<V>>,
{
    pub fn new(table: SharedCorrelationTable<R>) -> Self {
        Self {
            table,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one fragment callback.
    ///
    /// `fragment` is `None` when the callback carried no usable record (empty
    /// result set, or a record that failed decoding). A last-flagged callback
    /// always completes the request, with an empty collection if nothing was
    /// accumulated. Non-final fragments of a request that is no longer
    /// pending are dropped, along with anything accumulated for it.
    pub fn on_fragment(
        &self,
        request_id: RequestId,
        fragment: Option<V>,
        is_last: bool,
    ) -> FragmentOutcome {
        self.table.observe(request_id);

        let finished = {
            let mut open = self.open.lock();
            if !is_last && !self.table.is_pending(request_id) {
                if open.remove(&request_id).is_some() {
                    debug!(request_id, "Partial answer of abandoned request dropped");
                }
                return FragmentOutcome::Discarded;
            }
            let acc = open
                .entry(request_id)
                .or_insert_with(|| FragmentAccumulator::new(request_id));
            if let Some(fragment) = fragment {
                acc.upsert(fragment);
            }
            trace!(request_id, fragments = acc.fragments(), is_last, "Fragment accumulated");
            if is_last {
                open.remove(&request_id)
            } else {
                None
            }
        };

        match finished {
            Some(acc) => {
                let fragments = acc.fragments();
                let collection = acc.freeze();
                let entries = collection.len();
                let delivered = self.table.complete(request_id, R::from(collection));
                debug!(request_id, fragments, entries, delivered, "Query completed");
                FragmentOutcome::Completed { entries, delivered }
            }
            None => FragmentOutcome::Pending,
        }
    }

    /// Handle a query answered with an error: drop the partial collection
    /// and fail the request.
    pub fn on_error(&self, request_id: RequestId, rejection: VenueRejection) -> bool {
        self.table.observe(request_id);
        self.open.lock().remove(&request_id);
        self.table.fail(request_id, rejection)
    }

    /// Drop the partial collection of one request, if any.
    pub fn discard(&self, request_id: RequestId) -> bool {
        self.open.lock().remove(&request_id).is_some()
    }

    /// Drop every partial collection.
    pub fn discard_all(&self) -> usize {
        let mut open = self.open.lock();
        let n = open.len();
        open.clear();
        n
    }

    /// Number of requests with fragments still outstanding.
    pub fn open_requests(&self) -> usize {
        self.open.lock().len()
    }
}

/// Fan one commission rate out to every instrument sharing its underlying
/// symbol, returning how many instruments were updated.
pub fn merge_commission(
    instruments: &mut Collection<InstrumentSnapshot>,
    rate: &CommissionRate,
) -> usize {
    let mut updated = 0;
    for instrument in instruments.values_mut() {
        if instrument.underlying_symbol == rate.underlying_symbol {
            instrument.apply_commission(rate);
            updated += 1;
        }
    }
    updated
}

impl Aggregate for InstrumentSnapshot {
    type Key = String;

    fn key(&self) -> String {
        self.order_book_id.clone()
    }

    fn merge(&mut self, later: Self) {
        *self = later;
    }
}

impl Aggregate for CommissionRate {
    type Key = String;

    fn key(&self) -> String {
        self.underlying_symbol.clone()
    }

    fn merge(&mut self, later: Self) {
        *self = later;
    }
}

impl Aggregate for PositionSnapshot {
    type Key = String;

    fn key(&self) -> String {
        self.order_book_id.clone()
    }

    fn merge(&mut self, later: Self) {
        self.absorb(&later);
    }
}

impl Aggregate for Order {
    type Key = i64;

    fn key(&self) -> i64 {
        self.order_id
    }

    fn merge(&mut self, later: Self) {
        *self = later;
    }
}

impl Aggregate for Account {
    type Key = String;

    fn key(&self) -> String {
        self.account_id.clone()
    }

    fn merge(&mut self, later: Self) {
        *self = later;
    }
}
