//! Synchronous-looking request/response on top of the callback transport.
//!
//! [`RequestFacade::request`] registers a pending call, dispatches the venue
//! request under the new id, and waits for the aggregated answer. A wait that
//! runs out is retried with a fresh id and a longer window; the answer to an
//! abandoned id is discarded when it finally arrives.

use std::sync::Arc;

use common::{LinearBackoff, RequestId};
use connector_core::TransportError;
use execution_core::{
    Account, Collection, CorrelationError, Order, PositionSnapshot, SharedCorrelationTable,
};
use metrics::SharedMetrics;
use model::{CommissionRate, InstrumentSnapshot};
use tracing::{debug, warn};

use crate::error::GatewayError;

/// Answer to a correlated query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse {
    Instruments(Collection<InstrumentSnapshot>),
    CommissionRates(Collection<CommissionRate>),
    Positions(Collection<PositionSnapshot>),
    Orders(Collection<Order>),
    Accounts(Collection<Account>),
}

impl QueryResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryResponse::Instruments(_) => "instruments",
            QueryResponse::CommissionRates(_) => "commission rates",
            QueryResponse::Positions(_) => "positions",
            QueryResponse::Orders(_) => "orders",
            QueryResponse::Accounts(_) => "accounts",
        }
    }
}

macro_rules! query_response_variant {
    ($variant:ident, $record:ty, $extract:ident) => {
        impl From<Collection<$record>> for QueryResponse {
            fn from(collection: Collection<$record>) -> Self {
                QueryResponse::$variant(collection)
            }
        }

        impl QueryResponse {
            pub fn $extract(
                self,
                operation: &'static str,
            ) -> Result<Collection<$record>, GatewayError> {
                match self {
                    QueryResponse::$variant(collection) => Ok(collection),
                    other => Err(GatewayError::UnexpectedResponse {
                        operation,
                        received: other.kind(),
                    }),
                }
            }
        }
    };
}

query_response_variant!(Instruments, InstrumentSnapshot, into_instruments);
query_response_variant!(CommissionRates, CommissionRate, into_commission_rates);
query_response_variant!(Positions, PositionSnapshot, into_positions);
query_response_variant!(Orders, Order, into_orders);
query_response_variant!(Accounts, Account, into_accounts);

/// Holds fragments of answers still being assembled.
pub trait PartialAnswers: Send + Sync {
    /// Drop whatever was accumulated for `request_id`.
    fn discard(&self, request_id: RequestId) -> bool;
}

/// Issues correlated requests with bounded linear retry.
pub struct RequestFacade {
    table: SharedCorrelationTable<QueryResponse>,
    backoff: LinearBackoff,
    metrics: SharedMetrics,
    partials: Option<Arc<dyn PartialAnswers>>,
}

impl RequestFacade {
    pub fn new(
        table: SharedCorrelationTable<QueryResponse>,
        backoff: LinearBackoff,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            table,
            backoff,
            metrics,
            partials: None,
        }
    }

    /// Drop partial answers of attempts that time out.
    pub fn with_partials(mut self, partials: Arc<dyn PartialAnswers>) -> Self {
        self.partials = Some(partials);
        self
    }

    pub fn table(&self) -> &SharedCorrelationTable<QueryResponse> {
        &self.table
    }

    pub fn backoff(&self) -> LinearBackoff {
        self.backoff
    }

    /// Send a query and wait for its aggregated answer.
    ///
    /// `dispatch` sends the venue request tagged with the id it is given and
    /// may be called once per attempt. A dispatch failure ends the call at
    /// once; a venue error ends it without retry.
    pub async fn request<F>(
        &self,
        operation: &'static str,
        mut dispatch: F,
    ) -> Result<QueryResponse, GatewayError>
    where
        F: FnMut(RequestId) -> Result<(), TransportError>,
    {
        for attempt in self.backoff.attempts() {
            let call = self.table.register();
            let request_id = call.request_id();
            self.metrics.inc_requests_issued();

            if let Err(e) = dispatch(request_id) {
                self.table.abandon(request_id);
                warn!(operation, request_id, error = %e, "Request dispatch failed");
                return Err(e.into());
            }
            debug!(operation, request_id, attempt, "Request dispatched");

            match self.table.wait(call, self.backoff.delay_for(attempt)).await {
                Ok(response) => {
                    self.metrics.inc_requests_completed();
                    return Ok(response);
                }
                Err(CorrelationError::Timeout { request_id }) => {
                    self.metrics.inc_request_timeouts();
                    if let Some(partials) = &self.partials {
                        partials.discard(request_id);
                    }
                    warn!(
                        operation,
                        request_id,
                        attempt,
                        max_attempts = self.backoff.max_attempts(),
                        "Request timed out"
                    );
                }
                Err(CorrelationError::Rejected { rejection, .. }) => {
                    self.metrics.inc_request_rejections();
                    warn!(operation, request_id, code = rejection.code, message = %rejection.message, "Request rejected");
                    return Err(GatewayError::Rejected {
                        operation,
                        rejection,
                    });
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(GatewayError::Timeout {
            operation,
            attempts: self.backoff.max_attempts(),
        })
    }

    /// Send a request whose outcome arrives as pushes, not as a response.
    pub fn fire<F>(&self, operation: &'static str, dispatch: F) -> Result<RequestId, GatewayError>
    where
        F: FnOnce(RequestId) -> Result<(), TransportError>,
    {
        let request_id = self.table.next_request_id();
        self.metrics.inc_requests_issued();
        dispatch(request_id)?;
        debug!(operation, request_id, "Request sent");
        Ok(request_id)
    }
}
