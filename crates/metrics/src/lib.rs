use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe metrics collector for the gateway.
#[derive(Debug)]
pub struct GatewayMetrics {
    // Correlated requests
    requests_issued: AtomicU64,
    requests_completed: AtomicU64,
    request_timeouts: AtomicU64,
    request_rejections: AtomicU64,
    late_responses: AtomicU64,
    fragments_received: AtomicU64,

    // Pushes
    ticks_received: AtomicU64,
    ticks_forwarded: AtomicU64,
    order_updates: AtomicU64,
    trades_received: AtomicU64,
    venue_errors: AtomicU64,
    decode_drops: AtomicU64,

    // Session
    login_attempts: AtomicU64,
    disconnects: AtomicU64,

    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_tick_time: Option<Instant>,
    last_error_time: Option<Instant>,
    last_disconnect_time: Option<Instant>,
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self {
            requests_issued: AtomicU64::new(0),
            requests_completed: AtomicU64::new(0),
            request_timeouts: AtomicU64::new(0),
            request_rejections: AtomicU64::new(0),
            late_responses: AtomicU64::new(0),
            fragments_received: AtomicU64::new(0),
            ticks_received: AtomicU64::new(0),
            ticks_forwarded: AtomicU64::new(0),
            order_updates: AtomicU64::new(0),
            trades_received: AtomicU64::new(0),
            venue_errors: AtomicU64::new(0),
            decode_drops: AtomicU64::new(0),
            login_attempts: AtomicU64::new(0),
            disconnects: AtomicU64::new(0),
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_tick_time: None,
                last_error_time: None,
                last_disconnect_time: None,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_requests_issued(&self) {
        self.requests_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_requests_completed(&self) {
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_request_timeouts(&self) {
        self.request_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_request_rejections(&self) {
        self.request_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// A response arrived for a request nobody waits on any more.
    pub fn inc_late_responses(&self) {
        self.late_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fragments_received(&self) {
        self.fragments_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ticks_received(&self) {
        self.ticks_received.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_tick_time = Some(Instant::now());
    }

    pub fn inc_ticks_forwarded(&self) {
        self.ticks_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_order_updates(&self) {
        self.order_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trades_received(&self) {
        self.trades_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_venue_errors(&self) {
        self.venue_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_decode_drops(&self) {
        self.decode_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_login_attempts(&self) {
        self.login_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_disconnects(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_disconnect_time = Some(Instant::now());
    }

    // --- Getter methods ---

    pub fn requests_issued(&self) -> u64 {
        self.requests_issued.load(Ordering::Relaxed)
    }

    pub fn requests_completed(&self) -> u64 {
        self.requests_completed.load(Ordering::Relaxed)
    }

    pub fn request_timeouts(&self) -> u64 {
        self.request_timeouts.load(Ordering::Relaxed)
    }

    pub fn request_rejections(&self) -> u64 {
        self.request_rejections.load(Ordering::Relaxed)
    }

    pub fn late_responses(&self) -> u64 {
        self.late_responses.load(Ordering::Relaxed)
    }

    pub fn fragments_received(&self) -> u64 {
        self.fragments_received.load(Ordering::Relaxed)
    }

    pub fn ticks_received(&self) -> u64 {
        self.ticks_received.load(Ordering::Relaxed)
    }

    pub fn ticks_forwarded(&self) -> u64 {
        self.ticks_forwarded.load(Ordering::Relaxed)
    }

    pub fn order_updates(&self) -> u64 {
        self.order_updates.load(Ordering::Relaxed)
    }

    pub fn trades_received(&self) -> u64 {
        self.trades_received.load(Ordering::Relaxed)
    }

    pub fn venue_errors(&self) -> u64 {
        self.venue_errors.load(Ordering::Relaxed)
    }

    pub fn decode_drops(&self) -> u64 {
        self.decode_drops.load(Ordering::Relaxed)
    }

    pub fn login_attempts(&self) -> u64 {
        self.login_attempts.load(Ordering::Relaxed)
    }

    pub fn disconnects(&self) -> u64 {
        self.disconnects.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.read().start_time.elapsed().as_secs_f64()
    }

    pub fn secs_since_last_tick(&self) -> Option<f64> {
        self.inner
            .read()
            .last_tick_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_error(&self) -> Option<f64> {
        self.inner
            .read()
            .last_error_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_disconnect(&self) -> Option<f64> {
        self.inner
            .read()
            .last_disconnect_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    /// Generate a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_issued: self.requests_issued(),
            requests_completed: self.requests_completed(),
            request_timeouts: self.request_timeouts(),
            request_rejections: self.request_rejections(),
            late_responses: self.late_responses(),
            fragments_received: self.fragments_received(),
            ticks_received: self.ticks_received(),
            ticks_forwarded: self.ticks_forwarded(),
            order_updates: self.order_updates(),
            trades_received: self.trades_received(),
            venue_errors: self.venue_errors(),
            decode_drops: self.decode_drops(),
            login_attempts: self.login_attempts(),
            disconnects: self.disconnects(),
            uptime_secs: self.uptime_secs(),
            secs_since_last_tick: self.secs_since_last_tick(),
            secs_since_last_error: self.secs_since_last_error(),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub requests_issued: u64,
    pub requests_completed: u64,
    pub request_timeouts: u64,
    pub request_rejections: u64,
    pub late_responses: u64,
    pub fragments_received: u64,
    pub ticks_received: u64,
    pub ticks_forwarded: u64,
    pub order_updates: u64,
    pub trades_received: u64,
    pub venue_errors: u64,
    pub decode_drops: u64,
    pub login_attempts: u64,
    pub disconnects: u64,
    pub uptime_secs: f64,
    pub secs_since_last_tick: Option<f64>,
    pub secs_since_last_error: Option<f64>,
}

/// Health status of the gateway's market-data feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Ticks are arriving.
    Healthy,
    /// Ticks are stale, or many requests time out.
    Degraded,
    /// No ticks for an extended period.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

impl MetricsSnapshot {
    /// Threshold in seconds for considering data stale (degraded).
    const STALE_THRESHOLD_SECS: f64 = 30.0;
    /// Threshold in seconds for considering the feed unhealthy.
    const UNHEALTHY_THRESHOLD_SECS: f64 = 60.0;
    /// Share of issued requests that may time out before the gateway is degraded.
    const TIMEOUT_RATIO_THRESHOLD: f64 = 0.5;

    pub fn timeout_ratio(&self) -> f64 {
        if self.requests_issued == 0 {
            0.0
        } else {
            self.request_timeouts as f64 / self.requests_issued as f64
        }
    }

    /// Determine the health status based on metrics.
    pub fn health_status(&self) -> HealthStatus {
        let feed = match self.secs_since_last_tick {
            Some(secs) if secs > Self::UNHEALTHY_THRESHOLD_SECS => HealthStatus::Unhealthy,
            Some(secs) if secs > Self::STALE_THRESHOLD_SECS => HealthStatus::Degraded,
            Some(_) => HealthStatus::Healthy,
            // No ticks yet: judge by uptime, outside trading hours this is expected
            None if self.uptime_secs < Self::STALE_THRESHOLD_SECS => HealthStatus::Healthy,
            None if self.uptime_secs < Self::UNHEALTHY_THRESHOLD_SECS => HealthStatus::Degraded,
            None => HealthStatus::Unhealthy,
        };

        if feed == HealthStatus::Healthy && self.timeout_ratio() > Self::TIMEOUT_RATIO_THRESHOLD {
            HealthStatus::Degraded
        } else {
            feed
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Gateway Metrics ===")?;
        writeln!(f, "Uptime:              {:.1}s", self.uptime_secs)?;
        writeln!(f, "Requests issued:     {}", self.requests_issued)?;
        writeln!(f, "Requests completed:  {}", self.requests_completed)?;
        writeln!(f, "Request timeouts:    {}", self.request_timeouts)?;
        writeln!(f, "Request rejections:  {}", self.request_rejections)?;
        writeln!(f, "Late responses:      {}", self.late_responses)?;
        writeln!(f, "Fragments received:  {}", self.fragments_received)?;
        writeln!(f, "Ticks received:      {}", self.ticks_received)?;
        writeln!(f, "Ticks forwarded:     {}", self.ticks_forwarded)?;
        writeln!(f, "Order updates:       {}", self.order_updates)?;
        writeln!(f, "Trades received:     {}", self.trades_received)?;
        writeln!(f, "Venue errors:        {}", self.venue_errors)?;
        writeln!(f, "Decode drops:        {}", self.decode_drops)?;
        writeln!(f, "Login attempts:      {}", self.login_attempts)?;
        writeln!(f, "Disconnects:         {}", self.disconnects)?;
        if let Some(secs) = self.secs_since_last_tick {
            writeln!(f, "Since last tick:     {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_error {
            writeln!(f, "Since last error:    {:.1}s", secs)?;
        }
        Ok(())
    }
}

/// Shared handle to metrics.
pub type SharedMetrics = Arc<GatewayMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(GatewayMetrics::new())
}
