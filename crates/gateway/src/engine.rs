//! The strategy-engine seam.
//!
//! The gateway pushes venue events into a [`StrategyEngine`]. Calls arrive on
//! the transport's delivery context and must return quickly; an engine that
//! does real work should hand events off, as [`ChannelEngine`] does.

use execution_core::{Order, Trade};
use model::Tick;
use tokio::sync::mpsc;
use tracing::trace;

/// Consumer of pushed venue events.
///
/// # Lifecycle
///
/// 1. `on_tick` - a market-data update for an instrument in the universe
/// 2. `on_order` - an order status change
/// 3. `on_trade` - a fill
/// 4. `on_error` - a venue error that is not tied to a waiting caller,
///    including order-insert and cancel rejections
pub trait StrategyEngine: Send + Sync {
    fn on_tick(&self, tick: Tick);

    fn on_order(&self, order: Order);

    fn on_trade(&self, trade: Trade);

    fn on_error(&self, code: i32, message: &str);
}

/// One pushed event, as forwarded by [`ChannelEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Tick(Tick),
    Order(Order),
    Trade(Trade),
    Error { code: i32, message: String },
}

/// Engine that forwards every event into an unbounded channel.
///
/// Sends never block the delivery context. Events are dropped once the
/// receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelEngine {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelEngine {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            trace!("Engine receiver dropped, event discarded");
        }
    }
}

impl StrategyEngine for ChannelEngine {
    fn on_tick(&self, tick: Tick) {
        self.send(EngineEvent::Tick(tick));
    }

    fn on_order(&self, order: Order) {
        self.send(EngineEvent::Order(order));
    }

    fn on_trade(&self, trade: Trade) {
        self.send(EngineEvent::Trade(trade));
    }

    fn on_error(&self, code: i32, message: &str) {
        self.send(EngineEvent::Error {
            code,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_engine_forwards_in_order() {
        let (engine, mut rx) = ChannelEngine::new();
        engine.on_error(10, "insufficient margin");
        engine.on_tick(Tick::default());

        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::Error {
                code: 10,
                message: "insufficient margin".into()
            }
        );
        assert!(matches!(rx.try_recv().unwrap(), EngineEvent::Tick(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (engine, rx) = ChannelEngine::new();
        drop(rx);
        engine.on_error(1, "gone");
    }
}
