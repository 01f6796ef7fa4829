//! Bridge lifecycle events.
//!
//! The bridge emits events via [`EventBus::emit`]; anything interested in
//! settlements or protocol errors subscribes via [`EventBus::subscribe`].
//! Built on [`tokio::sync::broadcast`] so multiple listeners can react
//! independently.

use tokio::sync::broadcast;

use crate::consts::EVENT_CAPACITY;
use crate::task::CorrelationToken;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A pending request was settled with a result (`success`) or an error.
    Settled {
        token: CorrelationToken,
        success: bool,
    },
    /// A completion arrived for a token with no pending request.
    UnmatchedCompletion { token: CorrelationToken },
    /// The bridge was terminated, leaving `orphaned` requests unsettled.
    Terminated { orphaned: usize },
}

/// Fan-out of bridge events: settlements, unmatched completions and
/// termination. Subscribers that fall more than the channel capacity behind
/// see `RecvError::Lagged` rather than blocking the router.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a bridge event. The router calls this after each settlement
    /// or unmatched completion, and `TaskBridge::terminate` once with the
    /// orphan count. Returns how many subscribers will see it; zero is normal.
    pub fn emit(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Listen for settlements and protocol errors from now on. Events emitted
    /// before subscribing, including an earlier termination, are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_reaches_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.emit(Event::UnmatchedCompletion {
            token: CorrelationToken(3),
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            Event::UnmatchedCompletion {
                token: CorrelationToken(3)
            }
        );
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(Event::Terminated { orphaned: 2 });

        assert_eq!(rx1.recv().await.unwrap(), Event::Terminated { orphaned: 2 });
        assert_eq!(rx2.recv().await.unwrap(), Event::Terminated { orphaned: 2 });
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking_emit() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for token in 0..3 {
            bus.emit(Event::Settled {
                token: CorrelationToken(token),
                success: true,
            });
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::Settled {
                token: CorrelationToken(1),
                success: true
            }
        );
    }

    #[test]
    fn emit_without_subscribers_returns_zero() {
        let bus = EventBus::default();
        assert_eq!(bus.emit(Event::Terminated { orphaned: 0 }), 0);
    }
}
