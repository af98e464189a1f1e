use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// One wheel-spin animation, broadcast by the kuri admin so every member
/// watching sees the same spin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinEvent {
    pub easing: String,
    pub speed: f64,
    pub rotates: u32,
    pub winner: String,
    pub admin_id: Uuid,
    /// Unix milliseconds at publish time.
    pub timestamp: i64,
}

/// Fire-and-forget fan-out keyed by kuri id. Delivery is at-most-once per
/// subscriber; anyone who reconnects misses what was published in the gap.
#[derive(Default)]
pub struct SpinHub {
    channels: Mutex<HashMap<Uuid, broadcast::Sender<SpinEvent>>>,
}

impl SpinHub {
    pub fn subscribe(&self, kuri_id: Uuid) -> broadcast::Receiver<SpinEvent> {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(kuri_id)
            .or_insert_with(|| broadcast::channel(16).0)
            .subscribe()
    }

    /// Returns how many subscribers the event reached. Channels with no
    /// remaining subscribers are dropped.
    pub fn publish(&self, kuri_id: Uuid, event: SpinEvent) -> usize {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let delivered = match channels.get(&kuri_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        };
        if delivered == 0 {
            channels.remove(&kuri_id);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> SpinEvent {
        SpinEvent {
            easing: "easeOutCubic".into(),
            speed: 1.5,
            rotates: 8,
            winner: "Alice".into(),
            admin_id: Uuid::new_v4(),
            timestamp: 1_760_000_000_000,
        }
    }

    #[tokio::test]
    async fn subscribers_receive_spins_for_their_kuri() {
        let hub = SpinHub::default();
        let kuri_id = Uuid::new_v4();
        let mut rx = hub.subscribe(kuri_id);

        assert_eq!(hub.publish(kuri_id, event()), 1);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.winner, "Alice");
    }

    #[tokio::test]
    async fn spins_do_not_cross_kuris() {
        let hub = SpinHub::default();
        let watched = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut rx = hub.subscribe(watched);

        assert_eq!(hub.publish(other, event()), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publishing_into_the_void_reaches_nobody() {
        let hub = SpinHub::default();
        assert_eq!(hub.publish(Uuid::new_v4(), event()), 0);
    }
}
