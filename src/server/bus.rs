//! One-shot long-poll subscription channel for build versions.

use crossbeam::channel::{Receiver, Sender, bounded};
use thiserror::Error;

/// Upper bound on waiting subscribers. Beyond this, `subscribe`
/// reports saturation and the HTTP layer asks clients to retry.
const MAX_SUBSCRIBERS: usize = 10_000;

/// Subscription queue was full.
#[derive(Debug, Error)]
#[error("too many waiting subscribers")]
pub struct Saturated;

/// Fan-out channel where every subscriber receives at most one
/// version: the first one published after it subscribed.
pub struct VersionBus {
    subscribers_tx: Sender<Sender<String>>,
    subscribers_rx: Receiver<Sender<String>>,
}

impl VersionBus {
    pub fn new() -> Self {
        let (subscribers_tx, subscribers_rx) = bounded(MAX_SUBSCRIBERS);
        Self {
            subscribers_tx,
            subscribers_rx,
        }
    }

    /// Enqueue a single-delivery slot and hand back its receiving end.
    pub fn subscribe(&self) -> Result<Receiver<String>, Saturated> {
        let (tx, rx) = bounded(1);
        self.subscribers_tx.try_send(tx).map_err(|_| Saturated)?;
        Ok(rx)
    }

    /// Deliver `version` to every currently queued subscriber, in
    /// subscription order, then return.
    pub fn notify(&self, version: &str) {
        while let Ok(subscriber) = self.subscribers_rx.try_recv() {
            // a hung-up subscriber (request timed out) is fine
            let _ = subscriber.try_send(version.to_owned());
        }
    }
}

impl Default for VersionBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_all_subscribers_receive_in_order() {
        let bus = VersionBus::new();
        let receivers: Vec<_> = (0..16).map(|_| bus.subscribe().unwrap()).collect();

        bus.notify("v1");
        for rx in &receivers {
            assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "v1");
        }
    }

    #[test]
    fn test_subscriber_gets_first_version_only() {
        let bus = VersionBus::new();
        let rx = bus.subscribe().unwrap();

        bus.notify("v1");
        bus.notify("v2");

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "v1");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_late_subscriber_waits_for_next_notify() {
        let bus = VersionBus::new();
        bus.notify("v1");

        let rx = bus.subscribe().unwrap();
        assert!(rx.try_recv().is_err());

        bus.notify("v2");
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "v2");
    }

    #[test]
    fn test_subscribe_reports_saturation() {
        let bus = VersionBus::new();
        let _receivers: Vec<_> = (0..MAX_SUBSCRIBERS)
            .map(|_| bus.subscribe().unwrap())
            .collect();

        assert!(bus.subscribe().is_err());

        // draining makes room again
        bus.notify("v1");
        assert!(bus.subscribe().is_ok());
    }

    #[test]
    fn test_dropped_subscriber_does_not_block_notify() {
        let bus = VersionBus::new();
        drop(bus.subscribe().unwrap());
        let rx = bus.subscribe().unwrap();

        bus.notify("v1");
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "v1");
    }
}
