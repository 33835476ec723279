//! Scan progress event broadcasting.
//!
//! Scan observers subscribe to a broadcast channel instead of polling shared
//! flags. Sends are fire-and-forget; a scan with no observers proceeds
//! normally.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Summary of a completed library scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Files newly inserted as media links.
    pub added: u32,
    /// Links whose backing file disappeared and were deleted.
    pub removed: u32,
    /// Files already known or with unrecognized extensions.
    pub skipped: u32,
}

/// Progress event emitted while a library scan runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ScanEvent {
    /// A scan of the given root path has started.
    Started { root_path: String },
    /// Periodic progress snapshot.
    Progress {
        root_path: String,
        found: u32,
        added: u32,
        removed: u32,
    },
    /// The scan finished and the database reflects the filesystem.
    Completed {
        root_path: String,
        summary: ScanSummary,
    },
    /// The scan was cancelled; rows persisted so far are kept.
    Cancelled { root_path: String },
}

/// Broadcast bus for scan events.
///
/// Cheap to clone; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScanEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all subscribers.
    pub fn emit(&self, event: ScanEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("No subscribers for scan event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.emit(ScanEvent::Started {
            root_path: "/movies".to_string(),
        });
        bus.emit(ScanEvent::Completed {
            root_path: "/movies".to_string(),
            summary: ScanSummary {
                added: 3,
                removed: 1,
                skipped: 2,
            },
        });

        match rx.recv().await.unwrap() {
            ScanEvent::Started { root_path } => assert_eq!(root_path, "/movies"),
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.recv().await.unwrap() {
            ScanEvent::Completed { summary, .. } => assert_eq!(summary.added, 3),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::default();
        bus.emit(ScanEvent::Cancelled {
            root_path: "/movies".to_string(),
        });
    }

    #[tokio::test]
    async fn test_multiple_subscribers_all_receive() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(ScanEvent::Started {
            root_path: "/tv".to_string(),
        });

        assert!(matches!(rx1.recv().await.unwrap(), ScanEvent::Started { .. }));
        assert!(matches!(rx2.recv().await.unwrap(), ScanEvent::Started { .. }));
    }
}
