//! App Store download plumbing.
//!
//! The store service reports progress for every download in flight through a
//! single notification feed. [`DownloadQueue`] routes that feed to a single
//! channel per catalog item so an install session only ever sees events for
//! the item it started.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use lt_core::Error;

use crate::traits::StoreService;

/// Receiving half handed to an install session.
pub type StoreEvents = mpsc::UnboundedReceiver<StoreEvent>;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Connecting,
    Downloading { loaded: u64, total: u64 },
    Extracting { fraction: f64 },
    Installing,
    Finished,
    Failed { message: String },
}

impl StoreEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StoreEvent::Finished | StoreEvent::Failed { .. })
    }
}

/// One entry of the service-wide notification feed.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreNotification {
    pub item_id: u64,
    pub event: StoreEvent,
}

type Subscribers = HashMap<u64, mpsc::UnboundedSender<StoreEvent>>;

/// Routes store notifications to the one subscriber of each item.
#[derive(Default)]
pub struct DownloadQueue {
    subscribers: Mutex<Subscribers>,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the observer for `item_id`.
    ///
    /// Fails while another live receiver observes the same item. A
    /// subscriber whose receiver was dropped is replaced.
    pub fn subscribe(&self, item_id: u64) -> Result<StoreEvents, Error> {
        let mut subscribers = self.lock();
        if subscribers.get(&item_id).is_some_and(|tx| !tx.is_closed()) {
            return Err(Error::InstallInProgress {
                id: format!("store item {}", item_id),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        subscribers.insert(item_id, tx);
        Ok(rx)
    }

    /// Deliver a notification to the subscriber of its item.
    ///
    /// Notifications for items nobody observes are dropped. The subscriber
    /// is released after a terminal event. Returns whether the event
    /// reached a receiver.
    pub fn dispatch(&self, notification: StoreNotification) -> bool {
        let mut subscribers = self.lock();
        let Some(tx) = subscribers.get(&notification.item_id) else {
            debug!(item_id = notification.item_id, "dropping store notification without observer");
            return false;
        };

        let delivered = tx.send(notification.event.clone()).is_ok();
        if notification.event.is_terminal() || !delivered {
            subscribers.remove(&notification.item_id);
        }
        delivered
    }

    pub fn observed_items(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Store service for hosts without access to the private store frameworks.
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }

    fn error(&self) -> Error {
        Error::ServiceUnavailable {
            message: self.reason.clone(),
        }
    }
}

impl Default for UnavailableStore {
    fn default() -> Self {
        Self::new("the App Store download service is not accessible from this process")
    }
}

#[async_trait]
impl StoreService for UnavailableStore {
    fn is_available(&self) -> bool {
        false
    }

    async fn purchase(&self, _item_id: u64) -> Result<(), Error> {
        Err(self.error())
    }

    fn observe(&self, _item_id: u64) -> Result<StoreEvents, Error> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn routes_only_matching_item() {
        let queue = DownloadQueue::new();
        let mut mine = queue.subscribe(1).unwrap();
        let mut other = queue.subscribe(2).unwrap();

        queue.dispatch(StoreNotification {
            item_id: 1,
            event: StoreEvent::Downloading { loaded: 1, total: 2 },
        });

        assert_eq!(
            mine.recv().await,
            Some(StoreEvent::Downloading { loaded: 1, total: 2 })
        );
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminal_event_releases_subscribers() {
        let queue = DownloadQueue::new();
        let mut rx = queue.subscribe(7).unwrap();

        assert!(queue.dispatch(StoreNotification {
            item_id: 7,
            event: StoreEvent::Finished,
        }));
        assert_eq!(rx.recv().await, Some(StoreEvent::Finished));
        assert_eq!(rx.recv().await, None);
        assert_eq!(queue.observed_items(), 0);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let queue = DownloadQueue::new();
        drop(queue.subscribe(3).unwrap());

        let delivered = queue.dispatch(StoreNotification {
            item_id: 3,
            event: StoreEvent::Installing,
        });
        assert!(!delivered);
        assert_eq!(queue.observed_items(), 0);
    }

    #[test]
    fn second_live_subscriber_is_rejected() {
        let queue = DownloadQueue::new();
        let _first = queue.subscribe(5).unwrap();

        assert!(matches!(
            queue.subscribe(5),
            Err(Error::InstallInProgress { ref id }) if id == "store item 5"
        ));
        assert_eq!(queue.observed_items(), 1);
    }

    #[tokio::test]
    async fn closed_subscriber_is_replaced() {
        let queue = DownloadQueue::new();
        drop(queue.subscribe(5).unwrap());
        let mut second = queue.subscribe(5).unwrap();

        assert!(queue.dispatch(StoreNotification {
            item_id: 5,
            event: StoreEvent::Connecting,
        }));
        assert_eq!(second.recv().await, Some(StoreEvent::Connecting));
        assert_eq!(queue.observed_items(), 1);
    }

    #[test]
    fn unobserved_notifications_are_dropped() {
        let queue = DownloadQueue::new();
        assert!(!queue.dispatch(StoreNotification {
            item_id: 99,
            event: StoreEvent::Connecting,
        }));
    }

    #[tokio::test]
    async fn unavailable_store_reports_instead_of_blocking() {
        let store = UnavailableStore::default();
        assert!(!store.is_available());
        assert!(matches!(
            store.purchase(1).await,
            Err(Error::ServiceUnavailable { .. })
        ));
        assert!(matches!(store.observe(1), Err(Error::ServiceUnavailable { .. })));
    }
}
