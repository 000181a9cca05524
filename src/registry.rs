//! Active notification registry
//!
//! Maps a record identifier to a handle that can cancel the corresponding
//! OS-level notification, so a dismissal arriving from the watch also clears
//! the notification locally. Entries are only removed by explicit untracking;
//! there is no automatic expiry, so owners of the registry are expected to
//! untrack on every path that retires a notification (the daemon also does
//! so when the OS reports a notification closed).

use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Handle capable of cancelling one displayed OS notification
pub trait OsNotificationHandle: Send + Sync {
    fn cancel(&self);
}

/// Registry of currently-displayed notifications keyed by record identifier
#[derive(Default)]
pub struct ActiveNotifications {
    entries: Mutex<HashMap<Uuid, Box<dyn OsNotificationHandle>>>,
}

impl ActiveNotifications {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Remember the OS handle for a record identifier
    ///
    /// Tracking an identifier twice replaces the previous handle.
    pub fn track(&self, id: Uuid, handle: Box<dyn OsNotificationHandle>) {
        let previous = self.entries.lock().unwrap().insert(id, handle);
        if previous.is_some() {
            debug!("Replaced OS handle for already-tracked notification {}", id);
        }
    }

    /// Remove and return the handle for an identifier
    ///
    /// Untracking an identifier that was never tracked (or already
    /// untracked) is a no-op: dismissing something already gone must be
    /// idempotent.
    pub fn untrack(&self, id: Uuid) -> Option<Box<dyn OsNotificationHandle>> {
        self.entries.lock().unwrap().remove(&id)
    }

    pub fn is_tracked(&self, id: Uuid) -> bool {
        self.entries.lock().unwrap().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct TestHandle {
        cancelled: Arc<AtomicBool>,
    }

    impl OsNotificationHandle for TestHandle {
        fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_track_then_untrack() {
        let registry = ActiveNotifications::new();
        let cancelled = Arc::new(AtomicBool::new(false));
        let id = Uuid::new_v4();

        registry.track(
            id,
            Box::new(TestHandle {
                cancelled: cancelled.clone(),
            }),
        );
        assert!(registry.is_tracked(id));

        let handle = registry.untrack(id).expect("tracked handle");
        handle.cancel();
        assert!(cancelled.load(Ordering::SeqCst));
        assert!(!registry.is_tracked(id));
    }

    #[test]
    fn test_untrack_absent_is_noop() {
        let registry = ActiveNotifications::new();
        assert!(registry.untrack(Uuid::new_v4()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_untrack_is_idempotent() {
        let registry = ActiveNotifications::new();
        let id = Uuid::new_v4();
        registry.track(
            id,
            Box::new(TestHandle {
                cancelled: Arc::new(AtomicBool::new(false)),
            }),
        );

        assert!(registry.untrack(id).is_some());
        assert!(registry.untrack(id).is_none());
    }

    #[test]
    fn test_retrack_replaces_handle() {
        let registry = ActiveNotifications::new();
        let id = Uuid::new_v4();
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));

        registry.track(
            id,
            Box::new(TestHandle {
                cancelled: first.clone(),
            }),
        );
        registry.track(
            id,
            Box::new(TestHandle {
                cancelled: second.clone(),
            }),
        );
        assert_eq!(registry.len(), 1);

        registry.untrack(id).unwrap().cancel();
        assert!(!first.load(Ordering::SeqCst));
        assert!(second.load(Ordering::SeqCst));
    }
}
