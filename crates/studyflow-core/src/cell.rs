//! Live identifier storage shared across asynchronous continuations.
//!
//! A deferred callback (poll tick, network completion) must read the
//! identifier it acts on from an [`IdentifierCell`] at the moment of use.
//! Capturing the value when the callback is scheduled lets a slow, older
//! operation act on an identifier that has since been replaced.
//!
//! [`AuthorityClock`] hands out monotonically increasing [`Authority`]
//! tokens. Only the holder of the newest token may write pipeline state;
//! every older holder has been superseded.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Single-writer, many-reader cell holding the current working identifier.
///
/// Every write bumps a version counter so readers can tell whether the value
/// changed between two observations, even if it changed back.
#[derive(Debug)]
pub struct IdentifierCell<T> {
    slot: RwLock<Slot<T>>,
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    version: u64,
}

impl<T: Clone + PartialEq> IdentifierCell<T> {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(Slot {
                value: None,
                version: 0,
            }),
        }
    }

    /// Latest value, regardless of when the caller was scheduled.
    pub fn get(&self) -> Option<T> {
        self.slot.read().value.clone()
    }

    /// Overwrite the value; returns the new version.
    pub fn set(&self, value: T) -> u64 {
        let mut slot = self.slot.write();
        slot.value = Some(value);
        slot.version += 1;
        slot.version
    }

    /// Store `value` only if the cell is empty. Check and write happen under
    /// one lock acquisition.
    pub fn set_if_empty(&self, value: T) -> bool {
        let mut slot = self.slot.write();
        if slot.value.is_some() {
            return false;
        }
        slot.value = Some(value);
        slot.version += 1;
        true
    }

    /// Empty the cell; returns the new version.
    pub fn clear(&self) -> u64 {
        let mut slot = self.slot.write();
        slot.value = None;
        slot.version += 1;
        slot.version
    }

    pub fn version(&self) -> u64 {
        self.slot.read().version
    }

    /// Whether the cell currently holds exactly `value`.
    pub fn holds(&self, value: &T) -> bool {
        self.slot.read().value.as_ref() == Some(value)
    }
}

impl<T: Clone + PartialEq> Default for IdentifierCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Write authority handed out by an [`AuthorityClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Authority(u64);

impl Authority {
    pub fn epoch(self) -> u64 {
        self.0
    }
}

/// Monotonic source of [`Authority`] tokens. Acquiring a new token
/// supersedes every token handed out before it.
#[derive(Debug, Default)]
pub struct AuthorityClock {
    current: AtomicU64,
}

impl AuthorityClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take write authority, superseding all previous holders.
    pub fn acquire(&self) -> Authority {
        Authority(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, authority: Authority) -> bool {
        self.current.load(Ordering::SeqCst) == authority.0
    }

    /// Supersede every holder without handing out a new token.
    pub fn revoke_all(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn get_sees_latest_set() {
        let cell = IdentifierCell::new();
        assert_eq!(cell.get(), None);
        cell.set(10);
        cell.set(11);
        assert_eq!(cell.get(), Some(11));
        assert!(cell.holds(&11));
        assert!(!cell.holds(&10));
    }

    #[test]
    fn versions_advance_on_every_write() {
        let cell = IdentifierCell::new();
        let v1 = cell.set(5);
        let v2 = cell.set(5);
        let v3 = cell.clear();
        assert!(v1 < v2 && v2 < v3);
        assert_eq!(cell.version(), v3);
        assert_eq!(cell.get(), None);
    }

    #[test]
    fn set_if_empty_never_overwrites() {
        let cell = IdentifierCell::new();
        assert!(cell.set_if_empty(1));
        assert!(!cell.set_if_empty(2));
        assert_eq!(cell.get(), Some(1));
        cell.clear();
        assert!(cell.set_if_empty(3));
        assert_eq!(cell.get(), Some(3));
    }

    #[tokio::test]
    async fn deferred_reader_observes_value_set_after_scheduling() {
        let cell = Arc::new(IdentifierCell::new());
        cell.set(10);

        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel::<()>();
        let reader = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move {
                ready_rx.await.ok();
                cell.get()
            })
        };

        cell.set(11);
        ready_tx.send(()).ok();
        assert_eq!(reader.await.ok().flatten(), Some(11));
    }

    #[test]
    fn newer_authority_supersedes_older() {
        let clock = AuthorityClock::new();
        let first = clock.acquire();
        assert!(clock.is_current(first));
        let second = clock.acquire();
        assert!(!clock.is_current(first));
        assert!(clock.is_current(second));
        assert!(second > first);

        clock.revoke_all();
        assert!(!clock.is_current(second));
    }
}
