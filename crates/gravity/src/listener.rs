use crate::coordinator::GravityCoordinator;
use crate::orientation::GravityChangeEvent;
use std::fmt;
use std::rc::{Rc, Weak};

/// Outcome of a single listener callback. Failures are logged by the coordinator and do not
/// stop the fan-out.
pub type ListenerResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Subscriber notified synchronously on every gravity transition.
///
/// The coordinator passed to the callback may be used to request further changes; those are
/// queued and processed once the current fan-out completes.
pub trait GravityListener {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    fn on_gravity_changed(
        &self,
        event: GravityChangeEvent,
        gravity: &GravityCoordinator,
    ) -> ListenerResult;
}

/// Opaque token returned by `subscribe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

struct Entry {
    handle: SubscriptionHandle,
    listener: Weak<dyn GravityListener>,
}

/// Registration-ordered set of non-owning listener references.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    entries: Vec<Entry>,
    next_handle: u64,
}

impl ListenerRegistry {
    pub(crate) fn insert(&mut self, listener: Weak<dyn GravityListener>) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.push(Entry { handle, listener });
        handle
    }

    pub(crate) fn remove(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.handle != handle);
        self.entries.len() != before
    }

    /// Live listeners in registration order. Entries whose subscriber was dropped are pruned.
    pub(crate) fn snapshot(&mut self) -> Vec<(SubscriptionHandle, Rc<dyn GravityListener>)> {
        self.entries.retain(|entry| entry.listener.strong_count() > 0);
        self.entries
            .iter()
            .filter_map(|entry| entry.listener.upgrade().map(|l| (entry.handle, l)))
            .collect()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.listener.strong_count() > 0)
            .count()
    }
}
