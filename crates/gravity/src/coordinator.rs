//! The single authoritative owner of gravity orientation.
//!
//! Transitions are synchronous: `set_gravity` updates the orientation and notifies every live
//! listener, in subscription order, before returning. Listeners are held by weak reference and
//! iterated over a snapshot, so subscribing or unsubscribing from inside a callback only takes
//! effect for the next transition. A `set_gravity` call made from inside a callback is queued
//! and executed after the current fan-out, in request order.

use crate::listener::{GravityListener, ListenerRegistry, SubscriptionHandle};
use crate::orientation::{GravityChangeEvent, GravityOrientation, GravityQuery, GravityRequest};
use crate::store::{GravitySnapshot, StateStore, GRAVITY_STATE_KEY};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Upper bound on transitions chained from listener callbacks within one top-level call.
pub const MAX_CHAINED_CHANGES: usize = 256;

/// A `set_gravity` request waiting for the current fan-out to finish.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    pub request: GravityRequest,
    pub momentum_multiplier: f32,
    pub player_triggered: bool,
}

pub struct GravityCoordinator {
    current: Cell<GravityOrientation>,
    listeners: RefCell<ListenerRegistry>,
    pending: RefCell<VecDeque<PendingChange>>,
    dispatching: Cell<bool>,
}

/// Clears the dispatching flag when the outermost transition returns.
struct DispatchGuard<'a>(&'a Cell<bool>);

impl<'a> DispatchGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl GravityCoordinator {
    pub fn new(initial: GravityOrientation) -> Self {
        Self {
            current: Cell::new(initial),
            listeners: RefCell::new(ListenerRegistry::default()),
            pending: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
        }
    }

    /// Requests a transition.
    ///
    /// `Toggle` resolves against the orientation current when the request executes. An event
    /// is emitted even when the target equals the current orientation.
    ///
    /// Requests made by listeners during the fan-out are queued and run afterwards in order.
    /// At most [`MAX_CHAINED_CHANGES`] queued requests run per outermost call; the rest are
    /// dropped with a warning.
    pub fn set_gravity(
        &self,
        request: GravityRequest,
        momentum_multiplier: f32,
        player_triggered: bool,
    ) {
        let change = PendingChange {
            request,
            momentum_multiplier,
            player_triggered,
        };

        if self.dispatching.get() {
            debug!("gravity: queued {:?} raised during fan-out", request);
            self.pending.borrow_mut().push_back(change);
            return;
        }

        let _guard = DispatchGuard::enter(&self.dispatching);
        self.transition(change);
        self.drain_pending();
    }

    pub fn is_inverted(&self) -> bool {
        self.current.get().is_inverted()
    }

    pub fn current_gravity(&self) -> GravityOrientation {
        self.current.get()
    }

    /// Registers a listener without taking ownership of it. Dropping the last `Rc` ends the
    /// subscription.
    pub fn subscribe<L>(&self, listener: &Rc<L>) -> SubscriptionHandle
    where
        L: GravityListener + 'static,
    {
        let listener: Rc<dyn GravityListener> = listener.clone();
        let handle = self.listeners.borrow_mut().insert(Rc::downgrade(&listener));
        debug!("gravity: {} subscribed as {}", listener.name(), handle);
        handle
    }

    /// Returns false when the handle is unknown or already removed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.listeners.borrow_mut().remove(handle)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().live_count()
    }

    /// Number of requests waiting behind the current fan-out.
    pub fn pending_changes(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn snapshot(&self) -> GravitySnapshot {
        GravitySnapshot {
            orientation: self.current.get(),
            pending: self.pending.borrow().iter().copied().collect(),
        }
    }

    /// Writes the current orientation and any queued requests to `store`.
    pub fn save(&self, store: &mut dyn StateStore) -> Result<()> {
        let snapshot = self.snapshot();
        store.persist(GRAVITY_STATE_KEY, snapshot.to_json()?)?;
        debug!(
            "gravity: saved {} with {} pending",
            snapshot.orientation,
            snapshot.pending.len()
        );
        Ok(())
    }

    /// Restores a checkpoint. Returns `false` when the store holds none.
    ///
    /// The orientation is set silently. Requests that were queued at save time are then
    /// replayed as ordinary transitions.
    pub fn restore(&self, store: &dyn StateStore) -> Result<bool> {
        if self.dispatching.get() {
            return Err(Error::DuringDispatch("restore"));
        }
        let Some(json) = store.restore(GRAVITY_STATE_KEY)? else {
            return Ok(false);
        };
        let snapshot = GravitySnapshot::from_json(&json)?;

        info!("gravity: restored {}", snapshot.orientation);
        self.current.set(snapshot.orientation);

        if !snapshot.pending.is_empty() {
            let _guard = DispatchGuard::enter(&self.dispatching);
            self.pending.borrow_mut().extend(snapshot.pending);
            self.drain_pending();
        }
        Ok(true)
    }

    fn drain_pending(&self) {
        let mut chained = 0usize;
        loop {
            // borrow released before the transition runs listeners
            let next = self.pending.borrow_mut().pop_front();
            let Some(change) = next else {
                break;
            };
            chained += 1;
            if chained > MAX_CHAINED_CHANGES {
                let dropped = self.pending.borrow().len() + 1;
                self.pending.borrow_mut().clear();
                warn!(
                    "gravity: dropped {} chained request(s) after {} transitions",
                    dropped, MAX_CHAINED_CHANGES
                );
                break;
            }
            self.transition(change);
        }
    }

    fn transition(&self, change: PendingChange) {
        let previous = self.current.get();
        let next = change.request.resolve(previous);
        self.current.set(next);

        let event = GravityChangeEvent {
            previous,
            next,
            momentum_multiplier: change.momentum_multiplier,
            player_triggered: change.player_triggered,
            was_toggle_request: change.request == GravityRequest::Toggle,
        };

        if event.changed() {
            info!(
                "gravity: {} -> {} (momentum {}, player {})",
                previous, next, change.momentum_multiplier, change.player_triggered
            );
        } else {
            debug!("gravity: {} unchanged", next);
        }

        let listeners = self.listeners.borrow_mut().snapshot();
        for (handle, listener) in listeners {
            if let Err(err) = listener.on_gravity_changed(event, self) {
                warn!(
                    "gravity: listener {} ({}) failed: {}",
                    listener.name(),
                    handle,
                    err
                );
            }
        }
    }
}

impl Default for GravityCoordinator {
    fn default() -> Self {
        Self::new(GravityOrientation::Normal)
    }
}

impl GravityQuery for GravityCoordinator {
    fn is_inverted(&self) -> bool {
        GravityCoordinator::is_inverted(self)
    }
}

impl fmt::Debug for GravityCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GravityCoordinator")
            .field("current", &self.current.get())
            .field("listeners", &self.listener_count())
            .field("pending", &self.pending_changes())
            .field("dispatching", &self.dispatching.get())
            .finish()
    }
}
