//! Authoritative gravity orientation for the simulation.
//!
//! One [`GravityCoordinator`] is owned by the session and passed to everything that reads or
//! changes orientation. Readers that only need the current sense take a [`GravityQuery`].

pub mod coordinator;
pub mod listener;
pub mod orientation;
pub mod store;

pub use coordinator::{GravityCoordinator, PendingChange};
pub use listener::{GravityListener, ListenerResult, SubscriptionHandle};
pub use orientation::{GravityChangeEvent, GravityOrientation, GravityQuery, GravityRequest};
pub use store::{GravitySnapshot, MemoryStore, StateStore, GRAVITY_STATE_KEY};

use thiserror::Error;

/// Gravity error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A checkpoint operation was attempted while listeners were being notified.
    #[error("cannot {0} gravity state during listener fan-out")]
    DuringDispatch(&'static str),

    /// The state store rejected or could not produce a value.
    #[error("state store error: {0}")]
    Store(String),

    /// Snapshot (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Gravity result type
pub type Result<T> = std::result::Result<T, Error>;
