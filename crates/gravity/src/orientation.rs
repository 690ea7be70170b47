use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical up/down sense of the simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GravityOrientation {
    #[default]
    Normal,
    Inverted,
}

impl GravityOrientation {
    pub fn opposite(self) -> Self {
        match self {
            GravityOrientation::Normal => GravityOrientation::Inverted,
            GravityOrientation::Inverted => GravityOrientation::Normal,
        }
    }

    #[inline]
    pub fn is_inverted(self) -> bool {
        self == GravityOrientation::Inverted
    }
}

impl fmt::Display for GravityOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GravityOrientation::Normal => f.write_str("normal"),
            GravityOrientation::Inverted => f.write_str("inverted"),
        }
    }
}

/// Requested transition. `Toggle` resolves against the orientation current when the request
/// is executed, not when it is issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GravityRequest {
    Normal,
    Inverted,
    Toggle,
}

impl GravityRequest {
    pub fn resolve(self, current: GravityOrientation) -> GravityOrientation {
        match self {
            GravityRequest::Normal => GravityOrientation::Normal,
            GravityRequest::Inverted => GravityOrientation::Inverted,
            GravityRequest::Toggle => current.opposite(),
        }
    }
}

impl From<GravityOrientation> for GravityRequest {
    fn from(orientation: GravityOrientation) -> Self {
        match orientation {
            GravityOrientation::Normal => GravityRequest::Normal,
            GravityOrientation::Inverted => GravityRequest::Inverted,
        }
    }
}

/// Read-only capability handed to invert-aware code.
pub trait GravityQuery {
    fn is_inverted(&self) -> bool;
}

impl GravityQuery for GravityOrientation {
    fn is_inverted(&self) -> bool {
        GravityOrientation::is_inverted(*self)
    }
}

/// Emitted once per transition and passed by value to every listener.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GravityChangeEvent {
    pub previous: GravityOrientation,
    pub next: GravityOrientation,
    pub momentum_multiplier: f32,
    pub player_triggered: bool,
    pub was_toggle_request: bool,
}

impl GravityChangeEvent {
    /// True when the orientation actually flipped.
    pub fn changed(&self) -> bool {
        self.previous != self.next
    }
}
