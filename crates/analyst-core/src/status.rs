//! Agent lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an agent process.
///
/// `Created -> Registered -> Serving -> Stopping -> Unregistered`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Process started, dispatcher and protocol layer constructed.
    #[default]
    Created,
    /// Registry reachable and lease acquired.
    Registered,
    /// RPC listener accepting calls.
    Serving,
    /// Shutdown requested, listener draining.
    Stopping,
    /// Registry key deletion attempted, about to exit.
    Unregistered,
}

impl LifecycleState {
    /// Returns true if the agent accepts new calls.
    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Serving)
    }

    /// Returns true if `next` is a legal successor of this state.
    ///
    /// Any state may jump to `Unregistered` so a failed startup can still
    /// clean up.
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Created, Registered)
                | (Registered, Serving)
                | (Serving, Stopping)
                | (_, Unregistered)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Registered => "REGISTERED",
            Self::Serving => "SERVING",
            Self::Stopping => "STOPPING",
            Self::Unregistered => "UNREGISTERED",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
