//! Core types: arena handles and the error taxonomy.

use std::fmt;

use tpn_support::InconsistentSupport;

/// Errors raised while building or reading a plan network.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// A required setting was not provided
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    /// Malformed value, bounds, distribution or mismatched lengths
    #[error("Invalid type: {0}")]
    InvalidType(String),

    /// Scalar out of range
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Episodes that cannot be composed as requested
    #[error("Composition error: {0}")]
    Composition(String),

    /// Element added twice, or found twice while traversing
    #[error("Duplicate element: {0}")]
    DuplicateElement(String),

    /// Unknown id, or an id reused for a different element
    #[error("Id error: {0}")]
    Id(String),

    /// A support intersection came out empty
    #[error(transparent)]
    InconsistentSupport(#[from] InconsistentSupport),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PlanError {
    /// Whether this error reports contradictory supports.
    ///
    /// Callers probing whether a constraint can be added branch on this.
    pub fn is_inconsistent_support(&self) -> bool {
        matches!(self, Self::InconsistentSupport(_))
    }
}

/// Result type for plan operations.
pub type Result<T> = std::result::Result<T, PlanError>;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// Position in the owning graph's arena.
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Handle to an event (or choice) in a [`PlanGraph`](crate::PlanGraph).
    EventId,
    "event"
);
arena_id!(
    /// Handle to an episode.
    EpisodeId,
    "episode"
);
arena_id!(
    /// Handle to a temporal constraint.
    TemporalConstraintId,
    "temporal"
);
arena_id!(
    /// Handle to a state constraint.
    StateConstraintId,
    "state"
);
arena_id!(
    /// Handle to a chance constraint.
    ChanceConstraintId,
    "chance"
);
arena_id!(
    /// Handle to a state variable.
    StateVariableId,
    "variable"
);

/// Elements that carry a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GuardedRef {
    Event(EventId),
    Episode(EpisodeId),
    Temporal(TemporalConstraintId),
    State(StateConstraintId),
}

impl From<EventId> for GuardedRef {
    fn from(id: EventId) -> Self {
        Self::Event(id)
    }
}

impl From<EpisodeId> for GuardedRef {
    fn from(id: EpisodeId) -> Self {
        Self::Episode(id)
    }
}

impl From<TemporalConstraintId> for GuardedRef {
    fn from(id: TemporalConstraintId) -> Self {
        Self::Temporal(id)
    }
}

impl From<StateConstraintId> for GuardedRef {
    fn from(id: StateConstraintId) -> Self {
        Self::State(id)
    }
}
