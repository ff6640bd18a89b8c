//! Episodes: timed activities, primitive or composed from other episodes.

use std::collections::BTreeSet;

use tpn_support::Guard;

use crate::constraint::DurationSpec;
use crate::element::Identity;
use crate::state::StateAssignment;
use crate::types::{EpisodeId, EventId, StateConstraintId, TemporalConstraintId};

/// How an episode is built from internal episodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Composition {
    Primitive,
    Sequence(Vec<EpisodeId>),
    Parallel(Vec<EpisodeId>),
    Choose {
        choice: EventId,
        branches: Vec<EpisodeId>,
    },
}

impl Composition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primitive => "primitive",
            Self::Sequence(_) => "sequence",
            Self::Parallel(_) => "parallel",
            Self::Choose { .. } => "choose",
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive)
    }

    /// Internal episodes, in composition order. Empty for primitives.
    pub fn internal_episodes(&self) -> &[EpisodeId] {
        match self {
            Self::Primitive => &[],
            Self::Sequence(episodes) | Self::Parallel(episodes) => episodes,
            Self::Choose { branches, .. } => branches,
        }
    }

    /// Governing choice of a choose composition.
    pub fn choice(&self) -> Option<EventId> {
        match self {
            Self::Choose { choice, .. } => Some(*choice),
            _ => None,
        }
    }
}

/// A timed activity between a start and an end event.
#[derive(Debug, Clone)]
pub struct Episode {
    pub(crate) identity: Identity,
    pub(crate) guard: Guard,
    pub(crate) start: EventId,
    pub(crate) end: EventId,
    pub(crate) duration: TemporalConstraintId,
    pub(crate) action: String,
    pub(crate) start_conditions: StateAssignment,
    pub(crate) end_conditions: StateAssignment,
    pub(crate) start_effects: StateAssignment,
    pub(crate) end_effects: StateAssignment,
    pub(crate) temporal_constraints: BTreeSet<TemporalConstraintId>,
    pub(crate) start_state_constraints: BTreeSet<StateConstraintId>,
    pub(crate) end_state_constraints: BTreeSet<StateConstraintId>,
    pub(crate) during_state_constraints: BTreeSet<StateConstraintId>,
    pub(crate) terminal: bool,
    pub(crate) composition: Composition,
}

impl Episode {
    pub fn id(&self) -> &str {
        self.identity.id()
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn start(&self) -> EventId {
        self.start
    }

    pub fn end(&self) -> EventId {
        self.end
    }

    /// Constraint from start to end bounding the episode's duration.
    pub fn duration(&self) -> TemporalConstraintId {
        self.duration
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn start_conditions(&self) -> &StateAssignment {
        &self.start_conditions
    }

    pub fn end_conditions(&self) -> &StateAssignment {
        &self.end_conditions
    }

    pub fn start_effects(&self) -> &StateAssignment {
        &self.start_effects
    }

    pub fn end_effects(&self) -> &StateAssignment {
        &self.end_effects
    }

    /// Internal constraints, not counting the duration.
    pub fn temporal_constraints(&self) -> &BTreeSet<TemporalConstraintId> {
        &self.temporal_constraints
    }

    /// Internal constraints plus the duration.
    pub fn constraints_with_duration(&self) -> BTreeSet<TemporalConstraintId> {
        let mut all = self.temporal_constraints.clone();
        all.insert(self.duration);
        all
    }

    pub fn start_state_constraints(&self) -> &BTreeSet<StateConstraintId> {
        &self.start_state_constraints
    }

    pub fn end_state_constraints(&self) -> &BTreeSet<StateConstraintId> {
        &self.end_state_constraints
    }

    pub fn during_state_constraints(&self) -> &BTreeSet<StateConstraintId> {
        &self.during_state_constraints
    }

    /// Constraints that hold at start, end and during the episode.
    pub fn overall_state_constraints(&self) -> BTreeSet<StateConstraintId> {
        self.start_state_constraints
            .iter()
            .filter(|sc| {
                self.end_state_constraints.contains(sc) && self.during_state_constraints.contains(sc)
            })
            .copied()
            .collect()
    }

    /// Every state constraint attached to this episode.
    pub fn state_constraints(&self) -> BTreeSet<StateConstraintId> {
        self.start_state_constraints
            .iter()
            .chain(&self.end_state_constraints)
            .chain(&self.during_state_constraints)
            .copied()
            .collect()
    }

    /// Whether execution cannot continue after this episode.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn internal_episodes(&self) -> &[EpisodeId] {
        self.composition.internal_episodes()
    }

    pub fn is_primitive(&self) -> bool {
        self.composition.is_primitive()
    }
}

/// Description of a primitive episode.
#[derive(Debug, Clone, Default)]
pub struct EpisodeSpec {
    pub id: Option<String>,
    pub name: Option<String>,
    pub start: Option<EventId>,
    pub end: Option<EventId>,
    pub action: Option<String>,
    pub duration: Option<DurationSpec>,
    pub start_conditions: StateAssignment,
    pub end_conditions: StateAssignment,
    pub start_effects: StateAssignment,
    pub end_effects: StateAssignment,
    pub start_state_constraints: Vec<StateConstraintId>,
    pub end_state_constraints: Vec<StateConstraintId>,
    pub during_state_constraints: Vec<StateConstraintId>,
    /// Added to the start, end and during sets
    pub overall_state_constraints: Vec<StateConstraintId>,
    pub terminal: bool,
}

impl EpisodeSpec {
    /// Spec for an episode performing `action`.
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_start(mut self, start: EventId) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: EventId) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_duration(mut self, duration: DurationSpec) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_start_conditions(mut self, conditions: StateAssignment) -> Self {
        self.start_conditions = conditions;
        self
    }

    pub fn with_end_conditions(mut self, conditions: StateAssignment) -> Self {
        self.end_conditions = conditions;
        self
    }

    pub fn with_start_effects(mut self, effects: StateAssignment) -> Self {
        self.start_effects = effects;
        self
    }

    pub fn with_end_effects(mut self, effects: StateAssignment) -> Self {
        self.end_effects = effects;
        self
    }

    pub fn with_overall_state_constraint(mut self, constraint: StateConstraintId) -> Self {
        self.overall_state_constraints.push(constraint);
        self
    }

    pub fn with_during_state_constraint(mut self, constraint: StateConstraintId) -> Self {
        self.during_state_constraints.push(constraint);
        self
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}
