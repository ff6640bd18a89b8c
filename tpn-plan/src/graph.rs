//! Arena owning every element of a plan network.
//!
//! Episodes, events and constraints reference each other through typed
//! handles. Composition never copies an episode: a sub-episode shared by two
//! parents is one arena entry, so a support narrowed through one parent is
//! visible through the other.

use std::collections::{BTreeMap, BTreeSet};

use tpn_support::{ChoiceAssignment, Conjunction, Guard, Support};
use tracing::{debug, warn};

use crate::constraint::{
    ChanceConstraint, ConstraintRef, DurationSpec, Relation, StateConstraint,
    StateConstraintKind, TemporalBounds, TemporalConstraint,
};
use crate::element::Identity;
use crate::episode::{Composition, Episode, EpisodeSpec};
use crate::event::{Choice, ChoiceSpec, Event};
use crate::state::{StateAssignment, StateDomain, StateValue, StateVariable};
use crate::types::{
    ChanceConstraintId, EpisodeId, EventId, GuardedRef, PlanError, Result, StateConstraintId,
    StateVariableId, TemporalConstraintId,
};

/// Default tolerance for choice probabilities summing to one.
pub const DEFAULT_PROBABILITY_TOLERANCE: f64 = 1e-5;

/// Arena lengths and overwritten guards, kept while an atomic operation runs.
#[derive(Debug)]
struct Journal {
    events: usize,
    episodes: usize,
    temporal_constraints: usize,
    state_constraints: usize,
    chance_constraints: usize,
    state_variables: usize,
    guards: BTreeMap<GuardedRef, Guard>,
}

impl Journal {
    fn open(graph: &PlanGraph) -> Self {
        Self {
            events: graph.events.len(),
            episodes: graph.episodes.len(),
            temporal_constraints: graph.temporal_constraints.len(),
            state_constraints: graph.state_constraints.len(),
            chance_constraints: graph.chance_constraints.len(),
            state_variables: graph.state_variables.len(),
            guards: BTreeMap::new(),
        }
    }

    /// Whether the element existed when the journal was opened.
    fn predates(&self, element: GuardedRef) -> bool {
        match element {
            GuardedRef::Event(id) => id.0 < self.events,
            GuardedRef::Episode(id) => id.0 < self.episodes,
            GuardedRef::Temporal(id) => id.0 < self.temporal_constraints,
            GuardedRef::State(id) => id.0 < self.state_constraints,
        }
    }
}

/// Fields of an episode about to be pushed into the arena.
#[derive(Debug)]
pub(crate) struct EpisodeDraft {
    pub identity: Identity,
    pub start: EventId,
    pub end: EventId,
    pub duration: DurationSpec,
    pub action: String,
    pub composition: Composition,
    pub temporal_constraints: BTreeSet<TemporalConstraintId>,
    pub terminal: bool,
}

/// Owner of all events, episodes, constraints and state variables.
#[derive(Debug)]
pub struct PlanGraph {
    events: Vec<Event>,
    episodes: Vec<Episode>,
    temporal_constraints: Vec<TemporalConstraint>,
    state_constraints: Vec<StateConstraint>,
    chance_constraints: Vec<ChanceConstraint>,
    state_variables: Vec<StateVariable>,
    probability_tolerance: f64,
    journal: Option<Journal>,
}

impl Default for PlanGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            episodes: Vec::new(),
            temporal_constraints: Vec::new(),
            state_constraints: Vec::new(),
            chance_constraints: Vec::new(),
            state_variables: Vec::new(),
            probability_tolerance: DEFAULT_PROBABILITY_TOLERANCE,
            journal: None,
        }
    }

    /// Set the tolerance used when validating choice probabilities.
    pub fn with_probability_tolerance(mut self, tolerance: f64) -> Self {
        self.probability_tolerance = tolerance;
        self
    }

    // ---- atomicity ----

    /// Run `op`, restoring every guard and arena to its prior state on error.
    ///
    /// Nested calls run inline inside the outermost operation.
    pub(crate) fn atomically<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.journal.is_some() {
            return op(self);
        }

        self.journal = Some(Journal::open(self));
        let result = op(self);
        if let Some(journal) = self.journal.take() {
            if let Err(err) = &result {
                if err.is_inconsistent_support() {
                    warn!(error = %err, restored_guards = journal.guards.len(), "Rolling back plan graph");
                } else {
                    debug!(error = %err, "Rolling back plan graph");
                }
                self.rollback(journal);
            }
        }
        result
    }

    fn rollback(&mut self, journal: Journal) {
        self.events.truncate(journal.events);
        self.episodes.truncate(journal.episodes);
        self.temporal_constraints.truncate(journal.temporal_constraints);
        self.state_constraints.truncate(journal.state_constraints);
        self.chance_constraints.truncate(journal.chance_constraints);
        self.state_variables.truncate(journal.state_variables);

        for (element, guard) in journal.guards {
            if let Ok(slot) = self.guard_slot(element) {
                *slot = guard;
            }
        }
    }

    // ---- lookups ----

    pub fn event(&self, id: EventId) -> Result<&Event> {
        self.events
            .get(id.0)
            .ok_or_else(|| PlanError::Id(format!("no event {}", id)))
    }

    /// The choice carried by a choice event.
    pub fn choice(&self, id: EventId) -> Result<&Choice> {
        let event = self.event(id)?;
        event.choice().ok_or_else(|| {
            PlanError::InvalidType(format!("event '{}' is not a choice", event.id()))
        })
    }

    pub fn episode(&self, id: EpisodeId) -> Result<&Episode> {
        self.episodes
            .get(id.0)
            .ok_or_else(|| PlanError::Id(format!("no episode {}", id)))
    }

    fn episode_mut(&mut self, id: EpisodeId) -> Result<&mut Episode> {
        self.episodes
            .get_mut(id.0)
            .ok_or_else(|| PlanError::Id(format!("no episode {}", id)))
    }

    pub fn temporal_constraint(&self, id: TemporalConstraintId) -> Result<&TemporalConstraint> {
        self.temporal_constraints
            .get(id.0)
            .ok_or_else(|| PlanError::Id(format!("no temporal constraint {}", id)))
    }

    fn temporal_constraint_mut(
        &mut self,
        id: TemporalConstraintId,
    ) -> Result<&mut TemporalConstraint> {
        self.temporal_constraints
            .get_mut(id.0)
            .ok_or_else(|| PlanError::Id(format!("no temporal constraint {}", id)))
    }

    pub fn state_constraint(&self, id: StateConstraintId) -> Result<&StateConstraint> {
        self.state_constraints
            .get(id.0)
            .ok_or_else(|| PlanError::Id(format!("no state constraint {}", id)))
    }

    pub fn chance_constraint(&self, id: ChanceConstraintId) -> Result<&ChanceConstraint> {
        self.chance_constraints
            .get(id.0)
            .ok_or_else(|| PlanError::Id(format!("no chance constraint {}", id)))
    }

    pub fn state_variable(&self, id: StateVariableId) -> Result<&StateVariable> {
        self.state_variables
            .get(id.0)
            .ok_or_else(|| PlanError::Id(format!("no state variable {}", id)))
    }

    pub fn events(&self) -> impl Iterator<Item = (EventId, &Event)> {
        self.events.iter().enumerate().map(|(i, e)| (EventId(i), e))
    }

    pub fn episodes(&self) -> impl Iterator<Item = (EpisodeId, &Episode)> {
        self.episodes.iter().enumerate().map(|(i, e)| (EpisodeId(i), e))
    }

    pub fn temporal_constraints(
        &self,
    ) -> impl Iterator<Item = (TemporalConstraintId, &TemporalConstraint)> {
        self.temporal_constraints
            .iter()
            .enumerate()
            .map(|(i, tc)| (TemporalConstraintId(i), tc))
    }

    pub fn state_variables(&self) -> impl Iterator<Item = (StateVariableId, &StateVariable)> {
        self.state_variables
            .iter()
            .enumerate()
            .map(|(i, sv)| (StateVariableId(i), sv))
    }

    // ---- guards ----

    pub fn guard(&self, element: impl Into<GuardedRef>) -> Result<&Guard> {
        match element.into() {
            GuardedRef::Event(id) => Ok(&self.event(id)?.guard),
            GuardedRef::Episode(id) => Ok(&self.episode(id)?.guard),
            GuardedRef::Temporal(id) => Ok(&self.temporal_constraint(id)?.guard),
            GuardedRef::State(id) => Ok(&self.state_constraint(id)?.guard),
        }
    }

    /// Current support of a guarded element.
    pub fn support(&self, element: impl Into<GuardedRef>) -> Result<&Support> {
        Ok(self.guard(element)?.support())
    }

    fn guard_slot(&mut self, element: GuardedRef) -> Result<&mut Guard> {
        match element {
            GuardedRef::Event(id) => self
                .events
                .get_mut(id.0)
                .map(|e| &mut e.guard)
                .ok_or_else(|| PlanError::Id(format!("no event {}", id))),
            GuardedRef::Episode(id) => Ok(&mut self.episode_mut(id)?.guard),
            GuardedRef::Temporal(id) => Ok(&mut self.temporal_constraint_mut(id)?.guard),
            GuardedRef::State(id) => self
                .state_constraints
                .get_mut(id.0)
                .map(|sc| &mut sc.guard)
                .ok_or_else(|| PlanError::Id(format!("no state constraint {}", id))),
        }
    }

    /// Mutable guard access that journals the old value first.
    fn guard_mut(&mut self, element: GuardedRef) -> Result<&mut Guard> {
        let needs_snapshot = self
            .journal
            .as_ref()
            .is_some_and(|j| j.predates(element) && !j.guards.contains_key(&element));
        if needs_snapshot {
            let old = self.guard(element)?.clone();
            if let Some(journal) = self.journal.as_mut() {
                journal.guards.insert(element, old);
            }
        }
        self.guard_slot(element)
    }

    /// AND `support` into an element's guard.
    pub fn and_support(&mut self, element: impl Into<GuardedRef>, support: &Support) -> Result<()> {
        self.guard_mut(element.into())?.and(support)?;
        Ok(())
    }

    /// Replace an element's support. The inconsistent support is rejected.
    pub fn set_support(&mut self, element: impl Into<GuardedRef>, support: Support) -> Result<()> {
        self.guard_mut(element.into())?.set(support)?;
        Ok(())
    }

    /// Append a literal to every conjunction of an element's guard.
    pub fn add_support_assignment(
        &mut self,
        element: impl Into<GuardedRef>,
        assignment: &ChoiceAssignment,
    ) -> Result<()> {
        self.guard_mut(element.into())?.add_assignment(assignment);
        Ok(())
    }

    /// Replace an element's support with a single conjunction.
    pub fn set_support_conjunction(
        &mut self,
        element: impl Into<GuardedRef>,
        conjunction: Conjunction,
    ) -> Result<()> {
        self.guard_mut(element.into())?.set_conjunction(conjunction);
        Ok(())
    }

    /// Reset an element's guard to always true.
    pub fn clear_support(&mut self, element: impl Into<GuardedRef>) -> Result<()> {
        self.guard_mut(element.into())?.clear();
        Ok(())
    }

    // ---- creation ----

    /// Create an event with a default identity.
    pub fn add_event(&mut self) -> EventId {
        self.add_event_with(Identity::allocate("Event"))
    }

    pub fn add_event_with(&mut self, identity: Identity) -> EventId {
        self.events.push(Event::new(identity));
        EventId(self.events.len() - 1)
    }

    /// Create a choice event.
    pub fn add_choice(&mut self, spec: ChoiceSpec) -> Result<EventId> {
        let event = spec.build(self.probability_tolerance)?;
        debug!(choice_id = %event.id(), "Created choice");
        self.events.push(event);
        Ok(EventId(self.events.len() - 1))
    }

    pub fn add_state_variable(
        &mut self,
        name: impl Into<String>,
        domain: StateDomain,
    ) -> Result<StateVariableId> {
        domain.validate()?;
        self.state_variables.push(StateVariable {
            identity: Identity::allocate("StateVariable").with_name(name),
            domain,
        });
        Ok(StateVariableId(self.state_variables.len() - 1))
    }

    /// Create a temporal constraint guarded by `AND(start, end)`.
    pub fn add_temporal_constraint(
        &mut self,
        start: EventId,
        end: EventId,
        spec: &DurationSpec,
    ) -> Result<TemporalConstraintId> {
        let bounds = spec.resolve()?;
        self.push_temporal_constraint(start, end, bounds, None)
    }

    /// Push a constraint. Without an explicit guard, the endpoints' AND is used.
    pub(crate) fn push_temporal_constraint(
        &mut self,
        start: EventId,
        end: EventId,
        bounds: TemporalBounds,
        guard: Option<Support>,
    ) -> Result<TemporalConstraintId> {
        let support = match guard {
            Some(support) => support,
            None => self.endpoint_support(start, end)?,
        };
        let mut guard = Guard::new();
        guard.set(support)?;

        self.temporal_constraints.push(TemporalConstraint {
            identity: Identity::allocate("TemporalConstraint"),
            guard,
            start,
            end,
            bounds,
        });
        Ok(TemporalConstraintId(self.temporal_constraints.len() - 1))
    }

    fn endpoint_support(&self, start: EventId, end: EventId) -> Result<Support> {
        let start_support = self.support(start)?;
        let end_support = self.support(end)?;
        Ok(start_support.try_and(end_support)?)
    }

    fn check_scope(&self, scope: &[StateVariableId]) -> Result<()> {
        for (i, var) in scope.iter().enumerate() {
            self.state_variable(*var)?;
            if scope[..i].contains(var) {
                return Err(PlanError::InvalidType(
                    "state constraint scope must list distinct variables".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Constraint `scope[i] = values[i]`.
    pub fn add_assignment_constraint(
        &mut self,
        scope: Vec<StateVariableId>,
        values: Vec<StateValue>,
    ) -> Result<StateConstraintId> {
        self.check_scope(&scope)?;
        if scope.len() != values.len() {
            return Err(PlanError::InvalidType(
                "scope and values must have the same length".to_string(),
            ));
        }
        for (var, value) in scope.iter().zip(&values) {
            let variable = self.state_variable(*var)?;
            if !variable.in_domain(value) {
                return Err(PlanError::InvalidType(format!(
                    "'{}' is not in the domain of state variable {}",
                    value,
                    variable.name()
                )));
            }
        }
        Ok(self.push_state_constraint(scope, StateConstraintKind::Assignment { values }))
    }

    /// Constraint `sum(coef[i] * scope[i]) rel rhs`.
    pub fn add_linear_constraint(
        &mut self,
        scope: Vec<StateVariableId>,
        coef: Vec<f64>,
        rel: Relation,
        rhs: f64,
    ) -> Result<StateConstraintId> {
        self.check_scope(&scope)?;
        if scope.len() != coef.len() {
            return Err(PlanError::InvalidType(
                "scope and coefficients must have the same length".to_string(),
            ));
        }
        Ok(self.push_state_constraint(scope, StateConstraintKind::Linear { coef, rel, rhs }))
    }

    fn push_state_constraint(
        &mut self,
        scope: Vec<StateVariableId>,
        kind: StateConstraintKind,
    ) -> StateConstraintId {
        self.state_constraints.push(StateConstraint {
            identity: Identity::allocate("StateConstraint"),
            guard: Guard::new(),
            scope,
            kind,
        });
        StateConstraintId(self.state_constraints.len() - 1)
    }

    /// Bound the probability of violating `constraints` by `risk`.
    pub fn add_chance_constraint(
        &mut self,
        constraints: Vec<ConstraintRef>,
        risk: f64,
    ) -> Result<ChanceConstraintId> {
        if !(0.0..=1.0).contains(&risk) {
            return Err(PlanError::InvalidValue(format!(
                "chance constraint risk must be a valid probability, got {}",
                risk
            )));
        }
        for constraint in &constraints {
            match constraint {
                ConstraintRef::Temporal(id) => {
                    self.temporal_constraint(*id)?;
                }
                ConstraintRef::State(id) => {
                    self.state_constraint(*id)?;
                }
                ConstraintRef::Chance(id) => {
                    self.chance_constraint(*id)?;
                }
            }
        }
        self.chance_constraints.push(ChanceConstraint {
            identity: Identity::allocate("ChanceConstraint"),
            risk,
            constraints,
        });
        Ok(ChanceConstraintId(self.chance_constraints.len() - 1))
    }

    /// Create a primitive episode.
    pub fn add_episode(&mut self, spec: EpisodeSpec) -> Result<EpisodeId> {
        for assignment in [
            &spec.start_conditions,
            &spec.end_conditions,
            &spec.start_effects,
            &spec.end_effects,
        ] {
            self.validate_state_assignment(assignment)?;
        }
        for sc in spec
            .start_state_constraints
            .iter()
            .chain(&spec.end_state_constraints)
            .chain(&spec.during_state_constraints)
            .chain(&spec.overall_state_constraints)
        {
            self.state_constraint(*sc)?;
        }

        self.atomically(|graph| {
            let start = match spec.start {
                Some(start) => start,
                None => graph.add_event(),
            };
            let end = match spec.end {
                Some(end) => end,
                None => graph.add_event(),
            };
            let id = graph.push_episode(EpisodeDraft {
                identity: Identity::resolve("Episode", spec.id, spec.name),
                start,
                end,
                duration: spec.duration.unwrap_or_default(),
                action: spec.action.unwrap_or_default(),
                composition: Composition::Primitive,
                temporal_constraints: BTreeSet::new(),
                terminal: spec.terminal,
            })?;

            let episode = graph.episode_mut(id)?;
            episode.start_conditions = spec.start_conditions;
            episode.end_conditions = spec.end_conditions;
            episode.start_effects = spec.start_effects;
            episode.end_effects = spec.end_effects;
            episode.start_state_constraints.extend(&spec.start_state_constraints);
            episode.end_state_constraints.extend(&spec.end_state_constraints);
            episode.during_state_constraints.extend(&spec.during_state_constraints);
            for sc in &spec.overall_state_constraints {
                episode.start_state_constraints.insert(*sc);
                episode.end_state_constraints.insert(*sc);
                episode.during_state_constraints.insert(*sc);
            }
            Ok(id)
        })
    }

    /// Push an episode and its duration constraint.
    pub(crate) fn push_episode(&mut self, draft: EpisodeDraft) -> Result<EpisodeId> {
        self.event(draft.start)?;
        self.event(draft.end)?;
        let duration = self.duration_constraint(draft.start, draft.end, &draft.duration)?;

        debug!(
            episode_id = %draft.identity.id(),
            kind = draft.composition.as_str(),
            children = draft.composition.internal_episodes().len(),
            terminal = draft.terminal,
            "Created episode"
        );

        self.episodes.push(Episode {
            identity: draft.identity,
            guard: Guard::new(),
            start: draft.start,
            end: draft.end,
            duration,
            action: draft.action,
            start_conditions: StateAssignment::new(),
            end_conditions: StateAssignment::new(),
            start_effects: StateAssignment::new(),
            end_effects: StateAssignment::new(),
            temporal_constraints: draft.temporal_constraints,
            start_state_constraints: BTreeSet::new(),
            end_state_constraints: BTreeSet::new(),
            during_state_constraints: BTreeSet::new(),
            terminal: draft.terminal,
            composition: draft.composition,
        });
        Ok(EpisodeId(self.episodes.len() - 1))
    }

    /// Duration anchored to `(start, end)`, narrowed to the end event's support.
    fn duration_constraint(
        &mut self,
        start: EventId,
        end: EventId,
        spec: &DurationSpec,
    ) -> Result<TemporalConstraintId> {
        let bounds = spec.resolve()?;
        let support = self.endpoint_support(start, end)?;
        let support = support.try_and(self.support(end)?)?;
        self.push_temporal_constraint(start, end, bounds, Some(support))
    }

    // ---- episode mutation ----

    /// Replace an episode's duration, re-anchored to its start and end.
    pub fn set_duration(&mut self, episode: EpisodeId, spec: &DurationSpec) -> Result<TemporalConstraintId> {
        let (start, end) = {
            let ep = self.episode(episode)?;
            (ep.start, ep.end)
        };
        let duration = self.duration_constraint(start, end, spec)?;
        self.episode_mut(episode)?.duration = duration;
        Ok(duration)
    }

    pub fn add_episode_temporal_constraint(
        &mut self,
        episode: EpisodeId,
        constraint: TemporalConstraintId,
    ) -> Result<()> {
        self.temporal_constraint(constraint)?;
        self.episode_mut(episode)?.temporal_constraints.insert(constraint);
        Ok(())
    }

    pub fn add_start_state_constraint(
        &mut self,
        episode: EpisodeId,
        constraint: StateConstraintId,
    ) -> Result<()> {
        self.state_constraint(constraint)?;
        self.episode_mut(episode)?.start_state_constraints.insert(constraint);
        Ok(())
    }

    pub fn add_end_state_constraint(
        &mut self,
        episode: EpisodeId,
        constraint: StateConstraintId,
    ) -> Result<()> {
        self.state_constraint(constraint)?;
        self.episode_mut(episode)?.end_state_constraints.insert(constraint);
        Ok(())
    }

    /// Add a during constraint. Internal episodes receive it as an overall
    /// constraint, recursively.
    pub fn add_during_state_constraint(
        &mut self,
        episode: EpisodeId,
        constraint: StateConstraintId,
    ) -> Result<()> {
        self.state_constraint(constraint)?;
        let ep = self.episode_mut(episode)?;
        ep.during_state_constraints.insert(constraint);
        let internal = ep.internal_episodes().to_vec();
        for child in internal {
            self.add_overall_state_constraint(child, constraint)?;
        }
        Ok(())
    }

    /// Add a constraint to the start, end and during sets.
    pub fn add_overall_state_constraint(
        &mut self,
        episode: EpisodeId,
        constraint: StateConstraintId,
    ) -> Result<()> {
        self.add_start_state_constraint(episode, constraint)?;
        self.add_end_state_constraint(episode, constraint)?;
        self.add_during_state_constraint(episode, constraint)
    }

    /// Strip a constraint from every episode. Durations equal to it are reset
    /// to the unconstrained default.
    pub(crate) fn detach_temporal_constraint(&mut self, constraint: TemporalConstraintId) -> Result<()> {
        let reset: Vec<_> = self
            .episodes
            .iter()
            .enumerate()
            .filter(|(_, episode)| episode.duration == constraint)
            .map(|(i, episode)| (EpisodeId(i), episode.start, episode.end))
            .collect();

        // Replacement durations are pushed before any episode is touched.
        let mut replacements = Vec::with_capacity(reset.len());
        for (episode, start, end) in reset {
            let duration = self.duration_constraint(start, end, &DurationSpec::unconstrained())?;
            replacements.push((episode, duration));
        }

        for episode in &mut self.episodes {
            episode.temporal_constraints.remove(&constraint);
        }
        for (episode, duration) in replacements {
            self.episode_mut(episode)?.duration = duration;
        }
        Ok(())
    }

    /// Recompute a constraint's guard from its endpoints.
    pub(crate) fn refresh_temporal_guard(&mut self, constraint: TemporalConstraintId) -> Result<()> {
        let (start, end) = {
            let tc = self.temporal_constraint(constraint)?;
            (tc.start, tc.end)
        };
        let support = self.endpoint_support(start, end)?;
        self.set_support(constraint, support)
    }

    pub(crate) fn set_bounds(&mut self, constraint: TemporalConstraintId, lb: f64, ub: f64) -> Result<()> {
        self.temporal_constraint_mut(constraint)?.set_bounds(lb, ub)
    }

    // ---- queries ----

    /// Check that every variable exists and every value is in its domain.
    pub fn validate_state_assignment(&self, assignment: &StateAssignment) -> Result<()> {
        for (var, value) in assignment {
            let variable = self.state_variable(*var)?;
            if !variable.in_domain(value) {
                return Err(PlanError::InvalidType(format!(
                    "invalid assignment {}={}",
                    variable.name(),
                    value
                )));
            }
        }
        Ok(())
    }

    /// Every temporal constraint inside an episode, durations included.
    pub fn all_temporal_constraints(&self, episode: EpisodeId) -> Result<BTreeSet<TemporalConstraintId>> {
        let ep = self.episode(episode)?;
        let mut all = ep.constraints_with_duration();
        for child in ep.internal_episodes() {
            all.extend(self.all_temporal_constraints(*child)?);
        }
        Ok(all)
    }

    /// Every state constraint attached to an episode or its internal episodes.
    pub fn all_state_constraints(&self, episode: EpisodeId) -> Result<BTreeSet<StateConstraintId>> {
        let ep = self.episode(episode)?;
        let mut all = ep.state_constraints();
        for child in ep.internal_episodes() {
            all.extend(self.all_state_constraints(*child)?);
        }
        Ok(all)
    }

    fn same_event(&self, a: EventId, b: EventId) -> Result<bool> {
        let (a, b) = (self.event(a)?, self.event(b)?);
        Ok(a.id() == b.id() || a.name() == b.name())
    }

    /// Whether two constraints relate the same events, with the same type and
    /// support.
    pub fn constrain_same_events(
        &self,
        a: TemporalConstraintId,
        b: TemporalConstraintId,
    ) -> Result<bool> {
        let (tc_a, tc_b) = (self.temporal_constraint(a)?, self.temporal_constraint(b)?);
        Ok(self.same_event(tc_a.start, tc_b.start)?
            && self.same_event(tc_a.end, tc_b.end)?
            && tc_a.kind() == tc_b.kind()
            && tc_a.guard.support() == tc_b.guard.support())
    }

    /// Same events, and the same bounds and distribution.
    pub fn is_equivalent(&self, a: TemporalConstraintId, b: TemporalConstraintId) -> Result<bool> {
        let (tc_a, tc_b) = (self.temporal_constraint(a)?, self.temporal_constraint(b)?);
        Ok(self.constrain_same_events(a, b)? && tc_a.bounds == tc_b.bounds)
    }

    /// Whether a constraint relates an event to itself.
    pub(crate) fn is_self_loop(&self, constraint: TemporalConstraintId) -> Result<bool> {
        let tc = self.temporal_constraint(constraint)?;
        self.same_event(tc.start, tc.end)
    }

    /// Readable form: `Name=value ...` or `+3*C1-4*C2 = 2`.
    pub fn state_constraint_formula(&self, constraint: StateConstraintId) -> Result<String> {
        let sc = self.state_constraint(constraint)?;
        let mut formula = String::new();
        match &sc.kind {
            StateConstraintKind::Assignment { values } => {
                for (var, value) in sc.scope.iter().zip(values) {
                    formula.push_str(&format!("{}={} ", self.state_variable(*var)?.name(), value));
                }
            }
            StateConstraintKind::Linear { coef, rel, rhs } => {
                for (var, c) in sc.scope.iter().zip(coef) {
                    let sign = if *c < 0.0 { '-' } else { '+' };
                    formula.push_str(&format!("{}{}*{}", sign, c.abs(), self.state_variable(*var)?.name()));
                }
                formula.push_str(&format!(" {} {}", rel, rhs));
            }
        }
        Ok(formula)
    }
}
