//! Program container: the plan episode, user constraints and initial state,
//! with a memoized traversal of the plan.
//!
//! Builder methods wrap the composition operators in [`compose`](crate::compose),
//! absorbing the user constraints of nested [`Subplan`]s and registering
//! every composite episode by id. Read accessors rebuild the traversal lazily
//! after any mutation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tpn_support::ChoiceKind;
use tracing::{debug, info};

use crate::compose::{self, CompositionOptions};
use crate::config::PlanConfig;
use crate::constraint::{ConstraintRef, DurationSpec, TemporalKind};
use crate::episode::EpisodeSpec;
use crate::event::ChoiceSpec;
use crate::graph::PlanGraph;
use crate::state::{StateAssignment, StateDomain};
use crate::types::{
    ChanceConstraintId, EpisodeId, EventId, PlanError, Result, StateConstraintId,
    StateVariableId, TemporalConstraintId,
};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// A program fragment: a plan episode with the user constraints added while
/// building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subplan {
    plan: EpisodeId,
    temporal_constraints: BTreeSet<TemporalConstraintId>,
}

impl Subplan {
    pub fn plan(&self) -> EpisodeId {
        self.plan
    }

    pub fn temporal_constraints(&self) -> &BTreeSet<TemporalConstraintId> {
        &self.temporal_constraints
    }
}

/// Anything a builder method accepts in place of an episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Episode(EpisodeId),
    Subplan(Subplan),
}

impl From<EpisodeId> for Component {
    fn from(id: EpisodeId) -> Self {
        Self::Episode(id)
    }
}

impl From<Subplan> for Component {
    fn from(subplan: Subplan) -> Self {
        Self::Subplan(subplan)
    }
}

/// Elements reached from the plan episode.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    episodes: BTreeSet<EpisodeId>,
    primitive_episodes: BTreeSet<EpisodeId>,
    internal_temporal_constraints: BTreeSet<TemporalConstraintId>,
    state_constraints: BTreeSet<StateConstraintId>,
    events: BTreeSet<EventId>,
}

impl Traversal {
    /// Every episode, primitive or composite.
    pub fn episodes(&self) -> &BTreeSet<EpisodeId> {
        &self.episodes
    }

    pub fn primitive_episodes(&self) -> &BTreeSet<EpisodeId> {
        &self.primitive_episodes
    }

    /// Constraints created by composition, plus every duration.
    pub fn internal_temporal_constraints(&self) -> &BTreeSet<TemporalConstraintId> {
        &self.internal_temporal_constraints
    }

    pub fn state_constraints(&self) -> &BTreeSet<StateConstraintId> {
        &self.state_constraints
    }

    /// Episode boundaries plus the endpoints of user constraints.
    pub fn events(&self) -> &BTreeSet<EventId> {
        &self.events
    }
}

/// Element counts of a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ProgramSummary {
    pub name: String,
    pub episodes: usize,
    pub primitive_episodes: usize,
    pub events: usize,
    pub choices: usize,
    pub decisions: usize,
    pub observations: usize,
    pub temporal_constraints: usize,
    pub user_temporal_constraints: usize,
    pub state_constraints: usize,
    pub chance_constraints: usize,
    pub state_variables: usize,
}

/// Top-level container of a plan network.
#[derive(Debug)]
pub struct Program {
    graph: PlanGraph,
    config: PlanConfig,
    name: String,
    plan: Option<EpisodeId>,
    initial_state: StateAssignment,
    goal_state: StateAssignment,
    user_temporal_constraints: BTreeSet<TemporalConstraintId>,
    chance_constraints: BTreeSet<ChanceConstraintId>,
    user_state_variables: BTreeSet<StateVariableId>,
    episode_mapping: BTreeMap<String, EpisodeId>,
    traversal: Option<Traversal>,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    pub fn new() -> Self {
        Self::from_config(PlanConfig::default())
    }

    /// Program using `config`, which is validated first.
    pub fn with_config(config: PlanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: PlanConfig) -> Self {
        Self {
            graph: PlanGraph::new().with_probability_tolerance(config.probability_tolerance),
            name: config.program_name.clone(),
            config,
            plan: None,
            initial_state: StateAssignment::new(),
            goal_state: StateAssignment::new(),
            user_temporal_constraints: BTreeSet::new(),
            chance_constraints: BTreeSet::new(),
            user_state_variables: BTreeSet::new(),
            episode_mapping: BTreeMap::new(),
            traversal: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    pub fn graph(&self) -> &PlanGraph {
        &self.graph
    }

    /// Mutable access to the graph. Invalidates the traversal.
    pub fn graph_mut(&mut self) -> &mut PlanGraph {
        self.invalidate();
        &mut self.graph
    }

    pub fn plan(&self) -> Option<EpisodeId> {
        self.plan
    }

    /// Make `component` the plan episode, absorbing its constraints.
    pub fn set_plan(&mut self, component: impl Into<Component>) -> Result<()> {
        let plan = self.assemble(vec![component.into()], |_, episodes| Ok(episodes[0]))?;
        self.plan = Some(plan);
        Ok(())
    }

    pub fn initial_state(&self) -> &StateAssignment {
        &self.initial_state
    }

    pub fn set_initial_state(&mut self, state: StateAssignment) -> Result<()> {
        self.graph.validate_state_assignment(&state)?;
        self.initial_state = state;
        self.invalidate();
        Ok(())
    }

    pub fn goal_state(&self) -> &StateAssignment {
        &self.goal_state
    }

    pub fn set_goal_state(&mut self, state: StateAssignment) -> Result<()> {
        self.graph.validate_state_assignment(&state)?;
        self.goal_state = state;
        Ok(())
    }

    fn invalidate(&mut self) {
        self.traversal = None;
    }

    // ---- elements ----

    pub fn add_event(&mut self) -> EventId {
        self.graph.add_event()
    }

    pub fn add_choice(&mut self, spec: ChoiceSpec) -> Result<EventId> {
        self.graph.add_choice(spec)
    }

    /// Create a primitive episode and register it by id.
    pub fn add_episode(&mut self, spec: EpisodeSpec) -> Result<EpisodeId> {
        let mapping = &mut self.episode_mapping;
        self.graph.atomically(|graph| {
            let id = graph.add_episode(spec)?;
            register_episode(mapping, graph, id)?;
            Ok(id)
        })
    }

    /// Create a state variable and register it with the program.
    pub fn add_state_variable(
        &mut self,
        name: impl Into<String>,
        domain: StateDomain,
    ) -> Result<StateVariableId> {
        let id = self.graph.add_state_variable(name, domain)?;
        self.user_state_variables.insert(id);
        Ok(id)
    }

    // ---- composition ----

    /// Run `components` one after the other.
    pub fn sequence<C>(
        &mut self,
        components: impl IntoIterator<Item = C>,
        options: CompositionOptions,
    ) -> Result<EpisodeId>
    where
        C: Into<Component>,
    {
        let options = options.inherit(&self.config);
        let components = components.into_iter().map(Into::into).collect();
        self.assemble(components, |graph, episodes| {
            compose::sequence(graph, episodes, options)
        })
    }

    /// Run `components` concurrently.
    pub fn parallel<C>(
        &mut self,
        components: impl IntoIterator<Item = C>,
        options: CompositionOptions,
    ) -> Result<EpisodeId>
    where
        C: Into<Component>,
    {
        let options = options.inherit(&self.config);
        let components = components.into_iter().map(Into::into).collect();
        self.assemble(components, |graph, episodes| {
            compose::parallel(graph, episodes, options)
        })
    }

    /// Branch on an existing choice event.
    pub fn choose<C>(
        &mut self,
        choice: EventId,
        components: impl IntoIterator<Item = C>,
        options: CompositionOptions,
    ) -> Result<EpisodeId>
    where
        C: Into<Component>,
    {
        let options = options.inherit(&self.config);
        let components = components.into_iter().map(Into::into).collect();
        self.assemble(components, |graph, episodes| {
            compose::choose(graph, choice, episodes, options)
        })
    }

    /// Branch on a new controllable choice.
    pub fn decide<C>(
        &mut self,
        spec: ChoiceSpec,
        components: impl IntoIterator<Item = C>,
        options: CompositionOptions,
    ) -> Result<EpisodeId>
    where
        C: Into<Component>,
    {
        let kind = spec.ctype;
        let spec = match kind {
            None | Some(ChoiceKind::Controllable) => spec.with_kind(ChoiceKind::Controllable),
            Some(other) => {
                return Err(PlanError::InvalidType(format!(
                    "decisions are controllable, got {}",
                    other
                )))
            }
        };
        self.choose_new(spec, components, options)
    }

    /// Branch on a new uncontrollable or probabilistic choice.
    pub fn observe<C>(
        &mut self,
        spec: ChoiceSpec,
        components: impl IntoIterator<Item = C>,
        options: CompositionOptions,
    ) -> Result<EpisodeId>
    where
        C: Into<Component>,
    {
        match spec.ctype {
            Some(kind) if kind.is_observation() => {}
            Some(kind) => {
                return Err(PlanError::InvalidType(format!(
                    "observations are uncontrollable or probabilistic, got {}",
                    kind
                )))
            }
            None => {
                return Err(PlanError::MissingArgument(
                    "observation choice type".to_string(),
                ))
            }
        }
        self.choose_new(spec, components, options)
    }

    fn choose_new<C>(
        &mut self,
        spec: ChoiceSpec,
        components: impl IntoIterator<Item = C>,
        options: CompositionOptions,
    ) -> Result<EpisodeId>
    where
        C: Into<Component>,
    {
        let options = options.inherit(&self.config);
        let components = components.into_iter().map(Into::into).collect();
        self.assemble(components, |graph, episodes| {
            let choice = graph.add_choice(spec)?;
            compose::choose(graph, choice, episodes, options)
        })
    }

    /// Offer `repetitions` runs of `body`, each preceded by a RUN/STOP decision.
    ///
    /// Decision `i` (counting down from `repetitions`) chooses between
    /// `body` followed by decision `i - 1`, and an empty episode.
    pub fn repeat<F>(
        &mut self,
        mut body: F,
        repetitions: usize,
        run_utility: f64,
        stop_utility: f64,
    ) -> Result<EpisodeId>
    where
        F: FnMut(&mut Program) -> Result<Component>,
    {
        if repetitions == 0 {
            return Err(PlanError::InvalidValue(
                "a loop needs at least one repetition".to_string(),
            ));
        }
        self.repeat_from(&mut body, repetitions, run_utility, stop_utility)
    }

    fn repeat_from(
        &mut self,
        body: &mut dyn FnMut(&mut Program) -> Result<Component>,
        remaining: usize,
        run_utility: f64,
        stop_utility: f64,
    ) -> Result<EpisodeId> {
        let run = if remaining > 1 {
            let once = body(self)?;
            let rest = self.repeat_from(body, remaining - 1, run_utility, stop_utility)?;
            Component::Episode(self.sequence([once, rest.into()], CompositionOptions::new())?)
        } else {
            body(self)?
        };
        let stop = self.add_episode(EpisodeSpec::default())?;

        let labels = &self.config.loop_choice;
        let spec = ChoiceSpec::new([labels.run_label.clone(), labels.stop_label.clone()])
            .with_id(format!("{}{}", labels.prefix, remaining))
            .with_utility(vec![run_utility, stop_utility]);
        self.decide(spec, [run, stop.into()], CompositionOptions::new())
    }

    /// Build a fragment whose user constraints are kept apart from the
    /// program's until the fragment is composed.
    pub fn subplan(
        &mut self,
        build: impl FnOnce(&mut Program) -> Result<EpisodeId>,
    ) -> Result<Subplan> {
        let saved_plan = self.plan.take();
        let saved_constraints = std::mem::take(&mut self.user_temporal_constraints);

        let result = build(self);

        let temporal_constraints =
            std::mem::replace(&mut self.user_temporal_constraints, saved_constraints);
        self.plan = saved_plan;
        self.invalidate();

        let plan = result?;
        Ok(Subplan {
            plan,
            temporal_constraints,
        })
    }

    /// Sequence the current plan with `component`, making the result the plan.
    pub fn append_sequence(&mut self, component: impl Into<Component>) -> Result<EpisodeId> {
        let plan = match self.plan {
            Some(plan) => self.sequence([Component::Episode(plan), component.into()], CompositionOptions::new())?,
            None => self.assemble(vec![component.into()], |_, episodes| Ok(episodes[0]))?,
        };
        self.plan = Some(plan);
        Ok(plan)
    }

    /// Run the current plan in parallel with `component`, making the result
    /// the plan.
    pub fn append_parallel(&mut self, component: impl Into<Component>) -> Result<EpisodeId> {
        let plan = match self.plan {
            Some(plan) => self.parallel([Component::Episode(plan), component.into()], CompositionOptions::new())?,
            None => self.assemble(vec![component.into()], |_, episodes| Ok(episodes[0]))?,
        };
        self.plan = Some(plan);
        Ok(plan)
    }

    /// Resolve components, compose them atomically and register the result.
    fn assemble(
        &mut self,
        components: Vec<Component>,
        op: impl FnOnce(&mut PlanGraph, &[EpisodeId]) -> Result<EpisodeId>,
    ) -> Result<EpisodeId> {
        let mut episodes = Vec::with_capacity(components.len());
        let mut absorbed = BTreeSet::new();
        for component in components {
            match component {
                Component::Episode(id) => {
                    self.graph.episode(id)?;
                    episodes.push(id);
                }
                Component::Subplan(subplan) => {
                    for tc in subplan.temporal_constraints {
                        if self.user_temporal_constraints.contains(&tc) || !absorbed.insert(tc) {
                            return Err(PlanError::DuplicateElement(format!(
                                "temporal constraint {} is already part of the program",
                                self.graph.temporal_constraint(tc)?.id()
                            )));
                        }
                    }
                    episodes.push(subplan.plan);
                }
            }
        }
        if episodes.is_empty() {
            return Err(PlanError::Composition("no episodes to compose".to_string()));
        }

        let mapping = &mut self.episode_mapping;
        let id = self.graph.atomically(|graph| {
            let id = op(graph, &episodes)?;
            for tc in &absorbed {
                graph.refresh_temporal_guard(*tc)?;
            }
            register_episode(mapping, graph, id)?;
            Ok(id)
        })?;

        self.user_temporal_constraints.extend(absorbed);
        self.invalidate();
        Ok(id)
    }

    // ---- constraints ----

    /// Create a user constraint between two events, guarded by the AND of
    /// their supports.
    pub fn add_temporal_constraint(
        &mut self,
        start: EventId,
        end: EventId,
        spec: &DurationSpec,
    ) -> Result<TemporalConstraintId> {
        let tc = self
            .graph
            .atomically(|graph| graph.add_temporal_constraint(start, end, spec))?;
        self.user_temporal_constraints.insert(tc);
        self.invalidate();
        debug!(constraint_id = %self.graph.temporal_constraint(tc)?.id(), "Added user temporal constraint");
        Ok(tc)
    }

    /// Add an existing constraint to the user set, recomputing its guard.
    pub fn register_temporal_constraint(&mut self, tc: TemporalConstraintId) -> Result<()> {
        let id = self.graph.temporal_constraint(tc)?.id().to_string();
        if self.user_temporal_constraints.contains(&tc) {
            return Err(PlanError::DuplicateElement(format!(
                "temporal constraint {} already added",
                id
            )));
        }
        self.graph.atomically(|graph| graph.refresh_temporal_guard(tc))?;
        self.user_temporal_constraints.insert(tc);
        self.invalidate();
        Ok(())
    }

    /// Constraint between the plan's first and last events.
    pub fn add_overall_temporal_constraint(&mut self, spec: &DurationSpec) -> Result<TemporalConstraintId> {
        let (first, last) = (self.first_event()?, self.last_event()?);
        self.add_temporal_constraint(first, last, spec)
    }

    /// Drop a user constraint and detach it from every episode.
    pub fn remove_temporal_constraint(&mut self, tc: TemporalConstraintId) -> Result<()> {
        self.graph.atomically(|graph| graph.detach_temporal_constraint(tc))?;
        self.user_temporal_constraints.remove(&tc);
        self.invalidate();
        Ok(())
    }

    pub fn add_chance_constraint(
        &mut self,
        constraints: Vec<ConstraintRef>,
        risk: f64,
    ) -> Result<ChanceConstraintId> {
        let cc = self.graph.add_chance_constraint(constraints, risk)?;
        self.chance_constraints.insert(cc);
        Ok(cc)
    }

    pub fn register_chance_constraint(&mut self, cc: ChanceConstraintId) -> Result<()> {
        let id = self.graph.chance_constraint(cc)?.id().to_string();
        if !self.chance_constraints.insert(cc) {
            return Err(PlanError::DuplicateElement(format!(
                "chance constraint {} already added",
                id
            )));
        }
        Ok(())
    }

    /// Attach a state constraint to the whole plan.
    pub fn add_overall_state_constraint(&mut self, sc: StateConstraintId) -> Result<()> {
        let plan = self.require_plan()?;
        self.graph.add_overall_state_constraint(plan, sc)?;
        self.invalidate();
        Ok(())
    }

    /// Merge controllable constraints over the same events by intersecting
    /// their bounds.
    ///
    /// A self-loop is dropped when it is controllable with a zero lower
    /// bound, and rejected otherwise. Nothing changes if any check fails.
    pub fn simplify_temporal_constraints(&mut self) -> Result<()> {
        let constraints: Vec<_> = self.temporal_constraints()?.into_iter().collect();
        let mut removed = BTreeSet::new();
        let mut narrowed = BTreeMap::new();

        for (i, tc1) in constraints.iter().enumerate() {
            if removed.contains(tc1) {
                continue;
            }
            let c1 = self.graph.temporal_constraint(*tc1)?;
            if self.graph.is_self_loop(*tc1)? {
                if c1.kind() == TemporalKind::Controllable && c1.lb() == 0.0 {
                    removed.insert(*tc1);
                    continue;
                }
                return Err(PlanError::InvalidType(format!(
                    "self-loop constraint {} with bounds [{}, {}]",
                    c1.id(),
                    c1.lb(),
                    c1.ub()
                )));
            }
            if c1.kind() != TemporalKind::Controllable {
                continue;
            }

            let (mut lb, mut ub) = (c1.lb(), c1.ub());
            for tc2 in &constraints[i + 1..] {
                if removed.contains(tc2) || !self.graph.constrain_same_events(*tc1, *tc2)? {
                    continue;
                }
                let c2 = self.graph.temporal_constraint(*tc2)?;
                lb = lb.max(c2.lb());
                ub = ub.min(c2.ub());
                if lb > ub {
                    return Err(PlanError::InvalidType(format!(
                        "constraints {} and {} have disjoint bounds",
                        c1.id(),
                        c2.id()
                    )));
                }
                removed.insert(*tc2);
            }
            if (lb, ub) != (c1.lb(), c1.ub()) {
                narrowed.insert(*tc1, (lb, ub));
            }
        }

        for (tc, (lb, ub)) in narrowed {
            self.graph.set_bounds(tc, lb, ub)?;
        }
        let removed_count = removed.len();
        for tc in removed {
            self.remove_temporal_constraint(tc)?;
        }
        self.invalidate();
        debug!(removed = removed_count, "Simplified temporal constraints");
        Ok(())
    }

    // ---- traversal ----

    /// The traversal, rebuilt if anything changed since the last read.
    pub fn traversal(&mut self) -> Result<&Traversal> {
        Ok(self.view()?.1)
    }

    fn view(&mut self) -> Result<(&PlanGraph, &Traversal)> {
        let traversal = match self.traversal.take() {
            Some(traversal) => traversal,
            None => self.traverse()?,
        };
        Ok((&self.graph, self.traversal.insert(traversal)))
    }

    fn traverse(&mut self) -> Result<Traversal> {
        let mut traversal = Traversal::default();
        if let Some(plan) = self.plan {
            collect(&self.graph, plan, &mut traversal)?;
        }
        for tc in &self.user_temporal_constraints {
            let tc = self.graph.temporal_constraint(*tc)?;
            traversal.events.insert(tc.start());
            traversal.events.insert(tc.end());
        }
        for episode in &traversal.episodes {
            register_episode(&mut self.episode_mapping, &self.graph, *episode)?;
        }

        let user = &self.user_temporal_constraints;
        self.graph.atomically(|graph| {
            for tc in user {
                graph.refresh_temporal_guard(*tc)?;
            }
            Ok(())
        })?;

        info!(
            program = %self.name,
            episodes = traversal.episodes.len(),
            primitive_episodes = traversal.primitive_episodes.len(),
            events = traversal.events.len(),
            temporal_constraints = traversal.internal_temporal_constraints.len() + self.user_temporal_constraints.len(),
            state_constraints = traversal.state_constraints.len(),
            "Rebuilt program traversal"
        );
        Ok(traversal)
    }

    /// Every registered episode, including ones the plan does not reach.
    pub fn episodes(&mut self) -> Result<BTreeSet<EpisodeId>> {
        self.traversal()?;
        Ok(self.episode_mapping.values().copied().collect())
    }

    pub fn primitive_episodes(&mut self) -> Result<&BTreeSet<EpisodeId>> {
        Ok(self.traversal()?.primitive_episodes())
    }

    pub fn events(&mut self) -> Result<&BTreeSet<EventId>> {
        Ok(self.traversal()?.events())
    }

    pub fn internal_temporal_constraints(&mut self) -> Result<&BTreeSet<TemporalConstraintId>> {
        Ok(self.traversal()?.internal_temporal_constraints())
    }

    pub fn user_defined_temporal_constraints(&self) -> &BTreeSet<TemporalConstraintId> {
        &self.user_temporal_constraints
    }

    /// Internal and user constraints.
    pub fn temporal_constraints(&mut self) -> Result<BTreeSet<TemporalConstraintId>> {
        let mut all = self.internal_temporal_constraints()?.clone();
        all.extend(&self.user_temporal_constraints);
        Ok(all)
    }

    pub fn state_constraints(&mut self) -> Result<&BTreeSet<StateConstraintId>> {
        Ok(self.traversal()?.state_constraints())
    }

    pub fn chance_constraints(&self) -> &BTreeSet<ChanceConstraintId> {
        &self.chance_constraints
    }

    /// Traversed events that are choices.
    pub fn choices(&mut self) -> Result<BTreeSet<EventId>> {
        self.choices_where(|_| true)
    }

    pub fn decisions(&mut self) -> Result<BTreeSet<EventId>> {
        self.choices_where(|kind| !kind.is_observation())
    }

    pub fn observations(&mut self) -> Result<BTreeSet<EventId>> {
        self.choices_where(|kind| kind.is_observation())
    }

    fn choices_where(&mut self, keep: impl Fn(ChoiceKind) -> bool) -> Result<BTreeSet<EventId>> {
        let (graph, traversal) = self.view()?;
        let mut choices = BTreeSet::new();
        for event in traversal.events() {
            if let Some(choice) = graph.event(*event)?.choice() {
                if keep(choice.kind()) {
                    choices.insert(*event);
                }
            }
        }
        Ok(choices)
    }

    /// Variables in state constraint scopes, the initial state and user
    /// registrations.
    pub fn state_variables(&mut self) -> Result<BTreeSet<StateVariableId>> {
        let mut variables = self.user_state_variables.clone();
        variables.extend(self.initial_state.keys());
        let (graph, traversal) = self.view()?;
        for sc in traversal.state_constraints() {
            variables.extend(graph.state_constraint(*sc)?.scope());
        }
        Ok(variables)
    }

    /// Look up a traversed or registered episode by its id.
    pub fn episode_by_id(&mut self, id: &str) -> Result<EpisodeId> {
        self.traversal()?;
        self.episode_mapping
            .get(id)
            .copied()
            .ok_or_else(|| PlanError::Id(format!("no episode with id '{}'", id)))
    }

    fn require_plan(&self) -> Result<EpisodeId> {
        self.plan
            .ok_or_else(|| PlanError::MissingArgument("program has no plan episode".to_string()))
    }

    pub fn first_event(&self) -> Result<EventId> {
        Ok(self.graph.episode(self.require_plan()?)?.start())
    }

    pub fn last_event(&self) -> Result<EventId> {
        Ok(self.graph.episode(self.require_plan()?)?.end())
    }

    /// SHA-256 over the ids and guards of every traversed element.
    ///
    /// Equal for two reads of an unchanged program.
    pub fn fingerprint(&mut self) -> Result<String> {
        use sha2::{Digest, Sha256};

        let user = self.user_temporal_constraints.clone();
        let (graph, traversal) = self.view()?;
        let mut entries = Vec::new();

        for id in traversal.episodes() {
            let episode = graph.episode(*id)?;
            entries.push(format!(
                "episode|{}|{}|{}",
                episode.id(),
                episode.composition().as_str(),
                episode.guard().support()
            ));
        }
        for id in traversal.events() {
            let event = graph.event(*id)?;
            entries.push(format!("event|{}|{}", event.id(), event.guard().support()));
        }
        for id in traversal.internal_temporal_constraints().iter().chain(&user) {
            let tc = graph.temporal_constraint(*id)?;
            entries.push(format!(
                "temporal|{}|{}|{}|{}|{}|{}|{}",
                tc.id(),
                graph.event(tc.start())?.id(),
                graph.event(tc.end())?.id(),
                tc.kind(),
                tc.lb(),
                tc.ub(),
                tc.guard().support()
            ));
        }
        for id in traversal.state_constraints() {
            let sc = graph.state_constraint(*id)?;
            entries.push(format!("state|{}|{}", sc.id(), sc.guard().support()));
        }
        entries.sort();

        let mut hasher = Sha256::new();
        for entry in entries {
            hasher.update(entry.as_bytes());
            hasher.update(b"\n");
        }
        Ok(hex::encode(hasher.finalize()))
    }

    pub fn summary(&mut self) -> Result<ProgramSummary> {
        let choices = self.choices()?.len();
        let decisions = self.decisions()?.len();
        let observations = self.observations()?.len();
        let state_variables = self.state_variables()?.len();
        let temporal_constraints = self.temporal_constraints()?.len();
        let traversal = self.traversal()?;
        let (episodes, primitive_episodes, events, state_constraints) = (
            traversal.episodes().len(),
            traversal.primitive_episodes().len(),
            traversal.events().len(),
            traversal.state_constraints().len(),
        );

        Ok(ProgramSummary {
            name: self.name.clone(),
            episodes,
            primitive_episodes,
            events,
            choices,
            decisions,
            observations,
            temporal_constraints,
            user_temporal_constraints: self.user_temporal_constraints.len(),
            state_constraints,
            chance_constraints: self.chance_constraints.len(),
            state_variables,
        })
    }
}

/// Map an episode's id to its handle. An id already taken by another
/// episode is an error.
fn register_episode(
    mapping: &mut BTreeMap<String, EpisodeId>,
    graph: &PlanGraph,
    episode: EpisodeId,
) -> Result<()> {
    let id = graph.episode(episode)?.id();
    match mapping.get(id) {
        Some(existing) if *existing != episode => Err(PlanError::Id(format!(
            "id '{}' already names a different episode",
            id
        ))),
        Some(_) => Ok(()),
        None => {
            mapping.insert(id.to_string(), episode);
            Ok(())
        }
    }
}

fn collect(graph: &PlanGraph, episode: EpisodeId, traversal: &mut Traversal) -> Result<()> {
    let ep = graph.episode(episode)?;
    traversal.episodes.insert(episode);
    traversal.events.insert(ep.start());
    traversal.events.insert(ep.end());
    traversal.state_constraints.extend(ep.state_constraints());

    if ep.is_primitive() && !traversal.primitive_episodes.insert(episode) {
        return Err(PlanError::DuplicateElement(format!(
            "primitive episode {} appears twice in the plan",
            ep.id()
        )));
    }

    for tc in ep.constraints_with_duration() {
        if !traversal.internal_temporal_constraints.insert(tc) {
            return Err(PlanError::DuplicateElement(format!(
                "temporal constraint {} appears twice in the plan",
                graph.temporal_constraint(tc)?.id()
            )));
        }
    }
    for child in ep.internal_episodes() {
        collect(graph, *child, traversal)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpn_support::Support;

    fn action(program: &mut Program, name: &str) -> EpisodeId {
        program.add_episode(EpisodeSpec::action(name).with_id(name)).unwrap()
    }

    #[test]
    fn test_empty_program() {
        let mut program = Program::new();
        assert_eq!(program.name(), "run()");
        assert!(program.primitive_episodes().unwrap().is_empty());
        assert!(program.events().unwrap().is_empty());
        assert!(matches!(program.first_event(), Err(PlanError::MissingArgument(_))));
    }

    #[test]
    fn test_sequence_registers_composite() {
        let mut program = Program::new();
        let a = action(&mut program, "a");
        let b = action(&mut program, "b");
        let seq = program
            .sequence([a, b], CompositionOptions::new().with_id("ab"))
            .unwrap();
        program.set_plan(seq).unwrap();

        assert_eq!(program.episode_by_id("ab").unwrap(), seq);
        assert_eq!(program.episode_by_id("a").unwrap(), a);
        assert_eq!(
            program.primitive_episodes().unwrap(),
            &[a, b].into_iter().collect::<BTreeSet<_>>()
        );
        assert!(matches!(program.episode_by_id("missing"), Err(PlanError::Id(_))));
    }

    #[test]
    fn test_id_collision_is_rejected() {
        let mut program = Program::new();
        let a = action(&mut program, "a");
        let b = action(&mut program, "b");
        let err = program
            .sequence([a, b], CompositionOptions::new().with_id("a"))
            .unwrap_err();
        assert!(matches!(err, PlanError::Id(_)));
        assert_eq!(program.graph().episodes().count(), 2);
    }

    #[test]
    fn test_duplicate_primitive_in_plan() {
        let mut program = Program::new();
        let a = action(&mut program, "a");
        let b = action(&mut program, "b");
        let plan = program.parallel([a, b, a], CompositionOptions::new()).unwrap();
        program.set_plan(plan).unwrap();
        assert!(matches!(program.events(), Err(PlanError::DuplicateElement(_))));
    }

    #[test]
    fn test_decide_and_observe_kinds() {
        let mut program = Program::new();
        let a = action(&mut program, "a");
        let b = action(&mut program, "b");

        let err = program
            .observe(ChoiceSpec::new(["L", "R"]), [a, b], CompositionOptions::new())
            .unwrap_err();
        assert!(matches!(err, PlanError::MissingArgument(_)));

        let err = program
            .decide(
                ChoiceSpec::new(["L", "R"]).with_kind(ChoiceKind::Probabilistic),
                [a, b],
                CompositionOptions::new(),
            )
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidType(_)));
        let events_before = program.graph().events().count();

        let plan = program
            .observe(
                ChoiceSpec::new(["L", "R"])
                    .with_kind(ChoiceKind::Probabilistic)
                    .with_probability(vec![0.3, 0.7]),
                [a, b],
                CompositionOptions::new(),
            )
            .unwrap();
        program.set_plan(plan).unwrap();
        assert_eq!(program.observations().unwrap().len(), 1);
        assert!(program.decisions().unwrap().is_empty());
        assert_eq!(program.graph().events().count(), events_before + 2);
    }

    #[test]
    fn test_repeat_builds_decision_chain() {
        let mut program = Program::new();
        let plan = program
            .repeat(
                |p| Ok(p.add_episode(EpisodeSpec::action("step"))?.into()),
                3,
                1.0,
                0.0,
            )
            .unwrap();
        program.set_plan(plan).unwrap();

        let decisions = program.decisions().unwrap();
        assert_eq!(decisions.len(), 3);
        let mut ids: Vec<_> = decisions
            .iter()
            .map(|d| program.graph().event(*d).unwrap().id().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["loop-choice-1", "loop-choice-2", "loop-choice-3"]);

        // Three bodies and three empty stop episodes.
        assert_eq!(program.primitive_episodes().unwrap().len(), 6);
        assert!(matches!(
            program.repeat(|p| Ok(p.add_episode(EpisodeSpec::default())?.into()), 0, 1.0, 0.0),
            Err(PlanError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_subplan_constraints_are_absorbed() {
        let mut program = Program::new();
        let outer = action(&mut program, "outer");
        let subplan = program
            .subplan(|p| {
                let a = p.add_episode(EpisodeSpec::action("a"))?;
                let b = p.add_episode(EpisodeSpec::action("b"))?;
                let seq = p.sequence([a, b], CompositionOptions::new())?;
                let (start, end) = {
                    let ep = p.graph().episode(seq)?;
                    (ep.start(), ep.end())
                };
                p.add_temporal_constraint(start, end, &DurationSpec::controllable(0.0, 10.0))?;
                Ok(seq)
            })
            .unwrap();

        assert_eq!(subplan.temporal_constraints().len(), 1);
        assert!(program.user_defined_temporal_constraints().is_empty());

        let tc = *subplan.temporal_constraints().iter().next().unwrap();
        program.append_sequence(outer).unwrap();
        program.append_sequence(subplan.clone()).unwrap();
        assert!(program.user_defined_temporal_constraints().contains(&tc));

        let err = program.sequence([Component::Subplan(subplan)], CompositionOptions::new()).unwrap_err();
        assert!(matches!(err, PlanError::DuplicateElement(_)));
    }

    #[test]
    fn test_register_duplicate_constraint() {
        let mut program = Program::new();
        let (x, y) = (program.add_event(), program.add_event());
        let tc = program
            .add_temporal_constraint(x, y, &DurationSpec::controllable(1.0, 2.0))
            .unwrap();
        assert!(matches!(
            program.register_temporal_constraint(tc),
            Err(PlanError::DuplicateElement(_))
        ));
        assert!(program.events().unwrap().contains(&x));
    }

    #[test]
    fn test_remove_duration_resets_it() {
        let mut program = Program::new();
        let a = program
            .add_episode(EpisodeSpec::action("a").with_duration(DurationSpec::controllable(1.0, 5.0)))
            .unwrap();
        program.set_plan(a).unwrap();
        let duration = program.graph().episode(a).unwrap().duration();

        program.remove_temporal_constraint(duration).unwrap();
        let reset = program.graph().episode(a).unwrap().duration();
        assert_ne!(reset, duration);
        let tc = program.graph().temporal_constraint(reset).unwrap();
        assert_eq!((tc.lb(), tc.ub()), (0.0, f64::INFINITY));
        assert!(!program.temporal_constraints().unwrap().contains(&duration));
    }

    #[test]
    fn test_failed_remove_keeps_constraint() {
        let mut program = Program::new();
        let x = program
            .add_choice(ChoiceSpec::new(["A", "B"]).with_kind(ChoiceKind::Controllable))
            .unwrap();
        let a = action(&mut program, "a");
        let b = action(&mut program, "b");
        let plan = program.parallel([a, b], CompositionOptions::new()).unwrap();
        program.set_plan(plan).unwrap();

        let duration = program.graph().episode(a).unwrap().duration();
        program.register_temporal_constraint(duration).unwrap();
        program.graph_mut().add_episode_temporal_constraint(b, duration).unwrap();

        // The reset duration for `a` cannot hold under both endpoint guards.
        let (x_a, x_b) = {
            let var = program.graph().choice(x).unwrap().var();
            (var.is("A"), var.is("B"))
        };
        let (start, end) = {
            let ep = program.graph().episode(a).unwrap();
            (ep.start(), ep.end())
        };
        let graph = program.graph_mut();
        graph.set_support(start, Support::from_assignment(x_a)).unwrap();
        graph.set_support(end, Support::from_assignment(x_b)).unwrap();
        let constraints_before = program.graph().temporal_constraints().count();

        let err = program.remove_temporal_constraint(duration).unwrap_err();
        assert!(err.is_inconsistent_support());
        assert!(program.user_defined_temporal_constraints().contains(&duration));
        assert_eq!(program.graph().episode(a).unwrap().duration(), duration);
        assert!(program.graph().episode(b).unwrap().temporal_constraints().contains(&duration));
        assert_eq!(program.graph().temporal_constraints().count(), constraints_before);
    }

    #[test]
    fn test_shared_primitive_constraint_in_plan() {
        let mut program = Program::new();
        let a = action(&mut program, "a");
        let b = action(&mut program, "b");
        let plan = program.sequence([a, b], CompositionOptions::new()).unwrap();
        program.set_plan(plan).unwrap();
        assert_eq!(program.primitive_episodes().unwrap().len(), 2);

        let duration = program.graph().episode(a).unwrap().duration();
        program.graph_mut().add_episode_temporal_constraint(b, duration).unwrap();
        assert!(matches!(program.events(), Err(PlanError::DuplicateElement(_))));
    }

    #[test]
    fn test_episodes_include_unreachable() {
        let mut program = Program::new();
        let a = action(&mut program, "a");
        let spare = action(&mut program, "spare");
        program.set_plan(a).unwrap();

        let episodes = program.episodes().unwrap();
        assert!(episodes.contains(&a));
        assert!(episodes.contains(&spare));
        assert!(!program.primitive_episodes().unwrap().contains(&spare));
    }

    #[test]
    fn test_simplify_rejects_bad_self_loop() {
        let mut program = Program::new();
        let x = program.add_event();
        program
            .add_temporal_constraint(x, x, &DurationSpec::controllable(1.0, 2.0))
            .unwrap();
        assert!(matches!(
            program.simplify_temporal_constraints(),
            Err(PlanError::InvalidType(_))
        ));
    }

    #[test]
    fn test_simplify_drops_zero_self_loop() {
        let mut program = Program::new();
        let x = program.add_event();
        let tc = program
            .add_temporal_constraint(x, x, &DurationSpec::controllable(0.0, 0.0))
            .unwrap();
        program.simplify_temporal_constraints().unwrap();
        assert!(!program.user_defined_temporal_constraints().contains(&tc));
    }

    #[test]
    fn test_fingerprint_changes_with_constraints() {
        let mut program = Program::new();
        let a = action(&mut program, "a");
        program.set_plan(a).unwrap();
        let before = program.fingerprint().unwrap();
        assert_eq!(before, program.fingerprint().unwrap());
        assert_eq!(before.len(), 64);

        program.add_overall_temporal_constraint(&DurationSpec::controllable(0.0, 3.0)).unwrap();
        assert_ne!(before, program.fingerprint().unwrap());
    }

    #[test]
    fn test_summary_counts() {
        let mut program = Program::new();
        let level = program
            .add_state_variable("level", StateDomain::Continuous([0.0, 10.0]))
            .unwrap();
        let a = action(&mut program, "a");
        let b = action(&mut program, "b");
        let plan = program
            .decide(ChoiceSpec::new(["A", "B"]), [a, b], CompositionOptions::new())
            .unwrap();
        program.set_plan(plan).unwrap();
        program
            .set_initial_state([(level, 2.0.into())].into_iter().collect())
            .unwrap();

        let summary = program.summary().unwrap();
        assert_eq!(summary.primitive_episodes, 2);
        assert_eq!(summary.episodes, 3);
        assert_eq!(summary.decisions, 1);
        assert_eq!(summary.choices, 1);
        assert_eq!(summary.state_variables, 1);
        // Four branch constraints and three durations.
        assert_eq!(summary.temporal_constraints, 7);
    }
}
