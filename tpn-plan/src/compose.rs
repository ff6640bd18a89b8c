//! Episode algebra: sequence, parallel and choose composition.
//!
//! Every operator runs atomically on the graph. If any support intersection
//! comes out empty, the graph is restored and no composite episode exists.

use std::collections::BTreeSet;

use tpn_support::Support;
use tracing::debug;

use crate::config::{PlanConfig, SequenceMode};
use crate::constraint::{DurationSpec, TemporalBounds, TemporalKind};
use crate::element::Identity;
use crate::episode::Composition;
use crate::graph::{EpisodeDraft, PlanGraph};
use crate::types::{EpisodeId, EventId, PlanError, Result, TemporalConstraintId};

/// Overrides and settings for one composition.
#[derive(Debug, Clone, Default)]
pub struct CompositionOptions {
    pub start: Option<EventId>,
    pub end: Option<EventId>,
    /// `[0, 0]` instead of `[0, inf]` between sequenced episodes
    pub no_wait: Option<bool>,
    pub sequence_mode: Option<SequenceMode>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub action: Option<String>,
    pub duration: Option<DurationSpec>,
}

impl CompositionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start(mut self, start: EventId) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: EventId) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_no_wait(mut self, no_wait: bool) -> Self {
        self.no_wait = Some(no_wait);
        self
    }

    pub fn with_sequence_mode(mut self, mode: SequenceMode) -> Self {
        self.sequence_mode = Some(mode);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_duration(mut self, duration: DurationSpec) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Fill unset settings from `config`.
    pub fn inherit(mut self, config: &PlanConfig) -> Self {
        self.no_wait.get_or_insert(config.no_wait);
        self.sequence_mode.get_or_insert(config.sequence_mode);
        self
    }

    fn into_draft(
        self,
        start: EventId,
        end: EventId,
        composition: Composition,
        temporal_constraints: BTreeSet<TemporalConstraintId>,
        terminal: bool,
    ) -> EpisodeDraft {
        EpisodeDraft {
            identity: Identity::resolve("Episode", self.id, self.name),
            start,
            end,
            duration: self.duration.unwrap_or_default(),
            action: self.action.unwrap_or_default(),
            composition,
            temporal_constraints,
            terminal,
        }
    }
}

fn precedence(ub: f64) -> TemporalBounds {
    TemporalBounds {
        kind: TemporalKind::Controllable,
        lb: 0.0,
        ub,
        distribution: None,
    }
}

/// Execute `episodes` one after the other.
///
/// Each episode's end support is pushed into the next episode, and a
/// controllable `[0, inf]` (or `[0, 0]` under no-wait) constraint links them.
/// A terminal episode can only come last; the sequence is then terminal too.
pub fn sequence(
    graph: &mut PlanGraph,
    episodes: &[EpisodeId],
    options: CompositionOptions,
) -> Result<EpisodeId> {
    let (first, last) = match (episodes.first(), episodes.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(PlanError::Composition(
                "a sequence needs at least one episode".to_string(),
            ))
        }
    };

    graph.atomically(|graph| {
        let ub = if options.no_wait.unwrap_or(false) { 0.0 } else { f64::INFINITY };
        let mode = options.sequence_mode.unwrap_or_default();
        let first_start = graph.episode(first)?.start();
        let last_end = graph.episode(last)?.end();
        let mut constraints = BTreeSet::new();

        let (start, end) = match mode {
            SequenceMode::Optimized => (
                options.start.unwrap_or(first_start),
                options.end.unwrap_or(last_end),
            ),
            SequenceMode::BoundaryEvents => {
                let start = options.start.unwrap_or_else(|| graph.add_event());
                let end = options.end.unwrap_or_else(|| graph.add_event());
                constraints.insert(graph.push_temporal_constraint(start, first_start, precedence(ub), None)?);
                (start, end)
            }
        };

        for pair in episodes.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            let prev_episode = graph.episode(prev)?;
            if prev_episode.is_terminal() {
                return Err(PlanError::Composition(format!(
                    "cannot execute terminal episode '{}' in sequence with others",
                    prev_episode.id()
                )));
            }
            let prev_end = prev_episode.end();

            let end_support = graph.support(prev_end)?.clone();
            propagate_support(graph, next, &end_support)?;

            let next_start = graph.episode(next)?.start();
            let guard = graph.support(prev_end)?.clone();
            constraints.insert(graph.push_temporal_constraint(prev_end, next_start, precedence(ub), Some(guard))?);
        }

        if mode == SequenceMode::BoundaryEvents {
            let last_support = graph.support(last_end)?.clone();
            graph.set_support(end, last_support.clone())?;
            constraints.insert(graph.push_temporal_constraint(last_end, end, precedence(ub), Some(last_support))?);
        }

        let terminal = graph.episode(last)?.is_terminal();
        let children = episodes.len();
        let id = graph.push_episode(options.into_draft(
            start,
            end,
            Composition::Sequence(episodes.to_vec()),
            constraints,
            terminal,
        ))?;
        debug!(episode_id = %graph.episode(id)?.id(), ?mode, children, "Composed sequence");
        Ok(id)
    })
}

/// Execute `episodes` concurrently between a fresh start and end.
///
/// The end event exists only when every branch's end does, so its support is
/// the AND of all branch ends and the end-side constraints share that guard.
pub fn parallel(
    graph: &mut PlanGraph,
    episodes: &[EpisodeId],
    options: CompositionOptions,
) -> Result<EpisodeId> {
    if episodes.is_empty() {
        return Err(PlanError::Composition(
            "a parallel composition needs at least one episode".to_string(),
        ));
    }
    for episode in episodes {
        let episode = graph.episode(*episode)?;
        if episode.is_terminal() {
            return Err(PlanError::Composition(format!(
                "cannot execute terminal episode '{}' in parallel with others",
                episode.id()
            )));
        }
    }

    graph.atomically(|graph| {
        let start = match options.start {
            Some(start) => start,
            None => graph.add_event(),
        };
        let end = match options.end {
            Some(end) => end,
            None => graph.add_event(),
        };

        let mut constraints = BTreeSet::new();
        let mut end_side = Vec::with_capacity(episodes.len());
        for episode in episodes {
            let (branch_start, branch_end) = {
                let ep = graph.episode(*episode)?;
                (ep.start(), ep.end())
            };
            constraints.insert(graph.push_temporal_constraint(
                start,
                branch_start,
                precedence(f64::INFINITY),
                None,
            )?);
            end_side.push(graph.push_temporal_constraint(
                branch_end,
                end,
                precedence(f64::INFINITY),
                None,
            )?);
            let branch_support = graph.support(branch_end)?.clone();
            graph.and_support(end, &branch_support)?;
        }

        let joint = graph.support(end)?.clone();
        for tc in end_side {
            graph.set_support(tc, joint.clone())?;
            constraints.insert(tc);
        }

        let children = episodes.len();
        let id = graph.push_episode(options.into_draft(
            start,
            end,
            Composition::Parallel(episodes.to_vec()),
            constraints,
            false,
        ))?;
        debug!(episode_id = %graph.episode(id)?.id(), children, "Composed parallel");
        Ok(id)
    })
}

/// Branch on `choice`: episode `i` runs when the choice takes domain value `i`.
///
/// The choice event is always the composite's start; a start override is
/// ignored. Terminal branches do not reach the converging end event, whose
/// support then excludes their values. If every branch is terminal, so is the
/// composite.
pub fn choose(
    graph: &mut PlanGraph,
    choice: EventId,
    episodes: &[EpisodeId],
    options: CompositionOptions,
) -> Result<EpisodeId> {
    let var = graph.choice(choice)?.var().clone();
    if var.arity() != episodes.len() {
        return Err(PlanError::Composition(format!(
            "choice {} has {} values but {} episodes were given",
            var.label(),
            var.arity(),
            episodes.len()
        )));
    }
    if options.start.is_some() {
        debug!(choice_id = %var.label(), "Ignoring start override, the choice event starts the episode");
    }

    graph.atomically(|graph| {
        let end = match options.end {
            Some(end) => end,
            None => graph.add_event(),
        };

        let mut constraints = BTreeSet::new();
        let mut negations = Vec::new();
        for (value, episode) in var.domain().iter().zip(episodes) {
            let assignment = var.is(value.clone());
            propagate_support(graph, *episode, &Support::from_assignment(assignment.clone()))?;

            let (branch_start, branch_end, terminal) = {
                let ep = graph.episode(*episode)?;
                (ep.start(), ep.end(), ep.is_terminal())
            };

            let tc = graph.push_temporal_constraint(choice, branch_start, precedence(f64::INFINITY), None)?;
            graph.add_support_assignment(tc, &assignment)?;
            constraints.insert(tc);

            if terminal {
                negations.push(var.is_not(value.clone()));
            } else {
                let tc = graph.push_temporal_constraint(branch_end, end, precedence(f64::INFINITY), None)?;
                graph.add_support_assignment(tc, &assignment)?;
                constraints.insert(tc);
            }
        }

        let mut terminal = false;
        if negations.len() == var.arity() {
            terminal = true;
        } else if !negations.is_empty() {
            graph.set_support_conjunction(end, negations.into_iter().collect())?;
        }

        let children = episodes.len();
        let id = graph.push_episode(options.into_draft(
            choice,
            end,
            Composition::Choose {
                choice,
                branches: episodes.to_vec(),
            },
            constraints,
            terminal,
        ))?;
        debug!(episode_id = %graph.episode(id)?.id(), choice_id = %var.label(), children, terminal, "Composed choice");
        Ok(id)
    })
}

/// AND `support` into an episode, its events and duration, and, for
/// composites, into every internal constraint and internal episode.
pub fn propagate_support(graph: &mut PlanGraph, episode: EpisodeId, support: &Support) -> Result<()> {
    graph.atomically(|graph| propagate(graph, episode, support))
}

fn propagate(graph: &mut PlanGraph, episode: EpisodeId, support: &Support) -> Result<()> {
    let ep = graph.episode(episode)?;
    let (start, end, duration) = (ep.start(), ep.end(), ep.duration());
    let composite = !ep.is_primitive();
    let constraints: Vec<_> = ep.temporal_constraints().iter().copied().collect();
    let internal = ep.internal_episodes().to_vec();

    graph.and_support(episode, support)?;
    graph.and_support(start, support)?;
    graph.and_support(end, support)?;
    graph.and_support(duration, support)?;

    if composite {
        for tc in constraints {
            graph.and_support(tc, support)?;
        }
        for child in internal {
            propagate(graph, child, support)?;
        }
    }
    Ok(())
}
