//! Choice hierarchy recovered from supports.
//!
//! Choices sharing a support form a cluster. A choice activates a cluster
//! when assigning one of its values is the single step separating the
//! choice's own support from the cluster's.

use std::collections::BTreeMap;

use tpn_support::{ChoiceAssignment, ChoiceVar, Conjunction, DomainValue, Support};

use crate::program::Program;
use crate::types::{EventId, Result, TemporalConstraintId};

/// Elements that share one support.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportCluster<T> {
    pub support: Support,
    pub members: Vec<T>,
}

/// Partition elements by identical support, fewest literals first.
///
/// Members keep their input order, and clusters with equal literal counts
/// keep the order in which they were first seen.
pub fn group_by_support<T>(elements: impl IntoIterator<Item = (T, Support)>) -> Vec<SupportCluster<T>> {
    let mut clusters: Vec<SupportCluster<T>> = Vec::new();
    for (element, support) in elements {
        match clusters.iter_mut().find(|cluster| cluster.support == support) {
            Some(cluster) => cluster.members.push(element),
            None => clusters.push(SupportCluster {
                support,
                members: vec![element],
            }),
        }
    }
    clusters.sort_by_key(|cluster| cluster.support.literal_count());
    clusters
}

/// Which clusters each choice value unlocks: `(value, negated) -> choices`.
pub type ChoiceActivation = BTreeMap<EventId, BTreeMap<(DomainValue, bool), Vec<EventId>>>;

/// Read-only view of a program's choice structure.
#[derive(Debug, Clone)]
pub struct PlanTraverser {
    clusters: Vec<SupportCluster<EventId>>,
    activation: ChoiceActivation,
    temporal_constraints: Vec<(TemporalConstraintId, Support)>,
}

impl PlanTraverser {
    pub fn new(program: &mut Program) -> Result<Self> {
        let choices = program.choices()?;
        let constraints = program.temporal_constraints()?;
        let graph = program.graph();

        let mut vars = BTreeMap::new();
        let mut elements = Vec::with_capacity(choices.len());
        for choice in choices {
            vars.insert(choice, graph.choice(choice)?.var().clone());
            elements.push((choice, graph.support(choice)?.clone()));
        }
        let clusters = group_by_support(elements);
        let activation = activation_map(&clusters, &vars);

        let temporal_constraints = constraints
            .into_iter()
            .map(|tc| Ok((tc, graph.support(tc)?.clone())))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            clusters,
            activation,
            temporal_constraints,
        })
    }

    pub fn clusters(&self) -> &[SupportCluster<EventId>] {
        &self.clusters
    }

    /// Choices in the least conditioned cluster.
    pub fn initially_active_choices(&self) -> &[EventId] {
        self.clusters
            .first()
            .map(|cluster| cluster.members.as_slice())
            .unwrap_or(&[])
    }

    pub fn choice_activation(&self) -> &ChoiceActivation {
        &self.activation
    }

    /// Choices activated by an assignment of `choice`.
    pub fn activated_choices(&self, choice: EventId, assignment: &ChoiceAssignment) -> &[EventId] {
        self.activation
            .get(&choice)
            .and_then(|values| values.get(&(assignment.value().clone(), assignment.is_negated())))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Constraints whose guard is entailed by `assignments`.
    pub fn active_temporal_constraints(&self, assignments: &Conjunction) -> Vec<TemporalConstraintId> {
        self.temporal_constraints
            .iter()
            .filter(|(_, support)| support.is_active(assignments))
            .map(|(tc, _)| *tc)
            .collect()
    }
}

fn activation_map(
    clusters: &[SupportCluster<EventId>],
    vars: &BTreeMap<EventId, ChoiceVar>,
) -> ChoiceActivation {
    let supports: BTreeMap<EventId, &Support> = clusters
        .iter()
        .flat_map(|cluster| cluster.members.iter().map(move |m| (*m, &cluster.support)))
        .collect();

    let mut activation = ChoiceActivation::new();
    for cluster in clusters.iter().skip(1) {
        for (choice, var) in vars {
            if cluster.members.contains(choice) {
                continue;
            }
            let Some(support) = supports.get(choice) else {
                continue;
            };
            if let Some(assignment) = activating_assignment(var, support, &cluster.support) {
                activation.entry(*choice).or_default().insert(
                    (assignment.value().clone(), assignment.is_negated()),
                    cluster.members.clone(),
                );
            }
        }
    }
    activation
}

/// The single literal over `var` that extends a conjunction of
/// `choice_support` into one of `cluster_support`.
fn activating_assignment(
    var: &ChoiceVar,
    choice_support: &Support,
    cluster_support: &Support,
) -> Option<ChoiceAssignment> {
    for outer in choice_support.conjunctions() {
        for inner in cluster_support.conjunctions() {
            if !outer.is_proper_subset(inner) {
                continue;
            }
            let difference = inner.difference(outer);
            if difference.len() != 1 {
                continue;
            }
            if let Some(assignment) = difference.iter().next() {
                if assignment.var() == var {
                    return Some(assignment.clone());
                }
            };
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::CompositionOptions;
    use crate::episode::EpisodeSpec;
    use crate::event::ChoiceSpec;
    use tpn_support::ChoiceKind;

    fn var(key: u64, label: &str) -> ChoiceVar {
        ChoiceVar::new(key, label, ChoiceKind::Controllable, vec![DomainValue::from("A"), DomainValue::from("B")])
    }

    #[test]
    fn test_group_by_support_orders_by_literals() {
        let x = var(1, "x");
        let y = var(2, "y");
        let xy = Support::from_conjunction([x.is("A"), y.is("B")].into_iter().collect());
        let only_x = Support::from_assignment(x.is("A"));

        let clusters = group_by_support(vec![
            ("deep", xy.clone()),
            ("root", Support::always_true()),
            ("mid", only_x.clone()),
            ("root2", Support::always_true()),
            ("deep2", xy.clone()),
        ]);

        assert_eq!(clusters.len(), 3);
        assert!(clusters[0].support.is_always_true());
        assert_eq!(clusters[0].members, vec!["root", "root2"]);
        assert_eq!(clusters[1].support, only_x);
        assert_eq!(clusters[2].members, vec!["deep", "deep2"]);
    }

    #[test]
    fn test_activating_assignment() {
        let x = var(1, "x");
        let y = var(2, "y");
        let cluster = Support::from_conjunction([x.is("A"), y.is("B")].into_iter().collect());

        let found = activating_assignment(&y, &Support::from_assignment(x.is("A")), &cluster);
        assert_eq!(found, Some(y.is("B")));
        assert_eq!(activating_assignment(&x, &Support::from_assignment(x.is("A")), &cluster), None);
        assert_eq!(activating_assignment(&y, &Support::always_true(), &cluster), None);
    }

    #[test]
    fn test_nested_decisions() {
        let mut program = Program::new();
        let a = program.add_episode(EpisodeSpec::action("a")).unwrap();
        let b = program.add_episode(EpisodeSpec::action("b")).unwrap();
        let c = program.add_episode(EpisodeSpec::action("c")).unwrap();
        let inner = program
            .decide(ChoiceSpec::new(["L", "R"]).with_id("inner"), [a, b], CompositionOptions::new())
            .unwrap();
        let plan = program
            .decide(ChoiceSpec::new(["GO", "WAIT"]).with_id("outer"), [inner, c], CompositionOptions::new())
            .unwrap();
        program.set_plan(plan).unwrap();

        let outer_choice = program.graph().episode(plan).unwrap().start();
        let inner_choice = program.graph().episode(inner).unwrap().start();
        let traverser = PlanTraverser::new(&mut program).unwrap();

        assert_eq!(traverser.initially_active_choices(), &[outer_choice]);
        let go = program.graph().choice(outer_choice).unwrap().var().is("GO");
        assert_eq!(traverser.activated_choices(outer_choice, &go), &[inner_choice]);

        let wait = program.graph().choice(outer_choice).unwrap().var().is("WAIT");
        assert!(traverser.activated_choices(outer_choice, &wait).is_empty());

        let active = traverser.active_temporal_constraints(&Conjunction::single(wait));
        let to_c = program.graph().episode(c).unwrap().start();
        assert!(active
            .iter()
            .any(|tc| program.graph().temporal_constraint(*tc).unwrap().end() == to_c));
        assert!(active.iter().all(|tc| {
            let support = program.graph().support(*tc).unwrap();
            !support.to_string().contains("inner")
        }));
    }
}
