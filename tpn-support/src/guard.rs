//! Guards: a support plus the per-conjunction choice sets derived from it.

use std::collections::BTreeSet;

use crate::assignment::{ChoiceAssignment, ChoiceVar};
use crate::conjunction::Conjunction;
use crate::support::{InconsistentSupport, Support};

/// Support of a conditional element.
///
/// `decisions` and `observations` hold, for each conjunction of the support
/// in order, the controllable and the observed variables it references. They
/// are recomputed on every write and never set directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    support: Support,
    decisions: Vec<BTreeSet<ChoiceVar>>,
    observations: Vec<BTreeSet<ChoiceVar>>,
}

impl Guard {
    /// An always-true guard.
    pub fn new() -> Self {
        Self::from_support_unchecked(Support::always_true())
    }

    fn from_support_unchecked(support: Support) -> Self {
        let mut guard = Self {
            support,
            decisions: Vec::new(),
            observations: Vec::new(),
        };
        guard.recompute();
        guard
    }

    fn recompute(&mut self) {
        self.decisions.clear();
        self.observations.clear();
        for conjunction in self.support.conjunctions() {
            let (obs, dec): (BTreeSet<ChoiceVar>, BTreeSet<ChoiceVar>) = conjunction
                .iter()
                .map(|a| a.var().clone())
                .partition(|v| v.kind().is_observation());
            self.decisions.push(dec);
            self.observations.push(obs);
        }
    }

    pub fn support(&self) -> &Support {
        &self.support
    }

    /// Replace the support. An empty support is rejected.
    pub fn set(&mut self, support: Support) -> Result<(), InconsistentSupport> {
        if support.is_empty() {
            return Err(InconsistentSupport {
                left: self.support.clone(),
                right: support,
            });
        }
        self.support = support;
        self.recompute();
        Ok(())
    }

    /// Narrow the guard with `other`. Leaves the guard untouched on failure.
    pub fn and(&mut self, other: &Support) -> Result<(), InconsistentSupport> {
        let narrowed = self.support.try_and(other)?;
        self.support = narrowed;
        self.recompute();
        Ok(())
    }

    /// Widen the guard with the conjunctions of `other`.
    pub fn or(&mut self, other: &Support) {
        self.support = self.support.or(other);
        self.recompute();
    }

    /// Append `assignment` to every conjunction without a consistency check.
    pub fn add_assignment(&mut self, assignment: &ChoiceAssignment) {
        self.support = self.support.with_assignment(assignment);
        self.recompute();
    }

    /// Replace the support with a single conjunction.
    pub fn set_conjunction(&mut self, conjunction: Conjunction) {
        self.support = Support::from_conjunction(conjunction);
        self.recompute();
    }

    /// Replace the support with one single-literal conjunction per assignment.
    pub fn set_disjunction(&mut self, assignments: impl IntoIterator<Item = ChoiceAssignment>) {
        let support: Support = assignments.into_iter().map(Conjunction::single).collect();
        if support.is_empty() {
            self.clear();
        } else {
            self.support = support;
            self.recompute();
        }
    }

    /// Reset to always true.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Whether no conjunction carries a literal.
    pub fn has_empty_support(&self) -> bool {
        self.support.literal_count() == 0
    }

    pub fn is_active(&self, assignments: &Conjunction) -> bool {
        self.support.is_active(assignments)
    }

    pub fn is_consistent(&self, assignments: &Conjunction) -> bool {
        self.support.is_consistent(assignments)
    }

    pub fn decisions(&self) -> &[BTreeSet<ChoiceVar>] {
        &self.decisions
    }

    pub fn observations(&self) -> &[BTreeSet<ChoiceVar>] {
        &self.observations
    }

    /// Every variable referenced anywhere in the guard.
    pub fn variables(&self) -> BTreeSet<ChoiceVar> {
        self.support
            .conjunctions()
            .flat_map(|c| c.iter().map(|a| a.var().clone()))
            .collect()
    }
}

impl Default for Guard {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Guard> for Support {
    fn from(guard: Guard) -> Self {
        guard.support
    }
}
