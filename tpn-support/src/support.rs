//! DNF supports: OR of conjunctions of choice assignments.
//!
//! A support describes the choice assignments under which an element exists.
//! The always-true support is the set holding only the empty conjunction; a
//! support with no conjunctions at all is inconsistent and only appears as
//! the result of a failed AND.

use std::collections::BTreeSet;
use std::fmt;

use crate::assignment::ChoiceAssignment;
use crate::conjunction::Conjunction;

/// Two supports whose AND is empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Empty intersection of supports: {left} AND {right}")]
pub struct InconsistentSupport {
    /// Support that was being narrowed
    pub left: Support,
    /// Support it was intersected with
    pub right: Support,
}

/// Disjunction of conjunctions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Support(BTreeSet<Conjunction>);

impl Support {
    /// The support that holds under every assignment.
    pub fn always_true() -> Self {
        let mut set = BTreeSet::new();
        set.insert(Conjunction::new());
        Self(set)
    }

    /// The inconsistent support (no conjunctions).
    pub fn inconsistent() -> Self {
        Self(BTreeSet::new())
    }

    /// Support made of a single conjunction.
    pub fn from_conjunction(conjunction: Conjunction) -> Self {
        let mut set = BTreeSet::new();
        set.insert(conjunction);
        Self(set)
    }

    /// Support made of a single literal.
    pub fn from_assignment(assignment: ChoiceAssignment) -> Self {
        Self::from_conjunction(Conjunction::single(assignment))
    }

    /// Number of conjunctions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True only for the inconsistent support.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn conjunctions(&self) -> impl Iterator<Item = &Conjunction> {
        self.0.iter()
    }

    /// Whether the support contains the empty conjunction.
    pub fn is_always_true(&self) -> bool {
        self.0.contains(&Conjunction::new())
    }

    /// Total number of literals across all conjunctions.
    pub fn literal_count(&self) -> usize {
        self.0.iter().map(Conjunction::len).sum()
    }

    /// Cartesian AND. The result is empty iff every pairing was contradictory.
    pub fn and(&self, other: &Support) -> Support {
        let mut result = BTreeSet::new();
        for c1 in &self.0 {
            for c2 in &other.0 {
                if let Some(merged) = c1.and(c2) {
                    result.insert(merged);
                }
            }
        }
        Self(result)
    }

    /// AND that reports an empty result as an error carrying both operands.
    pub fn try_and(&self, other: &Support) -> Result<Support, InconsistentSupport> {
        let result = self.and(other);
        if result.is_empty() {
            tracing::debug!(left = %self, right = %other, "Support intersection is empty");
            Err(InconsistentSupport {
                left: self.clone(),
                right: other.clone(),
            })
        } else {
            Ok(result)
        }
    }

    /// Union of conjunctions.
    pub fn or(&self, other: &Support) -> Support {
        Self(self.0.union(&other.0).cloned().collect())
    }

    /// Approximation of `self AND NOT other`.
    ///
    /// Each conjunction of `self` has every conjunction of `other` removed
    /// from it by plain set difference. This is not a DNF negation: the
    /// result may be wider than the true difference. Results are not
    /// deduplicated.
    pub fn difference(&self, other: &Support) -> Vec<Conjunction> {
        self.0
            .iter()
            .map(|c1| other.0.iter().fold(c1.clone(), |diff, c2| diff.difference(c2)))
            .collect()
    }

    /// Whether two supports can hold at the same time.
    pub fn is_consistent_with(&self, other: &Support) -> bool {
        !self.and(other).is_empty()
    }

    /// Whether `assignments` entail one full conjunction of this support.
    pub fn is_active(&self, assignments: &Conjunction) -> bool {
        self.0.iter().any(|c| c.is_subset(assignments))
    }

    /// Whether no conjunction contradicts one of `assignments`.
    ///
    /// Over-approximates reachability: it only looks for literal conflicts
    /// on variables mentioned in `assignments`, not for entailment.
    pub fn is_consistent(&self, assignments: &Conjunction) -> bool {
        !self.0.iter().any(|c| {
            c.iter()
                .any(|literal| assignments.iter().any(|given| literal.conflicts_with(given)))
        })
    }

    /// Appends `assignment` to every conjunction, without a consistency check.
    pub fn with_assignment(&self, assignment: &ChoiceAssignment) -> Support {
        Self(
            self.0
                .iter()
                .map(|c| {
                    let mut c = c.clone();
                    c.insert(assignment.clone());
                    c
                })
                .collect(),
        )
    }
}

impl Default for Support {
    fn default() -> Self {
        Self::always_true()
    }
}

impl FromIterator<Conjunction> for Support {
    fn from_iter<I: IntoIterator<Item = Conjunction>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Renders the guard formula: `true`, or `(a AND b) OR (c)`.
impl fmt::Display for Support {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_always_true() {
            return f.write_str("true");
        }
        if self.0.is_empty() {
            return f.write_str("false");
        }
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" OR ")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}
