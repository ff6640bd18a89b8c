//! Conjunctions of choice assignments (one AND-clause of a support).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::assignment::{ChoiceAssignment, ChoiceVar, DomainValue};

/// A set of choice assignments that must all hold.
///
/// The empty conjunction is trivially true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Conjunction(BTreeSet<ChoiceAssignment>);

impl Conjunction {
    /// The empty (always true) conjunction.
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// A conjunction holding a single literal.
    pub fn single(assignment: ChoiceAssignment) -> Self {
        let mut set = BTreeSet::new();
        set.insert(assignment);
        Self(set)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChoiceAssignment> {
        self.0.iter()
    }

    pub fn contains(&self, assignment: &ChoiceAssignment) -> bool {
        self.0.contains(assignment)
    }

    /// Insert a literal without checking consistency.
    pub fn insert(&mut self, assignment: ChoiceAssignment) -> bool {
        self.0.insert(assignment)
    }

    pub fn is_subset(&self, other: &Conjunction) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Strict subset.
    pub fn is_proper_subset(&self, other: &Conjunction) -> bool {
        self.0.len() < other.0.len() && self.0.is_subset(&other.0)
    }

    /// Literals of `self` that are not in `other`.
    pub fn difference(&self, other: &Conjunction) -> Conjunction {
        Self(self.0.difference(&other.0).cloned().collect())
    }

    /// Variables referenced by this conjunction.
    pub fn variables(&self) -> BTreeSet<ChoiceVar> {
        self.0.iter().map(|a| a.var().clone()).collect()
    }

    /// AND of two conjunctions.
    ///
    /// Returns `None` when the merged literal set is contradictory.
    pub fn and(&self, other: &Conjunction) -> Option<Conjunction> {
        let merged = Self(self.0.union(&other.0).cloned().collect());
        if merged.is_satisfiable() {
            Some(merged)
        } else {
            None
        }
    }

    /// Whether some assignment to the referenced choices satisfies every literal.
    ///
    /// A conjunction fails when two literals on one variable contradict each
    /// other, or when its negations rule out every value in a variable's domain.
    pub fn is_satisfiable(&self) -> bool {
        let literals: Vec<&ChoiceAssignment> = self.0.iter().collect();
        let mut negated: BTreeMap<&ChoiceVar, BTreeSet<&DomainValue>> = BTreeMap::new();

        for (i, a) in literals.iter().enumerate() {
            // Literals are sorted by variable, so conflicts sit in a contiguous run.
            for b in literals[i + 1..].iter().take_while(|b| b.var() == a.var()) {
                if a.conflicts_with(b) {
                    return false;
                }
            }
            if a.is_negated() && a.var().index_of(a.value()).is_some() {
                negated.entry(a.var()).or_default().insert(a.value());
            }
        }

        negated
            .iter()
            .all(|(var, values)| values.len() < var.arity())
    }
}

impl FromIterator<ChoiceAssignment> for Conjunction {
    fn from_iter<I: IntoIterator<Item = ChoiceAssignment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Conjunction {
    type Item = &'a ChoiceAssignment;
    type IntoIter = std::collections::btree_set::Iter<'a, ChoiceAssignment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("true");
        }
        f.write_str("(")?;
        for (i, a) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{}", a)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::ChoiceKind;

    fn var(key: u64, domain: &[&str]) -> ChoiceVar {
        let domain: Vec<DomainValue> = domain.iter().map(|v| DomainValue::from(*v)).collect();
        ChoiceVar::new(key, format!("c{}", key), ChoiceKind::Controllable, domain)
    }

    #[test]
    fn test_and_merges_and_dedups() {
        let x = var(1, &["A", "B"]);
        let y = var(2, &["A", "B"]);
        let c1: Conjunction = [x.is("A")].into_iter().collect();
        let c2: Conjunction = [x.is("A"), y.is("B")].into_iter().collect();

        let merged = c1.and(&c2).unwrap();
        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&y.is("B")));
    }

    #[test]
    fn test_and_rejects_double_assignment() {
        let x = var(1, &["A", "B"]);
        let c1 = Conjunction::single(x.is("A"));
        let c2 = Conjunction::single(x.is("B"));
        assert!(c1.and(&c2).is_none());
    }

    #[test]
    fn test_and_rejects_assign_and_negate() {
        let x = var(1, &["A", "B"]);
        let c1 = Conjunction::single(x.is("A"));
        let c2 = Conjunction::single(x.is_not("A"));
        assert!(c1.and(&c2).is_none());

        let c3 = Conjunction::single(x.is_not("B"));
        assert!(c1.and(&c3).is_some());
    }

    #[test]
    fn test_negation_exhaustion() {
        let x = var(1, &["A", "B"]);
        let c1 = Conjunction::single(x.is_not("A"));
        let c2 = Conjunction::single(x.is_not("B"));
        assert!(c1.and(&c2).is_none());

        let z = var(2, &["A", "B", "C"]);
        let c3 = Conjunction::single(z.is_not("A"));
        let c4 = Conjunction::single(z.is_not("B"));
        assert!(c3.and(&c4).is_some());
    }

    #[test]
    fn test_strict_subset() {
        let x = var(1, &["A", "B"]);
        let y = var(2, &["A", "B"]);
        let small = Conjunction::single(x.is("A"));
        let big: Conjunction = [x.is("A"), y.is("A")].into_iter().collect();
        assert!(small.is_proper_subset(&big));
        assert!(!big.is_proper_subset(&big));
        assert_eq!(big.difference(&small), Conjunction::single(y.is("A")));
    }

    #[test]
    fn test_display() {
        assert_eq!(Conjunction::new().to_string(), "true");
        let x = var(1, &["A", "B"]);
        let y = var(2, &["A", "B"]);
        let c: Conjunction = [y.is_not("B"), x.is("A")].into_iter().collect();
        assert_eq!(c.to_string(), "(c1=A AND NOT c2=B)");
    }
}
