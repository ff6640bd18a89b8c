//! Choice variables and the literals built from them.
//!
//! A [`ChoiceVar`] is the algebra's view of a choice event: an opaque key,
//! a label used when rendering guards, the controllability of the choice and
//! its ordered domain. Identity is the key alone, so two handles to the same
//! choice compare equal regardless of how they were obtained.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// A value in the domain of a choice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(transparent)]
pub struct DomainValue(String);

impl DomainValue {
    /// Create a domain value from anything string-like.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DomainValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DomainValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for DomainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Who selects the outcome of a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ChoiceKind {
    /// The executive picks the value (a decision)
    Controllable,
    /// The environment picks the value, no distribution known
    Uncontrollable,
    /// The environment picks the value from a known distribution
    Probabilistic,
}

impl ChoiceKind {
    /// Whether choices of this kind are observed rather than decided.
    pub fn is_observation(&self) -> bool {
        !matches!(self, Self::Controllable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Controllable => "controllable",
            Self::Uncontrollable => "uncontrollable",
            Self::Probabilistic => "probabilistic",
        }
    }
}

impl fmt::Display for ChoiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a choice variable as seen by the support algebra.
///
/// Cloning is cheap: label and domain are shared.
#[derive(Clone)]
pub struct ChoiceVar {
    key: u64,
    label: Arc<str>,
    kind: ChoiceKind,
    domain: Arc<[DomainValue]>,
}

impl ChoiceVar {
    /// Create a choice variable. `key` must be unique per choice.
    pub fn new(
        key: u64,
        label: impl Into<Arc<str>>,
        kind: ChoiceKind,
        domain: impl Into<Arc<[DomainValue]>>,
    ) -> Self {
        Self {
            key,
            label: label.into(),
            kind,
            domain: domain.into(),
        }
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    /// Label used in rendered guards (the choice's element id).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> ChoiceKind {
        self.kind
    }

    pub fn domain(&self) -> &[DomainValue] {
        &self.domain
    }

    /// Number of values in the domain.
    pub fn arity(&self) -> usize {
        self.domain.len()
    }

    /// Position of `value` in the domain, if present.
    pub fn index_of(&self, value: &DomainValue) -> Option<usize> {
        self.domain.iter().position(|v| v == value)
    }

    /// Positive literal `self = value`.
    pub fn is(&self, value: impl Into<DomainValue>) -> ChoiceAssignment {
        ChoiceAssignment::new(self.clone(), value)
    }

    /// Negated literal `NOT self = value`.
    pub fn is_not(&self, value: impl Into<DomainValue>) -> ChoiceAssignment {
        ChoiceAssignment::negated(self.clone(), value)
    }
}

impl PartialEq for ChoiceVar {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ChoiceVar {}

impl Hash for ChoiceVar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for ChoiceVar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChoiceVar {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Debug for ChoiceVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChoiceVar")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .finish()
    }
}

/// An assignment (or negated assignment) of a value to a choice.
///
/// Field order matters: literals sort by variable, then value, then polarity,
/// so the literals of one variable are adjacent inside a conjunction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChoiceAssignment {
    var: ChoiceVar,
    value: DomainValue,
    negated: bool,
}

impl ChoiceAssignment {
    /// `var = value`
    pub fn new(var: ChoiceVar, value: impl Into<DomainValue>) -> Self {
        Self {
            var,
            value: value.into(),
            negated: false,
        }
    }

    /// `NOT var = value`
    pub fn negated(var: ChoiceVar, value: impl Into<DomainValue>) -> Self {
        Self {
            var,
            value: value.into(),
            negated: true,
        }
    }

    pub fn var(&self) -> &ChoiceVar {
        &self.var
    }

    pub fn value(&self) -> &DomainValue {
        &self.value
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Whether this literal and `other` cannot hold at the same time.
    ///
    /// Only pairwise contradictions are detected here; exhausting a domain
    /// through several negations is checked at the conjunction level.
    pub fn conflicts_with(&self, other: &ChoiceAssignment) -> bool {
        if self.var != other.var {
            return false;
        }
        match (self.negated, other.negated) {
            (false, false) => self.value != other.value,
            (true, false) | (false, true) => self.value == other.value,
            (true, true) => false,
        }
    }
}

impl fmt::Display for ChoiceAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "NOT {}={}", self.var.label(), self.value)
        } else {
            write!(f, "{}={}", self.var.label(), self.value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(key: u64, domain: &[&str]) -> ChoiceVar {
        let domain: Vec<DomainValue> = domain.iter().map(|v| DomainValue::from(*v)).collect();
        ChoiceVar::new(key, format!("Choice_{}", key), ChoiceKind::Controllable, domain)
    }

    #[test]
    fn test_identity_is_key() {
        let a = var(1, &["A", "B"]);
        let b = ChoiceVar::new(1, "renamed", ChoiceKind::Probabilistic, vec![DomainValue::from("A")]);
        assert_eq!(a, b);
        assert_ne!(a, var(2, &["A", "B"]));
    }

    #[test]
    fn test_conflicts() {
        let x = var(1, &["A", "B"]);
        let y = var(2, &["A", "B"]);

        assert!(x.is("A").conflicts_with(&x.is("B")));
        assert!(x.is("A").conflicts_with(&x.is_not("A")));
        assert!(!x.is("A").conflicts_with(&x.is_not("B")));
        assert!(!x.is_not("A").conflicts_with(&x.is_not("B")));
        assert!(!x.is("A").conflicts_with(&y.is("B")));
    }

    #[test]
    fn test_display() {
        let x = var(7, &["RUN", "STOP"]);
        assert_eq!(x.is("RUN").to_string(), "Choice_7=RUN");
        assert_eq!(x.is_not("STOP").to_string(), "NOT Choice_7=STOP");
    }

    #[test]
    fn test_kind_observation() {
        assert!(!ChoiceKind::Controllable.is_observation());
        assert!(ChoiceKind::Uncontrollable.is_observation());
        assert!(ChoiceKind::Probabilistic.is_observation());
    }

    #[test]
    fn test_wire_forms() {
        let kind = serde_json::to_string(&ChoiceKind::Uncontrollable).unwrap();
        assert_eq!(kind, format!("\"{}\"", ChoiceKind::Uncontrollable.as_str()));
        let parsed: ChoiceKind = serde_json::from_str("\"probabilistic\"").unwrap();
        assert_eq!(parsed, ChoiceKind::Probabilistic);

        let domain: Vec<DomainValue> = serde_json::from_str(r#"["RUN", "STOP"]"#).unwrap();
        let x = ChoiceVar::new(3, "loop", ChoiceKind::Controllable, domain);
        assert_eq!(x.index_of(&DomainValue::from("STOP")), Some(1));
        assert_eq!(serde_json::to_value(x.domain()).unwrap(), serde_json::json!(["RUN", "STOP"]));
    }
}
