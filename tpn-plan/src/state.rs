//! State variables and assignments to them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::element::Identity;
use crate::types::{PlanError, Result, StateVariableId};

/// A value a state variable can take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Number(f64),
    Symbol(String),
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::Symbol(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::Symbol(value)
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Symbol(s) => f.write_str(s),
        }
    }
}

/// Admissible values of a state variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "domain", rename_all = "kebab-case")]
pub enum StateDomain {
    /// Explicit list of values
    FiniteDiscrete(Vec<StateValue>),
    /// Closed numeric interval `[lb, ub]`
    Continuous([f64; 2]),
}

impl StateDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FiniteDiscrete(_) => "finite-discrete",
            Self::Continuous(_) => "continuous",
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Self::Continuous([lb, ub]) = self {
            if !(lb <= ub) {
                return Err(PlanError::InvalidType(format!(
                    "continuous domains must be [lb, ub] with lb <= ub, got [{}, {}]",
                    lb, ub
                )));
            }
        }
        Ok(())
    }
}

/// A named state variable.
#[derive(Debug, Clone)]
pub struct StateVariable {
    pub(crate) identity: Identity,
    pub(crate) domain: StateDomain,
}

impl StateVariable {
    pub fn id(&self) -> &str {
        self.identity.id()
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

    pub fn domain(&self) -> &StateDomain {
        &self.domain
    }

    /// Whether `value` is admissible for this variable.
    pub fn in_domain(&self, value: &StateValue) -> bool {
        match (&self.domain, value) {
            (StateDomain::FiniteDiscrete(values), value) => values.contains(value),
            (StateDomain::Continuous([lb, ub]), StateValue::Number(v)) => lb <= v && v <= ub,
            (StateDomain::Continuous(_), _) => false,
        }
    }
}

/// Mapping from state variables to values (conditions, effects, states).
pub type StateAssignment = BTreeMap<StateVariableId, StateValue>;

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(domain: StateDomain) -> StateVariable {
        StateVariable {
            identity: Identity::allocate("StateVariable"),
            domain,
        }
    }

    #[test]
    fn test_discrete_membership() {
        let light = variable(StateDomain::FiniteDiscrete(vec!["on".into(), "off".into()]));
        assert!(light.in_domain(&"on".into()));
        assert!(!light.in_domain(&"dim".into()));
        assert!(!light.in_domain(&StateValue::Number(1.0)));
    }

    #[test]
    fn test_continuous_membership() {
        let fuel = variable(StateDomain::Continuous([0.0, 100.0]));
        assert!(fuel.in_domain(&StateValue::Number(0.0)));
        assert!(fuel.in_domain(&StateValue::Number(100.0)));
        assert!(!fuel.in_domain(&StateValue::Number(100.5)));
        assert!(!fuel.in_domain(&"full".into()));
    }

    #[test]
    fn test_reversed_interval_rejected() {
        let err = StateDomain::Continuous([5.0, 1.0]).validate().unwrap_err();
        assert!(matches!(err, PlanError::InvalidType(_)));
    }

    #[test]
    fn test_domain_yaml_shape() {
        let domain: StateDomain =
            serde_yaml::from_str("type: continuous\ndomain: [0.0, 10.0]\n").unwrap();
        assert_eq!(domain, StateDomain::Continuous([0.0, 10.0]));

        let domain: StateDomain =
            serde_yaml::from_str("type: finite-discrete\ndomain: [open, closed]\n").unwrap();
        assert_eq!(domain.as_str(), "finite-discrete");
    }
}
