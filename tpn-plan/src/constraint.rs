//! Temporal, state and chance constraints.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tpn_support::Guard;

use crate::element::Identity;
use crate::state::StateValue;
use crate::types::{
    ChanceConstraintId, EventId, PlanError, Result, StateConstraintId, StateVariableId,
    TemporalConstraintId,
};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Controllability of a temporal constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum TemporalKind {
    /// Simple temporal constraint, the executive picks the duration
    #[default]
    Controllable,
    /// Set-bounded uncertainty, the environment picks the duration
    UncontrollableBounded,
    /// Duration drawn from a known distribution
    UncontrollableProbabilistic,
}

impl TemporalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Controllable => "controllable",
            Self::UncontrollableBounded => "uncontrollable_bounded",
            Self::UncontrollableProbabilistic => "uncontrollable_probabilistic",
        }
    }
}

impl fmt::Display for TemporalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Duration distribution of an uncontrollable constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Distribution {
    Gaussian { mean: f64, variance: f64 },
    Uniform { lb: f64, ub: f64 },
    UnknownBounded { lb: f64, ub: f64 },
}

impl Distribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gaussian { .. } => "gaussian",
            Self::Uniform { .. } => "uniform",
            Self::UnknownBounded { .. } => "unknown_bounded",
        }
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        let valid = match self {
            Self::Gaussian { variance, .. } => *variance >= 0.0,
            Self::Uniform { lb, ub } | Self::UnknownBounded { lb, ub } => lb <= ub,
        };
        if valid {
            Ok(())
        } else {
            Err(PlanError::InvalidType(format!(
                "invalid {} distribution: gaussian needs variance >= 0, uniform and unknown_bounded need lb <= ub",
                self.as_str()
            )))
        }
    }

    /// Bounds implied by the distribution; unbounded sides are infinite.
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Self::Gaussian { .. } => (f64::NEG_INFINITY, f64::INFINITY),
            Self::Uniform { lb, ub } | Self::UnknownBounded { lb, ub } => (*lb, *ub),
        }
    }
}

/// Description of a temporal constraint's bounds.
///
/// Controllable and uncontrollable-bounded constraints need `lb` and `ub`;
/// probabilistic ones need a `distribution`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct DurationSpec {
    #[serde(default)]
    pub ctype: TemporalKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ub: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
}

impl DurationSpec {
    pub fn controllable(lb: f64, ub: f64) -> Self {
        Self {
            ctype: TemporalKind::Controllable,
            lb: Some(lb),
            ub: Some(ub),
            distribution: None,
        }
    }

    pub fn uncontrollable_bounded(lb: f64, ub: f64) -> Self {
        Self {
            ctype: TemporalKind::UncontrollableBounded,
            lb: Some(lb),
            ub: Some(ub),
            distribution: None,
        }
    }

    pub fn probabilistic(distribution: Distribution) -> Self {
        Self {
            ctype: TemporalKind::UncontrollableProbabilistic,
            lb: None,
            ub: None,
            distribution: Some(distribution),
        }
    }

    /// Controllable `[0, inf]`, the default episode duration.
    pub fn unconstrained() -> Self {
        Self::controllable(0.0, f64::INFINITY)
    }

    /// Validate and resolve into concrete bounds.
    pub fn resolve(&self) -> Result<TemporalBounds> {
        match self.ctype {
            TemporalKind::Controllable | TemporalKind::UncontrollableBounded => {
                let (lb, ub) = match (self.lb, self.ub) {
                    (Some(lb), Some(ub)) => (lb, ub),
                    _ => {
                        return Err(PlanError::MissingArgument(format!(
                            "{} constraints must have lb and ub specified",
                            self.ctype
                        )))
                    }
                };
                check_bounds(lb, ub)?;
                let distribution = match self.ctype {
                    TemporalKind::UncontrollableBounded => {
                        Some(Distribution::UnknownBounded { lb, ub })
                    }
                    _ => None,
                };
                Ok(TemporalBounds {
                    kind: self.ctype,
                    lb,
                    ub,
                    distribution,
                })
            }
            TemporalKind::UncontrollableProbabilistic => {
                let distribution = self.distribution.clone().ok_or_else(|| {
                    PlanError::MissingArgument(
                        "probabilistic constraints must have a distribution".to_string(),
                    )
                })?;
                distribution.validate()?;
                let (lb, ub) = distribution.bounds();
                Ok(TemporalBounds {
                    kind: self.ctype,
                    lb,
                    ub,
                    distribution: Some(distribution),
                })
            }
        }
    }
}

impl Default for DurationSpec {
    fn default() -> Self {
        Self::unconstrained()
    }
}

fn check_bounds(lb: f64, ub: f64) -> Result<()> {
    if lb <= ub {
        Ok(())
    } else {
        Err(PlanError::InvalidType(format!(
            "temporal constraints must have lb <= ub, got [{}, {}]",
            lb, ub
        )))
    }
}

/// Resolved bounds of a temporal constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalBounds {
    pub kind: TemporalKind,
    pub lb: f64,
    pub ub: f64,
    pub distribution: Option<Distribution>,
}

/// Precedence constraint between two events.
///
/// The guard is the AND of both endpoints' supports.
#[derive(Debug, Clone)]
pub struct TemporalConstraint {
    pub(crate) identity: Identity,
    pub(crate) guard: Guard,
    pub(crate) start: EventId,
    pub(crate) end: EventId,
    pub(crate) bounds: TemporalBounds,
}

impl TemporalConstraint {
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

    pub fn kind(&self) -> TemporalKind {
        self.bounds.kind
    }

    pub fn lb(&self) -> f64 {
        self.bounds.lb
    }

    pub fn ub(&self) -> f64 {
        self.bounds.ub
    }

    pub fn distribution(&self) -> Option<&Distribution> {
        self.bounds.distribution.as_ref()
    }

    pub fn bounds(&self) -> &TemporalBounds {
        &self.bounds
    }

    /// Tighten controllable bounds.
    pub(crate) fn set_bounds(&mut self, lb: f64, ub: f64) -> Result<()> {
        check_bounds(lb, ub)?;
        self.bounds.lb = lb;
        self.bounds.ub = ub;
        Ok(())
    }
}

/// Relational operator of a linear state constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum Relation {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

impl FromStr for Relation {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            "=" => Ok(Self::Eq),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            other => Err(PlanError::InvalidType(format!(
                "relation '{}' must be one of <, <=, =, >, >=",
                other
            ))),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a state constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum StateConstraintKind {
    /// `scope[i] = values[i]` for every i
    Assignment { values: Vec<StateValue> },
    /// `sum(coef[i] * scope[i]) rel rhs`
    Linear {
        coef: Vec<f64>,
        rel: Relation,
        rhs: f64,
    },
}

/// Constraint over a scope of distinct state variables.
#[derive(Debug, Clone)]
pub struct StateConstraint {
    pub(crate) identity: Identity,
    pub(crate) guard: Guard,
    pub(crate) scope: Vec<StateVariableId>,
    pub(crate) kind: StateConstraintKind,
}

impl StateConstraint {
    pub fn id(&self) -> &str {
        self.identity.id()
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn scope(&self) -> &[StateVariableId] {
        &self.scope
    }

    pub fn kind(&self) -> &StateConstraintKind {
        &self.kind
    }
}

/// Any constraint a chance constraint can range over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintRef {
    Temporal(TemporalConstraintId),
    State(StateConstraintId),
    Chance(ChanceConstraintId),
}

/// Bound on the probability of violating a set of constraints.
#[derive(Debug, Clone)]
pub struct ChanceConstraint {
    pub(crate) identity: Identity,
    pub(crate) risk: f64,
    pub(crate) constraints: Vec<ConstraintRef>,
}

impl ChanceConstraint {
    pub fn id(&self) -> &str {
        self.identity.id()
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

    /// Maximum admissible probability of violation, in `[0, 1]`.
    pub fn risk(&self) -> f64 {
        self.risk
    }

    pub fn constraints(&self) -> &[ConstraintRef] {
        &self.constraints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controllable_needs_both_bounds() {
        let spec = DurationSpec {
            ctype: TemporalKind::Controllable,
            lb: Some(1.0),
            ub: None,
            distribution: None,
        };
        assert!(matches!(spec.resolve(), Err(PlanError::MissingArgument(_))));
    }

    #[test]
    fn test_reversed_bounds() {
        let err = DurationSpec::controllable(5.0, 2.0).resolve().unwrap_err();
        assert!(matches!(err, PlanError::InvalidType(_)));
    }

    #[test]
    fn test_bounded_carries_unknown_distribution() {
        let bounds = DurationSpec::uncontrollable_bounded(2.0, 4.0).resolve().unwrap();
        assert_eq!(bounds.kind, TemporalKind::UncontrollableBounded);
        assert_eq!(
            bounds.distribution,
            Some(Distribution::UnknownBounded { lb: 2.0, ub: 4.0 })
        );
    }

    #[test]
    fn test_probabilistic_bounds_from_distribution() {
        let gaussian = DurationSpec::probabilistic(Distribution::Gaussian {
            mean: 10.0,
            variance: 4.0,
        })
        .resolve()
        .unwrap();
        assert_eq!(gaussian.lb, f64::NEG_INFINITY);
        assert_eq!(gaussian.ub, f64::INFINITY);

        let uniform = DurationSpec::probabilistic(Distribution::Uniform { lb: 1.0, ub: 3.0 })
            .resolve()
            .unwrap();
        assert_eq!((uniform.lb, uniform.ub), (1.0, 3.0));

        let missing = DurationSpec {
            ctype: TemporalKind::UncontrollableProbabilistic,
            lb: None,
            ub: None,
            distribution: None,
        };
        assert!(matches!(missing.resolve(), Err(PlanError::MissingArgument(_))));

        let negative = DurationSpec::probabilistic(Distribution::Gaussian {
            mean: 0.0,
            variance: -1.0,
        });
        assert!(matches!(negative.resolve(), Err(PlanError::InvalidType(_))));
    }

    #[test]
    fn test_spec_from_yaml() {
        let spec: DurationSpec = serde_yaml::from_str(
            "ctype: uncontrollable_probabilistic\ndistribution:\n  type: uniform\n  lb: 1.0\n  ub: 2.0\n",
        )
        .unwrap();
        assert_eq!(
            spec.distribution,
            Some(Distribution::Uniform { lb: 1.0, ub: 2.0 })
        );

        let spec: DurationSpec = serde_yaml::from_str("lb: 0.0\nub: .inf\n").unwrap();
        assert_eq!(spec, DurationSpec::unconstrained());
    }

    #[test]
    fn test_relation_parsing() {
        assert_eq!("<=".parse::<Relation>().unwrap(), Relation::Le);
        assert!(matches!("=>".parse::<Relation>(), Err(PlanError::InvalidType(_))));
    }
}
