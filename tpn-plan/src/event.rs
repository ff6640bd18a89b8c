//! Events and choice events.

use serde::{Deserialize, Serialize};
use tpn_support::{ChoiceAssignment, ChoiceKind, ChoiceVar, DomainValue, Guard};

use crate::element::Identity;
use crate::types::{PlanError, Result};

/// A temporal instant. Choice events additionally carry a [`Choice`].
#[derive(Debug, Clone)]
pub struct Event {
    pub(crate) identity: Identity,
    pub(crate) guard: Guard,
    pub(crate) choice: Option<Choice>,
}

impl Event {
    pub(crate) fn new(identity: Identity) -> Self {
        Self {
            identity,
            guard: Guard::new(),
            choice: None,
        }
    }

    pub fn id(&self) -> &str {
        self.identity.id()
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn choice(&self) -> Option<&Choice> {
        self.choice.as_ref()
    }

    pub fn is_choice(&self) -> bool {
        self.choice.is_some()
    }
}

/// Domain and valuation of a choice event.
#[derive(Debug, Clone)]
pub struct Choice {
    var: ChoiceVar,
    utility: Option<Vec<f64>>,
    probability: Option<Vec<f64>>,
}

impl Choice {
    /// Handle used in guards.
    pub fn var(&self) -> &ChoiceVar {
        &self.var
    }

    pub fn kind(&self) -> ChoiceKind {
        self.var.kind()
    }

    pub fn domain(&self) -> &[DomainValue] {
        self.var.domain()
    }

    pub fn utility(&self) -> Option<&[f64]> {
        self.utility.as_deref()
    }

    pub fn probability(&self) -> Option<&[f64]> {
        self.probability.as_deref()
    }

    /// Utility of assigning `value`, if utilities were given.
    pub fn utility_of(&self, value: &DomainValue) -> Option<f64> {
        let index = self.var.index_of(value)?;
        self.utility.as_ref().map(|u| u[index])
    }

    /// Probability of observing `value`, if probabilities were given.
    pub fn probability_of(&self, value: &DomainValue) -> Option<f64> {
        let index = self.var.index_of(value)?;
        self.probability.as_ref().map(|p| p[index])
    }

    /// Positive literal for a domain member.
    pub fn assignment(&self, value: &DomainValue) -> Result<ChoiceAssignment> {
        if self.var.index_of(value).is_none() {
            return Err(PlanError::InvalidType(format!(
                "'{}' is not in the domain of choice {}",
                value,
                self.var.label()
            )));
        }
        Ok(self.var.is(value.clone()))
    }
}

/// Description of a choice to create.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChoiceSpec {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub domain: Vec<DomainValue>,
    #[serde(default)]
    pub ctype: Option<ChoiceKind>,
    #[serde(default)]
    pub utility: Option<Vec<f64>>,
    #[serde(default)]
    pub probability: Option<Vec<f64>>,
}

impl ChoiceSpec {
    /// Spec with the given domain and nothing else set.
    pub fn new<I, V>(domain: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DomainValue>,
    {
        Self {
            domain: domain.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_kind(mut self, kind: ChoiceKind) -> Self {
        self.ctype = Some(kind);
        self
    }

    pub fn with_utility(mut self, utility: Vec<f64>) -> Self {
        self.utility = Some(utility);
        self
    }

    pub fn with_probability(mut self, probability: Vec<f64>) -> Self {
        self.probability = Some(probability);
        self
    }

    /// Validate and build the choice event.
    pub(crate) fn build(self, probability_tolerance: f64) -> Result<Event> {
        let kind = self.ctype.ok_or_else(|| {
            PlanError::MissingArgument("choices must specify a type".to_string())
        })?;

        if self.domain.is_empty() {
            return Err(PlanError::InvalidType("choice domain must not be empty".to_string()));
        }
        for (i, value) in self.domain.iter().enumerate() {
            if self.domain[..i].contains(value) {
                return Err(PlanError::InvalidType(format!(
                    "choice domain lists '{}' more than once",
                    value
                )));
            }
        }

        if let Some(utility) = &self.utility {
            if utility.len() != self.domain.len() {
                return Err(PlanError::InvalidType(
                    "utilities are not consistent with choice domain".to_string(),
                ));
            }
        }
        if let Some(probability) = &self.probability {
            let total: f64 = probability.iter().sum();
            if probability.len() != self.domain.len() || (total - 1.0).abs() >= probability_tolerance {
                return Err(PlanError::InvalidType(
                    "probabilities are not consistent with choice domain or do not sum to one"
                        .to_string(),
                ));
            }
        }

        let identity = Identity::resolve("Choice", self.id, self.name);
        let var = ChoiceVar::new(identity.serial(), identity.id(), kind, self.domain);
        let mut event = Event::new(identity);
        event.choice = Some(Choice {
            var,
            utility: self.utility,
            probability: self.probability,
        });
        Ok(event)
    }
}
