//! Configuration for plan construction.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::graph::DEFAULT_PROBABILITY_TOLERANCE;
use crate::types::{PlanError, Result};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// How sequences obtain their boundary events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SequenceMode {
    /// Reuse the first episode's start and the last episode's end.
    ///
    /// The sequence's boundary events are then aliases of its inner
    /// episodes' events.
    #[default]
    Optimized,
    /// Mint fresh start and end events linked by precedence constraints
    BoundaryEvents,
}

/// Configuration of a [`Program`](crate::Program).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Default program name
    #[serde(default = "default_program_name")]
    pub program_name: String,
    /// Default sequence composition mode
    #[serde(default)]
    pub sequence_mode: SequenceMode,
    /// Sequence precedence constraints are `[0, 0]` instead of `[0, inf]`
    #[serde(default)]
    pub no_wait: bool,
    /// Naming of loop decisions
    #[serde(default)]
    pub loop_choice: LoopChoiceConfig,
    /// Tolerance for choice probabilities summing to one
    #[serde(default = "default_probability_tolerance")]
    pub probability_tolerance: f64,
}

fn default_program_name() -> String {
    "run()".to_string()
}

fn default_probability_tolerance() -> f64 {
    DEFAULT_PROBABILITY_TOLERANCE
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            program_name: default_program_name(),
            sequence_mode: SequenceMode::default(),
            no_wait: false,
            loop_choice: LoopChoiceConfig::default(),
            probability_tolerance: default_probability_tolerance(),
        }
    }
}

impl PlanConfig {
    /// Parse config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| PlanError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| PlanError::Config(e.to_string()))
    }

    /// Load config from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| PlanError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.probability_tolerance > 0.0) {
            return Err(PlanError::Config(format!(
                "probability_tolerance must be positive, got {}",
                self.probability_tolerance
            )));
        }
        if self.loop_choice.run_label == self.loop_choice.stop_label {
            return Err(PlanError::Config(
                "loop_choice run_label and stop_label must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Naming of the decisions created by [`Program::repeat`](crate::Program::repeat).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopChoiceConfig {
    /// Decision name prefix, followed by the remaining repetitions
    #[serde(default = "default_loop_prefix")]
    pub prefix: String,
    /// Value that runs the loop body
    #[serde(default = "default_run_label")]
    pub run_label: String,
    /// Value that exits the loop
    #[serde(default = "default_stop_label")]
    pub stop_label: String,
}

fn default_loop_prefix() -> String {
    "loop-choice-".to_string()
}

fn default_run_label() -> String {
    "RUN".to_string()
}

fn default_stop_label() -> String {
    "STOP".to_string()
}

impl Default for LoopChoiceConfig {
    fn default() -> Self {
        Self {
            prefix: default_loop_prefix(),
            run_label: default_run_label(),
            stop_label: default_stop_label(),
        }
    }
}
