//! TPN Plan - Temporal plan networks with choice
//!
//! Builds plan networks from episodes composed in sequence, in parallel or
//! under a choice, and tracks for every element the choice assignments under
//! which it exists:
//!
//! - **Elements**: events, choices, state variables, episodes
//! - **Constraints**: temporal (controllable, bounded, probabilistic), state, chance
//! - **Composition**: sequence, parallel, choose with support propagation
//! - **Program**: plan container with memoized traversal and fingerprint
//! - **Traversal**: choice hierarchy recovered from supports
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Program                           │
//! │   sequence / parallel / decide / observe / repeat        │
//! │                           │                              │
//! │                  ┌────────▼────────┐                     │
//! │                  │     compose     │   atomic, rolls     │
//! │                  └────────┬────────┘   back on empty     │
//! │                           │            support           │
//! │   ┌───────────────────────▼──────────────────────────┐   │
//! │   │  PlanGraph: events | episodes | constraints      │   │
//! │   │  (arena, typed handles, shared sub-episodes)     │   │
//! │   └──────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod compose;
pub mod config;
pub mod constraint;
pub mod element;
pub mod episode;
pub mod event;
pub mod graph;
pub mod program;
pub mod state;
pub mod traversal;
pub mod types;

// Re-export main types
pub use compose::CompositionOptions;
pub use config::{LoopChoiceConfig, PlanConfig, SequenceMode};
pub use constraint::{
    ChanceConstraint, ConstraintRef, Distribution, DurationSpec, Relation, StateConstraint,
    StateConstraintKind, TemporalBounds, TemporalConstraint, TemporalKind,
};
pub use episode::{Composition, Episode, EpisodeSpec};
pub use event::{Choice, ChoiceSpec, Event};
pub use graph::PlanGraph;
pub use program::{Component, Program, ProgramSummary, Subplan, Traversal};
pub use state::{StateAssignment, StateDomain, StateValue, StateVariable};
pub use traversal::{group_by_support, PlanTraverser, SupportCluster};
pub use types::*;

pub use tpn_support;
