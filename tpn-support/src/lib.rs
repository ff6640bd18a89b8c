//! TPN Support - DNF guard algebra for temporal plan networks with choice
//!
//! Every element of a plan network exists only under some assignment of its
//! choices. This crate represents that condition as a support: an OR of
//! conjunctions of choice assignments.
//!
//! - **Assignments**: `choice = value` and `NOT choice = value` literals
//! - **Conjunctions**: satisfiability checks including negation exhaustion
//! - **Supports**: Cartesian AND, OR, approximate difference, entailment
//! - **Guards**: supports with cached decision/observation variable sets
//!
//! # Example
//!
//! ```text
//! X ∈ {A, B}, Y ∈ {A, B}
//!
//!   {{X=A}} AND {{Y=B}}        = {{X=A, Y=B}}
//!   {{X=A}} AND {{X=B}}        = {}              (InconsistentSupport)
//!   {{NOT X=A}} AND {{NOT X=B}} = {}              (domain exhausted)
//! ```

pub mod assignment;
pub mod conjunction;
pub mod guard;
pub mod support;

pub use assignment::{ChoiceAssignment, ChoiceKind, ChoiceVar, DomainValue};
pub use conjunction::Conjunction;
pub use guard::Guard;
pub use support::{InconsistentSupport, Support};
