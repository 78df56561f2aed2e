// src/classifier/mod.rs

//! Classification stage.
//!
//! - [`registry`]: the closed set of implementations and what they need.
//! - [`spec`]: a validated `[[classification]]` entry.
//! - [`expand`]: fans an entry out into concrete tasks.
//! - [`command`]: command lines for the generated jobs.

pub mod command;
pub mod expand;
pub mod registry;
pub mod spec;

pub use command::{ClassifierInvocation, classifier_invocation};
pub use expand::{Candidate, ClassifierExpander, candidates, mask_matches, replicate_count};
pub use registry::{ClassifierKind, Requirements};
pub use spec::{ClassifierSpec, MaskSet, ModelRef};
