//! cadre core: roster management for a team of LLM-backed content workers.
//!
//! The crate has no network I/O. External collaborators (ideation, the
//! writing/evaluating crew, engagement numbers) come in through traits:
//! [`ideation::IdeationGateway`], [`refine::ContentCrew`] and
//! [`orchestrator::EngagementSource`].
//!
//! - [`policy`] decides who to hire, merge, prune or coach each cycle
//! - [`refine`] runs the bounded write/evaluate loop for one artifact
//! - [`roster`] stages and commits roster changes atomically
//! - [`orchestrator`] drives whole cycles and persists them via [`store`]

pub mod canonical;
pub mod config;
pub mod ideation;
pub mod orchestrator;
pub mod policy;
pub mod refine;
pub mod roster;
pub mod store;
pub mod types;
