//! Session and bracket generation.
//!
//! Three formats are supported:
//!
//! - **League**: round robin by the circle method, byes for odd rosters
//! - **Knockout**: single elimination with standard seeding; byes go to the
//!   top seeds and later rounds wait on `WinnerOf` feeders
//! - **GroupPlusKnockout**: snake-seeded groups with isolated round robins,
//!   whose top finishers feed a knockout
//!
//! Individual-ranking tournaments are played as a single heat.
//!
//! Planning is pure ([`plan`], [`league`], [`knockout`], [`groups`]); the
//! [`BracketGenerator`] persists a plan inside one unit of work.

pub mod generator;
pub mod graph;
pub mod groups;
pub mod knockout;
pub mod league;
pub mod models;
pub mod plan;

pub use generator::{BracketGenerator, plan_for, validate_roster};
pub use graph::BracketGraph;
pub use models::{
    NewSession, ParticipantSource, Session, SessionId, SessionPhase, participant_filter,
};
pub use plan::{BracketPlan, PlannedSession, PlannedSource};
