//! Results, standings and rankings.
//!
//! Submitting a result finalizes a session for good and advances the bracket:
//! sessions fed by it get their roster once every slot resolves. Rankings are
//! never stored; [`ResultEngine::get_rankings`] recomputes them from the
//! finalized sessions on every call.

pub mod engine;
pub mod leaderboard;
pub mod models;
pub mod ranking;
pub mod standings;

pub use engine::{ResultEngine, evaluate};
pub use models::{
    LeaderboardTier, Measurement, PlacementEntry, ResultPayload, ScoreEntry, SessionResult,
    StandingRow, SubmitOutcome,
};
pub use ranking::{TIE_EPSILON, competition_ranks};
pub use standings::{DRAW_POINTS, WIN_POINTS, final_standings};
