//! Replay module: paced re-emission of the stored recording.

pub mod scheduler;
pub mod schema;

pub use scheduler::{ReplayScheduler, ReplaySession};
pub use schema::{ReplayRequest, ReplaySettings, ReplayStatus};
