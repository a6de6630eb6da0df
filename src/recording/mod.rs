//! Recording module: capture inbound pipeline events into a recording.

pub mod schema;
pub mod session;

pub use schema::{RecordRequest, RecordStatus, RecordingLimits};
pub use session::{RecordingSession, RecordingSessionManager};
