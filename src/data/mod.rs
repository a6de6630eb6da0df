//! Recorded data: event model, the single-slot store, request validation and
//! the manager exposing the engine's operations.

pub mod manager;
pub mod schema;
pub mod store;
pub mod validation;

pub use manager::{DataManager, SessionSnapshot};
pub use schema::{Device, DeviceProfile, Event, Reading, RecordedData};
pub use store::RecordedDataStore;
