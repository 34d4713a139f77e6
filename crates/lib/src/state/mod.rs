//! Stack state.
//!
//! One JSON document per (project, stack) records what the last `up`
//! provisioned, so the next run can tell unchanged resources from updated
//! ones and report exports without contacting the backend.

mod storage;
mod types;

pub use storage::StateStore;
pub use types::{ExportValue, ResourceRecord, STATE_VERSION, StackState, StateError};
