//! Client-side workflow controller for the trainbench front-ends.
//!
//! [`WorkflowState`] owns every piece of client-visible state: the pending
//! dataset file, the column catalog, feature/target/model-type selections,
//! the active session, prediction inputs, the last results, the busy flag
//! and the status banner. Operations mutate the state and hand back an
//! [`Effect`] describing the request a surface should issue, which keeps
//! the controller deterministic and testable without a live service.

mod effect;
mod error;
mod state;
mod status;

pub use crate::effect::Effect;
pub use crate::error::SelectionError;
pub use crate::state::{PendingFile, WorkflowState};
pub use crate::status::{Severity, StatusLine};
