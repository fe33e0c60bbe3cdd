//! Watch-mode orchestration.
//!
//! [`DevSession`] owns the last good build and turns batches of changed
//! files into incremental rebuilds. The file watcher, HTTP server and
//! socket live in the CLI; this module only decides what to rebuild and
//! what to tell connected clients.

mod hmr;
mod orchestrator;

pub use hmr::{HmrMessage, HMR_PATH};
pub use orchestrator::{CancelSlot, ChangeQueue, DevSession, PassResult, SessionState, COALESCE_WINDOW};
