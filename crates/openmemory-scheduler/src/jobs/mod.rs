//! The maintenance jobs. Each returns a JSON summary for the audit log and
//! polls the cancellation signal between units of work.

pub mod compaction;
pub mod decay;
pub mod reflection;
pub mod reinforce_sweep;
pub mod rotation;

use tokio::sync::watch;

/// Whether shutdown has been signalled.
pub(crate) fn cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow()
}
