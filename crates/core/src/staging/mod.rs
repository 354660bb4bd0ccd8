//! Run-scoped staging buffers.
//!
//! Jobs never touch the persistent stores. They append into three buffers
//! (row history, metadata, status) partitioned by run id, and the merge
//! coordinator reads a snapshot once every job is terminal. A partition is
//! dropped when its run ends, whatever the outcome.

mod buffers;
mod types;

pub use buffers::*;
pub use types::*;
