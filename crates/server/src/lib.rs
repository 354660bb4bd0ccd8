//! HTTP surface for the harvester: run trigger, run history, catalog view and metrics.

pub mod api;
pub mod metrics;
pub mod state;
