//! segwatch library
//!
//! Weather snapshots for a fixed set of monitored segments. The store keeps
//! one segment selected, refreshes it on a timer and guarantees that a slow
//! response for a previously selected segment never replaces newer data.

pub mod cli;
pub mod data;
pub mod store;
pub mod summary;
