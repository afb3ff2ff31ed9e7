//! The selector-to-query resolution core
//!
//! Turns caller-supplied selectors into canonical scopes, fans out
//! concurrent aggregate queries, and merges the independent result streams
//! into a single consistent statistical view.

pub mod dispatcher;
pub mod manager;
pub mod merger;
pub mod normalizer;
pub mod percentile;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{MetricData, MetricKind, MetricResults, QueryDispatcher};
pub use manager::StatsManager;
pub use normalizer::SelectorNormalizer;
