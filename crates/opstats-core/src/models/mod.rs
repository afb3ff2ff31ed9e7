//! Data models for opstats

mod scope;
mod selector;
mod stats;

pub use scope::*;
pub use selector::*;
pub use stats::*;
