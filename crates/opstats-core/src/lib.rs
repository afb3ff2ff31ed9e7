//! # opstats
//!
//! Operation analytics resolution layer.
//!
//! Given a user-supplied query selector (organization/project/target
//! references, a time range, optional filters on operation name, client or
//! schema coordinate), opstats resolves the selector into canonical entity
//! identifiers, fans out time-windowed aggregate queries against a metrics
//! store concurrently, and merges the independent result streams into a
//! single consistent statistical view.
//!
//! ## Architecture
//!
//! - **Normalizer**: selector -> canonical scope (concurrent id translation)
//! - **Dispatcher**: concurrent fan-out of aggregate metric queries
//! - **Merger**: joins count and duration streams by operation identity
//! - **Storage**: Postgres-backed metrics store behind a trait
//! - **API**: REST API exposing the public query surface
//!
//! ## Quick Start
//!
//! ```bash
//! # Start the API server
//! opstats serve
//!
//! # Check storage connectivity
//! opstats health
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod stats;
pub mod translate;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::db::{Database, MetricsStore};
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::stats::StatsManager;
    pub use crate::translate::IdTranslator;
}
