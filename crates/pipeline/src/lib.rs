//! Website version & build pipeline.
//!
//! Turns submitted form content into versioned records and rendered static
//! sites: asset finalization, source-tree materialization, the external
//! generator invocation and active-version bookkeeping.

pub mod archive;
pub mod assets;
pub mod build;
pub mod config;
pub mod error;
pub mod materialize;
pub mod orchestrator;
pub mod preview;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::Orchestrator;
pub use store::{PgSiteStore, SiteStore};
