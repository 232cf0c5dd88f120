//! Configuration for the aggregator.
//!
//! Deployments describe the chain, the deployed router contracts and the
//! pluggable collaborator components in a single TOML file. The loader
//! supports JSON as well, applies environment overrides and validates the
//! result before anything else starts up.

pub mod loader;
pub mod types;

pub use loader::{load_config, ConfigLoader};
pub use types::*;
