//! Runtime adapters for promptfs (config, workspace registry, logging).

pub mod config;
pub mod logging;
pub mod store;

pub use config::Config;
pub use store::WorkspaceStore;
