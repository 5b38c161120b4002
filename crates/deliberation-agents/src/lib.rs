//! Host for the grievance deliberation engine: environment/TOML config, a
//! file-backed session store and the command surface used by the binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod store;

pub use config::AgentsConfig;
pub use store::JsonFileStore;
