pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliConfig, Command};
pub use config::toml_config::TomlConfig;

pub use crate::adapters::http::GitlabClient;
pub use crate::core::concurrent::{ConcurrentFetcher, FetchOutcome, PageFailure};
pub use crate::core::planner::{plan, FetchPlan};
pub use crate::core::sequential::fetch_all_sequential;
pub use crate::core::server::GitlabServer;
pub use crate::utils::error::{InventoryError, Result};
