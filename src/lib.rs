pub mod adapters;
pub mod api;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::storage::LocalStorage;
pub use app::HubApp;
pub use config::AppConfig;
pub use core::eligibility::EligibilityDispatcher;
pub use utils::error::{HubError, Result};
