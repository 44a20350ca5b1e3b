pub mod checklist;
pub mod eligibility;
pub mod jobs;
pub mod scheduler;
pub mod webhook;
pub mod wound;

pub use crate::domain::ports::{EligibilityProvider, Storage};
pub use crate::utils::error::Result;
