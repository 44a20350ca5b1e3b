// Adapters layer: concrete implementations of the domain ports for external systems
// (clearinghouses, FHIR store, DocuSeal, Mailgun, local storage, audit sinks).

pub mod audit;
pub mod availity;
pub mod docuseal;
pub mod fhir;
pub mod mailgun;
pub mod oauth;
pub mod optum;
pub mod storage;

use crate::config::{ProviderConfig, ProviderKind};
use crate::domain::ports::EligibilityProvider;
use crate::utils::error::Result;
use std::sync::Arc;

/// Builds the adapter for one `[[eligibility.providers]]` entry.
pub fn build_provider(
    config: &ProviderConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn EligibilityProvider>> {
    Ok(match config.kind {
        ProviderKind::Availity => Arc::new(availity::AvailityProvider::from_config(config, client)?),
        ProviderKind::Optum => Arc::new(optum::OptumProvider::from_config(config, client)?),
    })
}
