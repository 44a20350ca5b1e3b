use crate::adapters::docuseal::{manufacturer_from_folder, DocusealClient, RemoteTemplate};
use crate::config::AppConfig;
use crate::core::scheduler::ScheduledJob;
use crate::domain::model::DocusealTemplate;
use crate::domain::ports::TemplateStore;
use crate::utils::error::{HubError, Result};
use crate::utils::validation::Validate;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} skipped, {} errors",
            self.processed, self.skipped, self.errors
        )
    }
}

/// Copies DocuSeal templates into the local template store.
pub struct TemplateSyncJob {
    client: Arc<DocusealClient>,
    store: Arc<dyn TemplateStore>,
    force: bool,
}

impl TemplateSyncJob {
    pub fn new(client: Arc<DocusealClient>, store: Arc<dyn TemplateStore>) -> Self {
        Self {
            client,
            store,
            force: false,
        }
    }

    /// Re-writes templates even when `updated_at` did not change.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub async fn sync(&self) -> Result<SyncSummary> {
        let remote = self.client.list_templates().await?;
        tracing::info!("🔍 Found {} DocuSeal templates", remote.len());

        let mut summary = SyncSummary::default();
        for template in &remote {
            match self.sync_one(template).await {
                Ok(true) => summary.processed += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    summary.errors += 1;
                    tracing::warn!(
                        "⚠️ Template '{}' failed to sync: {}",
                        template.name.as_deref().unwrap_or("Unknown Template"),
                        e
                    );
                }
            }
        }

        Ok(summary)
    }

    /// `Ok(false)` when the stored copy is already current.
    async fn sync_one(&self, remote: &RemoteTemplate) -> Result<bool> {
        let id = remote
            .id_string()
            .ok_or_else(|| HubError::validation("Template missing ID"))?;

        if !self.force {
            if let Some(existing) = self.store.get(&id).await? {
                if existing.updated_at.is_some() && existing.updated_at == remote.updated_at {
                    return Ok(false);
                }
            }
        }

        let template = DocusealTemplate {
            id,
            name: remote
                .name
                .clone()
                .unwrap_or_else(|| "Unknown Template".to_string()),
            folder_name: remote.folder_name.clone(),
            manufacturer: remote
                .folder_name
                .as_deref()
                .and_then(manufacturer_from_folder),
            field_names: remote.field_names(),
            updated_at: remote.updated_at.clone(),
            synced_at: Utc::now(),
        };

        tracing::debug!(
            "📋 Syncing template '{}' (manufacturer: {})",
            template.name,
            template.manufacturer.as_deref().unwrap_or("Unknown")
        );
        self.store.upsert(&template).await?;
        Ok(true)
    }
}

#[async_trait]
impl ScheduledJob for TemplateSyncJob {
    fn name(&self) -> &str {
        "docuseal-template-sync"
    }

    async fn run(&self) -> Result<String> {
        let summary = self.sync().await?;
        if summary.errors > 0 {
            return Err(HubError::BusinessRuleError {
                message: format!("template sync finished with errors: {}", summary),
            });
        }
        Ok(summary.to_string())
    }
}

/// Re-validates the loaded configuration on a schedule.
pub struct ConfigValidationJob {
    config: Arc<AppConfig>,
}

impl ConfigValidationJob {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ScheduledJob for ConfigValidationJob {
    fn name(&self) -> &str {
        "config-validation"
    }

    async fn run(&self) -> Result<String> {
        self.config.validate()?;

        let warnings = self.config.warnings();
        for warning in &warnings {
            tracing::warn!("⚠️ {}", warning);
        }
        Ok(format!("configuration valid, {} warnings", warnings.len()))
    }
}
