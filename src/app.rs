use crate::adapters::audit::TracingAuditSink;
use crate::adapters::build_provider;
use crate::adapters::docuseal::DocusealClient;
use crate::adapters::fhir::FhirClient;
use crate::adapters::mailgun::{LogNotifier, MailgunNotifier};
use crate::adapters::storage::{
    FileCheckStore, FileTemplateStore, LocalStorage, MemoryCheckStore, MemoryTemplateStore,
};
use crate::api::{build_router, AppState};
use crate::config::{AppConfig, StorageBackend};
use crate::core::eligibility::EligibilityDispatcher;
use crate::core::jobs::{ConfigValidationJob, SyncSummary, TemplateSyncJob};
use crate::core::scheduler::{JobRunner, Schedule, Scheduler};
use crate::core::webhook::{DocusealVerifier, MailgunVerifier};
use crate::domain::ports::{AuditSink, EligibilityCheckStore, Notifier, TemplateStore};
use crate::utils::error::{HubError, Result};
use crate::utils::phi::{PhiSafeLogger, PhiSanitizer};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;

/// Everything wired from one configuration: API state plus scheduled jobs.
pub struct HubApp {
    config: Arc<AppConfig>,
    state: AppState,
    scheduler: Scheduler,
}

impl HubApp {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        Self::with_audit(config, Arc::new(TracingAuditSink))
    }

    pub fn with_audit(config: AppConfig, audit: Arc<dyn AuditSink>) -> Result<Self> {
        let config = Arc::new(config);
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let (checks, templates) = build_stores(&config);
        let sanitizer = PhiSanitizer::new(&config.phi.extra_fields);

        let mut dispatcher = EligibilityDispatcher::new(Arc::clone(&checks), Arc::clone(&audit))
            .with_sanitizer(sanitizer.clone());
        for provider in config.eligibility.providers.iter().filter(|p| p.enabled) {
            dispatcher.register(build_provider(provider, client.clone())?);
            tracing::info!("🔌 Eligibility provider '{}' registered", provider.name);
        }
        if dispatcher.provider_names().is_empty() {
            tracing::warn!("⚠️ No eligibility providers enabled, checks will be rejected");
        }

        let fhir = Arc::new(FhirClient::from_config(&config.fhir, client.clone()));
        let docuseal = DocusealClient::from_config(&config.docuseal, client.clone()).map(Arc::new);

        let notifier: Arc<dyn Notifier> =
            match MailgunNotifier::from_config(&config.mailgun, client.clone()) {
                Some(mailgun) => Arc::new(mailgun),
                None => Arc::new(LogNotifier),
            };
        let admin_email = config.scheduler.admin_email.clone();

        let mut scheduler = Scheduler::new();
        let template_sync = match &docuseal {
            Some(client) => {
                let runner = Arc::new(JobRunner::new(
                    Arc::new(TemplateSyncJob::new(Arc::clone(client), Arc::clone(&templates))),
                    Schedule::daily_at(&config.scheduler.template_sync_time)?,
                    Arc::clone(&notifier),
                    admin_email.clone(),
                ));
                scheduler.add(Arc::clone(&runner));
                Some(runner)
            }
            None => None,
        };
        scheduler.add(Arc::new(JobRunner::new(
            Arc::new(ConfigValidationJob::new(Arc::clone(&config))),
            Schedule::weekly_at(
                &config.scheduler.config_validation_day,
                &config.scheduler.config_validation_time,
            )?,
            notifier,
            admin_email,
        )));

        let state = AppState {
            dispatcher: Arc::new(dispatcher),
            checks,
            templates,
            fhir,
            docuseal,
            template_sync,
            mailgun_webhooks: config
                .mailgun
                .webhook_signing_key
                .as_deref()
                .map(|key| Arc::new(MailgunVerifier::new(key))),
            docuseal_webhooks: config
                .docuseal
                .webhook_secret
                .as_deref()
                .map(|secret| Arc::new(DocusealVerifier::new(secret))),
            phi: PhiSafeLogger::new(sanitizer, audit),
        };

        Ok(Self {
            config,
            state,
            scheduler,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn router(&self) -> Router {
        build_router(
            self.state.clone(),
            Duration::from_secs(self.config.server.request_timeout_seconds),
        )
    }

    /// One-off sync outside the scheduler.
    pub async fn sync_templates(&self, force: bool) -> Result<SyncSummary> {
        let client = self
            .state
            .docuseal
            .as_ref()
            .ok_or_else(|| HubError::MissingConfigError {
                field: "docuseal.api_key".to_string(),
            })?;

        let job = TemplateSyncJob::new(Arc::clone(client), Arc::clone(&self.state.templates));
        let job = if force { job.forced() } else { job };
        job.sync().await
    }

    pub async fn serve(&self, address: &str, with_scheduler: bool) -> Result<()> {
        let jobs = if with_scheduler && self.config.scheduler.enabled {
            tracing::info!("⏰ Starting {} scheduled jobs", self.scheduler.runners().len());
            self.scheduler.start()
        } else {
            tracing::info!("Scheduler disabled");
            Vec::new()
        };

        let listener = tokio::net::TcpListener::bind(address).await?;
        tracing::info!("🚀 wound-care-hub listening on {}", address);

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await;

        for job in jobs {
            job.abort();
        }
        result?;
        tracing::info!("👋 Server stopped");
        Ok(())
    }
}

fn build_stores(config: &AppConfig) -> (Arc<dyn EligibilityCheckStore>, Arc<dyn TemplateStore>) {
    match config.storage.backend {
        StorageBackend::Memory => (
            Arc::new(MemoryCheckStore::default()),
            Arc::new(MemoryTemplateStore::default()),
        ),
        StorageBackend::File => {
            tracing::info!("💾 Using file storage at {}", config.storage.data_dir);
            (
                Arc::new(FileCheckStore::new(LocalStorage::new(
                    config.storage.data_dir.clone(),
                ))),
                Arc::new(FileTemplateStore::new(LocalStorage::new(
                    config.storage.data_dir.clone(),
                ))),
            )
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
