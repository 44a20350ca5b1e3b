// HTTP surface: `/health` plus the `/api/v1` JSON API.

pub mod context;
pub mod error;
pub mod fhir;
pub mod handlers;
pub mod webhooks;

pub use context::RequestContext;

use crate::adapters::docuseal::DocusealClient;
use crate::adapters::fhir::FhirClient;
use crate::core::eligibility::EligibilityDispatcher;
use crate::core::scheduler::JobRunner;
use crate::core::webhook::{DocusealVerifier, MailgunVerifier};
use crate::domain::ports::{EligibilityCheckStore, TemplateStore};
use crate::utils::phi::PhiSafeLogger;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared services handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<EligibilityDispatcher>,
    pub checks: Arc<dyn EligibilityCheckStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub fhir: Arc<FhirClient>,
    pub docuseal: Option<Arc<DocusealClient>>,
    pub template_sync: Option<Arc<JobRunner>>,
    pub mailgun_webhooks: Option<Arc<MailgunVerifier>>,
    pub docuseal_webhooks: Option<Arc<DocusealVerifier>>,
    pub phi: PhiSafeLogger,
}

pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let api = Router::new()
        .route("/eligibility/check", post(handlers::check_eligibility))
        .route("/eligibility/checks/{id}", get(handlers::get_eligibility_check))
        .route("/orders/{order_id}/eligibility", get(handlers::list_order_eligibility))
        .route("/checklists/validate", post(handlers::validate_checklist))
        .route("/wound-types/normalize", get(handlers::normalize_wound_type))
        .route("/docuseal/templates", get(handlers::list_templates))
        .route("/docuseal/templates/sync", post(handlers::sync_templates))
        .route("/fhir", post(fhir::transaction))
        .route("/fhir/metadata", get(fhir::capability_statement))
        .route("/fhir/{resource_type}", post(fhir::create).get(fhir::search))
        .route("/fhir/{resource_type}/{id}", get(fhir::read).put(fhir::update))
        .route("/webhooks/mailgun", post(webhooks::mailgun))
        .route("/webhooks/docuseal", post(webhooks::docuseal));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
