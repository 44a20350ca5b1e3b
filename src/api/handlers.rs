use super::context::RequestContext;
use super::error::{invalid_payload, ok};
use super::AppState;
use crate::core::checklist::{validate_checklist as run_checklist_rules, ClinicalChecklist};
use crate::core::scheduler::RunStatus;
use crate::core::wound::WoundType;
use crate::domain::model::EligibilityRequest;
use crate::utils::error::{HubError, Result};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "eligibility_providers": state.dispatcher.provider_names(),
        "fhir_configured": state.fhir.is_configured(),
        "docuseal_configured": state.docuseal.is_some(),
    }))
}

/// Aggregate provider failure is still a 200 with `success: false`; the
/// attempt is persisted either way.
pub async fn check_eligibility(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<EligibilityRequest>,
) -> Result<Json<Value>> {
    ctx.scope()?;

    let outcome = state.dispatcher.check(&ctx.actor(), &request).await?;
    Ok(Json(json!({
        "success": outcome.success,
        "data": outcome,
    })))
}

pub async fn get_eligibility_check(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let scope = ctx.scope()?;
    let check_id = Uuid::parse_str(&id)
        .map_err(|_| HubError::validation(format!("'{}' is not a valid check id", id)))?;

    let record = state
        .checks
        .find(&scope, check_id)
        .await?
        .ok_or_else(|| HubError::NotFound {
            resource: "eligibility check".to_string(),
            id,
        })?;

    Ok(ok(record))
}

pub async fn list_order_eligibility(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(order_id): Path<String>,
) -> Result<Json<Value>> {
    let scope = ctx.scope()?;
    let records = state.checks.list_for_order(&scope, &order_id).await?;
    Ok(ok(records))
}

pub async fn validate_checklist(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<Value>,
) -> Result<Json<Value>> {
    let checklist: ClinicalChecklist = serde_json::from_value(payload.clone())
        .map_err(|e| invalid_payload("checklist", &e))?;

    // 跨組織的 checklist 只有 super admin 能驗證
    if let Some(owner_org) = checklist.owner.as_ref().and_then(|o| o.organization_id()) {
        if !ctx.super_admin && ctx.organization_id.as_deref() != Some(owner_org) {
            return Err(HubError::Forbidden {
                message: "checklist belongs to another organization".to_string(),
            });
        }
    }

    state.phi.log_access(
        &ctx.actor(),
        "validate",
        "checklist",
        checklist.owner.as_ref().map(|o| o.id()),
        &payload,
        &ctx.audit_context("checklist_validation"),
    );

    let report = run_checklist_rules(&checklist);
    tracing::info!(
        score = report.score,
        errors = report.errors.len(),
        missing = report.missing_fields.len(),
        "📋 Checklist validated: {:?}",
        report.compliance
    );
    Ok(ok(report))
}

#[derive(Debug, Deserialize)]
pub struct NormalizeQuery {
    pub value: Option<String>,
}

pub async fn normalize_wound_type(Query(query): Query<NormalizeQuery>) -> Result<Json<Value>> {
    let value = query
        .value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| HubError::validation("query parameter 'value' is required"))?;

    let wound_type = WoundType::normalize(&value);
    Ok(ok(json!({
        "input": value,
        "code": wound_type.code(),
        "display_name": wound_type.display_name(),
    })))
}

pub async fn list_templates(State(state): State<AppState>) -> Result<Json<Value>> {
    let templates = state.templates.list().await?;
    Ok(ok(templates))
}

/// Runs the same job the scheduler runs, so it shares the overlap guard.
pub async fn sync_templates(State(state): State<AppState>) -> Result<Json<Value>> {
    let runner = state
        .template_sync
        .as_ref()
        .ok_or_else(|| HubError::BusinessRuleError {
            message: "DocuSeal is not configured".to_string(),
        })?;

    match runner.run_once().await {
        RunStatus::Completed(summary) => Ok(ok(json!({
            "status": "completed",
            "summary": summary,
        }))),
        RunStatus::Skipped => Err(HubError::BusinessRuleError {
            message: "a template sync is already running".to_string(),
        }),
        RunStatus::Failed(message) => Err(HubError::provider("docuseal", message)),
    }
}
