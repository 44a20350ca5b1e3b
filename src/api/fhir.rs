use super::context::RequestContext;
use super::AppState;
use crate::utils::error::{HubError, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{Map, Value};

/// FHIR resource types are PascalCase ASCII names (`Patient`, `Coverage`).
fn validate_resource_type(resource_type: &str) -> Result<()> {
    let valid = resource_type
        .chars()
        .next()
        .map(|c| c.is_ascii_uppercase())
        .unwrap_or(false)
        && resource_type.chars().all(|c| c.is_ascii_alphanumeric());

    if valid {
        Ok(())
    } else {
        Err(HubError::validation(format!(
            "'{}' is not a FHIR resource type",
            resource_type
        )))
    }
}

/// FHIR logical ids: `[A-Za-z0-9\-\.]{1,64}`. Dot-only ids would be path
/// navigation upstream and are refused too.
fn validate_resource_id(id: &str) -> Result<()> {
    let valid = (1..=64).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && !id.chars().all(|c| c == '.');

    if valid {
        Ok(())
    } else {
        Err(HubError::validation("resource id is not a valid FHIR id"))
    }
}

fn check_body_type(resource_type: &str, resource: &Value) -> Result<()> {
    if !resource.is_object() {
        return Err(HubError::validation("FHIR resource must be a JSON object"));
    }
    match resource.get("resourceType").and_then(Value::as_str) {
        Some(declared) if declared != resource_type => Err(HubError::validation(format!(
            "resourceType '{}' does not match path type '{}'",
            declared, resource_type
        ))),
        _ => Ok(()),
    }
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(resource_type): Path<String>,
    Json(resource): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    validate_resource_type(&resource_type)?;
    check_body_type(&resource_type, &resource)?;

    state.phi.log_access(
        &ctx.actor(),
        "create",
        &resource_type,
        None,
        &resource,
        &ctx.audit_context("fhir_create"),
    );

    let created = state.fhir.create(&resource_type, resource).await;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn read(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((resource_type, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    validate_resource_type(&resource_type)?;
    validate_resource_id(&id)?;

    let resource = state
        .fhir
        .read(&resource_type, &id)
        .await
        .ok_or_else(|| HubError::NotFound {
            resource: resource_type.clone(),
            id: id.clone(),
        })?;

    state.phi.log_access(
        &ctx.actor(),
        "read",
        &resource_type,
        Some(&id),
        &resource,
        &ctx.audit_context("fhir_read"),
    );
    Ok(Json(resource))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((resource_type, id)): Path<(String, String)>,
    Json(resource): Json<Value>,
) -> Result<Json<Value>> {
    validate_resource_type(&resource_type)?;
    validate_resource_id(&id)?;
    check_body_type(&resource_type, &resource)?;

    state.phi.log_access(
        &ctx.actor(),
        "update",
        &resource_type,
        Some(&id),
        &resource,
        &ctx.audit_context("fhir_update"),
    );

    Ok(Json(state.fhir.update(&resource_type, &id, resource).await))
}

pub async fn search(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(resource_type): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>> {
    validate_resource_type(&resource_type)?;

    // 查詢參數本身可能就是 PHI（name、birthdate）
    let logged: Map<String, Value> = params
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    state.phi.log_access(
        &ctx.actor(),
        "search",
        &resource_type,
        None,
        &Value::Object(logged),
        &ctx.audit_context("fhir_search"),
    );

    Ok(Json(state.fhir.search(&resource_type, &params).await))
}

pub async fn transaction(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(bundle): Json<Value>,
) -> Result<Json<Value>> {
    if bundle.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
        return Err(HubError::validation("transaction body must be a Bundle"));
    }
    match bundle.get("type").and_then(Value::as_str) {
        Some("transaction") | Some("batch") => {}
        _ => {
            return Err(HubError::validation(
                "Bundle type must be 'transaction' or 'batch'",
            ))
        }
    }

    state.phi.log_access(
        &ctx.actor(),
        "transaction",
        "Bundle",
        None,
        &bundle,
        &ctx.audit_context("fhir_transaction"),
    );

    Ok(Json(state.fhir.transaction(bundle).await))
}

pub async fn capability_statement(State(state): State<AppState>) -> Json<Value> {
    Json(state.fhir.capability_statement().await)
}
