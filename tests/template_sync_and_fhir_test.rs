use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wound_care_hub::adapters::audit::MemoryAuditSink;
use wound_care_hub::domain::model::AuditEvent;
use wound_care_hub::{AppConfig, HubApp};

fn config(docuseal: &MockServer, fhir: &MockServer) -> Result<AppConfig> {
    Ok(AppConfig::from_toml_str(&format!(
        r#"
[storage]
backend = "memory"

[docuseal]
base_url = "{}"
api_key = "ds-key"

[fhir]
base_url = "{}/fhir"
public_base_url = "https://hub.example.com/api/v1/fhir"
access_token = "fhir-token"
"#,
        docuseal.base_url(),
        fhir.base_url()
    ))?)
}

async fn call(app: &HubApp, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = app.router().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

#[tokio::test]
async fn test_template_sync_via_api() -> Result<()> {
    let docuseal = MockServer::start();
    let fhir = MockServer::start();
    let listing = docuseal.mock(|when, then| {
        when.method(GET)
            .path("/templates")
            .header("x-auth-token", "ds-key");
        then.status(200).json_body(json!({
            "data": [
                {"id": 11, "name": "Insurance Verification", "folder_name": "Extremity Care (ACZ) Forms",
                 "updated_at": "2024-06-01T00:00:00Z", "fields": [{"name": "patient_name"}]}
            ],
            "pagination": {"next": null}
        }));
    });

    let app = HubApp::from_config(config(&docuseal, &fhir)?)?;
    let sync = || {
        Request::builder()
            .method("POST")
            .uri("/api/v1/docuseal/templates/sync")
            .body(Body::empty())
    };

    let (status, body) = call(&app, sync()?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["summary"], "1 processed, 0 skipped, 0 errors");

    let (_, body) = call(&app, sync()?).await?;
    assert_eq!(body["data"]["summary"], "0 processed, 1 skipped, 0 errors");
    listing.assert_hits(2);

    let list = Request::builder()
        .uri("/api/v1/docuseal/templates")
        .body(Body::empty())?;
    let (status, body) = call(&app, list).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["manufacturer"], "Extremity Care");
    assert_eq!(body["data"][0]["field_names"], json!(["patient_name"]));

    Ok(())
}

#[tokio::test]
async fn test_fhir_proxy_passes_through_and_audits_phi() -> Result<()> {
    let docuseal = MockServer::start();
    let fhir = MockServer::start();
    let upstream_base = format!("{}/fhir", fhir.base_url());
    let created = fhir.mock(|when, then| {
        when.method(POST)
            .path("/fhir/Patient")
            .header("authorization", "Bearer fhir-token");
        then.status(201).json_body(json!({
            "resourceType": "Patient",
            "id": "abc",
            "name": [{"family": "Doe"}],
            "birthDate": "1950-02-01"
        }));
    });
    fhir.mock(|when, then| {
        when.method(GET).path("/fhir/Patient").query_param("family", "Doe");
        then.status(200).json_body(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "total": 1,
            "link": [{"relation": "self", "url": format!("{}/Patient?family=Doe", upstream_base)}],
            "entry": [{"fullUrl": format!("{}/Patient/abc", upstream_base),
                       "resource": {"resourceType": "Patient", "id": "abc"}}]
        }));
    });
    fhir.mock(|when, then| {
        when.method(GET).path("/fhir/Patient/missing");
        then.status(404);
    });

    let audit = Arc::new(MemoryAuditSink::default());
    let app = HubApp::with_audit(config(&docuseal, &fhir)?, audit.clone())?;

    let create = Request::builder()
        .method("POST")
        .uri("/api/v1/fhir/Patient")
        .header("content-type", "application/json")
        .header("x-organization-id", "org-1")
        .header("x-user-id", "nurse-7")
        .body(Body::from(
            json!({"resourceType": "Patient", "name": [{"family": "Doe"}], "birthDate": "1950-02-01"})
                .to_string(),
        ))?;
    let (status, body) = call(&app, create).await?;
    created.assert();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "abc");

    let phi_events: Vec<_> = audit
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AuditEvent::PhiAccess(record) => Some(record),
            _ => None,
        })
        .collect();
    assert_eq!(phi_events.len(), 1);
    assert_eq!(phi_events[0].action, "create");
    assert_eq!(phi_events[0].actor.user_id.as_deref(), Some("nurse-7"));
    assert!(!phi_events[0].field_names.is_empty());

    let search = Request::builder()
        .uri("/api/v1/fhir/Patient?family=Doe")
        .body(Body::empty())?;
    let (status, body) = call(&app, search).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["entry"][0]["fullUrl"],
        "https://hub.example.com/api/v1/fhir/Patient/abc"
    );

    let missing = Request::builder()
        .uri("/api/v1/fhir/Patient/missing")
        .body(Body::empty())?;
    let (status, body) = call(&app, missing).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    Ok(())
}

#[tokio::test]
async fn test_fhir_id_cannot_reach_other_resource_types() -> Result<()> {
    let docuseal = MockServer::start();
    let fhir = MockServer::start();
    let observation = fhir.mock(|when, then| {
        when.method(GET).path("/fhir/Observation/5");
        then.status(200)
            .json_body(json!({"resourceType": "Observation", "id": "5"}));
    });

    let audit = Arc::new(MemoryAuditSink::default());
    let app = HubApp::with_audit(config(&docuseal, &fhir)?, audit.clone())?;

    let traversal = Request::builder()
        .uri("/api/v1/fhir/Patient/..%2FObservation%2F5")
        .header("x-organization-id", "org-1")
        .body(Body::empty())?;
    let (status, body) = call(&app, traversal).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);

    let update = Request::builder()
        .method("PUT")
        .uri("/api/v1/fhir/Patient/p%201")
        .header("content-type", "application/json")
        .header("x-organization-id", "org-1")
        .body(Body::from(json!({"resourceType": "Patient"}).to_string()))?;
    let (status, _) = call(&app, update).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    observation.assert_hits(0);
    assert!(audit.events().is_empty());
    Ok(())
}
