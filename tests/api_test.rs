use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use httpmock::prelude::*;
use serde_json::{json, Value};
use tower::ServiceExt;
use wound_care_hub::core::webhook::{DocusealVerifier, MailgunVerifier};
use wound_care_hub::{AppConfig, HubApp};

const MAILGUN_KEY: &str = "mailgun-signing-key";
const DOCUSEAL_SECRET: &str = "docuseal-webhook-secret";

fn test_app(availity: &MockServer) -> Result<Router> {
    let content = format!(
        r#"
[storage]
backend = "memory"

[mailgun]
webhook_signing_key = "{}"

[docuseal]
webhook_secret = "{}"

[[eligibility.providers]]
name = "availity"
kind = "availity"
base_url = "{}"
access_token = "tok"
"#,
        MAILGUN_KEY,
        DOCUSEAL_SECRET,
        availity.base_url()
    );
    let app = HubApp::from_config(AppConfig::from_toml_str(&content)?)?;
    Ok(app.router())
}

async fn send(router: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

fn get(uri: &str, org: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(org) = org {
        builder = builder.header("x-organization-id", org);
    }
    Ok(builder.body(Body::empty())?)
}

fn post_json(uri: &str, org: Option<&str>, body: &Value) -> Result<Request<Body>> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(org) = org {
        builder = builder.header("x-organization-id", org);
    }
    Ok(builder.body(Body::from(body.to_string()))?)
}

fn mock_active_coverage(server: &MockServer) {
    server.mock(|when, then| {
        when.method(POST).path("/coverages");
        then.status(200).json_body(json!({
            "status": "Active Coverage",
            "plans": [{"description": "Medicare Part B"}]
        }));
    });
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let server = MockServer::start();
    let router = test_app(&server)?;

    let (status, body) = send(&router, get("/health", None)?).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["eligibility_providers"], json!(["availity"]));
    assert_eq!(body["fhir_configured"], false);
    Ok(())
}

#[tokio::test]
async fn test_eligibility_check_is_org_scoped() -> Result<()> {
    let server = MockServer::start();
    mock_active_coverage(&server);
    let router = test_app(&server)?;
    let request = json!({"payer_id": "00123", "order_id": "order-1", "patient": {"member_id": "M1"}});

    let (status, _) = send(&router, post_json("/api/v1/eligibility/check", None, &request)?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) =
        send(&router, post_json("/api/v1/eligibility/check", Some("org-1"), &request)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["provider"], "availity");
    let check_id = body["data"]["check_id"].as_str().unwrap_or_default().to_string();

    let uri = format!("/api/v1/eligibility/checks/{}", check_id);
    let (status, body) = send(&router, get(&uri, Some("org-1"))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order_id"], "order-1");

    let (status, body) = send(&router, get(&uri, Some("org-2"))?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = send(&router, get("/api/v1/eligibility/checks/not-a-uuid", Some("org-1"))?).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(&router, get("/api/v1/orders/order-1/eligibility", Some("org-1"))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    Ok(())
}

#[tokio::test]
async fn test_all_providers_failing_is_not_an_http_error() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/coverages");
        then.status(502);
    });
    let router = test_app(&server)?;

    let (status, body) = send(
        &router,
        post_json("/api/v1/eligibility/check", Some("org-1"), &json!({"payer_id": "00123"}))?,
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["failures"][0]["provider"], "availity");
    Ok(())
}

#[tokio::test]
async fn test_checklist_validation() -> Result<()> {
    let server = MockServer::start();
    let router = test_app(&server)?;

    let foreign = json!({"owner": {"type": "organization", "id": "org-2"}, "patientName": "Jane Doe"});
    let (status, _) = send(&router, post_json("/api/v1/checklists/validate", Some("org-1"), &foreign)?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let checklist = json!({
        "owner": {"type": "organization", "id": "org-1"},
        "woundType": "Diabetic Foot Ulcer (DFU)",
        "patientName": "Jane Doe",
        "dateOfBirth": "1950-02-01",
        "dateOfProcedure": "2024-05-01",
        "location": "Clinic A",
        "ulcerLocation": "left heel",
        "ulcerDuration": "8 weeks",
        "length": 2.0,
        "width": 1.5,
        "woundDepth": 0.3
    });
    let (status, body) =
        send(&router, post_json("/api/v1/checklists/validate", Some("org-1"), &checklist)?).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["wound_type"], "DFU");
    assert_eq!(body["data"]["missing_fields"], json!([]));
    let score = body["data"]["score"].as_f64().unwrap_or(-1.0);
    assert!((0.0..=100.0).contains(&score));

    let malformed = json!({"owner": {"type": "organization", "id": "org-1"}, "dateOfBirth": 19550412});
    let (status, body) =
        send(&router, post_json("/api/v1/checklists/validate", Some("org-1"), &malformed)?).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!body["message"].as_str().unwrap_or_default().contains("19550412"));
    assert!(body["errors"][0].as_str().unwrap_or_default().contains("19550412"));
    Ok(())
}

#[tokio::test]
async fn test_wound_type_normalization() -> Result<()> {
    let server = MockServer::start();
    let router = test_app(&server)?;

    let (status, body) = send(
        &router,
        get("/api/v1/wound-types/normalize?value=venous_leg_ulcer", None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["code"], "VLU");

    let (status, _) = send(&router, get("/api/v1/wound-types/normalize", None)?).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn test_fhir_routes_degrade_without_upstream() -> Result<()> {
    let server = MockServer::start();
    let router = test_app(&server)?;
    let patient = json!({"resourceType": "Patient", "name": [{"family": "Doe"}]});

    let (status, body) = send(&router, post_json("/api/v1/fhir/Patient", Some("org-1"), &patient)?).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].as_str().unwrap_or_default().starts_with("local-patient-"));

    let (status, body) = send(&router, get("/api/v1/fhir/Patient/p-1", Some("org-1"))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resourceType"], "Patient");
    assert_eq!(body["id"], "p-1");

    let (status, body) = send(&router, get("/api/v1/fhir/Patient?family=Doe", Some("org-1"))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "searchset");
    assert_eq!(body["total"], 0);

    let (status, _) = send(&router, post_json("/api/v1/fhir/patient", Some("org-1"), &patient)?).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(&router, get("/api/v1/fhir/metadata", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resourceType"], "CapabilityStatement");
    Ok(())
}

#[tokio::test]
async fn test_mailgun_webhook_signature() -> Result<()> {
    let server = MockServer::start();
    let router = test_app(&server)?;
    let verifier = MailgunVerifier::new(MAILGUN_KEY);

    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = verifier.sign(&timestamp, "token-1")?;
    let webhook = json!({
        "signature": {"timestamp": timestamp, "token": "token-1", "signature": signature},
        "event-data": {"event": "delivered", "recipient": "doc@example.com"}
    });
    let (status, body) = send(&router, post_json("/api/v1/webhooks/mailgun", None, &webhook)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["event"], "delivered");

    let stale = (chrono::Utc::now().timestamp() - 3600).to_string();
    let stale_signature = verifier.sign(&stale, "token-2")?;
    let webhook = json!({
        "signature": {"timestamp": stale, "token": "token-2", "signature": stale_signature},
        "event-data": {"event": "delivered"}
    });
    let (status, _) = send(&router, post_json("/api/v1/webhooks/mailgun", None, &webhook)?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_docuseal_webhook_signature() -> Result<()> {
    let server = MockServer::start();
    let router = test_app(&server)?;
    let body = json!({"event_type": "form.completed", "data": {"id": 7}}).to_string();
    let signature = DocusealVerifier::new(DOCUSEAL_SECRET).sign(body.as_bytes())?;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks/docuseal")
        .header("content-type", "application/json")
        .header("x-docuseal-signature", signature)
        .body(Body::from(body.clone()))?;
    let (status, response) = send(&router, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["data"]["event_type"], "form.completed");

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks/docuseal")
        .header("x-docuseal-signature", "00ff")
        .body(Body::from(body))?;
    let (status, _) = send(&router, request).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_template_sync_requires_docuseal() -> Result<()> {
    let server = MockServer::start();
    let router = test_app(&server)?;

    let (status, body) = send(&router, post_json("/api/v1/docuseal/templates/sync", None, &json!({}))?).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(&router, get("/api/v1/docuseal/templates", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    Ok(())
}
