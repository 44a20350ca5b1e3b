use anyhow::Result;
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;
use wound_care_hub::adapters::audit::MemoryAuditSink;
use wound_care_hub::domain::model::{
    Actor, AuditEvent, EligibilityRequest, EligibilityStatus, OrgScope, PatientInfo,
};
use wound_care_hub::{AppConfig, HubApp};

/// availity 只處理 payer 00123，optum 放第二個當預設
fn two_provider_config(availity: &MockServer, optum: &MockServer) -> Result<AppConfig> {
    let content = format!(
        r#"
[storage]
backend = "memory"

[[eligibility.providers]]
name = "availity"
kind = "availity"
base_url = "{}/availity/v1"
access_token = "availity-static"
payer_ids = ["00123"]
timeout_seconds = 5

[[eligibility.providers]]
name = "optum"
kind = "optum"
base_url = "{}"
client_id = "optum-client"
client_secret = "optum-secret"
timeout_seconds = 5
"#,
        availity.base_url(),
        optum.base_url()
    );
    Ok(AppConfig::from_toml_str(&content)?)
}

fn request(payer_id: &str) -> EligibilityRequest {
    EligibilityRequest {
        payer_id: Some(payer_id.to_string()),
        order_id: Some("order-42".to_string()),
        patient: PatientInfo {
            member_id: Some("M123456".to_string()),
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            date_of_birth: chrono::NaiveDate::from_ymd_opt(1950, 2, 1),
            gender: Some("female".to_string()),
        },
        provider_npi: Some("1234567893".to_string()),
        wound_type: Some("DFU".to_string()),
        ..EligibilityRequest::default()
    }
}

fn actor() -> Actor {
    Actor {
        user_id: Some("u-1".to_string()),
        organization_id: Some("org-1".to_string()),
        ..Actor::default()
    }
}

fn mock_optum_success(server: &MockServer) -> (httpmock::Mock<'_>, httpmock::Mock<'_>) {
    let token = server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(200)
            .json_body(json!({"access_token": "optum-token", "expires_in": 3600}));
    });
    let check = server.mock(|when, then| {
        when.method(POST)
            .path("/eligibility/v3/check")
            .header("authorization", "Bearer optum-token");
        then.status(200).json_body(json!({
            "transactions": [{
                "eligibility": {
                    "status": "eligible",
                    "planName": "Medicare Part B",
                    "costSharing": {"copay": 20.0, "deductibleIndividual": 240.0}
                }
            }]
        }));
    });
    (token, check)
}

#[tokio::test]
async fn test_primary_failure_falls_back_to_default_provider() -> Result<()> {
    let availity = MockServer::start();
    let optum = MockServer::start();

    let availity_call = availity.mock(|when, then| {
        when.method(POST)
            .path("/availity/v1/coverages")
            .header("authorization", "Bearer availity-static")
            .body_contains("payerId=00123");
        then.status(503).body("upstream unavailable for member M123456");
    });
    let (_, optum_call) = mock_optum_success(&optum);

    let audit = Arc::new(MemoryAuditSink::default());
    let app = HubApp::with_audit(two_provider_config(&availity, &optum)?, audit.clone())?;

    let outcome = app.state().dispatcher.check(&actor(), &request("00123")).await?;

    availity_call.assert();
    optum_call.assert();
    assert!(outcome.success);
    assert!(outcome.fallback);
    assert_eq!(outcome.provider.as_deref(), Some("optum"));
    assert_eq!(outcome.providers_tried, vec!["availity", "optum"]);
    assert_eq!(
        outcome.response.as_ref().map(|r| r.status),
        Some(EligibilityStatus::Eligible)
    );
    // 上游錯誤內容不應出現在失敗訊息
    assert_eq!(outcome.failures.len(), 1);
    assert!(!outcome.failures[0].message.contains("M123456"));

    let scope = OrgScope::Organization("org-1".to_string());
    let records = app.state().checks.list_for_order(&scope, "order-42").await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, outcome.check_id);
    assert!(records[0].fallback);

    let events = audit.events();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], AuditEvent::Eligibility(e) if e.fallback && e.success));

    Ok(())
}

#[tokio::test]
async fn test_primary_success_skips_fallback() -> Result<()> {
    let availity = MockServer::start();
    let optum = MockServer::start();

    availity.mock(|when, then| {
        when.method(POST).path("/availity/v1/coverages");
        then.status(200).json_body(json!({
            "status": "Active Coverage",
            "statusCode": "1",
            "plans": [{"description": "Medicare", "groupNumber": "G1"}]
        }));
    });
    let (token_call, check_call) = mock_optum_success(&optum);

    let app = HubApp::from_config(two_provider_config(&availity, &optum)?)?;
    let outcome = app.state().dispatcher.check(&actor(), &request("00123")).await?;

    assert!(outcome.success);
    assert!(!outcome.fallback);
    assert_eq!(outcome.provider.as_deref(), Some("availity"));
    token_call.assert_hits(0);
    check_call.assert_hits(0);

    Ok(())
}

#[tokio::test]
async fn test_unmatched_payer_uses_first_provider_then_others() -> Result<()> {
    let availity = MockServer::start();
    let optum = MockServer::start();

    // 沒有 adapter 宣告支援 99999，預設是第一個（availity）
    let availity_call = availity.mock(|when, then| {
        when.method(POST).path("/availity/v1/coverages");
        then.status(500);
    });
    optum.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(401).body("invalid_client");
    });

    let app = HubApp::from_config(two_provider_config(&availity, &optum)?)?;
    let outcome = app.state().dispatcher.check(&actor(), &request("99999")).await?;

    availity_call.assert();
    assert!(!outcome.success);
    assert!(outcome.response.is_none());
    assert_eq!(outcome.providers_tried, vec!["availity", "optum"]);
    assert_eq!(outcome.failures.len(), 2);

    let record = app
        .state()
        .checks
        .find(&OrgScope::All, outcome.check_id)
        .await?
        .expect("failed checks are persisted");
    assert!(!record.success);
    assert!(record.error.is_some());

    Ok(())
}
