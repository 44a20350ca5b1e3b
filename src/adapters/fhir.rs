//! FHIR R4 REST client.
//!
//! Every call degrades: when the server is not configured, unreachable or
//! answers with a non-2xx status, the caller receives a locally built
//! resource of the same shape instead of an error. The only outcome that is
//! passed through is a real `404` on read, which becomes `None`.

use crate::adapters::oauth::TokenProvider;
use crate::config::FhirConfig;
use crate::utils::error::{HubError, Result};
use chrono::Utc;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

const FHIR_JSON: &str = "application/fhir+json";
const FALLBACK_TAG_SYSTEM: &str = "https://wound-care-hub.local/fhir/tags";

enum Reply {
    Found(Value),
    NotFound,
}

pub struct FhirClient {
    client: Client,
    base_url: Option<String>,
    public_base_url: Option<String>,
    tokens: Option<TokenProvider>,
    timeout: Duration,
}

impl FhirClient {
    pub fn from_config(config: &FhirConfig, client: Client) -> Self {
        let base_url = config
            .base_url
            .as_ref()
            .map(|u| u.trim_end_matches('/').to_string());

        let tokens = match (&base_url, &config.access_token) {
            (_, Some(token)) => Some(TokenProvider::static_token(token.clone())),
            (Some(base), None) => {
                let token_url = config.token_url.clone().or_else(|| {
                    config.tenant_id.as_ref().map(|tenant| {
                        format!("https://login.microsoftonline.com/{}/oauth2/v2.0/token", tenant)
                    })
                });
                match (token_url, &config.client_id, &config.client_secret) {
                    (Some(url), Some(id), Some(secret)) => Some(TokenProvider::client_credentials(
                        client.clone(),
                        url,
                        id.clone(),
                        secret.clone(),
                        Some(format!("{}/.default", base)),
                    )),
                    _ => None,
                }
            }
            (None, None) => None,
        };

        if base_url.is_none() {
            tracing::warn!("⚠️ FHIR server not configured, resources will be served from local mocks");
        }

        Self {
            client,
            base_url,
            public_base_url: config
                .public_base_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
            tokens,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// Client with no upstream; every call returns a mock.
    pub fn unconfigured() -> Self {
        Self::from_config(&FhirConfig::default(), Client::new())
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    pub async fn create(&self, resource_type: &str, resource: Value) -> Value {
        match self
            .send(Method::POST, &[resource_type], &[], Some(&resource))
            .await
        {
            Ok(Reply::Found(created)) => self.rewrite_urls(created),
            Ok(Reply::NotFound) => self.degrade("create", resource_type, "404 Not Found", || {
                mock_write(resource_type, None, resource.clone())
            }),
            Err(e) => self.degrade("create", resource_type, &e.user_friendly_message(), || {
                mock_write(resource_type, None, resource.clone())
            }),
        }
    }

    pub async fn read(&self, resource_type: &str, id: &str) -> Option<Value> {
        match self.send(Method::GET, &[resource_type, id], &[], None).await {
            Ok(Reply::Found(resource)) => Some(self.rewrite_urls(resource)),
            Ok(Reply::NotFound) => None,
            Err(e) => Some(self.degrade("read", resource_type, &e.user_friendly_message(), || {
                mock_placeholder(resource_type, id)
            })),
        }
    }

    pub async fn update(&self, resource_type: &str, id: &str, resource: Value) -> Value {
        match self
            .send(Method::PUT, &[resource_type, id], &[], Some(&resource))
            .await
        {
            Ok(Reply::Found(updated)) => self.rewrite_urls(updated),
            Ok(Reply::NotFound) => self.degrade("update", resource_type, "404 Not Found", || {
                mock_write(resource_type, Some(id), resource.clone())
            }),
            Err(e) => self.degrade("update", resource_type, &e.user_friendly_message(), || {
                mock_write(resource_type, Some(id), resource.clone())
            }),
        }
    }

    pub async fn search(&self, resource_type: &str, params: &[(String, String)]) -> Value {
        match self.send(Method::GET, &[resource_type], params, None).await {
            Ok(Reply::Found(bundle)) => self.rewrite_urls(bundle),
            Ok(Reply::NotFound) => {
                self.degrade("search", resource_type, "404 Not Found", empty_searchset)
            }
            Err(e) => self.degrade("search", resource_type, &e.user_friendly_message(), empty_searchset),
        }
    }

    pub async fn transaction(&self, bundle: Value) -> Value {
        match self.send(Method::POST, &[], &[], Some(&bundle)).await {
            Ok(Reply::Found(response)) => self.rewrite_urls(response),
            Ok(Reply::NotFound) => self.degrade("transaction", "Bundle", "404 Not Found", || {
                mock_transaction_response(&bundle)
            }),
            Err(e) => self.degrade("transaction", "Bundle", &e.user_friendly_message(), || {
                mock_transaction_response(&bundle)
            }),
        }
    }

    pub async fn capability_statement(&self) -> Value {
        match self.send(Method::GET, &["metadata"], &[], None).await {
            Ok(Reply::Found(statement)) => statement,
            Ok(Reply::NotFound) => self.degrade(
                "capabilities",
                "CapabilityStatement",
                "404 Not Found",
                local_capability_statement,
            ),
            Err(e) => self.degrade(
                "capabilities",
                "CapabilityStatement",
                &e.user_friendly_message(),
                local_capability_statement,
            ),
        }
    }

    fn degrade(
        &self,
        operation: &str,
        resource_type: &str,
        reason: &str,
        build: impl FnOnce() -> Value,
    ) -> Value {
        tracing::warn!(
            operation,
            resource_type,
            "⚠️ FHIR {} failed, serving mock resource: {}",
            operation,
            reason
        );
        build()
    }

    /// Each segment is percent-encoded, so an id never adds path levels.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let base_url = self.base_url.as_ref().ok_or_else(|| HubError::ConfigError {
            message: "FHIR base_url is not configured".to_string(),
        })?;

        let mut url = Url::parse(base_url).map_err(|e| HubError::ConfigError {
            message: format!("invalid FHIR base_url '{}': {}", base_url, e),
        })?;
        url.path_segments_mut()
            .map_err(|_| HubError::ConfigError {
                message: format!("FHIR base_url '{}' cannot take a path", base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Reply> {
        let url = self.endpoint(segments)?;

        let mut request = self
            .client
            .request(method, url)
            .header("Accept", FHIR_JSON)
            .timeout(self.timeout);

        if let Some(tokens) = &self.tokens {
            request = request.bearer_auth(tokens.token().await?);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request
                .header("Content-Type", FHIR_JSON)
                .body(serde_json::to_vec(body)?);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(Reply::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HubError::UpstreamError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Reply::Found(response.json().await?))
    }

    /// 把上游 URL 換成對外公開的 base URL
    fn rewrite_urls(&self, mut value: Value) -> Value {
        let (Some(upstream), Some(public)) = (&self.base_url, &self.public_base_url) else {
            return value;
        };
        if value.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
            return value;
        }

        if let Some(entries) = value.get_mut("entry").and_then(Value::as_array_mut) {
            for entry in entries {
                if let Some(Value::String(full_url)) = entry.get_mut("fullUrl") {
                    if full_url.starts_with(upstream.as_str()) {
                        *full_url = full_url.replacen(upstream.as_str(), public, 1);
                    }
                }
                if let Some(Value::String(location)) = entry.pointer_mut("/response/location") {
                    if location.starts_with(upstream.as_str()) {
                        *location = location.replacen(upstream.as_str(), public, 1);
                    }
                }
            }
        }

        if let Some(links) = value.get_mut("link").and_then(Value::as_array_mut) {
            for link in links {
                if let Some(Value::String(url)) = link.get_mut("url") {
                    *url = url.replace(upstream.as_str(), public);
                }
            }
        }

        value
    }
}

fn mock_meta() -> Value {
    json!({
        "versionId": "1",
        "lastUpdated": Utc::now().to_rfc3339(),
        "tag": [{"system": FALLBACK_TAG_SYSTEM, "code": "mock", "display": "fallback/mock"}]
    })
}

fn mock_write(resource_type: &str, id: Option<&str>, resource: Value) -> Value {
    let id = id.map(str::to_string).unwrap_or_else(|| {
        format!("local-{}-{}", resource_type.to_lowercase(), Uuid::new_v4())
    });

    let mut object = match resource {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    object.insert("resourceType".to_string(), json!(resource_type));
    object.insert("id".to_string(), json!(id));
    object.insert("meta".to_string(), mock_meta());
    Value::Object(object)
}

fn mock_placeholder(resource_type: &str, id: &str) -> Value {
    json!({
        "resourceType": resource_type,
        "id": id,
        "meta": mock_meta(),
    })
}

fn empty_searchset() -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": 0,
        "entry": []
    })
}

fn mock_transaction_response(bundle: &Value) -> Value {
    let entries: Vec<Value> = bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .map(|entry| {
                    let resource_type = entry
                        .pointer("/resource/resourceType")
                        .and_then(Value::as_str)
                        .unwrap_or("Resource");
                    let id = entry
                        .pointer("/resource/id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| {
                            format!("local-{}-{}", resource_type.to_lowercase(), Uuid::new_v4())
                        });
                    json!({
                        "response": {
                            "status": "201 Created",
                            "location": format!("{}/{}/_history/1", resource_type, id),
                            "etag": "W/\"1\"",
                            "lastModified": Utc::now().to_rfc3339(),
                        }
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    json!({
        "resourceType": "Bundle",
        "id": format!("local-bundle-{}", Uuid::new_v4()),
        "type": "transaction-response",
        "meta": mock_meta(),
        "entry": entries,
    })
}

fn local_capability_statement() -> Value {
    json!({
        "resourceType": "CapabilityStatement",
        "id": "wound-care-hub-fhir",
        "name": "WoundCareHubFhir",
        "status": "active",
        "experimental": false,
        "date": Utc::now().format("%Y-%m-%d").to_string(),
        "kind": "instance",
        "software": {"name": "wound-care-hub", "version": env!("CARGO_PKG_VERSION")},
        "fhirVersion": "4.0.1",
        "format": [FHIR_JSON],
        "rest": [{
            "mode": "server",
            "resource": [{
                "type": "Patient",
                "interaction": [
                    {"code": "read"},
                    {"code": "create"},
                    {"code": "update"},
                    {"code": "search-type"}
                ]
            }],
            "interaction": [{"code": "transaction"}]
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn configured(base_url: String, public: Option<&str>) -> FhirClient {
        FhirClient::from_config(
            &FhirConfig {
                base_url: Some(base_url),
                public_base_url: public.map(str::to_string),
                access_token: Some("fhir-token".to_string()),
                ..FhirConfig::default()
            },
            Client::new(),
        )
    }

    fn is_mock(resource: &Value) -> bool {
        resource.pointer("/meta/tag/0/code") == Some(&json!("mock"))
    }

    #[tokio::test]
    async fn test_unconfigured_create_returns_local_resource() {
        let client = FhirClient::unconfigured();

        let created = client
            .create("Patient", json!({"gender": "female"}))
            .await;

        assert_eq!(created["resourceType"], "Patient");
        assert!(created["id"].as_str().unwrap().starts_with("local-patient-"));
        assert_eq!(created["gender"], "female");
        assert_eq!(created["meta"]["versionId"], "1");
        assert!(is_mock(&created));
    }

    #[tokio::test]
    async fn test_unconfigured_search_and_read() {
        let client = FhirClient::unconfigured();

        let bundle = client.search("Coverage", &[]).await;
        assert_eq!(bundle["type"], "searchset");
        assert_eq!(bundle["total"], 0);

        let read = client.read("Patient", "p-1").await.unwrap();
        assert_eq!(read["id"], "p-1");
        assert!(is_mock(&read));
    }

    #[tokio::test]
    async fn test_transaction_fallback_marks_entries_created() {
        let client = FhirClient::unconfigured();
        let bundle = json!({
            "resourceType": "Bundle",
            "type": "transaction",
            "entry": [
                {"resource": {"resourceType": "Patient"}},
                {"resource": {"resourceType": "Condition", "id": "c-1"}}
            ]
        });

        let response = client.transaction(bundle).await;

        assert_eq!(response["type"], "transaction-response");
        let entries = response["entry"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        for entry in entries {
            assert_eq!(entry["response"]["status"], "201 Created");
            assert!(entry["response"]["location"].is_string());
        }
        assert_eq!(entries[1]["response"]["location"], "Condition/c-1/_history/1");
    }

    #[tokio::test]
    async fn test_read_passes_through_real_404() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/Patient/missing");
            then.status(404).json_body(json!({"resourceType": "OperationOutcome"}));
        });

        let client = configured(server.base_url(), None);
        assert!(client.read("Patient", "missing").await.is_none());
    }

    #[tokio::test]
    async fn test_server_error_degrades_to_mock() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/Patient/p-9");
            then.status(500);
        });

        let client = configured(server.base_url(), None);
        let updated = client
            .update("Patient", "p-9", json!({"resourceType": "Patient", "active": true}))
            .await;

        assert_eq!(updated["id"], "p-9");
        assert_eq!(updated["active"], true);
        assert!(is_mock(&updated));
    }

    #[tokio::test]
    async fn test_search_uses_bearer_token_and_rewrites_urls() {
        let server = MockServer::start();
        let upstream = server.base_url();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/Patient")
                .query_param("family", "Doe")
                .header("authorization", "Bearer fhir-token");
            then.status(200).json_body(json!({
                "resourceType": "Bundle",
                "type": "searchset",
                "total": 1,
                "link": [{"relation": "self", "url": format!("{}/Patient?family=Doe", upstream)}],
                "entry": [{
                    "fullUrl": format!("{}/Patient/p-1", upstream),
                    "resource": {"resourceType": "Patient", "id": "p-1"}
                }]
            }));
        });

        let client = configured(server.base_url(), Some("https://hub.example.com/api/v1/fhir"));
        let bundle = client
            .search("Patient", &[("family".to_string(), "Doe".to_string())])
            .await;

        mock.assert();
        assert_eq!(bundle["total"], 1);
        assert_eq!(
            bundle["entry"][0]["fullUrl"],
            "https://hub.example.com/api/v1/fhir/Patient/p-1"
        );
        assert_eq!(
            bundle["link"][0]["url"],
            "https://hub.example.com/api/v1/fhir/Patient?family=Doe"
        );
    }

    #[tokio::test]
    async fn test_id_is_sent_as_a_single_path_segment() {
        let server = MockServer::start();
        let other_type = server.mock(|when, then| {
            when.method(GET).path("/Observation/5");
            then.status(200)
                .json_body(json!({"resourceType": "Observation", "id": "5"}));
        });

        let client = configured(server.base_url(), None);
        let url = client.endpoint(&["Patient", "../Observation/5"]).unwrap();
        assert!(url.path().starts_with("/Patient/"));
        assert!(url.path().contains("%2F"));

        let _ = client.read("Patient", "../Observation/5").await;
        other_type.assert_hits(0);
    }

    #[test]
    fn test_degrade_reason_omits_upstream_body() {
        let error = HubError::UpstreamError {
            status: 400,
            body: r#"{"resourceType":"OperationOutcome","diagnostics":"Doe, Jane"}"#.to_string(),
        };
        let reason = error.user_friendly_message();
        assert!(reason.contains("400"));
        assert!(!reason.contains("Doe"));
    }

    #[tokio::test]
    async fn test_capability_statement_fallback() {
        let statement = FhirClient::unconfigured().capability_statement().await;
        assert_eq!(statement["resourceType"], "CapabilityStatement");
        assert_eq!(statement["fhirVersion"], "4.0.1");
    }
}
