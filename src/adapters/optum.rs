use crate::adapters::availity::gender_code;
use crate::adapters::oauth::TokenProvider;
use crate::config::ProviderConfig;
use crate::core::eligibility::PayerMatcher;
use crate::core::wound::WoundType;
use crate::domain::model::{
    Benefits, CoverageDetails, EligibilityRequest, EligibilityStatus, ProviderResponse,
};
use crate::domain::ports::EligibilityProvider;
use crate::utils::error::{HubError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

pub struct OptumProvider {
    name: String,
    base_url: String,
    client: Client,
    tokens: TokenProvider,
    matcher: PayerMatcher,
    trading_partner_id: Option<String>,
    timeout: Duration,
}

impl OptumProvider {
    pub fn from_config(config: &ProviderConfig, client: Client) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let tokens = TokenProvider::from_parts(
            client.clone(),
            config.access_token.as_deref(),
            config
                .token_url
                .clone()
                .unwrap_or_else(|| format!("{}/oauth/token", base_url)),
            config.client_id.as_deref(),
            config.client_secret.as_deref(),
            Some("eligibility".to_string()),
        )?;

        Ok(Self {
            name: config.name.clone(),
            base_url,
            client,
            tokens,
            matcher: PayerMatcher::new(&config.payer_ids, &config.payer_name_patterns),
            trading_partner_id: config.trading_partner_id.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    fn build_body(&self, request: &EligibilityRequest) -> Value {
        let service_date = request.service_date.unwrap_or_else(|| Utc::now().date_naive());
        let wound = request
            .wound_type
            .as_deref()
            .map(WoundType::normalize)
            .unwrap_or(WoundType::Other);

        json!({
            "controlNumber": control_number(),
            "tradingPartnerServiceId": self
                .trading_partner_id
                .clone()
                .or_else(|| request.payer_id.clone()),
            "provider": {
                "npi": request.provider_npi,
            },
            "subscriber": {
                "memberId": request.patient.member_id,
                "firstName": request.patient.first_name,
                "lastName": request.patient.last_name,
                "dateOfBirth": request.patient.date_of_birth.map(compact_date),
                "gender": gender_code(request.patient.gender.as_deref()),
            },
            "encounter": {
                "dateOfService": compact_date(service_date),
                "serviceTypeCodes": wound.service_type_codes(),
                "procedureCodes": request.procedure_codes,
            },
        })
    }

    fn parse_response(body: Value) -> ProviderResponse {
        let eligibility = body
            .pointer("/transactions/0/eligibility")
            .cloned()
            .unwrap_or(Value::Null);
        let text = |key: &str| {
            eligibility
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let cost = |key: &str| {
            eligibility
                .get("costSharing")
                .and_then(|c| c.get(key))
                .and_then(Value::as_f64)
        };

        let raw_status = text("status").unwrap_or_else(|| "unknown".to_string());
        let status = map_status(&raw_status);

        let prior_auth_required = eligibility
            .get("priorAuthRequired")
            .and_then(Value::as_bool)
            .unwrap_or(false)
            || eligibility
                .get("requirements")
                .and_then(Value::as_array)
                .map(|reqs| reqs.iter().any(|r| r.as_str() == Some("prior_auth_required")))
                .unwrap_or(false);

        ProviderResponse {
            status,
            coverage: CoverageDetails {
                is_covered: raw_status == "eligible",
                plan_name: text("planName"),
                group_number: text("groupNumber"),
                effective_date: text("effectiveDate"),
                termination_date: text("terminationDate"),
            },
            benefits: Benefits {
                copay: cost("copay"),
                deductible: cost("deductibleIndividual"),
                coinsurance: cost("coinsurance"),
                out_of_pocket_max: cost("oopMaxIndividual"),
            },
            prior_auth_required,
            raw: body,
        }
    }
}

#[async_trait]
impl EligibilityProvider for OptumProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_payer(&self, payer_id: Option<&str>, payer_name: Option<&str>) -> bool {
        self.matcher.matches(payer_id, payer_name)
    }

    async fn check_eligibility(&self, request: &EligibilityRequest) -> Result<ProviderResponse> {
        let token = self.tokens.token().await?;
        let body = self.build_body(request);

        tracing::debug!(
            "📡 {}: POST {}/eligibility/v3/check",
            self.name,
            self.base_url
        );

        let response = self
            .client
            .post(format!("{}/eligibility/v3/check", self.base_url))
            .bearer_auth(token)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HubError::UpstreamError {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        Ok(Self::parse_response(body))
    }
}

fn map_status(status: &str) -> EligibilityStatus {
    match status.to_lowercase().as_str() {
        "eligible" | "active" => EligibilityStatus::Eligible,
        "not_eligible" | "inactive" | "terminated" => EligibilityStatus::NotEligible,
        _ => EligibilityStatus::NeedsReview,
    }
}

/// X12 control number: exactly nine digits.
fn control_number() -> String {
    format!("{:09}", Uuid::new_v4().as_u128() % 1_000_000_000)
}

fn compact_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::domain::model::PatientInfo;
    use httpmock::prelude::*;

    fn config(base_url: String) -> ProviderConfig {
        ProviderConfig {
            name: "optum".to_string(),
            kind: ProviderKind::Optum,
            enabled: true,
            base_url,
            token_url: None,
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            access_token: None,
            payer_ids: vec!["87726".to_string()],
            payer_name_patterns: vec!["united".to_string()],
            trading_partner_id: Some("UHC".to_string()),
            timeout_seconds: 5,
        }
    }

    #[test]
    fn test_control_number_is_nine_digits() {
        for _ in 0..20 {
            let number = control_number();
            assert_eq!(number.len(), 9);
            assert!(number.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_status("eligible"), EligibilityStatus::Eligible);
        assert_eq!(map_status("ACTIVE"), EligibilityStatus::Eligible);
        assert_eq!(map_status("terminated"), EligibilityStatus::NotEligible);
        assert_eq!(map_status("pending"), EligibilityStatus::NeedsReview);
        assert_eq!(map_status("unknown"), EligibilityStatus::NeedsReview);
        assert_eq!(map_status("???"), EligibilityStatus::NeedsReview);
    }

    #[test]
    fn test_body_uses_compact_dates_and_wound_service_codes() {
        let provider =
            OptumProvider::from_config(&config("https://x.example.com".to_string()), Client::new())
                .unwrap();
        let request = EligibilityRequest {
            wound_type: Some("Traumatic Wound".to_string()),
            service_date: NaiveDate::from_ymd_opt(2024, 3, 9),
            patient: PatientInfo {
                date_of_birth: NaiveDate::from_ymd_opt(1948, 12, 31),
                gender: Some("male".to_string()),
                ..PatientInfo::default()
            },
            ..EligibilityRequest::default()
        };

        let body = provider.build_body(&request);

        assert_eq!(body["encounter"]["dateOfService"], "20240309");
        assert_eq!(body["encounter"]["serviceTypeCodes"], json!(["1"]));
        assert_eq!(body["subscriber"]["dateOfBirth"], "19481231");
        assert_eq!(body["subscriber"]["gender"], "M");
        assert_eq!(body["tradingPartnerServiceId"], "UHC");
    }

    #[tokio::test]
    async fn test_check_eligibility_with_oauth() {
        let server = MockServer::start();
        let token_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/oauth/token")
                .body_contains("scope=eligibility");
            then.status(200)
                .json_body(json!({"access_token": "optum-token", "expires_in": 3600}));
        });
        let check_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/eligibility/v3/check")
                .header("authorization", "Bearer optum-token");
            then.status(200).json_body(json!({
                "controlNumber": "123456789",
                "transactions": [{
                    "eligibility": {
                        "status": "eligible",
                        "planName": "Choice Plus",
                        "requirements": ["prior_auth_required"],
                        "costSharing": {"copay": 25.0, "deductibleIndividual": 500.0}
                    }
                }]
            }));
        });

        let provider =
            OptumProvider::from_config(&config(server.base_url()), Client::new()).unwrap();
        let response = provider
            .check_eligibility(&EligibilityRequest::default())
            .await
            .unwrap();

        token_mock.assert();
        check_mock.assert();
        assert_eq!(response.status, EligibilityStatus::Eligible);
        assert!(response.coverage.is_covered);
        assert!(response.prior_auth_required);
        assert_eq!(response.benefits.copay, Some(25.0));
        assert_eq!(response.benefits.deductible, Some(500.0));
    }
}
