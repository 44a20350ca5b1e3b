use crate::adapters::oauth::TokenProvider;
use crate::config::ProviderConfig;
use crate::core::eligibility::PayerMatcher;
use crate::domain::model::{
    Benefits, CoverageDetails, EligibilityRequest, EligibilityStatus, ProviderResponse,
};
use crate::domain::ports::EligibilityProvider;
use crate::utils::error::{HubError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TOKEN_URL: &str = "https://api.availity.com/availity/v1/token";
const DEFAULT_PROCEDURE_CODES: &[&str] = &["Q4100", "Q4101"];
/// Availity 一律以 DME (30) 查詢
const SERVICE_TYPE: &str = "30";

pub struct AvailityProvider {
    name: String,
    base_url: String,
    client: Client,
    tokens: TokenProvider,
    matcher: PayerMatcher,
    timeout: Duration,
}

impl AvailityProvider {
    pub fn from_config(config: &ProviderConfig, client: Client) -> Result<Self> {
        let tokens = TokenProvider::from_parts(
            client.clone(),
            config.access_token.as_deref(),
            config
                .token_url
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            config.client_id.as_deref(),
            config.client_secret.as_deref(),
            Some("hipaa".to_string()),
        )?;

        Ok(Self {
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            tokens,
            matcher: PayerMatcher::new(&config.payer_ids, &config.payer_name_patterns),
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    /// Form fields for `POST /coverages`; empty values are dropped.
    fn build_form(request: &EligibilityRequest) -> Vec<(&'static str, String)> {
        let as_of = request.service_date.unwrap_or_else(|| Utc::now().date_naive());

        let mut form: Vec<(&'static str, String)> = vec![
            ("payerId", request.payer_id.clone().unwrap_or_default()),
            ("providerNpi", request.provider_npi.clone().unwrap_or_default()),
            ("asOfDate", availity_datetime(as_of)),
            ("serviceType", SERVICE_TYPE.to_string()),
            ("memberId", request.patient.member_id.clone().unwrap_or_default()),
            (
                "patientFirstName",
                request.patient.first_name.clone().unwrap_or_default(),
            ),
            (
                "patientLastName",
                request.patient.last_name.clone().unwrap_or_default(),
            ),
            (
                "patientBirthDate",
                request
                    .patient
                    .date_of_birth
                    .map(availity_datetime)
                    .unwrap_or_default(),
            ),
            (
                "patientGender",
                gender_code(request.patient.gender.as_deref()).to_string(),
            ),
        ];

        if request.procedure_codes.is_empty() {
            for code in DEFAULT_PROCEDURE_CODES {
                form.push(("procedureCode", code.to_string()));
            }
        } else {
            for code in &request.procedure_codes {
                form.push(("procedureCode", code.clone()));
            }
        }

        form.retain(|(_, value)| !value.is_empty());
        form
    }

    fn parse_response(body: Value) -> ProviderResponse {
        let status = determine_status(
            body.get("status").and_then(Value::as_str).unwrap_or(""),
            &body.get("statusCode").map(value_as_string).unwrap_or_default(),
        );

        let plans = body
            .get("plans")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let first_plan = plans.first();
        let plan_field = |key: &str| {
            first_plan
                .and_then(|p| p.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let prior_auth_required = plans.iter().any(|plan| {
            plan.get("authorizationRequired")
                .and_then(Value::as_bool)
                .unwrap_or(false)
        });

        ProviderResponse {
            status,
            coverage: CoverageDetails {
                is_covered: status == EligibilityStatus::Eligible,
                plan_name: plan_field("description"),
                group_number: plan_field("groupNumber"),
                effective_date: plan_field("eligibilityStartDate"),
                termination_date: plan_field("eligibilityEndDate"),
            },
            benefits: Benefits::default(),
            prior_auth_required,
            raw: body,
        }
    }
}

#[async_trait]
impl EligibilityProvider for AvailityProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_payer(&self, payer_id: Option<&str>, payer_name: Option<&str>) -> bool {
        self.matcher.matches(payer_id, payer_name)
    }

    async fn check_eligibility(&self, request: &EligibilityRequest) -> Result<ProviderResponse> {
        let token = self.tokens.token().await?;
        let form = Self::build_form(request);

        tracing::debug!("📡 {}: POST {}/coverages", self.name, self.base_url);

        let response = self
            .client
            .post(format!("{}/coverages", self.base_url))
            .bearer_auth(token)
            .timeout(self.timeout)
            .form(&form)
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

fn determine_status(status: &str, status_code: &str) -> EligibilityStatus {
    let status = status.to_lowercase();
    // "inactive" 也包含 "active"，先判斷
    if status.contains("inactive") || status_code == "6" {
        EligibilityStatus::NotEligible
    } else if status.contains("active") || status_code == "1" {
        EligibilityStatus::Eligible
    } else if status.contains("pending") {
        EligibilityStatus::Pending
    } else {
        EligibilityStatus::NeedsReview
    }
}

fn availity_datetime(date: NaiveDate) -> String {
    date.format("%Y-%m-%dT00:00:00Z").to_string()
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

pub(crate) fn gender_code(gender: Option<&str>) -> &'static str {
    match gender.map(|g| g.trim().to_lowercase()).as_deref() {
        Some("male") | Some("m") => "M",
        Some("female") | Some("f") => "F",
        _ => "U",
    }
}
