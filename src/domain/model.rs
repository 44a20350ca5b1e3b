use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientInfo {
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
}

/// Request bag for an eligibility check. Every field is optional; adapters
/// decide which ones they need.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EligibilityRequest {
    #[serde(default)]
    pub payer_id: Option<String>,
    #[serde(default)]
    pub payer_name: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub patient: PatientInfo,
    #[serde(default)]
    pub provider_npi: Option<String>,
    #[serde(default)]
    pub service_date: Option<NaiveDate>,
    #[serde(default)]
    pub procedure_codes: Vec<String>,
    #[serde(default)]
    pub wound_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityStatus {
    Eligible,
    NotEligible,
    Pending,
    NeedsReview,
}

impl EligibilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EligibilityStatus::Eligible => "eligible",
            EligibilityStatus::NotEligible => "not_eligible",
            EligibilityStatus::Pending => "pending",
            EligibilityStatus::NeedsReview => "needs_review",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoverageDetails {
    pub is_covered: bool,
    pub plan_name: Option<String>,
    pub group_number: Option<String>,
    pub effective_date: Option<String>,
    pub termination_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Benefits {
    pub copay: Option<f64>,
    pub deductible: Option<f64>,
    pub coinsurance: Option<f64>,
    pub out_of_pocket_max: Option<f64>,
}

/// Normalized adapter result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderResponse {
    pub status: EligibilityStatus,
    pub coverage: CoverageDetails,
    pub benefits: Benefits,
    pub prior_auth_required: bool,
    #[serde(default)]
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderFailure {
    pub provider: String,
    pub message: String,
}

/// Result of one dispatch (one attempt sequence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityOutcome {
    pub check_id: Uuid,
    pub success: bool,
    pub provider: Option<String>,
    pub fallback: bool,
    pub providers_tried: Vec<String>,
    pub failures: Vec<ProviderFailure>,
    pub response: Option<ProviderResponse>,
    pub duration_ms: u64,
    pub checked_at: DateTime<Utc>,
}

/// Persisted eligibility check, one per dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityCheckRecord {
    pub id: Uuid,
    pub organization_id: Option<String>,
    pub order_id: Option<String>,
    pub payer_id: Option<String>,
    pub payer_name: Option<String>,
    pub provider: Option<String>,
    pub status: Option<EligibilityStatus>,
    pub success: bool,
    pub fallback: bool,
    pub providers_tried: Vec<String>,
    pub request: EligibilityRequest,
    pub response: Option<ProviderResponse>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityAudit {
    pub check_id: Uuid,
    pub provider: Option<String>,
    pub success: bool,
    pub fallback: bool,
    pub duration_ms: u64,
    pub request: serde_json::Value,
    pub response: serde_json::Value,
    pub actor: Actor,
    pub recorded_at: DateTime<Utc>,
}

/// PHI access record: names of fields touched, never their values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhiAccessRecord {
    pub id: Uuid,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub field_names: Vec<String>,
    pub actor: Actor,
    pub context: serde_json::Map<String, serde_json::Value>,
    pub accessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    Eligibility(EligibilityAudit),
    PhiAccess(PhiAccessRecord),
}

/// Who triggered an action.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Actor {
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub organization_id: Option<String>,
    pub request_id: Option<String>,
    pub ip_address: Option<String>,
}

impl Actor {
    pub fn system() -> Self {
        Self {
            user_email: Some("system@localhost".to_string()),
            ..Self::default()
        }
    }
}

/// Owner of a clinical checklist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ChecklistOwner {
    Organization(String),
    Facility(String),
    User(String),
}

impl ChecklistOwner {
    pub fn entity_type(&self) -> &'static str {
        match self {
            ChecklistOwner::Organization(_) => "organization",
            ChecklistOwner::Facility(_) => "facility",
            ChecklistOwner::User(_) => "user",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ChecklistOwner::Organization(id)
            | ChecklistOwner::Facility(id)
            | ChecklistOwner::User(id) => id,
        }
    }

    pub fn organization_id(&self) -> Option<&str> {
        match self {
            ChecklistOwner::Organization(id) => Some(id),
            _ => None,
        }
    }
}

/// Row-level organization filter passed to every store query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgScope {
    All,
    Organization(String),
}

impl OrgScope {
    pub fn permits(&self, organization_id: Option<&str>) -> bool {
        match self {
            OrgScope::All => true,
            OrgScope::Organization(scope) => organization_id == Some(scope.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocusealTemplate {
    pub id: String,
    pub name: String,
    pub folder_name: Option<String>,
    pub manufacturer: Option<String>,
    pub field_names: Vec<String>,
    pub updated_at: Option<String>,
    pub synced_at: DateTime<Utc>,
}
