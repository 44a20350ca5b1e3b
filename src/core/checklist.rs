//! Skin-substitute pre-application checklist validation.
//!
//! Every required field and every cross-field rule contributes one point to
//! a fixed total. The compliance score is
//! `100 × (total − errors − missing − 0.5 × warnings) / total`, clamped to
//! `[0, 100]`.

use crate::core::wound::WoundType;
use crate::domain::model::ChecklistOwner;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const REQUIRED_FIELD_COUNT: usize = 9;
const CROSS_FIELD_RULE_COUNT: usize = 20;

pub const TOTAL_CHECKS: usize = REQUIRED_FIELD_COUNT + CROSS_FIELD_RULE_COUNT;

const HBA1C_MAX_AGE_DAYS: i64 = 90;
const MIN_ABI: f64 = 0.7;
const MIN_ALBUMIN: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepthClass {
    FullThickness,
    PartialThickness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SmokingStatus {
    Smoker,
    PreviousSmoker,
    NonSmoker,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClinicalChecklist {
    pub owner: Option<ChecklistOwner>,
    pub wound_type: Option<String>,

    pub patient_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub date_of_procedure: Option<String>,

    pub has_diabetes: bool,
    pub diabetes_type: Option<String>,
    pub has_venous_stasis_ulcer: bool,
    pub has_pressure_ulcer: bool,
    pub pressure_ulcer_stage: Option<String>,
    pub location: Option<String>,
    pub ulcer_location: Option<String>,

    pub hba1c_result: Option<f64>,
    pub hba1c_date: Option<String>,
    pub albumin_result: Option<f64>,
    pub culture_date: Option<String>,
    pub treated: bool,

    pub depth: Option<DepthClass>,
    pub ulcer_duration: Option<String>,
    pub exposed_structures: Vec<String>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub wound_depth: Option<f64>,
    pub has_infection: bool,
    pub has_necrotic_tissue: bool,
    pub has_charcot_deformity: bool,
    pub has_malignancy: bool,

    pub abi_result: Option<f64>,
    pub abi_date: Option<String>,
    pub pedal_pulses_result: Option<String>,
    pub tcpo2_result: Option<f64>,
    pub has_triphasic_waveforms: bool,

    pub debridement_performed: bool,
    pub moist_dressings_applied: bool,
    pub non_weight_bearing: bool,
    pub pressure_reducing_footwear: bool,
    pub footwear_type: Option<String>,
    pub standard_compression: bool,
    pub current_hbot: bool,
    pub smoking_status: Option<SmokingStatus>,
    pub smoking_counseling_provided: Option<bool>,
    pub receiving_radiation_or_chemo: bool,
    pub taking_immune_modulators: bool,
    pub has_autoimmune_diagnosis: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceLevel {
    Compliant,
    NeedsReview,
    NonCompliant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistReport {
    pub valid: bool,
    pub score: f64,
    pub compliance: ComplianceLevel,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub missing_fields: Vec<String>,
    pub wound_type: Option<WoundType>,
    pub owner: Option<ChecklistOwner>,
}

pub fn compliance_score(total: usize, errors: usize, missing: usize, warnings: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let raw = 100.0 * (total - errors as f64 - missing as f64 - 0.5 * warnings as f64) / total;
    raw.clamp(0.0, 100.0)
}

fn compliance_level(score: f64) -> ComplianceLevel {
    if score >= 90.0 {
        ComplianceLevel::Compliant
    } else if score >= 70.0 {
        ComplianceLevel::NeedsReview
    } else {
        ComplianceLevel::NonCompliant
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true)
}

fn parse_date(value: &Option<String>) -> Option<NaiveDate> {
    value
        .as_deref()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

/// Collects errors, warnings and missing fields for one checklist.
#[derive(Default)]
struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
    missing: Vec<String>,
}

impl Findings {
    fn require_text(&mut self, field: &str, value: &Option<String>) {
        if is_blank(value) {
            self.missing.push(field.to_string());
        }
    }

    fn require_positive(&mut self, field: &str, value: Option<f64>) {
        match value {
            Some(v) if v > 0.0 => {}
            _ => self.missing.push(field.to_string()),
        }
    }

    fn error_if(&mut self, condition: bool, message: &str) {
        if condition {
            self.errors.push(message.to_string());
        }
    }

    fn warn_if(&mut self, condition: bool, message: &str) {
        if condition {
            self.warnings.push(message.to_string());
        }
    }
}

pub fn validate_checklist(checklist: &ClinicalChecklist) -> ChecklistReport {
    let mut f = Findings::default();

    f.require_text("patientName", &checklist.patient_name);
    f.require_text("dateOfBirth", &checklist.date_of_birth);
    f.require_text("dateOfProcedure", &checklist.date_of_procedure);
    f.require_text("location", &checklist.location);
    f.require_text("ulcerLocation", &checklist.ulcer_location);
    f.require_text("ulcerDuration", &checklist.ulcer_duration);
    f.require_positive("length", checklist.length);
    f.require_positive("width", checklist.width);
    f.require_positive("woundDepth", checklist.wound_depth);

    let dob = parse_date(&checklist.date_of_birth);
    let procedure = parse_date(&checklist.date_of_procedure);
    let hba1c_date = parse_date(&checklist.hba1c_date);

    // 日期格式
    let unparseable = [
        (&checklist.date_of_birth, dob),
        (&checklist.date_of_procedure, procedure),
        (&checklist.hba1c_date, hba1c_date),
    ]
    .iter()
    .any(|(raw, parsed)| !is_blank(raw) && parsed.is_none());
    f.error_if(unparseable, "Dates must use the YYYY-MM-DD format");

    f.error_if(
        matches!((dob, procedure), (Some(d), Some(p)) if p < d),
        "Date of procedure cannot be before date of birth",
    );

    // 診斷
    f.error_if(
        !checklist.has_diabetes && !checklist.has_venous_stasis_ulcer && !checklist.has_pressure_ulcer,
        "At least one qualifying diagnosis (diabetic, venous stasis or pressure ulcer) is required",
    );
    f.error_if(
        checklist.has_diabetes && is_blank(&checklist.diabetes_type),
        "Diabetes type is required for diabetic foot ulcers",
    );
    f.error_if(
        checklist.has_pressure_ulcer && is_blank(&checklist.pressure_ulcer_stage),
        "Pressure ulcer stage is required",
    );

    // 檢驗
    f.warn_if(
        checklist.has_diabetes && checklist.hba1c_result.is_none(),
        "HbA1c result is recommended for diabetic patients",
    );
    f.warn_if(
        matches!((hba1c_date, procedure), (Some(h), Some(p)) if (p - h).num_days() > HBA1C_MAX_AGE_DAYS),
        "HbA1c result is older than 90 days",
    );
    f.warn_if(
        matches!(checklist.albumin_result, Some(a) if a < MIN_ALBUMIN),
        "Albumin below 3.0 g/dL may impair healing",
    );

    // 傷口狀態
    f.error_if(
        checklist.has_infection && !checklist.treated,
        "Active infection must be treated before application",
    );
    f.error_if(
        checklist.has_malignancy,
        "Suspected malignancy excludes skin substitute application",
    );
    f.error_if(
        checklist.has_charcot_deformity,
        "Active Charcot deformity excludes skin substitute application",
    );
    f.error_if(
        checklist.has_necrotic_tissue && !checklist.debridement_performed,
        "Necrotic tissue must be debrided before application",
    );

    // 保守治療（過去 30 天）
    f.error_if(
        !checklist.moist_dressings_applied,
        "At least 30 days of moist dressing therapy is required",
    );
    f.error_if(
        checklist.has_diabetes
            && !(checklist.non_weight_bearing || checklist.pressure_reducing_footwear),
        "Diabetic foot ulcers require documented offloading",
    );
    f.error_if(
        checklist.has_venous_stasis_ulcer && !checklist.standard_compression,
        "Venous stasis ulcers require documented compression therapy",
    );
    f.warn_if(
        checklist.pressure_reducing_footwear && is_blank(&checklist.footwear_type),
        "Footwear type should be documented when pressure-reducing footwear is used",
    );

    // 循環
    f.warn_if(
        checklist.abi_result.is_none()
            && checklist.tcpo2_result.is_none()
            && is_blank(&checklist.pedal_pulses_result)
            && !checklist.has_triphasic_waveforms,
        "No circulation assessment documented",
    );
    f.warn_if(
        matches!(checklist.abi_result, Some(abi) if abi < MIN_ABI),
        "ABI below 0.7 indicates inadequate perfusion",
    );

    f.warn_if(
        checklist.smoking_status == Some(SmokingStatus::Smoker)
            && checklist.smoking_counseling_provided != Some(true),
        "Smoking cessation counseling should be documented",
    );
    f.warn_if(
        checklist.receiving_radiation_or_chemo
            || checklist.taking_immune_modulators
            || checklist.has_autoimmune_diagnosis,
        "Immune-compromising factors documented; review healing potential",
    );

    let score = compliance_score(TOTAL_CHECKS, f.errors.len(), f.missing.len(), f.warnings.len());

    ChecklistReport {
        valid: f.errors.is_empty() && f.missing.is_empty(),
        score,
        compliance: compliance_level(score),
        errors: f.errors,
        warnings: f.warnings,
        missing_fields: f.missing,
        wound_type: checklist.wound_type.as_deref().map(WoundType::normalize),
        owner: checklist.owner.clone(),
    }
}
