//! PHI redaction for general logs and the separate PHI access audit channel.
//!
//! Field names are normalized (lowercase, separators dropped) before they are
//! compared with the denylist, so `patientFirstName`, `patient-first-name`
//! and `PATIENT_FIRST_NAME` all match `firstname`.

use crate::domain::model::{Actor, AuditEvent, PhiAccessRecord};
use crate::domain::ports::AuditSink;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

pub const REDACTION_MARKER: &str = "[REDACTED]";

pub const PHI_AUDIT_TARGET: &str = "phi_audit";

const DEFAULT_DENYLIST: &[&str] = &[
    "ssn",
    "socialsecurity",
    "dob",
    "dateofbirth",
    "birthdate",
    "firstname",
    "lastname",
    "middlename",
    "fullname",
    "patientname",
    "givenname",
    "familyname",
    "memberid",
    "subscriberid",
    "medicarenumber",
    "medicaidnumber",
    "mrn",
    "medicalrecord",
    "policynumber",
    "groupnumber",
    "address",
    "street",
    "zip",
    "postalcode",
    "phone",
    "telecom",
    "email",
    "fax",
    "diagnosis",
    "icd10",
];

/// FHIR HumanName parts and the Mailgun recipient. Matched as whole keys only,
/// `planName` and `payer_name` stay visible.
const EXACT_DENYLIST: &[&str] = &["name", "family", "given", "prefix", "suffix", "recipient"];

/// Context keys that may travel with a PHI audit record.
const AUDIT_CONTEXT_ALLOWLIST: &[&str] = &[
    "reason",
    "purpose",
    "authorization_id",
    "request_id",
    "workflow_step",
    "access_type",
];

pub fn normalize_field_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone)]
pub struct PhiSanitizer {
    denylist: Vec<String>,
}

impl Default for PhiSanitizer {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl PhiSanitizer {
    pub fn new(extra_fields: &[String]) -> Self {
        let mut denylist: Vec<String> = DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect();
        for field in extra_fields {
            let normalized = normalize_field_name(field);
            if !normalized.is_empty() && !denylist.contains(&normalized) {
                denylist.push(normalized);
            }
        }
        Self { denylist }
    }

    pub fn is_phi_field(&self, name: &str) -> bool {
        let normalized = normalize_field_name(name);
        if normalized.is_empty() {
            return false;
        }
        if EXACT_DENYLIST.contains(&normalized.as_str()) {
            return true;
        }
        self.denylist
            .iter()
            .any(|entry| normalized == *entry || normalized.contains(entry.as_str()))
    }

    /// Returns a redacted copy plus the dotted paths of redacted fields.
    pub fn sanitize(&self, value: &Value) -> (Value, Vec<String>) {
        let mut redacted = Vec::new();
        let clean = self.sanitize_at(value, "", &mut redacted);
        (clean, redacted)
    }

    fn sanitize_at(&self, value: &Value, path: &str, redacted: &mut Vec<String>) -> Value {
        match value {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, inner) in map {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };
                    if self.is_phi_field(key) {
                        redacted.push(child_path);
                        out.insert(key.clone(), Value::String(REDACTION_MARKER.to_string()));
                    } else {
                        out.insert(key.clone(), self.sanitize_at(inner, &child_path, redacted));
                    }
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.sanitize_at(item, &format!("{}[{}]", path, i), redacted))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

pub fn sanitize_audit_context(context: &Map<String, Value>) -> Map<String, Value> {
    context
        .iter()
        .filter(|(key, _)| AUDIT_CONTEXT_ALLOWLIST.contains(&key.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Writes sanitized context to the general log and PHI access facts to the
/// audit channel.
#[derive(Clone)]
pub struct PhiSafeLogger {
    sanitizer: PhiSanitizer,
    audit: Arc<dyn AuditSink>,
}

impl PhiSafeLogger {
    pub fn new(sanitizer: PhiSanitizer, audit: Arc<dyn AuditSink>) -> Self {
        Self { sanitizer, audit }
    }

    pub fn sanitizer(&self) -> &PhiSanitizer {
        &self.sanitizer
    }

    pub fn info(&self, message: &str, context: &Value) -> Value {
        let (clean, _) = self.sanitizer.sanitize(context);
        tracing::info!(context = %clean, "{}", message);
        clean
    }

    pub fn warn(&self, message: &str, context: &Value) -> Value {
        let (clean, _) = self.sanitizer.sanitize(context);
        tracing::warn!(context = %clean, "{}", message);
        clean
    }

    /// Logs the sanitized payload and, when PHI fields were present, records
    /// an access entry on the audit channel.
    pub fn log_access(
        &self,
        actor: &Actor,
        action: &str,
        resource_type: &str,
        resource_id: Option<&str>,
        payload: &Value,
        context: &Map<String, Value>,
    ) -> Value {
        let (clean, redacted) = self.sanitizer.sanitize(payload);
        tracing::info!(
            action,
            resource_type,
            payload = %clean,
            "🔒 PHI-bearing payload handled"
        );

        if !redacted.is_empty() {
            self.record_access(actor, action, resource_type, resource_id, redacted, context);
        }
        clean
    }

    pub fn record_access(
        &self,
        actor: &Actor,
        action: &str,
        resource_type: &str,
        resource_id: Option<&str>,
        field_names: Vec<String>,
        context: &Map<String, Value>,
    ) {
        let record = PhiAccessRecord {
            id: Uuid::new_v4(),
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.map(str::to_string),
            field_names,
            actor: actor.clone(),
            context: sanitize_audit_context(context),
            accessed_at: Utc::now(),
        };

        tracing::info!(
            target: PHI_AUDIT_TARGET,
            user_id = record.actor.user_id.as_deref().unwrap_or("-"),
            user_email = record.actor.user_email.as_deref().unwrap_or("-"),
            organization_id = record.actor.organization_id.as_deref().unwrap_or("-"),
            action = %record.action,
            resource_type = %record.resource_type,
            fields = ?record.field_names,
            "PHI accessed"
        );
        self.audit.record(AuditEvent::PhiAccess(record));
    }
}
