use crate::domain::model::{Actor, OrgScope};
use crate::utils::error::{HubError, Result};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use serde_json::{Map, Value};
use std::convert::Infallible;
use uuid::Uuid;

pub const ORGANIZATION_HEADER: &str = "x-organization-id";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const SUPER_ADMIN_HEADER: &str = "x-super-admin";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Per-request identity and organization, built from headers and passed
/// explicitly to services. All of these headers are trusted as-is, so the
/// router must only be reachable through a gateway that sets them.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub request_id: String,
    pub organization_id: Option<String>,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub client_ip: Option<String>,
    /// Taken from `x-super-admin`. The service does no authentication of its
    /// own: identity headers must be set by the authenticating gateway in
    /// front of it, which strips any client-supplied copies.
    pub super_admin: bool,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            request_id: header(headers, REQUEST_ID_HEADER)
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            organization_id: header(headers, ORGANIZATION_HEADER),
            user_id: header(headers, USER_ID_HEADER),
            user_email: header(headers, USER_EMAIL_HEADER),
            client_ip: header(headers, FORWARDED_FOR_HEADER)
                .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string())),
            super_admin: header(headers, SUPER_ADMIN_HEADER)
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        }
    }

    /// Organization filter for store queries. Requests without an
    /// organization are only allowed for super admins, who see everything.
    pub fn scope(&self) -> Result<OrgScope> {
        match (&self.organization_id, self.super_admin) {
            (Some(org), _) => Ok(OrgScope::Organization(org.clone())),
            (None, true) => Ok(OrgScope::All),
            (None, false) => Err(HubError::Forbidden {
                message: "organization context required".to_string(),
            }),
        }
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id.clone(),
            user_email: self.user_email.clone(),
            organization_id: self.organization_id.clone(),
            request_id: Some(self.request_id.clone()),
            ip_address: self.client_ip.clone(),
        }
    }

    pub fn audit_context(&self, purpose: &str) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert("request_id".to_string(), Value::String(self.request_id.clone()));
        context.insert("purpose".to_string(), Value::String(purpose.to_string()));
        context
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
