use crate::utils::error::{HubError, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Allowed distance between the signed timestamp and our clock.
pub const MAX_TIMESTAMP_SKEW_SECS: u64 = 600;

pub const DOCUSEAL_SIGNATURE_HEADER: &str = "x-docuseal-signature";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailgunSignature {
    pub timestamp: String,
    pub token: String,
    pub signature: String,
}

/// Mailgun webhook body: the signature block plus the event itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailgunWebhook {
    pub signature: MailgunSignature,
    #[serde(rename = "event-data", default)]
    pub event_data: serde_json::Value,
}

fn mac_for(key: &str) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(key.as_bytes()).map_err(|e| HubError::SignatureError {
        reason: format!("invalid signing key: {}", e),
    })
}

/// Verifies `hex(HMAC-SHA256(key, message))` in constant time.
fn verify_hex_mac(key: &str, message: &[u8], signature_hex: &str) -> Result<()> {
    let expected = hex::decode(signature_hex.trim()).map_err(|_| HubError::SignatureError {
        reason: "signature is not valid hex".to_string(),
    })?;

    let mut mac = mac_for(key)?;
    mac.update(message);
    mac.verify_slice(&expected)
        .map_err(|_| HubError::SignatureError {
            reason: "signature mismatch".to_string(),
        })
}

fn sign_hex(key: &str, message: &[u8]) -> Result<String> {
    let mut mac = mac_for(key)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub struct MailgunVerifier {
    signing_key: String,
}

impl MailgunVerifier {
    pub fn new(signing_key: impl Into<String>) -> Self {
        Self {
            signing_key: signing_key.into(),
        }
    }

    pub fn verify(&self, signature: &MailgunSignature) -> Result<()> {
        self.verify_at(signature, Utc::now().timestamp())
    }

    /// 先檢查時間窗，再比對 MAC
    pub fn verify_at(&self, signature: &MailgunSignature, now: i64) -> Result<()> {
        let timestamp: i64 =
            signature
                .timestamp
                .trim()
                .parse()
                .map_err(|_| HubError::SignatureError {
                    reason: "timestamp is not an integer".to_string(),
                })?;

        if now.abs_diff(timestamp) > MAX_TIMESTAMP_SKEW_SECS {
            return Err(HubError::SignatureError {
                reason: format!(
                    "timestamp outside the {}s window",
                    MAX_TIMESTAMP_SKEW_SECS
                ),
            });
        }

        let message = format!("{}{}", signature.timestamp, signature.token);
        verify_hex_mac(&self.signing_key, message.as_bytes(), &signature.signature)
    }

    pub fn sign(&self, timestamp: &str, token: &str) -> Result<String> {
        sign_hex(&self.signing_key, format!("{}{}", timestamp, token).as_bytes())
    }
}

/// DocuSeal signs the raw request body with the webhook secret.
pub struct DocusealVerifier {
    secret: String,
}

impl DocusealVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<()> {
        let signature = signature.ok_or_else(|| HubError::SignatureError {
            reason: "missing signature header".to_string(),
        })?;
        verify_hex_mac(&self.secret, body, signature)
    }

    pub fn sign(&self, body: &[u8]) -> Result<String> {
        sign_hex(&self.secret, body)
    }
}
