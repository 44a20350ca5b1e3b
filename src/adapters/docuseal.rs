use crate::config::DocusealConfig;
use crate::utils::circuit_breaker::CircuitBreaker;
use crate::utils::error::{HubError, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Template as listed by `GET /templates`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTemplate {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub folder_name: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub fields: Vec<RemoteField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteField {
    #[serde(default)]
    pub name: Option<String>,
}

impl RemoteTemplate {
    /// DocuSeal 的 id 可能是數字或字串
    pub fn id_string(&self) -> Option<String> {
        match &self.id {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter_map(|f| f.name.clone())
            .filter(|name| !name.trim().is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    next: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TemplatePage {
    Wrapped {
        data: Vec<RemoteTemplate>,
        #[serde(default)]
        pagination: Option<Pagination>,
    },
    Bare(Vec<RemoteTemplate>),
}

pub struct DocusealClient {
    client: Client,
    base_url: String,
    api_key: String,
    page_size: u32,
    timeout: Duration,
    breaker: CircuitBreaker,
}

impl DocusealClient {
    /// `None` when no API key is configured.
    pub fn from_config(config: &DocusealConfig, client: Client) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            page_size: config.page_size,
            timeout: Duration::from_secs(config.timeout_seconds),
            breaker: CircuitBreaker::new(
                "docuseal",
                config.failure_threshold,
                Duration::from_secs(config.recovery_timeout_seconds),
            ),
        })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Follows `pagination.next` until the server stops returning a cursor.
    pub async fn list_templates(&self) -> Result<Vec<RemoteTemplate>> {
        let mut templates = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let page = self
                .breaker
                .call(|| self.fetch_page(after.as_deref()))
                .await?;

            let (data, next) = match page {
                TemplatePage::Wrapped { data, pagination } => {
                    let next = pagination
                        .and_then(|p| p.next)
                        .and_then(|next| match next {
                            Value::String(s) if !s.is_empty() => Some(s),
                            Value::Number(n) => Some(n.to_string()),
                            _ => None,
                        });
                    (data, next)
                }
                TemplatePage::Bare(data) => (data, None),
            };

            let fetched = data.len();
            templates.extend(data);
            tracing::debug!("📄 Fetched {} DocuSeal templates (total {})", fetched, templates.len());

            match next {
                Some(cursor) if fetched > 0 && after.as_deref() != Some(cursor.as_str()) => {
                    after = Some(cursor)
                }
                _ => break,
            }
        }

        Ok(templates)
    }

    async fn fetch_page(&self, after: Option<&str>) -> Result<TemplatePage> {
        let mut request = self
            .client
            .get(format!("{}/templates", self.base_url))
            .header("X-Auth-Token", &self.api_key)
            .query(&[("limit", self.page_size.to_string())])
            .timeout(self.timeout);

        if let Some(after) = after {
            request = request.query(&[("after", after)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HubError::UpstreamError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

/// Manufacturer name from a DocuSeal folder such as `"BioWound Onboarding"`
/// or `"Advanced Health (Complete AA)"`.
pub fn manufacturer_from_folder(folder: &str) -> Option<String> {
    let mut name = folder.trim();
    if let Some(open) = name.find('(') {
        name = name[..open].trim();
    }
    for suffix in [" Onboarding", " Forms", " BAA"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.trim();
        }
    }

    if name.is_empty() || name.eq_ignore_ascii_case("default") {
        None
    } else {
        Some(name.to_string())
    }
}
