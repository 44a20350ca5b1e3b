use crate::config::MailgunConfig;
use crate::domain::ports::Notifier;
use crate::utils::error::{HubError, Result};
use async_trait::async_trait;
use reqwest::Client;

/// Sends plain-text mail through the Mailgun messages API.
pub struct MailgunNotifier {
    client: Client,
    base_url: String,
    domain: String,
    api_key: String,
    from: String,
}

impl MailgunNotifier {
    /// `None` unless both domain and API key are configured.
    pub fn from_config(config: &MailgunConfig, client: Client) -> Option<Self> {
        let domain = config.domain.clone()?;
        let api_key = config.api_key.clone()?;
        Some(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            from: config
                .from
                .clone()
                .unwrap_or_else(|| format!("wound-care-hub@{}", domain)),
            domain,
            api_key,
        })
    }
}

#[async_trait]
impl Notifier for MailgunNotifier {
    async fn notify(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let url = format!("{}/v3/{}/messages", self.base_url, self.domain);
        let form = [
            ("from", self.from.as_str()),
            ("to", to),
            ("subject", subject),
            ("text", body),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
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

        tracing::info!("📧 Notification '{}' sent", subject);
        Ok(())
    }
}

/// Fallback notifier that only writes the message to the log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::warn!(
            to,
            "📧 Mail delivery not configured, notification '{}' logged only: {}",
            subject,
            body
        );
        Ok(())
    }
}
