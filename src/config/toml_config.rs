use crate::utils::error::{HubError, Result};
use crate::utils::validation::{
    validate_email, validate_non_empty_string, validate_path, validate_range,
    validate_required_field, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub eligibility: EligibilityConfig,
    #[serde(default)]
    pub fhir: FhirConfig,
    #[serde(default)]
    pub mailgun: MailgunConfig,
    #[serde(default)]
    pub docuseal: DocusealConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub phi: PhiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EligibilityConfig {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Availity,
    Optum,
}

/// One `[[eligibility.providers]]` entry. Registration order is file order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub base_url: String,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// 測試或沙箱環境可直接給 token
    pub access_token: Option<String>,
    #[serde(default)]
    pub payer_ids: Vec<String>,
    #[serde(default)]
    pub payer_name_patterns: Vec<String>,
    pub trading_partner_id: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FhirConfig {
    pub base_url: Option<String>,
    /// Base URL clients see; bundle links are rewritten to it.
    pub public_base_url: Option<String>,
    pub access_token: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_url: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for FhirConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            public_base_url: None,
            access_token: None,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            token_url: None,
            timeout_seconds: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailgunConfig {
    #[serde(default = "default_mailgun_url")]
    pub base_url: String,
    pub domain: Option<String>,
    pub api_key: Option<String>,
    pub webhook_signing_key: Option<String>,
    pub from: Option<String>,
}

impl Default for MailgunConfig {
    fn default() -> Self {
        Self {
            base_url: default_mailgun_url(),
            domain: None,
            api_key: None,
            webhook_signing_key: None,
            from: None,
        }
    }
}

impl MailgunConfig {
    pub fn can_send(&self) -> bool {
        self.domain.is_some() && self.api_key.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocusealConfig {
    #[serde(default = "default_docuseal_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    pub webhook_secret: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout_seconds: u64,
}

impl Default for DocusealConfig {
    fn default() -> Self {
        Self {
            base_url: default_docuseal_url(),
            api_key: None,
            webhook_secret: None,
            page_size: default_page_size(),
            timeout_seconds: default_timeout(),
            failure_threshold: default_failure_threshold(),
            recovery_timeout_seconds: default_recovery_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub admin_email: Option<String>,
    /// `HH:MM`, UTC
    #[serde(default = "default_sync_time")]
    pub template_sync_time: String,
    #[serde(default = "default_validation_day")]
    pub config_validation_day: String,
    #[serde(default = "default_validation_time")]
    pub config_validation_time: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            admin_email: None,
            template_sync_time: default_sync_time(),
            config_validation_day: default_validation_day(),
            config_validation_time: default_validation_time(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhiConfig {
    /// Field names added to the built-in denylist.
    #[serde(default)]
    pub extra_fields: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_mailgun_url() -> String {
    "https://api.mailgun.net".to_string()
}

fn default_docuseal_url() -> String {
    "https://api.docuseal.com".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> u64 {
    60
}

fn default_sync_time() -> String {
    "02:00".to_string()
}

fn default_validation_day() -> String {
    "monday".to_string()
}

fn default_validation_time() -> String {
    "06:00".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(HubError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| HubError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${MAILGUN_API_KEY})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| HubError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("server.host", &self.server.host)?;
        validate_range("server.port", self.server.port, 1, u16::MAX)?;
        validate_range(
            "server.request_timeout_seconds",
            self.server.request_timeout_seconds,
            1,
            300,
        )?;

        for (i, provider) in self.eligibility.providers.iter().enumerate() {
            let field = |name: &str| format!("eligibility.providers[{}].{}", i, name);
            validate_non_empty_string(&field("name"), &provider.name)?;
            validate_url(&field("base_url"), &provider.base_url)?;
            if let Some(token_url) = &provider.token_url {
                validate_url(&field("token_url"), token_url)?;
            }
            validate_range(&field("timeout_seconds"), provider.timeout_seconds, 1, 300)?;
            if provider.access_token.is_none() {
                validate_required_field(&field("client_id"), &provider.client_id)?;
                validate_required_field(&field("client_secret"), &provider.client_secret)?;
            }
        }

        let mut names: Vec<&str> = self
            .eligibility
            .providers
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(HubError::InvalidConfigValueError {
                field: "eligibility.providers".to_string(),
                value: pair[0].to_string(),
                reason: "Provider names must be unique".to_string(),
            });
        }

        if let Some(base_url) = &self.fhir.base_url {
            validate_url("fhir.base_url", base_url)?;
            if self.fhir.access_token.is_none() {
                validate_required_field("fhir.client_id", &self.fhir.client_id)?;
                validate_required_field("fhir.client_secret", &self.fhir.client_secret)?;
                if self.fhir.token_url.is_none() {
                    validate_required_field("fhir.tenant_id", &self.fhir.tenant_id)?;
                }
            }
        }
        if let Some(public) = &self.fhir.public_base_url {
            validate_url("fhir.public_base_url", public)?;
        }
        validate_range("fhir.timeout_seconds", self.fhir.timeout_seconds, 1, 300)?;

        validate_url("mailgun.base_url", &self.mailgun.base_url)?;
        if let Some(from) = &self.mailgun.from {
            validate_email("mailgun.from", from)?;
        }

        validate_url("docuseal.base_url", &self.docuseal.base_url)?;
        validate_range("docuseal.page_size", self.docuseal.page_size, 1, 100)?;
        validate_range("docuseal.timeout_seconds", self.docuseal.timeout_seconds, 1, 300)?;
        crate::utils::validation::validate_positive_number(
            "docuseal.failure_threshold",
            self.docuseal.failure_threshold as u64,
            1,
        )?;

        if let Some(admin) = &self.scheduler.admin_email {
            validate_email("scheduler.admin_email", admin)?;
        }
        crate::core::scheduler::Schedule::daily_at(&self.scheduler.template_sync_time).map_err(
            |e| HubError::InvalidConfigValueError {
                field: "scheduler.template_sync_time".to_string(),
                value: self.scheduler.template_sync_time.clone(),
                reason: e.to_string(),
            },
        )?;
        crate::core::scheduler::Schedule::weekly_at(
            &self.scheduler.config_validation_day,
            &self.scheduler.config_validation_time,
        )
        .map_err(|e| HubError::InvalidConfigValueError {
            field: "scheduler.config_validation_day".to_string(),
            value: format!(
                "{} {}",
                self.scheduler.config_validation_day, self.scheduler.config_validation_time
            ),
            reason: e.to_string(),
        })?;

        validate_path("storage.data_dir", &self.storage.data_dir)?;

        Ok(())
    }

    /// Non-fatal observations reported by `validate-config`.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.eligibility.providers.iter().any(|p| p.enabled) {
            warnings.push("No eligibility providers are enabled".to_string());
        }
        if self.fhir.base_url.is_none() {
            warnings.push("FHIR base_url not set; FHIR calls will return mock resources".to_string());
        }
        if self.mailgun.webhook_signing_key.is_none() {
            warnings.push("Mailgun webhook signing key not set; webhooks will be rejected".to_string());
        }
        if self.docuseal.api_key.is_none() {
            warnings.push("DocuSeal API key not set; template sync is disabled".to_string());
        }
        if self.scheduler.admin_email.is_none() || !self.mailgun.can_send() {
            warnings.push("Scheduler failure notifications will only be logged".to_string());
        }
        warnings
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
