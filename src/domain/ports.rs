use crate::domain::model::{
    AuditEvent, DocusealTemplate, EligibilityCheckRecord, EligibilityRequest, OrgScope,
    ProviderResponse,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn list_files(
        &self,
        dir: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

/// An eligibility clearinghouse adapter.
#[async_trait]
pub trait EligibilityProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Exact payer-id match or case-insensitive payer-name pattern match.
    fn supports_payer(&self, payer_id: Option<&str>, payer_name: Option<&str>) -> bool;

    async fn check_eligibility(&self, request: &EligibilityRequest) -> Result<ProviderResponse>;
}

#[async_trait]
pub trait EligibilityCheckStore: Send + Sync {
    async fn save(&self, record: &EligibilityCheckRecord) -> Result<()>;
    async fn find(&self, scope: &OrgScope, id: Uuid) -> Result<Option<EligibilityCheckRecord>>;
    async fn list_for_order(
        &self,
        scope: &OrgScope,
        order_id: &str,
    ) -> Result<Vec<EligibilityCheckRecord>>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn upsert(&self, template: &DocusealTemplate) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<DocusealTemplate>>;
    async fn list(&self) -> Result<Vec<DocusealTemplate>>;
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Outbound email used for operator notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}
