use crate::domain::model::{
    Actor, AuditEvent, EligibilityAudit, EligibilityCheckRecord, EligibilityOutcome,
    EligibilityRequest, ProviderFailure, ProviderResponse,
};
use crate::domain::ports::{AuditSink, EligibilityCheckStore, EligibilityProvider};
use crate::utils::error::{HubError, Result};
use crate::utils::phi::PhiSanitizer;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Payer matching shared by the clearinghouse adapters.
#[derive(Debug, Clone, Default)]
pub struct PayerMatcher {
    payer_ids: Vec<String>,
    name_patterns: Vec<String>,
}

impl PayerMatcher {
    pub fn new(payer_ids: &[String], name_patterns: &[String]) -> Self {
        Self {
            payer_ids: payer_ids.iter().map(|id| id.trim().to_lowercase()).collect(),
            name_patterns: name_patterns
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, payer_id: Option<&str>, payer_name: Option<&str>) -> bool {
        if let Some(id) = payer_id {
            let id = id.trim().to_lowercase();
            if !id.is_empty() && self.payer_ids.contains(&id) {
                return true;
            }
        }

        if let Some(name) = payer_name {
            let name = name.to_lowercase();
            return self.name_patterns.iter().any(|p| name.contains(p.as_str()));
        }

        false
    }
}

/// 依序挑選 provider，失敗時逐一嘗試其餘 provider
pub struct EligibilityDispatcher {
    providers: Vec<Arc<dyn EligibilityProvider>>,
    store: Arc<dyn EligibilityCheckStore>,
    audit: Arc<dyn AuditSink>,
    sanitizer: PhiSanitizer,
}

impl EligibilityDispatcher {
    pub fn new(store: Arc<dyn EligibilityCheckStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            providers: Vec::new(),
            store,
            audit,
            sanitizer: PhiSanitizer::default(),
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: PhiSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn register(&mut self, provider: Arc<dyn EligibilityProvider>) {
        tracing::info!("🔌 Registered eligibility provider '{}'", provider.name());
        self.providers.push(provider);
    }

    pub fn with_provider(mut self, provider: Arc<dyn EligibilityProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// First adapter supporting the payer, else the first registered one.
    pub fn select_provider(
        &self,
        payer_id: Option<&str>,
        payer_name: Option<&str>,
    ) -> Option<(usize, Arc<dyn EligibilityProvider>)> {
        self.providers
            .iter()
            .enumerate()
            .find(|(_, p)| p.supports_payer(payer_id, payer_name))
            .or_else(|| self.providers.first().map(|p| (0, p)))
            .map(|(i, p)| (i, Arc::clone(p)))
    }

    pub async fn check(
        &self,
        actor: &Actor,
        request: &EligibilityRequest,
    ) -> Result<EligibilityOutcome> {
        let (primary_index, primary) = self
            .select_provider(request.payer_id.as_deref(), request.payer_name.as_deref())
            .ok_or(HubError::NoProviderAvailable)?;

        let check_id = Uuid::new_v4();
        let started = Instant::now();
        let mut providers_tried = vec![primary.name().to_string()];
        let mut failures = Vec::new();

        tracing::info!(
            check_id = %check_id,
            provider = primary.name(),
            "🩺 Running eligibility check"
        );

        let mut result: Option<(String, ProviderResponse, bool)> = None;

        match primary.check_eligibility(request).await {
            Ok(response) => result = Some((primary.name().to_string(), response, false)),
            Err(e) => {
                tracing::warn!(
                    check_id = %check_id,
                    provider = primary.name(),
                    "⚠️ Primary eligibility provider failed: {}",
                    e.user_friendly_message()
                );
                failures.push(ProviderFailure {
                    provider: primary.name().to_string(),
                    message: e.user_friendly_message(),
                });

                for (index, provider) in self.providers.iter().enumerate() {
                    if index == primary_index {
                        continue;
                    }
                    providers_tried.push(provider.name().to_string());
                    tracing::info!(
                        check_id = %check_id,
                        provider = provider.name(),
                        "🔁 Trying fallback eligibility provider"
                    );

                    match provider.check_eligibility(request).await {
                        Ok(response) => {
                            result = Some((provider.name().to_string(), response, true));
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(
                                check_id = %check_id,
                                provider = provider.name(),
                                "⚠️ Fallback eligibility provider failed: {}",
                                e.user_friendly_message()
                            );
                            failures.push(ProviderFailure {
                                provider: provider.name().to_string(),
                                message: e.user_friendly_message(),
                            });
                        }
                    }
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let checked_at = Utc::now();

        let outcome = match result {
            Some((provider, response, fallback)) => EligibilityOutcome {
                check_id,
                success: true,
                provider: Some(provider),
                fallback,
                providers_tried,
                failures,
                response: Some(response),
                duration_ms,
                checked_at,
            },
            None => {
                tracing::error!(
                    check_id = %check_id,
                    tried = ?providers_tried,
                    "❌ All eligibility providers failed"
                );
                EligibilityOutcome {
                    check_id,
                    success: false,
                    provider: None,
                    fallback: false,
                    providers_tried,
                    failures,
                    response: None,
                    duration_ms,
                    checked_at,
                }
            }
        };

        self.persist(actor, request, &outcome).await?;
        self.emit_audit(actor, request, &outcome);

        Ok(outcome)
    }

    async fn persist(
        &self,
        actor: &Actor,
        request: &EligibilityRequest,
        outcome: &EligibilityOutcome,
    ) -> Result<()> {
        let error = if outcome.success {
            None
        } else {
            Some(
                outcome
                    .failures
                    .iter()
                    .map(|f| format!("{}: {}", f.provider, f.message))
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };

        let record = EligibilityCheckRecord {
            id: outcome.check_id,
            organization_id: actor.organization_id.clone(),
            order_id: request.order_id.clone(),
            payer_id: request.payer_id.clone(),
            payer_name: request.payer_name.clone(),
            provider: outcome.provider.clone(),
            status: outcome.response.as_ref().map(|r| r.status),
            success: outcome.success,
            fallback: outcome.fallback,
            providers_tried: outcome.providers_tried.clone(),
            request: request.clone(),
            response: outcome.response.clone(),
            error,
            created_at: outcome.checked_at,
        };

        self.store.save(&record).await
    }

    fn emit_audit(&self, actor: &Actor, request: &EligibilityRequest, outcome: &EligibilityOutcome) {
        let request_json = serde_json::to_value(request).unwrap_or_default();
        let response_json = serde_json::to_value(outcome).unwrap_or_default();
        // 稽核紀錄也會進一般 log，先遮蔽 PHI
        let (request_clean, _) = self.sanitizer.sanitize(&request_json);
        let (response_clean, _) = self.sanitizer.sanitize(&response_json);

        self.audit.record(AuditEvent::Eligibility(EligibilityAudit {
            check_id: outcome.check_id,
            provider: outcome.provider.clone(),
            success: outcome.success,
            fallback: outcome.fallback,
            duration_ms: outcome.duration_ms,
            request: request_clean,
            response: response_clean,
            actor: actor.clone(),
            recorded_at: Utc::now(),
        }));
    }
}
