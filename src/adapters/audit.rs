use crate::domain::model::AuditEvent;
use crate::domain::ports::AuditSink;
use std::sync::Mutex;

pub const AUDIT_TARGET: &str = "audit";

/// Writes audit events as structured records on the `audit` log target.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        match &event {
            AuditEvent::Eligibility(audit) => tracing::info!(
                target: AUDIT_TARGET,
                check_id = %audit.check_id,
                provider = audit.provider.as_deref().unwrap_or("-"),
                success = audit.success,
                fallback = audit.fallback,
                duration_ms = audit.duration_ms,
                event = %payload,
                "eligibility check audited"
            ),
            AuditEvent::PhiAccess(record) => tracing::info!(
                target: AUDIT_TARGET,
                access_id = %record.id,
                resource_type = %record.resource_type,
                event = %payload,
                "phi access audited"
            ),
        }
    }
}

/// 測試與 check-eligibility 指令使用的記憶體稽核紀錄
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event);
    }
}

/// Fans every event out to several sinks.
pub struct CompositeAuditSink {
    sinks: Vec<std::sync::Arc<dyn AuditSink>>,
}

impl CompositeAuditSink {
    pub fn new(sinks: Vec<std::sync::Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

impl AuditSink for CompositeAuditSink {
    fn record(&self, event: AuditEvent) {
        for sink in &self.sinks {
            sink.record(event.clone());
        }
    }
}
