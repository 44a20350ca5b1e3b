use crate::domain::model::{DocusealTemplate, EligibilityCheckRecord, OrgScope};
use crate::domain::ports::{EligibilityCheckStore, Storage, TemplateStore};
use crate::utils::error::{HubError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

const CHECKS_DIR: &str = "eligibility_checks";
const TEMPLATES_FILE: &str = "docuseal_templates.json";

pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = Path::new(&self.base_path).join(path);
        let data = fs::read(full_path)?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = Path::new(&self.base_path).join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let full_path = Path::new(&self.base_path).join(dir);
        if !full_path.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(full_path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(format!("{}/{}", dir, entry.file_name().to_string_lossy()));
            }
        }
        names.sort();
        Ok(names)
    }
}

fn is_not_found(error: &HubError) -> bool {
    matches!(error, HubError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound)
}

/// 每筆資格查詢存成一個 JSON 檔
pub struct FileCheckStore<S: Storage> {
    storage: S,
}

impl<S: Storage> FileCheckStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    fn record_path(id: Uuid) -> String {
        format!("{}/{}.json", CHECKS_DIR, id)
    }
}

#[async_trait]
impl<S: Storage> EligibilityCheckStore for FileCheckStore<S> {
    async fn save(&self, record: &EligibilityCheckRecord) -> Result<()> {
        let data = serde_json::to_vec_pretty(record)?;
        self.storage
            .write_file(&Self::record_path(record.id), &data)
            .await?;
        tracing::debug!("💾 Saved eligibility check {}", record.id);
        Ok(())
    }

    async fn find(&self, scope: &OrgScope, id: Uuid) -> Result<Option<EligibilityCheckRecord>> {
        let data = match self.storage.read_file(&Self::record_path(id)).await {
            Ok(data) => data,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(e),
        };

        let record: EligibilityCheckRecord = serde_json::from_slice(&data)?;
        Ok(scope
            .permits(record.organization_id.as_deref())
            .then_some(record))
    }

    async fn list_for_order(
        &self,
        scope: &OrgScope,
        order_id: &str,
    ) -> Result<Vec<EligibilityCheckRecord>> {
        let mut records = Vec::new();
        for path in self.storage.list_files(CHECKS_DIR).await? {
            if !path.ends_with(".json") {
                continue;
            }
            let data = self.storage.read_file(&path).await?;
            let record: EligibilityCheckRecord = match serde_json::from_slice(&data) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("⚠️ Skipping unreadable check file {}: {}", path, e);
                    continue;
                }
            };
            if record.order_id.as_deref() == Some(order_id)
                && scope.permits(record.organization_id.as_deref())
            {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

/// All templates in one JSON document, rewritten on every upsert.
pub struct FileTemplateStore<S: Storage> {
    storage: S,
    write_lock: Mutex<()>,
}

impl<S: Storage> FileTemplateStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, DocusealTemplate>> {
        match self.storage.read_file(TEMPLATES_FILE).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if is_not_found(&e) => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<S: Storage> TemplateStore for FileTemplateStore<S> {
    async fn upsert(&self, template: &DocusealTemplate) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut templates = self.load().await?;
        templates.insert(template.id.clone(), template.clone());
        let data = serde_json::to_vec_pretty(&templates)?;
        self.storage.write_file(TEMPLATES_FILE, &data).await
    }

    async fn get(&self, id: &str) -> Result<Option<DocusealTemplate>> {
        Ok(self.load().await?.remove(id))
    }

    async fn list(&self) -> Result<Vec<DocusealTemplate>> {
        Ok(self.load().await?.into_values().collect())
    }
}

#[derive(Default)]
pub struct MemoryCheckStore {
    records: RwLock<Vec<EligibilityCheckRecord>>,
}

#[async_trait]
impl EligibilityCheckStore for MemoryCheckStore {
    async fn save(&self, record: &EligibilityCheckRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn find(&self, scope: &OrgScope, id: Uuid) -> Result<Option<EligibilityCheckRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.id == id && scope.permits(r.organization_id.as_deref()))
            .cloned())
    }

    async fn list_for_order(
        &self,
        scope: &OrgScope,
        order_id: &str,
    ) -> Result<Vec<EligibilityCheckRecord>> {
        let mut records: Vec<_> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| {
                r.order_id.as_deref() == Some(order_id)
                    && scope.permits(r.organization_id.as_deref())
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: RwLock<BTreeMap<String, DocusealTemplate>>,
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn upsert(&self, template: &DocusealTemplate) -> Result<()> {
        self.templates
            .write()
            .await
            .insert(template.id.clone(), template.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<DocusealTemplate>> {
        Ok(self.templates.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<DocusealTemplate>> {
        Ok(self.templates.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::EligibilityRequest;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(org: Option<&str>, order: &str) -> EligibilityCheckRecord {
        EligibilityCheckRecord {
            id: Uuid::new_v4(),
            organization_id: org.map(str::to_string),
            order_id: Some(order.to_string()),
            payer_id: Some("00123".to_string()),
            payer_name: None,
            provider: Some("availity".to_string()),
            status: None,
            success: false,
            fallback: false,
            providers_tried: vec!["availity".to_string()],
            request: EligibilityRequest::default(),
            response: None,
            error: Some("availity: timeout".to_string()),
            created_at: Utc::now(),
        }
    }

    fn template(id: &str) -> DocusealTemplate {
        DocusealTemplate {
            id: id.to_string(),
            name: format!("IVR {}", id),
            folder_name: Some("ACME".to_string()),
            manufacturer: Some("ACME".to_string()),
            field_names: vec!["patient_name".to_string()],
            updated_at: Some("2024-01-01T00:00:00Z".to_string()),
            synced_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_local_storage_write_read_list() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_string_lossy().to_string());

        storage.write_file("nested/a.json", b"{}").await.unwrap();
        storage.write_file("nested/b.json", b"[]").await.unwrap();

        assert_eq!(storage.read_file("nested/b.json").await.unwrap(), b"[]");
        assert_eq!(
            storage.list_files("nested").await.unwrap(),
            vec!["nested/a.json", "nested/b.json"]
        );
        assert!(storage.list_files("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_check_store_respects_scope() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCheckStore::new(LocalStorage::new(
            temp_dir.path().to_string_lossy().to_string(),
        ));
        let mine = record(Some("org-1"), "order-1");
        let theirs = record(Some("org-2"), "order-1");
        store.save(&mine).await.unwrap();
        store.save(&theirs).await.unwrap();

        let scope = OrgScope::Organization("org-1".to_string());
        assert!(store.find(&scope, mine.id).await.unwrap().is_some());
        assert!(store.find(&scope, theirs.id).await.unwrap().is_none());
        assert!(store.find(&scope, Uuid::new_v4()).await.unwrap().is_none());

        let listed = store.list_for_order(&scope, "order-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);

        let all = store.list_for_order(&OrgScope::All, "order-1").await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_file_template_store_upserts() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileTemplateStore::new(LocalStorage::new(
            temp_dir.path().to_string_lossy().to_string(),
        ));

        assert!(store.list().await.unwrap().is_empty());
        store.upsert(&template("1")).await.unwrap();
        store.upsert(&template("2")).await.unwrap();
        let mut updated = template("1");
        updated.name = "Renamed".to_string();
        store.upsert(&updated).await.unwrap();

        assert_eq!(store.list().await.unwrap().len(), 2);
        assert_eq!(store.get("1").await.unwrap().unwrap().name, "Renamed");
        assert!(store.get("3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_check_store_scope() {
        let store = MemoryCheckStore::default();
        let orphan = record(None, "order-9");
        store.save(&orphan).await.unwrap();

        let scope = OrgScope::Organization("org-1".to_string());
        assert!(store.find(&scope, orphan.id).await.unwrap().is_none());
        assert!(store.find(&OrgScope::All, orphan.id).await.unwrap().is_some());
    }
}
