use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CreateOutcome, CredentialRecord, UserStore};

/// Process-local store used when no database is configured.
#[derive(Default)]
pub struct MemoryUserStore {
    records: RwLock<HashMap<Uuid, CredentialRecord>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|record| record.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CredentialRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn create(&self, record: &CredentialRecord) -> Result<CreateOutcome> {
        let mut records = self.records.write().await;
        if records
            .values()
            .any(|existing| existing.username == record.username)
        {
            return Ok(CreateOutcome::UsernameTaken);
        }
        records.insert(record.id, record.clone());
        Ok(CreateOutcome::Created)
    }

    async fn save(&self, record: &CredentialRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let existing = records
            .get_mut(&record.id)
            .ok_or_else(|| anyhow!("account {} does not exist", record.id))?;
        *existing = record.clone();
        Ok(())
    }
}
