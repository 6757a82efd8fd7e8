//! Plan persistence
//!
//! Records are keyed by thread id. Expired records are evicted when read and by
//! the periodic [`PlanStore::purge_expired`] sweep.

use crate::models::PlanRecord;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::Keyspace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;
use tokio::task;

/// Persistence collaborator of the plan lifecycle
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Insert the record, or replace the one stored under the same thread id
    ///
    /// A replaced record keeps its original `created_at`.
    async fn save_or_update(&self, record: PlanRecord) -> Result<()>;

    /// Fetch the live record of a thread
    async fn get(&self, thread_id: &str) -> Result<Option<PlanRecord>>;

    /// Delete every record whose expiry is at or before `now`, returning how many were removed
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    record: PlanRecord,
    expires_at: DateTime<Utc>,
}

fn get_from_store(store: &Keyspace, key: &[u8]) -> Result<Option<StoredRecord>> {
    let Some(bytes) = store.get(key)?.map(|v| v.to_vec()) else {
        return Ok(None);
    };
    Ok(Some(postcard::from_bytes(&bytes)?))
}

/// On-disk store backed by a fjall keyspace with postcard-encoded values
#[derive(Clone)]
pub struct FjallPlanStore {
    store: Keyspace,
}

impl FjallPlanStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path).open()?;
        let plans = db.keyspace("plans", fjall::KeyspaceCreateOptions::default)?;
        Ok(Self { store: plans })
    }

    /// Remove a thread's record
    pub async fn remove(&self, thread_id: &str) -> Result<()> {
        let store = self.store.clone();
        let key = thread_id.as_bytes().to_vec();
        task::spawn_blocking(move || store.remove(key)).await??;
        Ok(())
    }
}

#[async_trait]
impl PlanStore for FjallPlanStore {
    #[tracing::instrument(name = "save_plan", level = "debug", skip(self, record), fields(thread_id = %record.thread_id))]
    async fn save_or_update(&self, mut record: PlanRecord) -> Result<()> {
        let store = self.store.clone();
        let key = record.thread_id.as_bytes().to_vec();

        task::spawn_blocking(move || -> Result<()> {
            // created_at survives updates
            if let Some(existing) = get_from_store(&store, &key)? {
                tracing::debug!("Updating existing plan");
                record.created_at = existing.record.created_at;
            }
            let entry = StoredRecord {
                expires_at: record.expires_at,
                record,
            };
            store.insert(key, postcard::to_stdvec(&entry)?)?;
            Ok(())
        })
        .await??;
        Ok(())
    }

    #[tracing::instrument(name = "load_plan", level = "debug", skip(self))]
    async fn get(&self, thread_id: &str) -> Result<Option<PlanRecord>> {
        let store = self.store.clone();
        let key = thread_id.as_bytes().to_vec();

        let entry = task::spawn_blocking(move || get_from_store(&store, &key)).await??;
        match entry {
            Some(entry) if Utc::now() < entry.expires_at => Ok(Some(entry.record)),
            Some(_) => {
                tracing::debug!("Plan found but expired");
                self.remove(thread_id).await?;
                Ok(None)
            }
            None => {
                tracing::debug!("Plan not found");
                Ok(None)
            }
        }
    }

    #[tracing::instrument(name = "purge_plans", level = "debug", skip(self))]
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let store = self.store.clone();

        task::spawn_blocking(move || -> Result<usize> {
            let mut expired = Vec::new();
            for guard in store.iter() {
                let (key, value) = guard.into_inner()?;
                match postcard::from_bytes::<StoredRecord>(&value) {
                    Ok(entry) if entry.expires_at <= now => expired.push(key),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(
                        "Skipping undecodable plan {}: {}",
                        String::from_utf8_lossy(&key),
                        e
                    ),
                }
            }

            let removed = expired.len();
            for key in expired {
                store.remove(key)?;
            }
            Ok(removed)
        })
        .await?
    }
}

/// Store kept in process memory, used by tests and the CLI
#[derive(Default)]
pub struct InMemoryPlanStore {
    records: Mutex<HashMap<String, PlanRecord>>,
}

impl InMemoryPlanStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn save_or_update(&self, mut record: PlanRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        if let Some(existing) = records.get(&record.thread_id) {
            record.created_at = existing.created_at;
        }
        records.insert(record.thread_id.clone(), record);
        Ok(())
    }

    async fn get(&self, thread_id: &str) -> Result<Option<PlanRecord>> {
        let mut records = self.records.lock().await;
        match records.get(thread_id) {
            Some(record) if !record.is_expired(Utc::now()) => Ok(Some(record.clone())),
            Some(_) => {
                records.remove(thread_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok(before - records.len())
    }
}
