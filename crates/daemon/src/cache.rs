//! In-memory handle caches for containers and tasks, keyed by id.
//!
//! `load_*` returns the cached handle on hit; on miss it asks the
//! daemon, wrapping a "not found" result into the corresponding
//! `DaemonError` variant. `drop_*` removes the cache entry after a
//! successful delete.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::client::DaemonClient;
use crate::error::{DaemonError, Result};
use crate::model::ContainerRecord;

#[derive(Default)]
pub struct HandleCache {
    containers: RwLock<HashMap<String, ContainerRecord>>,
    tasks: RwLock<HashMap<String, u32>>,
}

impl HandleCache {
    pub async fn load_container(
        &self,
        client: &dyn DaemonClient,
        ns: &str,
        id: &str,
    ) -> Result<ContainerRecord> {
        if let Some(record) = self.containers.read().await.get(id).cloned() {
            return Ok(record);
        }

        let record = client
            .get_container(ns, id)
            .await?
            .ok_or_else(|| DaemonError::ContainerNotFound(id.to_string()))?;

        self.containers
            .write()
            .await
            .insert(id.to_string(), record.clone());
        Ok(record)
    }

    pub async fn cache_container(&self, record: ContainerRecord) {
        self.containers
            .write()
            .await
            .insert(record.id().clone(), record);
    }

    pub async fn drop_container(&self, id: &str) {
        self.containers.write().await.remove(id);
    }

    pub async fn mark_task(&self, id: &str, pid: u32) {
        self.tasks.write().await.insert(id.to_string(), pid);
    }

    pub async fn has_task(&self, id: &str) -> bool {
        self.tasks.read().await.contains_key(id)
    }

    pub async fn task_pid(&self, id: &str) -> Option<u32> {
        self.tasks.read().await.get(id).copied()
    }

    pub async fn drop_task(&self, id: &str) {
        self.tasks.write().await.remove(id);
    }
}
