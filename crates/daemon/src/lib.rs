//! Container-daemon adapter: namespaces, images, snapshots, containers,
//! and tasks on a containerd-equivalent daemon, grounded in
//! `containrs`'s `Sandbox`/`Pod` builder-and-trait idiom but retargeted
//! from a CRI-server-side sandbox abstraction to a daemon-client-side
//! adapter.

pub mod cache;
pub mod client;
pub mod error;
pub mod model;
pub mod spec;

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::RwLock;
use tokio::time::sleep;

pub use client::{DaemonClient, GrpcDaemonClient};
pub use error::{DaemonError, Result};
pub use model::{
    ContainerRecord, ContainerRecordBuilder, CreateOptions, DeleteOptions, RegistryCredential,
    StopOptions, TaskExitStatus, TaskState,
};
pub use spec::{
    build_container_spec, build_root_container_spec, join_container_namespaces,
    normalize_image_reference, NamespacePaths, SpecInput,
};

const DEFAULT_SNAPSHOTTER: &str = "overlayfs";
const SECONDARY_KILL_TIMEOUT: Duration = Duration::from_secs(5);
const STATUS_RECHECK_SLEEP: Duration = Duration::from_millis(100);

pub struct DaemonAdapter<C: DaemonClient> {
    client: C,
    active_namespace: RwLock<Option<String>>,
    credentials: RwLock<Vec<RegistryCredential>>,
    cache: cache::HandleCache,
}

impl<C: DaemonClient> DaemonAdapter<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            active_namespace: RwLock::new(None),
            credentials: RwLock::new(Vec::new()),
            cache: cache::HandleCache::default(),
        }
    }

    /// Set the active namespace, clearing any previously-set credentials.
    pub async fn set_namespace(&self, name: &str) {
        *self.active_namespace.write().await = Some(name.to_string());
        self.credentials.write().await.clear();
    }

    /// Set the active namespace and its registry credentials atomically.
    pub async fn set_namespace_with_credentials(&self, name: &str, creds: Vec<RegistryCredential>) {
        *self.active_namespace.write().await = Some(name.to_string());
        *self.credentials.write().await = creds;
    }

    async fn namespace(&self) -> Result<String> {
        self.active_namespace
            .read()
            .await
            .clone()
            .ok_or(DaemonError::NoActiveNamespace)
    }

    // ---- namespaces ----------------------------------------------------

    pub async fn create_namespace(&self, name: &str) -> Result<bool> {
        if self.client.namespace_exists(name).await? {
            return Ok(false);
        }
        self.client.create_namespace(name).await?;
        Ok(true)
    }

    pub async fn list_namespaces(&self) -> Result<Vec<String>> {
        self.client.list_namespaces().await
    }

    pub async fn namespace_exists(&self, name: &str) -> Result<bool> {
        self.client.namespace_exists(name).await
    }

    /// Delete a namespace. Only valid once it is empty — callers run
    /// [`cleanup_namespace_resources`](Self::cleanup_namespace_resources) first.
    pub async fn delete_namespace(&self, name: &str) -> Result<()> {
        self.client.delete_namespace(name).await
    }

    /// Walk and remove every image, snapshot (children before parents),
    /// and content-store blob in `name` before it can be deleted.
    pub async fn cleanup_namespace_resources(&self, name: &str) -> Result<()> {
        let snapshot_keys = self.client.walk_snapshots(name, DEFAULT_SNAPSHOTTER).await?;
        for key in snapshot_keys.iter().rev() {
            if let Err(e) = self.client.remove_snapshot(name, DEFAULT_SNAPSHOTTER, key).await {
                warn!("failed to remove snapshot {key:?} in namespace {name:?}: {e}");
            }
        }

        let digests = self.client.walk_content(name).await?;
        for digest in &digests {
            if let Err(e) = self.client.delete_content(name, digest).await {
                warn!("failed to remove content {digest:?} in namespace {name:?}: {e}");
            }
        }

        Ok(())
    }

    // ---- containers ------------------------------------------------------

    /// Create a container: fails if `record.id()` already exists;
    /// otherwise pulls the image (if absent) and ensures it is unpacked
    /// before registering the container with the daemon.
    pub async fn create_container(&self, record: ContainerRecord, opts: &CreateOptions) -> Result<()> {
        let ns = self.namespace().await?;

        if self.client.get_container(&ns, record.id()).await?.is_some() {
            return Err(DaemonError::ContainerExists(record.id().clone()));
        }

        if self.client.get_image(&ns, record.image()).await?.is_none() {
            let resolver = self.resolver_for(record.image()).await;
            let mut pull_opts = opts.clone();
            pull_opts.resolver = resolver;
            self.client.pull_image(&ns, record.image(), &pull_opts).await?;
        }

        if !self.client.is_unpacked(&ns, record.image(), DEFAULT_SNAPSHOTTER).await? {
            self.client.unpack(&ns, record.image(), DEFAULT_SNAPSHOTTER).await?;
        }

        self.client.new_container(&ns, &record).await?;
        self.cache.cache_container(record).await;
        Ok(())
    }

    /// Resolve registry credentials for `image`: exact server match
    /// first, then a credential with no server set as a catch-all.
    async fn resolver_for(&self, image: &str) -> Option<RegistryCredential> {
        let creds = self.credentials.read().await;
        let host = image.split('/').next().unwrap_or(image);
        creds
            .iter()
            .find(|c| c.server.as_deref() == Some(host))
            .or_else(|| creds.iter().find(|c| c.server.is_none()))
            .cloned()
    }

    pub async fn get_container(&self, id: &str) -> Result<ContainerRecord> {
        let ns = self.namespace().await?;
        self.cache.load_container(&self.client, &ns, id).await
    }

    pub async fn list_containers(&self, filters: &[String]) -> Result<Vec<ContainerRecord>> {
        let ns = self.namespace().await?;
        self.client.list_containers(&ns, filters).await
    }

    pub async fn container_exists(&self, id: &str) -> Result<bool> {
        let ns = self.namespace().await?;
        Ok(self.client.get_container(&ns, id).await?.is_some())
    }

    /// Delete a container. Idempotent: a "not found" outcome at any step
    /// is coerced to success and the cache entries are dropped.
    pub async fn delete_container(&self, id: &str, opts: &DeleteOptions) -> Result<()> {
        let ns = self.namespace().await?;

        if self.cache.has_task(id).await || self.client.task_status(&ns, id).await.is_ok() {
            let _ = self.force_kill_task(&ns, id).await;
            let _ = self.client.delete_task(&ns, id).await;
            self.cache.drop_task(id).await;
        }

        match self.client.get_container(&ns, id).await? {
            Some(record) => {
                self.client.delete_container(&ns, id).await?;
                if opts.cleanup_snapshot {
                    let _ = self
                        .client
                        .remove_snapshot(&ns, DEFAULT_SNAPSHOTTER, record.snapshot_key())
                        .await;
                }
            }
            None => debug!("container {id:?} already absent"),
        }

        self.cache.drop_container(id).await;
        Ok(())
    }

    async fn force_kill_task(&self, ns: &str, id: &str) -> Result<()> {
        self.client
            .kill_task(ns, id, model::normalize_signal("SIGKILL") as i32)
            .await
    }

    // ---- tasks -------------------------------------------------------

    /// Start the container's task: returns the existing handle if a task
    /// is already running; deletes a non-running task first.
    pub async fn start_task(&self, id: &str, spec_json: &[u8]) -> Result<u32> {
        let ns = self.namespace().await?;

        if let Ok(state) = self.client.task_status(&ns, id).await {
            if state == TaskState::Running {
                if let Some(pid) = self.cache.task_pid(id).await {
                    return Ok(pid);
                }
                let pid = self.client.task_pid(&ns, id).await?;
                self.cache.mark_task(id, pid).await;
                return Ok(pid);
            }
            let _ = self.client.delete_task(&ns, id).await;
            self.cache.drop_task(id).await;
        }

        self.client.new_task(&ns, id, spec_json).await?;
        let pid = self.client.start_task(&ns, id).await?;
        self.cache.mark_task(id, pid).await;
        Ok(pid)
    }

    /// Stop a running task. Fails if the task is not running. Escalates
    /// to `SIGKILL` on timeout when `opts.force` is set.
    pub async fn stop_task(&self, id: &str, opts: &StopOptions) -> Result<()> {
        let ns = self.namespace().await?;

        let state = self.client.task_status(&ns, id).await?;
        if state != TaskState::Running {
            return Err(DaemonError::TaskNotRunning(id.to_string()));
        }

        let signal = model::normalize_signal(&opts.signal);
        self.client.kill_task(&ns, id, signal as i32).await?;

        let waited = tokio::time::timeout(opts.timeout, self.client.wait_task(&ns, id)).await;

        if waited.is_err() {
            if !opts.force {
                return Err(DaemonError::StopTimeout(id.to_string()));
            }
            self.client
                .kill_task(&ns, id, model::normalize_signal("SIGKILL") as i32)
                .await?;
            let _ = tokio::time::timeout(SECONDARY_KILL_TIMEOUT, self.client.wait_task(&ns, id)).await;
        }

        if let Ok(state) = self.client.task_status(&ns, id).await {
            if state == TaskState::Running {
                self.client
                    .kill_task(&ns, id, model::normalize_signal("SIGKILL") as i32)
                    .await?;
                sleep(STATUS_RECHECK_SLEEP).await;
                if self.client.task_status(&ns, id).await.unwrap_or(TaskState::Unknown)
                    == TaskState::Running
                {
                    return Err(DaemonError::TaskNotRunning(id.to_string()));
                }
            }
        }

        let _ = self.client.delete_task(&ns, id).await;
        self.cache.drop_task(id).await;
        Ok(())
    }

    pub async fn task_status(&self, id: &str) -> Result<TaskState> {
        let ns = self.namespace().await?;
        self.client.task_status(&ns, id).await
    }

    pub async fn task_metrics(&self, id: &str) -> Result<Vec<u8>> {
        let ns = self.namespace().await?;
        self.client.task_metrics(&ns, id).await
    }
}

/// Container-type and hierarchy labels attached to every created
/// container, distinguishing the cell's root/pause container from
/// workload containers.
pub fn container_labels(realm: &str, space: &str, stack: &str, cell: &str, is_root: bool) -> HashMap<String, String> {
    let mut labels = HashMap::new();
    labels.insert(
        model::LABEL_CONTAINER_TYPE.to_string(),
        if is_root {
            model::CONTAINER_TYPE_ROOT.to_string()
        } else {
            model::CONTAINER_TYPE_WORKLOAD.to_string()
        },
    );
    labels.insert(model::LABEL_REALM.to_string(), realm.to_string());
    labels.insert(model::LABEL_SPACE.to_string(), space.to_string());
    labels.insert(model::LABEL_STACK.to_string(), stack.to_string());
    labels.insert(model::LABEL_CELL.to_string(), cell.to_string());
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeClient {
        containers: Mutex<HashMap<String, ContainerRecord>>,
        images: Mutex<HashMap<String, model::ImageRecord>>,
        task_states: Mutex<HashMap<String, TaskState>>,
        namespaces: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DaemonClient for FakeClient {
        async fn create_namespace(&self, name: &str) -> Result<()> {
            self.namespaces.lock().unwrap().push(name.to_string());
            Ok(())
        }
        async fn list_namespaces(&self) -> Result<Vec<String>> {
            Ok(self.namespaces.lock().unwrap().clone())
        }
        async fn delete_namespace(&self, name: &str) -> Result<()> {
            self.namespaces.lock().unwrap().retain(|n| n != name);
            Ok(())
        }

        async fn get_container(&self, _ns: &str, id: &str) -> Result<Option<ContainerRecord>> {
            Ok(self.containers.lock().unwrap().get(id).cloned())
        }
        async fn list_containers(&self, _ns: &str, _filters: &[String]) -> Result<Vec<ContainerRecord>> {
            Ok(self.containers.lock().unwrap().values().cloned().collect())
        }
        async fn new_container(&self, _ns: &str, record: &ContainerRecord) -> Result<()> {
            self.containers
                .lock()
                .unwrap()
                .insert(record.id().clone(), record.clone());
            Ok(())
        }
        async fn update_container_spec(&self, _ns: &str, _id: &str, _spec_json: &[u8]) -> Result<()> {
            Ok(())
        }
        async fn delete_container(&self, _ns: &str, id: &str) -> Result<()> {
            self.containers.lock().unwrap().remove(id);
            Ok(())
        }

        async fn walk_snapshots(&self, _ns: &str, _snapshotter: &str) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn remove_snapshot(&self, _ns: &str, _snapshotter: &str, _key: &str) -> Result<()> {
            Ok(())
        }

        async fn get_image(&self, _ns: &str, reference: &str) -> Result<Option<model::ImageRecord>> {
            Ok(self.images.lock().unwrap().get(reference).cloned())
        }
        async fn pull_image(&self, _ns: &str, reference: &str, _opts: &CreateOptions) -> Result<model::ImageRecord> {
            let record = model::ImageRecord {
                name: reference.to_string(),
                digest: "sha256:fake".to_string(),
            };
            self.images
                .lock()
                .unwrap()
                .insert(reference.to_string(), record.clone());
            Ok(record)
        }
        async fn delete_image(&self, _ns: &str, reference: &str) -> Result<()> {
            self.images.lock().unwrap().remove(reference);
            Ok(())
        }
        async fn is_unpacked(&self, _ns: &str, _reference: &str, _snapshotter: &str) -> Result<bool> {
            Ok(true)
        }
        async fn unpack(&self, _ns: &str, _reference: &str, _snapshotter: &str) -> Result<()> {
            Ok(())
        }

        async fn walk_content(&self, _ns: &str) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn delete_content(&self, _ns: &str, _digest: &str) -> Result<()> {
            Ok(())
        }

        async fn new_task(&self, _ns: &str, id: &str, _spec_json: &[u8]) -> Result<()> {
            self.task_states.lock().unwrap().insert(id.to_string(), TaskState::Created);
            Ok(())
        }
        async fn start_task(&self, _ns: &str, id: &str) -> Result<u32> {
            self.task_states.lock().unwrap().insert(id.to_string(), TaskState::Running);
            Ok(4242)
        }
        async fn kill_task(&self, _ns: &str, id: &str, _signal: i32) -> Result<()> {
            self.task_states.lock().unwrap().insert(id.to_string(), TaskState::Stopped);
            Ok(())
        }
        async fn wait_task(&self, _ns: &str, _id: &str) -> Result<TaskExitStatus> {
            Ok(TaskExitStatus { exit_code: 0 })
        }
        async fn task_status(&self, _ns: &str, id: &str) -> Result<TaskState> {
            self.task_states
                .lock()
                .unwrap()
                .get(id)
                .copied()
                .ok_or_else(|| DaemonError::TaskNotFound(id.to_string()))
        }
        async fn task_pid(&self, _ns: &str, id: &str) -> Result<u32> {
            match self.task_states.lock().unwrap().get(id) {
                Some(TaskState::Running) => Ok(4242),
                _ => Err(DaemonError::TaskNotFound(id.to_string())),
            }
        }
        async fn task_metrics(&self, _ns: &str, _id: &str) -> Result<Vec<u8>> {
            Ok(vec![])
        }
        async fn delete_task(&self, _ns: &str, id: &str) -> Result<()> {
            self.task_states.lock().unwrap().remove(id);
            Ok(())
        }
    }

    fn record(id: &str) -> ContainerRecord {
        ContainerRecordBuilder::default()
            .id(id)
            .image("alpine:latest")
            .snapshot_key(id)
            .spec_json(vec![])
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn create_container_pulls_image_when_absent() {
        let adapter = DaemonAdapter::new(FakeClient::default());
        adapter.set_namespace("main").await;

        adapter
            .create_container(record("c1"), &CreateOptions::default())
            .await
            .unwrap();

        assert!(adapter.client.images.lock().unwrap().contains_key("alpine:latest"));
    }

    #[tokio::test]
    async fn create_container_rejects_duplicate_id() {
        let adapter = DaemonAdapter::new(FakeClient::default());
        adapter.set_namespace("main").await;
        adapter
            .create_container(record("c1"), &CreateOptions::default())
            .await
            .unwrap();

        let err = adapter
            .create_container(record("c1"), &CreateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DaemonError::ContainerExists(_)));
    }

    #[tokio::test]
    async fn start_task_then_get_running_handle_is_idempotent() {
        let adapter = DaemonAdapter::new(FakeClient::default());
        adapter.set_namespace("main").await;
        adapter
            .create_container(record("c1"), &CreateOptions::default())
            .await
            .unwrap();

        let pid = adapter.start_task("c1", &[]).await.unwrap();
        assert_eq!(adapter.task_status("c1").await.unwrap(), TaskState::Running);

        let second_pid = adapter.start_task("c1", &[]).await.unwrap();
        assert_eq!(second_pid, pid, "re-applying start_task on a running task must return the cached pid");
        assert_eq!(adapter.task_status("c1").await.unwrap(), TaskState::Running);
    }

    #[tokio::test]
    async fn stop_task_fails_if_not_running() {
        let adapter = DaemonAdapter::new(FakeClient::default());
        adapter.set_namespace("main").await;
        adapter
            .create_container(record("c1"), &CreateOptions::default())
            .await
            .unwrap();
        adapter.start_task("c1", &[]).await.unwrap();
        adapter
            .stop_task("c1", &StopOptions::default())
            .await
            .unwrap();

        let err = adapter
            .stop_task("c1", &StopOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DaemonError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn delete_container_is_idempotent() {
        let adapter = DaemonAdapter::new(FakeClient::default());
        adapter.set_namespace("main").await;
        adapter
            .create_container(record("c1"), &CreateOptions::default())
            .await
            .unwrap();

        adapter.delete_container("c1", &DeleteOptions::default()).await.unwrap();
        adapter.delete_container("c1", &DeleteOptions::default()).await.unwrap();
    }

    #[tokio::test]
    async fn resolver_prefers_exact_server_match() {
        let adapter = DaemonAdapter::new(FakeClient::default());
        adapter
            .set_namespace_with_credentials(
                "main",
                vec![
                    RegistryCredential {
                        username: "fallback".into(),
                        password: "x".into(),
                        server: None,
                    },
                    RegistryCredential {
                        username: "exact".into(),
                        password: "y".into(),
                        server: Some("docker.io".into()),
                    },
                ],
            )
            .await;

        let resolved = adapter.resolver_for("docker.io/library/alpine").await.unwrap();
        assert_eq!(resolved.username, "exact");

        let fallback = adapter.resolver_for("quay.io/foo/bar").await.unwrap();
        assert_eq!(fallback.username, "fallback");
    }
}
