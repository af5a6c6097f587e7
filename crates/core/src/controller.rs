//! The hierarchical resource controller: realm → space → stack → cell →
//! container lifecycle over the cgroup, CNI, daemon, and metadata
//! adapters, grounded in `containrs`'s `Sandbox`-then-`Pod`-then-container
//! creation ordering but generalised over four nested levels instead of
//! one.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use kuke_cgroup::{CgroupAdapter, CgroupSpec};
use kuke_cni::{CniManager, NetworkSpec};
use kuke_daemon::{
    container_labels, spec::with_cni_annotation, build_container_spec, build_root_container_spec,
    join_container_namespaces, normalize_image_reference, ContainerRecordBuilder, CreateOptions,
    DaemonAdapter, DaemonClient, DeleteOptions, SpecInput, StopOptions,
};

use crate::error::{ControllerError, Result};
use crate::model::{
    self, CellSpec, ContainerTemplate, Document, Metadata, RealmSpec, SpaceSpec, StackSpec,
};
use crate::paths;
use crate::result::{BootstrapReport, ContainerResult, CreateResult, DeleteResult, KillResult};

pub const DEFAULT_STACK: &str = "default";
pub const DEFAULT_CELL: &str = "default";

pub struct Controller<C: DaemonClient> {
    run_path: PathBuf,
    cgroup: CgroupAdapter,
    cni: CniManager,
    daemon: DaemonAdapter<C>,
}

impl<C: DaemonClient> Controller<C> {
    pub fn new(run_path: PathBuf, cgroup: CgroupAdapter, cni: CniManager, daemon: DaemonAdapter<C>) -> Self {
        Self {
            run_path,
            cgroup,
            cni,
            daemon,
        }
    }

    fn read_doc<S: DeserializeOwned>(&self, dir: &Path) -> Result<Document<S>> {
        let (bytes, _header) = kuke_metadata::read(paths::metadata_path(dir))?;
        Ok(kuke_metadata::decode(&bytes)?)
    }

    fn write_doc<S: Serialize>(&self, dir: &Path, doc: &Document<S>) -> Result<()> {
        kuke_metadata::write(paths::metadata_path(dir), doc)?;
        Ok(())
    }

    fn exists_doc(&self, dir: &Path) -> bool {
        kuke_metadata::exists(paths::metadata_path(dir))
    }

    /// Read the realm's document and make its daemon namespace (and
    /// registry credentials) the adapter's active namespace. Every
    /// operation below the realm goes through this first.
    async fn ensure_namespace(&self, realm: &str) -> Result<String> {
        let realm_dir = paths::realm_dir(&self.run_path, realm);
        let doc: Document<RealmSpec> = self
            .read_doc(&realm_dir)
            .map_err(|_| ControllerError::RealmNotFound(realm.to_string()))?;
        let namespace = doc.spec.namespace_name(realm).to_string();
        let creds = doc.spec.registry_credentials.iter().cloned().map(Into::into).collect();
        self.daemon.set_namespace_with_credentials(&namespace, creds).await;
        Ok(namespace)
    }

    // ---- bootstrap -----------------------------------------------------

    /// Ensure `realm`/`space`/the default stack/the default cell all
    /// exist, creating only what is missing. Idempotent: calling this
    /// again against an already-bootstrapped pair is a no-op.
    pub async fn bootstrap(&self, realm: &str, space: &str) -> Result<BootstrapReport> {
        if realm.trim().is_empty() {
            return Err(ControllerError::RealmNameRequired);
        }
        if space.trim().is_empty() {
            return Err(ControllerError::SpaceNameRequired);
        }

        self.cni.bootstrap()?;
        self.cgroup.create(kuke_cgroup::ROOT_GROUP, &CgroupSpec::default())?;

        let realm_dir = paths::realm_dir(&self.run_path, realm);
        let realm_doc: Document<RealmSpec> = if self.exists_doc(&realm_dir) {
            self.read_doc(&realm_dir)?
        } else {
            Document::new("Realm", Metadata::named(realm), RealmSpec::default())
        };
        let realm_result = self.apply_realm(realm_doc).await?;

        let space_dir = paths::space_dir(&self.run_path, realm, space);
        let space_doc: Document<SpaceSpec> = if self.exists_doc(&space_dir) {
            self.read_doc(&space_dir)?
        } else {
            Document::new(
                "Space",
                Metadata {
                    name: space.to_string(),
                    realm: Some(realm.to_string()),
                    ..Default::default()
                },
                SpaceSpec::default(),
            )
        };
        let space_result = self.apply_space(realm, space_doc).await?;

        let stack_dir = paths::stack_dir(&self.run_path, realm, space, DEFAULT_STACK);
        let stack_doc: Document<StackSpec> = if self.exists_doc(&stack_dir) {
            self.read_doc(&stack_dir)?
        } else {
            Document::new(
                "Stack",
                Metadata {
                    name: DEFAULT_STACK.to_string(),
                    realm: Some(realm.to_string()),
                    space: Some(space.to_string()),
                    ..Default::default()
                },
                StackSpec::default(),
            )
        };
        let stack_result = self.apply_stack(realm, space, stack_doc).await?;

        let cell_dir = paths::cell_dir(&self.run_path, realm, space, DEFAULT_STACK, DEFAULT_CELL);
        let cell_doc: Document<CellSpec> = if self.exists_doc(&cell_dir) {
            self.read_doc(&cell_dir)?
        } else {
            Document::new(
                "Cell",
                Metadata {
                    name: DEFAULT_CELL.to_string(),
                    realm: Some(realm.to_string()),
                    space: Some(space.to_string()),
                    stack: Some(DEFAULT_STACK.to_string()),
                    ..Default::default()
                },
                CellSpec {
                    root: model::default_root_template(),
                    ..Default::default()
                },
            )
        };
        let cell_result = self.apply_cell(realm, space, DEFAULT_STACK, cell_doc).await?;

        Ok(BootstrapReport {
            realm: realm_result,
            space: space_result,
            stack: stack_result,
            cell: cell_result,
        })
    }

    // ---- document-driven apply ------------------------------------------
    //
    // These mirror the bootstrap_* steps above but take the caller's own
    // document instead of synthesising a default one, and always persist
    // it — re-`apply`ing a document with changed resource knobs updates
    // the live cgroup, matching `kubectl apply`'s upsert semantics. Used
    // by the document dispatcher (`dispatcher.rs`) for `apply -f`.

    pub async fn apply_realm(&self, doc: Document<RealmSpec>) -> Result<CreateResult> {
        let realm = doc.metadata.name.clone();
        if realm.trim().is_empty() {
            return Err(ControllerError::RealmNameRequired);
        }
        let dir = paths::realm_dir(&self.run_path, &realm);
        let existed = self.exists_doc(&dir);

        let namespace = doc.spec.namespace_name(&realm).to_string();
        let namespace_created = self.daemon.create_namespace(&namespace).await?;
        let cgroup_spec = doc.spec.resources.as_ref().map(|r| r.to_cgroup_spec()).unwrap_or_default();
        let group_existed = self.cgroup.create(&paths::realm_group(&realm), &cgroup_spec)?;
        self.write_doc(&dir, &doc)?;

        Ok(CreateResult {
            name: realm,
            metadata_created: !existed,
            cgroup_created: !group_existed,
            substrate_created: Some(namespace_created),
        })
    }

    pub async fn apply_space(&self, realm: &str, doc: Document<SpaceSpec>) -> Result<CreateResult> {
        let space = doc.metadata.name.clone();
        if space.trim().is_empty() {
            return Err(ControllerError::SpaceNameRequired);
        }
        if !self.exists_doc(&paths::realm_dir(&self.run_path, realm)) {
            return Err(ControllerError::RealmNotFound(realm.to_string()));
        }
        let dir = paths::space_dir(&self.run_path, realm, &space);
        let existed = self.exists_doc(&dir);

        let cgroup_spec = doc.spec.resources.as_ref().map(|r| r.to_cgroup_spec()).unwrap_or_default();
        let group_existed = self.cgroup.create(&paths::space_group(realm, &space), &cgroup_spec)?;

        let network_name = doc.spec.network_name(&space).to_string();
        let net_existed = matches!(self.cni.exists_network(&network_name, None), Ok(true));
        if !net_existed {
            self.cni.create_network(&NetworkSpec {
                name: network_name,
                bridge_name: doc.spec.bridge_name.clone(),
                subnet_cidr: doc.spec.subnet_cidr.clone(),
            })?;
        }
        self.write_doc(&dir, &doc)?;

        Ok(CreateResult {
            name: space,
            metadata_created: !existed,
            cgroup_created: !group_existed,
            substrate_created: Some(!net_existed),
        })
    }

    pub async fn apply_stack(&self, realm: &str, space: &str, doc: Document<StackSpec>) -> Result<CreateResult> {
        let stack = doc.metadata.name.clone();
        if stack.trim().is_empty() {
            return Err(ControllerError::StackNameRequired);
        }
        if !self.exists_doc(&paths::space_dir(&self.run_path, realm, space)) {
            return Err(ControllerError::SpaceNotFound(space.to_string()));
        }
        let dir = paths::stack_dir(&self.run_path, realm, space, &stack);
        let existed = self.exists_doc(&dir);

        let cgroup_spec = doc.spec.resources.as_ref().map(|r| r.to_cgroup_spec()).unwrap_or_default();
        let group_existed = self.cgroup.create(&paths::stack_group(realm, space, &stack), &cgroup_spec)?;
        self.write_doc(&dir, &doc)?;

        Ok(CreateResult {
            name: stack,
            metadata_created: !existed,
            cgroup_created: !group_existed,
            substrate_created: None,
        })
    }

    pub async fn apply_cell(&self, realm: &str, space: &str, stack: &str, mut doc: Document<CellSpec>) -> Result<CreateResult> {
        let cell = doc.metadata.name.clone();
        if cell.trim().is_empty() {
            return Err(ControllerError::CellNameRequired);
        }
        if !self.exists_doc(&paths::stack_dir(&self.run_path, realm, space, stack)) {
            return Err(ControllerError::StackNotFound(stack.to_string()));
        }
        let dir = paths::cell_dir(&self.run_path, realm, space, stack, &cell);
        let existed = self.exists_doc(&dir);

        let cgroup_spec = doc.spec.resources.as_ref().map(|r| r.to_cgroup_spec()).unwrap_or_default();
        let group_existed = self.cgroup.create(&paths::cell_group(realm, space, stack, &cell), &cgroup_spec)?;

        let root_created = if !existed {
            self.ensure_namespace(realm).await?;
            let root_id = model::root_container_id(realm, space, stack, &cell);
            let labels = container_labels(realm, space, stack, &cell, true);

            let spec_input = SpecInput {
                id: root_id.clone(),
                command: doc.spec.root.command.clone(),
                args: doc.spec.root.args.clone(),
                env: doc.spec.root.env.clone(),
                privileged: doc.spec.root.privileged,
            };
            let spec = build_root_container_spec(&spec_input, &labels)
                .map_err(|e| ControllerError::ConversionFailed(kuke_common::chain(&e)))?;
            let spec_json = serde_json::to_vec(&spec).map_err(|e| ControllerError::ConversionFailed(e.to_string()))?;

            let record = ContainerRecordBuilder::default()
                .id(root_id.clone())
                .image(normalize_image_reference(&doc.spec.root.image))
                .snapshot_key(root_id.clone())
                .spec_json(spec_json.clone())
                .labels(labels)
                .build()?;
            self.daemon.create_container(record, &CreateOptions::default()).await?;
            let pid = self.daemon.start_task(&root_id, &spec_json).await?;
            let net_ns = PathBuf::from(format!("/proc/{pid}/ns/net"));

            let space_doc: Document<SpaceSpec> = self.read_doc(&paths::space_dir(&self.run_path, realm, space))?;
            let network_name = space_doc.spec.network_name(space).to_string();
            self.cni
                .load_network_config(&self.cni.conf_dir().join(format!("{network_name}.conflist")))?;
            self.cni.add_container(&root_id, &net_ns).await?;

            doc.spec.namespace_paths = model::NamespacePaths {
                net: Some(net_ns),
                ipc: Some(PathBuf::from(format!("/proc/{pid}/ns/ipc"))),
                uts: Some(PathBuf::from(format!("/proc/{pid}/ns/uts"))),
                pid: None,
            };
            doc.spec.root_pid = Some(pid as i32);
            true
        } else {
            false
        };

        self.write_doc(&dir, &doc)?;

        Ok(CreateResult {
            name: cell,
            metadata_created: !existed,
            cgroup_created: !group_existed,
            substrate_created: Some(root_created),
        })
    }

    pub async fn apply_container(
        &self,
        realm: &str,
        space: &str,
        stack: &str,
        cell: &str,
        doc: Document<ContainerTemplate>,
    ) -> Result<ContainerResult> {
        self.create_container(realm, space, stack, cell, &doc.metadata.name.clone(), doc.spec, Vec::new())
            .await
    }

    // ---- container create -----------------------------------------------

    /// Create (or idempotently no-op onto) a workload container inside an
    /// already-bootstrapped cell, joining the cell's pause container's
    /// namespace set.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_container(
        &self,
        realm: &str,
        space: &str,
        stack: &str,
        cell: &str,
        name: &str,
        template: ContainerTemplate,
        extra_credentials: Vec<model::RegistryCredential>,
    ) -> Result<ContainerResult> {
        if name.trim().is_empty() {
            return Err(ControllerError::ContainerNameRequired);
        }

        let realm_dir = paths::realm_dir(&self.run_path, realm);
        if !self.exists_doc(&realm_dir) {
            return Err(ControllerError::RealmNotFound(realm.to_string()));
        }
        let space_dir = paths::space_dir(&self.run_path, realm, space);
        if !self.exists_doc(&space_dir) {
            return Err(ControllerError::SpaceNotFound(space.to_string()));
        }
        let stack_dir = paths::stack_dir(&self.run_path, realm, space, stack);
        if !self.exists_doc(&stack_dir) {
            return Err(ControllerError::StackNotFound(stack.to_string()));
        }
        let cell_dir = paths::cell_dir(&self.run_path, realm, space, stack, cell);
        if !self.exists_doc(&cell_dir) {
            return Err(ControllerError::CellNotFound(cell.to_string()));
        }
        let cell_doc: Document<CellSpec> = self.read_doc(&cell_dir)?;
        let realm_doc: Document<RealmSpec> = self.read_doc(&realm_dir)?;

        let mut creds = realm_doc.spec.registry_credentials.clone();
        creds.extend(extra_credentials);
        self.daemon
            .set_namespace_with_credentials(
                realm_doc.spec.namespace_name(realm),
                creds.into_iter().map(Into::into).collect(),
            )
            .await;

        let daemon_id = model::container_daemon_id(realm, space, stack, cell, name);
        let labels = container_labels(realm, space, stack, cell, false);

        let spec_input = SpecInput {
            id: daemon_id.clone(),
            command: template.command.clone(),
            args: template.args.clone(),
            env: template.env.clone(),
            privileged: template.privileged,
        };
        let mut spec =
            build_container_spec(&spec_input, &labels).map_err(|e| ControllerError::ConversionFailed(kuke_common::chain(&e)))?;
        spec = join_container_namespaces(spec, &cell_doc.spec.namespace_paths.clone().into())
            .map_err(|e| ControllerError::ConversionFailed(kuke_common::chain(&e)))?;
        if let Some(cni_path) = &template.cni_config_path {
            spec = with_cni_annotation(spec, cni_path);
        }
        let spec_json = serde_json::to_vec(&spec).map_err(|e| ControllerError::ConversionFailed(e.to_string()))?;

        let record = ContainerRecordBuilder::default()
            .id(daemon_id.clone())
            .image(normalize_image_reference(&template.image))
            .snapshot_key(daemon_id.clone())
            .spec_json(spec_json.clone())
            .labels(labels)
            .build()?;

        let container_created = match self.daemon.create_container(record, &CreateOptions::default()).await {
            Ok(()) => true,
            Err(kuke_daemon::DaemonError::ContainerExists(_)) => false,
            Err(e) => return Err(e.into()),
        };
        self.daemon.start_task(&daemon_id, &spec_json).await?;

        let container_dir = paths::container_dir(&self.run_path, realm, space, stack, cell, name);
        let metadata_created = !self.exists_doc(&container_dir);
        let doc = Document::new(
            "Container",
            Metadata {
                name: name.to_string(),
                realm: Some(realm.to_string()),
                space: Some(space.to_string()),
                stack: Some(stack.to_string()),
                cell: Some(cell.to_string()),
            },
            template,
        );
        self.write_doc(&container_dir, &doc)?;

        Ok(ContainerResult {
            name: name.to_string(),
            container_created,
            task_started: true,
            metadata_created,
        })
    }

    // ---- kill --------------------------------------------------------------
    //
    // Graceful-then-force stop (§4.3/§4.6), leaving the container/pause
    // container and its metadata in place — unlike delete, which tears
    // the substrate down afterwards.

    pub async fn kill_container(&self, realm: &str, space: &str, stack: &str, cell: &str, name: &str, force: bool) -> KillResult {
        let container_dir = paths::container_dir(&self.run_path, realm, space, stack, cell, name);
        if !self.exists_doc(&container_dir) {
            return KillResult::not_found("container", name);
        }
        if let Err(e) = self.ensure_namespace(realm).await {
            return KillResult::failed("container", name, e.to_string());
        }

        let daemon_id = model::container_daemon_id(realm, space, stack, cell, name);
        let stop_opts = StopOptions {
            force,
            ..Default::default()
        };
        if let Err(e) = self.daemon.stop_task(&daemon_id, &stop_opts).await {
            if !matches!(e, kuke_daemon::DaemonError::TaskNotRunning(_)) {
                return KillResult::failed("container", name, e.to_string());
            }
        }

        KillResult::ok("container", name)
    }

    pub async fn kill_cell(&self, realm: &str, space: &str, stack: &str, cell: &str, force: bool) -> KillResult {
        let dir = paths::cell_dir(&self.run_path, realm, space, stack, cell);
        if !self.exists_doc(&dir) {
            return KillResult::not_found("cell", cell);
        }
        if let Err(e) = self.ensure_namespace(realm).await {
            return KillResult::failed("cell", cell, e.to_string());
        }

        let root_id = model::root_container_id(realm, space, stack, cell);
        let stop_opts = StopOptions {
            force,
            ..Default::default()
        };
        if let Err(e) = self.daemon.stop_task(&root_id, &stop_opts).await {
            if !matches!(e, kuke_daemon::DaemonError::TaskNotRunning(_)) {
                return KillResult::failed("cell", cell, e.to_string());
            }
        }

        KillResult::ok("cell", cell)
    }

    // ---- delete ----------------------------------------------------------

    pub async fn delete_container(&self, realm: &str, space: &str, stack: &str, cell: &str, name: &str, force: bool) -> DeleteResult {
        let container_dir = paths::container_dir(&self.run_path, realm, space, stack, cell, name);
        if !self.exists_doc(&container_dir) {
            return DeleteResult::not_found("container", name);
        }

        if let Err(e) = self.ensure_namespace(realm).await {
            return DeleteResult::failed("container", name, e.to_string());
        }

        let daemon_id = model::container_daemon_id(realm, space, stack, cell, name);
        let stop_opts = StopOptions {
            force,
            ..Default::default()
        };
        if let Err(e) = self.daemon.stop_task(&daemon_id, &stop_opts).await {
            if !matches!(
                e,
                kuke_daemon::DaemonError::TaskNotFound(_) | kuke_daemon::DaemonError::TaskNotRunning(_)
            ) {
                return DeleteResult::failed("container", name, e.to_string());
            }
        }
        if let Err(e) = self
            .daemon
            .delete_container(&daemon_id, &DeleteOptions { cleanup_snapshot: true })
            .await
        {
            return DeleteResult::failed("container", name, e.to_string());
        }
        if let Err(e) = kuke_metadata::remove(paths::metadata_path(&container_dir)) {
            return DeleteResult::failed("container", name, e.to_string());
        }

        DeleteResult::ok("container", name)
    }

    pub async fn delete_cell(&self, realm: &str, space: &str, stack: &str, cell: &str, force: bool, cascade: bool) -> DeleteResult {
        let dir = paths::cell_dir(&self.run_path, realm, space, stack, cell);
        if !self.exists_doc(&dir) {
            return DeleteResult::not_found("cell", cell);
        }

        let children = paths::child_containers(&self.run_path, realm, space, stack, cell);
        let mut cascaded = Vec::new();
        if cascade {
            for child in &children {
                cascaded.push(self.delete_container(realm, space, stack, cell, child, force).await);
            }
        } else if !children.is_empty() && !force {
            return DeleteResult::children_present("cell", cell, children.len(), "container");
        }

        if let Err(e) = self.ensure_namespace(realm).await {
            return DeleteResult {
                cascaded,
                ..DeleteResult::failed("cell", cell, e.to_string())
            }
            .fold_cascade();
        }

        let root_id = model::root_container_id(realm, space, stack, cell);

        if let Ok(cell_doc) = self.read_doc::<CellSpec>(&dir) {
            if let Some(net_ns) = cell_doc.spec.namespace_paths.net.clone() {
                if let Ok(space_doc) = self.read_doc::<SpaceSpec>(&paths::space_dir(&self.run_path, realm, space)) {
                    let network_name = space_doc.spec.network_name(space).to_string();
                    let conflist = self.cni.conf_dir().join(format!("{network_name}.conflist"));
                    if self.cni.load_network_config(&conflist).is_ok() {
                        let _ = self.cni.del_container(&root_id, &net_ns).await;
                    }
                }
            }
        }

        let stop_opts = StopOptions {
            force,
            ..Default::default()
        };
        let _ = self.daemon.stop_task(&root_id, &stop_opts).await;
        if let Err(e) = self
            .daemon
            .delete_container(&root_id, &DeleteOptions { cleanup_snapshot: true })
            .await
        {
            return DeleteResult {
                cascaded,
                ..DeleteResult::failed("cell", cell, e.to_string())
            }
            .fold_cascade();
        }
        if let Err(e) = self.cgroup.delete(&paths::cell_group(realm, space, stack, cell)) {
            return DeleteResult {
                cascaded,
                ..DeleteResult::failed("cell", cell, e.to_string())
            }
            .fold_cascade();
        }
        if let Err(e) = kuke_metadata::remove(paths::metadata_path(&dir)) {
            return DeleteResult {
                cascaded,
                ..DeleteResult::failed("cell", cell, e.to_string())
            }
            .fold_cascade();
        }

        DeleteResult {
            cascaded,
            ..DeleteResult::ok("cell", cell)
        }
        .fold_cascade()
    }

    pub async fn delete_stack(&self, realm: &str, space: &str, stack: &str, force: bool, cascade: bool) -> DeleteResult {
        let dir = paths::stack_dir(&self.run_path, realm, space, stack);
        if !self.exists_doc(&dir) {
            return DeleteResult::not_found("stack", stack);
        }

        let children = paths::child_entities(&dir);
        let mut cascaded = Vec::new();
        if cascade {
            for child in &children {
                cascaded.push(self.delete_cell(realm, space, stack, child, force, cascade).await);
            }
        } else if !children.is_empty() && !force {
            return DeleteResult::children_present("stack", stack, children.len(), "cell");
        }

        if let Err(e) = self.cgroup.delete(&paths::stack_group(realm, space, stack)) {
            return DeleteResult {
                cascaded,
                ..DeleteResult::failed("stack", stack, e.to_string())
            }
            .fold_cascade();
        }
        if let Err(e) = kuke_metadata::remove(paths::metadata_path(&dir)) {
            return DeleteResult {
                cascaded,
                ..DeleteResult::failed("stack", stack, e.to_string())
            }
            .fold_cascade();
        }

        DeleteResult {
            cascaded,
            ..DeleteResult::ok("stack", stack)
        }
        .fold_cascade()
    }

    pub async fn delete_space(&self, realm: &str, space: &str, force: bool, cascade: bool) -> DeleteResult {
        let dir = paths::space_dir(&self.run_path, realm, space);
        if !self.exists_doc(&dir) {
            return DeleteResult::not_found("space", space);
        }

        let children = paths::child_entities(&dir);
        let mut cascaded = Vec::new();
        if cascade {
            for child in &children {
                cascaded.push(self.delete_stack(realm, space, child, force, cascade).await);
            }
        } else if !children.is_empty() && !force {
            return DeleteResult::children_present("space", space, children.len(), "stack");
        }

        let network_name = self
            .read_doc::<SpaceSpec>(&dir)
            .map(|doc| doc.spec.network_name(space).to_string())
            .unwrap_or_else(|_| space.to_string());

        if let Err(e) = self.cni.delete_network(&network_name, None) {
            return DeleteResult {
                cascaded,
                ..DeleteResult::failed("space", space, e.to_string())
            }
            .fold_cascade();
        }
        if let Err(e) = self.cgroup.delete(&paths::space_group(realm, space)) {
            return DeleteResult {
                cascaded,
                ..DeleteResult::failed("space", space, e.to_string())
            }
            .fold_cascade();
        }
        if let Err(e) = kuke_metadata::remove(paths::metadata_path(&dir)) {
            return DeleteResult {
                cascaded,
                ..DeleteResult::failed("space", space, e.to_string())
            }
            .fold_cascade();
        }

        DeleteResult {
            cascaded,
            ..DeleteResult::ok("space", space)
        }
        .fold_cascade()
    }

    /// Delete a realm and (with `cascade`) everything beneath it.
    ///
    /// The daemon namespace is torn down by first actively walking and
    /// removing every image/snapshot/content blob it holds
    /// ([`DaemonAdapter::cleanup_namespace_resources`]) and only then
    /// deleting the now-empty namespace — deleting straight away would
    /// simply fail against a non-empty namespace.
    pub async fn delete_realm(&self, realm: &str, force: bool, cascade: bool) -> DeleteResult {
        let dir = paths::realm_dir(&self.run_path, realm);
        if !self.exists_doc(&dir) {
            return DeleteResult::not_found("realm", realm);
        }

        let children = paths::child_entities(&dir);
        let mut cascaded = Vec::new();
        if cascade {
            for child in &children {
                cascaded.push(self.delete_space(realm, child, force, cascade).await);
            }
        } else if !children.is_empty() && !force {
            return DeleteResult::children_present("realm", realm, children.len(), "space");
        }

        let namespace = self
            .read_doc::<RealmSpec>(&dir)
            .map(|doc| doc.spec.namespace_name(realm).to_string())
            .unwrap_or_else(|_| realm.to_string());

        if let Err(e) = self.daemon.cleanup_namespace_resources(&namespace).await {
            return DeleteResult {
                cascaded,
                ..DeleteResult::failed("realm", realm, e.to_string())
            }
            .fold_cascade();
        }
        if let Err(e) = self.daemon.delete_namespace(&namespace).await {
            return DeleteResult {
                cascaded,
                ..DeleteResult::failed("realm", realm, e.to_string())
            }
            .fold_cascade();
        }
        if let Err(e) = self.cgroup.delete(&paths::realm_group(realm)) {
            return DeleteResult {
                cascaded,
                ..DeleteResult::failed("realm", realm, e.to_string())
            }
            .fold_cascade();
        }
        if let Err(e) = kuke_metadata::remove(paths::metadata_path(&dir)) {
            return DeleteResult {
                cascaded,
                ..DeleteResult::failed("realm", realm, e.to_string())
            }
            .fold_cascade();
        }

        DeleteResult {
            cascaded,
            ..DeleteResult::ok("realm", realm)
        }
        .fold_cascade()
    }
}
