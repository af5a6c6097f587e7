//! CNI bridge-network lifecycle: per-space conflist management and
//! plugin invocation for joining/leaving a container's network
//! namespace, grounded in `containrs`'s `Exec`/`Args` plugin-invocation
//! abstraction and supplemented with the conflist document shapes.

pub mod conflist;
pub mod error;
pub mod exec;

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::RwLock,
};

use log::{debug, warn};

pub use conflist::{bridge_conflist, CniConflist, DEFAULT_BRIDGE, DEFAULT_SUBNET};
pub use error::{CniError, Result};
pub use exec::{Args, ArgsBuilder, DefaultExec, Exec};

const DEFAULT_BIN_DIR: &str = "/opt/cni/bin";
const DEFAULT_CONF_DIR: &str = "/opt/cni/net.d";
const DEFAULT_CACHE_DIR: &str = "/opt/cni/cache";
const DIR_MODE: u32 = 0o750;
const FILE_MODE: u32 = 0o600;
const INTERFACE_NAME: &str = "eth0";

/// Parameters for [`CniManager::create_network`].
#[derive(Debug, Clone)]
pub struct NetworkSpec {
    pub name: String,
    pub bridge_name: Option<String>,
    pub subnet_cidr: Option<String>,
}

impl NetworkSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bridge_name: None,
            subnet_cidr: None,
        }
    }

    fn bridge_name(&self) -> String {
        self.bridge_name.clone().unwrap_or_else(|| self.name.clone())
    }

    fn subnet_cidr(&self) -> String {
        self.subnet_cidr
            .clone()
            .unwrap_or_else(|| DEFAULT_SUBNET.to_string())
    }
}

/// Pre/created/post existence for one directory in [`CniManager::bootstrap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirReport {
    pub existed_pre: bool,
    pub created: bool,
    pub exists_post: bool,
}

#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub bin_dir: DirReport,
    pub conf_dir: DirReport,
    pub cache_dir: DirReport,
}

impl BootstrapReport {
    pub fn any_created(&self) -> bool {
        self.bin_dir.created || self.conf_dir.created || self.cache_dir.created
    }
}

/// The CNI manager: owns the three well-known directories and the exec
/// abstraction used to invoke plugin binaries.
pub struct CniManager {
    bin_dir: PathBuf,
    conf_dir: PathBuf,
    cache_dir: PathBuf,
    exec: Box<dyn Exec>,
    loaded: RwLock<Option<CniConflist>>,
}

impl Default for CniManager {
    fn default() -> Self {
        Self::new(
            PathBuf::from(DEFAULT_BIN_DIR),
            PathBuf::from(DEFAULT_CONF_DIR),
            PathBuf::from(DEFAULT_CACHE_DIR),
        )
    }
}

impl CniManager {
    pub fn new(bin_dir: PathBuf, conf_dir: PathBuf, cache_dir: PathBuf) -> Self {
        Self {
            bin_dir,
            conf_dir,
            cache_dir,
            exec: Box::new(DefaultExec),
            loaded: RwLock::new(None),
        }
    }

    /// Use a non-default [`Exec`], primarily for tests.
    pub fn with_exec(mut self, exec: Box<dyn Exec>) -> Self {
        self.exec = exec;
        self
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    pub fn conf_dir(&self) -> &Path {
        &self.conf_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Ensure `bin_dir`, `conf_dir`, and `cache_dir` exist at mode 0750.
    pub fn bootstrap(&self) -> Result<BootstrapReport> {
        Ok(BootstrapReport {
            bin_dir: ensure_dir(&self.bin_dir)?,
            conf_dir: ensure_dir(&self.conf_dir)?,
            cache_dir: ensure_dir(&self.cache_dir)?,
        })
    }

    fn conflist_path(&self, name: &str) -> PathBuf {
        self.conf_dir.join(format!("{name}.conflist"))
    }

    /// Write `<conf_dir>/<name>.conflist` with a two-plugin `bridge` +
    /// `loopback` list at mode 0600. Returns the written path.
    pub fn create_network(&self, spec: &NetworkSpec) -> Result<PathBuf> {
        let conflist = bridge_conflist(&spec.name, &spec.bridge_name(), &spec.subnet_cidr());
        let path = self.conflist_path(&spec.name);
        let json = serde_json::to_string_pretty(&conflist)?;
        fs::write(&path, json).map_err(|e| error::io_err(&path, e))?;

        let mut perms = fs::metadata(&path)
            .map_err(|e| error::io_err(&path, e))?
            .permissions();
        perms.set_mode(FILE_MODE);
        fs::set_permissions(&path, perms).map_err(|e| error::io_err(&path, e))?;

        debug!("wrote CNI conflist {:?}", path);
        Ok(path)
    }

    /// Load and parse the conflist for `name` at `path` (default
    /// `<conf_dir>/<name>.conflist`), checking its `name` field matches.
    /// Distinguishes a missing file from a malformed one.
    pub fn exists_network(&self, name: &str, path: Option<&Path>) -> Result<bool> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.conflist_path(name));

        if !path.exists() {
            return Err(CniError::NetworkNotFound(name.to_string()));
        }

        let content = fs::read_to_string(&path).map_err(|e| error::io_err(&path, e))?;
        let conflist: CniConflist = serde_json::from_str(&content)?;
        Ok(conflist.name == name)
    }

    /// Parse a conflist file and remember it as the manager's currently
    /// loaded network — a precondition for [`add_container`]/[`del_container`].
    ///
    /// [`add_container`]: CniManager::add_container
    /// [`del_container`]: CniManager::del_container
    pub fn load_network_config(&self, path: &Path) -> Result<CniConflist> {
        let content = fs::read_to_string(path).map_err(|e| error::io_err(path, e))?;
        let conflist: CniConflist = serde_json::from_str(&content)?;
        *self.loaded.write().expect("cni loaded-config lock poisoned") = Some(conflist.clone());
        Ok(conflist)
    }

    fn loaded_config(&self) -> Result<CniConflist> {
        self.loaded
            .read()
            .expect("cni loaded-config lock poisoned")
            .clone()
            .ok_or_else(|| CniError::ConfigNotLoaded("no network configuration loaded".into()))
    }

    /// Run `ADD` for every plugin in the currently loaded conflist,
    /// joining `container_id`'s `netns_path` to the network via `eth0`.
    pub async fn add_container(&self, container_id: &str, netns_path: &Path) -> Result<()> {
        let conflist = self.loaded_config()?;
        for plugin in &conflist.plugins {
            let binary = self.bin_dir.join(&plugin.plugin_type);
            let args = self.plugin_args("ADD", container_id, netns_path);
            self.exec
                .run(&binary, &args)
                .await
                .map_err(|e| CniError::Exec(e.to_string()))?;
        }
        debug!("added container {container_id} to network {}", conflist.name);
        Ok(())
    }

    /// Run `DEL` for every plugin in the currently loaded conflist, in
    /// reverse order, removing `container_id`'s `netns_path` from the
    /// network via `eth0`.
    pub async fn del_container(&self, container_id: &str, netns_path: &Path) -> Result<()> {
        let conflist = self.loaded_config()?;
        for plugin in conflist.plugins.iter().rev() {
            let binary = self.bin_dir.join(&plugin.plugin_type);
            let args = self.plugin_args("DEL", container_id, netns_path);
            self.exec
                .run(&binary, &args)
                .await
                .map_err(|e| CniError::Exec(e.to_string()))?;
        }
        debug!("removed container {container_id} from network {}", conflist.name);
        Ok(())
    }

    fn plugin_args(&self, command: &str, container_id: &str, netns_path: &Path) -> Args {
        ArgsBuilder::default()
            .command(command)
            .container_id(container_id)
            .network_namespace(netns_path.to_string_lossy().to_string())
            .interface_name(INTERFACE_NAME)
            .path(self.bin_dir.to_string_lossy().to_string())
            .build()
            .expect("all required Args fields are set")
    }

    /// Idempotent network deletion: absence is success; a name mismatch
    /// is treated as "not ours" and also succeeds without deleting.
    pub fn delete_network(&self, name: &str, path: Option<&Path>) -> Result<()> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.conflist_path(name));

        if !path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(&path).map_err(|e| error::io_err(&path, e))?;
        match serde_json::from_str::<CniConflist>(&content) {
            Ok(conflist) if conflist.name == name => {
                fs::remove_file(&path).map_err(|e| error::io_err(&path, e))?;
                debug!("deleted CNI conflist {:?}", path);
                Ok(())
            }
            Ok(conflist) => {
                warn!(
                    "refusing to delete {:?}: name {:?} does not match requested {:?}",
                    path, conflist.name, name
                );
                Ok(())
            }
            Err(_) => {
                warn!("refusing to delete malformed conflist {:?}", path);
                Ok(())
            }
        }
    }
}

fn ensure_dir(path: &Path) -> Result<DirReport> {
    let existed_pre = path.is_dir();
    let mut created = false;
    if !existed_pre {
        fs::create_dir_all(path).map_err(|e| error::io_err(path, e))?;
        created = true;
    }
    let mut perms = fs::metadata(path)
        .map_err(|e| error::io_err(path, e))?
        .permissions();
    perms.set_mode(DIR_MODE);
    fs::set_permissions(path, perms).map_err(|e| error::io_err(path, e))?;

    Ok(DirReport {
        existed_pre,
        created,
        exists_post: path.is_dir(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct RecordingExec {
        calls: std::sync::Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Exec for RecordingExec {
        async fn run(&self, binary: &Path, args: &Args) -> anyhow::Result<String> {
            self.calls.lock().unwrap().push(format!(
                "{} {} {}",
                binary.display(),
                args.command(),
                args.container_id()
            ));
            Ok(String::new())
        }

        async fn run_with_stdin(
            &self,
            _binary: &Path,
            _args: &Args,
            _stdin: &[u8],
        ) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    fn manager(dir: &Path) -> CniManager {
        CniManager::new(
            dir.join("bin"),
            dir.join("net.d"),
            dir.join("cache"),
        )
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());

        let first = mgr.bootstrap().unwrap();
        assert!(first.any_created());

        let second = mgr.bootstrap().unwrap();
        assert!(!second.any_created());
    }

    #[test]
    fn create_network_writes_two_plugins() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        mgr.bootstrap().unwrap();

        let path = mgr
            .create_network(&NetworkSpec::new("default"))
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let conflist: CniConflist = serde_json::from_str(&content).unwrap();
        assert_eq!(conflist.plugins.len(), 2);

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn exists_network_distinguishes_missing_from_malformed() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        mgr.bootstrap().unwrap();

        assert!(matches!(
            mgr.exists_network("default", None),
            Err(CniError::NetworkNotFound(_))
        ));

        mgr.create_network(&NetworkSpec::new("default")).unwrap();
        assert!(mgr.exists_network("default", None).unwrap());

        let bad_path = mgr.conf_dir().join("broken.conflist");
        fs::write(&bad_path, "not json").unwrap();
        assert!(matches!(
            mgr.exists_network("broken", Some(&bad_path)),
            Err(CniError::Malformed(_))
        ));
    }

    #[test]
    fn delete_network_is_idempotent_and_respects_ownership() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        mgr.bootstrap().unwrap();

        mgr.delete_network("absent", None).unwrap();

        let path = mgr.create_network(&NetworkSpec::new("default")).unwrap();
        mgr.delete_network("other-name", Some(&path)).unwrap();
        assert!(path.exists());

        mgr.delete_network("default", Some(&path)).unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn add_container_requires_loaded_config() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        let err = mgr
            .add_container("container-1", Path::new("/var/run/netns/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CniError::ConfigNotLoaded(_)));
    }

    #[tokio::test]
    async fn add_container_runs_every_plugin() {
        let dir = tempdir().unwrap();
        let recorder = RecordingExec::default();
        let mgr = manager(dir.path()).with_exec(Box::new(recorder.clone()));
        mgr.bootstrap().unwrap();
        let path = mgr.create_network(&NetworkSpec::new("default")).unwrap();
        mgr.load_network_config(&path).unwrap();

        mgr.add_container("container-1", Path::new("/var/run/netns/x"))
            .await
            .unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].contains("ADD container-1"));
    }
}
