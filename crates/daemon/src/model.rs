//! Domain types passed across the [`crate::client::DaemonClient`] seam —
//! narrower than the raw containerd protobuf messages, but shaped the
//! same way, so the higher-level adapter logic in `lib.rs` never touches
//! `tonic`/`containerd_client` types directly.

use std::{collections::HashMap, time::Duration};

use derive_builder::Builder;
use getset::Getters;

use crate::error::DaemonError;

pub const LABEL_CONTAINER_TYPE: &str = "kukeon.io/container-type";
pub const LABEL_CELL: &str = "kukeon.io/cell";
pub const LABEL_SPACE: &str = "kukeon.io/space";
pub const LABEL_REALM: &str = "kukeon.io/realm";
pub const LABEL_STACK: &str = "kukeon.io/stack";
pub const CONTAINER_TYPE_ROOT: &str = "root";
pub const CONTAINER_TYPE_WORKLOAD: &str = "workload";
pub const CNI_CONFIG_ANNOTATION: &str = "io.kukeon.cni.config";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCredential {
    pub username: String,
    pub password: String,
    pub server: Option<String>,
}

#[derive(Debug, Clone, Builder, Getters)]
#[builder(pattern = "owned", setter(into, strip_option), build_fn(error = "DaemonError"))]
pub struct ContainerRecord {
    #[get = "pub"]
    id: String,
    #[get = "pub"]
    image: String,
    #[get = "pub"]
    snapshot_key: String,
    /// The composed OCI runtime spec, serialized to JSON (what
    /// containerd stores verbatim in `Container.spec`).
    #[get = "pub"]
    spec_json: Vec<u8>,
    #[get = "pub"]
    #[builder(default)]
    labels: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub name: String,
    pub digest: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Unknown,
    Created,
    Running,
    Stopped,
    Paused,
    Pausing,
}

#[derive(Debug, Clone, Default)]
pub struct TaskExitStatus {
    pub exit_code: u32,
}

#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub platform: String,
    pub resolver: Option<RegistryCredential>,
    pub lease: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    pub cleanup_snapshot: bool,
}

#[derive(Debug, Clone)]
pub struct StopOptions {
    pub signal: String,
    pub timeout: Duration,
    pub force: bool,
}

impl Default for StopOptions {
    fn default() -> Self {
        Self {
            signal: "SIGTERM".into(),
            timeout: Duration::from_secs(10),
            force: false,
        }
    }
}

/// Map a caller-supplied signal name to the kernel signal `kill(2)` expects.
/// Anything unrecognised normalizes to `SIGTERM`.
pub fn normalize_signal(name: &str) -> nix::sys::signal::Signal {
    use nix::sys::signal::Signal;
    match name {
        "SIGTERM" | "TERM" => Signal::SIGTERM,
        "SIGKILL" | "KILL" => Signal::SIGKILL,
        "SIGINT" | "INT" => Signal::SIGINT,
        "SIGSTOP" | "STOP" => Signal::SIGSTOP,
        _ => Signal::SIGTERM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognised_signal_normalizes_to_sigterm() {
        use nix::sys::signal::Signal;
        assert_eq!(normalize_signal("banana"), Signal::SIGTERM);
        assert_eq!(normalize_signal("KILL"), Signal::SIGKILL);
        assert_eq!(normalize_signal("SIGINT"), Signal::SIGINT);
    }
}
