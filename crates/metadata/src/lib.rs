//! Atomic per-entity JSON metadata store.
//!
//! Every entity in the realm/space/stack/cell/container hierarchy is
//! persisted as a single `metadata.json` file under the run-path tree.
//! Writes go through a sibling temp file, fsync, then rename, so a reader
//! never observes a partial file (see [`write`]).

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    os::unix::fs::{OpenOptionsExt, PermissionsExt},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub const DEFAULT_API_VERSION: &str = "kukeon/v1beta1";

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata not found at {0}")]
    Missing(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MetadataError>;

/// The envelope header every metadata document carries, decoded without
/// knowledge of the entity-specific `spec` shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Header {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    pub kind: String,
}

/// Normalise an `apiVersion` string: an empty value defaults to
/// [`DEFAULT_API_VERSION`], everything else passes through unchanged.
pub fn normalize_api_version(api_version: &str) -> String {
    if api_version.is_empty() {
        DEFAULT_API_VERSION.to_string()
    } else {
        api_version.to_string()
    }
}

/// Serialise `value` to indented JSON and write it atomically to `path`.
///
/// Creates parent directories (mode 0700) if missing. The write goes to a
/// sibling `.meta-*.tmp` file (mode 0600), is fsynced, renamed over `path`,
/// and the parent directory is best-effort fsynced afterwards. Overwrites
/// any existing file at `path`.
pub fn write<T>(path: impl AsRef<Path>, value: &T) -> Result<()>
where
    T: Serialize,
{
    let path = path.as_ref();
    let parent = path.parent().ok_or_else(|| {
        MetadataError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", path.display()),
        ))
    })?;
    fs::create_dir_all(parent)?;
    fs::set_permissions(parent, fs::Permissions::from_mode(0o700))?;

    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');

    let tmp_path = parent.join(format!(".meta-{}.tmp", uuid_like()));
    {
        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp_path)?;
        tmp.write_all(&body)?;
        tmp.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;

    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }

    Ok(())
}

/// Read the raw bytes at `path`, failing with [`MetadataError::Missing`] if
/// absent, and decode the `{apiVersion, kind}` header from them.
pub fn read(path: impl AsRef<Path>) -> Result<(Vec<u8>, Header)> {
    let path = path.as_ref();
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MetadataError::Missing(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut header: Header = serde_json::from_slice(&bytes)?;
    header.api_version = normalize_api_version(&header.api_version);
    Ok((bytes, header))
}

/// Strictly decode `bytes` into `T` after version normalisation.
pub fn decode<T>(bytes: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_slice(bytes)?)
}

/// Whether a `metadata.json` file exists at `path`.
pub fn exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_file()
}

/// Remove the metadata file at `path`. Idempotent: a missing file is a
/// no-op success, matching the delete-idempotence invariant.
pub fn remove(path: impl AsRef<Path>) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Cheap process-unique-enough suffix for temp file names; avoids a UUID
/// dependency for something that only needs to not collide within one
/// directory during one write.
fn uuid_like() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{:x}-{:x}", nanos, std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs as stdfs;
    use tempfile::tempdir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct RealmSpec {
        #[serde(rename = "apiVersion")]
        api_version: String,
        kind: String,
        metadata: Meta,
        spec: Inner,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Meta {
        name: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Inner {
        namespace: String,
    }

    fn sample() -> RealmSpec {
        RealmSpec {
            api_version: DEFAULT_API_VERSION.to_string(),
            kind: "Realm".to_string(),
            metadata: Meta {
                name: "main".to_string(),
            },
            spec: Inner {
                namespace: "main".to_string(),
            },
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("main").join("metadata.json");

        let value = sample();
        write(&path, &value).unwrap();

        let (bytes, header) = read(&path).unwrap();
        assert_eq!(header.kind, "Realm");
        assert_eq!(header.api_version, DEFAULT_API_VERSION);

        let decoded: RealmSpec = decode(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn read_missing_is_missing_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope").join("metadata.json");
        match read(&path) {
            Err(MetadataError::Missing(p)) => assert_eq!(p, path),
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn write_creates_parent_with_mode_0700() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("metadata.json");
        write(&path, &sample()).unwrap();

        let meta = stdfs::metadata(path.parent().unwrap()).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn write_file_is_mode_0600() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        write(&path, &sample()).unwrap();

        let meta = stdfs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn write_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");

        let mut value = sample();
        write(&path, &value).unwrap();

        value.spec.namespace = "other".to_string();
        write(&path, &value).unwrap();

        let (bytes, _) = read(&path).unwrap();
        let decoded: RealmSpec = decode(&bytes).unwrap();
        assert_eq!(decoded.spec.namespace, "other");
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        write(&path, &sample()).unwrap();

        remove(&path).unwrap();
        assert!(!exists(&path));
        // second removal of an already-absent file still succeeds
        remove(&path).unwrap();
    }

    #[test]
    fn normalize_api_version_defaults_empty() {
        assert_eq!(normalize_api_version(""), DEFAULT_API_VERSION);
        assert_eq!(normalize_api_version("v2"), "v2");
    }

    #[test]
    fn no_tmp_file_left_behind_after_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        write(&path, &sample()).unwrap();

        let leftovers: Vec<_> = stdfs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".meta-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
