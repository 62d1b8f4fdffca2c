//! Write manifest — SHA-256-based idempotency tracking plus the record of
//! which directories the previous write produced.
//!
//! Persists a JSON document at `<root>/.vox/manifest.json`. The digest map
//! gates rewrites of unchanged files; the resource map drives stale-file and
//! stale-directory cleanup. Writes use an atomic `.tmp` + rename.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, parse_err, FileError};
use crate::layout::{MANIFEST_DIR, MANIFEST_FILE};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub synced_at: DateTime<Utc>,
    /// Relative file path → SHA-256 hex digest of its last written content.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    /// Directory-owning resource id → directory name at last write.
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
}

impl Manifest {
    pub fn empty() -> Self {
        Manifest {
            synced_at: Utc::now(),
            files: BTreeMap::new(),
            resources: BTreeMap::new(),
        }
    }
}

/// `<root>/.vox/manifest.json`
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_DIR).join(MANIFEST_FILE)
}

/// Load the manifest under `root`, or an empty one if none exists yet.
pub fn load(root: &Path) -> Result<Manifest, FileError> {
    let path = manifest_path(root);
    if !path.exists() {
        return Ok(Manifest::empty());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_json::from_str(&contents).map_err(|e| parse_err(&path, e))
}

/// Save the manifest atomically: write `.tmp` sibling, then rename.
pub fn save(root: &Path, manifest: &Manifest) -> Result<(), FileError> {
    let path = manifest_path(root);
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid manifest path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(manifest)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_manifest_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let manifest = load(tmp.path()).unwrap();
        assert!(manifest.files.is_empty());
        assert!(manifest.resources.is_empty());
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut manifest = Manifest::empty();
        manifest
            .files
            .insert("support_aa1/config.yaml".into(), "deadbeef".into());
        manifest
            .resources
            .insert("agent_1".into(), "support_aa1".into());

        save(tmp.path(), &manifest).unwrap();
        let loaded = load(tmp.path()).unwrap();
        assert_eq!(loaded.files, manifest.files);
        assert_eq!(loaded.resources, manifest.resources);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        save(tmp.path(), &Manifest::empty()).unwrap();
        let tmp_path = manifest_path(tmp.path()).with_extension("json.tmp");
        assert!(!tmp_path.exists(), "tmp file should be gone after rename");
    }
}
