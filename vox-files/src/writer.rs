//! Hash-gated atomic writer with stale-file cleanup.
//!
//! ## Per-file protocol
//!
//! 1. Normalize line endings to LF.
//! 2. SHA-256 hash the normalized content.
//! 3. Compare with the manifest digest → skip if identical.
//! 4. Write to a `.vox.tmp` sibling.
//! 5. Rename to the final path (atomic on POSIX).
//! 6. Update the manifest entry; the manifest is saved once per pass.
//!
//! ## Cleanup
//!
//! Stale entries are diffed against the previous write set (the manifest),
//! never against arbitrary directory contents, so user files in a managed
//! directory survive. A subset write only ever touches the directories of
//! the resources it was given; whole-directory deletion of vanished
//! resources happens only on a full write.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::error::{io_err, FileError};
use crate::manifest::{self, Manifest};
use crate::serialize::SerializedTree;

// ---------------------------------------------------------------------------
// Write results
// ---------------------------------------------------------------------------

/// Outcome of an individual file operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was skipped — content matches the stored digest.
    Unchanged { path: PathBuf },
    /// Stale file from a previous write was deleted.
    Removed { path: PathBuf },
    /// Dry-run: the file *would* have been written.
    WouldWrite { path: PathBuf },
    /// Dry-run: the stale file *would* have been deleted.
    WouldRemove { path: PathBuf },
}

/// Scope of one write pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteScope {
    /// The tree is the complete managed state: resources absent from it are
    /// deleted from disk.
    Full,
    /// The tree covers an explicit id subset: directories outside it are
    /// never touched.
    Subset,
}

/// Summary of one write pass.
#[derive(Debug, Default)]
pub struct WriteSummary {
    pub results: Vec<WriteResult>,
}

impl WriteSummary {
    pub fn written(&self) -> usize {
        self.count(|r| matches!(r, WriteResult::Written { .. } | WriteResult::WouldWrite { .. }))
    }
    pub fn unchanged(&self) -> usize {
        self.count(|r| matches!(r, WriteResult::Unchanged { .. }))
    }
    pub fn removed(&self) -> usize {
        self.count(|r| matches!(r, WriteResult::Removed { .. } | WriteResult::WouldRemove { .. }))
    }
    fn count(&self, pred: impl Fn(&WriteResult) -> bool) -> usize {
        self.results.iter().filter(|r| pred(r)).count()
    }
}

// ---------------------------------------------------------------------------
// write_tree
// ---------------------------------------------------------------------------

/// Apply a serialized tree to `root`.
pub fn write_tree(
    root: &Path,
    tree: &SerializedTree,
    scope: WriteScope,
    dry_run: bool,
) -> Result<WriteSummary, FileError> {
    let started_at = Utc::now();
    let mut store = manifest::load(root)?;
    let mut summary = WriteSummary::default();

    for (relative, content) in &tree.files {
        let result = write_file(root, relative, content, &mut store, dry_run)?;
        summary.results.push(result);
    }

    clean_stale(root, tree, scope, dry_run, &mut store, &mut summary)?;

    if !dry_run {
        store.synced_at = started_at;
        manifest::save(root, &store)?;
    }
    Ok(summary)
}

fn write_file(
    root: &Path,
    relative: &Path,
    content: &str,
    store: &mut Manifest,
    dry_run: bool,
) -> Result<WriteResult, FileError> {
    let normalized = content.replace("\r\n", "\n");
    let digest = sha256_hex(&normalized);
    let key = manifest_key(relative);
    let path = root.join(relative);

    if store.files.get(&key) == Some(&digest) && path.exists() {
        tracing::debug!("unchanged: {}", path.display());
        return Ok(WriteResult::Unchanged { path });
    }

    if dry_run {
        tracing::info!("[dry-run] would write: {}", path.display());
        return Ok(WriteResult::WouldWrite { path });
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = PathBuf::from(format!("{}.vox.tmp", path.display()));
    std::fs::write(&tmp, &normalized).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }

    store.files.insert(key, digest);
    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written { path })
}

// ---------------------------------------------------------------------------
// Cleanup
// ---------------------------------------------------------------------------

fn clean_stale(
    root: &Path,
    tree: &SerializedTree,
    scope: WriteScope,
    dry_run: bool,
    store: &mut Manifest,
    summary: &mut WriteSummary,
) -> Result<(), FileError> {
    let produced: BTreeSet<String> = tree.files.keys().map(|p| manifest_key(p)).collect();
    let current_dirs: BTreeSet<&str> = tree.resources.values().map(String::as_str).collect();

    // Files we previously wrote into a directory we are writing now, but no
    // longer produce.
    let stale_files: Vec<String> = store
        .files
        .keys()
        .filter(|key| {
            let Some(dir) = top_level_dir(key) else {
                return false;
            };
            current_dirs.contains(dir) && !produced.contains(*key)
        })
        .cloned()
        .collect();

    let mut touched_dirs: BTreeSet<PathBuf> = BTreeSet::new();
    for key in stale_files {
        let path = root.join(&key);
        if dry_run {
            summary.results.push(WriteResult::WouldRemove { path });
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&path, e)),
        }
        if let Some(parent) = path.parent() {
            touched_dirs.insert(parent.to_path_buf());
        }
        store.files.remove(&key);
        summary.results.push(WriteResult::Removed { path });
    }

    // Directories left behind by renamed resources (same id, new slug).
    // In scope even for subset writes: the resource is being written now.
    let renamed: Vec<String> = store
        .resources
        .iter()
        .filter_map(|(id, old_dir)| {
            let new_dir = tree.resources.get(id)?;
            (old_dir != new_dir).then(|| old_dir.clone())
        })
        .collect();
    for dir in renamed {
        remove_resource_dir(root, &dir, store, summary, dry_run)?;
    }

    // Whole directories of resources that vanished — full writes only.
    if scope == WriteScope::Full {
        let gone: Vec<(String, String)> = store
            .resources
            .iter()
            .filter(|(id, _)| !tree.resources.contains_key(*id))
            .map(|(id, dir)| (id.clone(), dir.clone()))
            .collect();
        for (id, dir) in gone {
            remove_resource_dir(root, &dir, store, summary, dry_run)?;
            if !dry_run {
                store.resources.remove(&id);
            }
        }
    }

    if !dry_run {
        // Drop now-empty nodes/ and tests/ subdirectories.
        for dir in touched_dirs {
            let _ = std::fs::remove_dir(dir);
        }
        for (id, dir) in &tree.resources {
            store.resources.insert(id.clone(), dir.clone());
        }
    }
    Ok(())
}

fn remove_resource_dir(
    root: &Path,
    dir: &str,
    store: &mut Manifest,
    summary: &mut WriteSummary,
    dry_run: bool,
) -> Result<(), FileError> {
    let path = root.join(dir);
    if dry_run {
        summary.results.push(WriteResult::WouldRemove { path });
        return Ok(());
    }
    if path.exists() {
        std::fs::remove_dir_all(&path).map_err(|e| io_err(&path, e))?;
    }
    store.files.retain(|key, _| top_level_dir(key) != Some(dir));
    summary.results.push(WriteResult::Removed { path });
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Manifest keys are forward-slash relative paths, stable across platforms.
fn manifest_key(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

fn top_level_dir(key: &str) -> Option<&str> {
    let (dir, rest) = key.split_once('/')?;
    if rest.is_empty() {
        None
    } else {
        Some(dir)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
