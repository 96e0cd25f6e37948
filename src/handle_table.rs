//! Bidirectional file-handle table: opaque handle <-> canonical path, confined
//! to one export root.
//!
//! This is a standalone companion to [`crate::vfs::NFSFileSystem`]'s own
//! `id_to_fh`/`fh_to_id` scheme. That trait lets a backend mint its own
//! fileid-based handles (a mirror filesystem keyed by inode, a pure in-memory
//! tree keyed by an index, ...); this table instead gives the server a
//! path-based handle issuance layer in front of *any* backend, for callers
//! that want handles tied to canonical paths rather than a backend's own
//! identifier space - e.g. export-root confinement and "has this path been
//! removed since the client cached its handle" staleness detection that
//! should hold regardless of which `NFSFileSystem` implementation is mounted.
//!
//! Grounded on `include/simple_nfsd/filesystem_manager.hpp`'s
//! `FilesystemManager` handle table (`createFileHandle`/`getFileHandle`/
//! `validateFileHandle`/`releaseFileHandle`, plus `isPathWithinExport`), and
//! on `vfs.rs`'s own generation-number staleness trick (a handle minted by a
//! previous server generation is `Stale`, not just `BadHandle`).

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Opaque 16-byte handle: an 8-byte server generation followed by an 8-byte
/// per-path id, in the same little-endian layout `vfs.rs` uses for its own
/// fileid-based handles.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileHandle {
    pub generation: u64,
    pub id: u64,
}

impl FileHandle {
    pub fn to_bytes(self) -> [u8; 16] {
        let mut out = [0_u8; 16];
        out[..8].copy_from_slice(&self.generation.to_le_bytes());
        out[8..].copy_from_slice(&self.id.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 16 {
            return None;
        }
        Some(Self {
            generation: u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            id: u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandleError {
    /// The handle's generation doesn't match this server instance: it was
    /// minted before a restart and must be treated as permanently invalid.
    Stale,
    /// The handle is malformed or refers to an id this table never issued.
    BadHandle,
    /// The requested path resolves outside the export root.
    NotExported,
}

/// Maps paths within one export root to stable opaque handles and back.
pub struct FileHandleTable {
    generation: u64,
    export_root: PathBuf,
    next_id: AtomicU64,
    by_id: RwLock<HashMap<u64, PathBuf>>,
    by_path: RwLock<HashMap<PathBuf, u64>>,
}

impl FileHandleTable {
    pub fn new(export_root: impl Into<PathBuf>, generation: u64) -> Self {
        Self {
            generation,
            export_root: export_root.into(),
            next_id: AtomicU64::new(1),
            by_id: RwLock::new(HashMap::new()),
            by_path: RwLock::new(HashMap::new()),
        }
    }

    /// Normalizes `path` (resolving `.`/`..` lexically, without touching the
    /// filesystem) and confirms the result stays within the export root.
    /// Returns the canonical path relative to the export root.
    pub fn sanitize(&self, path: &Path) -> Result<PathBuf, HandleError> {
        let mut stack: Vec<Component> = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(_) => stack.push(component),
                Component::ParentDir => {
                    if stack.pop().is_none() {
                        // ".." past the export root
                        return Err(HandleError::NotExported);
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        let mut normalized = PathBuf::new();
        for component in stack {
            normalized.push(component);
        }
        Ok(normalized)
    }

    /// Issues (or reuses) a handle for `path`, confined to the export root.
    pub fn handle_for_path(&self, path: &Path) -> Result<FileHandle, HandleError> {
        let path = self.sanitize(path)?;
        if let Some(&id) = self.by_path.read().expect("handle table poisoned").get(&path) {
            return Ok(FileHandle { generation: self.generation, id });
        }
        let mut by_path = self.by_path.write().expect("handle table poisoned");
        // Re-check after acquiring the write lock in case of a concurrent insert.
        if let Some(&id) = by_path.get(&path) {
            return Ok(FileHandle { generation: self.generation, id });
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        by_path.insert(path.clone(), id);
        self.by_id.write().expect("handle table poisoned").insert(id, path);
        Ok(FileHandle { generation: self.generation, id })
    }

    /// Resolves a handle back to its canonical path, failing with `Stale` if
    /// it was minted by a previous server generation and `BadHandle` if this
    /// table never issued it (or it was released via `forget`).
    pub fn path_for_handle(&self, handle: FileHandle) -> Result<PathBuf, HandleError> {
        if handle.generation != self.generation {
            return Err(HandleError::Stale);
        }
        self.by_id
            .read()
            .expect("handle table poisoned")
            .get(&handle.id)
            .cloned()
            .ok_or(HandleError::BadHandle)
    }

    /// Drops the mapping for `path` (and its handle), e.g. after unlink or
    /// rename, so a client still holding the old handle gets `BadHandle`
    /// rather than being handed data for an unrelated, later-created path
    /// that happens to reuse the same backend fileid.
    pub fn forget(&self, path: &Path) {
        let Ok(path) = self.sanitize(path) else { return };
        let mut by_path = self.by_path.write().expect("handle table poisoned");
        if let Some(id) = by_path.remove(&path) {
            self.by_id.write().expect("handle table poisoned").remove(&id);
        }
    }

    /// Updates the table's record of a path after it's renamed, so its
    /// existing handle keeps resolving instead of going stale.
    pub fn rename(&self, from: &Path, to: &Path) -> Result<(), HandleError> {
        let from = self.sanitize(from)?;
        let to = self.sanitize(to)?;
        let mut by_path = self.by_path.write().expect("handle table poisoned");
        let Some(id) = by_path.remove(&from) else { return Ok(()) };
        by_path.insert(to.clone(), id);
        self.by_id.write().expect("handle table poisoned").insert(id, to);
        Ok(())
    }

    pub fn export_root(&self) -> &Path {
        &self.export_root
    }
}
