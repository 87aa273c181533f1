//! Real-FS Import (spec.md §4.8). Grounded on `rcore-fs-hostfs::HNode`:
//! a real path lazily opened on first access, converted through the
//! same `std::fs::Metadata -> vfs_core::Metadata` shape as
//! `rcore-fs/src/std.rs`'s `impl From<std::fs::Metadata> for Metadata`.
//! Unlike `HNode`, nothing here ever writes back to the real path
//! (spec.md §4.8: "the real file is never written") — a modified,
//! writable import only ever touches its in-memory cache once
//! materialized.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use vfs_core::{FsError, FsErrorKind, Result, Timespec};
use vfs_ramfs::{Content, InodeId, RealLoader, Store};

fn real_loader(path: PathBuf) -> RealLoader {
    Arc::new(move || std::fs::read(&path))
}

fn timespec_from_system_time(t: std::io::Result<std::time::SystemTime>) -> Timespec {
    match t.and_then(|t| {
        t.duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }) {
        Ok(d) => Timespec {
            sec: d.as_secs() as i64,
            nsec: d.subsec_nanos() as i32,
        },
        Err(_) => Timespec::ZERO,
    }
}

#[cfg(unix)]
fn mode_uid_gid(meta: &std::fs::Metadata) -> (u32, u32, u32) {
    use std::os::unix::fs::MetadataExt;
    (meta.mode() & 0o7777, meta.uid(), meta.gid())
}

#[cfg(not(unix))]
fn mode_uid_gid(meta: &std::fs::Metadata) -> (u32, u32, u32) {
    let mode = if meta.permissions().readonly() { 0o444 } else { 0o644 };
    (mode, 0, 0)
}

struct RealStat {
    mode: u32,
    uid: u32,
    gid: u32,
    atime: Timespec,
    mtime: Timespec,
}

fn stat_real(path: &Path) -> std::io::Result<RealStat> {
    let meta = std::fs::symlink_metadata(path)?;
    let (mode, uid, gid) = mode_uid_gid(&meta);
    Ok(RealStat {
        mode,
        uid,
        gid,
        atime: timespec_from_system_time(meta.accessed()),
        mtime: timespec_from_system_time(meta.modified()),
    })
}

/// Insert a placeholder regular-file inode referencing `real_path`;
/// its bytes are loaded (and cached) on first read.
pub fn import_file(
    store: &mut Store,
    parent: InodeId,
    name: &str,
    real_path: &Path,
    dev: u64,
    now: Timespec,
) -> Result<InodeId> {
    let stat = stat_real(real_path).map_err(FsError::from)?;
    let id = store.create_regular_file_with_content(
        Content::Lazy(real_loader(real_path.to_path_buf())),
        stat.mode,
        stat.uid,
        stat.gid,
        dev,
        now,
    );
    if let Ok(inode) = store.get_mut(id) {
        inode.atime = stat.atime;
        inode.mtime = stat.mtime;
    }
    store.insert_entry(parent, name.to_string(), id)?;
    Ok(id)
}

/// Insert a Symlink inode with the same target as the real one.
pub fn import_symlink(
    store: &mut Store,
    parent: InodeId,
    name: &str,
    real_path: &Path,
    dev: u64,
    now: Timespec,
) -> Result<InodeId> {
    let target = std::fs::read_link(real_path).map_err(FsError::from)?;
    let stat = stat_real(real_path).map_err(FsError::from)?;
    let target_bytes = target.to_string_lossy().into_owned().into_bytes();
    let id = store.create_symlink(target_bytes, stat.mode, stat.uid, stat.gid, dev, now);
    store.insert_entry(parent, name.to_string(), id)?;
    Ok(id)
}

/// Recursively insert placeholder inodes for a real directory.
/// Subdirectory entries are enumerated eagerly; file bytes stay lazy
/// (spec.md §4.8).
pub fn import_directory(
    store: &mut Store,
    parent: InodeId,
    name: &str,
    real_path: &Path,
    dev: u64,
    now: Timespec,
) -> Result<InodeId> {
    let stat = stat_real(real_path).map_err(FsError::from)?;
    let dir_id = store.create_directory(Some(parent), stat.mode | 0o111, stat.uid, stat.gid, dev, now);
    store.insert_entry(parent, name.to_string(), dir_id)?;

    let read_dir = match std::fs::read_dir(real_path) {
        Ok(rd) => rd,
        Err(e) => {
            log::warn!("vfs-hostfs: failed to enumerate {:?}: {}", real_path, e);
            return Ok(dir_id);
        }
    };
    for entry in read_dir {
        let entry = entry.map_err(FsError::from)?;
        let child_path = entry.path();
        let child_name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type().map_err(FsError::from)?;
        if file_type.is_dir() {
            import_directory(store, dir_id, &child_name, &child_path, dev, now)?;
        } else if file_type.is_symlink() {
            import_symlink(store, dir_id, &child_name, &child_path, dev, now)?;
        } else {
            import_file(store, dir_id, &child_name, &child_path, dev, now)?;
        }
    }
    Ok(dir_id)
}

/// One real path to import, and the name it should appear under in
/// the fake tree's parent directory.
pub struct RealImport<'a> {
    pub real_path: &'a Path,
    pub target_name: &'a str,
}

/// Convenience over a list of real paths (spec.md: `add_real_paths`).
/// Each import is classified by the real path's own file type.
pub fn import_paths(
    store: &mut Store,
    parent: InodeId,
    imports: &[RealImport<'_>],
    dev: u64,
    now: Timespec,
) -> Result<Vec<InodeId>> {
    let mut ids = Vec::with_capacity(imports.len());
    for import in imports {
        let file_type = std::fs::symlink_metadata(import.real_path)
            .map_err(FsError::from)?
            .file_type();
        let id = if file_type.is_dir() {
            import_directory(store, parent, import.target_name, import.real_path, dev, now)?
        } else if file_type.is_symlink() {
            import_symlink(store, parent, import.target_name, import.real_path, dev, now)?
        } else {
            import_file(store, parent, import.target_name, import.real_path, dev, now)?
        };
        ids.push(id);
    }
    Ok(ids)
}
