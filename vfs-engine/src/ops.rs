//! Operation Surface (spec.md §4.7). Each function here is the
//! emulator's counterpart of a POSIX syscall or a `pathlib`-level
//! convenience the rest of the pack's filesystems expose through their
//! `INode`/`FileSystem` trait methods (`rcore-fs/src/vfs.rs`:
//! `create`/`unlink`/`link`/`move_`/`find`/`resize`/`chmod`); collapsed
//! here into free functions over `EngineState` since there is no trait
//! boundary left to hang them on (spec.md §9).

use vfs_core::{
    FsError, FsErrorKind, Metadata, Result, Timespec, WindowsAttributes, IO_REPARSE_TAG_SYMLINK,
};
use vfs_mount::DEFAULT_WINDOWS_DRIVE_BYTES;
use vfs_ramfs::{Content, InodeId, InodeKind};

use crate::engine::EngineState;
use crate::fd::{lock_open_file, AccessMode, NewlinePolicy, OpenFile, OpenFlags};
use crate::identity::{apply_umask, Access};
use crate::resolver::{ParentLookup, Resolver};

const STICKY_BIT: u32 = 0o1000;

fn resolver(state: &EngineState) -> Resolver<'_> {
    Resolver::new(
        &state.store,
        &state.mounts,
        &state.path_engine,
        &state.identity,
        state.config.allow_root_user,
        state.config.max_symlink_depth,
        state.config.max_name_len,
        state.config.max_path_len,
    )
}

/// `Access::WRITE` on `parent`, required before inserting a new entry
/// into it (spec.md §4.5: "creation additionally requires W on the
/// parent").
fn check_creation_permission(state: &EngineState, parent: InodeId, path: &str) -> Result<()> {
    let dir = state.store.get(parent)?;
    if state
        .identity
        .check(dir.mode, dir.uid, dir.gid, Access::WRITE, state.config.allow_root_user)
    {
        Ok(())
    } else {
        Err(FsError::with_path(FsErrorKind::PermissionDenied, path))
    }
}

/// `Access::WRITE` on `parent`, plus the sticky-bit-owner rule if
/// `parent` has the sticky bit set (spec.md §4.5: "deletion requires W
/// on the parent and (on Linux) the sticky-bit-owner rule if the
/// parent has the sticky bit").
fn check_deletion_permission(state: &EngineState, parent: InodeId, entry_owner_uid: u32, path: &str) -> Result<()> {
    let dir = state.store.get(parent)?;
    if !state
        .identity
        .check(dir.mode, dir.uid, dir.gid, Access::WRITE, state.config.allow_root_user)
    {
        return Err(FsError::with_path(FsErrorKind::PermissionDenied, path));
    }
    if dir.mode & STICKY_BIT != 0
        && !state.identity.sticky_allows(dir.uid, entry_owner_uid, state.config.allow_root_user)
    {
        return Err(FsError::with_path(FsErrorKind::PermissionDenied, path));
    }
    Ok(())
}

/// On the Windows profile, referencing a previously-unseen drive
/// letter auto-creates its mount the first time a path under it is
/// resolved for creation (spec.md §4.3, §8: "mounting on a fresh drive
/// letter succeeds lazily").
fn ensure_drive_mount(state: &mut EngineState, path: &str) {
    if !state.config.os.is_windows() {
        return;
    }
    let (drive, _) = state.path_engine.split_drive(path);
    // UNC shares (`\\server\share`) aren't drive letters; only `X:`
    // gets lazily auto-mounted.
    if drive.len() != 2 || !drive.ends_with(':') {
        return;
    }
    let drive_root = format!("{}{}", drive, state.path_engine.separator);
    if state.mounts.mount_for(&state.path_engine, &drive_root).is_some() {
        return;
    }
    let now = now(state);
    let uid = state.config.uid;
    let gid = state.config.gid;
    let root = state.store.create_directory(None, 0o755, uid, gid, 0, now);
    state.mounts.add_mount(drive_root, root, DEFAULT_WINDOWS_DRIVE_BYTES, None);
}

pub(crate) fn resolve_parent(state: &EngineState, path: &str) -> Result<ParentLookup> {
    resolver(state).resolve_parent(path)
}

pub(crate) fn device_for(state: &EngineState, path: &str) -> Result<u64> {
    resolver(state).resolve_with_device(path, true).map(|(_, d)| d)
}

fn now(state: &mut EngineState) -> Timespec {
    state.now()
}

fn metadata_for(state: &EngineState, id: InodeId, device: u64) -> Result<Metadata> {
    let inode = state.store.get(id)?;
    let nlinks = if inode.is_dir() {
        let dir = inode.as_dir().unwrap();
        let child_dirs = dir
            .entries
            .values()
            .filter(|&&c| state.store.get(c).map(|i| i.is_dir()).unwrap_or(false))
            .count();
        2 + child_dirs as u64
    } else {
        inode.nlink
    };
    let is_symlink = matches!(inode.kind, InodeKind::Symlink(_));
    let windows_attributes = WindowsAttributes {
        directory: inode.is_dir(),
        readonly: inode.mode & 0o200 == 0,
        reparse_point: is_symlink,
    };
    let reparse_tag = if is_symlink { Some(IO_REPARSE_TAG_SYMLINK) } else { None };
    Ok(Metadata {
        dev: device,
        inode: id,
        size: inode.size(),
        atime: inode.atime,
        mtime: inode.mtime,
        ctime: inode.ctime,
        birthtime: inode.birthtime,
        type_: inode.kind.file_type(),
        mode: inode.mode,
        nlinks,
        uid: inode.uid,
        gid: inode.gid,
        windows_attributes,
        reparse_tag,
    })
}

/// Create every missing directory component on the way to `path`'s
/// parent, mirroring `os.makedirs`'s `exist_ok` behavior for
/// intermediate components (spec.md §4.7: `create_missing_parents`).
///
/// Walks upward from `path`'s parent via `dirname` until it reaches an
/// ancestor that already resolves (at worst the owning mount's root),
/// then creates the missing ancestors top-down. This sidesteps the
/// drive-letter/root markers `components()` would otherwise hand back
/// as spurious intermediate path segments on Windows.
fn ensure_parent_dirs(state: &mut EngineState, path: &str) -> Result<()> {
    ensure_drive_mount(state, path);
    let mut missing = Vec::new();
    let mut probe = state.path_engine.dirname(path);
    loop {
        if resolver(state).resolve(&probe, true).is_ok() {
            break;
        }
        let parent = state.path_engine.dirname(&probe);
        if parent == probe {
            return Err(FsError::with_path(FsErrorKind::NotFound, path));
        }
        missing.push(probe);
        probe = parent;
    }
    for dir in missing.into_iter().rev() {
        let lookup = resolver(state).resolve_parent(&dir)?;
        if lookup.existing.is_some() {
            continue;
        }
        check_creation_permission(state, lookup.parent, &dir)?;
        let now = now(state);
        let uid = state.config.uid;
        let gid = state.config.gid;
        let id = state.store.create_directory(Some(lookup.parent), 0o777, uid, gid, lookup.device, now);
        state.store.insert_entry(lookup.parent, lookup.name, id)?;
    }
    Ok(())
}

pub(crate) fn create_dir(
    state: &mut EngineState,
    path: &str,
    mode: u32,
    create_missing_parents: bool,
) -> Result<InodeId> {
    ensure_drive_mount(state, path);
    if create_missing_parents {
        ensure_parent_dirs(state, path)?;
    }
    let lookup = resolver(state).resolve_parent(path)?;
    if lookup.existing.is_some() {
        return Err(FsError::with_path(FsErrorKind::Exists, path));
    }
    check_creation_permission(state, lookup.parent, path)?;
    let now = now(state);
    let effective_mode = apply_umask(mode, state.config.umask);
    let uid = state.config.uid;
    let gid = state.config.gid;
    let id = state
        .store
        .create_directory(Some(lookup.parent), effective_mode, uid, gid, lookup.device, now);
    state.store.insert_entry(lookup.parent, lookup.name, id)?;
    Ok(id)
}

pub(crate) fn create_file(
    state: &mut EngineState,
    path: &str,
    contents: Option<Vec<u8>>,
    st_size: Option<u64>,
    mode: u32,
    create_missing_parents: bool,
) -> Result<InodeId> {
    ensure_drive_mount(state, path);
    if create_missing_parents {
        ensure_parent_dirs(state, path)?;
    }
    let lookup = resolver(state).resolve_parent(path)?;
    if lookup.existing.is_some() {
        return Err(FsError::with_path(FsErrorKind::Exists, path));
    }
    check_creation_permission(state, lookup.parent, path)?;
    let content = match (contents, st_size) {
        (Some(bytes), _) => Content::Eager(bytes),
        (None, Some(size)) => Content::Phantom(size),
        (None, None) => Content::Eager(Vec::new()),
    };
    let size = match &content {
        Content::Eager(v) => v.len() as u64,
        Content::Phantom(n) => *n,
        Content::Lazy(_) => 0,
    };
    state.mounts.change_disk_usage(lookup.device, size as i64)?;
    let now = now(state);
    let effective_mode = apply_umask(mode, state.config.umask);
    let uid = state.config.uid;
    let gid = state.config.gid;
    let id = state
        .store
        .create_regular_file_with_content(content, effective_mode, uid, gid, lookup.device, now);
    state.store.insert_entry(lookup.parent, lookup.name, id)?;
    Ok(id)
}

pub(crate) fn create_symlink(
    state: &mut EngineState,
    path: &str,
    target: &str,
    create_missing_parents: bool,
) -> Result<InodeId> {
    ensure_drive_mount(state, path);
    if create_missing_parents {
        ensure_parent_dirs(state, path)?;
    }
    let lookup = resolver(state).resolve_parent(path)?;
    if lookup.existing.is_some() {
        return Err(FsError::with_path(FsErrorKind::Exists, path));
    }
    check_creation_permission(state, lookup.parent, path)?;
    let now = now(state);
    let uid = state.config.uid;
    let gid = state.config.gid;
    let id = state
        .store
        .create_symlink(target.as_bytes().to_vec(), 0o777, uid, gid, lookup.device, now);
    state.store.insert_entry(lookup.parent, lookup.name, id)?;
    Ok(id)
}

/// Hard-link `path` to the already-existing file at `target_path`
/// (spec.md §4.7: `create_link`). Directories can never be hard-linked
/// (spec.md §4.2).
pub(crate) fn create_link(
    state: &mut EngineState,
    path: &str,
    target_path: &str,
    create_missing_parents: bool,
) -> Result<InodeId> {
    let (target_id, target_device) = resolver(state).resolve_with_device(target_path, false)?;
    if state.store.get(target_id)?.is_dir() {
        return Err(FsError::with_path(FsErrorKind::PermissionDenied, target_path));
    }
    ensure_drive_mount(state, path);
    if create_missing_parents {
        ensure_parent_dirs(state, path)?;
    }
    let lookup = resolver(state).resolve_parent(path)?;
    if lookup.existing.is_some() {
        return Err(FsError::with_path(FsErrorKind::Exists, path));
    }
    if lookup.device != target_device {
        return Err(FsError::with_path(FsErrorKind::CrossDevice, path));
    }
    check_creation_permission(state, lookup.parent, path)?;
    state.store.bump_nlink(target_id)?;
    state.store.insert_entry(lookup.parent, lookup.name, target_id)?;
    Ok(target_id)
}

pub(crate) fn stat(state: &EngineState, path: &str, follow_symlinks: bool) -> Result<Metadata> {
    let (id, device) = resolver(state).resolve_with_device(path, follow_symlinks)?;
    metadata_for(state, id, device)
}

pub(crate) fn chmod(state: &mut EngineState, path: &str, mode: u32, follow_symlinks: bool) -> Result<()> {
    let (id, _) = resolver(state).resolve_with_device(path, follow_symlinks)?;
    let clamp_to_windows = state.config.os.is_windows() && !state.config.force_unix_mode;
    let now = now(state);
    let inode = state.store.get_mut(id)?;
    inode.mode = if clamp_to_windows {
        // Real NTFS ACLs can't be expressed through POSIX bits; only
        // the owner-write bit reflects the request, read/execute stay
        // set so the entry never loses readability (spec.md §4.5).
        let base = inode.mode | 0o555;
        if mode & 0o200 != 0 {
            base | 0o200
        } else {
            base & !0o200
        }
    } else {
        mode & 0o7777
    };
    inode.ctime = now;
    Ok(())
}

pub(crate) fn chown(state: &mut EngineState, path: &str, uid: u32, gid: u32, follow_symlinks: bool) -> Result<()> {
    let (id, _) = resolver(state).resolve_with_device(path, follow_symlinks)?;
    let now = now(state);
    let inode = state.store.get_mut(id)?;
    inode.uid = uid;
    inode.gid = gid;
    inode.ctime = now;
    Ok(())
}

pub(crate) fn utime(state: &mut EngineState, path: &str, atime: Timespec, mtime: Timespec) -> Result<()> {
    let (id, _) = resolver(state).resolve_with_device(path, true)?;
    let inode = state.store.get_mut(id)?;
    inode.atime = atime;
    inode.mtime = mtime;
    Ok(())
}

pub(crate) fn readlink(state: &EngineState, path: &str) -> Result<String> {
    let id = resolver(state).resolve(path, false)?;
    let inode = state.store.get(id)?;
    match inode.symlink_target() {
        Some(target) => Ok(String::from_utf8_lossy(target).into_owned()),
        None => Err(FsError::with_path(FsErrorKind::InvalidArgument, path)),
    }
}

/// Release `id`'s storage once nlink hits zero and no descriptor holds
/// it open (spec.md invariant 7).
fn maybe_destroy(state: &mut EngineState, id: InodeId, device: u64) -> Result<()> {
    let (nlink, size) = {
        let inode = state.store.get(id)?;
        (inode.nlink, inode.size())
    };
    if nlink == 0 && state.fds.open_count(id) == 0 {
        state.mounts.change_disk_usage(device, -(size as i64)).ok();
        state.store.destroy(id);
    }
    Ok(())
}

pub(crate) fn unlink(state: &mut EngineState, path: &str) -> Result<()> {
    let lookup = resolver(state).resolve_parent(path)?;
    let id = lookup
        .existing
        .ok_or_else(|| FsError::with_path(FsErrorKind::NotFound, path))?;
    let owner_uid = state.store.get(id)?.uid;
    if state.store.get(id)?.is_dir() {
        return Err(FsError::with_path(FsErrorKind::IsADir, path));
    }
    check_deletion_permission(state, lookup.parent, owner_uid, path)?;
    state.store.remove_entry(lookup.parent, &lookup.name)?;
    let remaining = state.store.drop_nlink(id)?;
    if remaining == 0 {
        maybe_destroy(state, id, lookup.device)?;
    }
    Ok(())
}

pub(crate) fn rmdir(state: &mut EngineState, path: &str, allow_non_empty: bool) -> Result<()> {
    let lookup = resolver(state).resolve_parent(path)?;
    let id = lookup
        .existing
        .ok_or_else(|| FsError::with_path(FsErrorKind::NotFound, path))?;
    let inode = state.store.get(id)?;
    if !inode.is_dir() {
        return Err(FsError::with_path(FsErrorKind::NotADir, path));
    }
    if !allow_non_empty && !inode.as_dir().unwrap().is_empty() {
        return Err(FsError::with_path(FsErrorKind::NotEmpty, path));
    }
    check_deletion_permission(state, lookup.parent, inode.uid, path)?;
    state.store.remove_entry(lookup.parent, &lookup.name)?;
    state.store.drop_nlink(id)?;
    state.store.destroy(id);
    Ok(())
}

pub(crate) fn truncate(state: &mut EngineState, path: &str, length: u64) -> Result<()> {
    let (id, device) = resolver(state).resolve_with_device(path, true)?;
    let now = now(state);
    let old_size = state.store.get(id)?.size();
    let delta = length as i64 - old_size as i64;
    if delta > 0 {
        state.mounts.change_disk_usage(device, delta)?;
    }
    let inode = state.store.get_mut(id)?;
    let file = inode
        .as_file_mut()
        .ok_or_else(|| FsError::with_path(FsErrorKind::IsADir, path))?;
    file.materialize().map_err(FsError::from)?;
    if let Content::Eager(bytes) = &mut file.content {
        bytes.resize(length as usize, 0);
    }
    inode.mtime = now;
    inode.ctime = now;
    if delta < 0 {
        state.mounts.change_disk_usage(device, delta).ok();
    }
    Ok(())
}

/// POSIX `rename(2)` semantics: an existing directory destination must
/// be empty, an existing file destination is replaced atomically, and
/// crossing mount boundaries is rejected (spec.md §4.7).
pub(crate) fn rename(state: &mut EngineState, src: &str, dst: &str) -> Result<()> {
    let src_lookup = resolver(state).resolve_parent(src)?;
    let src_id = src_lookup
        .existing
        .ok_or_else(|| FsError::with_path(FsErrorKind::NotFound, src))?;
    let dst_lookup = resolver(state).resolve_parent(dst)?;
    if src_lookup.device != dst_lookup.device {
        return Err(FsError::with_path(FsErrorKind::CrossDevice, dst));
    }
    let src_owner_uid = state.store.get(src_id)?.uid;
    check_deletion_permission(state, src_lookup.parent, src_owner_uid, src)?;
    let src_is_dir = state.store.get(src_id)?.is_dir();
    if let Some(dst_id) = dst_lookup.existing {
        if dst_id == src_id {
            return Ok(());
        }
        let dst_is_dir = state.store.get(dst_id)?.is_dir();
        if src_is_dir && !dst_is_dir {
            return Err(FsError::with_path(FsErrorKind::NotADir, dst));
        }
        if !src_is_dir && dst_is_dir {
            return Err(FsError::with_path(FsErrorKind::IsADir, dst));
        }
        if dst_is_dir && !state.store.get(dst_id)?.as_dir().unwrap().is_empty() {
            return Err(FsError::with_path(FsErrorKind::NotEmpty, dst));
        }
        let dst_owner_uid = state.store.get(dst_id)?.uid;
        check_deletion_permission(state, dst_lookup.parent, dst_owner_uid, dst)?;
        state.store.remove_entry(dst_lookup.parent, &dst_lookup.name)?;
        let remaining = state.store.drop_nlink(dst_id)?;
        if remaining == 0 {
            maybe_destroy(state, dst_id, dst_lookup.device)?;
        }
    } else {
        check_creation_permission(state, dst_lookup.parent, dst)?;
    }
    state.store.remove_entry(src_lookup.parent, &src_lookup.name)?;
    state.store.insert_entry(dst_lookup.parent, dst_lookup.name, src_id)?;
    if src_is_dir {
        if let Some(dir) = state.store.get_mut(src_id)?.as_dir_mut() {
            dir.parent = Some(dst_lookup.parent);
        }
    }
    let now = now(state);
    state.store.get_mut(src_id)?.ctime = now;
    Ok(())
}

pub(crate) fn access(state: &EngineState, path: &str, want: Access) -> bool {
    let (id, _) = match resolver(state).resolve_with_device(path, true) {
        Ok(v) => v,
        Err(_) => return false,
    };
    let inode = match state.store.get(id) {
        Ok(i) => i,
        Err(_) => return false,
    };
    state
        .identity
        .check(inode.mode, inode.uid, inode.gid, want, state.config.allow_root_user)
}

pub(crate) fn listdir(state: &EngineState, path: &str) -> Result<Vec<String>> {
    let id = resolver(state).resolve(path, true)?;
    let inode = state.store.get(id)?;
    let dir = inode
        .as_dir()
        .ok_or_else(|| FsError::with_path(FsErrorKind::NotADir, path))?;
    if state.config.shuffle_listdir_results {
        Ok(dir.names_shuffled())
    } else {
        Ok(dir.names_in_order())
    }
}

/// `os.walk`-style traversal: `(dirpath, subdirs, files)` for `path`
/// itself and every nested directory, top-down.
pub(crate) fn walk(state: &EngineState, path: &str) -> Result<Vec<(String, Vec<String>, Vec<String>)>> {
    let root_id = resolver(state).resolve(path, true)?;
    let mut results = Vec::new();
    let mut stack = vec![(path.to_string(), root_id)];
    while let Some((dirpath, id)) = stack.pop() {
        let inode = state.store.get(id)?;
        let dir = match inode.as_dir() {
            Some(d) => d,
            None => continue,
        };
        let mut subdirs = Vec::new();
        let mut files = Vec::new();
        let mut children = Vec::new();
        for name in dir.names_in_order() {
            let child_id = dir.get(&name).unwrap();
            let child = state.store.get(child_id)?;
            if child.is_dir() {
                subdirs.push(name.clone());
                children.push((state.path_engine.join(&dirpath, &name), child_id));
            } else {
                files.push(name);
            }
        }
        results.push((dirpath, subdirs, files));
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
    Ok(results)
}

fn check_open_permission(state: &EngineState, inode_mode: u32, owner_uid: u32, owner_gid: u32, access: AccessMode) -> Result<()> {
    let want = match access {
        AccessMode::ReadOnly => Access::READ,
        AccessMode::WriteOnly => Access::WRITE,
        AccessMode::ReadWrite => Access::READ | Access::WRITE,
    };
    if state
        .identity
        .check(inode_mode, owner_uid, owner_gid, want, state.config.allow_root_user)
    {
        Ok(())
    } else {
        Err(FsErrorKind::PermissionDenied.into())
    }
}

pub(crate) fn open(
    state: &mut EngineState,
    path: &str,
    access: AccessMode,
    flags: OpenFlags,
    mode: u32,
    newline: NewlinePolicy,
) -> Result<i32> {
    let lookup = resolver(state).resolve_parent(path)?;
    let follow_final_symlink = !flags.contains(OpenFlags::NOFOLLOW);
    let id = match lookup.existing {
        Some(raw_id) => {
            if flags.contains(OpenFlags::CREATE) && flags.contains(OpenFlags::EXCL) {
                return Err(FsError::with_path(FsErrorKind::Exists, path));
            }
            // `resolve_parent` hands back the raw directory entry without
            // following a symlink in final position; do that separately
            // so a chain (including a self-referential one) is actually
            // walked and can surface `LinkLoop` (spec.md §4.4, S5).
            let is_symlink = matches!(state.store.get(raw_id)?.kind, InodeKind::Symlink(_));
            let id = if is_symlink && follow_final_symlink {
                resolver(state).resolve(path, true)?
            } else {
                raw_id
            };
            if state.store.get(id)?.is_dir() {
                return Err(FsError::with_path(FsErrorKind::IsADir, path));
            }
            id
        }
        None => {
            if !flags.contains(OpenFlags::CREATE) {
                return Err(FsError::with_path(FsErrorKind::NotFound, path));
            }
            let now = now(state);
            let effective_mode = apply_umask(mode, state.config.umask);
            let uid = state.config.uid;
            let gid = state.config.gid;
            let new_id =
                state
                    .store
                    .create_regular_file(effective_mode, uid, gid, lookup.device, now);
            state.store.insert_entry(lookup.parent, lookup.name.clone(), new_id)?;
            new_id
        }
    };

    {
        let inode = state.store.get(id)?;
        check_open_permission(state, inode.mode, inode.uid, inode.gid, access)?;
    }

    if flags.contains(OpenFlags::TRUNC) && access.writable() {
        let inode = state.store.get_mut(id)?;
        if let Some(file) = inode.as_file_mut() {
            file.materialize().map_err(FsError::from)?;
            file.content = Content::Eager(Vec::new());
        }
    }

    let offset = if flags.contains(OpenFlags::APPEND) {
        state.store.get(id)?.size()
    } else {
        0
    };

    let encoding = match &state.store.get(id)?.kind {
        InodeKind::RegularFile(file) => file.encoding_hint.clone().unwrap_or_else(|| "utf-8".to_string()),
        _ => "utf-8".to_string(),
    };

    let open_file = OpenFile {
        inode: id,
        access,
        flags,
        offset,
        newline,
        encoding,
        closed: false,
    };
    Ok(state.fds.insert(open_file))
}

pub(crate) fn close(state: &mut EngineState, fd: i32) -> Result<()> {
    let id = state.fds.close(fd)?;
    if let Ok(inode) = state.store.get(id) {
        let device = inode.dev;
        if inode.nlink == 0 {
            maybe_destroy(state, id, device)?;
        }
    }
    Ok(())
}

/// Universal-newline decoding for text-mode reads (spec.md §4.6):
/// `\r\n` and a bare `\r` both collapse to `\n`.
fn decode_universal_newlines(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                out.push(b'\n');
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    out
}

/// Host-native line-ending encoding for text-mode writes (spec.md
/// §4.6): `\n` becomes `\r\n` under the Windows profile, unchanged
/// elsewhere.
fn encode_universal_newlines(state: &EngineState, data: &[u8]) -> Vec<u8> {
    if !state.config.os.is_windows() {
        return data.to_vec();
    }
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        if b == b'\n' {
            out.push(b'\r');
        }
        out.push(b);
    }
    out
}

pub(crate) fn read(state: &mut EngineState, fd: i32, max_len: usize) -> Result<Vec<u8>> {
    let shared = state.fds.get(fd)?;
    let (id, newline) = {
        let open_file = lock_open_file(&shared);
        if !open_file.access.readable() {
            return Err(FsErrorKind::PermissionDenied.into());
        }
        (open_file.inode, open_file.newline)
    };
    let inode = state.store.get_mut(id)?;
    let file = inode.as_file_mut().ok_or_else(|| FsError::from(FsErrorKind::IsADir))?;
    file.materialize().map_err(FsError::from)?;
    let bytes = file.as_bytes();
    let mut open_file = lock_open_file(&shared);
    let start = (open_file.offset as usize).min(bytes.len());
    let end = (start + max_len).min(bytes.len());
    let raw = bytes[start..end].to_vec();
    open_file.offset = end as u64;
    drop(open_file);
    let now = now(state);
    state.store.get_mut(id)?.atime = now;
    let chunk = match newline {
        NewlinePolicy::Universal => decode_universal_newlines(&raw),
        NewlinePolicy::Binary => raw,
    };
    Ok(chunk)
}

pub(crate) fn write(state: &mut EngineState, fd: i32, data: &[u8]) -> Result<usize> {
    let shared = state.fds.get(fd)?;
    let (id, append, mut offset, newline) = {
        let open_file = lock_open_file(&shared);
        if !open_file.access.writable() {
            return Err(FsErrorKind::PermissionDenied.into());
        }
        (open_file.inode, open_file.append_mode(), open_file.offset, open_file.newline)
    };
    let input_len = data.len();
    let encoded = match newline {
        NewlinePolicy::Universal => encode_universal_newlines(state, data),
        NewlinePolicy::Binary => data.to_vec(),
    };
    let data = encoded.as_slice();
    let device = state.store.get(id)?.dev;

    {
        let inode = state.store.get_mut(id)?;
        let file = inode.as_file_mut().ok_or_else(|| FsError::from(FsErrorKind::IsADir))?;
        file.materialize().map_err(FsError::from)?;
    }

    let old_size = state.store.get(id)?.size();
    if append {
        offset = old_size;
    }
    let new_end = offset + data.len() as u64;
    let delta = new_end as i64 - old_size as i64;
    // Quota is checked, and the whole write rejected, before any bytes
    // are committed (spec.md §4.6/§9: no partial writes on disk-full).
    if delta > 0 {
        state.mounts.change_disk_usage(device, delta)?;
    }

    let now = now(state);
    let inode = state.store.get_mut(id)?;
    let file = inode.as_file_mut().unwrap();
    if let Content::Eager(bytes) = &mut file.content {
        if bytes.len() < new_end as usize {
            bytes.resize(new_end as usize, 0);
        }
        bytes[offset as usize..new_end as usize].copy_from_slice(data);
    }
    inode.mtime = now;
    inode.ctime = now;
    lock_open_file(&shared).offset = new_end;
    Ok(input_len)
}

pub(crate) fn seek(state: &mut EngineState, fd: i32, offset: i64, from_end: bool, from_current: bool) -> Result<u64> {
    let shared = state.fds.get(fd)?;
    let id = lock_open_file(&shared).inode;
    let size = state.store.get(id)?.size();
    let mut open_file = lock_open_file(&shared);
    let base = if from_end {
        size as i64
    } else if from_current {
        open_file.offset as i64
    } else {
        0
    };
    let new_offset = base + offset;
    if new_offset < 0 {
        return Err(FsErrorKind::InvalidArgument.into());
    }
    open_file.offset = new_offset as u64;
    Ok(open_file.offset)
}
