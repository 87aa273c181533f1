//! Path Resolution (spec.md §4.4). Grounded on `rcore-fs-mountfs`'s
//! `path_split`/mountpoint-crossing lookup loop, adapted from "hop to
//! the child filesystem's root `INode` at a mountpoint" to "hop to the
//! covering `Mount`'s root `InodeId` in the shared arena" since every
//! mount here shares one `vfs-ramfs::Store`.

use vfs_core::{FsError, FsErrorKind, PathEngine, Result};
use vfs_mount::MountTable;
use vfs_ramfs::{InodeId, InodeKind, Store};

use crate::identity::{Access, Identity};

pub struct Resolver<'a> {
    pub store: &'a Store,
    pub mounts: &'a MountTable,
    pub path_engine: &'a PathEngine,
    pub identity: &'a Identity,
    pub allow_root: bool,
    pub max_symlink_depth: u32,
    pub max_name_len: usize,
    pub max_path_len: usize,
}

/// Result of resolving a path down to its parent directory, for
/// operations that create or replace the final component
/// (spec.md §4.7: `mkdir`, `create_file`, `rename`'s destination...).
pub struct ParentLookup {
    pub parent: InodeId,
    pub device: u64,
    pub name: String,
    pub existing: Option<InodeId>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        store: &'a Store,
        mounts: &'a MountTable,
        path_engine: &'a PathEngine,
        identity: &'a Identity,
        allow_root: bool,
        max_symlink_depth: u32,
        max_name_len: usize,
        max_path_len: usize,
    ) -> Self {
        Resolver {
            store,
            mounts,
            path_engine,
            identity,
            allow_root,
            max_symlink_depth,
            max_name_len,
            max_path_len,
        }
    }

    /// `Access::EXECUTE` on `dir`, required before searching it for the
    /// next path component (spec.md §4.5: "Directory traversal
    /// requires X on every intermediate directory").
    fn check_traversal(&self, dir: &vfs_ramfs::Inode, path: &str) -> Result<()> {
        if self.identity.check(dir.mode, dir.uid, dir.gid, Access::EXECUTE, self.allow_root) {
            Ok(())
        } else {
            Err(FsError::with_path(FsErrorKind::PermissionDenied, path))
        }
    }

    /// Resolve `path` to an inode. `follow_final_symlink` controls
    /// whether a symlink in the final position is followed (`stat`)
    /// or returned as-is (`lstat`).
    pub fn resolve(&self, path: &str, follow_final_symlink: bool) -> Result<InodeId> {
        self.resolve_at_depth(path, follow_final_symlink, 0).map(|(id, _)| id)
    }

    /// Resolve `path` to an inode together with the device id of the
    /// mount that finally owns it (which may differ from the mount
    /// covering `path` textually, if a symlink crossed a mountpoint).
    pub fn resolve_with_device(&self, path: &str, follow_final_symlink: bool) -> Result<(InodeId, u64)> {
        self.resolve_at_depth(path, follow_final_symlink, 0)
    }

    /// Resolve `path`'s parent directory, validating the final
    /// component's length but not requiring it to already exist.
    pub fn resolve_parent(&self, path: &str) -> Result<ParentLookup> {
        let normalized = self.path_engine.normpath(path);
        let (head, tail) = self.path_engine.split(&normalized);
        if tail.is_empty() || tail == "." || tail == ".." {
            return Err(FsError::with_path(FsErrorKind::InvalidArgument, path));
        }
        if tail.len() > self.max_name_len {
            return Err(FsError::with_path(FsErrorKind::NameTooLong, path));
        }
        let (parent, device) = self.resolve_at_depth(&head, true, 0)?;
        let parent_inode = self.store.get(parent)?;
        self.check_traversal(parent_inode, path)?;
        let dir = parent_inode
            .as_dir()
            .ok_or_else(|| FsError::with_path(FsErrorKind::NotADir, path))?;
        let existing = if self.path_engine.case_sensitive {
            dir.get(tail)
        } else {
            dir.get_case_insensitive(|s| self.path_engine.fold_case(s), tail)
        };
        Ok(ParentLookup {
            parent,
            device,
            name: tail.to_string(),
            existing,
        })
    }

    fn resolve_at_depth(&self, path: &str, follow_final_symlink: bool, depth: u32) -> Result<(InodeId, u64)> {
        if depth > self.max_symlink_depth {
            return Err(FsError::with_path(FsErrorKind::LinkLoop, path));
        }
        if path.len() > self.max_path_len {
            return Err(FsError::with_path(FsErrorKind::NameTooLong, path));
        }
        let normalized = self.path_engine.normpath(path);
        let (mount, relative) = self
            .mounts
            .mount_for(self.path_engine, &normalized)
            .ok_or_else(|| FsError::with_path(FsErrorKind::NotFound, path))?;

        let components: Vec<String> = relative
            .split(self.path_engine.separator)
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();

        let mut current = mount.root_inode;
        let mut current_device = mount.device_id;
        let mut logical = mount.path.clone();

        let last_index = components.len().checked_sub(1);
        for (i, comp) in components.iter().enumerate() {
            if comp.len() > self.max_name_len {
                return Err(FsError::with_path(FsErrorKind::NameTooLong, path));
            }
            let current_inode = self.store.get(current)?;
            let dir = current_inode
                .as_dir()
                .ok_or_else(|| FsError::with_path(FsErrorKind::NotADir, path))?;
            self.check_traversal(current_inode, path)?;
            let child = if self.path_engine.case_sensitive {
                dir.get(comp)
            } else {
                dir.get_case_insensitive(|s| self.path_engine.fold_case(s), comp)
            }
            .ok_or_else(|| FsError::with_path(FsErrorKind::NotFound, path))?;

            logical = self.path_engine.join(&logical, comp);
            let is_last = Some(i) == last_index;
            let child_inode = self.store.get(child)?;

            if let InodeKind::Symlink(target) = &child_inode.kind {
                if is_last && !follow_final_symlink {
                    current = child;
                    continue;
                }
                let target_str = String::from_utf8_lossy(target).into_owned();
                let next = if self.path_engine.isabs(&target_str) {
                    target_str
                } else {
                    self.path_engine.join(&self.path_engine.dirname(&logical), &target_str)
                };
                let (resolved, device) = self.resolve_at_depth(&next, true, depth + 1)?;
                current = resolved;
                current_device = device;
            } else {
                current = child;
                current_device = mount.device_id;
            }
        }
        Ok((current, current_device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfs_core::{Profile, Timespec};

    fn fixture() -> (Store, MountTable, PathEngine, Identity) {
        let mut store = Store::new();
        let root = store.create_directory(None, 0o755, 0, 0, 0, Timespec::ZERO);
        let mut mounts = MountTable::new();
        mounts.add_mount("/", root, 1 << 30, None);

        let dir = store.create_directory(Some(root), 0o755, 0, 0, 0, Timespec::ZERO);
        store.insert_entry(root, "a".into(), dir).unwrap();
        let file = store.create_regular_file(0o644, 0, 0, 0, Timespec::ZERO);
        store.insert_entry(dir, "b.txt".into(), file).unwrap();
        let link = store.create_symlink(b"/a/b.txt".to_vec(), 0o777, 0, 0, 0, Timespec::ZERO);
        store.insert_entry(root, "link".into(), link).unwrap();

        let engine = PathEngine::new(Profile::Linux);
        (store, mounts, engine, Identity::new(0, 0))
    }

    #[test]
    fn resolves_nested_path() {
        let (store, mounts, engine, identity) = fixture();
        let resolver = Resolver::new(&store, &mounts, &engine, &identity, false, 40, 255, 4096);
        let inode = resolver.resolve("/a/b.txt", true).unwrap();
        assert_eq!(store.get(inode).unwrap().size(), 0);
    }

    #[test]
    fn follows_symlink_when_requested() {
        let (store, mounts, engine, identity) = fixture();
        let resolver = Resolver::new(&store, &mounts, &engine, &identity, false, 40, 255, 4096);
        let direct = resolver.resolve("/a/b.txt", true).unwrap();
        let via_link = resolver.resolve("/link", true).unwrap();
        assert_eq!(direct, via_link);
    }

    #[test]
    fn lstat_mode_returns_symlink_itself() {
        let (store, mounts, engine, identity) = fixture();
        let resolver = Resolver::new(&store, &mounts, &engine, &identity, false, 40, 255, 4096);
        let inode = resolver.resolve("/link", false).unwrap();
        assert!(store.get(inode).unwrap().symlink_target().is_some());
    }

    #[test]
    fn self_referential_symlink_hits_loop_bound() {
        let (mut store, mounts, engine, identity) = fixture();
        let root = mounts.mounts()[0].root_inode;
        let loopy = store.create_symlink(b"/loop".to_vec(), 0o777, 0, 0, 0, Timespec::ZERO);
        store.insert_entry(root, "loop".into(), loopy).unwrap();
        let resolver = Resolver::new(&store, &mounts, &engine, &identity, false, 40, 255, 4096);
        let err = resolver.resolve("/loop", true).unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::LinkLoop);
    }

    #[test]
    fn resolve_parent_reports_missing_final_component() {
        let (store, mounts, engine, identity) = fixture();
        let resolver = Resolver::new(&store, &mounts, &engine, &identity, false, 40, 255, 4096);
        let lookup = resolver.resolve_parent("/a/new.txt").unwrap();
        assert!(lookup.existing.is_none());
        assert_eq!(lookup.name, "new.txt");
    }
}
