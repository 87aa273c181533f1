//! Mount Table (spec.md §4.3). Grounded on `rcore-fs-mountfs::MountFS`'s
//! mountpoint registry (there, keyed by inode id on the parent
//! filesystem and holding a child `Arc<dyn FileSystem>`); adapted here
//! to "one `Mount` owns one root `InodeId` into the single shared
//! `vfs-ramfs::Store`" because this workspace has exactly one arena,
//! not one tree per mounted filesystem.

use vfs_core::{FsError, FsErrorKind, PathEngine, Result};
use vfs_ramfs::InodeId;

#[derive(Debug, Clone)]
pub struct Mount {
    pub path: String,
    pub root_inode: InodeId,
    pub device_id: u64,
    pub total_bytes: u64,
    pub used_bytes: u64,
}

impl Mount {
    pub fn free_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.used_bytes)
    }
}

/// ~1 TiB, the default budget spec.md §4.3 gives an auto-created
/// Windows drive mount.
pub const DEFAULT_WINDOWS_DRIVE_BYTES: u64 = 1024 * 1024 * 1024 * 1024;

pub struct MountTable {
    /// Sorted by path length, longest prefix first, so `mount_for`
    /// is a linear scan that returns on the first (most specific) hit.
    mounts: Vec<Mount>,
    next_device_id: u64,
}

impl MountTable {
    pub fn new() -> Self {
        MountTable {
            mounts: Vec::new(),
            next_device_id: 1,
        }
    }

    pub fn alloc_device_id(&mut self) -> u64 {
        let id = self.next_device_id;
        self.next_device_id += 1;
        id
    }

    pub fn add_mount(
        &mut self,
        path: impl Into<String>,
        root_inode: InodeId,
        total_bytes: u64,
        device_id: Option<u64>,
    ) -> u64 {
        let device_id = device_id.unwrap_or_else(|| self.alloc_device_id());
        self.mounts.push(Mount {
            path: path.into(),
            root_inode,
            device_id,
            total_bytes,
            used_bytes: 0,
        });
        self.mounts.sort_by_key(|m| std::cmp::Reverse(m.path.len()));
        device_id
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// Longest-prefix match: `mount_for(path) -> (mount, relative_path)`.
    pub fn mount_for<'a>(&self, engine: &PathEngine, path: &'a str) -> Option<(&Mount, &'a str)> {
        for mount in &self.mounts {
            if path == mount.path {
                return Some((mount, ""));
            }
            let prefix = if mount.path.ends_with(engine.separator) {
                mount.path.clone()
            } else {
                format!("{}{}", mount.path, engine.separator)
            };
            if engine.case_sensitive {
                if path.starts_with(&prefix) {
                    return Some((mount, &path[prefix.len()..]));
                }
            } else if path.len() >= prefix.len()
                && engine.fold_case(&path[..prefix.len()]) == engine.fold_case(&prefix)
            {
                return Some((mount, &path[prefix.len()..]));
            }
        }
        None
    }

    pub fn mount_by_root(&self, root_inode: InodeId) -> Option<&Mount> {
        self.mounts.iter().find(|m| m.root_inode == root_inode)
    }

    pub fn mount_by_root_mut(&mut self, root_inode: InodeId) -> Option<&mut Mount> {
        self.mounts.iter_mut().find(|m| m.root_inode == root_inode)
    }

    pub fn mount_by_device(&self, device_id: u64) -> Option<&Mount> {
        self.mounts.iter().find(|m| m.device_id == device_id)
    }

    pub fn set_disk_usage(&mut self, device_id: u64, total_bytes: u64) -> Result<()> {
        let mount = self
            .mounts
            .iter_mut()
            .find(|m| m.device_id == device_id)
            .ok_or_else(|| FsError::new(FsErrorKind::NotFound))?;
        mount.total_bytes = total_bytes;
        Ok(())
    }

    /// Apply a (possibly negative) byte delta, failing with `NoSpace`
    /// if it would exceed the mount's budget. No partial application on
    /// failure (spec.md §4.6 / §9: the whole write is rejected).
    pub fn change_disk_usage(&mut self, device_id: u64, delta: i64) -> Result<()> {
        let mount = self
            .mounts
            .iter_mut()
            .find(|m| m.device_id == device_id)
            .ok_or_else(|| FsError::new(FsErrorKind::NotFound))?;
        if delta > 0 {
            let delta = delta as u64;
            if mount.used_bytes + delta > mount.total_bytes {
                return Err(FsError::new(FsErrorKind::NoSpace));
            }
            mount.used_bytes += delta;
        } else {
            mount.used_bytes = mount.used_bytes.saturating_sub((-delta) as u64);
        }
        Ok(())
    }
}

impl Default for MountTable {
    fn default() -> Self {
        MountTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfs_core::Profile;

    #[test]
    fn longest_prefix_wins() {
        let mut table = MountTable::new();
        table.add_mount("/", 1, 1_000_000, None);
        table.add_mount("/mnt", 2, 1_000, None);
        let engine = PathEngine::new(Profile::Linux);
        let (mount, rel) = table.mount_for(&engine, "/mnt/data/a").unwrap();
        assert_eq!(mount.root_inode, 2);
        assert_eq!(rel, "data/a");
        let (mount, rel) = table.mount_for(&engine, "/etc/passwd").unwrap();
        assert_eq!(mount.root_inode, 1);
        assert_eq!(rel, "etc/passwd");
    }

    #[test]
    fn disk_budget_rejects_overflow() {
        let mut table = MountTable::new();
        let id = table.add_mount("/", 1, 100, None);
        table.change_disk_usage(id, 50).unwrap();
        assert!(table.change_disk_usage(id, 60).is_err());
        assert_eq!(table.mount_by_device(id).unwrap().used_bytes, 50);
    }
}
