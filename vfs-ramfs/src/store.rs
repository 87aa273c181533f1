//! The inode arena. Grounded on `rcore-fs-ramfs::RamFS`'s
//! `next_inode_id` counter and `create2`/`link`/`unlink`/`find`
//! primitives, re-architected from a graph of `Arc<RwLock<Node>>` into
//! a `HashMap<InodeId, Inode>` per spec.md §9. There is exactly one
//! consumer (`vfs-engine::Engine`, itself behind one lock per spec.md
//! §5), so `Store` takes no internal lock of its own.

use std::collections::HashMap;

use vfs_core::{FsError, FsErrorKind, Result, Timespec};

use crate::inode::{Content, DeviceKind, Directory, Inode, InodeId, InodeKind, RegularFile};

pub struct Store {
    inodes: HashMap<InodeId, Inode>,
    next_id: InodeId,
}

impl Store {
    /// An empty arena with no root; callers create the root directory
    /// immediately via `create_directory_raw` with `parent: None`.
    pub fn new() -> Self {
        Store {
            inodes: HashMap::new(),
            next_id: 1,
        }
    }

    fn alloc_id(&mut self) -> InodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn get(&self, id: InodeId) -> Result<&Inode> {
        self.inodes.get(&id).ok_or_else(|| FsError::new(FsErrorKind::NotFound))
    }

    pub fn get_mut(&mut self, id: InodeId) -> Result<&mut Inode> {
        self.inodes
            .get_mut(&id)
            .ok_or_else(|| FsError::new(FsErrorKind::NotFound))
    }

    pub fn contains(&self, id: InodeId) -> bool {
        self.inodes.contains_key(&id)
    }

    fn insert_new(
        &mut self,
        kind: InodeKind,
        mode: u32,
        uid: u32,
        gid: u32,
        dev: u64,
        now: Timespec,
    ) -> InodeId {
        let id = self.alloc_id();
        let nlink = if matches!(kind, InodeKind::Directory(_)) { 2 } else { 1 };
        let inode = Inode {
            id,
            kind,
            mode,
            uid,
            gid,
            atime: now,
            mtime: now,
            ctime: now,
            birthtime: now,
            dev,
            nlink,
            xattrs: Default::default(),
        };
        self.inodes.insert(id, inode);
        id
    }

    /// Create a directory not yet linked into any parent (used for
    /// mount roots) or linked via `link_into` right after.
    pub fn create_directory(
        &mut self,
        parent: Option<InodeId>,
        mode: u32,
        uid: u32,
        gid: u32,
        dev: u64,
        now: Timespec,
    ) -> InodeId {
        self.insert_new(
            InodeKind::Directory(Directory {
                entries: Default::default(),
                parent,
            }),
            mode,
            uid,
            gid,
            dev,
            now,
        )
    }

    pub fn create_regular_file(
        &mut self,
        mode: u32,
        uid: u32,
        gid: u32,
        dev: u64,
        now: Timespec,
    ) -> InodeId {
        self.insert_new(
            InodeKind::RegularFile(RegularFile::empty()),
            mode,
            uid,
            gid,
            dev,
            now,
        )
    }

    pub fn create_regular_file_with_content(
        &mut self,
        content: Content,
        mode: u32,
        uid: u32,
        gid: u32,
        dev: u64,
        now: Timespec,
    ) -> InodeId {
        self.insert_new(
            InodeKind::RegularFile(RegularFile {
                content,
                encoding_hint: None,
            }),
            mode,
            uid,
            gid,
            dev,
            now,
        )
    }

    pub fn create_symlink(
        &mut self,
        target: Vec<u8>,
        mode: u32,
        uid: u32,
        gid: u32,
        dev: u64,
        now: Timespec,
    ) -> InodeId {
        self.insert_new(InodeKind::Symlink(target), mode, uid, gid, dev, now)
    }

    pub fn create_device(
        &mut self,
        kind: DeviceKind,
        mode: u32,
        uid: u32,
        gid: u32,
        dev: u64,
        now: Timespec,
    ) -> InodeId {
        self.insert_new(InodeKind::Device(kind), mode, uid, gid, dev, now)
    }

    /// Insert a `(name -> child)` entry into `dir`'s directory map.
    /// Does not bump `nlink`; callers that create a hard link (as
    /// opposed to first-linking a freshly created inode) must do that
    /// themselves via `bump_nlink`.
    pub fn insert_entry(&mut self, dir: InodeId, name: String, child: InodeId) -> Result<()> {
        let d = self
            .get_mut(dir)?
            .as_dir_mut()
            .ok_or_else(|| FsError::new(FsErrorKind::NotADir))?;
        d.entries.insert(name, child);
        Ok(())
    }

    pub fn remove_entry(&mut self, dir: InodeId, name: &str) -> Result<InodeId> {
        let d = self
            .get_mut(dir)?
            .as_dir_mut()
            .ok_or_else(|| FsError::new(FsErrorKind::NotADir))?;
        d.entries
            .shift_remove(name)
            .ok_or_else(|| FsError::new(FsErrorKind::NotFound))
    }

    pub fn bump_nlink(&mut self, id: InodeId) -> Result<u64> {
        let inode = self.get_mut(id)?;
        inode.nlink += 1;
        Ok(inode.nlink)
    }

    pub fn drop_nlink(&mut self, id: InodeId) -> Result<u64> {
        let inode = self.get_mut(id)?;
        inode.nlink = inode.nlink.saturating_sub(1);
        Ok(inode.nlink)
    }

    /// Permanently remove an inode from the arena. Callers must have
    /// already confirmed `nlink == 0` and no descriptor holds it open
    /// (spec.md invariant 7); this just reclaims the slot.
    pub fn destroy(&mut self, id: InodeId) {
        self.inodes.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.inodes.len()
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfs_core::Timespec;

    #[test]
    fn create_and_link_file() {
        let mut store = Store::new();
        let root = store.create_directory(None, 0o755, 0, 0, 0, Timespec::ZERO);
        let file = store.create_regular_file(0o644, 0, 0, 0, Timespec::ZERO);
        store.insert_entry(root, "a.txt".into(), file).unwrap();
        assert_eq!(store.get(root).unwrap().as_dir().unwrap().get("a.txt"), Some(file));
    }

    #[test]
    fn unlink_and_destroy() {
        let mut store = Store::new();
        let root = store.create_directory(None, 0o755, 0, 0, 0, Timespec::ZERO);
        let file = store.create_regular_file(0o644, 0, 0, 0, Timespec::ZERO);
        store.insert_entry(root, "a.txt".into(), file).unwrap();
        store.remove_entry(root, "a.txt").unwrap();
        let n = store.drop_nlink(file).unwrap();
        assert_eq!(n, 0);
        store.destroy(file);
        assert!(!store.contains(file));
    }

    #[test]
    fn hard_link_bumps_nlink() {
        let mut store = Store::new();
        let root = store.create_directory(None, 0o755, 0, 0, 0, Timespec::ZERO);
        let file = store.create_regular_file(0o644, 0, 0, 0, Timespec::ZERO);
        store.insert_entry(root, "a".into(), file).unwrap();
        store.bump_nlink(file).unwrap();
        store.insert_entry(root, "b".into(), file).unwrap();
        assert_eq!(store.get(file).unwrap().nlink, 2);
    }
}
