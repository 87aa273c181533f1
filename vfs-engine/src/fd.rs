//! File Descriptor Table (spec.md §4.6). Grounded on
//! `rcore-fs-fuse::VfsFuse`'s `BTreeMap<usize, Arc<dyn INode>>`
//! inode-handle table, adapted from "fh is opaque, the VFS inode is
//! the identity" to "the fd is the identity, the cursor/flags live
//! with it" — spec.md §4.6 puts the cursor on the descriptor, not the
//! inode, and descriptors `dup()`d from one another must share it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use vfs_core::{FsError, FsErrorKind, Result};
use vfs_ramfs::InodeId;

bitflags::bitflags! {
    pub struct OpenFlags: u32 {
        const CREATE   = 0b0000_0001;
        const EXCL     = 0b0000_0010;
        const TRUNC    = 0b0000_0100;
        const APPEND   = 0b0000_1000;
        const NOFOLLOW = 0b0001_0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn readable(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewlinePolicy {
    /// Raw bytes, no translation (binary mode).
    Binary,
    /// Universal-newline decoding on read, host-native encoding on
    /// write (spec.md §4.6).
    Universal,
}

#[derive(Debug)]
pub struct OpenFile {
    pub inode: InodeId,
    pub access: AccessMode,
    pub flags: OpenFlags,
    pub offset: u64,
    pub newline: NewlinePolicy,
    pub encoding: String,
    pub closed: bool,
}

impl OpenFile {
    pub fn append_mode(&self) -> bool {
        self.flags.contains(OpenFlags::APPEND)
    }
}

/// `Arc<Mutex<..>>` rather than `Rc<RefCell<..>>` (spec.md §5: the
/// engine must itself be `Send + Sync` so host test code can share it
/// across threads behind the single engine-wide lock).
pub type SharedOpenFile = Arc<Mutex<OpenFile>>;

/// Lock an open-file handle, recovering from poisoning the same way
/// `Engine::lock()` does: a poisoned lock here only follows an earlier
/// panic that would already have failed the caller's test.
pub fn lock_open_file(shared: &SharedOpenFile) -> MutexGuard<'_, OpenFile> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct FdTable {
    table: BTreeMap<i32, SharedOpenFile>,
}

impl FdTable {
    /// fds 0/1/2 are pre-reserved (spec.md §4.6); this table manages
    /// fds from 3 upward unless a caller explicitly registers a lower
    /// one (used by lifecycle setup to seed stdio-like placeholders).
    pub fn new() -> Self {
        FdTable {
            table: BTreeMap::new(),
        }
    }

    /// Smallest unused non-negative integer, matching POSIX fd
    /// allocation (spec.md §4.6).
    fn next_fd(&self) -> i32 {
        let mut candidate = 3;
        for &fd in self.table.keys() {
            if fd < candidate {
                continue;
            }
            if fd == candidate {
                candidate += 1;
            } else {
                break;
            }
        }
        candidate
    }

    pub fn insert(&mut self, open_file: OpenFile) -> i32 {
        let fd = self.next_fd();
        self.table.insert(fd, Arc::new(Mutex::new(open_file)));
        fd
    }

    pub fn insert_at(&mut self, fd: i32, open_file: OpenFile) {
        self.table.insert(fd, Arc::new(Mutex::new(open_file)));
    }

    pub fn get(&self, fd: i32) -> Result<SharedOpenFile> {
        self.table
            .get(&fd)
            .cloned()
            .filter(|f| !lock_open_file(f).closed)
            .ok_or_else(|| FsError::new(FsErrorKind::BadDescriptor))
    }

    /// `dup(fd)`: shares the same open-file object (same cursor).
    pub fn dup(&mut self, fd: i32) -> Result<i32> {
        let shared = self.get(fd)?;
        let new_fd = self.next_fd();
        self.table.insert(new_fd, shared);
        Ok(new_fd)
    }

    pub fn close(&mut self, fd: i32) -> Result<InodeId> {
        let shared = self
            .table
            .remove(&fd)
            .ok_or_else(|| FsError::new(FsErrorKind::BadDescriptor))?;
        let mut open_file = lock_open_file(&shared);
        if open_file.closed {
            return Err(FsError::new(FsErrorKind::BadDescriptor));
        }
        open_file.closed = true;
        Ok(open_file.inode)
    }

    /// Count of non-closed descriptors pointing at `inode` across all
    /// fd numbers, used to decide whether closing the last one frees
    /// storage (spec.md invariant 7).
    pub fn open_count(&self, inode: InodeId) -> usize {
        self.table
            .values()
            .filter(|f| {
                let f = lock_open_file(f);
                !f.closed && f.inode == inode
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }
}

impl Default for FdTable {
    fn default() -> Self {
        FdTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_open_file(inode: InodeId) -> OpenFile {
        OpenFile {
            inode,
            access: AccessMode::ReadWrite,
            flags: OpenFlags::empty(),
            offset: 0,
            newline: NewlinePolicy::Binary,
            encoding: "utf-8".to_string(),
            closed: false,
        }
    }

    #[test]
    fn allocates_smallest_unused_fd_above_reserved() {
        let mut table = FdTable::new();
        let a = table.insert(new_open_file(1));
        let b = table.insert(new_open_file(2));
        assert_eq!(a, 3);
        assert_eq!(b, 4);
        table.close(a).unwrap();
        let c = table.insert(new_open_file(3));
        assert_eq!(c, 3);
    }

    #[test]
    fn dup_shares_cursor() {
        let mut table = FdTable::new();
        let a = table.insert(new_open_file(1));
        let b = table.dup(a).unwrap();
        lock_open_file(&table.get(a).unwrap()).offset = 42;
        assert_eq!(lock_open_file(&table.get(b).unwrap()).offset, 42);
    }

    #[test]
    fn closed_fd_is_bad_descriptor() {
        let mut table = FdTable::new();
        let a = table.insert(new_open_file(1));
        table.close(a).unwrap();
        assert!(table.get(a).is_err());
        assert!(table.close(a).is_err());
    }
}
