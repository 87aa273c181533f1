//! The per-inode data shape. Field layout follows
//! `rcore-fs-ramfs::RamFSINode` (content buffer + metadata) and
//! `rcore-fs-devfs`'s null-sink device inode, merged into one
//! arena-friendly `Inode` per spec.md §9's re-architecture note: no
//! `Arc<RwLock<Node>>` graph, no per-node parent `Weak` reference
//! except on directories (spec.md §4.2: hard links to directories are
//! forbidden, so a directory's parent is unambiguous; a file's is not
//! and must be recomputed by walking when asked).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use vfs_core::{FileType, Timespec};

pub type InodeId = u64;

/// A lazily-materialized regular file backed by a real path (spec.md
/// §4.8). The loader is supplied by `vfs-hostfs`; this crate only
/// needs to invoke it once and cache the result.
pub type RealLoader = Arc<dyn Fn() -> std::io::Result<Vec<u8>> + Send + Sync>;

#[derive(Clone)]
pub enum Content {
    /// Fully materialized bytes.
    Eager(Vec<u8>),
    /// A declared size with no backing bytes (spec.md §3: "phantom-size
    /// files with no contents"). Reads return zero bytes up to `size`.
    Phantom(u64),
    /// Not yet read from the real filesystem.
    Lazy(RealLoader),
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Eager(v) => write!(f, "Eager({} bytes)", v.len()),
            Content::Phantom(n) => write!(f, "Phantom({})", n),
            Content::Lazy(_) => write!(f, "Lazy(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegularFile {
    pub content: Content,
    /// Encoding hint consulted only by text-mode `open()` (spec.md §3).
    pub encoding_hint: Option<String>,
}

impl RegularFile {
    pub fn empty() -> Self {
        RegularFile {
            content: Content::Eager(Vec::new()),
            encoding_hint: None,
        }
    }

    pub fn len(&self) -> u64 {
        match &self.content {
            Content::Eager(v) => v.len() as u64,
            Content::Phantom(n) => *n,
            Content::Lazy(_) => 0,
        }
    }

    /// Materialize lazy content in place, replacing `Lazy` with
    /// `Eager`. A no-op for already-materialized content.
    pub fn materialize(&mut self) -> std::io::Result<()> {
        if let Content::Lazy(loader) = &self.content {
            let bytes = loader()?;
            self.content = Content::Eager(bytes);
        }
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.content {
            Content::Eager(v) => v.as_slice(),
            _ => &[],
        }
    }
}

/// An ordered name -> inode map. Insertion order is the default
/// listing order (spec.md §3); case-insensitive lookups scan in that
/// order so the first-inserted entry wins on an ambiguity introduced
/// by switching case sensitivity at runtime (spec.md §4.4).
#[derive(Debug, Clone, Default)]
pub struct Directory {
    pub entries: IndexMap<String, InodeId>,
    /// `None` only for a mount root with no parent directory in this
    /// arena (spec.md invariant 2: `/` is the root mount's root).
    pub parent: Option<InodeId>,
}

impl Directory {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-sensitive exact lookup.
    pub fn get(&self, name: &str) -> Option<InodeId> {
        self.entries.get(name).copied()
    }

    /// First-inserted match under case folding.
    pub fn get_case_insensitive(&self, fold: impl Fn(&str) -> String, name: &str) -> Option<InodeId> {
        let target = fold(name);
        self.entries
            .iter()
            .find(|(k, _)| fold(k) == target)
            .map(|(_, id)| *id)
    }

    pub fn names_in_order(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn names_shuffled(&self) -> Vec<String> {
        use rand::seq::SliceRandom;
        let mut names = self.names_in_order();
        names.shuffle(&mut rand::thread_rng());
        names
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// `/dev/null`-style sink: zero-length reads, writes discarded.
    Null,
}

#[derive(Debug, Clone)]
pub enum InodeKind {
    RegularFile(RegularFile),
    Directory(Directory),
    /// Target path stored verbatim, never resolved eagerly (spec.md §3).
    Symlink(Vec<u8>),
    Device(DeviceKind),
}

impl InodeKind {
    pub fn file_type(&self) -> FileType {
        match self {
            InodeKind::RegularFile(_) => FileType::RegularFile,
            InodeKind::Directory(_) => FileType::Directory,
            InodeKind::Symlink(_) => FileType::Symlink,
            InodeKind::Device(_) => FileType::Device,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Inode {
    pub id: InodeId,
    pub kind: InodeKind,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: Timespec,
    pub mtime: Timespec,
    pub ctime: Timespec,
    pub birthtime: Timespec,
    pub dev: u64,
    pub nlink: u64,
    /// Linux-only extended-attributes map (spec.md §3).
    pub xattrs: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Inode {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, InodeKind::Directory(_))
    }

    pub fn as_dir(&self) -> Option<&Directory> {
        match &self.kind {
            InodeKind::Directory(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dir_mut(&mut self) -> Option<&mut Directory> {
        match &mut self.kind {
            InodeKind::Directory(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&RegularFile> {
        match &self.kind {
            InodeKind::RegularFile(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut RegularFile> {
        match &mut self.kind {
            InodeKind::RegularFile(f) => Some(f),
            _ => None,
        }
    }

    pub fn symlink_target(&self) -> Option<&[u8]> {
        match &self.kind {
            InodeKind::Symlink(t) => Some(t.as_slice()),
            _ => None,
        }
    }

    pub fn size(&self) -> u64 {
        match &self.kind {
            InodeKind::RegularFile(f) => f.len(),
            InodeKind::Directory(d) => d.entries.len() as u64,
            InodeKind::Symlink(t) => t.len() as u64,
            InodeKind::Device(_) => 0,
        }
    }
}
