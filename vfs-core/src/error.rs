use std::fmt;
use std::result;

/// Kind of fault raised while resolving or mutating the fake tree.
///
/// Mirrors the taxonomy a real OS reports through errno, but kept
/// independent of any one OS's numbering — the engine translates a
/// `FsErrorKind` into the active profile's errno/`WinError` at the
/// boundary (see `vfs-engine::errno`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorKind {
    /// Resolution failed on a missing path component.
    NotFound,
    /// An intermediate path component is not a directory.
    NotADir,
    /// A directory was used where a file was expected.
    IsADir,
    /// `rmdir`/`rename` target a non-empty directory.
    NotEmpty,
    /// `O_EXCL`, `mkdir`, or a forbidden rename-over-existing.
    Exists,
    /// A mode/ownership check failed.
    PermissionDenied,
    /// `link`/`rename` attempted across mount boundaries.
    CrossDevice,
    /// Symlink chain exceeded the configured bound.
    LinkLoop,
    /// A path component or the whole path is too long.
    NameTooLong,
    /// The owning mount's byte budget would be exceeded.
    NoSpace,
    /// The file descriptor is closed or out of range.
    BadDescriptor,
    /// An argument was invalid for the requested operation.
    InvalidArgument,
    /// A lazily-imported real file could not be read.
    IOError,
    /// The resource is in use and cannot be mutated right now
    /// (e.g. unlinking a mounted-over directory entry).
    Busy,
}

impl fmt::Display for FsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FsErrorKind::NotFound => "No such file or directory",
            FsErrorKind::NotADir => "Not a directory",
            FsErrorKind::IsADir => "Is a directory",
            FsErrorKind::NotEmpty => "Directory not empty",
            FsErrorKind::Exists => "File exists",
            FsErrorKind::PermissionDenied => "Permission denied",
            FsErrorKind::CrossDevice => "Invalid cross-device link",
            FsErrorKind::LinkLoop => "Too many levels of symbolic links",
            FsErrorKind::NameTooLong => "File name too long",
            FsErrorKind::NoSpace => "No space left on device",
            FsErrorKind::BadDescriptor => "Bad file descriptor",
            FsErrorKind::InvalidArgument => "Invalid argument",
            FsErrorKind::IOError => "Input/output error",
            FsErrorKind::Busy => "Device or resource busy",
        };
        write!(f, "{}", msg)
    }
}

/// A fault raised by the engine, optionally carrying the path that
/// triggered it so the boundary layer can render OS-shaped messages
/// (spec.md §7: `[Errno 2] No such file or directory: '<path>'`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsError {
    pub kind: FsErrorKind,
    pub path: Option<String>,
}

impl FsError {
    pub fn new(kind: FsErrorKind) -> Self {
        FsError { kind, path: None }
    }

    pub fn with_path(kind: FsErrorKind, path: impl Into<String>) -> Self {
        FsError {
            kind,
            path: Some(path.into()),
        }
    }

    pub fn kind(&self) -> FsErrorKind {
        self.kind
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: '{}'", self.kind, path),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for FsError {}

impl From<FsErrorKind> for FsError {
    fn from(kind: FsErrorKind) -> Self {
        FsError::new(kind)
    }
}

impl From<std::io::Error> for FsError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        let kind = match e.kind() {
            NotFound => FsErrorKind::NotFound,
            PermissionDenied => FsErrorKind::PermissionDenied,
            AlreadyExists => FsErrorKind::Exists,
            InvalidInput | InvalidData => FsErrorKind::InvalidArgument,
            _ => FsErrorKind::IOError,
        };
        FsError::new(kind)
    }
}

pub type Result<T> = result::Result<T, FsError>;
