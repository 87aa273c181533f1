//! Error Mapping (spec.md §4.10, §7). Grounded on
//! `rcore-fs-fuse::VfsFuse::trans_error`'s `FsError -> libc errno` match,
//! extended with the POSIX message text and a parallel Windows
//! `WinError` table since spec.md §7 requires OS-flavored messages
//! under both profiles.

use vfs_core::{FsError, FsErrorKind, Profile};

/// POSIX errno for each fault kind, under the numbering `libc`/Linux use.
pub fn errno(kind: FsErrorKind) -> i32 {
    match kind {
        FsErrorKind::NotFound => 2,         // ENOENT
        FsErrorKind::BadDescriptor => 9,    // EBADF
        FsErrorKind::PermissionDenied => 13, // EACCES
        FsErrorKind::Exists => 17,          // EEXIST
        FsErrorKind::CrossDevice => 18,     // EXDEV
        FsErrorKind::NotADir => 20,         // ENOTDIR
        FsErrorKind::IsADir => 21,          // EISDIR
        FsErrorKind::InvalidArgument => 22, // EINVAL
        FsErrorKind::NoSpace => 28,         // ENOSPC
        FsErrorKind::NameTooLong => 36,     // ENAMETOOLONG
        FsErrorKind::NotEmpty => 39,        // ENOTEMPTY
        FsErrorKind::LinkLoop => 40,        // ELOOP
        FsErrorKind::Busy => 16,            // EBUSY
        FsErrorKind::IOError => 5,          // EIO
    }
}

/// Windows `WinError` numeric code for the same fault kinds, used when
/// the active profile is `Profile::Windows` (spec.md §4.10).
pub fn win_error(kind: FsErrorKind) -> u32 {
    match kind {
        FsErrorKind::NotFound => 2,          // ERROR_FILE_NOT_FOUND
        FsErrorKind::NotADir => 267,         // ERROR_DIRECTORY
        FsErrorKind::IsADir => 5,            // ERROR_ACCESS_DENIED (no direct analogue)
        FsErrorKind::NotEmpty => 145,        // ERROR_DIR_NOT_EMPTY
        FsErrorKind::Exists => 183,          // ERROR_ALREADY_EXISTS
        FsErrorKind::PermissionDenied => 5,  // ERROR_ACCESS_DENIED
        FsErrorKind::CrossDevice => 17,      // ERROR_NOT_SAME_DEVICE
        FsErrorKind::LinkLoop => 1921,       // ERROR_STOPPED_ON_SYMLINK (best-effort analogue)
        FsErrorKind::NameTooLong => 206,     // ERROR_FILENAME_EXCED_RANGE
        FsErrorKind::NoSpace => 112,         // ERROR_DISK_FULL
        FsErrorKind::BadDescriptor => 6,     // ERROR_INVALID_HANDLE
        FsErrorKind::InvalidArgument => 87,  // ERROR_INVALID_PARAMETER
        FsErrorKind::IOError => 1117,        // ERROR_IO_DEVICE
        FsErrorKind::Busy => 170,            // ERROR_BUSY
    }
}

/// Render an error the way the active profile's runtime would print an
/// unhandled `OSError`: `[Errno N] message: 'path'` on POSIX profiles,
/// `[WinError N] message: 'path'` under Windows (spec.md §7).
pub fn format_error(err: &FsError, profile: Profile) -> String {
    let (tag, code) = if profile.is_windows() {
        ("WinError", win_error(err.kind()) as i64)
    } else {
        ("Errno", errno(err.kind()) as i64)
    };
    match &err.path {
        Some(path) => format!("[{} {}] {}: '{}'", tag, code, err.kind(), path),
        None => format!("[{} {}] {}", tag, code, err.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfs_core::FsError;

    #[test]
    fn posix_not_found_message() {
        let err = FsError::with_path(FsErrorKind::NotFound, "/missing");
        assert_eq!(
            format_error(&err, Profile::Linux),
            "[Errno 2] No such file or directory: '/missing'"
        );
    }

    #[test]
    fn windows_access_denied_message() {
        let err = FsError::with_path(FsErrorKind::PermissionDenied, "C:\\secret");
        assert_eq!(
            format_error(&err, Profile::Windows),
            "[WinError 5] Permission denied: 'C:\\secret'"
        );
    }
}
