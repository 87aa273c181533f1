pub mod error;
pub mod path;
pub mod time;
pub mod types;

pub use error::{FsError, FsErrorKind, Result};
pub use path::{decode, decode_lossy, encode, is_windows_reserved_name, PathEngine, Profile};
pub use time::{Clock, LogicalClock, Timespec};
pub use types::{FileType, Metadata, WindowsAttributes, IO_REPARSE_TAG_SYMLINK};
