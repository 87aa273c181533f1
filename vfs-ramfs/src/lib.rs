pub mod inode;
pub mod store;

pub use inode::{Content, DeviceKind, Directory, Inode, InodeId, InodeKind, RealLoader, RegularFile};
pub use store::Store;
