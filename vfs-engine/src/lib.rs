//! Resolver, permission checks, file-descriptor table, operation
//! surface and lifecycle management layered over `vfs-ramfs`,
//! `vfs-mount` and `vfs-hostfs`. This is the crate applications embed
//! directly; the other four crates exist to give it something to
//! compose.

pub mod config;
pub mod engine;
pub mod errno;
pub mod fd;
pub mod identity;
pub mod ops;
pub mod resolver;

pub use config::{Config, PatchOpenCode};
pub use engine::{DirEntry, Engine};
pub use errno::{errno, format_error, win_error};
pub use fd::{AccessMode, NewlinePolicy, OpenFlags};
pub use identity::Access;
pub use resolver::Resolver;

#[cfg(test)]
mod tests;
