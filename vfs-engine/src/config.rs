//! Recognized configuration options (spec.md §6). A plain struct
//! consumed by `Engine::new`/`Engine::reset`, matching the way the
//! teacher's CLI front end (`rcore-fs-cli`) assembles options before
//! constructing a filesystem — minus `structopt`/`env_logger`, since
//! no CLI binary or logging ships with this crate (spec.md §1, §7).

use vfs_core::Profile;

/// How aggressively the (out-of-scope) source patcher rewrites
/// `open()` call sites before a test run (spec.md §6). This crate only
/// carries the option; nothing here reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOpenCode {
    Off,
    On,
    Auto,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Changing this resets the filesystem (spec.md §6).
    pub os: Profile,
    pub is_case_sensitive: Option<bool>,
    pub path_separator: Option<char>,
    pub alternative_path_separator: Option<char>,
    pub shuffle_listdir_results: bool,
    pub allow_root_user: bool,
    pub umask: u32,
    pub uid: u32,
    pub gid: u32,
    /// Symlink chain bound before `ELOOP` (spec.md §4.4, typically 40).
    pub max_symlink_depth: u32,
    /// Maximum path-component length before `ENAMETOOLONG`.
    pub max_name_len: usize,
    /// Maximum total path length before `ENAMETOOLONG`.
    pub max_path_len: usize,
    /// Under the Windows profile, `chmod` normally clamps the
    /// requested mode to preserve readability, since real NTFS ACLs
    /// can't be expressed through POSIX bits. Set this to opt into
    /// full POSIX semantics instead (spec.md §4.5).
    pub force_unix_mode: bool,
    /// Consumed by the (out-of-scope) source patcher, not by this
    /// crate (spec.md §6).
    pub patch_open_code: PatchOpenCode,
    pub patch_default_args: bool,
    pub use_known_patches: bool,
}

fn host_uid() -> u32 {
    #[cfg(unix)]
    {
        unsafe { libc::getuid() }
    }
    #[cfg(not(unix))]
    {
        0
    }
}

fn host_gid() -> u32 {
    #[cfg(unix)]
    {
        unsafe { libc::getgid() }
    }
    #[cfg(not(unix))]
    {
        0
    }
}

impl Config {
    pub fn new(os: Profile) -> Self {
        Config {
            os,
            is_case_sensitive: None,
            path_separator: None,
            alternative_path_separator: None,
            shuffle_listdir_results: false,
            allow_root_user: false,
            umask: 0o022,
            uid: host_uid(),
            gid: host_gid(),
            max_symlink_depth: 40,
            max_name_len: 255,
            max_path_len: 4096,
            force_unix_mode: false,
            patch_open_code: PatchOpenCode::Auto,
            patch_default_args: true,
            use_known_patches: true,
        }
    }

    pub fn effective_case_sensitive(&self) -> bool {
        self.is_case_sensitive
            .unwrap_or_else(|| self.os.default_case_sensitive())
    }

    /// Reset the emulated identity back to the host's real uid/gid
    /// (spec.md §6: `reset_ids()`).
    pub fn reset_ids(&mut self) {
        self.uid = host_uid();
        self.gid = host_gid();
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(Profile::Linux)
    }
}
