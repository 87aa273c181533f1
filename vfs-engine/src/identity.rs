//! Permission & Identity (spec.md §4.5). No direct teacher equivalent
//! (the teacher's kernels check permissions above the `INode` trait,
//! in caller code this workspace doesn't have); grounded on spec.md
//! §4.5 directly, cross-checked against the mode-bit layout
//! `rcore-fs/src/std.rs`'s `From<std::fs::Metadata>` already uses
//! (`mode & 0o777`, owner/group/other nibbles).

bitflags::bitflags! {
    pub struct Access: u8 {
        const READ    = 0b100;
        const WRITE   = 0b010;
        const EXECUTE = 0b001;
    }
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
    pub groups: Vec<u32>,
}

impl Identity {
    pub fn new(uid: u32, gid: u32) -> Self {
        Identity {
            uid,
            gid,
            groups: Vec::new(),
        }
    }

    fn in_group(&self, gid: u32) -> bool {
        self.gid == gid || self.groups.contains(&gid)
    }

    /// Consult owner bits if `uid` matches, group bits if `gid`
    /// matches (or `uid` is in a supplementary group), other bits
    /// otherwise. `allow_root` governs whether uid 0 bypasses the
    /// check entirely (spec.md §4.5, and spec.md §9 Open Question 1:
    /// the switch is implemented as described, with no additional
    /// real-root detection).
    pub fn check(&self, mode: u32, owner_uid: u32, owner_gid: u32, want: Access, allow_root: bool) -> bool {
        if allow_root && self.uid == 0 {
            return true;
        }
        let bits = if self.uid == owner_uid {
            (mode >> 6) & 0o7
        } else if self.in_group(owner_gid) {
            (mode >> 3) & 0o7
        } else {
            mode & 0o7
        };
        (bits as u8 & want.bits()) == want.bits()
    }

    /// Whether `self` may delete/rename `entry_owner_uid`'s entry
    /// inside a sticky directory owned by `dir_owner_uid` (Linux
    /// sticky-bit-owner rule, spec.md §4.5).
    pub fn sticky_allows(&self, dir_owner_uid: u32, entry_owner_uid: u32, allow_root: bool) -> bool {
        if allow_root && self.uid == 0 {
            return true;
        }
        self.uid == dir_owner_uid || self.uid == entry_owner_uid
    }
}

/// Apply `umask` to a requested creation mode (spec.md §4.5).
pub fn apply_umask(requested_mode: u32, umask: u32) -> u32 {
    requested_mode & !umask & 0o7777
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_bits_checked_when_uid_matches() {
        let id = Identity::new(1000, 1000);
        assert!(id.check(0o600, 1000, 1000, Access::READ | Access::WRITE, false));
        assert!(!id.check(0o600, 1000, 1000, Access::EXECUTE, false));
    }

    #[test]
    fn other_bits_checked_for_unrelated_identity() {
        let id = Identity::new(2000, 2000);
        assert!(id.check(0o644, 1000, 1000, Access::READ, false));
        assert!(!id.check(0o640, 1000, 1000, Access::READ, false));
    }

    #[test]
    fn root_bypasses_when_allowed() {
        let id = Identity::new(0, 0);
        assert!(id.check(0o000, 1000, 1000, Access::READ | Access::WRITE | Access::EXECUTE, true));
        assert!(!id.check(0o000, 1000, 1000, Access::READ, false));
    }

    #[test]
    fn umask_clears_bits() {
        assert_eq!(apply_umask(0o777, 0o022), 0o755);
        assert_eq!(apply_umask(0o666, 0o022), 0o644);
    }
}
