//! Path Engine (spec.md §4.1): parses, splits, joins, normalizes and
//! compares paths under an active OS profile, without touching the
//! inode tree.

/// The emulated OS. Selecting a profile changes separators, case
/// sensitivity defaults, drive-letter handling and reserved names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    Linux,
    MacOs,
    Windows,
}

impl Profile {
    pub fn is_windows(self) -> bool {
        matches!(self, Profile::Windows)
    }

    /// Default case sensitivity before any explicit override.
    pub fn default_case_sensitive(self) -> bool {
        match self {
            Profile::Linux => true,
            Profile::MacOs => false,
            Profile::Windows => false,
        }
    }

    pub fn default_separator(self) -> char {
        if self.is_windows() {
            '\\'
        } else {
            '/'
        }
    }

    pub fn default_alternative_separator(self) -> Option<char> {
        if self.is_windows() {
            Some('/')
        } else {
            None
        }
    }
}

/// Windows reserved device names (with or without an extension), per
/// spec.md §4.1. The Path Engine does not reject them — the Resolver
/// decides what they map to.
pub const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

pub fn is_windows_reserved_name(component: &str) -> bool {
    let stem = component.split('.').next().unwrap_or(component);
    WINDOWS_RESERVED_NAMES
        .iter()
        .any(|n| n.eq_ignore_ascii_case(stem))
}

/// A path engine bound to one profile's separator/case conventions.
#[derive(Debug, Clone, Copy)]
pub struct PathEngine {
    pub profile: Profile,
    pub separator: char,
    pub alternative_separator: Option<char>,
    pub case_sensitive: bool,
}

impl PathEngine {
    pub fn new(profile: Profile) -> Self {
        PathEngine {
            profile,
            separator: profile.default_separator(),
            alternative_separator: profile.default_alternative_separator(),
            case_sensitive: profile.default_case_sensitive(),
        }
    }

    fn is_sep(&self, c: char) -> bool {
        c == self.separator || self.alternative_separator == Some(c)
    }

    /// Normalize all accepted separators to the primary one.
    fn normalize_seps(&self, path: &str) -> String {
        if let Some(alt) = self.alternative_separator {
            path.chars()
                .map(|c| if c == alt { self.separator } else { c })
                .collect()
        } else {
            path.to_string()
        }
    }

    /// `split_drive(path) -> (drive, tail)`. Recognizes `X:`,
    /// `\\server\share` and a leading `//` only under the Windows
    /// profile; POSIX always returns an empty drive.
    pub fn split_drive<'a>(&self, path: &'a str) -> (&'a str, &'a str) {
        if !self.profile.is_windows() {
            return ("", path);
        }
        let sep = self.separator;
        let bytes: Vec<char> = path.chars().collect();
        // UNC path: \\server\share\...
        if bytes.len() >= 2 && self.is_sep(bytes[0]) && self.is_sep(bytes[1]) {
            // find the end of \\server\share
            let rest = &path[2..];
            let mut parts = 0;
            let mut idx = 2;
            let mut chars = rest.char_indices();
            while let Some((i, c)) = chars.next() {
                if self.is_sep(c) {
                    parts += 1;
                    idx = 2 + i;
                    if parts == 2 {
                        return (&path[..idx], &path[idx..]);
                    }
                }
            }
            return (path, "");
        }
        // Drive letter: X:
        if bytes.len() >= 2 && bytes[1] == ':' {
            let drive_end = path
                .char_indices()
                .nth(2)
                .map(|(i, _)| i)
                .unwrap_or(path.len());
            return (&path[..drive_end], &path[drive_end..]);
        }
        let _ = sep;
        ("", path)
    }

    pub fn isabs(&self, path: &str) -> bool {
        let (_, tail) = self.split_drive(path);
        tail.chars().next().map(|c| self.is_sep(c)).unwrap_or(false)
    }

    /// `components(path) -> sequence`: ordered segments with empty
    /// segments collapsed, drive/root preserved as the first element
    /// when present.
    pub fn components(&self, path: &str) -> Vec<String> {
        let normalized = self.normalize_seps(path);
        let (drive, tail) = self.split_drive(&normalized);
        let mut parts = Vec::new();
        if !drive.is_empty() {
            parts.push(drive.to_string());
        }
        if tail.chars().next().map(|c| self.is_sep(c)).unwrap_or(false) {
            parts.push(self.separator.to_string());
        }
        for seg in tail.split(self.separator) {
            if !seg.is_empty() {
                parts.push(seg.to_string());
            }
        }
        parts
    }

    pub fn join(&self, base: &str, tail: &str) -> String {
        if tail.is_empty() {
            return base.to_string();
        }
        if self.isabs(tail) {
            return tail.to_string();
        }
        if base.is_empty() {
            return tail.to_string();
        }
        let mut result = base.to_string();
        if !result.chars().last().map(|c| self.is_sep(c)).unwrap_or(false) {
            result.push(self.separator);
        }
        result.push_str(tail);
        result
    }

    /// `split(path) -> (head, tail)`: head is everything before the
    /// final separator (drive/root preserved), tail is the final
    /// component.
    pub fn split<'a>(&self, path: &'a str) -> (String, &'a str) {
        let (drive, tail) = self.split_drive(path);
        match tail.rfind(self.is_sep_closure()) {
            Some(pos) => {
                let mut head = String::new();
                head.push_str(drive);
                head.push_str(&tail[..=pos]);
                let trimmed = head.trim_end_matches(self.separator).to_string();
                // Trimming the separator(s) off an absolute path's head
                // can eat the root marker entirely (POSIX `/`) or leave
                // a bare drive letter with no trailing separator
                // (Windows `C:`) — in both cases the true head is the
                // drive plus exactly one separator, matching how
                // `ntpath`/`posixpath` keep the root in `split`.
                let is_root = trimmed.len() == drive.len()
                    && tail[..=pos].chars().next().map(|c| self.is_sep(c)).unwrap_or(false);
                let head = if is_root {
                    format!("{}{}", drive, self.separator)
                } else {
                    trimmed
                };
                (head, &tail[pos + 1..])
            }
            None => (drive.to_string(), tail),
        }
    }

    fn is_sep_closure(&self) -> impl Fn(char) -> bool + '_ {
        move |c| self.is_sep(c)
    }

    pub fn basename<'a>(&self, path: &'a str) -> &'a str {
        self.split(path).1
    }

    pub fn dirname(&self, path: &str) -> String {
        self.split(path).0
    }

    /// Collapse `.`, resolve `..` lexically (no symlink awareness —
    /// that is the Resolver's job), collapse repeated separators.
    pub fn normpath(&self, path: &str) -> String {
        if path.is_empty() {
            return ".".to_string();
        }
        let (drive, tail) = self.split_drive(path);
        let absolute = tail.chars().next().map(|c| self.is_sep(c)).unwrap_or(false);
        let normalized = self.normalize_seps(tail);
        let mut stack: Vec<&str> = Vec::new();
        for seg in normalized.split(self.separator) {
            match seg {
                "" | "." => continue,
                ".." => {
                    if let Some(last) = stack.last() {
                        if *last != ".." {
                            stack.pop();
                            continue;
                        }
                    }
                    if !absolute {
                        stack.push("..");
                    }
                }
                seg => stack.push(seg),
            }
        }
        let mut result = String::new();
        result.push_str(drive);
        if absolute {
            result.push(self.separator);
        }
        result.push_str(&stack.join(&self.separator.to_string()));
        if result.is_empty() {
            ".".to_string()
        } else {
            result
        }
    }

    /// Longest common path prefix, component-wise.
    pub fn commonpath(&self, paths: &[&str]) -> Option<String> {
        if paths.is_empty() {
            return None;
        }
        let mut common = self.components(paths[0]);
        for p in &paths[1..] {
            let comps = self.components(p);
            let n = common.len().min(comps.len());
            let mut i = 0;
            while i < n && self.matches(&common[i], &comps[i]) {
                i += 1;
            }
            common.truncate(i);
        }
        if common.is_empty() {
            return Some(String::new());
        }
        Some(common.join(&self.separator.to_string()))
    }

    /// Locale-independent case fold for comparisons, applied under
    /// non-case-sensitive profiles.
    pub fn fold_case(&self, name: &str) -> String {
        name.to_lowercase()
    }

    /// Component equality under the active case policy.
    pub fn matches(&self, a: &str, b: &str) -> bool {
        if self.case_sensitive {
            a == b
        } else {
            self.fold_case(a) == self.fold_case(b)
        }
    }
}

/// Encode a decoded path string to bytes per the profile's filesystem
/// encoding. POSIX: UTF-8. Windows: UTF-8 is used as the in-memory
/// representation too (surrogate passthrough is approximated by
/// accepting any `char`, including lone surrogates represented via
/// WTF-8-like escaping is out of scope for a hosted Rust `String`;
/// callers that need literal surrogate passthrough should use
/// `encode_lossy`/`decode_lossy` and accept replacement on round-trip
/// of unpaired surrogates).
pub fn encode(path: &str) -> Vec<u8> {
    path.as_bytes().to_vec()
}

pub fn decode(bytes: &[u8]) -> Result<String, std::string::FromUtf8Error> {
    String::from_utf8(bytes.to_vec())
}

pub fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posix() -> PathEngine {
        PathEngine::new(Profile::Linux)
    }

    fn windows() -> PathEngine {
        PathEngine::new(Profile::Windows)
    }

    #[test]
    fn posix_split_join_roundtrip() {
        let e = posix();
        let p = "/a/b/c.txt";
        let (head, tail) = e.split(p);
        assert_eq!(tail, "c.txt");
        assert_eq!(e.normpath(&e.join(&head, tail)), e.normpath(p));
    }

    #[test]
    fn posix_basename_dirname() {
        let e = posix();
        assert_eq!(e.basename("/a/b/c.txt"), "c.txt");
        assert_eq!(e.dirname("/a/b/c.txt"), "/a/b");
        assert_eq!(e.basename("/a"), "a");
        assert_eq!(e.dirname("/a"), "/");
    }

    #[test]
    fn posix_normpath_dotdot() {
        let e = posix();
        assert_eq!(e.normpath("/a/b/../c"), "/a/c");
        assert_eq!(e.normpath("/a/./b/"), "/a/b");
        assert_eq!(e.normpath("a/../../b"), "../b");
        assert_eq!(e.normpath(""), ".");
    }

    #[test]
    fn posix_isabs() {
        let e = posix();
        assert!(e.isabs("/a/b"));
        assert!(!e.isabs("a/b"));
    }

    #[test]
    fn posix_no_drive() {
        let e = posix();
        assert_eq!(e.split_drive("C:/foo"), ("", "C:/foo"));
    }

    #[test]
    fn windows_drive_letter() {
        let e = windows();
        assert_eq!(e.split_drive("C:\\foo\\bar"), ("C:", "\\foo\\bar"));
        assert!(e.isabs("C:\\foo"));
        assert!(!e.isabs("C:foo"));
    }

    #[test]
    fn windows_alt_separator() {
        let e = windows();
        assert_eq!(e.components("C:/foo/bar"), vec!["C:", "\\", "foo", "bar"]);
    }

    #[test]
    fn windows_unc_path() {
        let e = windows();
        let (drive, tail) = e.split_drive("\\\\server\\share\\dir");
        assert_eq!(drive, "\\\\server\\share");
        assert_eq!(tail, "\\dir");
    }

    #[test]
    fn case_fold_matches() {
        let mut e = windows();
        e.case_sensitive = false;
        assert!(e.matches("Foo.TXT", "foo.txt"));
        let mut e2 = posix();
        e2.case_sensitive = true;
        assert!(!e2.matches("Foo", "foo"));
    }

    #[test]
    fn reserved_names() {
        assert!(is_windows_reserved_name("CON"));
        assert!(is_windows_reserved_name("com1.txt"));
        assert!(!is_windows_reserved_name("console"));
    }

    #[test]
    fn commonpath_basic() {
        let e = posix();
        let common = e.commonpath(&["/a/b/c", "/a/b/d", "/a/b"]).unwrap();
        assert_eq!(common, "/a/b");
    }
}
