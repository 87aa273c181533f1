//! Engine-level scenario tests, covering the concrete walkthroughs and
//! quantified invariants every lower-crate unit test is too narrow to
//! exercise on its own (round-tripping through `Engine`'s locking and
//! resolver together).

use crate::{errno, AccessMode, Config, Engine, NewlinePolicy, OpenFlags};
use vfs_core::{FileType, FsErrorKind, PathEngine, Profile};

fn linux_engine() -> Engine {
    Engine::new(Config::new(Profile::Linux))
}

#[test]
fn basic_file_round_trip() {
    let engine = linux_engine();
    engine.create_dir("/test", 0o755, true).unwrap();
    engine
        .create_file("/test/file.txt", Some(b"hello".to_vec()), None, 0o644, false)
        .unwrap();

    assert_eq!(engine.stat("/test/file.txt").unwrap().size, 5);

    let fd = engine
        .open("/test/file.txt", AccessMode::ReadOnly, OpenFlags::empty(), 0, NewlinePolicy::Binary)
        .unwrap();
    assert_eq!(engine.read(fd, 4096).unwrap(), b"hello");
    engine.close(fd).unwrap();

    assert_eq!(engine.listdir("/test").unwrap(), vec!["file.txt".to_string()]);
}

#[test]
fn disk_full_rejects_whole_write_and_keeps_file_empty() {
    let engine = linux_engine();
    engine.set_disk_usage("/", 100).unwrap();
    engine.create_dir("/foo", 0o755, false).unwrap();

    let fd = engine
        .open(
            "/foo/bar.txt",
            AccessMode::WriteOnly,
            OpenFlags::CREATE,
            0o644,
            NewlinePolicy::Binary,
        )
        .unwrap();
    let payload = vec![b'a'; 200];
    let err = engine.write(fd, &payload).unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::NoSpace);
    assert_eq!(errno::errno(err.kind()), 28);
    engine.close(fd).unwrap();

    let fd = engine
        .open("/foo/bar.txt", AccessMode::ReadOnly, OpenFlags::empty(), 0, NewlinePolicy::Binary)
        .unwrap();
    assert_eq!(engine.read(fd, 4096).unwrap(), Vec::<u8>::new());
    engine.close(fd).unwrap();
}

#[test]
fn cross_mount_rename_is_rejected() {
    let engine = linux_engine();
    engine.add_mount_point("/mnt", 1 << 20).unwrap();
    engine.create_file("/mnt/a", None, None, 0o644, false).unwrap();

    let err = engine.rename("/mnt/a", "/other").unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::CrossDevice);
    assert_eq!(errno::errno(err.kind()), 18);
}

#[test]
fn hard_link_count_and_disk_usage() {
    let engine = linux_engine();
    engine
        .create_file("/a", Some(b"xyz".to_vec()), None, 0o644, false)
        .unwrap();
    engine.create_link("/b", "/a", false).unwrap();
    engine.create_link("/c", "/a", false).unwrap();

    assert_eq!(engine.stat("/a").unwrap().nlinks, 3);
    assert_eq!(engine.get_disk_usage("/").unwrap().1, 3);

    engine.unlink("/b").unwrap();
    assert_eq!(engine.stat("/a").unwrap().nlinks, 2);
    assert_eq!(engine.get_disk_usage("/").unwrap().1, 3);
}

#[test]
fn self_referential_symlink_raises_eloop_on_open() {
    let engine = linux_engine();
    engine.create_symlink("/lnk", "/lnk", false).unwrap();

    let err = engine
        .open("/lnk", AccessMode::ReadOnly, OpenFlags::empty(), 0, NewlinePolicy::Binary)
        .unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::LinkLoop);
    assert_eq!(errno::errno(err.kind()), 40);
}

#[test]
fn windows_case_insensitive_lookup() {
    let engine = Engine::new(Config::new(Profile::Windows));
    engine
        .create_file("C:\\Foo\\Bar.TXT", Some(b"x".to_vec()), None, 0o644, true)
        .unwrap();

    let fd = engine
        .open("c:/foo/bar.txt", AccessMode::ReadOnly, OpenFlags::empty(), 0, NewlinePolicy::Binary)
        .unwrap();
    assert_eq!(engine.read(fd, 4096).unwrap(), b"x");
    engine.close(fd).unwrap();

    assert_eq!(engine.stat("C:\\FOO\\BAR.TXT").unwrap().type_, FileType::RegularFile);
}

#[test]
fn closed_descriptor_is_bad_descriptor_on_reuse() {
    let engine = linux_engine();
    engine.create_file("/a", Some(b"hi".to_vec()), None, 0o644, false).unwrap();
    let fd = engine
        .open("/a", AccessMode::ReadOnly, OpenFlags::empty(), 0, NewlinePolicy::Binary)
        .unwrap();
    engine.close(fd).unwrap();

    let err = engine.read(fd, 10).unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::BadDescriptor);
    let err = engine.write(fd, b"x").unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::BadDescriptor);
}

#[test]
fn append_mode_write_lands_after_intervening_seek() {
    let engine = linux_engine();
    engine
        .create_file("/a", Some(b"0123456789".to_vec()), None, 0o644, false)
        .unwrap();
    let fd = engine
        .open("/a", AccessMode::WriteOnly, OpenFlags::APPEND, 0, NewlinePolicy::Binary)
        .unwrap();
    engine.seek(fd, 0, false, false).unwrap();
    let n = engine.write(fd, b"tail").unwrap();
    assert_eq!(n, 4);
    engine.close(fd).unwrap();

    assert_eq!(engine.stat("/a").unwrap().size, 14);
    let fd = engine.open("/a", AccessMode::ReadOnly, OpenFlags::empty(), 0, NewlinePolicy::Binary).unwrap();
    let contents = engine.read(fd, 4096).unwrap();
    assert_eq!(&contents[contents.len() - 4..], b"tail");
}

#[test]
fn unlinked_open_file_frees_bytes_only_after_last_close() {
    let engine = linux_engine();
    engine
        .create_file("/a", Some(b"xyz".to_vec()), None, 0o644, false)
        .unwrap();
    let fd = engine.open("/a", AccessMode::ReadOnly, OpenFlags::empty(), 0, NewlinePolicy::Binary).unwrap();

    engine.unlink("/a").unwrap();
    assert_eq!(engine.get_disk_usage("/").unwrap().1, 3);
    assert_eq!(engine.read(fd, 4096).unwrap(), b"xyz");

    engine.close(fd).unwrap();
    assert_eq!(engine.get_disk_usage("/").unwrap().1, 0);
}

#[test]
fn symlink_readlink_returns_target_unnormalized() {
    let engine = linux_engine();
    engine.create_dir("/a/b", 0o755, true).unwrap();
    engine.create_symlink("/lnk", "/a/./b/../b", false).unwrap();
    assert_eq!(engine.readlink("/lnk").unwrap(), "/a/./b/../b");
}

#[test]
fn rename_preserves_inode_identity() {
    let engine = linux_engine();
    engine.create_file("/a", Some(b"hi".to_vec()), None, 0o644, false).unwrap();
    let before = engine.stat("/a").unwrap().inode;
    engine.rename("/a", "/b").unwrap();
    let after = engine.stat("/b").unwrap().inode;
    assert_eq!(before, after);
    assert!(engine.stat("/a").is_err());
}

#[test]
fn chmod_sets_exact_mode_bits_overriding_umask() {
    let engine = linux_engine();
    engine.create_file("/a", None, None, 0o644, false).unwrap();
    engine.chmod("/a", 0o700, true).unwrap();
    assert_eq!(engine.stat("/a").unwrap().mode & 0o7777, 0o700);
}

#[test]
fn new_file_mode_reflects_umask() {
    let engine = linux_engine();
    engine.create_file("/a", None, None, 0o666, false).unwrap();
    // default umask 0o022: 0o666 & !0o022 == 0o644.
    assert_eq!(engine.stat("/a").unwrap().mode & 0o7777, 0o644);
}

#[test]
fn normpath_join_dirname_basename_roundtrip() {
    let e = PathEngine::new(Profile::Linux);
    for p in ["/a/b/c.txt", "/a", "/", "/a/b/../c", "a/b"] {
        let dir = e.dirname(p);
        let base = e.basename(p);
        assert_eq!(e.normpath(&e.join(&dir, base)), e.normpath(p));
    }
}

#[test]
fn real_file_import_is_read_through_and_never_written_back() {
    let dir = tempfile::tempdir().unwrap();
    let real_path = dir.path().join("host.txt");
    std::fs::write(&real_path, b"host bytes").unwrap();

    let engine = linux_engine();
    engine
        .add_real_file(real_path.to_str().unwrap(), Some("/imported.txt"))
        .unwrap();

    let fd = engine
        .open("/imported.txt", AccessMode::ReadOnly, OpenFlags::empty(), 0, NewlinePolicy::Binary)
        .unwrap();
    assert_eq!(engine.read(fd, 4096).unwrap(), b"host bytes");
    engine.close(fd).unwrap();

    // Imported mode/uid/gid mirror the host file, which may not be
    // owned by this engine's identity; widen the mode so the write
    // below isn't gated by whatever the host file's owner bits are.
    engine.chmod("/imported.txt", 0o666, true).unwrap();
    let fd = engine
        .open("/imported.txt", AccessMode::WriteOnly, OpenFlags::TRUNC, 0, NewlinePolicy::Binary)
        .unwrap();
    engine.write(fd, b"fake bytes").unwrap();
    engine.close(fd).unwrap();

    assert_eq!(std::fs::read(&real_path).unwrap(), b"host bytes");
}

#[test]
fn empty_directory_required_for_rmdir() {
    let engine = linux_engine();
    engine.create_dir("/d", 0o755, false).unwrap();
    engine.create_file("/d/f", None, None, 0o644, false).unwrap();

    let err = engine.rmdir("/d", false).unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::NotEmpty);

    engine.unlink("/d/f").unwrap();
    engine.rmdir("/d", false).unwrap();
    assert!(engine.stat("/d").is_err());
}

#[test]
fn creation_denied_without_write_on_parent() {
    let engine = linux_engine();
    engine.create_dir("/d", 0o755, false).unwrap();
    engine.chmod("/d", 0o555, true).unwrap();

    let err = engine.create_file("/d/f", None, None, 0o644, false).unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::PermissionDenied);
}

#[test]
fn deletion_denied_without_write_on_parent() {
    let engine = linux_engine();
    engine.create_dir("/d", 0o755, false).unwrap();
    engine.create_file("/d/f", None, None, 0o644, false).unwrap();
    engine.chmod("/d", 0o555, true).unwrap();

    let err = engine.unlink("/d/f").unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::PermissionDenied);
}

#[test]
fn sticky_bit_blocks_unlink_by_non_owner() {
    let engine = linux_engine();
    engine.create_dir("/d", 0o1777, false).unwrap();
    engine.create_file("/d/f", None, None, 0o666, false).unwrap();
    // Neither the directory nor the file is owned by this identity
    // anymore, so the sticky bit's owner rule applies.
    engine.chown("/d", 9001, 9001, true).unwrap();
    engine.chown("/d/f", 9002, 9002, true).unwrap();

    let err = engine.unlink("/d/f").unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::PermissionDenied);
}

#[test]
fn traversal_denied_without_execute_on_intermediate_dir() {
    let engine = linux_engine();
    engine.create_dir("/a/b", 0o755, true).unwrap();
    engine.chmod("/a", 0o644, true).unwrap();

    let err = engine.stat("/a/b").unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::PermissionDenied);
}

#[test]
fn windows_drive_letter_auto_mounts_lazily() {
    let engine = Engine::new(Config::new(Profile::Windows));
    engine.create_file("D:\\foo.txt", Some(b"x".to_vec()), None, 0o644, true).unwrap();

    let (total, used, _) = engine.get_disk_usage("D:\\").unwrap();
    assert_eq!(total, vfs_mount::DEFAULT_WINDOWS_DRIVE_BYTES);
    assert_eq!(used, 1);
}

#[test]
fn windows_chmod_preserves_readability_unless_forced() {
    let engine = Engine::new(Config::new(Profile::Windows));
    engine.create_file("C:\\a.txt", None, None, 0o644, true).unwrap();
    engine.chmod("C:\\a.txt", 0o000, true).unwrap();
    assert_eq!(engine.stat("C:\\a.txt").unwrap().mode & 0o7777, 0o555);

    let mut config = Config::new(Profile::Windows);
    config.force_unix_mode = true;
    let engine = Engine::new(config);
    engine.create_file("C:\\a.txt", None, None, 0o644, true).unwrap();
    engine.chmod("C:\\a.txt", 0o000, true).unwrap();
    assert_eq!(engine.stat("C:\\a.txt").unwrap().mode & 0o7777, 0o000);
}

#[test]
fn scandir_yields_insertion_order_with_lazy_stat() {
    let engine = linux_engine();
    engine.create_dir("/d", 0o755, false).unwrap();
    engine.create_file("/d/b", Some(b"xy".to_vec()), None, 0o644, false).unwrap();
    engine.create_file("/d/a", None, None, 0o644, false).unwrap();

    let entries = engine.scandir("/d").unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["b", "a"]);
    assert_eq!(entries[0].metadata().unwrap().size, 2);
    assert!(entries[0].is_file().unwrap());
}

#[test]
fn universal_newline_translation_round_trips_through_host_native_ending() {
    let engine = Engine::new(Config::new(Profile::Windows));
    engine.create_file("C:\\a.txt", None, None, 0o644, true).unwrap();

    let fd = engine
        .open(
            "C:\\a.txt",
            AccessMode::WriteOnly,
            OpenFlags::TRUNC,
            0,
            NewlinePolicy::Universal,
        )
        .unwrap();
    engine.write(fd, b"line1\nline2").unwrap();
    engine.close(fd).unwrap();

    // On disk the Windows profile stores host-native CRLF line endings.
    let fd = engine
        .open("C:\\a.txt", AccessMode::ReadOnly, OpenFlags::empty(), 0, NewlinePolicy::Binary)
        .unwrap();
    let raw = engine.read(fd, 4096).unwrap();
    engine.close(fd).unwrap();
    assert_eq!(raw, b"line1\r\nline2");

    let fd = engine
        .open(
            "C:\\a.txt",
            AccessMode::ReadOnly,
            OpenFlags::empty(),
            0,
            NewlinePolicy::Universal,
        )
        .unwrap();
    let decoded = engine.read(fd, 4096).unwrap();
    engine.close(fd).unwrap();
    assert_eq!(decoded, b"line1\nline2");
}
