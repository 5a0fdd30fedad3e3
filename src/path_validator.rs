//! Ancestor-chain trust validation (spec.md 4.1).
//!
//! Given an absolute path, every directory between the filesystem root and
//! the path's parent must be a real directory (never a symlink), owned by
//! uid 0, and free of group/other write bits. This is what makes a setuid
//! chroot helper safe: an unprivileged caller cannot have planted a
//! writable or symlinked directory anywhere along the trusted prefix.

use std::path::Path;

use nix::sys::stat::{SFlag, lstat};

use crate::error::UserchrootError;

/// Derived, on-demand fact about a single directory (spec.md 3, Directory
/// fact). Never follows a symlink to produce it.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryFact {
    pub owner_uid: u32,
    pub mode_bits: u32,
    pub inode: u64,
    pub device: u64,
}

/// Link-stat `path` and assert it is a directory with no group/other write
/// bits. Never follows symlinks -- a symlink anywhere is rejected here.
pub fn stat_directory(path: &Path) -> Result<DirectoryFact, UserchrootError> {
    let st = lstat(path).map_err(|e| UserchrootError::stat(path, e.into()))?;

    let mode = st.st_mode;
    if SFlag::from_bits_truncate(mode) & SFlag::S_IFMT != SFlag::S_IFDIR {
        return Err(UserchrootError::NotADirectory(path.to_path_buf()));
    }
    if mode & 0o022 != 0 {
        return Err(UserchrootError::WritableByOthers(path.to_path_buf()));
    }

    Ok(DirectoryFact {
        owner_uid: st.st_uid,
        mode_bits: mode as u32,
        inode: st.st_ino,
        device: st.st_dev,
    })
}

/// Same as [`stat_directory`] but additionally requires uid 0 ownership --
/// the trust condition for every directory on the chain to a chroot target
/// or to the configuration file.
fn stat_root_owned_directory(path: &Path) -> Result<DirectoryFact, UserchrootError> {
    let fact = stat_directory(path)?;
    if fact.owner_uid != 0 {
        return Err(UserchrootError::NotRootOwned(path.to_path_buf()));
    }
    Ok(fact)
}

/// Walk every ancestor of `path`, from its immediate parent up to and
/// including the filesystem root, asserting each is a root-owned,
/// non-group/other-writable real directory.
///
/// `path` itself is not checked here -- its own stat is the caller's
/// responsibility (the target/base directory is checked against a
/// different, non-root ownership rule in the authorizer).
pub fn verify_ancestors(path: &Path) -> Result<(), UserchrootError> {
    assert!(path.is_absolute(), "verify_ancestors requires an absolute path");

    let mut current = path.to_path_buf();
    loop {
        let Some(parent) = current.parent() else {
            break;
        };
        stat_root_owned_directory(parent)?;
        if parent == Path::new("/") {
            break;
        }
        current = parent.to_path_buf();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt as _;

    fn mode_of(p: &Path) -> u32 {
        fs::metadata(p).unwrap().permissions().mode() & 0o7777
    }

    #[test]
    fn root_is_always_reachable_and_checkable() {
        // "/" on any Unix test runner is root-owned; this exercises the
        // termination condition directly.
        let fact = stat_directory(Path::new("/")).unwrap();
        assert_eq!(fact.owner_uid, 0);
    }

    #[test]
    fn rejects_group_writable_ancestor() {
        let tmp = tempfile::tempdir().unwrap();
        let writable = tmp.path().join("writable");
        fs::create_dir(&writable).unwrap();
        fs::set_permissions(&writable, fs::Permissions::from_mode(0o775)).unwrap();
        assert_eq!(mode_of(&writable) & 0o022, 0o020);

        let err = stat_directory(&writable).unwrap_err();
        assert!(matches!(err, UserchrootError::WritableByOthers(_)));
    }

    #[test]
    fn accepts_0o755() {
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("ok");
        fs::create_dir(&d).unwrap();
        fs::set_permissions(&d, fs::Permissions::from_mode(0o755)).unwrap();
        stat_directory(&d).unwrap();
    }

    #[test]
    fn rejects_non_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let f = tmp.path().join("file");
        fs::write(&f, b"hi").unwrap();
        let err = stat_directory(&f).unwrap_err();
        assert!(matches!(err, UserchrootError::NotADirectory(_)));
    }

    #[test]
    fn rejects_symlink_as_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let real = tmp.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        // lstat on a symlink reports S_IFLNK, not S_IFDIR -- rejected
        // before ever following it.
        let err = stat_directory(&link).unwrap_err();
        assert!(matches!(err, UserchrootError::NotADirectory(_)));
    }
}
