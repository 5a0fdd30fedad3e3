//! Fundamental device provisioner (spec.md 4.4).
//!
//! Creates or removes the fixed device-node set a minimal chroot image
//! needs (`/dev/null`, `/dev/zero`, `/dev/random`, `/dev/urandom`) plus,
//! on Linux, a writable `/dev/shm`. Runs only under root authority and
//! only on behalf of the chroot's owning user (enforced by the caller,
//! not by this module, which has no notion of "the invoking user").
//!
//! Two strategies are supported; exactly one is compiled in, selected by
//! the `loopback-devices` Cargo feature (spec.md 9: "a tagged choice with
//! a single point of decision at build configuration").

use std::fs;
use std::path::{Path, PathBuf};

use nix::sys::stat::{Mode, SFlag, lstat, mknod, stat, umask};

use crate::error::UserchrootError;

#[cfg(all(feature = "loopback-devices", not(target_os = "linux")))]
compile_error!("loopback-devices requires a Linux host (bind mounts via nix::mount)");

/// Creation mask while provisioning: blocks group permissions entirely so
/// group-ownership inherited from the invoking user can't grant
/// unintended access to a node it doesn't actually own.
const DEVICE_UMASK: Mode = Mode::from_bits_truncate(0o070);

/// The fixed device set from spec.md 4.4 and 6.
const DEVICES: &[&str] = &["/dev/null", "/dev/zero", "/dev/random", "/dev/urandom"];

/// Shared-memory mount size, matching spec.md's 128 MiB design default.
const SHM_SIZE_OPT: &str = "size=128m";

/// Install the fixed device set (and, on Linux, `/dev/shm`) inside the
/// chroot rooted at `chroot_root`.
pub fn install(chroot_root: &Path) -> Result<(), UserchrootError> {
    let previous_umask = umask(DEVICE_UMASK);
    let result = install_inner(chroot_root);
    umask(previous_umask);
    result
}

fn install_inner(chroot_root: &Path) -> Result<(), UserchrootError> {
    for device in DEVICES {
        create_device(chroot_root, device)?;
    }
    install_shm(chroot_root)?;
    Ok(())
}

/// Remove the fixed device set (and, on Linux, `/dev/shm`). The exact
/// inverse of [`install`]: device nodes first, shared memory last.
pub fn uninstall(chroot_root: &Path) -> Result<(), UserchrootError> {
    for device in DEVICES {
        remove_device(chroot_root, device)?;
    }
    uninstall_shm(chroot_root)?;
    Ok(())
}

fn chroot_side_path(chroot_root: &Path, device_path: &str) -> PathBuf {
    chroot_root.join(device_path.trim_start_matches('/'))
}

#[cfg(not(feature = "loopback-devices"))]
fn create_device(chroot_root: &Path, device_path: &str) -> Result<(), UserchrootError> {
    let final_path = chroot_side_path(chroot_root, device_path);

    if lstat(&final_path).is_ok() {
        return Err(UserchrootError::DeviceAlreadyExists(final_path));
    }

    let real = stat(Path::new(device_path))
        .map_err(|_| UserchrootError::DeviceSourceMissing(PathBuf::from(device_path)))?;

    let kind = SFlag::from_bits_truncate(real.st_mode) & SFlag::S_IFMT;
    let perm = Mode::from_bits_truncate(real.st_mode & 0o7777);
    mknod(&final_path, kind, perm, real.st_rdev)
        .map_err(|e| UserchrootError::mount(format!("mknod {}", final_path.display()), e))?;
    Ok(())
}

#[cfg(not(feature = "loopback-devices"))]
fn remove_device(chroot_root: &Path, device_path: &str) -> Result<(), UserchrootError> {
    let final_path = chroot_side_path(chroot_root, device_path);
    fs::remove_file(&final_path)
        .map_err(|e| UserchrootError::io(format!("unlink {}", final_path.display()), e))
}

#[cfg(all(feature = "loopback-devices", target_os = "linux"))]
fn create_device(chroot_root: &Path, device_path: &str) -> Result<(), UserchrootError> {
    use nix::mount::{MsFlags, mount};

    let final_path = chroot_side_path(chroot_root, device_path);
    if lstat(&final_path).is_ok() {
        return Err(UserchrootError::DeviceAlreadyExists(final_path));
    }
    stat(Path::new(device_path))
        .map_err(|_| UserchrootError::DeviceSourceMissing(PathBuf::from(device_path)))?;

    fs::create_dir(&final_path)
        .map_err(|e| UserchrootError::io(format!("mkdir {}", final_path.display()), e))?;
    mount(
        Some(Path::new(device_path)),
        &final_path,
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    )
    .map_err(|e| UserchrootError::mount(format!("loopback mount {}", final_path.display()), e))
}

#[cfg(all(feature = "loopback-devices", target_os = "linux"))]
fn remove_device(chroot_root: &Path, device_path: &str) -> Result<(), UserchrootError> {
    use nix::mount::umount;

    let final_path = chroot_side_path(chroot_root, device_path);
    umount(&final_path)
        .map_err(|e| UserchrootError::mount(format!("umount {}", final_path.display()), e))?;
    fs::remove_dir(&final_path)
        .map_err(|e| UserchrootError::io(format!("rmdir {}", final_path.display()), e))
}

#[cfg(target_os = "linux")]
fn install_shm(chroot_root: &Path) -> Result<(), UserchrootError> {
    use nix::mount::{MntFlags, MsFlags, mount, umount2};
    use nix::unistd::{Gid, Uid, chown};
    use std::os::unix::fs::PermissionsExt as _;

    let shm_path = chroot_root.join("dev/shm");

    // Best-effort cleanup of a leftover mount from a prior run.
    let _ = umount2(&shm_path, MntFlags::MNT_FORCE);
    let _ = fs::remove_dir(&shm_path);

    // spec.md's flagged Open Question: the original prints a failure here
    // but proceeds to mount over the directory regardless. This
    // implementation aborts instead, the safer of the two options
    // spec.md offers (see SPEC_FULL.md 4.4).
    fs::create_dir(&shm_path)
        .map_err(|e| UserchrootError::io(format!("mkdir {}", shm_path.display()), e))?;

    let perms = 0o1777;
    chown(&shm_path, Some(Uid::from_raw(0)), Some(Gid::from_raw(0)))
        .map_err(|e| UserchrootError::mount(format!("chown {}", shm_path.display()), e))?;
    fs::set_permissions(&shm_path, fs::Permissions::from_mode(perms))
        .map_err(|e| UserchrootError::io(format!("chmod {}", shm_path.display()), e))?;

    let verify = stat(&shm_path).map_err(|e| UserchrootError::stat(&shm_path, e.into()))?;
    if SFlag::from_bits_truncate(verify.st_mode) & SFlag::S_IFMT != SFlag::S_IFDIR {
        return Err(UserchrootError::NotADirectory(shm_path));
    }
    if verify.st_mode & perms != perms {
        return Err(UserchrootError::WritableByOthers(shm_path));
    }

    mount(
        Some("tmpfs"),
        &shm_path,
        Some("tmpfs"),
        MsFlags::empty(),
        Some(SHM_SIZE_OPT),
    )
    .map_err(|e| UserchrootError::mount(format!("mount tmpfs on {}", shm_path.display()), e))
}

#[cfg(not(target_os = "linux"))]
fn install_shm(_chroot_root: &Path) -> Result<(), UserchrootError> {
    Ok(())
}

#[cfg(target_os = "linux")]
fn uninstall_shm(chroot_root: &Path) -> Result<(), UserchrootError> {
    use nix::mount::{MntFlags, umount2};

    let shm_path = chroot_root.join("dev/shm");
    umount2(&shm_path, MntFlags::MNT_FORCE)
        .map_err(|e| UserchrootError::mount(format!("umount {}", shm_path.display()), e))?;
    // Removed exactly once -- the original's loopback-uninstall path
    // calls rmdir twice in a row (spec.md 9), relying on the second call
    // failing harmlessly. Reproducing that would only reintroduce a bug,
    // not preserve a behavior worth keeping (see DESIGN.md).
    fs::remove_dir(&shm_path)
        .map_err(|e| UserchrootError::io(format!("rmdir {}", shm_path.display()), e))
}

#[cfg(not(target_os = "linux"))]
fn uninstall_shm(_chroot_root: &Path) -> Result<(), UserchrootError> {
    Ok(())
}
