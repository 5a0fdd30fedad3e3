//! Identity snapshot and the entry/regain assertions (spec.md 3, 4.5).

use nix::unistd::{Gid, Uid, getegid, geteuid, getgid, getuid, setegid, seteuid, setgid, setuid};

use crate::error::UserchrootError;

/// `(real_uid, effective_uid, real_gid, effective_gid)` captured once at
/// entry and consulted for authorization and later transition.
#[derive(Debug, Clone, Copy)]
pub struct IdentitySnapshot {
    pub real_uid: Uid,
    pub effective_uid: Uid,
    pub real_gid: Gid,
    pub effective_gid: Gid,
}

impl IdentitySnapshot {
    pub fn capture() -> Self {
        Self {
            real_uid: getuid(),
            effective_uid: geteuid(),
            real_gid: getgid(),
            effective_gid: getegid(),
        }
    }

    /// Entry-time environment checks (spec.md 3, 7 "Environment"):
    /// effective uid must be 0, real uid/gid must not be 0, and the
    /// process must not be setgid root.
    pub fn verify_entry(&self) -> Result<(), UserchrootError> {
        if self.effective_uid != Uid::from_raw(0) {
            return Err(UserchrootError::NotEffectiveRoot);
        }
        if self.real_uid == Uid::from_raw(0) {
            return Err(UserchrootError::RunAsRoot);
        }
        if self.real_gid == Gid::from_raw(0) || self.effective_gid == Gid::from_raw(0) {
            return Err(UserchrootError::SetgidRoot);
        }
        Ok(())
    }

    /// The uid this process should collapse to before exec: the real uid
    /// captured at entry, i.e. the invoking, unprivileged user.
    pub fn target_uid(&self) -> Uid {
        self.real_uid
    }
}

/// Drop all privileges irrevocably and verify the drop cannot be undone
/// (spec.md 4.5 steps 3-4).
///
/// `setuid` is used rather than `setreuid`/`setresuid` because on
/// classical Unix credential semantics (no saved-set-uid surviving the
/// call while effective uid is 0) a single `setuid(target)` collapses
/// real, effective, and saved uid together. Platforms where that is not
/// true are refused rather than silently left with a recoverable saved id.
pub fn drop_privileges_irrevocably(target: Uid) -> Result<(), UserchrootError> {
    setuid(target).map_err(|_| UserchrootError::PrivilegeDropFailed)?;

    // Regain tests: every one of these must fail.
    if setuid(Uid::from_raw(0)).is_ok()
        || seteuid(Uid::from_raw(0)).is_ok()
        || setgid(Gid::from_raw(0)).is_ok()
        || setegid(Gid::from_raw(0)).is_ok()
    {
        return Err(UserchrootError::PrivilegeRegained);
    }

    if getuid() == Uid::from_raw(0)
        || geteuid() == Uid::from_raw(0)
        || getgid() == Gid::from_raw(0)
        || getegid() == Gid::from_raw(0)
    {
        return Err(UserchrootError::PrivilegeRegained);
    }

    Ok(())
}
