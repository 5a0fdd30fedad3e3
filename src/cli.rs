//! Argument vector parsing into the invocation-request data-model entity
//! (spec.md 3, 6).
//!
//! `userchroot <path> <--install-devices | --uninstall-devices | <program>
//! [args...]>`. Parsing stays hand-rolled rather than going through a
//! declarative CLI crate: in exec mode, `argv[2..]` must reach `execve`
//! byte-for-byte, including whatever the caller put in `argv[0]` of the
//! child command, which a flag/subcommand parser would normalize away.

use std::ffi::OsString;

use crate::error::UserchrootError;

/// What to do once the target has been authorized.
#[derive(Debug, Clone)]
pub enum Mode {
    /// Replace this process with `argv[0]` (program) and the rest of argv
    /// (arguments), inside the chroot, as the unprivileged caller.
    Exec(Vec<OsString>),
    /// Create the fixed device-node set inside the chroot. Only the
    /// chroot's owning user may request this.
    InstallDevices,
    /// Remove the fixed device-node set from the chroot. Only the
    /// chroot's owning user may request this.
    UninstallDevices,
}

/// The parsed, not-yet-authorized invocation (spec.md 3, Invocation
/// request). `target` is the raw string from argv; it is not yet known to
/// be absolute, whitelisted, or to exist -- that's the authorizer's job.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub target: String,
    pub mode: Mode,
}

const INSTALL_FLAG: &str = "--install-devices";
const UNINSTALL_FLAG: &str = "--uninstall-devices";

/// Parse a full argv (including `argv[0]`, the program name) into an
/// [`InvocationRequest`].
pub fn parse(argv: &[OsString]) -> Result<InvocationRequest, UserchrootError> {
    // spec.md 4.3 step 1: fewer than two positional arguments beyond the
    // program name is a usage error.
    if argv.len() < 3 {
        return Err(UserchrootError::Usage);
    }

    let target = argv[1]
        .to_str()
        .ok_or_else(|| UserchrootError::Whitelist(argv[1].to_string_lossy().into_owned()))?
        .to_string();

    let mode_arg = &argv[2];
    let mode = match mode_arg.to_str() {
        Some(s) if s.starts_with('-') => {
            if s == INSTALL_FLAG {
                Mode::InstallDevices
            } else if s == UNINSTALL_FLAG {
                Mode::UninstallDevices
            } else {
                return Err(UserchrootError::Usage);
            }
        }
        _ => Mode::Exec(argv[2..].to_vec()),
    };

    Ok(InvocationRequest { target, mode })
}
