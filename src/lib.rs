//! userchroot: a setuid-root privilege gateway that lets an unprivileged
//! caller enter a whitelisted chroot and irrevocably drop privileges
//! before executing a command inside it, plus a secondary mode for
//! provisioning a minimal device-node set inside a chroot image.
//!
//! The pipeline is a strict total order (spec.md 5): environment
//! sanitization, identity checks, config-file gating, argv parsing,
//! authorization, then either device provisioning or the privilege
//! transition driver. Every stage is fatal-on-first-error; `main` is the
//! only place that turns an `Err` into a printed diagnostic and an exit
//! code.

pub mod authorizer;
pub mod cli;
pub mod config;
pub mod devices;
pub mod env;
pub mod error;
pub mod identity;
pub mod logging;
pub mod path_validator;
pub mod transition;
pub mod whitelist;

use std::ffi::OsString;

use tracing::debug;

use cli::Mode;
use error::UserchrootError;
use identity::IdentitySnapshot;

/// Run the full pipeline from an already-parsed argv and a captured
/// pristine environment. Returns only on a non-exec outcome or on error;
/// a successful `Exec` replaces this process entirely.
pub fn run(
    argv: &[OsString],
    pristine_env: &env::PristineEnv,
    identity: &IdentitySnapshot,
) -> Result<(), UserchrootError> {
    identity.verify_entry()?;
    debug!(real_uid = identity.real_uid.as_raw(), "identity verified");

    let gate = config::ConfigGate::open_and_verify()?;
    debug!(path = %gate.path().display(), "config gate opened and verified");

    let request = cli::parse(argv)?;
    debug!(target = %request.target, "parsed invocation request");

    let decision = authorizer::authorize(&request, gate)?;
    debug!(
        base = %decision.base.display(),
        leaf = %decision.leaf,
        owner = %decision.owner_name,
        "authorization granted"
    );

    match request.mode {
        Mode::Exec(command_argv) => {
            let never = transition::exec_in_chroot(
                &decision.full_path(),
                identity,
                &command_argv,
                pristine_env.vars(),
            )?;
            match never {}
        }
        Mode::InstallDevices => {
            require_owner(identity, &decision)?;
            debug!(path = %decision.full_path().display(), "installing fundamental devices");
            devices::install(&decision.full_path())?;
        }
        Mode::UninstallDevices => {
            require_owner(identity, &decision)?;
            debug!(path = %decision.full_path().display(), "uninstalling fundamental devices");
            devices::uninstall(&decision.full_path())?;
        }
    }

    Ok(())
}

/// Device provisioning is restricted to the chroot's owning user, even
/// though any authorized caller may enter the chroot (spec.md 4.4).
fn require_owner(
    identity: &IdentitySnapshot,
    decision: &authorizer::AuthorizationDecision,
) -> Result<(), UserchrootError> {
    if identity.real_uid.as_raw() != decision.owner_uid {
        return Err(UserchrootError::NotOwner);
    }
    Ok(())
}
