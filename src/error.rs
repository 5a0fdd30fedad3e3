//! Shared error taxonomy for the authorization and privilege-transition
//! pipeline.
//!
//! Every fatal condition is represented as a `UserchrootError` variant so
//! that each pipeline stage can propagate with `?` instead of calling
//! `exit()` at the point of detection (spec.md 9, "re-architecting the exec
//! sequence"). `main` is the single place that prints `Display` to stderr
//! and maps any `Err` to [`ERR_EXIT_CODE`].

use std::path::PathBuf;

use thiserror::Error;

/// The single fixed exit code used for every error in this tool.
///
/// There is deliberately no way to distinguish error kinds from the exit
/// code alone -- spec.md 6 specifies one fixed nonzero code for all errors.
pub const ERR_EXIT_CODE: i32 = 1;

/// Taxonomy from spec.md 7: Usage, InputValidation, Environment, Policy,
/// Toctou, Resource, Provisioning, Transition.
#[derive(Debug, Error)]
pub enum UserchrootError {
    // -- Usage --
    #[error("usage: userchroot path <--install-devices|--uninstall-devices|command ...>")]
    Usage,

    #[error("Path {0} should be absolute. Aborting.")]
    NotAbsolute(String),

    #[error("Trailing slashes are not allowed in the path. Aborting.")]
    TrailingSlash,

    #[error(". and .. are not allowed as part of the chroot path. Aborting.")]
    DotOrDotDotLeaf,

    // -- Input validation --
    #[error("Path {0} contains non-whitelisted characters. Aborting.")]
    Whitelist(String),

    // -- Environment --
    #[error("Should be run with root privileges. Aborting.")]
    NotEffectiveRoot,

    #[error("Should not be run as root. Aborting.")]
    RunAsRoot,

    #[error("userchroot should not be setgid root. Aborting.")]
    SetgidRoot,

    // -- Policy --
    #[error("Directory {0} should be owned by root. Aborting.")]
    NotRootOwned(PathBuf),

    #[error("Directory {0} has non-restrictive permissions. Aborting.")]
    WritableByOthers(PathBuf),

    #[error("{0} is not a directory. Aborting.")]
    NotADirectory(PathBuf),

    #[error("{base} and {base}/{leaf} must have the same owner. Aborting.")]
    OwnerMismatch { base: String, leaf: String },

    #[error("{0} is owned by root; chroot targets may not be root-owned. Aborting.")]
    OwnedByRoot(PathBuf),

    #[error("Failed to getpwuid for uid {0}. Aborting.")]
    UnknownOwner(u32),

    #[error("Permission Denied. Aborting.")]
    PolicyDenied,

    #[error(
        "install or uninstall devices can only be called by the owner of the chroot. Aborting."
    )]
    NotOwner,

    // -- TOCTOU --
    #[error("Config file moved after opening. Aborting.")]
    ConfigMoved,

    #[error("Configuration file {0} is not a regular file. Aborting.")]
    ConfigNotRegularFile(PathBuf),

    // -- Resource --
    #[error("Failed to stat {path}. Aborting.")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open {path}. Aborting.")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}. Aborting.")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // -- Provisioning --
    #[error("{0} already exists. Aborting.")]
    DeviceAlreadyExists(PathBuf),

    #[error("Failed to stat device {0}. Aborting.")]
    DeviceSourceMissing(PathBuf),

    #[error("{context}. Aborting.")]
    Mount {
        context: String,
        #[source]
        source: nix::Error,
    },

    // -- Transition --
    #[error("Failed to chdir to {path}. Aborting.")]
    Chdir {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("Failed to chroot to {path}. Aborting.")]
    Chroot {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("Failed to give up privileges. Aborting.")]
    PrivilegeDropFailed,

    #[error("Failed to give up privileges: a root identity was regained. Aborting.")]
    PrivilegeRegained,

    #[error("Failed to exec {0}: {1}")]
    Exec(String, std::io::Error),
}

impl UserchrootError {
    /// Wrap an I/O error with a short, human-readable context phrase.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn stat(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Stat {
            path: path.into(),
            source,
        }
    }

    pub fn mount(context: impl Into<String>, source: nix::Error) -> Self {
        Self::Mount {
            context: context.into(),
            source,
        }
    }
}
