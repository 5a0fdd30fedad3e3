//! Bakes the configuration-file path and version string into the binary.
//!
//! The Rust equivalent of the original tool's `-DCONFIGFILE=...
//! -DVERSION_STRING=...` build flags. Treated as an external collaborator
//! by the rest of this crate: nothing downstream cares how these two
//! strings were produced, only that `env!("CONFIGFILE")` and
//! `env!("USERCHROOT_VERSION")` resolve to something.

fn main() {
    let config_path =
        std::env::var("USERCHROOT_CONFIGFILE").unwrap_or_else(|_| "/etc/userchroot.conf".into());
    assert!(
        config_path.starts_with('/'),
        "USERCHROOT_CONFIGFILE must be an absolute path, got {config_path:?}"
    );
    println!("cargo:rustc-env=CONFIGFILE={config_path}");
    println!(
        "cargo:rustc-env=USERCHROOT_VERSION={}",
        std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".into())
    );
    println!("cargo:rerun-if-env-changed=USERCHROOT_CONFIGFILE");
}
