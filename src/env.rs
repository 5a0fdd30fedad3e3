//! Environment capture and sanitization (spec.md 5).
//!
//! Runs before every other pipeline stage, including before the tracing
//! subscriber is configured: downstream library code, locale handling, and
//! diagnostic formatters must not be influenceable by the caller. The
//! pristine, pre-clear block is captured first and handed to the child
//! process at exec time (spec.md 4.5 step 7); the process's own view of
//! the environment is cleared immediately after.

use std::ffi::OsString;

/// The original environment block as received at process entry, captured
/// before any variable is cleared.
#[derive(Debug, Clone, Default)]
pub struct PristineEnv {
    vars: Vec<(OsString, OsString)>,
}

impl PristineEnv {
    pub fn vars(&self) -> &[(OsString, OsString)] {
        &self.vars
    }
}

/// Snapshot the current environment, then clear every variable from the
/// process's own view of it.
///
/// There is no portable bulk `clearenv(3)` exposed safely by the `nix`
/// crate, so this always walks names individually and unsets each one --
/// collapsing the original's two-strategy (`clearenv` vs. manual walk)
/// choice to one implementation (see SPEC_FULL.md 4.0). The "corrupted
/// environment" failure mode from the original (an entry with no `=`) is
/// structurally unreachable here: `std::env::vars_os()` only ever yields
/// already-parsed `NAME=value` pairs.
#[allow(unsafe_code)]
pub fn capture_and_clear() -> PristineEnv {
    let vars: Vec<(OsString, OsString)> = std::env::vars_os().collect();

    for (name, _) in &vars {
        // SAFETY: this process is still single-threaded at this point --
        // it is the very first thing `main` does, before any other code
        // (including the tracing subscriber) runs and could be reading
        // the environment concurrently.
        unsafe {
            std::env::remove_var(name);
        }
    }

    PristineEnv { vars }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(unsafe_code)]
    #[serial_test::serial(process_env)]
    fn capture_preserves_original_values() {
        // SAFETY: single-threaded test.
        unsafe {
            std::env::set_var("USERCHROOT_TEST_VAR", "hello");
        }
        let pristine = capture_and_clear();
        assert!(
            pristine
                .vars()
                .iter()
                .any(|(k, v)| k == "USERCHROOT_TEST_VAR" && v == "hello")
        );
        assert!(std::env::var_os("USERCHROOT_TEST_VAR").is_none());
    }
}
