use userchroot::env;
use userchroot::error::ERR_EXIT_CODE;
use userchroot::identity::IdentitySnapshot;

fn main() {
    // Must run before anything else, including logging setup: downstream
    // code must never be influenceable by the caller's environment
    // (spec.md 5).
    let pristine_env = env::capture_and_clear();

    userchroot::logging::init();

    let identity = IdentitySnapshot::capture();
    let argv: Vec<std::ffi::OsString> = std::env::args_os().collect();

    if let Err(err) = userchroot::run(&argv, &pristine_env, &identity) {
        eprintln!("{err}");
        std::process::exit(ERR_EXIT_CODE);
    }

    // Reached only for InstallDevices/UninstallDevices; an Exec request
    // either replaces this process via execve or has already exited
    // above on failure.
}
