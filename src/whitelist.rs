//! Character whitelist for path-like arguments (spec.md 4.1).
//!
//! Accepts only `A-Z`, `a-z`, `0-9`, and `{ '.', '_', '+', ',', '-' }`;
//! slashes are accepted only when the caller opts in. Any other byte fails
//! the entire invocation -- this check runs before any filesystem access so
//! a hostile argument can't even reach a `stat` call.

use crate::error::UserchrootError;

fn is_whitelisted(c: u8, allow_slashes: bool) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, b'.' | b'_' | b'+' | b',' | b'-')
        || (allow_slashes && c == b'/')
}

/// Check every byte of `s` against the whitelist.
///
/// `s` is taken as raw bytes, not validated UTF-8 first, since the
/// whitelist itself is a strict ASCII subset -- any non-ASCII byte is
/// rejected by the same loop that rejects disallowed ASCII punctuation.
pub fn check(s: &str, allow_slashes: bool) -> Result<(), UserchrootError> {
    if s.bytes().all(|c| is_whitelisted(c, allow_slashes)) {
        Ok(())
    } else {
        Err(UserchrootError::Whitelist(s.to_string()))
    }
}
