//! Promotion Policy
//!
//! Pure decision: does the candidate replace the current driver?

use super::version::Version;

/// Promote when there is no current driver, or the candidate is strictly newer.
///
/// An equal candidate never promotes, so re-running against an unchanged New
/// folder is a no-op.
pub fn should_promote(current: Option<&Version>, candidate: &Version) -> bool {
    match current {
        None => true,
        Some(current) => candidate > current,
    }
}
