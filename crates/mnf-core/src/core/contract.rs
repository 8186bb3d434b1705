//! Precondition checking for manifold operations.
//!
//! All size and structure checks of the crate go through [`require`]. The
//! reaction to a violated precondition is a build-time choice:
//!
//! - default: the error built by the caller is returned, so a test harness
//!   can observe and recover from it;
//! - feature `fatal-contracts`: the violation is logged at error level and the
//!   process aborts.
//!
//! The error is built lazily, so a satisfied check costs one comparison and
//! never allocates.

use crate::core::error::{ManifoldError, Result};

/// Checks `condition`, reporting the error produced by `error` when it fails.
#[inline]
pub fn require<F>(condition: bool, error: F) -> Result<()>
where
    F: FnOnce() -> ManifoldError,
{
    if condition {
        Ok(())
    } else {
        violation(error())
    }
}

/// Checks that a vector argument has the expected length.
#[inline]
pub fn require_len(what: &str, actual: usize, expected: usize) -> Result<()> {
    require(actual == expected, || {
        ManifoldError::dimension_mismatch(
            format!("{what} of length {expected}"),
            format!("length {actual}"),
        )
    })
}

/// Checks that a matrix argument has the expected shape.
#[inline]
pub fn require_shape(what: &str, actual: (usize, usize), expected: (usize, usize)) -> Result<()> {
    require(actual == expected, || {
        ManifoldError::dimension_mismatch(
            format!("{what} of shape {}x{}", expected.0, expected.1),
            format!("{}x{}", actual.0, actual.1),
        )
    })
}

#[cfg(not(feature = "fatal-contracts"))]
#[cold]
fn violation(error: ManifoldError) -> Result<()> {
    log::debug!("contract violation: {error}");
    Err(error)
}

#[cfg(feature = "fatal-contracts")]
#[cold]
fn violation(error: ManifoldError) -> Result<()> {
    log::error!("contract violation: {error}");
    std::process::abort()
}
