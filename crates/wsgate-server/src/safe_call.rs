//! Guaranteed-result call wrapper.
//!
//! Client-visible error responses all funnel through [`safe_call`]: if the
//! application's renderer itself fails, the fault is logged and the caller
//! still gets the fallback value.

use std::fmt::Display;

use tracing::error;

/// Run `op`; on failure log the error and produce the fallback instead.
pub fn safe_call<T, E: Display>(
    op: impl FnOnce() -> Result<T, E>,
    fallback: impl FnOnce() -> T,
) -> T {
    match op() {
        Ok(value) => value,
        Err(err) => {
            error!(error = %err, "safe call failed, using fallback");
            fallback()
        }
    }
}
