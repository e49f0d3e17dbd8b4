//! Bounded retry around a single call to the collection process.
//!
//! Only connectivity failures are retried, once and immediately. An answer
//! from the peer, even an error status, means the peer was reached and is
//! surfaced as-is.
use crate::error::{Result, TiaError};
use crate::logging::Logger;

/// Attempts made for a call that keeps failing to connect.
pub const MAX_ATTEMPTS: u32 = 2;

/// Run `op`, retrying once if it fails with a connectivity error.
///
/// When the retry fails to connect as well, the result is
/// [`TiaError::RetriesExhausted`] wrapping the retry's error.
pub fn call_with_retry<T, F>(logger: &dyn Logger, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let first = match op() {
        Ok(value) => return Ok(value),
        Err(e) if e.is_connectivity() => e,
        Err(e) => return Err(e),
    };

    logger.warn(&format!("{operation} failed, retrying once: {first}"));

    match op() {
        Ok(value) => {
            logger.debug(&format!("{operation} succeeded on retry"));
            Ok(value)
        }
        Err(e) if e.is_connectivity() => Err(TiaError::RetriesExhausted {
            operation: operation.to_string(),
            source: Box::new(e),
        }),
        Err(e) => Err(e),
    }
}
