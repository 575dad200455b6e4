//! # Error Taxonomy
//!
//! Three error kinds cover everything the storage layer and the scheduler can
//! report:
//!
//! - [`DataError::StreamExhausted`]: a reader was asked for the next item and
//!   none remains. Recoverable; callers are expected to check `has_next()`
//!   first, in which case they never see it.
//! - [`DataError::UsageViolation`]: a contract breach in the calling code:
//!   writing through a closed writer, appending to a closed queue, or
//!   re-pushing data that was already destructively consumed. Fatal for the
//!   current run, but surfaced as an error value so the host can shut down
//!   cleanly instead of aborting.
//! - [`DataError::MalformedEncoding`]: a varint or length prefix implies more
//!   bytes than the stream holds, or a payload fails to decode. Data
//!   corruption; fatal for that read.
//!
//! Functions return `eyre::Result` throughout the crate. The typed kind is
//! attached to the report, so call sites that need to branch can recover it:
//!
//! ```ignore
//! match reader.next::<u64>() {
//!     Err(e) if e.downcast_ref::<DataError>()
//!         .is_some_and(DataError::is_exhausted) => { /* end of stream */ }
//!     other => { /* ... */ }
//! }
//! ```
//!
//! Errors are local to one reader or writer instance. Immutable shared blocks
//! guarantee that a failed read never corrupts other readers over the same
//! file.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("stream exhausted: no further items available")]
    StreamExhausted,

    #[error("usage violation: {0}")]
    UsageViolation(String),

    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),
}

impl DataError {
    pub fn usage(msg: impl Into<String>) -> Self {
        DataError::UsageViolation(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        DataError::MalformedEncoding(msg.into())
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, DataError::StreamExhausted)
    }

    pub fn is_usage_violation(&self) -> bool {
        matches!(self, DataError::UsageViolation(_))
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, DataError::MalformedEncoding(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinguishable() {
        assert!(DataError::StreamExhausted.is_exhausted());
        assert!(DataError::usage("closed").is_usage_violation());
        assert!(DataError::malformed("truncated").is_malformed());
        assert!(!DataError::usage("closed").is_exhausted());
    }

    #[test]
    fn kinds_survive_eyre_downcast() {
        let report: eyre::Report = DataError::StreamExhausted.into();
        let kind = report.downcast_ref::<DataError>().unwrap();
        assert!(kind.is_exhausted());
    }

    #[test]
    fn messages_carry_context() {
        let err = DataError::usage("append on closed queue");
        assert!(err.to_string().contains("append on closed queue"));
        assert!(err.to_string().starts_with("usage violation"));
    }
}
