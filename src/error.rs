//! Engine-wide error type.
//!
//! Every fallible operation in this crate returns [`Result`].  The variants
//! map one-to-one onto the failure classes the host has to discriminate:
//! bad input bytes, out-of-range parameters, persisted-state drift,
//! retryable resource failures, cooperative cancellation, and broken
//! internal invariants.
//!
//! Propagation rules (enforced by the respective modules, not here):
//! - codec and extractor errors abort the enclosing row/value operation;
//! - cache errors are swallowed and recomputed ([`crate::query::cache`]);
//! - analysis errors abort and roll back ([`crate::hf::analyze`]);
//! - high-frequency cache *load* errors surface with a remediation hint,
//!   *lookup* errors fall through to the next tier ([`crate::hf::cache`]);
//! - no error ever crosses the `consistent` boundary
//!   ([`crate::query::bridge`]).

use thiserror::Error;

/// Alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All error conditions the engine can report to the host.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A byte outside the active alphabet was found in input text.
    #[error("invalid symbol 0x{byte:02X} at position {position} for {alphabet}")]
    InvalidSymbol {
        byte: u8,
        position: usize,
        alphabet: &'static str,
    },

    /// A parameter or offset fell outside its permitted range.
    #[error("{what} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// A persisted parameter tuple disagrees with the current session
    /// configuration.  `hint` names the setting change that reconciles the
    /// two (re-run analysis, or set the session parameter back).
    #[error("configuration mismatch on {what}: stored {stored}, current {current} ({hint})")]
    ConfigMismatch {
        what: &'static str,
        stored: String,
        current: String,
        hint: String,
    },

    /// A retryable resource failure (shared-memory creation, counter
    /// pressure above the safety cap, ...).
    #[error("transient failure: {0}")]
    Transient(String),

    /// The host requested cancellation.
    #[error("operation cancelled")]
    Cancelled,

    /// Broken invariant.  Unrecoverable; indicates a bug in this crate or
    /// corrupted persisted state.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Range-check helper used by parameter validation and bit-offset
    /// guards.  Returns `Ok(value)` when `min <= value <= max`.
    #[inline]
    pub fn check_range(what: &'static str, value: i64, min: i64, max: i64) -> Result<i64> {
        if value < min || value > max {
            Err(Error::OutOfRange {
                what,
                value,
                min,
                max,
            })
        } else {
            Ok(value)
        }
    }

    /// True for errors the caller may retry verbatim.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}
