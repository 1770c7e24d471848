//! Error taxonomy shared across the core (§4.10 / §7).
//!
//! A plain enum rather than `thiserror`/`anyhow`: the rest of this driver
//! targets `no_std` without `std::error::Error`, and the example pack's
//! bare-metal drivers (e.g. the teacher's `E1000eInitError`/`TxError`) use
//! hand-written enums with a `Display` impl for the same reason.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OhciError {
    /// An offset or argument outside the valid range was supplied.
    BadArgument,
    /// A polled hardware operation (PHY access, context stop) did not
    /// complete within its bounded timeout.
    Timeout,
    /// A register-facing call was made before the BAR was bound.
    NotAttached,
    /// The controller observed `IntEvent.unrecoverableError`.
    UnrecoverableError,
    /// The controller observed `IntEvent.regAccessFail`.
    RegAccessFail,
    /// The controller observed `IntEvent.postedWriteErr`.
    PostedWriteErr,
    /// The operation was invalidated by an intervening bus reset.
    BusReset,
    /// The controller is not in a state that accepts new work (e.g. after
    /// `Failed`).
    NotReady,
    /// No free descriptor slot was available in the target ring.
    DescriptorRingFull,
    /// The submit-time generation no longer matches the current bus
    /// generation.
    GenerationMismatch,
}

impl fmt::Display for OhciError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            OhciError::BadArgument => "bad argument",
            OhciError::Timeout => "operation timed out",
            OhciError::NotAttached => "register facade not attached to a BAR",
            OhciError::UnrecoverableError => "controller raised unrecoverableError",
            OhciError::RegAccessFail => "controller raised regAccessFail",
            OhciError::PostedWriteErr => "controller raised postedWriteErr",
            OhciError::BusReset => "invalidated by bus reset",
            OhciError::NotReady => "controller not ready to accept work",
            OhciError::DescriptorRingFull => "descriptor ring has no free slot",
            OhciError::GenerationMismatch => "submit generation does not match current generation",
        };
        f.write_str(msg)
    }
}

/// Transaction completion status (§4.7, §7). Distinct from [`OhciError`]
/// because it also carries the permanent/transient rcode outcomes of a
/// completed async transaction, which are not register-facade failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Complete,
    AckBusyX,
    AckBusyA,
    AckBusyB,
    Timeout,
    TypeError,
    AddressError,
    DataError,
    ConflictError,
    BusReset,
    Cancelled,
}

impl CompletionStatus {
    /// Transient statuses consume a retry budget (§4.7); permanent statuses
    /// complete immediately.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            CompletionStatus::AckBusyX
                | CompletionStatus::AckBusyA
                | CompletionStatus::AckBusyB
                | CompletionStatus::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification_matches_retry_policy() {
        assert!(CompletionStatus::Timeout.is_transient());
        assert!(CompletionStatus::AckBusyA.is_transient());
        assert!(!CompletionStatus::TypeError.is_transient());
        assert!(!CompletionStatus::DataError.is_transient());
        assert!(!CompletionStatus::BusReset.is_transient());
    }
}
</content>
