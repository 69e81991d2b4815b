use crate::codec::PartyId;
use crate::value::{Sign, Width};

/// Engine failures. Every variant fails the triggering call atomically; no
/// partial result is ever returned. Overflow in unchecked arithmetic is not
/// an error (it wraps), and checked overflow surfaces as an encrypted flag,
/// never through this type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Malformed input ticket, or a ticket bound to a different caller/selector
    #[error("invalid or non-binding ciphertext")]
    InvalidCiphertext,

    /// Ciphertext decoded or onboarded under a key it was not produced with
    #[error("ciphertext does not verify under the given key")]
    KeyMismatch,

    /// Binary operation over operands of differing width or signedness
    #[error("operand mismatch: {lhs_width:?}/{lhs_sign:?} vs {rhs_width:?}/{rhs_sign:?}")]
    WidthMismatch {
        lhs_width: Width,
        lhs_sign: Sign,
        rhs_width: Width,
        rhs_sign: Sign,
    },

    #[error("division by zero")]
    DivisionByZero,

    /// Batch operation over input slices of differing length
    #[error("batch length mismatch: {lhs} vs {rhs}")]
    LengthMismatch { lhs: usize, rhs: usize },

    /// No encryption key registered for the offboard recipient
    #[error("no key registered for party {0:?}")]
    UnknownParty(PartyId),
}

pub type Result<T> = std::result::Result<T, Error>;
