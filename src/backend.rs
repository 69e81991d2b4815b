//! Backend abstraction over the working representation of an encrypted bit,
//! and the different backend implementations (clear reference, XOR secret
//! shares, garbled-circuit wire labels).
//!
//! XOR is structural in every backend and lives on the bit type itself; the
//! non-free gates (AND, NOT via the public-constant lift, opening) go through
//! the evaluation context.

use std::fmt::Debug;
use std::ops::BitXorAssign;

pub mod clear;
pub mod garbled;
pub mod shares;

/// Working representation of a single encrypted bit
pub trait BitT:
    for<'a> BitXorAssign<&'a Self> + Send + Sync + Clone + Debug + Sized + 'static
{
}

/// Gate-evaluation side of a backend. Holds only read-only secret material
/// plus monotone counters/tapes: evaluating a gate never mutates state an
/// existing bit depends on.
pub trait ContextT: Send + Sync {
    type Bit: BitT;

    /// Lift a public constant into the working representation. Every party
    /// can construct this independently; no communication, no randomness.
    fn trivial(&self, bit: bool) -> Self::Bit;

    fn and(&self, a: &Self::Bit, b: &Self::Bit) -> Self::Bit;

    fn not(&self, a: &Self::Bit) -> Self::Bit;

    /// Reconstruct the cleartext bit. This is the engine's sanctioned
    /// disclosure point: decrypt/reveal and the division-by-zero guard go
    /// through here, nothing else does.
    fn open(&self, bit: &Self::Bit) -> bool;

    fn xor(&self, a: &Self::Bit, b: &Self::Bit) -> Self::Bit {
        let mut out = a.clone();
        out ^= b;
        out
    }
}

/// Input-encryption side of a backend; held by the party feeding secrets in
pub trait ClientKeyT: Send + Sync {
    type Bit: BitT;

    fn encrypt(&self, bit: bool) -> Self::Bit;

    fn decrypt(&self, bit: &Self::Bit) -> bool;
}
