//! The encrypted fixed-width integer engine: data model, arithmetic,
//! comparisons and plaintext boundary conversions, all generic over the
//! backend bit representation.

pub mod arith;
pub mod cmp;
pub mod encryption;
pub mod test_helper;

use crate::backend::{BitT, ContextT};
use crate::error::{Error, Result};
use crate::value::{Plain, Sign, Width};
use std::ops::BitXorAssign;

/// Working representation of an encrypted integer: one backend bit per
/// position, least significant first. Width and signedness are fixed at
/// creation and only change through an explicit cast or reinterpretation.
/// Values are immutable; every operation produces a new value, so a result
/// produced early can never be corrupted by later unrelated operations.
#[derive(Debug, Clone)]
pub struct EncInt<Bit> {
    bits: Vec<Bit>,
    width: Width,
    sign: Sign,
}

impl<Bit: BitT> EncInt<Bit> {
    pub(crate) fn new(bits: Vec<Bit>, width: Width, sign: Sign) -> Self {
        assert_eq!(bits.len(), width.bits());
        Self { bits, width, sign }
    }

    /// Lift a public constant into the working representation. Degenerate
    /// encryption: every party can construct it, no communication involved.
    pub fn trivial(ctx: &impl ContextT<Bit = Bit>, val: &Plain) -> Self {
        Self::new(
            val.bits_le().map(|b| ctx.trivial(b)).collect(),
            val.width(),
            val.sign(),
        )
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn sign(&self) -> Sign {
        self.sign
    }

    pub fn bits(&self) -> &[Bit] {
        &self.bits
    }

    pub(crate) fn msb(&self) -> &Bit {
        self.bits.last().expect("at least one bit")
    }

    pub(crate) fn check_compat(&self, rhs: &Self) -> Result<()> {
        if self.width != rhs.width || self.sign != rhs.sign {
            return Err(Error::WidthMismatch {
                lhs_width: self.width,
                lhs_sign: self.sign,
                rhs_width: rhs.width,
                rhs_sign: rhs.sign,
            });
        }
        Ok(())
    }

    /// Reinterpret the bit pattern under the other signedness; no gates
    pub fn with_sign(mut self, sign: Sign) -> Self {
        self.sign = sign;
        self
    }

    pub fn to_signed(self) -> Self {
        self.with_sign(Sign::Signed)
    }

    pub fn to_unsigned(self) -> Self {
        self.with_sign(Sign::Unsigned)
    }

    /// Explicit width conversion. Widening sign-extends signed values and
    /// zero-extends unsigned ones; narrowing truncates modularly.
    pub fn cast(&self, ctx: &impl ContextT<Bit = Bit>, width: Width) -> Self {
        let target = width.bits();
        let mut bits = self.bits.clone();
        if target <= bits.len() {
            bits.truncate(target);
        } else {
            while bits.len() < target {
                let fill = match self.sign {
                    Sign::Signed => self.msb().clone(),
                    Sign::Unsigned => ctx.trivial(false),
                };
                bits.push(fill);
            }
        }
        Self::new(bits, width, self.sign)
    }
}

impl<Bit: BitT> BitXorAssign<&Self> for EncInt<Bit> {
    fn bitxor_assign(&mut self, rhs: &Self) {
        self.check_compat(rhs).expect("operand mismatch");
        for (bit, rhs_bit) in self.bits.iter_mut().zip(rhs.bits.iter()) {
            *bit ^= rhs_bit;
        }
    }
}
