//! Plaintext fixed-width integers. Used at the engine boundary and as the
//! reference model the encrypted backends are checked against.

use std::cmp::Ordering;
use std::fmt;
use std::fmt::{Debug, Formatter};

use rand::Rng;

/// Bit width of a confidential integer. Widths above 64 bits decompose into
/// 64-bit blocks in the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
    W128,
    W256,
}

impl Width {
    pub const ALL: [Width; 6] = [
        Width::W8,
        Width::W16,
        Width::W32,
        Width::W64,
        Width::W128,
        Width::W256,
    ];

    pub fn bits(self) -> usize {
        match self {
            Width::W8 => 8,
            Width::W16 => 16,
            Width::W32 => 32,
            Width::W64 => 64,
            Width::W128 => 128,
            Width::W256 => 256,
        }
    }

    /// Number of 64-bit blocks a value of this width occupies on the wire
    pub fn blocks(self) -> usize {
        self.bits().div_ceil(64)
    }

    pub fn from_bits(bits: usize) -> Option<Self> {
        Width::ALL.into_iter().find(|w| w.bits() == bits)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Unsigned,
    Signed,
}

impl Sign {
    pub const ALL: [Sign; 2] = [Sign::Unsigned, Sign::Signed];
}

const LIMBS: usize = 4;

/// Fixed-width integer stored as little-endian 64-bit limbs. Canonical form:
/// bits at and above `width` are zero; signedness is an interpretation of the
/// top in-range bit.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Plain {
    limbs: [u64; LIMBS],
    width: Width,
    sign: Sign,
}

impl Plain {
    pub fn zero(width: Width, sign: Sign) -> Self {
        Self {
            limbs: [0; LIMBS],
            width,
            sign,
        }
    }

    pub fn from_limbs(limbs: [u64; LIMBS], width: Width, sign: Sign) -> Self {
        Self { limbs, width, sign }.masked()
    }

    pub fn from_u128(val: u128, width: Width) -> Self {
        Self::from_limbs(
            [val as u64, (val >> 64) as u64, 0, 0],
            width,
            Sign::Unsigned,
        )
    }

    pub fn from_i128(val: i128, width: Width) -> Self {
        let ext = if val < 0 { !0u64 } else { 0 };
        Self::from_limbs(
            [val as u64, (val >> 64) as u64, ext, ext],
            width,
            Sign::Signed,
        )
    }

    /// Parse from a big-endian hex string (without `0x` prefix), e.g. produced
    /// by [`hex::encode`]. Fails on odd length, non-hex digits or overflow.
    pub fn from_hex(s: &str, width: Width, sign: Sign) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        if bytes.len() > LIMBS * 8 {
            return None;
        }
        let mut le = [0u8; LIMBS * 8];
        for (i, b) in bytes.iter().rev().enumerate() {
            le[i] = *b;
        }
        let mut limbs = [0u64; LIMBS];
        for (i, chunk) in le.chunks_exact(8).enumerate() {
            limbs[i] = u64::from_le_bytes(chunk.try_into().expect("8 bytes"));
        }
        let val = Self { limbs, width, sign };
        (val.masked() == val).then_some(val)
    }

    pub fn random(rng: &mut impl Rng, width: Width, sign: Sign) -> Self {
        let mut limbs = [0u64; LIMBS];
        for limb in &mut limbs {
            *limb = rng.random();
        }
        Self::from_limbs(limbs, width, sign)
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn sign(&self) -> Sign {
        self.sign
    }

    pub fn limbs(&self) -> &[u64; LIMBS] {
        &self.limbs
    }

    pub fn bit(&self, i: usize) -> bool {
        assert!(i < self.width.bits());
        self.limbs[i / 64] >> (i % 64) & 1 == 1
    }

    /// Top in-range bit; the sign bit under signed interpretation
    pub fn msb(&self) -> bool {
        self.bit(self.width.bits() - 1)
    }

    pub fn is_zero(&self) -> bool {
        self.limbs == [0; LIMBS]
    }

    pub fn is_negative(&self) -> bool {
        self.sign == Sign::Signed && self.msb()
    }

    /// Least-significant-bit-first iterator over the in-range bits
    pub fn bits_le(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.width.bits()).map(|i| self.bit(i))
    }

    pub fn from_bits_le(bits: &[bool], width: Width, sign: Sign) -> Self {
        assert_eq!(bits.len(), width.bits());
        let mut limbs = [0u64; LIMBS];
        for (i, bit) in bits.iter().enumerate() {
            limbs[i / 64] |= (*bit as u64) << (i % 64);
        }
        Self { limbs, width, sign }
    }

    pub fn to_u128(&self) -> u128 {
        assert!(self.width.bits() <= 128, "value wider than 128 bits");
        self.limbs[0] as u128 | (self.limbs[1] as u128) << 64
    }

    pub fn to_i128(&self) -> i128 {
        let w = self.width.bits();
        assert!(w <= 128, "value wider than 128 bits");
        let raw = self.to_u128();
        if self.sign == Sign::Signed && w < 128 && self.msb() {
            (raw | (!0u128) << w) as i128
        } else {
            raw as i128
        }
    }

    pub fn max_value(width: Width, sign: Sign) -> Self {
        let all_ones = Self::from_limbs([!0; LIMBS], width, sign);
        match sign {
            Sign::Unsigned => all_ones,
            // 0111..1
            Sign::Signed => all_ones.with_msb(false),
        }
    }

    pub fn min_value(width: Width, sign: Sign) -> Self {
        match sign {
            Sign::Unsigned => Self::zero(width, sign),
            // 1000..0
            Sign::Signed => Self::zero(width, sign).with_msb(true),
        }
    }

    fn with_msb(mut self, bit: bool) -> Self {
        let i = self.width.bits() - 1;
        if bit {
            self.limbs[i / 64] |= 1 << (i % 64);
        } else {
            self.limbs[i / 64] &= !(1 << (i % 64));
        }
        self
    }

    fn masked(mut self) -> Self {
        let w = self.width.bits();
        for (i, limb) in self.limbs.iter_mut().enumerate() {
            let lo = i * 64;
            if lo >= w {
                *limb = 0;
            } else if w - lo < 64 {
                *limb &= (1 << (w - lo)) - 1;
            }
        }
        self
    }

    /// Reinterpret the bit pattern under the other signedness
    pub fn with_sign(mut self, sign: Sign) -> Self {
        self.sign = sign;
        self
    }

    /// Explicit width conversion: widening sign/zero-extends per the value's
    /// signedness, narrowing truncates modularly.
    pub fn cast(&self, width: Width) -> Self {
        let mut limbs = self.limbs;
        if width.bits() > self.width.bits() && self.is_negative() {
            let w = self.width.bits();
            for (i, limb) in limbs.iter_mut().enumerate() {
                let lo = i * 64;
                if lo >= w {
                    *limb = !0;
                } else if w - lo < 64 {
                    *limb |= !((1u64 << (w - lo)) - 1);
                }
            }
        }
        Self::from_limbs(limbs, width, self.sign)
    }

    pub fn wrapping_add(&self, rhs: &Self) -> Self {
        self.check_compat(rhs);
        let (limbs, _) = add_limbs(&self.limbs, &rhs.limbs, false);
        Self::from_limbs(limbs, self.width, self.sign)
    }

    pub fn wrapping_sub(&self, rhs: &Self) -> Self {
        self.check_compat(rhs);
        let (limbs, _) = add_limbs(&self.limbs, &rhs.limbs.map(|l| !l), true);
        Self::from_limbs(limbs, self.width, self.sign)
    }

    pub fn wrapping_neg(&self) -> Self {
        Self::zero(self.width, self.sign).wrapping_sub(self)
    }

    pub fn wrapping_mul(&self, rhs: &Self) -> Self {
        self.check_compat(rhs);
        let prod = mul_limbs_512(&self.extended(), &rhs.extended());
        Self::from_limbs(prod[..LIMBS].try_into().expect("4 limbs"), self.width, self.sign)
    }

    pub fn overflowing_add(&self, rhs: &Self) -> (Self, bool) {
        let result = self.wrapping_add(rhs);
        let overflow = match self.sign {
            // carry out of the top bit <=> wrapped result got smaller
            Sign::Unsigned => result.cmp_magnitude(self) == Ordering::Less,
            Sign::Signed => {
                self.msb() == rhs.msb() && result.msb() != self.msb()
            }
        };
        (result, overflow)
    }

    pub fn overflowing_sub(&self, rhs: &Self) -> (Self, bool) {
        let result = self.wrapping_sub(rhs);
        let overflow = match self.sign {
            Sign::Unsigned => self.cmp_magnitude(rhs) == Ordering::Less,
            Sign::Signed => {
                self.msb() != rhs.msb() && result.msb() != self.msb()
            }
        };
        (result, overflow)
    }

    pub fn overflowing_mul(&self, rhs: &Self) -> (Self, bool) {
        self.check_compat(rhs);
        let prod = mul_limbs_512(&self.extended(), &rhs.extended());
        let result = Self::from_limbs(prod[..LIMBS].try_into().expect("4 limbs"), self.width, self.sign);
        // the true product fits iff the 512-bit two's-complement form
        // sign/zero-extends the in-range result
        let w = self.width.bits();
        let fill = match self.sign {
            Sign::Unsigned => false,
            Sign::Signed => prod_bit(&prod, w - 1),
        };
        let overflow = (w..2 * w).any(|i| prod_bit(&prod, i) != fill);
        (result, overflow)
    }

    /// Truncating division. Panics on a zero divisor; callers surface
    /// [`crate::error::Error::DivisionByZero`] before getting here.
    pub fn div(&self, rhs: &Self) -> Self {
        self.divrem(rhs).0
    }

    /// Remainder, sign follows the dividend
    pub fn rem(&self, rhs: &Self) -> Self {
        self.divrem(rhs).1
    }

    fn divrem(&self, rhs: &Self) -> (Self, Self) {
        self.check_compat(rhs);
        assert!(!rhs.is_zero(), "division by zero");
        let (na, nb) = (self.is_negative(), rhs.is_negative());
        let ma = self.magnitude();
        let mb = rhs.magnitude();
        let (q, r) = udiv_limbs(&ma.limbs, &mb.limbs);
        let q = Self::from_limbs(q, self.width, self.sign);
        let r = Self::from_limbs(r, self.width, self.sign);
        let q = if na != nb { q.wrapping_neg() } else { q };
        let r = if na { r.wrapping_neg() } else { r };
        (q, r)
    }

    fn magnitude(&self) -> Self {
        if self.is_negative() {
            self.wrapping_neg()
        } else {
            *self
        }
    }

    pub fn and(&self, rhs: &Self) -> Self {
        self.zip_limbs(rhs, |a, b| a & b)
    }

    pub fn or(&self, rhs: &Self) -> Self {
        self.zip_limbs(rhs, |a, b| a | b)
    }

    pub fn xor(&self, rhs: &Self) -> Self {
        self.zip_limbs(rhs, |a, b| a ^ b)
    }

    pub fn not(&self) -> Self {
        Self::from_limbs(self.limbs.map(|l| !l), self.width, self.sign)
    }

    fn zip_limbs(&self, rhs: &Self, f: impl Fn(u64, u64) -> u64) -> Self {
        self.check_compat(rhs);
        let mut limbs = [0u64; LIMBS];
        for i in 0..LIMBS {
            limbs[i] = f(self.limbs[i], rhs.limbs[i]);
        }
        Self::from_limbs(limbs, self.width, self.sign)
    }

    /// Logical left shift by a public amount; amounts >= width produce zero
    pub fn shl(&self, amount: usize) -> Self {
        let bits: Vec<bool> = (0..self.width.bits())
            .map(|i| i >= amount && self.bit(i - amount))
            .collect();
        Self::from_bits_le(&bits, self.width, self.sign)
    }

    /// Right shift by a public amount: logical for unsigned values,
    /// arithmetic (sign-extending) for signed ones
    pub fn shr(&self, amount: usize) -> Self {
        let w = self.width.bits();
        let fill = self.is_negative();
        let bits: Vec<bool> = (0..w)
            .map(|i| {
                if i + amount < w {
                    self.bit(i + amount)
                } else {
                    fill
                }
            })
            .collect();
        Self::from_bits_le(&bits, self.width, self.sign)
    }

    /// Order under the value's declared signedness
    pub fn cmp_value(&self, rhs: &Self) -> Ordering {
        self.check_compat(rhs);
        if self.sign == Sign::Signed && self.msb() != rhs.msb() {
            return if self.msb() {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        self.cmp_magnitude(rhs)
    }

    fn cmp_magnitude(&self, rhs: &Self) -> Ordering {
        for i in (0..LIMBS).rev() {
            match self.limbs[i].cmp(&rhs.limbs[i]) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        Ordering::Equal
    }

    fn check_compat(&self, rhs: &Self) {
        assert_eq!(self.width, rhs.width, "width mismatch");
        assert_eq!(self.sign, rhs.sign, "signedness mismatch");
    }

    /// Sign/zero-extend to 8 limbs (512-bit two's complement)
    fn extended(&self) -> [u64; 2 * LIMBS] {
        let ext = self.cast(Width::W256);
        let fill = if self.is_negative() { !0u64 } else { 0 };
        let mut limbs = [fill; 2 * LIMBS];
        limbs[..LIMBS].copy_from_slice(&ext.limbs);
        limbs
    }
}

impl Debug for Plain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut be = [0u8; LIMBS * 8];
        for (i, limb) in self.limbs.iter().rev().enumerate() {
            be[i * 8..(i + 1) * 8].copy_from_slice(&limb.to_be_bytes());
        }
        write!(
            f,
            "Plain(0x{}, {:?}, {:?})",
            hex::encode(&be[LIMBS * 8 - self.width.bits() / 8..]),
            self.width,
            self.sign
        )
    }
}

impl fmt::Display for Plain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.width.bits() <= 128 {
            match self.sign {
                Sign::Unsigned => write!(f, "{}", self.to_u128()),
                Sign::Signed => write!(f, "{}", self.to_i128()),
            }
        } else {
            write!(f, "{:?}", self)
        }
    }
}

fn add_limbs(a: &[u64; LIMBS], b: &[u64; LIMBS], carry_in: bool) -> ([u64; LIMBS], bool) {
    let mut out = [0u64; LIMBS];
    let mut carry = carry_in as u64;
    for i in 0..LIMBS {
        let sum = a[i] as u128 + b[i] as u128 + carry as u128;
        out[i] = sum as u64;
        carry = (sum >> 64) as u64;
    }
    (out, carry != 0)
}

/// Schoolbook product of 512-bit two's-complement operands, mod 2^512
fn mul_limbs_512(a: &[u64; 2 * LIMBS], b: &[u64; 2 * LIMBS]) -> [u64; 2 * LIMBS] {
    let mut out = [0u64; 2 * LIMBS];
    for i in 0..2 * LIMBS {
        let mut carry = 0u64;
        for j in 0..2 * LIMBS - i {
            let acc = out[i + j] as u128 + a[i] as u128 * b[j] as u128 + carry as u128;
            out[i + j] = acc as u64;
            carry = (acc >> 64) as u64;
        }
    }
    out
}

fn prod_bit(limbs: &[u64; 2 * LIMBS], i: usize) -> bool {
    limbs[i / 64] >> (i % 64) & 1 == 1
}

/// Restoring long division on raw limbs; both operands unsigned magnitudes
fn udiv_limbs(n: &[u64; LIMBS], d: &[u64; LIMBS]) -> ([u64; LIMBS], [u64; LIMBS]) {
    let mut q = [0u64; LIMBS];
    let mut r = [0u64; LIMBS];
    for i in (0..LIMBS * 64).rev() {
        // r = (r << 1) | n[i]
        let mut carry = n[i / 64] >> (i % 64) & 1;
        for limb in &mut r {
            let top = *limb >> 63;
            *limb = *limb << 1 | carry;
            carry = top;
        }
        if cmp_limbs(&r, d) != Ordering::Less {
            let (diff, _) = add_limbs(&r, &d.map(|l| !l), true);
            r = diff;
            q[i / 64] |= 1 << (i % 64);
        }
    }
    (q, r)
}

fn cmp_limbs(a: &[u64; LIMBS], b: &[u64; LIMBS]) -> Ordering {
    for i in (0..LIMBS).rev() {
        match a[i].cmp(&b[i]) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }
    Ordering::Equal
}
