//! Arithmetic and bitwise circuits over encrypted integers. Everything is a
//! pure function of its operands: ripple-carry addition, schoolbook
//! multiplication and restoring division, with overflow flags read off the
//! carry structure. Plaintext operands enter through the trivial lift and
//! take the exact same gate path, so results cannot depend on operand
//! visibility.

use crate::backend::ContextT;
use crate::error::{Error, Result};
use crate::secint::{cmp, EncInt};
use crate::value::{Plain, Sign};
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::debug;

pub(crate) struct AddOut<Bit> {
    pub sum: Vec<Bit>,
    pub carry_into_msb: Bit,
    pub carry_out: Bit,
}

/// Ripple-carry adder over equal-length bit slices, least significant first
pub(crate) fn ripple_add<Ctx: ContextT>(
    ctx: &Ctx,
    a: &[Ctx::Bit],
    b: &[Ctx::Bit],
    carry_in: Ctx::Bit,
) -> AddOut<Ctx::Bit> {
    assert_eq!(a.len(), b.len());
    let mut carry = carry_in;
    let mut carry_into_msb = carry.clone();
    let mut sum = Vec::with_capacity(a.len());
    for (i, (a_bit, b_bit)) in a.iter().zip(b.iter()).enumerate() {
        if i + 1 == a.len() {
            carry_into_msb = carry.clone();
        }
        let a_xor_b = ctx.xor(a_bit, b_bit);
        sum.push(ctx.xor(&a_xor_b, &carry));
        carry = ctx.xor(&ctx.and(a_bit, b_bit), &ctx.and(&carry, &a_xor_b));
    }
    AddOut {
        sum,
        carry_into_msb,
        carry_out: carry,
    }
}

pub(crate) fn or_bit<Ctx: ContextT>(ctx: &Ctx, a: &Ctx::Bit, b: &Ctx::Bit) -> Ctx::Bit {
    ctx.xor(&ctx.xor(a, b), &ctx.and(a, b))
}

pub(crate) fn xnor_bit<Ctx: ContextT>(ctx: &Ctx, a: &Ctx::Bit, b: &Ctx::Bit) -> Ctx::Bit {
    ctx.not(&ctx.xor(a, b))
}

/// Oblivious single-bit select: `sel ? a : b`, branchless by construction
pub(crate) fn mux_bit<Ctx: ContextT>(
    ctx: &Ctx,
    sel: &Ctx::Bit,
    a: &Ctx::Bit,
    b: &Ctx::Bit,
) -> Ctx::Bit {
    ctx.xor(b, &ctx.and(sel, &ctx.xor(a, b)))
}

pub(crate) fn mux_bits<Ctx: ContextT>(
    ctx: &Ctx,
    sel: &Ctx::Bit,
    a: &[Ctx::Bit],
    b: &[Ctx::Bit],
) -> Vec<Ctx::Bit> {
    a.par_iter()
        .zip(b.par_iter())
        .map(|(a_bit, b_bit)| mux_bit(ctx, sel, a_bit, b_bit))
        .collect()
}

pub(crate) fn not_bits<Ctx: ContextT>(ctx: &Ctx, bits: &[Ctx::Bit]) -> Vec<Ctx::Bit> {
    bits.par_iter().map(|bit| ctx.not(bit)).collect()
}

fn zeros<Ctx: ContextT>(ctx: &Ctx, len: usize) -> Vec<Ctx::Bit> {
    (0..len).map(|_| ctx.trivial(false)).collect()
}

pub(crate) fn or_reduce<Ctx: ContextT>(ctx: &Ctx, bits: &[Ctx::Bit]) -> Ctx::Bit {
    let mut acc = ctx.trivial(false);
    for bit in bits {
        acc = or_bit(ctx, &acc, bit);
    }
    acc
}

fn is_zero_bits<Ctx: ContextT>(ctx: &Ctx, bits: &[Ctx::Bit]) -> Ctx::Bit {
    ctx.not(&or_reduce(ctx, bits))
}

/// Two's-complement negate when `sel` is set: `(x ^ sel) + sel`
fn cond_neg_bits<Ctx: ContextT>(ctx: &Ctx, bits: &[Ctx::Bit], sel: &Ctx::Bit) -> Vec<Ctx::Bit> {
    let flipped: Vec<_> = bits.par_iter().map(|bit| ctx.xor(bit, sel)).collect();
    ripple_add(ctx, &flipped, &zeros(ctx, bits.len()), sel.clone()).sum
}

/// Sign/zero-extend the raw bits to `target` positions
fn extend_bits<Ctx: ContextT>(ctx: &Ctx, val: &EncInt<Ctx::Bit>, target: usize) -> Vec<Ctx::Bit> {
    let mut bits = val.bits().to_vec();
    while bits.len() < target {
        bits.push(match val.sign() {
            Sign::Signed => val.msb().clone(),
            Sign::Unsigned => ctx.trivial(false),
        });
    }
    bits
}

pub fn add<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<EncInt<Ctx::Bit>> {
    a.check_compat(b)?;
    let out = ripple_add(ctx, a.bits(), b.bits(), ctx.trivial(false));
    Ok(EncInt::new(out.sum, a.width(), a.sign()))
}

/// Wrapping add plus an encrypted flag set iff the true sum falls outside
/// the representable range of the operands' width and signedness
pub fn add_checked<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<(EncInt<Ctx::Bit>, Ctx::Bit)> {
    a.check_compat(b)?;
    let out = ripple_add(ctx, a.bits(), b.bits(), ctx.trivial(false));
    let flag = overflow_flag(ctx, a.sign(), &out);
    Ok((EncInt::new(out.sum, a.width(), a.sign()), flag))
}

pub fn sub<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<EncInt<Ctx::Bit>> {
    a.check_compat(b)?;
    let out = ripple_add(ctx, a.bits(), &not_bits(ctx, b.bits()), ctx.trivial(true));
    Ok(EncInt::new(out.sum, a.width(), a.sign()))
}

pub fn sub_checked<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<(EncInt<Ctx::Bit>, Ctx::Bit)> {
    a.check_compat(b)?;
    let out = ripple_add(ctx, a.bits(), &not_bits(ctx, b.bits()), ctx.trivial(true));
    let flag = match a.sign() {
        // missing carry out of `a + !b + 1` is an unsigned borrow
        Sign::Unsigned => ctx.not(&out.carry_out),
        Sign::Signed => ctx.xor(&out.carry_into_msb, &out.carry_out),
    };
    Ok((EncInt::new(out.sum, a.width(), a.sign()), flag))
}

fn overflow_flag<Ctx: ContextT>(ctx: &Ctx, sign: Sign, out: &AddOut<Ctx::Bit>) -> Ctx::Bit {
    match sign {
        Sign::Unsigned => out.carry_out.clone(),
        Sign::Signed => ctx.xor(&out.carry_into_msb, &out.carry_out),
    }
}

pub fn neg<Ctx: ContextT>(ctx: &Ctx, a: &EncInt<Ctx::Bit>) -> EncInt<Ctx::Bit> {
    let bits = cond_neg_bits(ctx, a.bits(), &ctx.trivial(true));
    EncInt::new(bits, a.width(), a.sign())
}

/// Modular schoolbook product over equal-length bit slices
fn mul_bits<Ctx: ContextT>(ctx: &Ctx, a: &[Ctx::Bit], b: &[Ctx::Bit]) -> Vec<Ctx::Bit> {
    let w = a.len();
    let mut acc = zeros(ctx, w);
    for i in 0..w {
        let row: Vec<_> = a[..w - i]
            .par_iter()
            .map(|a_bit| ctx.and(a_bit, &b[i]))
            .collect();
        let out = ripple_add(ctx, &acc[i..], &row, ctx.trivial(false));
        for (k, sum_bit) in out.sum.into_iter().enumerate() {
            acc[i + k] = sum_bit;
        }
    }
    acc
}

pub fn mul<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<EncInt<Ctx::Bit>> {
    a.check_compat(b)?;
    Ok(EncInt::new(
        mul_bits(ctx, a.bits(), b.bits()),
        a.width(),
        a.sign(),
    ))
}

/// Wrapping multiply plus overflow flag. The flag comes from the
/// double-width product: the true result fits iff every bit above the
/// result width is the zero/sign extension of the in-range part.
pub fn mul_checked<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<(EncInt<Ctx::Bit>, Ctx::Bit)> {
    a.check_compat(b)?;
    let w = a.width().bits();
    let wide_a = extend_bits(ctx, a, 2 * w);
    let wide_b = extend_bits(ctx, b, 2 * w);
    let prod = mul_bits(ctx, &wide_a, &wide_b);
    let flag = match a.sign() {
        Sign::Unsigned => or_reduce(ctx, &prod[w..]),
        Sign::Signed => {
            let sign_bit = &prod[w - 1];
            let mut all_extend = ctx.trivial(true);
            for hi in &prod[w..] {
                all_extend = ctx.and(&all_extend, &xnor_bit(ctx, hi, sign_bit));
            }
            ctx.not(&all_extend)
        }
    };
    let low = prod[..w].to_vec();
    Ok((EncInt::new(low, a.width(), a.sign()), flag))
}

/// Restoring division over unsigned magnitudes; returns (quotient, remainder)
fn divrem_magnitude<Ctx: ContextT>(
    ctx: &Ctx,
    n: &[Ctx::Bit],
    d: &[Ctx::Bit],
) -> (Vec<Ctx::Bit>, Vec<Ctx::Bit>) {
    let w = n.len();
    // one extra remainder bit so the trial subtraction cannot wrap
    let mut d_ext = d.to_vec();
    d_ext.push(ctx.trivial(false));
    let d_ext_not = not_bits(ctx, &d_ext);
    let mut r = zeros(ctx, w + 1);
    let mut q = zeros(ctx, w);
    for i in (0..w).rev() {
        // r = (r << 1) | n[i]; the dropped top bit is always zero since the
        // remainder stays below the divisor
        r.pop();
        r.insert(0, n[i].clone());
        let trial = ripple_add(ctx, &r, &d_ext_not, ctx.trivial(true));
        // carry out means no borrow, i.e. r >= d
        q[i] = trial.carry_out.clone();
        r = mux_bits(ctx, &q[i], &trial.sum, &r);
    }
    r.truncate(w);
    (q, r)
}

pub fn div<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<EncInt<Ctx::Bit>> {
    divrem(ctx, a, b).map(|(q, _)| q)
}

/// Remainder companion of [`div`]; its sign follows the dividend
pub fn rem<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<EncInt<Ctx::Bit>> {
    divrem(ctx, a, b).map(|(_, r)| r)
}

/// Truncating division. A zero divisor fails the call: the circuit computes
/// an encrypted divisor-is-zero bit and the engine opens that single bit —
/// the in-language analogue of a host-side revert.
pub fn divrem<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<(EncInt<Ctx::Bit>, EncInt<Ctx::Bit>)> {
    a.check_compat(b)?;
    let zero_divisor = is_zero_bits(ctx, b.bits());
    if ctx.open(&zero_divisor) {
        return Err(Error::DivisionByZero);
    }
    debug!(width = a.width().bits(), "division circuit");
    let (q, r) = match a.sign() {
        Sign::Unsigned => divrem_magnitude(ctx, a.bits(), b.bits()),
        Sign::Signed => {
            let neg_a = a.msb().clone();
            let neg_b = b.msb().clone();
            let mag_a = cond_neg_bits(ctx, a.bits(), &neg_a);
            let mag_b = cond_neg_bits(ctx, b.bits(), &neg_b);
            let (q, r) = divrem_magnitude(ctx, &mag_a, &mag_b);
            let neg_q = ctx.xor(&neg_a, &neg_b);
            (
                cond_neg_bits(ctx, &q, &neg_q),
                cond_neg_bits(ctx, &r, &neg_a),
            )
        }
    };
    Ok((
        EncInt::new(q, a.width(), a.sign()),
        EncInt::new(r, a.width(), a.sign()),
    ))
}

pub fn and<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<EncInt<Ctx::Bit>> {
    a.check_compat(b)?;
    let bits = a
        .bits()
        .par_iter()
        .zip(b.bits().par_iter())
        .map(|(a_bit, b_bit)| ctx.and(a_bit, b_bit))
        .collect();
    Ok(EncInt::new(bits, a.width(), a.sign()))
}

pub fn or<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<EncInt<Ctx::Bit>> {
    a.check_compat(b)?;
    let bits = a
        .bits()
        .par_iter()
        .zip(b.bits().par_iter())
        .map(|(a_bit, b_bit)| or_bit(ctx, a_bit, b_bit))
        .collect();
    Ok(EncInt::new(bits, a.width(), a.sign()))
}

pub fn xor<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<EncInt<Ctx::Bit>> {
    a.check_compat(b)?;
    let bits = a
        .bits()
        .par_iter()
        .zip(b.bits().par_iter())
        .map(|(a_bit, b_bit)| ctx.xor(a_bit, b_bit))
        .collect();
    Ok(EncInt::new(bits, a.width(), a.sign()))
}

pub fn not<Ctx: ContextT>(ctx: &Ctx, a: &EncInt<Ctx::Bit>) -> EncInt<Ctx::Bit> {
    EncInt::new(not_bits(ctx, a.bits()), a.width(), a.sign())
}

/// Logical left shift by a public amount; amounts >= width produce zero
pub fn shl<Ctx: ContextT>(ctx: &Ctx, a: &EncInt<Ctx::Bit>, amount: usize) -> EncInt<Ctx::Bit> {
    let w = a.width().bits();
    let bits = (0..w)
        .map(|i| {
            if i >= amount {
                a.bits()[i - amount].clone()
            } else {
                ctx.trivial(false)
            }
        })
        .collect();
    EncInt::new(bits, a.width(), a.sign())
}

/// Right shift by a public amount: logical for unsigned operands,
/// arithmetic (sign-extending) for signed ones
pub fn shr<Ctx: ContextT>(ctx: &Ctx, a: &EncInt<Ctx::Bit>, amount: usize) -> EncInt<Ctx::Bit> {
    let w = a.width().bits();
    let fill = match a.sign() {
        Sign::Signed => a.msb().clone(),
        Sign::Unsigned => ctx.trivial(false),
    };
    let bits = (0..w)
        .map(|i| {
            if i + amount < w {
                a.bits()[i + amount].clone()
            } else {
                fill.clone()
            }
        })
        .collect();
    EncInt::new(bits, a.width(), a.sign())
}

/// Guarded balance move: `amount` flows from `from` to `to` iff the source
/// covers it (and, for signed balances, the amount is non-negative). The
/// returned bit is the encrypted success flag; nothing about the branch
/// taken leaks through the result structure.
pub fn transfer<Ctx: ContextT>(
    ctx: &Ctx,
    from: &EncInt<Ctx::Bit>,
    to: &EncInt<Ctx::Bit>,
    amount: &EncInt<Ctx::Bit>,
) -> Result<(EncInt<Ctx::Bit>, EncInt<Ctx::Bit>, Ctx::Bit)> {
    from.check_compat(to)?;
    from.check_compat(amount)?;
    let zero = EncInt::trivial(ctx, &Plain::zero(from.width(), from.sign()));
    let mut ok = cmp::le(ctx, amount, from)?;
    if from.sign() == Sign::Signed {
        ok = ctx.and(&ok, &cmp::le(ctx, &zero, amount)?);
    }
    let delta = cmp::mux(ctx, &ok, amount, &zero)?;
    let new_from = sub(ctx, from, &delta)?;
    let new_to = add(ctx, to, &delta)?;
    Ok((new_from, new_to, ok))
}

// Explicit public-operand forms. A public operand is lifted through the
// operation-free trivial encoding and takes the identical gate path.

pub fn add_plain<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    p: &Plain,
) -> Result<EncInt<Ctx::Bit>> {
    add(ctx, a, &EncInt::trivial(ctx, p))
}

pub fn sub_plain<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    p: &Plain,
) -> Result<EncInt<Ctx::Bit>> {
    sub(ctx, a, &EncInt::trivial(ctx, p))
}

pub fn plain_sub<Ctx: ContextT>(
    ctx: &Ctx,
    p: &Plain,
    b: &EncInt<Ctx::Bit>,
) -> Result<EncInt<Ctx::Bit>> {
    sub(ctx, &EncInt::trivial(ctx, p), b)
}

pub fn mul_plain<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    p: &Plain,
) -> Result<EncInt<Ctx::Bit>> {
    mul(ctx, a, &EncInt::trivial(ctx, p))
}

/// Public divisor: a literal zero fails eagerly, before any circuit runs
pub fn div_plain<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    p: &Plain,
) -> Result<EncInt<Ctx::Bit>> {
    if p.is_zero() {
        return Err(Error::DivisionByZero);
    }
    div(ctx, a, &EncInt::trivial(ctx, p))
}

pub fn plain_div<Ctx: ContextT>(
    ctx: &Ctx,
    p: &Plain,
    b: &EncInt<Ctx::Bit>,
) -> Result<EncInt<Ctx::Bit>> {
    div(ctx, &EncInt::trivial(ctx, p), b)
}

pub fn rem_plain<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    p: &Plain,
) -> Result<EncInt<Ctx::Bit>> {
    if p.is_zero() {
        return Err(Error::DivisionByZero);
    }
    rem(ctx, a, &EncInt::trivial(ctx, p))
}

pub fn and_plain<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    p: &Plain,
) -> Result<EncInt<Ctx::Bit>> {
    and(ctx, a, &EncInt::trivial(ctx, p))
}

pub fn or_plain<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    p: &Plain,
) -> Result<EncInt<Ctx::Bit>> {
    or(ctx, a, &EncInt::trivial(ctx, p))
}

pub fn xor_plain<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    p: &Plain,
) -> Result<EncInt<Ctx::Bit>> {
    xor(ctx, a, &EncInt::trivial(ctx, p))
}

/// Element-wise batch add; slices of differing length fail before any work
pub fn add_batch<Ctx: ContextT>(
    ctx: &Ctx,
    lhs: &[EncInt<Ctx::Bit>],
    rhs: &[EncInt<Ctx::Bit>],
) -> Result<Vec<EncInt<Ctx::Bit>>> {
    if lhs.len() != rhs.len() {
        return Err(Error::LengthMismatch {
            lhs: lhs.len(),
            rhs: rhs.len(),
        });
    }
    lhs.par_iter()
        .zip(rhs.par_iter())
        .map(|(a, b)| add(ctx, a, b))
        .collect()
}

pub fn mul_batch<Ctx: ContextT>(
    ctx: &Ctx,
    lhs: &[EncInt<Ctx::Bit>],
    rhs: &[EncInt<Ctx::Bit>],
) -> Result<Vec<EncInt<Ctx::Bit>>> {
    if lhs.len() != rhs.len() {
        return Err(Error::LengthMismatch {
            lhs: lhs.len(),
            rhs: rhs.len(),
        });
    }
    lhs.par_iter()
        .zip(rhs.par_iter())
        .map(|(a, b)| mul(ctx, a, b))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::clear;
    use crate::secint::encryption;
    use crate::secint::test_helper::{check_binary_op, check_checked_op, sample_pairs};
    use crate::value::Width;
    use itertools::iproduct;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_add_sub_mul_match_reference() {
        let (client_key, ctx) = clear::generate();
        let mut rng = ChaCha20Rng::from_seed(Default::default());
        for (width, sign) in iproduct!(Width::ALL, Sign::ALL) {
            for (a, b) in sample_pairs(&mut rng, width, sign, 6) {
                check_binary_op(&ctx, &client_key, &a, &b, add, |x, y| x.wrapping_add(y));
                check_binary_op(&ctx, &client_key, &a, &b, sub, |x, y| x.wrapping_sub(y));
                check_binary_op(&ctx, &client_key, &a, &b, mul, |x, y| x.wrapping_mul(y));
            }
        }
    }

    #[test]
    fn test_checked_ops_match_reference() {
        let (client_key, ctx) = clear::generate();
        let mut rng = ChaCha20Rng::from_seed(Default::default());
        for (width, sign) in iproduct!([Width::W8, Width::W32, Width::W128], Sign::ALL) {
            for (a, b) in sample_pairs(&mut rng, width, sign, 5) {
                check_checked_op(&ctx, &client_key, &a, &b, add_checked, |x, y| {
                    x.overflowing_add(y)
                });
                check_checked_op(&ctx, &client_key, &a, &b, sub_checked, |x, y| {
                    x.overflowing_sub(y)
                });
                check_checked_op(&ctx, &client_key, &a, &b, mul_checked, |x, y| {
                    x.overflowing_mul(y)
                });
            }
        }
    }

    #[test]
    fn test_overflow_boundaries() {
        let (client_key, ctx) = clear::generate();

        // u8: 255 + 1 wraps to 0 and flags
        let a = encryption::encrypt(&client_key, &Plain::from_u128(255, Width::W8));
        let b = encryption::encrypt(&client_key, &Plain::from_u128(1, Width::W8));
        let (sum, flag) = add_checked(&ctx, &a, &b).unwrap();
        assert_eq!(encryption::decrypt(&client_key, &sum).to_u128(), 0);
        assert!(ctx.open(&flag));

        // i128: max + 1 wraps to min and flags
        let max = encryption::encrypt(&client_key, &Plain::max_value(Width::W128, Sign::Signed));
        let one = encryption::encrypt(&client_key, &Plain::from_i128(1, Width::W128));
        let (sum, flag) = add_checked(&ctx, &max, &one).unwrap();
        assert_eq!(
            encryption::decrypt(&client_key, &sum),
            Plain::min_value(Width::W128, Sign::Signed)
        );
        assert!(ctx.open(&flag));

        // in-range sum does not flag
        let (_, flag) = add_checked(&ctx, &one, &one).unwrap();
        assert!(!ctx.open(&flag));
    }

    #[test]
    fn test_div_rem_match_reference() {
        let (client_key, ctx) = clear::generate();
        let mut rng = ChaCha20Rng::from_seed(Default::default());
        for (width, sign) in iproduct!([Width::W8, Width::W16, Width::W64], Sign::ALL) {
            for (a, b) in sample_pairs(&mut rng, width, sign, 5) {
                if b.is_zero() {
                    continue;
                }
                check_binary_op(&ctx, &client_key, &a, &b, div, |x, y| x.div(y));
                check_binary_op(&ctx, &client_key, &a, &b, rem, |x, y| x.rem(y));
            }
        }
    }

    #[test]
    fn test_division_by_zero_fails_closed() {
        let (client_key, ctx) = clear::generate();
        let a = encryption::encrypt(&client_key, &Plain::from_u128(7, Width::W32));
        let zero = encryption::encrypt(&client_key, &Plain::zero(Width::W32, Sign::Unsigned));
        assert_eq!(div(&ctx, &a, &zero).unwrap_err(), Error::DivisionByZero);
        assert_eq!(
            div_plain(&ctx, &a, &Plain::zero(Width::W32, Sign::Unsigned)).unwrap_err(),
            Error::DivisionByZero
        );
    }

    #[test]
    fn test_signed_scenarios_width_128() {
        let (client_key, ctx) = clear::generate();
        let enc = |v: i128| encryption::encrypt(&client_key, &Plain::from_i128(v, Width::W128));
        let dec = |v: &EncInt<_>| encryption::decrypt(&client_key, v).to_i128();

        assert_eq!(dec(&add(&ctx, &enc(5), &enc(-3)).unwrap()), 2);
        assert_eq!(
            dec(&mul(&ctx, &enc(-1_000_000_000_000_000), &enc(-3_000_000_000_000)).unwrap()),
            3_000_000_000_000_000_000_000_000_000
        );
        assert_eq!(
            dec(&div(
                &ctx,
                &enc(-12_000_000_000_000_000_000_000_000),
                &enc(3_000_000_000_000_000_000_000_000)
            )
            .unwrap()),
            -4
        );
        assert_eq!(
            dec(&and(&ctx, &enc(0xFFFFFFFF), &enc(0x123456789)).unwrap()),
            0x23456789
        );
    }

    #[test]
    fn test_bitwise_and_shifts() {
        let (client_key, ctx) = clear::generate();
        let mut rng = ChaCha20Rng::from_seed(Default::default());
        for (width, sign) in iproduct!([Width::W8, Width::W64, Width::W256], Sign::ALL) {
            for (a, b) in sample_pairs(&mut rng, width, sign, 4) {
                check_binary_op(&ctx, &client_key, &a, &b, and, |x, y| x.and(y));
                check_binary_op(&ctx, &client_key, &a, &b, or, |x, y| x.or(y));
                check_binary_op(&ctx, &client_key, &a, &b, xor, |x, y| x.xor(y));

                let ea = encryption::encrypt(&client_key, &a);
                for amount in [0, 1, 3, width.bits() - 1, width.bits(), width.bits() + 5] {
                    assert_eq!(
                        encryption::decrypt(&client_key, &shl(&ctx, &ea, amount)),
                        a.shl(amount)
                    );
                    assert_eq!(
                        encryption::decrypt(&client_key, &shr(&ctx, &ea, amount)),
                        a.shr(amount)
                    );
                }
            }
        }
    }

    #[test]
    fn test_neg_and_not() {
        let (client_key, ctx) = clear::generate();
        let a = encryption::encrypt(&client_key, &Plain::from_i128(42, Width::W64));
        assert_eq!(
            encryption::decrypt(&client_key, &neg(&ctx, &a)).to_i128(),
            -42
        );
        let b = encryption::encrypt(&client_key, &Plain::from_u128(0x0f, Width::W8));
        assert_eq!(
            encryption::decrypt(&client_key, &not(&ctx, &b)).to_u128(),
            0xf0
        );
    }

    #[test]
    fn test_transfer_guarded() {
        let (client_key, ctx) = clear::generate();
        let enc = |v: u128| encryption::encrypt(&client_key, &Plain::from_u128(v, Width::W64));
        let dec = |v: &EncInt<_>| encryption::decrypt(&client_key, v).to_u128();

        let (from, to, ok) = transfer(&ctx, &enc(100), &enc(10), &enc(30)).unwrap();
        assert!(ctx.open(&ok));
        assert_eq!(dec(&from), 70);
        assert_eq!(dec(&to), 40);

        // insufficient balance leaves both sides untouched
        let (from, to, ok) = transfer(&ctx, &enc(100), &enc(10), &enc(101)).unwrap();
        assert!(!ctx.open(&ok));
        assert_eq!(dec(&from), 100);
        assert_eq!(dec(&to), 10);
    }

    #[test]
    fn test_batch_ops() {
        let (client_key, ctx) = clear::generate();
        let mut rng = ChaCha20Rng::from_seed(Default::default());
        let lhs: Vec<Plain> = (0..8)
            .map(|_| Plain::random(&mut rng, Width::W32, Sign::Unsigned))
            .collect();
        let rhs: Vec<Plain> = (0..8)
            .map(|_| Plain::random(&mut rng, Width::W32, Sign::Unsigned))
            .collect();
        let enc_lhs = encryption::encrypt_batch(&client_key, &lhs);
        let enc_rhs = encryption::encrypt_batch(&client_key, &rhs);

        let sums = add_batch(&ctx, &enc_lhs, &enc_rhs).unwrap();
        let prods = mul_batch(&ctx, &enc_lhs, &enc_rhs).unwrap();
        for i in 0..8 {
            assert_eq!(
                encryption::decrypt(&client_key, &sums[i]),
                lhs[i].wrapping_add(&rhs[i])
            );
            assert_eq!(
                encryption::decrypt(&client_key, &prods[i]),
                lhs[i].wrapping_mul(&rhs[i])
            );
        }

        let err = add_batch(&ctx, &enc_lhs, &enc_rhs[..7]).unwrap_err();
        assert_eq!(err, Error::LengthMismatch { lhs: 8, rhs: 7 });
    }

    #[test]
    fn test_plain_operand_forms_agree() {
        let (client_key, ctx) = clear::generate();
        let a = Plain::from_i128(-40, Width::W32);
        let b = Plain::from_i128(7, Width::W32);
        let ea = encryption::encrypt(&client_key, &a);
        let eb = encryption::encrypt(&client_key, &b);

        let both = div(&ctx, &ea, &eb).unwrap();
        let rhs_pub = div_plain(&ctx, &ea, &b).unwrap();
        let lhs_pub = plain_div(&ctx, &a, &eb).unwrap();
        let expected = a.div(&b);
        for out in [&both, &rhs_pub, &lhs_pub] {
            assert_eq!(encryption::decrypt(&client_key, out), expected);
        }

        let sub_forms = [
            sub(&ctx, &ea, &eb).unwrap(),
            sub_plain(&ctx, &ea, &b).unwrap(),
            plain_sub(&ctx, &a, &eb).unwrap(),
        ];
        for out in &sub_forms {
            assert_eq!(encryption::decrypt(&client_key, out), a.wrapping_sub(&b));
        }

        let checks = [
            (add_plain(&ctx, &ea, &b).unwrap(), a.wrapping_add(&b)),
            (mul_plain(&ctx, &ea, &b).unwrap(), a.wrapping_mul(&b)),
            (rem_plain(&ctx, &ea, &b).unwrap(), a.rem(&b)),
            (and_plain(&ctx, &ea, &b).unwrap(), a.and(&b)),
            (or_plain(&ctx, &ea, &b).unwrap(), a.or(&b)),
            (xor_plain(&ctx, &ea, &b).unwrap(), a.xor(&b)),
        ];
        for (out, expected) in &checks {
            assert_eq!(encryption::decrypt(&client_key, out), *expected);
        }
    }
}
