//! Comparison and oblivious-selection circuits. Comparisons return an
//! encrypted boolean; ordering follows the operands' declared signedness
//! (two's-complement order for signed values). Selection never branches on
//! the secret condition.

use crate::backend::ContextT;
use crate::error::Result;
use crate::secint::arith::{mux_bits, not_bits, or_reduce, ripple_add};
use crate::secint::EncInt;
use crate::value::Sign;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

pub fn eq<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<Ctx::Bit> {
    a.check_compat(b)?;
    Ok(ctx.not(&ne_bit(ctx, a, b)))
}

pub fn ne<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<Ctx::Bit> {
    a.check_compat(b)?;
    Ok(ne_bit(ctx, a, b))
}

fn ne_bit<Ctx: ContextT>(ctx: &Ctx, a: &EncInt<Ctx::Bit>, b: &EncInt<Ctx::Bit>) -> Ctx::Bit {
    let diffs: Vec<_> = a
        .bits()
        .par_iter()
        .zip(b.bits().par_iter())
        .map(|(a_bit, b_bit)| ctx.xor(a_bit, b_bit))
        .collect();
    or_reduce(ctx, &diffs)
}

/// `a < b` read off the subtraction `a + !b + 1`: the missing carry is an
/// unsigned borrow; for signed operands the difference sign corrected by
/// the overflow bit gives two's-complement order
fn lt_bit<Ctx: ContextT>(ctx: &Ctx, a: &EncInt<Ctx::Bit>, b: &EncInt<Ctx::Bit>) -> Ctx::Bit {
    let out = ripple_add(ctx, a.bits(), &not_bits(ctx, b.bits()), ctx.trivial(true));
    match a.sign() {
        Sign::Unsigned => ctx.not(&out.carry_out),
        Sign::Signed => {
            let overflow = ctx.xor(&out.carry_into_msb, &out.carry_out);
            ctx.xor(out.sum.last().expect("at least one bit"), &overflow)
        }
    }
}

pub fn lt<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<Ctx::Bit> {
    a.check_compat(b)?;
    Ok(lt_bit(ctx, a, b))
}

pub fn gt<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<Ctx::Bit> {
    lt(ctx, b, a)
}

pub fn ge<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<Ctx::Bit> {
    Ok(ctx.not(&lt(ctx, a, b)?))
}

pub fn le<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<Ctx::Bit> {
    Ok(ctx.not(&gt(ctx, a, b)?))
}

/// Oblivious select: `sel ? a : b`, bit-wise `b ^ (sel & (a ^ b))`
pub fn mux<Ctx: ContextT>(
    ctx: &Ctx,
    sel: &Ctx::Bit,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<EncInt<Ctx::Bit>> {
    a.check_compat(b)?;
    Ok(EncInt::new(
        mux_bits(ctx, sel, a.bits(), b.bits()),
        a.width(),
        a.sign(),
    ))
}

pub fn min<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<EncInt<Ctx::Bit>> {
    let sel = lt(ctx, a, b)?;
    mux(ctx, &sel, a, b)
}

pub fn max<Ctx: ContextT>(
    ctx: &Ctx,
    a: &EncInt<Ctx::Bit>,
    b: &EncInt<Ctx::Bit>,
) -> Result<EncInt<Ctx::Bit>> {
    let sel = lt(ctx, a, b)?;
    mux(ctx, &sel, b, a)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::clear;
    use crate::secint::encryption;
    use crate::secint::test_helper::{check_binary_op, check_compare_op, sample_pairs};
    use crate::value::{Plain, Width};
    use itertools::iproduct;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::cmp::Ordering;

    #[test]
    fn test_comparisons_match_reference() {
        let (client_key, ctx) = clear::generate();
        let mut rng = ChaCha20Rng::from_seed(Default::default());
        for (width, sign) in iproduct!(Width::ALL, Sign::ALL) {
            for (a, b) in sample_pairs(&mut rng, width, sign, 5) {
                check_compare_op(&ctx, &client_key, &a, &b, eq, |x, y| x == y);
                check_compare_op(&ctx, &client_key, &a, &b, ne, |x, y| x != y);
                check_compare_op(&ctx, &client_key, &a, &b, lt, |x, y| {
                    x.cmp_value(y) == Ordering::Less
                });
                check_compare_op(&ctx, &client_key, &a, &b, gt, |x, y| {
                    x.cmp_value(y) == Ordering::Greater
                });
                check_compare_op(&ctx, &client_key, &a, &b, ge, |x, y| {
                    x.cmp_value(y) != Ordering::Less
                });
                check_compare_op(&ctx, &client_key, &a, &b, le, |x, y| {
                    x.cmp_value(y) != Ordering::Greater
                });
                check_binary_op(&ctx, &client_key, &a, &b, min, |x, y| {
                    if x.cmp_value(y) == Ordering::Less {
                        *x
                    } else {
                        *y
                    }
                });
                check_binary_op(&ctx, &client_key, &a, &b, max, |x, y| {
                    if x.cmp_value(y) == Ordering::Less {
                        *y
                    } else {
                        *x
                    }
                });
            }
        }
    }

    #[test]
    fn test_signed_order_across_sign_bit_256() {
        let (client_key, ctx) = clear::generate();
        let enc = |v: &Plain| encryption::encrypt(&client_key, v);

        let min_val = enc(&Plain::min_value(Width::W256, Sign::Signed));
        let max_val = enc(&Plain::max_value(Width::W256, Sign::Signed));
        let minus_one = enc(&Plain::from_i128(-1, Width::W128).cast(Width::W256));
        let zero = enc(&Plain::zero(Width::W256, Sign::Signed));

        assert!(ctx.open(&lt(&ctx, &min_val, &max_val).unwrap()));
        assert!(ctx.open(&lt(&ctx, &minus_one, &zero).unwrap()));
        assert!(ctx.open(&lt(&ctx, &min_val, &minus_one).unwrap()));
        assert!(ctx.open(&gt(&ctx, &max_val, &zero).unwrap()));

        // same bit patterns compare the other way around unsigned
        let minus_one_u = minus_one.to_unsigned();
        let zero_u = zero.to_unsigned();
        assert!(ctx.open(&gt(&ctx, &minus_one_u, &zero_u).unwrap()));
    }

    #[test]
    fn test_mux_selects_obliviously() {
        let (client_key, ctx) = clear::generate();
        let a = encryption::encrypt(&client_key, &Plain::from_u128(0xaaaa, Width::W16));
        let b = encryption::encrypt(&client_key, &Plain::from_u128(0x5555, Width::W16));

        let taken = mux(&ctx, &client_key_bit(&client_key, true), &a, &b).unwrap();
        assert_eq!(encryption::decrypt(&client_key, &taken).to_u128(), 0xaaaa);
        let other = mux(&ctx, &client_key_bit(&client_key, false), &a, &b).unwrap();
        assert_eq!(encryption::decrypt(&client_key, &other).to_u128(), 0x5555);
    }

    fn client_key_bit(
        client_key: &clear::ClientKey,
        bit: bool,
    ) -> <clear::EvalContext as ContextT>::Bit {
        use crate::backend::ClientKeyT;
        client_key.encrypt(bit)
    }
}
