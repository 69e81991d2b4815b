//! Harness for checking an encrypted operation against the plaintext
//! reference, across all three operand-visibility forms: both operands
//! encrypted, left public, right public. The three forms must agree bit for
//! bit, flags included.

use crate::backend::{ClientKeyT, ContextT};
use crate::error::Result;
use crate::secint::{encryption, EncInt};
use crate::value::{Plain, Sign, Width};
use itertools::iproduct;
use rand::Rng;

/// Boundary anchors plus `extra` random pairs for the given width/signedness
pub fn sample_pairs(
    rng: &mut impl Rng,
    width: Width,
    sign: Sign,
    extra: usize,
) -> Vec<(Plain, Plain)> {
    let anchors = [
        Plain::zero(width, sign),
        Plain::from_u128(1, width).with_sign(sign),
        Plain::max_value(width, sign),
        Plain::min_value(width, sign),
    ];
    let mut pairs: Vec<(Plain, Plain)> = iproduct!(anchors, anchors).collect();
    for _ in 0..extra {
        pairs.push((
            Plain::random(rng, width, sign),
            Plain::random(rng, width, sign),
        ));
    }
    pairs
}

fn visibility_forms<Ctx, CK>(
    ctx: &Ctx,
    client_key: &CK,
    a: &Plain,
    b: &Plain,
) -> [(EncInt<Ctx::Bit>, EncInt<Ctx::Bit>, &'static str); 3]
where
    Ctx: ContextT,
    CK: ClientKeyT<Bit = Ctx::Bit>,
{
    let enc_a = encryption::encrypt(client_key, a);
    let enc_b = encryption::encrypt(client_key, b);
    let pub_a = EncInt::trivial(ctx, a);
    let pub_b = EncInt::trivial(ctx, b);
    [
        (enc_a.clone(), enc_b.clone(), "enc/enc"),
        (pub_a, enc_b, "pub/enc"),
        (enc_a, pub_b, "enc/pub"),
    ]
}

pub fn check_binary_op<Ctx, CK>(
    ctx: &Ctx,
    client_key: &CK,
    a: &Plain,
    b: &Plain,
    enc_op: impl Fn(&Ctx, &EncInt<Ctx::Bit>, &EncInt<Ctx::Bit>) -> Result<EncInt<Ctx::Bit>>,
    plain_op: impl Fn(&Plain, &Plain) -> Plain,
) where
    Ctx: ContextT,
    CK: ClientKeyT<Bit = Ctx::Bit>,
{
    let expected = plain_op(a, b);
    for (lhs, rhs, form) in visibility_forms(ctx, client_key, a, b) {
        let out = enc_op(ctx, &lhs, &rhs).expect("compatible operands");
        assert_eq!(
            encryption::decrypt(client_key, &out),
            expected,
            "{form} on {a:?}, {b:?}"
        );
    }
}

pub fn check_compare_op<Ctx, CK>(
    ctx: &Ctx,
    client_key: &CK,
    a: &Plain,
    b: &Plain,
    enc_op: impl Fn(&Ctx, &EncInt<Ctx::Bit>, &EncInt<Ctx::Bit>) -> Result<Ctx::Bit>,
    plain_op: impl Fn(&Plain, &Plain) -> bool,
) where
    Ctx: ContextT,
    CK: ClientKeyT<Bit = Ctx::Bit>,
{
    let expected = plain_op(a, b);
    for (lhs, rhs, form) in visibility_forms(ctx, client_key, a, b) {
        let out = enc_op(ctx, &lhs, &rhs).expect("compatible operands");
        assert_eq!(
            client_key.decrypt(&out),
            expected,
            "{form} on {a:?}, {b:?}"
        );
    }
}

pub fn check_checked_op<Ctx, CK>(
    ctx: &Ctx,
    client_key: &CK,
    a: &Plain,
    b: &Plain,
    enc_op: impl Fn(
        &Ctx,
        &EncInt<Ctx::Bit>,
        &EncInt<Ctx::Bit>,
    ) -> Result<(EncInt<Ctx::Bit>, Ctx::Bit)>,
    plain_op: impl Fn(&Plain, &Plain) -> (Plain, bool),
) where
    Ctx: ContextT,
    CK: ClientKeyT<Bit = Ctx::Bit>,
{
    let (expected, expected_flag) = plain_op(a, b);
    for (lhs, rhs, form) in visibility_forms(ctx, client_key, a, b) {
        let (out, flag) = enc_op(ctx, &lhs, &rhs).expect("compatible operands");
        assert_eq!(
            encryption::decrypt(client_key, &out),
            expected,
            "{form} on {a:?}, {b:?}"
        );
        assert_eq!(
            client_key.decrypt(&flag),
            expected_flag,
            "{form} overflow flag on {a:?}, {b:?}"
        );
    }
}
