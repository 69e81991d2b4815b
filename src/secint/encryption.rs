//! Boundary conversions between plaintext values and the working
//! representation.

use crate::backend::{ClientKeyT, ContextT};
use crate::secint::EncInt;
use crate::value::Plain;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

pub fn encrypt<CK: ClientKeyT>(client_key: &CK, val: &Plain) -> EncInt<CK::Bit> {
    EncInt::new(
        val.bits_le().map(|bit| client_key.encrypt(bit)).collect(),
        val.width(),
        val.sign(),
    )
}

pub fn decrypt<CK: ClientKeyT>(client_key: &CK, val: &EncInt<CK::Bit>) -> Plain {
    let bits: Vec<bool> = val.bits().iter().map(|bit| client_key.decrypt(bit)).collect();
    Plain::from_bits_le(&bits, val.width(), val.sign())
}

/// Reveal through the evaluation context. This is the decrypt path used when
/// no client key is in play (offboarding, the reveal operation); a trust
/// boundary crossing for the caller to gate.
pub fn open<Ctx: ContextT>(ctx: &Ctx, val: &EncInt<Ctx::Bit>) -> Plain {
    let bits: Vec<bool> = val.bits().iter().map(|bit| ctx.open(bit)).collect();
    Plain::from_bits_le(&bits, val.width(), val.sign())
}

pub fn encrypt_batch<CK: ClientKeyT>(client_key: &CK, vals: &[Plain]) -> Vec<EncInt<CK::Bit>> {
    vals.par_iter()
        .map(|val| encrypt(client_key, val))
        .collect()
}

pub fn decrypt_batch<CK: ClientKeyT>(client_key: &CK, vals: &[EncInt<CK::Bit>]) -> Vec<Plain> {
    vals.par_iter()
        .map(|val| decrypt(client_key, val))
        .collect()
}
