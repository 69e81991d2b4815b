//! Garbled-circuit backend. Each bit is a pair of 128-bit wire labels (the
//! zero label and the currently active one); XOR is free via a global delta
//! offset, AND gates garble a four-row point-and-permute table keyed by a
//! fixed-key AES hash and evaluate it immediately. Garbler and evaluator are
//! colocated in this process, which is why a bit carries both labels.

use crate::backend::{BitT, ClientKeyT, ContextT};
use std::fmt::{Debug, Formatter};
use std::ops::BitXorAssign;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

type Label = [u8; 16];

#[derive(Clone)]
pub struct WireBit {
    zero: Label,
    active: Label,
    context_id: u64,
}

impl Debug for WireBit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireBit")
            .field("active", &hex::encode(self.active))
            .finish()
    }
}

impl BitXorAssign<&Self> for WireBit {
    fn bitxor_assign(&mut self, rhs: &Self) {
        assert_eq!(
            self.context_id, rhs.context_id,
            "wire labels from different evaluation contexts"
        );
        xor_into(&mut self.zero, &rhs.zero);
        xor_into(&mut self.active, &rhs.active);
    }
}

impl BitT for WireBit {}

struct Inner {
    context_id: u64,
    /// Global free-XOR offset; low bit forced to 1 so permute bits of the
    /// two labels of a wire always differ
    delta: Label,
    /// Fixed-key cipher backing the garbling hash
    cipher: Aes128,
    gate_counter: AtomicU64,
}

#[derive(Clone)]
pub struct EvalContext {
    inner: Arc<Inner>,
}

#[derive(Clone)]
pub struct ClientKey {
    inner: Arc<Inner>,
    rng: Arc<Mutex<ChaCha20Rng>>,
}

pub fn generate(seed: [u8; 32]) -> (ClientKey, EvalContext) {
    let mut root = ChaCha20Rng::from_seed(seed);
    let mut delta: Label = root.random();
    delta[0] |= 1;
    let cipher_key: [u8; 16] = root.random();
    let wire_rng = ChaCha20Rng::from_seed(root.random());

    let inner = Arc::new(Inner {
        context_id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
        delta,
        cipher: Aes128::new_from_slice(&cipher_key).expect("aes key length"),
        gate_counter: AtomicU64::new(0),
    });
    let client_key = ClientKey {
        inner: inner.clone(),
        rng: Arc::new(Mutex::new(wire_rng)),
    };
    (client_key, EvalContext { inner })
}

fn xor_into(label: &mut Label, rhs: &Label) {
    for (byte, rhs_byte) in label.iter_mut().zip(rhs.iter()) {
        *byte ^= rhs_byte;
    }
}

fn xored(mut label: Label, rhs: &Label) -> Label {
    xor_into(&mut label, rhs);
    label
}

fn permute_bit(label: &Label) -> usize {
    (label[0] & 1) as usize
}

/// Doubling in GF(2^128), used to separate the two hash inputs
fn dbl(label: &Label) -> Label {
    let val = u128::from_be_bytes(*label);
    let mut shifted = val << 1;
    if val >> 127 == 1 {
        shifted ^= 0x87;
    }
    shifted.to_be_bytes()
}

impl Inner {
    /// Tweakable circular-correlation-robust hash: pi(K) ^ K with
    /// K = 2A ^ 4B ^ tweak
    fn hash(&self, a: &Label, b: &Label, tweak: u128) -> Label {
        let mut key = dbl(a);
        xor_into(&mut key, &dbl(&dbl(b)));
        xor_into(&mut key, &tweak.to_be_bytes());
        let mut block = key.into();
        self.cipher.encrypt_block(&mut block);
        xored(block.into(), &key)
    }

    fn decode(&self, bit: &WireBit) -> bool {
        assert_eq!(
            bit.context_id, self.context_id,
            "wire label from a different evaluation context"
        );
        if bit.active == bit.zero {
            false
        } else if bit.active == xored(bit.zero, &self.delta) {
            true
        } else {
            panic!("corrupted wire label");
        }
    }
}

impl ContextT for EvalContext {
    type Bit = WireBit;

    fn trivial(&self, bit: bool) -> WireBit {
        let zero = [0u8; 16];
        WireBit {
            zero,
            active: if bit {
                xored(zero, &self.inner.delta)
            } else {
                zero
            },
            context_id: self.inner.context_id,
        }
    }

    fn and(&self, a: &WireBit, b: &WireBit) -> WireBit {
        assert_eq!(
            a.context_id, self.inner.context_id,
            "wire label from a different evaluation context"
        );
        assert_eq!(a.context_id, b.context_id, "wire labels from different evaluation contexts");
        let inner = &self.inner;
        let gid = inner.gate_counter.fetch_add(1, Ordering::Relaxed) as u128;

        let labels_a = [a.zero, xored(a.zero, &inner.delta)];
        let labels_b = [b.zero, xored(b.zero, &inner.delta)];

        // fresh output zero label, derived per gate
        let out_zero = inner.hash(&a.zero, &b.zero, gid << 3 | 4);

        // garble: four rows indexed by the input permute bits
        let mut table = [[0u8; 16]; 4];
        for va in 0..2 {
            for vb in 0..2 {
                let key_a = &labels_a[va];
                let key_b = &labels_b[vb];
                let out = if va & vb == 1 {
                    xored(out_zero, &inner.delta)
                } else {
                    out_zero
                };
                let row = permute_bit(key_a) << 1 | permute_bit(key_b);
                table[row] = xored(inner.hash(key_a, key_b, gid << 3), &out);
            }
        }

        // evaluate with the active labels
        let row = permute_bit(&a.active) << 1 | permute_bit(&b.active);
        let active = xored(inner.hash(&a.active, &b.active, gid << 3), &table[row]);

        WireBit {
            zero: out_zero,
            active,
            context_id: inner.context_id,
        }
    }

    fn not(&self, a: &WireBit) -> WireBit {
        assert_eq!(
            a.context_id, self.inner.context_id,
            "wire label from a different evaluation context"
        );
        // flipping the zero label against delta flips the decoded value
        WireBit {
            zero: xored(a.zero, &self.inner.delta),
            active: a.active,
            context_id: a.context_id,
        }
    }

    fn open(&self, bit: &WireBit) -> bool {
        self.inner.decode(bit)
    }
}

impl ClientKeyT for ClientKey {
    type Bit = WireBit;

    fn encrypt(&self, bit: bool) -> WireBit {
        let zero: Label = self.rng.lock().expect("rng lock").random();
        WireBit {
            zero,
            active: if bit {
                xored(zero, &self.inner.delta)
            } else {
                zero
            },
            context_id: self.inner.context_id,
        }
    }

    fn decrypt(&self, bit: &WireBit) -> bool {
        self.inner.decode(bit)
    }
}
