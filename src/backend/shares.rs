//! Two-party XOR secret-sharing backend. A bit is split into two shares whose
//! XOR is the value; XOR of shared bits is share-wise, AND consumes a Beaver
//! triple drawn from the context's correlated-randomness tape. Both share
//! holders are colocated in this process; the share-wise structure of every
//! gate is what a two-node deployment would distribute.

use crate::backend::{BitT, ClientKeyT, ContextT};
use std::ops::BitXorAssign;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct ShareBit {
    s0: bool,
    s1: bool,
    context_id: u64,
}

impl BitXorAssign<&Self> for ShareBit {
    fn bitxor_assign(&mut self, rhs: &Self) {
        assert_eq!(
            self.context_id, rhs.context_id,
            "shares from different evaluation contexts"
        );
        self.s0 ^= rhs.s0;
        self.s1 ^= rhs.s1;
    }
}

impl BitT for ShareBit {}

struct Inner {
    context_id: u64,
    /// Correlated-randomness tape for Beaver triples. Advancing it only
    /// affects gates not yet evaluated; existing shares carry their full
    /// state and never read it back.
    tape: Mutex<ChaCha20Rng>,
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

/// Deterministic from the seed apart from the process-unique context id
pub fn generate(seed: [u8; 32]) -> (ClientKey, EvalContext) {
    let mut root = ChaCha20Rng::from_seed(seed);
    let tape = ChaCha20Rng::from_seed(root.random());
    let client_rng = ChaCha20Rng::from_seed(root.random());

    let inner = Arc::new(Inner {
        context_id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
        tape: Mutex::new(tape),
    });
    let client_key = ClientKey {
        inner: inner.clone(),
        rng: Arc::new(Mutex::new(client_rng)),
    };
    (client_key, EvalContext { inner })
}

impl EvalContext {
    fn beaver_triple(&self) -> (ShareBit, ShareBit, ShareBit) {
        let mut tape = self.inner.tape.lock().expect("tape lock");
        let a: bool = tape.random();
        let b: bool = tape.random();
        let c = a & b;
        let share = |val: bool, tape: &mut ChaCha20Rng| {
            let r: bool = tape.random();
            ShareBit {
                s0: r,
                s1: r ^ val,
                context_id: self.inner.context_id,
            }
        };
        (share(a, &mut tape), share(b, &mut tape), share(c, &mut tape))
    }
}

fn and_public(share: &ShareBit, public: bool) -> ShareBit {
    ShareBit {
        s0: share.s0 & public,
        s1: share.s1 & public,
        context_id: share.context_id,
    }
}

impl ContextT for EvalContext {
    type Bit = ShareBit;

    fn trivial(&self, bit: bool) -> ShareBit {
        ShareBit {
            s0: bit,
            s1: false,
            context_id: self.inner.context_id,
        }
    }

    fn and(&self, a: &ShareBit, b: &ShareBit) -> ShareBit {
        let (ta, tb, tc) = self.beaver_triple();
        // d and e are safe to reconstruct: the triple masks the inputs
        let d = self.open(&self.xor(a, &ta));
        let e = self.open(&self.xor(b, &tb));
        let mut out = tc;
        out ^= &and_public(&tb, d);
        out ^= &and_public(&ta, e);
        out ^= &self.trivial(d & e);
        out
    }

    fn not(&self, a: &ShareBit) -> ShareBit {
        ShareBit {
            s0: !a.s0,
            s1: a.s1,
            context_id: a.context_id,
        }
    }

    fn open(&self, bit: &ShareBit) -> bool {
        assert_eq!(
            bit.context_id, self.inner.context_id,
            "share from a different evaluation context"
        );
        bit.s0 ^ bit.s1
    }
}

impl ClientKeyT for ClientKey {
    type Bit = ShareBit;

    fn encrypt(&self, bit: bool) -> ShareBit {
        let r: bool = self.rng.lock().expect("rng lock").random();
        ShareBit {
            s0: r,
            s1: r ^ bit,
            context_id: self.inner.context_id,
        }
    }

    fn decrypt(&self, bit: &ShareBit) -> bool {
        assert_eq!(
            bit.context_id, self.inner.context_id,
            "share from a different evaluation context"
        );
        bit.s0 ^ bit.s1
    }
}
