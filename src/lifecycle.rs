//! Lifecycle manager: moves values between wire ciphertexts and the working
//! representation, scoped to a session. A session owns one backend context,
//! the call binding tickets must match, the canonical storage key, and a
//! host-supplied resolver for recipient keys. Secret material never crosses
//! sessions; working values from another session's context are rejected at
//! the gate level.

use crate::backend::{ClientKeyT, ContextT};
use crate::codec::{
    self, CallBinding, Ciphertext, InputTicket, PartyId, PartyKey, UserCiphertext,
};
use crate::error::{Error, Result};
use crate::secint::{encryption, EncInt};
use crate::value::{Plain, Sign, Width};
use hashbrown::HashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Mutex;
use tracing::debug;

/// Host-supplied key resolution: logical party to encryption key. The
/// engine never generates or stores party keys itself.
pub trait KeyResolverT: Send + Sync {
    fn key_of(&self, party: PartyId) -> Option<PartyKey>;
}

/// In-memory resolver; enough for tests and the demo binary
#[derive(Debug, Default)]
pub struct KeyRegistry {
    keys: HashMap<PartyId, PartyKey>,
}

impl KeyRegistry {
    pub fn insert(&mut self, party: PartyId, key: PartyKey) {
        self.keys.insert(party, key);
    }
}

impl KeyResolverT for KeyRegistry {
    fn key_of(&self, party: PartyId) -> Option<PartyKey> {
        self.keys.get(&party).cloned()
    }
}

/// One logical call context. Working values produced here are only
/// meaningful against this session's backend context.
pub struct Session<Ctx, CK> {
    ctx: Ctx,
    client_key: CK,
    resolver: Box<dyn KeyResolverT>,
    storage_key: PartyKey,
    binding: CallBinding,
    rng: Mutex<ChaCha20Rng>,
}

impl<Ctx, CK> Session<Ctx, CK>
where
    Ctx: ContextT,
    CK: ClientKeyT<Bit = Ctx::Bit>,
{
    pub fn new(
        ctx: Ctx,
        client_key: CK,
        resolver: Box<dyn KeyResolverT>,
        storage_key: PartyKey,
        binding: CallBinding,
        seed: [u8; 32],
    ) -> Self {
        Self {
            ctx,
            client_key,
            resolver,
            storage_key,
            binding,
            rng: Mutex::new(ChaCha20Rng::from_seed(seed)),
        }
    }

    pub fn context(&self) -> &Ctx {
        &self.ctx
    }

    pub fn client_key(&self) -> &CK {
        &self.client_key
    }

    pub fn binding(&self) -> &CallBinding {
        &self.binding
    }

    fn resolve(&self, party: PartyId) -> Result<PartyKey> {
        self.resolver.key_of(party).ok_or(Error::UnknownParty(party))
    }

    /// Encrypt a plaintext addressed to the given party (host-side helper
    /// for producing inputs and fixtures)
    pub fn encrypt_for(&self, party: PartyId, val: &Plain) -> Result<Ciphertext> {
        let key = self.resolve(party)?;
        let mut rng = self.rng.lock().expect("rng lock");
        Ok(codec::encode(val, &key, &mut *rng))
    }

    /// Encrypt and bind a caller input to this session's call context
    pub fn make_ticket(&self, val: &Plain) -> Result<InputTicket> {
        let key = self.resolve(self.binding.caller)?;
        let ct = {
            let mut rng = self.rng.lock().expect("rng lock");
            codec::encode(val, &key, &mut *rng)
        };
        Ok(codec::bind_ticket(&ct, &key, &self.binding))
    }

    /// Consume a caller-supplied ticket into a working value. Fails closed
    /// on any mismatch — malformed payload, wrong caller, wrong selector —
    /// yielding nothing beyond the binary reject.
    pub fn validate(&self, ticket: &InputTicket) -> Result<EncInt<Ctx::Bit>> {
        let key = self.resolve(self.binding.caller)?;
        if codec::binding_tag(&ticket.ct, &key, &self.binding) != ticket.binding {
            return Err(Error::InvalidCiphertext);
        }
        let val = codec::decode(&ticket.ct, &key).map_err(|_| Error::InvalidCiphertext)?;
        debug!(width = val.width().bits(), "ticket validated");
        Ok(encryption::encrypt(&self.client_key, &val))
    }

    /// Stored ciphertext (under the storage key) into a working value
    pub fn onboard(&self, ct: &Ciphertext) -> Result<EncInt<Ctx::Bit>> {
        let val = codec::decode(ct, &self.storage_key)?;
        Ok(encryption::encrypt(&self.client_key, &val))
    }

    /// Working value into a ciphertext under the canonical storage key. The
    /// source stays usable; offboarding is a read. In a distributed
    /// deployment the reconstruct-and-reencrypt below is a resharing round;
    /// the backend roles are colocated here.
    pub fn offboard(&self, val: &EncInt<Ctx::Bit>) -> Ciphertext {
        let plain = encryption::open(&self.ctx, val);
        let mut rng = self.rng.lock().expect("rng lock");
        codec::encode(&plain, &self.storage_key, &mut *rng)
    }

    /// Working value re-encrypted for a specific recipient
    pub fn offboard_to_user(
        &self,
        val: &EncInt<Ctx::Bit>,
        party: PartyId,
    ) -> Result<UserCiphertext> {
        let key = self.resolve(party)?;
        let plain = encryption::open(&self.ctx, val);
        let mut rng = self.rng.lock().expect("rng lock");
        Ok(UserCiphertext {
            party,
            ct: codec::encode(&plain, &key, &mut *rng),
        })
    }

    /// Both fragments from one working value: one under the storage key for
    /// shared state, one under the recipient's key for delivery. Does not
    /// consume or invalidate the source.
    pub fn offboard_combined(
        &self,
        val: &EncInt<Ctx::Bit>,
        party: PartyId,
    ) -> Result<(Ciphertext, UserCiphertext)> {
        let storage = self.offboard(val);
        let user = self.offboard_to_user(val, party)?;
        debug!(party = party.0, "offboarded combined");
        Ok((storage, user))
    }

    /// Reveal the cleartext. A trust boundary crossing: only call when the
    /// surrounding context is authorized to learn the value.
    pub fn reveal(&self, val: &EncInt<Ctx::Bit>) -> Plain {
        encryption::open(&self.ctx, val)
    }

    /// Uniformly random working value of the given width and signedness
    pub fn rand(&self, width: Width, sign: Sign) -> EncInt<Ctx::Bit> {
        let bits: Vec<bool> = {
            let mut rng = self.rng.lock().expect("rng lock");
            (0..width.bits()).map(|_| rng.random()).collect()
        };
        EncInt::new(
            bits.into_iter()
                .map(|bit| self.client_key.encrypt(bit))
                .collect(),
            width,
            sign,
        )
    }

    /// Uniformly random over `[0, 2^num_bits)`: the low `num_bits` are
    /// random, everything above is zero. The bound itself is public.
    pub fn rand_bounded(&self, width: Width, num_bits: usize) -> EncInt<Ctx::Bit> {
        assert!(num_bits <= width.bits());
        let low: Vec<bool> = {
            let mut rng = self.rng.lock().expect("rng lock");
            (0..num_bits).map(|_| rng.random()).collect()
        };
        let mut bits: Vec<Ctx::Bit> = low
            .into_iter()
            .map(|bit| self.client_key.encrypt(bit))
            .collect();
        while bits.len() < width.bits() {
            bits.push(self.ctx.trivial(false));
        }
        EncInt::new(bits, width, Sign::Unsigned)
    }
}
