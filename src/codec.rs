//! Wire ciphertext codec. A stored/transmitted value is an addressed
//! encryption of a plaintext under a party's key, laid out as fixed 64-bit
//! blocks: one block up to 64 bits, two for 128-bit values, four for 256-bit
//! values, least significant first, little-endian bytes within a block. The
//! block structure and ordering are part of the wire contract.
//!
//! Each block is masked with an AES-CTR-style pad derived from a fresh
//! nonce; an AES-CBC-MAC tag over header and blocks authenticates the whole
//! ciphertext, so decoding under the wrong key fails instead of producing
//! garbage.

use crate::error::{Error, Result};
use crate::value::{Plain, Sign, Width};
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use rand::Rng;
use std::fmt::{Debug, Formatter};

const DOMAIN_BLOCK: u8 = 1;
const DOMAIN_TAG: u8 = 2;
const DOMAIN_BINDING: u8 = 3;

/// Logical party identifier; the host maps it to an encryption key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartyId(pub u64);

/// Symmetric key a party's ciphertexts are addressed under
#[derive(Clone, PartialEq, Eq)]
pub struct PartyKey([u8; 16]);

impl PartyKey {
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn random(rng: &mut impl Rng) -> Self {
        Self(rng.random())
    }

    fn cipher(&self) -> Aes128 {
        Aes128::new_from_slice(&self.0).expect("aes key length")
    }
}

impl Debug for PartyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // never print key material
        write!(f, "PartyKey(..)")
    }
}

/// Caller identity and operation selector an input ticket is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallBinding {
    pub caller: PartyId,
    pub selector: [u8; 4],
}

#[derive(Clone, PartialEq, Eq)]
struct CtBlock {
    nonce: [u8; 8],
    body: [u8; 8],
}

/// Addressed encryption of a [`Plain`] value
#[derive(Clone, PartialEq, Eq)]
pub struct Ciphertext {
    width: Width,
    sign: Sign,
    blocks: Vec<CtBlock>,
    tag: [u8; 8],
}

impl Debug for Ciphertext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ciphertext")
            .field("width", &self.width)
            .field("sign", &self.sign)
            .field("blocks", &self.blocks.len())
            .field("tag", &hex::encode(self.tag))
            .finish()
    }
}

/// Ciphertext bundled with the recipient it was addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCiphertext {
    pub party: PartyId,
    pub ct: Ciphertext,
}

/// Freshly supplied caller input: a ciphertext plus a tag binding it to a
/// specific caller and operation. Only validation turns it into a working
/// value; replaying it against a different call context fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputTicket {
    pub(crate) ct: Ciphertext,
    pub(crate) binding: [u8; 8],
}

impl Ciphertext {
    pub fn width(&self) -> Width {
        self.width
    }

    pub fn sign(&self) -> Sign {
        self.sign
    }

    /// Serialized layout: `width_bits: u16 LE | sign: u8 | blocks | tag`,
    /// each block `nonce(8) | body(8)`, least significant block first
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + self.blocks.len() * 16 + 8);
        out.extend_from_slice(&(self.width.bits() as u16).to_le_bytes());
        out.push(match self.sign {
            Sign::Unsigned => 0,
            Sign::Signed => 1,
        });
        for block in &self.blocks {
            out.extend_from_slice(&block.nonce);
            out.extend_from_slice(&block.body);
        }
        out.extend_from_slice(&self.tag);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 3 {
            return Err(Error::InvalidCiphertext);
        }
        let width_bits = u16::from_le_bytes(bytes[..2].try_into().expect("2 bytes")) as usize;
        let width = Width::from_bits(width_bits).ok_or(Error::InvalidCiphertext)?;
        let sign = match bytes[2] {
            0 => Sign::Unsigned,
            1 => Sign::Signed,
            _ => return Err(Error::InvalidCiphertext),
        };
        let expected_len = 3 + width.blocks() * 16 + 8;
        if bytes.len() != expected_len {
            return Err(Error::InvalidCiphertext);
        }
        let blocks = bytes[3..expected_len - 8]
            .chunks_exact(16)
            .map(|chunk| CtBlock {
                nonce: chunk[..8].try_into().expect("8 bytes"),
                body: chunk[8..].try_into().expect("8 bytes"),
            })
            .collect();
        let tag = bytes[expected_len - 8..].try_into().expect("8 bytes");
        Ok(Self {
            width,
            sign,
            blocks,
            tag,
        })
    }

    fn authenticated_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + self.blocks.len() * 16);
        out.extend_from_slice(&(self.width.bits() as u16).to_le_bytes());
        out.push(match self.sign {
            Sign::Unsigned => 0,
            Sign::Signed => 1,
        });
        for block in &self.blocks {
            out.extend_from_slice(&block.nonce);
            out.extend_from_slice(&block.body);
        }
        out
    }
}

fn aes_block(cipher: &Aes128, input: [u8; 16]) -> [u8; 16] {
    let mut block = input.into();
    cipher.encrypt_block(&mut block);
    block.into()
}

/// Per-block keystream pad: AES of (nonce, block index, domain)
fn block_pad(cipher: &Aes128, nonce: &[u8; 8], index: usize) -> [u8; 8] {
    let mut input = [0u8; 16];
    input[..8].copy_from_slice(nonce);
    input[8..12].copy_from_slice(&(index as u32).to_le_bytes());
    input[12] = DOMAIN_BLOCK;
    aes_block(cipher, input)[..8].try_into().expect("8 bytes")
}

/// CBC-MAC over fixed-format input, domain-separated and length-prefixed
fn mac(cipher: &Aes128, domain: u8, data: &[u8]) -> [u8; 8] {
    let mut state = [0u8; 16];
    state[0] = domain;
    state[1..9].copy_from_slice(&(data.len() as u64).to_le_bytes());
    state = aes_block(cipher, state);
    for chunk in data.chunks(16) {
        let mut input = [0u8; 16];
        input[..chunk.len()].copy_from_slice(chunk);
        for (byte, state_byte) in input.iter_mut().zip(state.iter()) {
            *byte ^= state_byte;
        }
        state = aes_block(cipher, input);
    }
    state[..8].try_into().expect("8 bytes")
}

/// Encrypt a plaintext under the given party key
pub fn encode(val: &Plain, key: &PartyKey, rng: &mut impl Rng) -> Ciphertext {
    let cipher = key.cipher();
    let blocks: Vec<CtBlock> = val.limbs()[..val.width().blocks()]
        .iter()
        .enumerate()
        .map(|(i, limb)| {
            let nonce: [u8; 8] = rng.random();
            let pad = block_pad(&cipher, &nonce, i);
            let mut body = limb.to_le_bytes();
            for (byte, pad_byte) in body.iter_mut().zip(pad.iter()) {
                *byte ^= pad_byte;
            }
            CtBlock { nonce, body }
        })
        .collect();
    let mut ct = Ciphertext {
        width: val.width(),
        sign: val.sign(),
        blocks,
        tag: [0; 8],
    };
    ct.tag = mac(&cipher, DOMAIN_TAG, &ct.authenticated_bytes());
    ct
}

/// Decrypt under the given party key; fails closed if the ciphertext was not
/// produced under that key or was tampered with
pub fn decode(ct: &Ciphertext, key: &PartyKey) -> Result<Plain> {
    let cipher = key.cipher();
    if mac(&cipher, DOMAIN_TAG, &ct.authenticated_bytes()) != ct.tag {
        return Err(Error::KeyMismatch);
    }
    let mut limbs = [0u64; 4];
    for (i, block) in ct.blocks.iter().enumerate() {
        let pad = block_pad(&cipher, &block.nonce, i);
        let mut body = block.body;
        for (byte, pad_byte) in body.iter_mut().zip(pad.iter()) {
            *byte ^= pad_byte;
        }
        limbs[i] = u64::from_le_bytes(body);
    }
    Ok(Plain::from_limbs(limbs, ct.width, ct.sign))
}

/// Bind a ciphertext to a call context, producing the ticket a caller
/// submits alongside a transaction
pub fn bind_ticket(ct: &Ciphertext, key: &PartyKey, binding: &CallBinding) -> InputTicket {
    InputTicket {
        ct: ct.clone(),
        binding: binding_tag(ct, key, binding),
    }
}

pub(crate) fn binding_tag(ct: &Ciphertext, key: &PartyKey, binding: &CallBinding) -> [u8; 8] {
    let mut data = ct.to_bytes();
    data.extend_from_slice(&binding.caller.0.to_le_bytes());
    data.extend_from_slice(&binding.selector);
    mac(&key.cipher(), DOMAIN_BINDING, &data)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn test_key() -> PartyKey {
        PartyKey::new(*b"0123456789abcdef")
    }

    #[test]
    fn test_round_trip_all_widths() {
        let key = test_key();
        let mut rng = ChaCha20Rng::from_seed(Default::default());
        for width in Width::ALL {
            for sign in Sign::ALL {
                let val = Plain::random(&mut rng, width, sign);
                let ct = encode(&val, &key, &mut rng);
                assert_eq!(ct.blocks.len(), width.blocks());
                assert_eq!(decode(&ct, &key).unwrap(), val);
            }
        }
    }

    #[test]
    fn test_block_decomposition_is_wire_contract() {
        let key = test_key();
        let mut rng = ChaCha20Rng::from_seed(Default::default());
        let ct = encode(
            &Plain::from_u128(42, Width::W256).with_sign(Sign::Unsigned),
            &key,
            &mut rng,
        );
        // four 64-bit blocks, serialized as width | sign | blocks | tag
        assert_eq!(ct.blocks.len(), 4);
        let bytes = ct.to_bytes();
        assert_eq!(bytes.len(), 3 + 4 * 16 + 8);
        assert_eq!(&bytes[..2], &256u16.to_le_bytes());
        assert_eq!(bytes[2], 0);

        let ct = encode(&Plain::from_u128(42, Width::W128), &key, &mut rng);
        assert_eq!(ct.blocks.len(), 2);
        assert_eq!(ct.to_bytes().len(), 3 + 2 * 16 + 8);
    }

    #[test]
    fn test_serialization_round_trip() {
        let key = test_key();
        let mut rng = ChaCha20Rng::from_seed(Default::default());
        let val = Plain::from_i128(-123456789, Width::W128);
        let ct = encode(&val, &key, &mut rng);
        let parsed = Ciphertext::from_bytes(&ct.to_bytes()).unwrap();
        assert_eq!(parsed, ct);
        assert_eq!(decode(&parsed, &key).unwrap(), val);
    }

    #[test]
    fn test_from_bytes_rejects_malformed() {
        assert_eq!(
            Ciphertext::from_bytes(&[]).unwrap_err(),
            Error::InvalidCiphertext
        );
        // unknown width
        assert_eq!(
            Ciphertext::from_bytes(&[7, 0, 0]).unwrap_err(),
            Error::InvalidCiphertext
        );
        // truncated body
        let mut bytes = vec![8, 0, 0];
        bytes.extend_from_slice(&[0; 5]);
        assert_eq!(
            Ciphertext::from_bytes(&bytes).unwrap_err(),
            Error::InvalidCiphertext
        );
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let mut rng = ChaCha20Rng::from_seed(Default::default());
        let val = Plain::from_u128(7, Width::W64);
        let ct = encode(&val, &test_key(), &mut rng);
        let other = PartyKey::new(*b"fedcba9876543210");
        assert_eq!(decode(&ct, &other).unwrap_err(), Error::KeyMismatch);
    }

    #[test]
    fn test_tampering_fails_closed() {
        let key = test_key();
        let mut rng = ChaCha20Rng::from_seed(Default::default());
        let mut ct = encode(&Plain::from_u128(7, Width::W64), &key, &mut rng);
        ct.blocks[0].body[0] ^= 1;
        assert_eq!(decode(&ct, &key).unwrap_err(), Error::KeyMismatch);
    }

    #[test]
    fn test_fresh_nonces_randomize_ciphertexts() {
        let key = test_key();
        let mut rng = ChaCha20Rng::from_seed(Default::default());
        let val = Plain::from_u128(7, Width::W64);
        let ct1 = encode(&val, &key, &mut rng);
        let ct2 = encode(&val, &key, &mut rng);
        assert_ne!(ct1, ct2);
        assert_eq!(decode(&ct1, &key).unwrap(), decode(&ct2, &key).unwrap());
    }

    #[test]
    fn test_binding_tag_depends_on_context() {
        let key = test_key();
        let mut rng = ChaCha20Rng::from_seed(Default::default());
        let ct = encode(&Plain::from_u128(7, Width::W64), &key, &mut rng);
        let binding = CallBinding {
            caller: PartyId(1),
            selector: [1, 2, 3, 4],
        };
        let ticket = bind_ticket(&ct, &key, &binding);
        assert_eq!(ticket.binding, binding_tag(&ct, &key, &binding));

        let other_caller = CallBinding {
            caller: PartyId(2),
            ..binding
        };
        assert_ne!(ticket.binding, binding_tag(&ct, &key, &other_caller));
        let other_selector = CallBinding {
            selector: [9, 9, 9, 9],
            ..binding
        };
        assert_ne!(ticket.binding, binding_tag(&ct, &key, &other_selector));
    }
}
