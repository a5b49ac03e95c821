//! Zerocoin spends.
//!
//! A spend reveals the coin serial `s` and proves, without saying which,
//! that one member `C_j` of the anonymity set opens to `s*G + r*H`. With
//! `P_j = C_j - s*G` this is a ring signature over `{P_j}` with generator
//! `H`, signer key `r`. The ring challenge chain binds the spend message
//! (the transaction hash without spend proofs) and the public spend fields.

use ff::{Field, PrimeField};
use group::GroupEncoding;
use pasta_curves::pallas;
use rand::RngCore;

use crate::commitment::{generators, hash_to_scalar, scalar_from_bytes};
use crate::compactsize::{encode_compact_size, read_compact_size};
use crate::error::{ConsensusError, ErrorCode};
use crate::wire_read::Reader;

use super::coin::{serial_hash, PrivateCoin, PublicCoin};
use super::denomination::Denomination;

pub const COIN_SPEND_VERSION: u8 = 1;
const RING_DOMAIN: &[u8] = b"shroud/coinspend";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SpendType {
    Spend = 0,
    Stake = 1,
}

impl SpendType {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(SpendType::Spend),
            1 => Some(SpendType::Stake),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoinSpend {
    pub version: u8,
    pub denom: Denomination,
    pub serial: [u8; 32],
    pub accumulator_checkpoint: [u8; 32],
    pub spend_type: SpendType,
    pub ring_challenge: [u8; 32],
    pub responses: Vec<[u8; 32]>,
}

fn parse_err(msg: &'static str) -> ConsensusError {
    ConsensusError::new(ErrorCode::TxErrParse, msg)
}

fn proof_err(msg: &'static str) -> ConsensusError {
    ConsensusError::new(ErrorCode::TxErrSpendProofInvalid, msg)
}

impl CoinSpend {
    pub fn serial_hash(&self) -> [u8; 32] {
        serial_hash(&self.serial)
    }

    pub fn ring_size(&self) -> usize {
        self.responses.len()
    }

    fn challenge(&self, message: &[u8; 32], r: &pallas::Point) -> pallas::Scalar {
        hash_to_scalar(
            RING_DOMAIN,
            &[
                message,
                &[self.version],
                &self.denom.to_int().to_le_bytes(),
                &self.serial,
                &self.accumulator_checkpoint,
                &[self.spend_type as u8],
                &r.to_bytes(),
            ],
        )
    }

    fn ring_keys(&self, serial: pallas::Scalar, members: &[PublicCoin]) -> Vec<pallas::Point> {
        let s_g = generators().g * serial;
        members.iter().map(|m| m.point - s_g).collect()
    }

    /// Builds a spend of `coin` whose ring is `members` (the set snapshot
    /// named by `checkpoint`). The coin must be a member.
    pub fn create<R: RngCore>(
        coin: &PrivateCoin,
        members: &[PublicCoin],
        checkpoint: [u8; 32],
        message: &[u8; 32],
        spend_type: SpendType,
        rng: &mut R,
    ) -> Result<Self, ConsensusError> {
        let public = coin.public_coin();
        let pi = members
            .iter()
            .position(|m| *m == public)
            .ok_or_else(|| proof_err("coin not in anonymity set"))?;
        if members.iter().any(|m| m.denom != coin.denom) {
            return Err(ConsensusError::new(
                ErrorCode::TxErrDenominationInvalid,
                "ring mixes denominations",
            ));
        }

        let mut spend = CoinSpend {
            version: COIN_SPEND_VERSION,
            denom: coin.denom,
            serial: coin.serial_bytes(),
            accumulator_checkpoint: checkpoint,
            spend_type,
            ring_challenge: [0u8; 32],
            responses: vec![[0u8; 32]; members.len()],
        };

        let h = generators().h;
        let keys = spend.ring_keys(coin.serial, members);
        let n = members.len();
        let mut responses = vec![pallas::Scalar::ZERO; n];

        let alpha = pallas::Scalar::random(&mut *rng);
        let mut e = spend.challenge(message, &(h * alpha));
        let mut j = (pi + 1) % n;
        let mut e0 = if j == 0 { Some(e) } else { None };
        while j != pi {
            let s = pallas::Scalar::random(&mut *rng);
            responses[j] = s;
            e = spend.challenge(message, &(h * s + keys[j] * e));
            j = (j + 1) % n;
            if j == 0 {
                e0 = Some(e);
            }
        }
        // e is now the challenge for the signer's slot.
        responses[pi] = alpha - e * coin.randomness;

        spend.ring_challenge = e0.unwrap_or(e).to_repr();
        spend.responses = responses.iter().map(|s| s.to_repr()).collect();
        Ok(spend)
    }

    /// Checks the ring proof against `members`. The caller is responsible
    /// for resolving `members` from the checkpoint.
    pub fn verify(&self, members: &[PublicCoin], message: &[u8; 32]) -> bool {
        if self.version != COIN_SPEND_VERSION
            || members.is_empty()
            || members.len() != self.responses.len()
            || members.iter().any(|m| m.denom != self.denom)
        {
            return false;
        }
        let Some(serial) = scalar_from_bytes(&self.serial) else {
            return false;
        };
        let Some(e0) = scalar_from_bytes(&self.ring_challenge) else {
            return false;
        };
        let h = generators().h;
        let keys = self.ring_keys(serial, members);
        let mut e = e0;
        for (key, resp) in keys.iter().zip(&self.responses) {
            let Some(s) = scalar_from_bytes(resp) else {
                return false;
            };
            e = self.challenge(message, &(h * s + key * e));
        }
        e == e0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(111 + self.responses.len() * 32);
        out.push(self.version);
        out.extend_from_slice(&self.denom.to_int().to_le_bytes());
        out.extend_from_slice(&self.serial);
        out.extend_from_slice(&self.accumulator_checkpoint);
        out.push(self.spend_type as u8);
        out.extend_from_slice(&self.ring_challenge);
        encode_compact_size(self.responses.len() as u64, &mut out);
        for r in &self.responses {
            out.extend_from_slice(r);
        }
        out
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self, ConsensusError> {
        let mut r = Reader::new(b);
        let version = r.read_u8()?;
        let denom = Denomination::from_int(u64::from(r.read_u32_le()?))
            .ok_or_else(|| {
                ConsensusError::new(ErrorCode::TxErrDenominationInvalid, "bad denomination")
            })?;
        let serial = r.read_array32()?;
        let accumulator_checkpoint = r.read_array32()?;
        let spend_type =
            SpendType::from_u8(r.read_u8()?).ok_or_else(|| parse_err("bad spend type"))?;
        let ring_challenge = r.read_array32()?;
        let count = read_compact_size(&mut r)?;
        if count > (r.remaining() / 32) as u64 {
            return Err(parse_err("ring size exceeds payload"));
        }
        let mut responses = Vec::with_capacity(count as usize);
        for _ in 0..count {
            responses.push(r.read_array32()?);
        }
        r.finish()?;
        Ok(Self {
            version,
            denom,
            serial,
            accumulator_checkpoint,
            spend_type,
            ring_challenge,
            responses,
        })
    }
}
