//! Pedersen commitments `v*G + r*H` over the Pallas curve.
//!
//! `G` is the group generator and `H` a hash-to-curve point with no known
//! discrete log relative to `G`. Amounts commit additively, so a transaction
//! balances when inputs minus outputs minus the fee is the identity.

use core::fmt;
use std::sync::OnceLock;

use ff::{Field, FromUniformBytes, PrimeField};
use group::{Group, GroupEncoding};
use pasta_curves::arithmetic::CurveExt;
use pasta_curves::pallas;
use rand::RngCore;

use crate::hash::sha512_parts;

const GENERATOR_DOMAIN: &str = "shroud:pedersen";

pub struct Generators {
    pub g: pallas::Point,
    pub h: pallas::Point,
}

pub fn generators() -> &'static Generators {
    static GENS: OnceLock<Generators> = OnceLock::new();
    GENS.get_or_init(|| Generators {
        g: pallas::Point::generator(),
        h: pallas::Point::hash_to_curve(GENERATOR_DOMAIN)(b"blinding"),
    })
}

pub fn scalar_from_u64(v: u64) -> pallas::Scalar {
    pallas::Scalar::from(v)
}

/// Uniform scalar from a domain-separated SHA-512 over `parts`.
pub fn hash_to_scalar(domain: &[u8], parts: &[&[u8]]) -> pallas::Scalar {
    let mut all: Vec<&[u8]> = Vec::with_capacity(parts.len() + 1);
    all.push(domain);
    all.extend_from_slice(parts);
    pallas::Scalar::from_uniform_bytes(&sha512_parts(&all))
}

pub fn scalar_from_bytes(b: &[u8; 32]) -> Option<pallas::Scalar> {
    Option::from(pallas::Scalar::from_repr(*b))
}

pub fn point_from_bytes(b: &[u8; 32]) -> Option<pallas::Point> {
    Option::from(pallas::Point::from_bytes(b))
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BlindingFactor(pallas::Scalar);

impl fmt::Debug for BlindingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlindingFactor(..)")
    }
}

impl BlindingFactor {
    pub fn random<R: RngCore>(rng: &mut R) -> Self {
        Self(pallas::Scalar::random(rng))
    }

    pub fn zero() -> Self {
        Self(pallas::Scalar::ZERO)
    }

    pub fn from_bytes(b: &[u8; 32]) -> Option<Self> {
        scalar_from_bytes(b).map(Self)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_repr()
    }

    pub fn scalar(&self) -> pallas::Scalar {
        self.0
    }
}

/// Sum of `positive` minus sum of `negative`.
pub fn blind_sum(positive: &[BlindingFactor], negative: &[BlindingFactor]) -> BlindingFactor {
    let pos = positive.iter().fold(pallas::Scalar::ZERO, |acc, b| acc + b.0);
    let neg = negative.iter().fold(pallas::Scalar::ZERO, |acc, b| acc + b.0);
    BlindingFactor(pos - neg)
}

#[derive(Clone, Copy)]
pub struct Commitment(pallas::Point);

impl PartialEq for Commitment {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for Commitment {}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", hex::encode(self.to_bytes()))
    }
}

impl Commitment {
    pub fn commit(value: u64, blind: &BlindingFactor) -> Self {
        let gens = generators();
        Self(gens.g * scalar_from_u64(value) + gens.h * blind.0)
    }

    pub fn point(&self) -> pallas::Point {
        self.0
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn from_bytes(b: &[u8; 32]) -> Option<Self> {
        point_from_bytes(b).map(Self)
    }
}

/// `sum(inputs) - sum(outputs) - fee*G == identity`.
pub fn verify_commitment_balance(inputs: &[Commitment], outputs: &[Commitment], fee: u64) -> bool {
    let sum_in = inputs
        .iter()
        .fold(pallas::Point::identity(), |acc, c| acc + c.0);
    let sum_out = outputs
        .iter()
        .fold(pallas::Point::identity(), |acc, c| acc + c.0);
    let fee_point = generators().g * scalar_from_u64(fee);
    bool::from((sum_in - sum_out - fee_point).is_identity())
}
