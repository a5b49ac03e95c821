use core::fmt;

use ff::{FromUniformBytes, PrimeField};
use group::GroupEncoding;
use pasta_curves::pallas;

use crate::commitment::{generators, point_from_bytes};
use crate::hash::{sha256d_parts, sha512_parts};

use super::denomination::Denomination;

/// Secret half of a coin. The serial is revealed when the coin is spent;
/// the randomness never is.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateCoin {
    pub serial: pallas::Scalar,
    pub randomness: pallas::Scalar,
    pub denom: Denomination,
}

impl fmt::Debug for PrivateCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateCoin")
            .field("denom", &self.denom)
            .finish_non_exhaustive()
    }
}

impl PrivateCoin {
    pub fn public_coin(&self) -> PublicCoin {
        let gens = generators();
        PublicCoin {
            point: gens.g * self.serial + gens.h * self.randomness,
            denom: self.denom,
        }
    }

    pub fn serial_bytes(&self) -> [u8; 32] {
        self.serial.to_repr()
    }
}

/// `serial*G + randomness*H`, published by the mint.
#[derive(Clone, Copy)]
pub struct PublicCoin {
    pub point: pallas::Point,
    pub denom: Denomination,
}

impl PartialEq for PublicCoin {
    fn eq(&self, other: &Self) -> bool {
        self.denom == other.denom && self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicCoin {}

impl fmt::Debug for PublicCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicCoin({}, {})", self.denom, hex::encode(self.to_bytes()))
    }
}

impl PublicCoin {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.point.to_bytes()
    }

    pub fn from_bytes(b: &[u8; 32], denom: Denomination) -> Option<Self> {
        point_from_bytes(b).map(|point| Self { point, denom })
    }
}

pub fn pubcoin_hash(coin: &PublicCoin) -> [u8; 32] {
    sha256d_parts(&[b"pubcoin", &coin.to_bytes()])
}

pub fn serial_hash(serial: &[u8; 32]) -> [u8; 32] {
    sha256d_parts(&[b"serial", serial])
}

/// Identity of a coin used as a stake input. Derived from the serial so it
/// stays private until the stake reveals it.
pub fn stake_hash(serial: &[u8; 32]) -> [u8; 32] {
    sha256d_parts(&[b"stake", serial])
}

/// Seed for the `count`-th deterministic mint of a wallet.
pub fn zerocoin_seed(master_seed: &[u8], count: u32) -> [u8; 64] {
    sha512_parts(&[master_seed, &count.to_le_bytes()])
}

pub fn seed_to_coin(seed: &[u8; 64], denom: Denomination) -> PrivateCoin {
    let serial = pallas::Scalar::from_uniform_bytes(&sha512_parts(&[b"serial", seed]));
    let randomness = pallas::Scalar::from_uniform_bytes(&sha512_parts(&[b"randomness", seed]));
    PrivateCoin {
        serial,
        randomness,
        denom,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_coins() {
        let seed = zerocoin_seed(b"master", 7);
        let a = seed_to_coin(&seed, Denomination::Ten);
        let b = seed_to_coin(&seed, Denomination::Ten);
        assert_eq!(a, b);
        assert_eq!(a.public_coin(), b.public_coin());

        let other = seed_to_coin(&zerocoin_seed(b"master", 8), Denomination::Ten);
        assert_ne!(a.serial_bytes(), other.serial_bytes());
        assert_ne!(pubcoin_hash(&a.public_coin()), pubcoin_hash(&other.public_coin()));
    }

    #[test]
    fn hashes_are_domain_separated() {
        let s = [9u8; 32];
        assert_ne!(serial_hash(&s), stake_hash(&s));
    }

    #[test]
    fn public_coin_roundtrip() {
        let coin = seed_to_coin(&zerocoin_seed(b"m", 0), Denomination::OneHundred).public_coin();
        let back = PublicCoin::from_bytes(&coin.to_bytes(), Denomination::OneHundred).unwrap();
        assert_eq!(back, coin);
    }
}
