use core::fmt;

use crate::constants::COIN;

/// Zerocoin denominations, smallest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Denomination {
    Ten,
    OneHundred,
    OneThousand,
    TenThousand,
}

pub const DENOMINATIONS: [Denomination; 4] = [
    Denomination::Ten,
    Denomination::OneHundred,
    Denomination::OneThousand,
    Denomination::TenThousand,
];

impl Denomination {
    /// Face value in whole coins.
    pub fn to_int(self) -> u32 {
        match self {
            Denomination::Ten => 10,
            Denomination::OneHundred => 100,
            Denomination::OneThousand => 1_000,
            Denomination::TenThousand => 10_000,
        }
    }

    /// Face value in base units.
    pub fn amount(self) -> u64 {
        u64::from(self.to_int()) * COIN
    }

    pub fn from_int(v: u64) -> Option<Self> {
        DENOMINATIONS.into_iter().find(|d| u64::from(d.to_int()) == v)
    }

    pub fn from_amount(amount: u64) -> Option<Self> {
        DENOMINATIONS.into_iter().find(|d| d.amount() == amount)
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_int())
    }
}

/// Largest denomination that fits in `amount`, with the remainder. `None`
/// when `amount` is below the smallest denomination.
pub fn closest_denomination(amount: u64) -> Option<(Denomination, u64)> {
    DENOMINATIONS
        .into_iter()
        .rev()
        .find(|d| d.amount() <= amount)
        .map(|d| (d, amount - d.amount()))
}
