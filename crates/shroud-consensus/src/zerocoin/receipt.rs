use super::spend::CoinSpend;

/// Outcome codes reported back to the spending wallet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpendStatus {
    Okay,
    Prepared,
    #[default]
    Error,
    InsufficientFunds,
    TooManyInputs,
    InvalidCoin,
    AccumulatorFailed,
    ProofFailed,
    Blacklisted,
}

impl SpendStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, SpendStatus::Okay | SpendStatus::Prepared)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SpendReceipt {
    status: SpendStatus,
    message: String,
    needed_spends: u32,
    spends: Vec<CoinSpend>,
}

impl SpendReceipt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_spend(&mut self, spend: CoinSpend) {
        self.spends.push(spend);
    }

    pub fn set_status(
        &mut self,
        message: impl Into<String>,
        status: SpendStatus,
        needed_spends: u32,
    ) {
        self.message = message.into();
        self.status = status;
        self.needed_spends = needed_spends;
    }

    pub fn status(&self) -> SpendStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn needed_spends(&self) -> u32 {
        self.needed_spends
    }

    pub fn spends(&self) -> &[CoinSpend] {
        &self.spends
    }
}
