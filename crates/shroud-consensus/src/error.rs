use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    TxErrParse,
    TxErrValueConservation,
    TxErrRangeProofInvalid,
    TxErrFeeInvalid,
    TxErrOutputValue,
    TxErrBlacklisted,
    TxErrDenominationInvalid,
    TxErrMintDuplicate,
    TxErrAccumulatorUnknown,
    TxErrSpendProofInvalid,
    TxErrDoubleSpend,
    TxErrCommitmentInvalid,

    BlockErrParse,
    BlockErrAlgorithmInvalid,
    BlockErrPowInvalid,
    BlockErrTargetInvalid,
    BlockErrBadDiffBits,
    BlockErrMixHashInvalid,
    BlockErrKeyBlockMissing,
    BlockErrDatasetUnavailable,
    BlockErrStakeInvalid,
    BlockErrLinkageInvalid,
    BlockErrTimestampOld,
    BlockErrTimestampFuture,
    BlockErrBudgetAmount,
    BlockErrBudgetOutput,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::TxErrParse => "TX_ERR_PARSE",
            ErrorCode::TxErrValueConservation => "TX_ERR_VALUE_CONSERVATION",
            ErrorCode::TxErrRangeProofInvalid => "TX_ERR_RANGE_PROOF_INVALID",
            ErrorCode::TxErrFeeInvalid => "TX_ERR_FEE_INVALID",
            ErrorCode::TxErrOutputValue => "TX_ERR_OUTPUT_VALUE",
            ErrorCode::TxErrBlacklisted => "TX_ERR_BLACKLISTED",
            ErrorCode::TxErrDenominationInvalid => "TX_ERR_DENOMINATION_INVALID",
            ErrorCode::TxErrMintDuplicate => "TX_ERR_MINT_DUPLICATE",
            ErrorCode::TxErrAccumulatorUnknown => "TX_ERR_ACCUMULATOR_UNKNOWN",
            ErrorCode::TxErrSpendProofInvalid => "TX_ERR_SPEND_PROOF_INVALID",
            ErrorCode::TxErrDoubleSpend => "TX_ERR_DOUBLE_SPEND",
            ErrorCode::TxErrCommitmentInvalid => "TX_ERR_COMMITMENT_INVALID",

            ErrorCode::BlockErrParse => "BLOCK_ERR_PARSE",
            ErrorCode::BlockErrAlgorithmInvalid => "BLOCK_ERR_ALGORITHM_INVALID",
            ErrorCode::BlockErrPowInvalid => "BLOCK_ERR_POW_INVALID",
            ErrorCode::BlockErrTargetInvalid => "BLOCK_ERR_TARGET_INVALID",
            ErrorCode::BlockErrBadDiffBits => "BLOCK_ERR_BAD_DIFF_BITS",
            ErrorCode::BlockErrMixHashInvalid => "BLOCK_ERR_MIX_HASH_INVALID",
            ErrorCode::BlockErrKeyBlockMissing => "BLOCK_ERR_KEY_BLOCK_MISSING",
            ErrorCode::BlockErrDatasetUnavailable => "BLOCK_ERR_DATASET_UNAVAILABLE",
            ErrorCode::BlockErrStakeInvalid => "BLOCK_ERR_STAKE_INVALID",
            ErrorCode::BlockErrLinkageInvalid => "BLOCK_ERR_LINKAGE_INVALID",
            ErrorCode::BlockErrTimestampOld => "BLOCK_ERR_TIMESTAMP_OLD",
            ErrorCode::BlockErrTimestampFuture => "BLOCK_ERR_TIMESTAMP_FUTURE",
            ErrorCode::BlockErrBudgetAmount => "BLOCK_ERR_BUDGET_AMOUNT",
            ErrorCode::BlockErrBudgetOutput => "BLOCK_ERR_BUDGET_OUTPUT",
        }
    }

    pub fn is_block_error(self) -> bool {
        self.as_str().starts_with("BLOCK_")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsensusError {
    pub code: ErrorCode,
    pub msg: &'static str,
}

impl ConsensusError {
    pub fn new(code: ErrorCode, msg: &'static str) -> Self {
        Self { code, msg }
    }
}

impl From<ErrorCode> for ConsensusError {
    fn from(code: ErrorCode) -> Self {
        Self { code, msg: "" }
    }
}

impl fmt::Display for ConsensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.msg.is_empty() {
            write!(f, "{}", self.code.as_str())
        } else {
            write!(f, "{}: {}", self.code.as_str(), self.msg)
        }
    }
}

impl std::error::Error for ConsensusError {}
