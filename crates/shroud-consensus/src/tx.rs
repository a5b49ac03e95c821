use std::collections::HashSet;

use tracing::debug;

use crate::blacklist::Blacklist;
use crate::commitment::{verify_commitment_balance, BlindingFactor, Commitment};
use crate::constants::{
    DO_FEE, MAX_DATA_OUTPUT_BYTES, MAX_MONEY, MAX_TX_INPUTS, MAX_TX_OUTPUTS, OUTPUT_CT, OUTPUT_DATA,
    OUTPUT_RINGCT, OUTPUT_STANDARD,
};
use crate::encode::tx_bytes;
use crate::error::{ConsensusError, ErrorCode};
use crate::hash::sha256d;
use crate::rangeproof::verify_range_proof;
use crate::zerocoin::{AnonymitySetBudget, BlockUndo, CoinSpend, Denomination, PublicCoin};

/// Script opcode that marks a standard output as a zerocoin mint.
pub const OP_ZEROCOINMINT: u8 = 0xc1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    pub txid: [u8; 32],
    pub n: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxOut {
    Standard {
        value: u64,
        script_pubkey: Vec<u8>,
    },
    Ct {
        commitment: Commitment,
        data: Vec<u8>,
        script_pubkey: Vec<u8>,
        range_proof: Vec<u8>,
    },
    RingCt {
        pubkey: [u8; 33],
        commitment: Commitment,
        data: Vec<u8>,
        range_proof: Vec<u8>,
    },
    Data {
        data: Vec<u8>,
    },
}

impl TxOut {
    pub fn output_type(&self) -> u8 {
        match self {
            TxOut::Standard { .. } => OUTPUT_STANDARD,
            TxOut::Ct { .. } => OUTPUT_CT,
            TxOut::RingCt { .. } => OUTPUT_RINGCT,
            TxOut::Data { .. } => OUTPUT_DATA,
        }
    }

    pub fn commitment(&self) -> Option<&Commitment> {
        match self {
            TxOut::Ct { commitment, .. } | TxOut::RingCt { commitment, .. } => Some(commitment),
            _ => None,
        }
    }

    pub fn range_proof(&self) -> Option<&[u8]> {
        match self {
            TxOut::Ct { range_proof, .. } | TxOut::RingCt { range_proof, .. } => Some(range_proof),
            _ => None,
        }
    }

    /// Fee declared by a data output, if this is one.
    pub fn ct_fee(&self) -> Option<u64> {
        match self {
            TxOut::Data { data } if data.first() == Some(&DO_FEE) => {
                let (fee, used) = get_varint(&data[1..])?;
                (used + 1 == data.len()).then_some(fee)
            }
            _ => None,
        }
    }

    /// The public coin minted by this output.
    pub fn zerocoin_mint(&self) -> Option<Result<PublicCoin, ConsensusError>> {
        let TxOut::Standard {
            value,
            script_pubkey,
        } = self
        else {
            return None;
        };
        if script_pubkey.first() != Some(&OP_ZEROCOINMINT) {
            return None;
        }
        Some(parse_mint(*value, &script_pubkey[1..]))
    }
}

fn parse_mint(value: u64, body: &[u8]) -> Result<PublicCoin, ConsensusError> {
    let denom = Denomination::from_amount(value).ok_or_else(|| {
        ConsensusError::new(ErrorCode::TxErrDenominationInvalid, "mint value is not a denomination")
    })?;
    let bytes: &[u8; 32] = body
        .try_into()
        .map_err(|_| ConsensusError::new(ErrorCode::TxErrParse, "mint script length"))?;
    PublicCoin::from_bytes(bytes, denom).ok_or_else(|| {
        ConsensusError::new(ErrorCode::TxErrCommitmentInvalid, "mint pubcoin encoding")
    })
}

pub fn mint_script(coin: &PublicCoin) -> Vec<u8> {
    let mut s = Vec::with_capacity(33);
    s.push(OP_ZEROCOINMINT);
    s.extend_from_slice(&coin.to_bytes());
    s
}

/// LEB128.
pub fn put_varint(mut v: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Decodes a LEB128 value, returning it with the number of bytes read.
pub fn get_varint(b: &[u8]) -> Option<(u64, usize)> {
    let mut v: u64 = 0;
    for (i, byte) in b.iter().enumerate().take(10) {
        let chunk = u64::from(byte & 0x7f);
        let shift = 7 * i as u32;
        if shift == 63 && chunk > 1 {
            return None;
        }
        v |= chunk << shift;
        if byte & 0x80 == 0 {
            return Some((v, i + 1));
        }
    }
    None
}

pub fn fee_output(fee: u64) -> TxOut {
    let mut data = vec![DO_FEE];
    put_varint(fee, &mut data);
    TxOut::Data { data }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxIn {
    Standard { prevout: OutPoint },
    Anon { key_images: Vec<[u8; 33]> },
    ZerocoinSpend(CoinSpend),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn txid(&self) -> [u8; 32] {
        sha256d(&tx_bytes(self, true))
    }

    /// Hash signed by zerocoin spends: the transaction with every spend
    /// reduced to its public fields.
    pub fn spend_message(&self) -> [u8; 32] {
        sha256d(&tx_bytes(self, false))
    }

    /// Declared fee; zero when no fee output exists.
    pub fn fee(&self) -> Option<u64> {
        let mut fees = self.outputs.iter().filter_map(TxOut::ct_fee);
        let fee = fees.next().unwrap_or(0);
        fees.next().is_none().then_some(fee)
    }
}

/// Values of the inputs the caller resolved from its UTXO view: the sum of
/// plain inputs, and one commitment per blinded input.
#[derive(Clone, Debug, Default)]
pub struct ResolvedInputs {
    pub plain_value: u64,
    pub commitments: Vec<Commitment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxSummary {
    pub txid: [u8; 32],
    pub fee: u64,
    pub spent_serials: Vec<[u8; 32]>,
    pub mints: Vec<PublicCoin>,
}

fn err(code: ErrorCode, msg: &'static str) -> ConsensusError {
    ConsensusError::new(code, msg)
}

/// Full confidential-amount check of `tx`. Nothing is recorded: the caller
/// applies the returned spends and mints once the tx is accepted.
pub fn check_private_transaction(
    tx: &Transaction,
    resolved: &ResolvedInputs,
    budget: &AnonymitySetBudget,
    blacklist: &Blacklist,
) -> Result<TxSummary, ConsensusError> {
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(err(ErrorCode::TxErrParse, "empty inputs or outputs"));
    }
    if tx.inputs.len() > MAX_TX_INPUTS || tx.outputs.len() > MAX_TX_OUTPUTS {
        return Err(err(ErrorCode::TxErrParse, "too many inputs or outputs"));
    }

    // ----- outputs -----
    let mut fee: Option<u64> = None;
    let mut public_out: u64 = 0;
    let mut out_commitments = Vec::new();
    let mut mints = Vec::new();
    for o in &tx.outputs {
        match o {
            TxOut::Standard { value, .. } => {
                if *value > MAX_MONEY {
                    return Err(err(ErrorCode::TxErrOutputValue, "output value too large"));
                }
                public_out = public_out
                    .checked_add(*value)
                    .filter(|v| *v <= MAX_MONEY)
                    .ok_or_else(|| err(ErrorCode::TxErrOutputValue, "output sum too large"))?;
                if let Some(mint) = o.zerocoin_mint() {
                    mints.push(mint?);
                }
            }
            TxOut::Ct {
                commitment,
                range_proof,
                ..
            }
            | TxOut::RingCt {
                commitment,
                range_proof,
                ..
            } => {
                if verify_range_proof(commitment, range_proof).is_none() {
                    return Err(err(ErrorCode::TxErrRangeProofInvalid, "range proof invalid"));
                }
                out_commitments.push(*commitment);
            }
            TxOut::Data { data } => {
                if data.len() > MAX_DATA_OUTPUT_BYTES {
                    return Err(err(ErrorCode::TxErrParse, "data output too large"));
                }
                if data.first() == Some(&DO_FEE) {
                    let declared = o
                        .ct_fee()
                        .ok_or_else(|| err(ErrorCode::TxErrFeeInvalid, "malformed fee output"))?;
                    if fee.is_some() {
                        return Err(err(ErrorCode::TxErrFeeInvalid, "duplicate fee output"));
                    }
                    if declared > MAX_MONEY {
                        return Err(err(ErrorCode::TxErrFeeInvalid, "fee too large"));
                    }
                    fee = Some(declared);
                }
            }
        }
    }
    let fee = fee.unwrap_or(0);

    // ----- inputs -----
    let message = tx.spend_message();
    let mut public_in = resolved.plain_value;
    let mut serials = HashSet::new();
    let mut key_images = HashSet::new();
    let mut spent_serials = Vec::new();
    for i in &tx.inputs {
        match i {
            TxIn::Standard { prevout } => {
                if blacklist.contains_outpoint(prevout).is_some() {
                    return Err(err(ErrorCode::TxErrBlacklisted, "input is blacklisted"));
                }
            }
            TxIn::Anon { key_images: images } => {
                if images.is_empty() {
                    return Err(err(ErrorCode::TxErrParse, "anon input without key images"));
                }
                for ki in images {
                    if !key_images.insert(*ki) {
                        return Err(err(ErrorCode::TxErrDoubleSpend, "duplicate key image"));
                    }
                }
            }
            TxIn::ZerocoinSpend(spend) => {
                let serial_hash = spend.serial_hash();
                if !serials.insert(serial_hash) {
                    return Err(err(ErrorCode::TxErrDoubleSpend, "serial spent twice in tx"));
                }
                budget.verify_spend(spend, &message, blacklist)?;
                public_in = public_in
                    .checked_add(spend.denom.amount())
                    .ok_or_else(|| err(ErrorCode::TxErrValueConservation, "input sum overflow"))?;
                spent_serials.push(serial_hash);
            }
        }
    }

    // ----- balance -----
    let zero = BlindingFactor::zero();
    let mut in_commitments = resolved.commitments.clone();
    in_commitments.push(Commitment::commit(public_in, &zero));
    out_commitments.push(Commitment::commit(public_out, &zero));
    if !verify_commitment_balance(&in_commitments, &out_commitments, fee) {
        debug!(public_in, public_out, fee, "commitment balance mismatch");
        return Err(err(ErrorCode::TxErrValueConservation, "inputs and outputs do not balance"));
    }

    Ok(TxSummary {
        txid: tx.txid(),
        fee,
        spent_serials,
        mints,
    })
}

/// Checks and applies the private transactions of the block at `height`
/// in order, each against the state left by the ones before it, then
/// closes the block. On failure the budget is left as it was.
pub fn connect_block_transactions(
    budget: &mut AnonymitySetBudget,
    height: u32,
    txs: &[(Transaction, ResolvedInputs)],
    blacklist: &Blacklist,
) -> Result<BlockUndo, ConsensusError> {
    let mut undo = BlockUndo::new(height);
    for (tx, resolved) in txs {
        let applied = check_private_transaction(tx, resolved, budget, blacklist)
            .and_then(|summary| budget.apply_transaction(&mut undo, &summary, blacklist));
        if let Err(e) = applied {
            budget.disconnect_block(&undo);
            return Err(e);
        }
    }
    budget.finish_block(&mut undo);
    Ok(undo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;
    use crate::rangeproof::{create_range_proof, select_range_proof_parameters};
    use crate::zerocoin::{seed_to_coin, zerocoin_seed, PrivateCoin, SpendType};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn varint_roundtrip_and_bounds() {
        for v in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            put_varint(v, &mut buf);
            assert_eq!(get_varint(&buf), Some((v, buf.len())));
        }
        assert_eq!(get_varint(&[]), None);
        assert_eq!(get_varint(&[0x80]), None);
        assert_eq!(get_varint(&[0xff; 10]), None);
        let mut over = vec![0xff; 9];
        over.push(0x02);
        assert_eq!(get_varint(&over), None);
    }

    #[test]
    fn fee_output_is_read_back() {
        let out = fee_output(12_345);
        assert_eq!(out.ct_fee(), Some(12_345));
        assert_eq!(TxOut::Data { data: vec![1, 2] }.ct_fee(), None);
        let mut trailing = fee_output(5);
        if let TxOut::Data { data } = &mut trailing {
            data.push(0);
        }
        assert_eq!(trailing.ct_fee(), None);
    }

    fn ct_output(value: u64, blind: &BlindingFactor, rng: &mut ChaCha20Rng) -> TxOut {
        let commitment = Commitment::commit(value, blind);
        let params = select_range_proof_parameters(value, rng);
        let range_proof = create_range_proof(&commitment, value, blind, &params, rng).unwrap();
        TxOut::Ct {
            commitment,
            data: Vec::new(),
            script_pubkey: vec![0x51],
            range_proof,
        }
    }

    fn plain_to_ct(rng: &mut ChaCha20Rng) -> (Transaction, ResolvedInputs) {
        // 10 coins in, 7 blinded + 2.9 plain out, 0.1 fee.
        let blind = BlindingFactor::zero();
        let tx = Transaction {
            version: 2,
            inputs: vec![TxIn::Standard {
                prevout: OutPoint {
                    txid: [4u8; 32],
                    n: 0,
                },
            }],
            outputs: vec![
                ct_output(7 * COIN, &blind, rng),
                TxOut::Standard {
                    value: 29 * COIN / 10,
                    script_pubkey: vec![0x51],
                },
                fee_output(COIN / 10),
            ],
            lock_time: 0,
        };
        let resolved = ResolvedInputs {
            plain_value: 10 * COIN,
            commitments: Vec::new(),
        };
        (tx, resolved)
    }

    #[test]
    fn balanced_ct_transaction() {
        let mut rng = ChaCha20Rng::seed_from_u64(41);
        let (tx, resolved) = plain_to_ct(&mut rng);
        let budget = AnonymitySetBudget::new();
        let summary =
            check_private_transaction(&tx, &resolved, &budget, &Blacklist::default()).unwrap();
        assert_eq!(summary.fee, COIN / 10);
        assert_eq!(summary.txid, tx.txid());
    }

    #[test]
    fn imbalance_and_bad_proof_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let (tx, mut resolved) = plain_to_ct(&mut rng);
        resolved.plain_value += 1;
        let budget = AnonymitySetBudget::new();
        let bl = Blacklist::default();
        assert_eq!(
            check_private_transaction(&tx, &resolved, &budget, &bl)
                .unwrap_err()
                .code,
            ErrorCode::TxErrValueConservation
        );

        let (mut tx, resolved) = plain_to_ct(&mut rng);
        if let TxOut::Ct { range_proof, .. } = &mut tx.outputs[0] {
            range_proof.truncate(10);
        }
        assert_eq!(
            check_private_transaction(&tx, &resolved, &budget, &bl)
                .unwrap_err()
                .code,
            ErrorCode::TxErrRangeProofInvalid
        );

        let (mut tx, resolved) = plain_to_ct(&mut rng);
        tx.outputs.push(fee_output(0));
        assert_eq!(
            check_private_transaction(&tx, &resolved, &budget, &bl)
                .unwrap_err()
                .code,
            ErrorCode::TxErrFeeInvalid
        );
    }

    #[test]
    fn blacklisted_input_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(43);
        let (tx, resolved) = plain_to_ct(&mut rng);
        let mut bl = Blacklist::default();
        bl.add_outpoint(
            OutPoint {
                txid: [4u8; 32],
                n: 0,
            },
            crate::blacklist::OutPointKind::Basecoin,
        );
        assert_eq!(
            check_private_transaction(&tx, &resolved, &AnonymitySetBudget::new(), &bl)
                .unwrap_err()
                .code,
            ErrorCode::TxErrBlacklisted
        );
    }

    fn zc(i: u32) -> PrivateCoin {
        seed_to_coin(&zerocoin_seed(b"tx", i), Denomination::Ten)
    }

    #[test]
    fn zerocoin_spend_to_mint() {
        let mut rng = ChaCha20Rng::seed_from_u64(44);
        let bl = Blacklist::default();
        let mut budget = AnonymitySetBudget::new();
        for i in 0..3 {
            budget.add_mint(zc(i).public_coin(), &bl).unwrap();
        }
        let cp = budget
            .accumulators_mut()
            .set_mut(Denomination::Ten)
            .checkpoint();
        let ring = budget.ring_for(Denomination::Ten, &cp, &bl).unwrap();

        let new_coin = zc(100).public_coin();
        let mut tx = Transaction {
            version: 2,
            inputs: Vec::new(),
            outputs: vec![TxOut::Standard {
                value: 10 * COIN,
                script_pubkey: mint_script(&new_coin),
            }],
            lock_time: 0,
        };
        // The spend signs the tx with its own public fields in place.
        let placeholder = CoinSpend {
            version: crate::zerocoin::spend::COIN_SPEND_VERSION,
            denom: Denomination::Ten,
            serial: zc(1).serial_bytes(),
            accumulator_checkpoint: cp,
            spend_type: SpendType::Spend,
            ring_challenge: [0u8; 32],
            responses: Vec::new(),
        };
        tx.inputs.push(TxIn::ZerocoinSpend(placeholder));
        let message = tx.spend_message();
        let spend =
            CoinSpend::create(&zc(1), &ring, cp, &message, SpendType::Spend, &mut rng).unwrap();
        tx.inputs[0] = TxIn::ZerocoinSpend(spend.clone());
        assert_eq!(tx.spend_message(), message);

        let summary =
            check_private_transaction(&tx, &ResolvedInputs::default(), &budget, &bl).unwrap();
        assert_eq!(summary.spent_serials, vec![spend.serial_hash()]);
        assert_eq!(summary.mints, vec![new_coin]);

        // Same serial twice in one tx.
        let mut doubled = tx.clone();
        doubled.inputs.push(TxIn::ZerocoinSpend(spend));
        assert_eq!(
            check_private_transaction(&doubled, &ResolvedInputs::default(), &budget, &bl)
                .unwrap_err()
                .code,
            ErrorCode::TxErrDoubleSpend
        );
    }

    #[test]
    fn mint_value_must_be_a_denomination() {
        let coin = zc(5).public_coin();
        let out = TxOut::Standard {
            value: 11 * COIN,
            script_pubkey: mint_script(&coin),
        };
        assert_eq!(
            out.zerocoin_mint().unwrap().unwrap_err().code,
            ErrorCode::TxErrDenominationInvalid
        );
        assert!(TxOut::Data { data: vec![] }.zerocoin_mint().is_none());
    }

    fn spend_tx(
        budget: &AnonymitySetBudget,
        cp: [u8; 32],
        spent: u32,
        minted: u32,
        rng: &mut ChaCha20Rng,
    ) -> Transaction {
        let bl = Blacklist::default();
        let ring = budget.ring_for(Denomination::Ten, &cp, &bl).unwrap();
        let mut tx = Transaction {
            version: 2,
            inputs: vec![TxIn::ZerocoinSpend(CoinSpend {
                version: crate::zerocoin::spend::COIN_SPEND_VERSION,
                denom: Denomination::Ten,
                serial: zc(spent).serial_bytes(),
                accumulator_checkpoint: cp,
                spend_type: SpendType::Spend,
                ring_challenge: [0u8; 32],
                responses: Vec::new(),
            })],
            outputs: vec![TxOut::Standard {
                value: 10 * COIN,
                script_pubkey: mint_script(&zc(minted).public_coin()),
            }],
            lock_time: 0,
        };
        let message = tx.spend_message();
        let spend =
            CoinSpend::create(&zc(spent), &ring, cp, &message, SpendType::Spend, rng).unwrap();
        tx.inputs[0] = TxIn::ZerocoinSpend(spend);
        tx
    }

    #[test]
    fn block_transactions_apply_in_order() {
        let mut rng = ChaCha20Rng::seed_from_u64(45);
        let bl = Blacklist::default();
        let mut budget = AnonymitySetBudget::new();
        for i in 0..3 {
            budget.add_mint(zc(i).public_coin(), &bl).unwrap();
        }
        let cp = budget
            .accumulators_mut()
            .set_mut(Denomination::Ten)
            .checkpoint();
        let first = spend_tx(&budget, cp, 1, 100, &mut rng);
        let second = spend_tx(&budget, cp, 1, 101, &mut rng);
        let none = ResolvedInputs::default();
        let serial = crate::zerocoin::serial_hash(&zc(1).serial_bytes());

        // Both spend the same serial; the second sees the first applied.
        let err = connect_block_transactions(
            &mut budget,
            20,
            &[(first.clone(), none.clone()), (second, none.clone())],
            &bl,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::TxErrDoubleSpend);
        assert!(!budget.is_serial_spent(&serial));
        assert!(!budget.has_mint(&zc(100).public_coin()));
        assert_eq!(budget.accumulators().set(Denomination::Ten).len(), 3);

        let undo = connect_block_transactions(&mut budget, 20, &[(first, none)], &bl).unwrap();
        assert_eq!(undo.spent_serials, vec![serial]);
        assert_eq!(undo.mints, vec![zc(100).public_coin()]);
        let set = budget.accumulators().set(Denomination::Ten);
        assert_eq!(set.latest_checkpoint().map(|(_, n)| n), Some(4));
        assert_eq!(budget.spent_serial(&serial).unwrap().height, 20);

        budget.disconnect_block(&undo);
        assert!(!budget.is_serial_spent(&serial));
        let set = budget.accumulators().set(Denomination::Ten);
        assert_eq!(set.len(), 3);
        assert_eq!(set.latest_checkpoint(), Some((cp, 3)));
    }
}
