use crate::block::{BlockHeader, DATASET_POW_BLOCK, KEYED_POW_BLOCK};
use crate::compactsize::{encode_compact_size, encode_var_bytes};
use crate::tx::{Transaction, TxIn, TxOut};

fn header_prefix(h: &BlockHeader, out: &mut Vec<u8>) {
    out.extend_from_slice(&h.version.to_le_bytes());
    out.extend_from_slice(&h.prev_block_hash);
    out.extend_from_slice(&h.merkle_root);
    out.extend_from_slice(&h.witness_merkle_root);
    out.extend_from_slice(&h.time.to_le_bytes());
    out.extend_from_slice(&h.bits.to_le_bytes());
}

/// Block hash input. The proof-of-stake flag is not covered.
pub fn block_header_hash_input(h: &BlockHeader) -> Vec<u8> {
    let mut out = Vec::with_capacity(156);
    header_prefix(h, &mut out);
    if h.version & DATASET_POW_BLOCK != 0 {
        out.extend_from_slice(&h.height.to_le_bytes());
        out.extend_from_slice(&h.nonce64.to_le_bytes());
        out.extend_from_slice(&h.mix_hash);
    } else if h.version & KEYED_POW_BLOCK != 0 {
        out.extend_from_slice(&h.height.to_le_bytes());
        out.extend_from_slice(&h.nonce.to_le_bytes());
    } else {
        out.extend_from_slice(&h.nonce.to_le_bytes());
    }
    out
}

pub fn block_header_wire_bytes(h: &BlockHeader) -> Vec<u8> {
    let mut out = block_header_hash_input(h);
    out.push(u8::from(h.proof_of_stake));
    out
}

/// Input to the epoch-dataset header hash: nonce64 and mix_hash are excluded
/// because they are outputs of the search.
pub fn dataset_header_input(h: &BlockHeader) -> Vec<u8> {
    let mut out = Vec::with_capacity(116);
    header_prefix(h, &mut out);
    out.extend_from_slice(&h.height.to_le_bytes());
    out
}

pub fn keyed_seal_input(h: &BlockHeader) -> Vec<u8> {
    let mut out = Vec::with_capacity(120);
    header_prefix(h, &mut out);
    out.extend_from_slice(&h.nonce.to_le_bytes());
    out.extend_from_slice(&h.height.to_le_bytes());
    out
}

pub fn tx_out_bytes(o: &TxOut, out: &mut Vec<u8>) {
    out.push(o.output_type());
    match o {
        TxOut::Standard {
            value,
            script_pubkey,
        } => {
            out.extend_from_slice(&value.to_le_bytes());
            encode_var_bytes(script_pubkey, out);
        }
        TxOut::Ct {
            commitment,
            data,
            script_pubkey,
            range_proof,
        } => {
            out.extend_from_slice(&commitment.to_bytes());
            encode_var_bytes(data, out);
            encode_var_bytes(script_pubkey, out);
            encode_var_bytes(range_proof, out);
        }
        TxOut::RingCt {
            pubkey,
            commitment,
            data,
            range_proof,
        } => {
            out.extend_from_slice(pubkey);
            out.extend_from_slice(&commitment.to_bytes());
            encode_var_bytes(data, out);
            encode_var_bytes(range_proof, out);
        }
        TxOut::Data { data } => encode_var_bytes(data, out),
    }
}

fn tx_in_bytes(i: &TxIn, with_spend_proofs: bool, out: &mut Vec<u8>) {
    match i {
        TxIn::Standard { prevout } => {
            out.push(0);
            out.extend_from_slice(&prevout.txid);
            out.extend_from_slice(&prevout.n.to_le_bytes());
        }
        TxIn::Anon { key_images } => {
            out.push(1);
            encode_compact_size(key_images.len() as u64, out);
            for ki in key_images {
                out.extend_from_slice(ki);
            }
        }
        TxIn::ZerocoinSpend(spend) => {
            out.push(2);
            if with_spend_proofs {
                encode_var_bytes(&spend.to_bytes(), out);
            } else {
                out.extend_from_slice(&spend.serial);
                out.extend_from_slice(&spend.denom.to_int().to_le_bytes());
                out.extend_from_slice(&spend.accumulator_checkpoint);
                out.push(spend.spend_type as u8);
            }
        }
    }
}

/// Serializes `tx`. With `with_spend_proofs == false` each zerocoin spend
/// contributes only its public fields, which is what the spend proof signs.
pub fn tx_bytes(tx: &Transaction, with_spend_proofs: bool) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&tx.version.to_le_bytes());
    encode_compact_size(tx.inputs.len() as u64, &mut out);
    for i in &tx.inputs {
        tx_in_bytes(i, with_spend_proofs, &mut out);
    }
    encode_compact_size(tx.outputs.len() as u64, &mut out);
    for o in &tx.outputs {
        tx_out_bytes(o, &mut out);
    }
    out.extend_from_slice(&tx.lock_time.to_le_bytes());
    out
}
