//! Range proofs for committed amounts.
//!
//! Proof layout:
//!
//! ```text
//! byte 0      flags: 0x80 reserved (must be 0), 0x40 ranged, 0x20 has min,
//!             low 5 bits = decimal exponent (ranged proofs only, <= 18)
//! byte 1      mantissa bits - 1 (ranged proofs only)
//! [8 bytes]   minimum value, big-endian (when 0x20 is set)
//! body        ranged: mantissa * 160-byte bit proofs
//!             exact:  64-byte Schnorr proof that C - min*G = r*H
//! ```
//!
//! A ranged proof shows `value = min + m * 10^exp` with `0 <= m < 2^bits`.
//! Each bit proof is a bit commitment `C_i` plus a two-branch OR proof that
//! `C_i` opens to either 0 or `10^exp * 2^i`.

use ff::{Field, PrimeField};
use group::{Group, GroupEncoding};
use pasta_curves::pallas;
use rand::{Rng, RngCore};

use crate::commitment::{
    generators, hash_to_scalar, point_from_bytes, scalar_from_bytes, scalar_from_u64,
    BlindingFactor, Commitment,
};
use crate::error::{ConsensusError, ErrorCode};

pub const MAX_EXPONENT: i32 = 18;
pub const MAX_MANTISSA_BITS: u32 = 64;
pub const MIN_MANTISSA_BITS: u32 = 32;
pub const BIT_PROOF_BYTES: usize = 160;
pub const EXACT_PROOF_BYTES: usize = 64;

const FLAG_RESERVED: u8 = 0x80;
const FLAG_RANGED: u8 = 0x40;
const FLAG_HAS_MIN: u8 = 0x20;
const EXPONENT_MASK: u8 = 0x1f;

const BIT_DOMAIN: &[u8] = b"shroud/rangeproof/bit";
const EXACT_DOMAIN: &[u8] = b"shroud/rangeproof/exact";

/// Proving parameters chosen for one output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeProofParams {
    pub min_value: u64,
    /// Decimal exponent, or -1 for an exact-value proof.
    pub exponent: i32,
    pub bits: u32,
}

/// Public range stated by a proof header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeProofInfo {
    /// -1 for exact-value proofs.
    pub exponent: i32,
    pub mantissa: u32,
    pub min_value: u64,
    pub max_value: u64,
}

fn pow10(exp: u32) -> Option<u64> {
    10u64.checked_pow(exp)
}

fn round_up_4(bits: u32) -> u32 {
    bits.div_ceil(4) * 4
}

fn mantissa_max(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn trailing_decimal_zeros(mut v: u64) -> u32 {
    let mut n = 0;
    while v != 0 && v % 10 == 0 {
        v /= 10;
        n += 1;
    }
    n
}

/// Picks the exponent and mantissa width for proving `value`.
///
/// The exponent is randomized between half and all of the value's decimal
/// trailing zeros so that round amounts do not reveal their scale exactly.
/// Zero amounts get a random exponent and, one time in ten, extra bits.
pub fn select_range_proof_parameters<R: Rng + ?Sized>(value: u64, rng: &mut R) -> RangeProofParams {
    if value == 0 {
        let exponent = rng.gen_range(0..5);
        let mut bits = MIN_MANTISSA_BITS;
        if rng.gen_range(0..10) == 0 {
            bits += rng.gen_range(0..5);
        }
        return RangeProofParams {
            min_value: 0,
            exponent,
            bits: round_up_4(bits),
        };
    }

    let zeros = trailing_decimal_zeros(value);
    let e_min = zeros / 2;
    let mut exponent = if zeros > e_min {
        e_min + rng.gen_range(0..zeros - e_min)
    } else {
        e_min
    };

    loop {
        // exponent < zeros, so the division is exact.
        let scale = pow10(exponent).unwrap_or(1);
        let mantissa = value / scale;
        let needed = 64 - mantissa.leading_zeros();
        let bits = round_up_4(needed.max(MIN_MANTISSA_BITS)).min(MAX_MANTISSA_BITS);
        if exponent == 0 || mantissa_max(bits).checked_mul(scale).is_some() {
            return RangeProofParams {
                min_value: 0,
                exponent: exponent as i32,
                bits,
            };
        }
        exponent -= 1;
    }
}

struct Header {
    info: RangeProofInfo,
    body_offset: usize,
}

fn parse_header(proof: &[u8]) -> Option<Header> {
    let flags = *proof.first()?;
    if flags & FLAG_RESERVED != 0 {
        return None;
    }
    let mut off = 1;
    let ranged = flags & FLAG_RANGED != 0;
    let (exponent, mantissa) = if ranged {
        let exp = i32::from(flags & EXPONENT_MASK);
        if exp > MAX_EXPONENT {
            return None;
        }
        let mantissa = u32::from(*proof.get(1)?) + 1;
        if mantissa > MAX_MANTISSA_BITS {
            return None;
        }
        off = 2;
        (exp, mantissa)
    } else {
        if flags & EXPONENT_MASK != 0 {
            return None;
        }
        (-1, 0)
    };

    let min_value = if flags & FLAG_HAS_MIN != 0 {
        let b = proof.get(off..off + 8)?;
        off += 8;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        u64::from_be_bytes(buf)
    } else {
        0
    };

    let max_value = if ranged {
        let scale = pow10(exponent as u32)?;
        mantissa_max(mantissa)
            .checked_mul(scale)?
            .checked_add(min_value)?
    } else {
        min_value
    };

    let body = if ranged {
        mantissa as usize * BIT_PROOF_BYTES
    } else {
        EXACT_PROOF_BYTES
    };
    if proof.len() != off + body {
        return None;
    }

    Some(Header {
        info: RangeProofInfo {
            exponent,
            mantissa,
            min_value,
            max_value,
        },
        body_offset: off,
    })
}

/// Decodes the public range of `proof` without verifying it. Any
/// inconsistency between header and length yields `None`.
pub fn range_proof_info(proof: &[u8]) -> Option<RangeProofInfo> {
    parse_header(proof).map(|h| h.info)
}

fn encode_header(params: &RangeProofParams, out: &mut Vec<u8>) {
    let has_min = params.min_value != 0 || params.exponent < 0;
    let mut flags = if has_min { FLAG_HAS_MIN } else { 0 };
    if params.exponent >= 0 {
        flags |= FLAG_RANGED | params.exponent as u8;
        out.push(flags);
        out.push((params.bits - 1) as u8);
    } else {
        out.push(flags);
    }
    if has_min {
        out.extend_from_slice(&params.min_value.to_be_bytes());
    }
}

fn invalid(msg: &'static str) -> ConsensusError {
    ConsensusError::new(ErrorCode::TxErrRangeProofInvalid, msg)
}

fn read_scalar(b: &[u8]) -> Option<pallas::Scalar> {
    let mut buf = [0u8; 32];
    buf.copy_from_slice(b);
    scalar_from_bytes(&buf)
}

fn read_point(b: &[u8]) -> Option<pallas::Point> {
    let mut buf = [0u8; 32];
    buf.copy_from_slice(b);
    point_from_bytes(&buf)
}

fn bit_challenge(
    commitment: &[u8; 32],
    header: &[u8],
    index: u32,
    c_i: &pallas::Point,
    r0: &pallas::Point,
    r1: &pallas::Point,
) -> pallas::Scalar {
    hash_to_scalar(
        BIT_DOMAIN,
        &[
            commitment,
            header,
            &index.to_le_bytes(),
            &c_i.to_bytes(),
            &r0.to_bytes(),
            &r1.to_bytes(),
        ],
    )
}

fn exact_challenge(commitment: &[u8; 32], header: &[u8], r: &pallas::Point) -> pallas::Scalar {
    hash_to_scalar(EXACT_DOMAIN, &[commitment, header, &r.to_bytes()])
}

/// Proves that `commitment = value*G + blind*H` lies in the range described
/// by `params`.
pub fn create_range_proof<R: RngCore>(
    commitment: &Commitment,
    value: u64,
    blind: &BlindingFactor,
    params: &RangeProofParams,
    rng: &mut R,
) -> Result<Vec<u8>, ConsensusError> {
    if Commitment::commit(value, blind) != *commitment {
        return Err(ConsensusError::new(
            ErrorCode::TxErrCommitmentInvalid,
            "commitment does not open to value",
        ));
    }
    if value < params.min_value {
        return Err(invalid("value below proof minimum"));
    }
    let scale = if params.exponent < 0 {
        if value != params.min_value {
            return Err(invalid("exact proof must state the value"));
        }
        0
    } else {
        if params.exponent > MAX_EXPONENT {
            return Err(invalid("exponent too large"));
        }
        if params.bits == 0 || params.bits > MAX_MANTISSA_BITS {
            return Err(invalid("mantissa width out of range"));
        }
        let scale = pow10(params.exponent as u32).ok_or_else(|| invalid("exponent too large"))?;
        mantissa_max(params.bits)
            .checked_mul(scale)
            .and_then(|m| m.checked_add(params.min_value))
            .ok_or_else(|| invalid("proof range overflows"))?;
        scale
    };

    let gens = generators();
    let c_bytes = commitment.to_bytes();
    let mut out = Vec::new();
    encode_header(params, &mut out);
    let header = out.clone();

    if params.exponent < 0 {
        let k = pallas::Scalar::random(&mut *rng);
        let r = gens.h * k;
        let c = exact_challenge(&c_bytes, &header, &r);
        let s = k + c * blind.scalar();
        out.extend_from_slice(&c.to_repr());
        out.extend_from_slice(&s.to_repr());
        return Ok(out);
    }

    let rel = value - params.min_value;
    if rel % scale != 0 {
        return Err(invalid("value not a multiple of the exponent scale"));
    }
    let mantissa = rel / scale;
    if mantissa > mantissa_max(params.bits) {
        return Err(invalid("value exceeds mantissa width"));
    }

    let bits = params.bits as usize;
    let mut blinds = Vec::with_capacity(bits);
    let mut acc = pallas::Scalar::ZERO;
    for _ in 0..bits - 1 {
        let r = pallas::Scalar::random(&mut *rng);
        acc += r;
        blinds.push(r);
    }
    blinds.push(blind.scalar() - acc);

    let scale_scalar = scalar_from_u64(scale);
    let mut pow2 = pallas::Scalar::ONE;
    for (i, r_i) in blinds.iter().enumerate() {
        let unit = gens.g * (scale_scalar * pow2);
        let bit = (mantissa >> i) & 1 == 1;
        let c_i = if bit { unit + gens.h * r_i } else { gens.h * r_i };
        let p = [c_i, c_i - unit];
        let real = usize::from(bit);
        let fake = 1 - real;

        let k = pallas::Scalar::random(&mut *rng);
        let c_fake = pallas::Scalar::random(&mut *rng);
        let s_fake = pallas::Scalar::random(&mut *rng);
        let mut r_pts = [pallas::Point::generator(); 2];
        r_pts[real] = gens.h * k;
        r_pts[fake] = gens.h * s_fake - p[fake] * c_fake;

        let c = bit_challenge(&c_bytes, &header, i as u32, &c_i, &r_pts[0], &r_pts[1]);
        let c_real = c - c_fake;
        let s_real = k + c_real * r_i;

        let mut cs = [pallas::Scalar::ZERO; 2];
        let mut ss = [pallas::Scalar::ZERO; 2];
        cs[real] = c_real;
        cs[fake] = c_fake;
        ss[real] = s_real;
        ss[fake] = s_fake;

        out.extend_from_slice(&c_i.to_bytes());
        out.extend_from_slice(&cs[0].to_repr());
        out.extend_from_slice(&cs[1].to_repr());
        out.extend_from_slice(&ss[0].to_repr());
        out.extend_from_slice(&ss[1].to_repr());

        pow2 = pow2.double();
    }
    Ok(out)
}

/// Verifies `proof` against `commitment` and returns the proven range.
pub fn verify_range_proof(commitment: &Commitment, proof: &[u8]) -> Option<RangeProofInfo> {
    let header = parse_header(proof)?;
    let info = header.info;
    let head = &proof[..header.body_offset];
    let body = &proof[header.body_offset..];
    let gens = generators();
    let c_bytes = commitment.to_bytes();
    let target = commitment.point() - gens.g * scalar_from_u64(info.min_value);

    if info.exponent < 0 {
        let c = read_scalar(&body[..32])?;
        let s = read_scalar(&body[32..64])?;
        let r = gens.h * s - target * c;
        return (exact_challenge(&c_bytes, head, &r) == c).then_some(info);
    }

    let scale_scalar = scalar_from_u64(pow10(info.exponent as u32)?);
    let mut pow2 = pallas::Scalar::ONE;
    let mut sum = pallas::Point::identity();
    for (i, chunk) in body.chunks_exact(BIT_PROOF_BYTES).enumerate() {
        let c_i = read_point(&chunk[0..32])?;
        let c0 = read_scalar(&chunk[32..64])?;
        let c1 = read_scalar(&chunk[64..96])?;
        let s0 = read_scalar(&chunk[96..128])?;
        let s1 = read_scalar(&chunk[128..160])?;

        let unit = gens.g * (scale_scalar * pow2);
        let r0 = gens.h * s0 - c_i * c0;
        let r1 = gens.h * s1 - (c_i - unit) * c1;
        if bit_challenge(&c_bytes, head, i as u32, &c_i, &r0, &r1) != c0 + c1 {
            return None;
        }
        sum += c_i;
        pow2 = pow2.double();
    }

    (sum == target).then_some(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rng(seed: u64) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(seed)
    }

    fn covers(p: &RangeProofParams, value: u64) -> bool {
        let span = (1u128 << p.bits) * 10u128.pow(p.exponent as u32);
        u128::from(p.min_value) + span > u128::from(value)
    }

    #[test]
    fn parameters_cover_value() {
        let mut r = rng(1);
        let values = [
            0u64,
            1,
            9,
            10,
            1_000,
            123_456_789,
            100_000_000,
            5_000_000_000,
            u64::MAX,
            10_000_000_000_000_000_000,
            18_446_744_073_709_551_610,
        ];
        for v in values {
            for _ in 0..20 {
                let p = select_range_proof_parameters(v, &mut r);
                assert_eq!(p.bits % 4, 0, "value {v}");
                assert!(p.bits >= MIN_MANTISSA_BITS && p.bits <= MAX_MANTISSA_BITS);
                assert!(covers(&p, v), "value {v} params {p:?}");
            }
        }
    }

    #[test]
    fn zero_amount_obfuscation() {
        let mut r = rng(2);
        let mut saw_extra = false;
        for _ in 0..400 {
            let p = select_range_proof_parameters(0, &mut r);
            assert!((0..5).contains(&p.exponent));
            assert!(p.bits == 32 || p.bits == 36);
            saw_extra |= p.bits == 36;
        }
        assert!(saw_extra);
    }

    #[test]
    fn exponent_respects_trailing_zeros() {
        let mut r = rng(3);
        for _ in 0..50 {
            let p = select_range_proof_parameters(1_200_000, &mut r);
            assert!((2..5).contains(&p.exponent), "{p:?}");
        }
        let p = select_range_proof_parameters(123, &mut r);
        assert_eq!(p.exponent, 0);
        assert_eq!(p.bits, 32);
    }

    #[test]
    fn info_decodes_header() {
        // exponent 3, mantissa 32 bits, min 0
        let mut proof = vec![0x40 | 3, 31];
        proof.resize(2 + 32 * BIT_PROOF_BYTES, 0);
        let info = range_proof_info(&proof).unwrap();
        assert_eq!(info.exponent, 3);
        assert_eq!(info.mantissa, 32);
        assert_eq!(info.min_value, 0);
        assert_eq!(info.max_value, 4_294_967_295 * 1000);

        // with min
        let mut with_min = vec![0x40 | 0x20, 3];
        with_min.extend_from_slice(&500u64.to_be_bytes());
        with_min.resize(10 + 4 * BIT_PROOF_BYTES, 0);
        let info = range_proof_info(&with_min).unwrap();
        assert_eq!((info.min_value, info.max_value), (500, 515));

        // exact
        let mut exact = vec![0x20];
        exact.extend_from_slice(&77u64.to_be_bytes());
        exact.resize(9 + EXACT_PROOF_BYTES, 0);
        let info = range_proof_info(&exact).unwrap();
        assert_eq!(info.exponent, -1);
        assert_eq!((info.min_value, info.max_value), (77, 77));
    }

    #[test]
    fn info_rejects_malformed() {
        assert!(range_proof_info(&[]).is_none());
        // reserved bit
        let mut p = vec![0xc0, 31];
        p.resize(2 + 32 * BIT_PROOF_BYTES, 0);
        assert!(range_proof_info(&p).is_none());
        // exponent 19
        let mut p = vec![0x40 | 19, 31];
        p.resize(2 + 32 * BIT_PROOF_BYTES, 0);
        assert!(range_proof_info(&p).is_none());
        // mantissa 65
        let p = vec![0x40, 64];
        assert!(range_proof_info(&p).is_none());
        // max overflows: 64-bit mantissa with exponent 1
        let mut p = vec![0x40 | 1, 63];
        p.resize(2 + 64 * BIT_PROOF_BYTES, 0);
        assert!(range_proof_info(&p).is_none());
        // min + max overflows
        let mut p = vec![0x40 | 0x20, 63];
        p.extend_from_slice(&1u64.to_be_bytes());
        p.resize(10 + 64 * BIT_PROOF_BYTES, 0);
        assert!(range_proof_info(&p).is_none());
        // truncated body
        let mut p = vec![0x40, 31];
        p.resize(2 + 32 * BIT_PROOF_BYTES - 1, 0);
        assert!(range_proof_info(&p).is_none());
        // has-min flag without the min bytes
        assert!(range_proof_info(&[0x60, 0]).is_none());
    }

    #[test]
    fn ranged_proof_verifies() {
        let mut r = rng(4);
        let value = 2_500_000u64;
        let blind = BlindingFactor::random(&mut r);
        let c = Commitment::commit(value, &blind);
        let params = select_range_proof_parameters(value, &mut r);
        let proof = create_range_proof(&c, value, &blind, &params, &mut r).unwrap();
        let info = verify_range_proof(&c, &proof).unwrap();
        assert_eq!(info, range_proof_info(&proof).unwrap());
        assert!(info.min_value <= value && value <= info.max_value);

        let other = Commitment::commit(value + 1, &blind);
        assert!(verify_range_proof(&other, &proof).is_none());
    }

    #[test]
    fn tampered_proof_fails() {
        let mut r = rng(5);
        let blind = BlindingFactor::random(&mut r);
        let c = Commitment::commit(42, &blind);
        let params = RangeProofParams {
            min_value: 0,
            exponent: 0,
            bits: 32,
        };
        let mut proof = create_range_proof(&c, 42, &blind, &params, &mut r).unwrap();
        let last = proof.len() - 1;
        proof[last] ^= 1;
        assert!(verify_range_proof(&c, &proof).is_none());
    }

    #[test]
    fn exact_and_min_proofs() {
        let mut r = rng(6);
        let blind = BlindingFactor::random(&mut r);
        let c = Commitment::commit(1_000, &blind);

        let exact = RangeProofParams {
            min_value: 1_000,
            exponent: -1,
            bits: 0,
        };
        let proof = create_range_proof(&c, 1_000, &blind, &exact, &mut r).unwrap();
        assert_eq!(proof.len(), 9 + EXACT_PROOF_BYTES);
        let info = verify_range_proof(&c, &proof).unwrap();
        assert_eq!((info.min_value, info.max_value), (1_000, 1_000));

        let with_min = RangeProofParams {
            min_value: 900,
            exponent: 1,
            bits: 4,
        };
        let proof = create_range_proof(&c, 1_000, &blind, &with_min, &mut r).unwrap();
        let info = verify_range_proof(&c, &proof).unwrap();
        assert_eq!((info.min_value, info.max_value), (900, 1_050));
    }

    #[test]
    fn out_of_range_value_cannot_be_proven() {
        let mut r = rng(7);
        let blind = BlindingFactor::random(&mut r);
        let c = Commitment::commit(1 << 20, &blind);
        let narrow = RangeProofParams {
            min_value: 0,
            exponent: 0,
            bits: 8,
        };
        let err = create_range_proof(&c, 1 << 20, &blind, &narrow, &mut r).unwrap_err();
        assert_eq!(err.code, ErrorCode::TxErrRangeProofInvalid);

        let wrong_opening = create_range_proof(&c, 5, &blind, &narrow, &mut r).unwrap_err();
        assert_eq!(wrong_opening.code, ErrorCode::TxErrCommitmentInvalid);
    }

    #[test]
    fn identity_bits_do_not_verify() {
        let mut r = rng(8);
        let blind = BlindingFactor::random(&mut r);
        let c = Commitment::commit(3, &blind);
        let params = RangeProofParams {
            min_value: 0,
            exponent: 0,
            bits: 4,
        };
        let mut proof = create_range_proof(&c, 3, &blind, &params, &mut r).unwrap();
        proof[2..34].copy_from_slice(&pallas::Point::identity().to_bytes());
        assert!(verify_range_proof(&c, &proof).is_none());
    }

    #[test]
    fn malformed_params_are_rejected() {
        let mut r = rng(9);
        let blind = BlindingFactor::random(&mut r);
        let c = Commitment::commit(5, &blind);
        let bad = [
            RangeProofParams {
                min_value: 0,
                exponent: 0,
                bits: 0,
            },
            RangeProofParams {
                min_value: 0,
                exponent: 40,
                bits: 32,
            },
            RangeProofParams {
                min_value: 0,
                exponent: 0,
                bits: 65,
            },
            RangeProofParams {
                min_value: 1,
                exponent: 18,
                bits: 64,
            },
        ];
        for params in bad {
            let err = create_range_proof(&c, 5, &blind, &params, &mut r).unwrap_err();
            assert_eq!(err.code, ErrorCode::TxErrRangeProofInvalid, "{params:?}");
        }
    }
}
