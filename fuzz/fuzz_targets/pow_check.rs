#![no_main]

use libfuzzer_sys::fuzz_target;
use num_bigint::BigUint;
use shroud_consensus::pow::{check_proof_of_work, decode_compact, target_from_bits};

// 32-byte hash + 4-byte bits + 32-byte limit.
fuzz_target!(|data: &[u8]| {
    if data.len() < 68 {
        return;
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&data[..32]);
    let bits = u32::from_le_bytes([data[32], data[33], data[34], data[35]]);
    let limit = BigUint::from_bytes_le(&data[36..68]);

    let decoded = decode_compact(bits);
    match target_from_bits(bits, &limit) {
        Ok(target) => {
            assert!(!decoded.negative && !decoded.overflow);
            assert!(target <= limit);
            let ok = check_proof_of_work(&hash, bits, &limit).is_ok();
            assert_eq!(ok, BigUint::from_bytes_le(&hash) <= target);
        }
        Err(_) => assert!(check_proof_of_work(&hash, bits, &limit).is_err()),
    }
});
