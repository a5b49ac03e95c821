#![no_main]

use libfuzzer_sys::fuzz_target;
use shroud_consensus::range_proof_info;

fuzz_target!(|data: &[u8]| {
    let Some(info) = range_proof_info(data) else {
        return;
    };
    assert!(info.min_value <= info.max_value);
    if info.exponent < 0 {
        assert_eq!(info.min_value, info.max_value);
    }
    assert_eq!(range_proof_info(data), Some(info));
});
