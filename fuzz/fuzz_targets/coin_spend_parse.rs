#![no_main]

use libfuzzer_sys::fuzz_target;
use shroud_consensus::zerocoin::CoinSpend;

fuzz_target!(|data: &[u8]| {
    let Ok(spend) = CoinSpend::from_bytes(data) else {
        return;
    };
    assert_eq!(spend.to_bytes(), data);
    // Proofs that only parse must never verify against an empty ring.
    assert!(!spend.verify(&[], &[0u8; 32]));
});
