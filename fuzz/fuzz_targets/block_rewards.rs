#![no_main]

use libfuzzer_sys::fuzz_target;
use shroud_consensus::budget::{is_superblock, REWARD_PERIOD};
use shroud_consensus::block_rewards;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let height = u64::from_le_bytes([
        data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
    ]);
    let r = block_rewards(height);
    if !is_superblock(height) {
        assert!(r.is_zero());
    }
    if height % REWARD_PERIOD != 0 {
        assert!(r.is_zero());
    }
    assert!(r.total() >= r.block_reward);
});
