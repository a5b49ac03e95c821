#![no_main]

use libfuzzer_sys::fuzz_target;
use shroud_consensus::pow::decode_compact;
use shroud_consensus::{
    dark_gravity_wave, BlockIndexEntry, BlockLane, ConsensusParams, MemoryChain, Network,
    PowAlgorithm,
};

const LANES: [BlockLane; 4] = [
    BlockLane::Stake,
    BlockLane::Work(PowAlgorithm::KeyedMemoryHard),
    BlockLane::Work(PowAlgorithm::EpochDataset),
    BlockLane::Work(PowAlgorithm::Sha256d),
];

// Each 9-byte record is one block: time delta, bits and lane selector.
fuzz_target!(|data: &[u8]| {
    let params = ConsensusParams::for_network(Network::Main);
    let mut chain = MemoryChain::new();
    let mut time = 1_000_000u32;
    for (height, rec) in data.chunks_exact(9).take(400).enumerate() {
        let delta = u32::from_le_bytes([rec[0], rec[1], rec[2], rec[3]]);
        time = time.wrapping_add(delta % 10_000);
        let bits = u32::from_le_bytes([rec[4], rec[5], rec[6], rec[7]]);
        let lane = LANES[usize::from(rec[8]) % LANES.len()];
        chain.push(BlockIndexEntry {
            height: height as u64,
            hash: [rec[8]; 32],
            prev_hash: [0u8; 32],
            time,
            bits,
            lane,
        });
    }
    let tip = chain.tip().cloned();
    for lane in LANES {
        let a = dark_gravity_wave(tip.as_ref(), &chain, &params, lane);
        let b = dark_gravity_wave(tip.as_ref(), &chain, &params, lane);
        assert_eq!(a, b, "retarget is not deterministic");
        let c = decode_compact(a);
        assert!(!c.negative && !c.overflow);
        assert!(&c.target <= params.pow_limit_for(lane));
    }
});
