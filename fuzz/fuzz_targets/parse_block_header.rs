#![no_main]

use libfuzzer_sys::fuzz_target;
use shroud_consensus::encode::block_header_wire_bytes;
use shroud_consensus::parse_block_header_bytes;

fuzz_target!(|data: &[u8]| {
    let Ok(h) = parse_block_header_bytes(data) else {
        return;
    };
    let re = block_header_wire_bytes(&h);
    let again = parse_block_header_bytes(&re).expect("re-encoded header parses");
    assert_eq!(again, h);
    assert_eq!(again.hash(), h.hash());
});
