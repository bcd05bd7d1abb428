#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ringtap_core::{OwnedRegion, PacketHeader, Ring, RingLayout, TPACKET_ALIGNMENT, TpacketVersion};

#[derive(Debug, Arbitrary)]
struct Input {
    version: u8,
    slot_size: u16,
    slot_count: u8,
    ring: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let version = match input.version % 3 {
        0 => TpacketVersion::V1,
        1 => TpacketVersion::V2,
        _ => TpacketVersion::V3,
    };
    let slot_size = usize::from(input.slot_size) & !(TPACKET_ALIGNMENT - 1);
    let layout = RingLayout::new(slot_size, usize::from(input.slot_count));

    let mut owned = OwnedRegion::from_bytes(&input.ring);
    let Ok(mut ring) = Ring::new(owned.region(), version, layout) else {
        return;
    };

    // Each ready slot is released, so one pass over the ring terminates.
    for _ in 0..layout.slot_count {
        let Some(mut header) = ring.next_ready() else {
            break;
        };
        ring.stats().observe(&header);
        while header.advance() {
            ring.stats().observe(&header);
        }
        ring.release(header);
    }
});
