#![no_main]

use libfuzzer_sys::fuzz_target;
use ringtap_core::{CaptureOptions, OwnedRegion, PacketHeader, RingHeader, TpacketVersion};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let version = match data[0] % 3 {
        0 => TpacketVersion::V1,
        1 => TpacketVersion::V2,
        _ => TpacketVersion::V3,
    };
    let opts = CaptureOptions::new(version).with_vlan_header(data[0] & 0x80 != 0);

    let mut owned = OwnedRegion::from_bytes(&data[1..]);
    let region = owned.region();
    let Ok(slot) = region.slot(0, region.len()) else {
        return;
    };

    // Decoding arbitrary bytes must never panic or read past the slot.
    if let Ok(mut header) = RingHeader::new(version, slot) {
        let mut packets = 0usize;
        loop {
            let _ = header.capture_info(&opts);
            let _ = header.payload(&opts);
            packets += 1;
            if !header.advance() {
                break;
            }
        }
        assert!(packets <= data.len());
        header.release();
    }
});
