//! Integration tests for TPACKET_V1/V2 frame header views.

use std::borrow::Cow;
use std::time::{Duration, SystemTime};

use ringtap_core::{
    CaptureOptions, FrameV1, FrameV2, OwnedRegion, PacketHeader, RingError, RingHeader, TpStatus,
    TpacketVersion, slot_status,
};
use ringtap_integration_tests::{MAC, payload, v1_header, v2_header, write_v1, write_v2};

const SLOT: usize = 2048;

#[test]
fn test_v1_frame_accessors() {
    let data = payload(128, 3);
    let mut owned = OwnedRegion::zeroed(SLOT);
    write_v1(owned.as_bytes_mut(), v1_header(128, 128, 1_600_000_000, 42), &data, 5);

    let region = owned.region();
    let frame = FrameV1::new(region.slot(0, SLOT).unwrap()).unwrap();

    assert_eq!(frame.raw_payload(), &data[..]);
    assert_eq!(frame.wire_len(), 128);
    assert!(!frame.is_truncated());
    assert_eq!(frame.interface_index(), 5);
    assert_eq!(frame.vlan_id(), None);
    assert_eq!(
        frame.timestamp(),
        SystemTime::UNIX_EPOCH + Duration::new(1_600_000_000, 42_000)
    );
}

#[test]
fn test_v2_frame_accessors() {
    let data = payload(60, 0);
    let mut owned = OwnedRegion::zeroed(SLOT);
    write_v2(
        owned.as_bytes_mut(),
        v2_header(60, 1514, TpStatus::USER, 0),
        &data,
        9,
    );

    let region = owned.region();
    let frame = FrameV2::new(region.slot(0, SLOT).unwrap()).unwrap();

    assert_eq!(frame.raw_payload(), &data[..]);
    assert_eq!(frame.snap_len(), 60);
    assert_eq!(frame.wire_len(), 1514);
    assert!(frame.is_truncated());
    assert_eq!(frame.interface_index(), 9);
    assert_eq!(
        frame.timestamp(),
        SystemTime::UNIX_EPOCH + Duration::new(1_700_000_000, 250)
    );
}

#[test]
fn test_single_frame_advance_is_false() {
    let data = payload(20, 0);
    let mut owned = OwnedRegion::zeroed(SLOT * 2);
    let (a, b) = owned.as_bytes_mut().split_at_mut(SLOT);
    write_v1(a, v1_header(20, 20, 1, 1), &data, 1);
    write_v2(b, v2_header(20, 20, TpStatus::USER, 0), &data, 1);

    let region = owned.region();
    let mut v1 = FrameV1::new(region.slot(0, SLOT).unwrap()).unwrap();
    let mut v2 = FrameV2::new(region.slot(SLOT, SLOT).unwrap()).unwrap();
    for _ in 0..3 {
        assert!(!v1.advance());
        assert!(!v2.advance());
    }
}

#[test]
fn test_release_hands_slot_to_kernel() {
    let data = payload(20, 0);
    let mut owned = OwnedRegion::zeroed(SLOT);
    write_v2(
        owned.as_bytes_mut(),
        v2_header(20, 20, TpStatus::USER | TpStatus::VLAN_VALID, 5),
        &data,
        1,
    );

    let region = owned.region();
    let slot = region.slot(0, SLOT).unwrap();
    let header = RingHeader::new(TpacketVersion::V2, slot).unwrap();
    assert!(header.status().is_user_owned());
    header.release();

    assert_eq!(slot_status(TpacketVersion::V2, &slot).unwrap(), TpStatus::empty());
}

#[test]
fn test_v2_vlan_id_rules() {
    let data = payload(64, 0);
    let cases = [
        (TpStatus::USER, 0x0123, None),
        (TpStatus::USER | TpStatus::VLAN_VALID, 0x0123, Some(0x0123)),
        (TpStatus::USER | TpStatus::VLAN_VALID, 0xF00A, Some(0x000A)),
        (TpStatus::USER | TpStatus::VLAN_VALID, 0, Some(0)),
    ];

    for (status, tci, expected) in cases {
        let mut owned = OwnedRegion::zeroed(SLOT);
        write_v2(owned.as_bytes_mut(), v2_header(64, 64, status, tci), &data, 1);
        let region = owned.region();
        let frame = FrameV2::new(region.slot(0, SLOT).unwrap()).unwrap();
        assert_eq!(frame.vlan_id(), expected, "status={status:#x} tci={tci:#x}");
    }
}

#[test]
fn test_v2_payload_vlan_synthesis() {
    let data = payload(64, 0x10);
    let mut owned = OwnedRegion::zeroed(SLOT);
    write_v2(
        owned.as_bytes_mut(),
        v2_header(64, 64, TpStatus::USER | TpStatus::VLAN_VALID, 0xE064),
        &data,
        1,
    );
    let region = owned.region();
    let frame = FrameV2::new(region.slot(0, SLOT).unwrap()).unwrap();

    let plain = frame.payload(&CaptureOptions::new(TpacketVersion::V2));
    assert!(matches!(plain, Cow::Borrowed(_)));

    let opts = CaptureOptions::new(TpacketVersion::V2).with_vlan_header(true);
    let tagged = frame.payload(&opts);
    assert_eq!(tagged.len(), 68);
    assert_eq!(&tagged[..12], &data[..12]);
    assert_eq!(hex::encode(&tagged[12..16]), "8100e064");
    assert_eq!(&tagged[16..], &data[12..]);

    let info = frame.capture_info(&opts);
    assert_eq!(info.capture_len, 68);
    assert_eq!(info.wire_len, 68);
    assert_eq!(info.vlan_id, Some(0x064));
}

#[test]
fn test_v1_v2_timestamps_agree() {
    let data = payload(8, 0);
    let mut owned = OwnedRegion::zeroed(SLOT * 2);
    let (a, b) = owned.as_bytes_mut().split_at_mut(SLOT);
    write_v1(a, v1_header(8, 8, 1_234_567, 890_123), &data, 1);
    let mut v2 = v2_header(8, 8, TpStatus::USER, 0);
    v2.tp_sec = 1_234_567;
    v2.tp_nsec = 890_123_000;
    write_v2(b, v2, &data, 1);

    let region = owned.region();
    let f1 = FrameV1::new(region.slot(0, SLOT).unwrap()).unwrap();
    let f2 = FrameV2::new(region.slot(SLOT, SLOT).unwrap()).unwrap();
    assert_eq!(f1.timestamp(), f2.timestamp());
}

#[test]
fn test_construction_rejects_short_slot() {
    let mut owned = OwnedRegion::zeroed(SLOT);
    write_v2(
        owned.as_bytes_mut(),
        v2_header(16, 16, TpStatus::USER, 0),
        &[0; 16],
        1,
    );
    let region = owned.region();

    // Header fits, address record does not.
    let slot = region.slot(0, 32).unwrap();
    assert!(matches!(
        FrameV2::new(slot),
        Err(RingError::OutOfBounds { .. })
    ));

    // Payload ends past the slot.
    let slot = region.slot(0, MAC as usize + 8).unwrap();
    assert!(matches!(
        FrameV2::new(slot),
        Err(RingError::OutOfBounds { .. })
    ));
}

#[test]
fn test_capture_info_serializes() {
    let data = payload(40, 0);
    let mut owned = OwnedRegion::zeroed(SLOT);
    write_v2(
        owned.as_bytes_mut(),
        v2_header(40, 100, TpStatus::USER | TpStatus::VLAN_VALID, 7),
        &data,
        4,
    );
    let region = owned.region();
    let frame = FrameV2::new(region.slot(0, SLOT).unwrap()).unwrap();

    let info = frame.capture_info(&CaptureOptions::default());
    let json = serde_json::to_value(info).unwrap();
    assert_eq!(json["capture_len"], 40);
    assert_eq!(json["wire_len"], 100);
    assert_eq!(json["interface_index"], 4);
    assert_eq!(json["vlan_id"], 7);
}

#[test]
fn test_v2_payload_tags_with_8021q_despite_reported_tpid() {
    let data = payload(64, 0);
    let mut hdr = v2_header(
        64,
        64,
        TpStatus::USER | TpStatus::VLAN_VALID | TpStatus::VLAN_TPID_VALID,
        0x0ABC,
    );
    hdr.tp_vlan_tpid = 0x88a8;
    let mut owned = OwnedRegion::zeroed(SLOT);
    write_v2(owned.as_bytes_mut(), hdr, &data, 1);

    let region = owned.region();
    let frame = FrameV2::new(region.slot(0, SLOT).unwrap()).unwrap();
    assert_eq!(frame.vlan_tpid(), Some(0x88a8));

    let opts = CaptureOptions::new(TpacketVersion::V2).with_vlan_header(true);
    let tagged = frame.payload(&opts);
    assert_eq!(&tagged[12..16], &[0x81, 0x00, 0x0a, 0xbc]);
}
