//! TPACKET_V2 frame header view.

use std::time::{Duration, SystemTime};

use crate::abi::{SockaddrLl, Tpacket2Hdr, TpacketVersion};
use crate::error::RingError;
use crate::region::SlotRef;
use crate::status::{StatusWord, TpStatus};
use crate::vlan::VLAN_VID_MASK;

use super::{PacketHeader, status_word};

/// One TPACKET_V2 frame holding exactly one packet.
///
/// Nanosecond timestamps and out-of-band VLAN TCI/TPID.
#[derive(Debug)]
pub struct FrameV2<'a> {
    slot: SlotRef<'a>,
    status: StatusWord<'a>,
    flags: TpStatus,
    hdr: Tpacket2Hdr,
    ifindex: i32,
}

impl<'a> FrameV2<'a> {
    /// Decode the frame header at the start of `slot`.
    ///
    /// # Errors
    ///
    /// Returns `RingError::OutOfBounds` if the header, address record or
    /// captured bytes extend past the slot.
    pub fn new(slot: SlotRef<'a>) -> Result<Self, RingError> {
        let status = status_word(TpacketVersion::V2, &slot)?;
        let flags = status.load();

        let hdr: Tpacket2Hdr = slot.read(0)?;
        let sll: SockaddrLl = slot.read(TpacketVersion::V2.sockaddr_offset())?;
        slot.check(hdr.tp_mac as usize, hdr.tp_snaplen as usize)?;

        tracing::trace!(
            offset = slot.region_offset(),
            status = %flags,
            snaplen = hdr.tp_snaplen,
            "TPACKET_V2 frame"
        );

        Ok(Self {
            slot,
            status,
            flags,
            hdr,
            ifindex: sll.sll_ifindex,
        })
    }

    /// Header fields as read when the view was built.
    #[must_use]
    pub fn header(&self) -> &Tpacket2Hdr {
        &self.hdr
    }
}

impl PacketHeader for FrameV2<'_> {
    fn status(&self) -> TpStatus {
        self.status.load()
    }

    fn release(self) {
        self.status.clear();
    }

    fn timestamp(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH
            + Duration::from_secs(u64::from(self.hdr.tp_sec))
            + Duration::from_nanos(u64::from(self.hdr.tp_nsec))
    }

    fn raw_payload(&self) -> &[u8] {
        self.slot
            .bytes(self.hdr.tp_mac as usize, self.hdr.tp_snaplen as usize)
            .unwrap_or_default()
    }

    fn wire_len(&self) -> usize {
        self.hdr.tp_len as usize
    }

    fn interface_index(&self) -> i32 {
        self.ifindex
    }

    fn vlan_id(&self) -> Option<u16> {
        self.flags
            .has_vlan()
            .then_some(self.hdr.tp_vlan_tci & VLAN_VID_MASK)
    }

    fn vlan_tci(&self) -> u16 {
        self.hdr.tp_vlan_tci
    }

    fn vlan_tpid(&self) -> Option<u16> {
        (self.flags.has_vlan_tpid() && self.hdr.tp_vlan_tpid != 0).then_some(self.hdr.tp_vlan_tpid)
    }

    fn advance(&mut self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureOptions;
    use crate::header::fixtures::{self, MAC_V12};
    use crate::header::slot_status;
    use crate::header::v1::FrameV1;
    use crate::abi::TpacketHdr;
    use std::borrow::Cow;

    fn frame_hdr(status: u32, tci: u16) -> Tpacket2Hdr {
        Tpacket2Hdr {
            tp_status: status,
            tp_len: 90,
            tp_snaplen: 90,
            tp_mac: MAC_V12 as u16,
            tp_net: MAC_V12 as u16 + 14,
            tp_sec: 1_700_000_123,
            tp_nsec: 999_999_999,
            tp_vlan_tci: tci,
            tp_vlan_tpid: 0x8100,
            tp_padding: [0; 4],
        }
    }

    fn payload() -> Vec<u8> {
        (0..90u8).collect()
    }

    #[test]
    fn test_v2_accessors() {
        let data = payload();
        let mut owned = fixtures::v2_frame(frame_hdr(TpStatus::USER, 0), &data, 12);
        let region = owned.region();
        let frame = FrameV2::new(region.slot(0, fixtures::SLOT_LEN).unwrap()).unwrap();

        assert_eq!(frame.status().bits(), TpStatus::USER);
        assert_eq!(frame.raw_payload(), &data[..]);
        assert_eq!(frame.wire_len(), 90);
        assert!(!frame.is_truncated());
        assert_eq!(frame.interface_index(), 12);
        assert_eq!(
            frame.timestamp(),
            SystemTime::UNIX_EPOCH + Duration::new(1_700_000_123, 999_999_999)
        );
        assert_eq!(frame.header().tp_net, MAC_V12 as u16 + 14);
    }

    #[test]
    fn test_v2_vlan_requires_valid_bit() {
        let data = payload();
        let mut owned = fixtures::v2_frame(frame_hdr(TpStatus::USER, 0x3064), &data, 1);
        let region = owned.region();
        let frame = FrameV2::new(region.slot(0, fixtures::SLOT_LEN).unwrap()).unwrap();
        assert_eq!(frame.vlan_id(), None);

        let mut owned = fixtures::v2_frame(
            frame_hdr(TpStatus::USER | TpStatus::VLAN_VALID, 0x3064),
            &data,
            1,
        );
        let region = owned.region();
        let frame = FrameV2::new(region.slot(0, fixtures::SLOT_LEN).unwrap()).unwrap();
        assert_eq!(frame.vlan_id(), Some(0x064));
    }

    #[test]
    fn test_v2_payload_with_vlan_header() {
        let data = payload();
        let mut owned = fixtures::v2_frame(
            frame_hdr(TpStatus::USER | TpStatus::VLAN_VALID, 0x0ABC),
            &data,
            1,
        );
        let region = owned.region();
        let frame = FrameV2::new(region.slot(0, fixtures::SLOT_LEN).unwrap()).unwrap();

        let plain = frame.payload(&CaptureOptions::default());
        assert!(matches!(plain, Cow::Borrowed(_)));
        assert_eq!(&*plain, &data[..]);

        let opts = CaptureOptions::default().with_vlan_header(true);
        let tagged = frame.payload(&opts);
        assert_eq!(tagged.len(), data.len() + 4);
        assert_eq!(&tagged[12..16], &[0x81, 0x00, 0x0A, 0xBC]);
        assert_eq!(&tagged[16..], &data[12..]);

        let info = frame.capture_info(&opts);
        assert_eq!(info.capture_len, tagged.len());
        assert_eq!(info.vlan_id, Some(0x0ABC));
    }

    #[test]
    fn test_v2_tpid_is_metadata_only() {
        let data = payload();
        let mut hdr = frame_hdr(
            TpStatus::USER | TpStatus::VLAN_VALID | TpStatus::VLAN_TPID_VALID,
            0x0010,
        );
        hdr.tp_vlan_tpid = 0x88a8;
        let mut owned = fixtures::v2_frame(hdr, &data, 1);
        let region = owned.region();
        let frame = FrameV2::new(region.slot(0, fixtures::SLOT_LEN).unwrap()).unwrap();

        assert_eq!(frame.vlan_tpid(), Some(0x88a8));
        let tagged = frame.payload(&CaptureOptions::default().with_vlan_header(true));
        assert_eq!(&tagged[12..16], &[0x81, 0x00, 0x00, 0x10]);
    }

    #[test]
    fn test_v2_advance_and_release() {
        let data = payload();
        let mut owned = fixtures::v2_frame(frame_hdr(TpStatus::USER, 0), &data, 1);
        let region = owned.region();
        let slot = region.slot(0, fixtures::SLOT_LEN).unwrap();
        let mut frame = FrameV2::new(slot).unwrap();
        assert!(!frame.advance());
        frame.release();
        assert_eq!(slot_status(TpacketVersion::V2, &slot).unwrap().bits(), 0);
    }

    #[test]
    fn test_v1_v2_timestamp_equivalence() {
        let (sec, usec) = (1_650_000_000u32, 654_321u32);

        let v1 = TpacketHdr {
            tp_status: TpStatus::USER as libc::c_ulong,
            tp_snaplen: 4,
            tp_mac: MAC_V12 as u16,
            tp_sec: sec,
            tp_usec: usec,
            ..Default::default()
        };
        let mut owned_v1 = fixtures::v1_frame(v1, &[0; 4], 1);

        let mut v2 = frame_hdr(TpStatus::USER, 0);
        v2.tp_sec = sec;
        v2.tp_nsec = usec * 1000;
        v2.tp_snaplen = 4;
        let mut owned_v2 = fixtures::v2_frame(v2, &[0; 4], 1);

        let r1 = owned_v1.region();
        let r2 = owned_v2.region();
        let f1 = FrameV1::new(r1.slot(0, fixtures::SLOT_LEN).unwrap()).unwrap();
        let f2 = FrameV2::new(r2.slot(0, fixtures::SLOT_LEN).unwrap()).unwrap();
        assert_eq!(f1.timestamp(), f2.timestamp());
    }
}
