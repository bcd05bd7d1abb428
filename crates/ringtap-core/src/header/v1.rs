//! TPACKET_V1 frame header view.

use std::time::{Duration, SystemTime};

use crate::abi::{SockaddrLl, TpacketHdr, TpacketVersion};
use crate::error::RingError;
use crate::region::SlotRef;
use crate::status::{StatusWord, TpStatus};

use super::{PacketHeader, status_word};

/// One TPACKET_V1 frame holding exactly one packet.
///
/// Timestamps are microsecond resolution and there is no VLAN metadata.
#[derive(Debug)]
pub struct FrameV1<'a> {
    slot: SlotRef<'a>,
    status: StatusWord<'a>,
    hdr: TpacketHdr,
    ifindex: i32,
}

impl<'a> FrameV1<'a> {
    /// Decode the frame header at the start of `slot`.
    ///
    /// # Errors
    ///
    /// Returns `RingError::OutOfBounds` if the header, address record or
    /// captured bytes extend past the slot.
    pub fn new(slot: SlotRef<'a>) -> Result<Self, RingError> {
        let status = status_word(TpacketVersion::V1, &slot)?;
        let current = status.load();

        let hdr: TpacketHdr = slot.read(0)?;
        let sll: SockaddrLl = slot.read(TpacketVersion::V1.sockaddr_offset())?;
        slot.check(hdr.tp_mac as usize, hdr.tp_snaplen as usize)?;

        tracing::trace!(
            offset = slot.region_offset(),
            status = %current,
            snaplen = hdr.tp_snaplen,
            "TPACKET_V1 frame"
        );

        Ok(Self {
            slot,
            status,
            hdr,
            ifindex: sll.sll_ifindex,
        })
    }

    /// Header fields as read when the view was built.
    #[must_use]
    pub fn header(&self) -> &TpacketHdr {
        &self.hdr
    }
}

impl PacketHeader for FrameV1<'_> {
    fn status(&self) -> TpStatus {
        self.status.load()
    }

    fn release(self) {
        self.status.clear();
    }

    fn timestamp(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH
            + Duration::from_secs(u64::from(self.hdr.tp_sec))
            + Duration::from_micros(u64::from(self.hdr.tp_usec))
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
        None
    }

    fn vlan_tci(&self) -> u16 {
        0
    }

    fn advance(&mut self) -> bool {
        false
    }
}
