//! TPACKET_V3 block header view and in-block packet iteration.
//!
//! A block holds `num_pkts` packets. The view starts on the packet at
//! `offset_to_first_pkt` and [`advance`](PacketHeader::advance) walks forward:
//! to `tp_next_offset` when the kernel supplied it, otherwise to
//! `TPACKET_ALIGN(tp_mac + tp_snaplen)` past the current packet header.
//! Each packet header, its address record and its captured bytes are checked
//! against the block before the cursor moves onto it.

use std::time::{Duration, SystemTime};

use crate::abi::{SockaddrLl, Tpacket3Hdr, TpacketBlockDesc, TpacketVersion, tpacket_align};
use crate::error::RingError;
use crate::region::SlotRef;
use crate::status::{StatusWord, TpStatus};
use crate::vlan::VLAN_VID_MASK;

use super::{PacketHeader, status_word};

/// One TPACKET_V3 block and a cursor over its packets.
#[derive(Debug)]
pub struct BlockV3<'a> {
    slot: SlotRef<'a>,
    status: StatusWord<'a>,
    desc: TpacketBlockDesc,
    /// Packets consumed so far
    used: u32,
    exhausted: bool,
    pkt_offset: usize,
    pkt: Tpacket3Hdr,
    ifindex: i32,
}

impl<'a> BlockV3<'a> {
    /// Decode the block descriptor at the start of `slot` and position the
    /// cursor on its first packet.
    ///
    /// A block with no packets yields a view that is already exhausted; its
    /// per-packet accessors return empty values.
    ///
    /// # Errors
    ///
    /// Returns `RingError::OutOfBounds` if the descriptor or the first packet
    /// extends past the slot.
    pub fn new(slot: SlotRef<'a>) -> Result<Self, RingError> {
        let status = status_word(TpacketVersion::V3, &slot)?;
        let current = status.load();
        let desc: TpacketBlockDesc = slot.read(0)?;

        let mut block = Self {
            slot,
            status,
            desc,
            used: 0,
            exhausted: true,
            pkt_offset: 0,
            pkt: Tpacket3Hdr::default(),
            ifindex: 0,
        };

        if desc.hdr.num_pkts > 0 {
            let first = desc.hdr.offset_to_first_pkt as usize;
            let (pkt, ifindex) = load_packet(&slot, first)?;
            block.exhausted = false;
            block.pkt_offset = first;
            block.pkt = pkt;
            block.ifindex = ifindex;
        }

        tracing::trace!(
            offset = slot.region_offset(),
            status = %current,
            seq = desc.hdr.seq_num,
            num_pkts = desc.hdr.num_pkts,
            "TPACKET_V3 block"
        );

        Ok(block)
    }

    /// Block descriptor as read when the view was built.
    #[must_use]
    pub fn descriptor(&self) -> &TpacketBlockDesc {
        &self.desc
    }

    /// Header of the packet under the cursor.
    #[must_use]
    pub fn packet_header(&self) -> &Tpacket3Hdr {
        &self.pkt
    }

    /// Number of packets the kernel placed in the block.
    #[must_use]
    pub fn packet_count(&self) -> u32 {
        self.desc.hdr.num_pkts
    }

    /// Packets consumed so far.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.used
    }

    /// Block sequence number.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.desc.hdr.seq_num
    }

    /// Bytes of the block in use.
    #[must_use]
    pub fn block_len(&self) -> usize {
        self.desc.hdr.blk_len as usize
    }

    /// Whether the cursor points at a packet.
    #[must_use]
    pub fn has_packet(&self) -> bool {
        self.desc.hdr.num_pkts > 0
    }

    /// Whether iteration has ended and the block may be released.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Whether the kernel retired the block on its timer.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        TpStatus::from_bits(self.desc.hdr.block_status).is_timed_out()
    }

    /// Status bits of the packet under the cursor.
    #[must_use]
    pub fn packet_status(&self) -> TpStatus {
        TpStatus::from_bits(self.pkt.tp_status)
    }

    /// Receive flow hash of the packet under the cursor.
    #[must_use]
    pub fn rx_hash(&self) -> u32 {
        self.pkt.hv1.tp_rxhash
    }

    /// Timestamps of the first and last packet of the block.
    #[must_use]
    pub fn block_time_range(&self) -> (SystemTime, SystemTime) {
        let ts = |t: crate::abi::TpacketBdTs| {
            SystemTime::UNIX_EPOCH
                + Duration::from_secs(u64::from(t.ts_sec))
                + Duration::from_nanos(u64::from(t.ts_usec))
        };
        (ts(self.desc.hdr.ts_first_pkt), ts(self.desc.hdr.ts_last_pkt))
    }
}

/// Read the packet header at `offset` and validate everything it points at.
fn load_packet(slot: &SlotRef<'_>, offset: usize) -> Result<(Tpacket3Hdr, i32), RingError> {
    let pkt: Tpacket3Hdr = slot.read(offset)?;
    let sll: SockaddrLl = slot.read(offset + TpacketVersion::V3.sockaddr_offset())?;
    slot.check(offset + pkt.tp_mac as usize, pkt.tp_snaplen as usize)?;
    Ok((pkt, sll.sll_ifindex))
}

impl PacketHeader for BlockV3<'_> {
    fn status(&self) -> TpStatus {
        self.status.load()
    }

    fn release(self) {
        if !self.exhausted {
            tracing::warn!(
                seq = self.desc.hdr.seq_num,
                used = self.used,
                num_pkts = self.desc.hdr.num_pkts,
                "TPACKET_V3 block released before iteration finished"
            );
        }
        debug_assert!(self.exhausted, "block released before advance() returned false");

        self.status.clear();
        tracing::debug!(seq = self.desc.hdr.seq_num, "TPACKET_V3 block released");
    }

    fn timestamp(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH
            + Duration::from_secs(u64::from(self.pkt.tp_sec))
            + Duration::from_nanos(u64::from(self.pkt.tp_nsec))
    }

    fn raw_payload(&self) -> &[u8] {
        if !self.has_packet() {
            return &[];
        }
        self.slot
            .bytes(
                self.pkt_offset + self.pkt.tp_mac as usize,
                self.pkt.tp_snaplen as usize,
            )
            .unwrap_or_default()
    }

    fn wire_len(&self) -> usize {
        self.pkt.tp_len as usize
    }

    fn interface_index(&self) -> i32 {
        self.ifindex
    }

    fn vlan_id(&self) -> Option<u16> {
        self.packet_status()
            .has_vlan()
            .then_some(self.pkt.hv1.tp_vlan_tci as u16 & VLAN_VID_MASK)
    }

    fn vlan_tci(&self) -> u16 {
        self.pkt.hv1.tp_vlan_tci as u16
    }

    fn vlan_tpid(&self) -> Option<u16> {
        let tpid = self.pkt.hv1.tp_vlan_tpid;
        (self.packet_status().has_vlan_tpid() && tpid != 0).then_some(tpid)
    }

    fn advance(&mut self) -> bool {
        if self.exhausted {
            return false;
        }

        self.used += 1;
        if self.used >= self.desc.hdr.num_pkts {
            self.exhausted = true;
            tracing::debug!(
                seq = self.desc.hdr.seq_num,
                num_pkts = self.desc.hdr.num_pkts,
                "TPACKET_V3 block exhausted"
            );
            return false;
        }

        let step = match self.pkt.tp_next_offset {
            0 => tpacket_align(self.pkt.tp_snaplen as usize + self.pkt.tp_mac as usize),
            next => next as usize,
        };

        // A step shorter than a packet header would revisit or overlap it.
        let loaded = if step < TpacketVersion::V3.packet_header_len() {
            Err(RingError::InvalidLayout(format!(
                "packet step of {step} bytes at offset {}",
                self.pkt_offset
            )))
        } else {
            self.pkt_offset
                .checked_add(step)
                .ok_or(RingError::OutOfBounds {
                    offset: self.pkt_offset,
                    len: step,
                    limit: self.slot.len(),
                })
                .and_then(|next| load_packet(&self.slot, next).map(|p| (next, p)))
        };

        match loaded {
            Ok((next, (pkt, ifindex))) => {
                tracing::trace!(offset = next, used = self.used, "TPACKET_V3 packet");
                self.pkt_offset = next;
                self.pkt = pkt;
                self.ifindex = ifindex;
                true
            }
            Err(e) => {
                tracing::warn!(
                    seq = self.desc.hdr.seq_num,
                    used = self.used,
                    num_pkts = self.desc.hdr.num_pkts,
                    error = %e,
                    "Invalid TPACKET_V3 packet offset, ending iteration"
                );
                self.exhausted = true;
                false
            }
        }
    }
}
