//! Frame and block header views.
//!
//! A header view is built over one user-owned ring slot, read, advanced (for
//! TPACKET_V3 blocks) and finally released back to the kernel. `release`
//! consumes the view, so using it afterwards does not compile:
//!
//! ```text
//!  KernelOwned ──kernel sets USER──> UserOwned ──advance()──> Iterating (V3)
//!                                        │                        │
//!                                        └──────release(self)─────┴──> KernelOwned
//! ```
//!
//! The ring loop picks one [`TpacketVersion`] when the socket is configured
//! and builds every view through [`RingHeader::new`].

use std::borrow::Cow;
use std::mem::offset_of;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::abi::{TpacketBlockDesc, TpacketHdr, Tpacket2Hdr, TpacketHdrV1, TpacketVersion};
use crate::config::CaptureOptions;
use crate::error::RingError;
use crate::region::SlotRef;
use crate::status::{StatusWord, TpStatus};
use crate::vlan::{self, ETH_ALEN, VLAN_HLEN};

pub mod v1;
pub mod v2;
pub mod v3;

pub use v1::FrameV1;
pub use v2::FrameV2;
pub use v3::BlockV3;

/// Operations shared by every ring header generation.
pub trait PacketHeader {
    /// Current status bits of the slot (acquire load, no side effect).
    fn status(&self) -> TpStatus;

    /// Hand the slot back to the kernel.
    ///
    /// Must be the last operation on the view. For TPACKET_V3 blocks it must
    /// only be called once [`advance`](Self::advance) has returned false.
    /// Payload borrows cannot be held across it:
    ///
    /// ```compile_fail
    /// use ringtap_core::{FrameV2, OwnedRegion, PacketHeader};
    ///
    /// let mut owned = OwnedRegion::zeroed(256);
    /// let region = owned.region();
    /// let frame = FrameV2::new(region.slot(0, 256).unwrap()).unwrap();
    /// let held = frame.raw_payload();
    /// frame.release();
    /// let _ = held.len();
    /// ```
    fn release(self)
    where
        Self: Sized;

    /// Capture time of the current packet.
    fn timestamp(&self) -> SystemTime;

    /// Captured bytes of the current packet, exactly as stored in the ring.
    fn raw_payload(&self) -> &[u8];

    /// Original length of the packet on the wire.
    fn wire_len(&self) -> usize;

    /// Index of the interface the packet was seen on.
    fn interface_index(&self) -> i32;

    /// VLAN id reported out-of-band, `None` when the kernel reported none.
    fn vlan_id(&self) -> Option<u16>;

    /// Raw VLAN TCI from the header, 0 when the generation has none.
    fn vlan_tci(&self) -> u16;

    /// Move to the next packet of the slot.
    ///
    /// Returns false when no packet is left; the view must then be released.
    fn advance(&mut self) -> bool;

    /// Tag protocol id reported out-of-band, `None` unless the kernel marked
    /// it valid. Metadata only; [`payload`](Self::payload) always tags with
    /// `0x8100`.
    fn vlan_tpid(&self) -> Option<u16> {
        None
    }

    /// Captured length.
    fn snap_len(&self) -> usize {
        self.raw_payload().len()
    }

    /// Whether the kernel cut the packet short.
    fn is_truncated(&self) -> bool {
        self.wire_len() > self.snap_len()
    }

    /// Packet bytes without copying, with the VLAN tag reinserted when
    /// `opts.add_vlan_header` is set and the header carries a TCI.
    fn payload(&self, opts: &CaptureOptions) -> Cow<'_, [u8]> {
        vlan::reinsert_vlan(self.raw_payload(), self.vlan_tci(), opts.add_vlan_header)
    }

    /// Metadata of the current packet, lengths matching [`payload`](Self::payload).
    fn capture_info(&self, opts: &CaptureOptions) -> CaptureInfo {
        let tagged = opts.add_vlan_header
            && self.vlan_tci() != 0
            && self.snap_len() >= ETH_ALEN * 2;
        let extra = if tagged { VLAN_HLEN } else { 0 };

        CaptureInfo {
            timestamp: self.timestamp(),
            capture_len: self.snap_len() + extra,
            wire_len: self.wire_len() + extra,
            interface_index: self.interface_index(),
            vlan_id: self.vlan_id(),
        }
    }
}

/// Per-packet capture metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureInfo {
    /// Capture time
    pub timestamp: SystemTime,
    /// Bytes delivered
    pub capture_len: usize,
    /// Bytes on the wire
    pub wire_len: usize,
    /// Receiving interface
    pub interface_index: i32,
    /// Out-of-band VLAN id
    pub vlan_id: Option<u16>,
}

/// Header view for whichever TPACKET generation the ring was configured with.
#[derive(Debug)]
pub enum RingHeader<'a> {
    /// TPACKET_V1 frame
    V1(FrameV1<'a>),
    /// TPACKET_V2 frame
    V2(FrameV2<'a>),
    /// TPACKET_V3 block
    V3(BlockV3<'a>),
}

macro_rules! dispatch {
    ($self:expr, $h:ident => $body:expr) => {
        match $self {
            RingHeader::V1($h) => $body,
            RingHeader::V2($h) => $body,
            RingHeader::V3($h) => $body,
        }
    };
}

impl<'a> RingHeader<'a> {
    /// Decode the header at the start of `slot`.
    ///
    /// # Errors
    ///
    /// Returns `RingError::OutOfBounds` if the header, its address record or
    /// the first packet's bytes do not fit in the slot.
    pub fn new(version: TpacketVersion, slot: SlotRef<'a>) -> Result<Self, RingError> {
        Ok(match version {
            TpacketVersion::V1 => Self::V1(FrameV1::new(slot)?),
            TpacketVersion::V2 => Self::V2(FrameV2::new(slot)?),
            TpacketVersion::V3 => Self::V3(BlockV3::new(slot)?),
        })
    }

    /// Generation of this view.
    #[must_use]
    pub fn version(&self) -> TpacketVersion {
        match self {
            Self::V1(_) => TpacketVersion::V1,
            Self::V2(_) => TpacketVersion::V2,
            Self::V3(_) => TpacketVersion::V3,
        }
    }
}

impl PacketHeader for RingHeader<'_> {
    fn status(&self) -> TpStatus {
        dispatch!(self, h => h.status())
    }

    fn release(self) {
        dispatch!(self, h => h.release())
    }

    fn timestamp(&self) -> SystemTime {
        dispatch!(self, h => h.timestamp())
    }

    fn raw_payload(&self) -> &[u8] {
        dispatch!(self, h => h.raw_payload())
    }

    fn wire_len(&self) -> usize {
        dispatch!(self, h => h.wire_len())
    }

    fn interface_index(&self) -> i32 {
        dispatch!(self, h => h.interface_index())
    }

    fn vlan_id(&self) -> Option<u16> {
        dispatch!(self, h => h.vlan_id())
    }

    fn vlan_tci(&self) -> u16 {
        dispatch!(self, h => h.vlan_tci())
    }

    fn vlan_tpid(&self) -> Option<u16> {
        dispatch!(self, h => h.vlan_tpid())
    }

    fn advance(&mut self) -> bool {
        dispatch!(self, h => h.advance())
    }
}

impl<'a> From<FrameV1<'a>> for RingHeader<'a> {
    fn from(h: FrameV1<'a>) -> Self {
        Self::V1(h)
    }
}

impl<'a> From<FrameV2<'a>> for RingHeader<'a> {
    fn from(h: FrameV2<'a>) -> Self {
        Self::V2(h)
    }
}

impl<'a> From<BlockV3<'a>> for RingHeader<'a> {
    fn from(h: BlockV3<'a>) -> Self {
        Self::V3(h)
    }
}

/// Offset of the status word within a slot.
const fn status_offset(version: TpacketVersion) -> usize {
    match version {
        TpacketVersion::V1 => offset_of!(TpacketHdr, tp_status),
        TpacketVersion::V2 => offset_of!(Tpacket2Hdr, tp_status),
        TpacketVersion::V3 => {
            offset_of!(TpacketBlockDesc, hdr) + offset_of!(TpacketHdrV1, block_status)
        }
    }
}

pub(crate) fn status_word<'a>(
    version: TpacketVersion,
    slot: &SlotRef<'a>,
) -> Result<StatusWord<'a>, RingError> {
    let offset = status_offset(version);
    Ok(match version {
        TpacketVersion::V1 => StatusWord::Long(slot.status_ulong(offset)?),
        TpacketVersion::V2 | TpacketVersion::V3 => StatusWord::Word(slot.status_u32(offset)?),
    })
}

/// Probe a slot's status word without decoding the rest of the header.
///
/// # Errors
///
/// Returns an error if the status word does not fit in the slot.
pub fn slot_status(version: TpacketVersion, slot: &SlotRef<'_>) -> Result<TpStatus, RingError> {
    Ok(status_word(version, slot)?.load())
}

/// Hand a slot back to the kernel without decoding it.
///
/// Used to recycle slots whose headers fail validation so the ring does not
/// stall on them.
///
/// # Errors
///
/// Returns an error if the status word does not fit in the slot.
pub fn release_slot(version: TpacketVersion, slot: &SlotRef<'_>) -> Result<(), RingError> {
    status_word(version, slot)?.clear();
    tracing::debug!(
        version = %version,
        offset = slot.region_offset(),
        "Slot released without decoding"
    );
    Ok(())
}
