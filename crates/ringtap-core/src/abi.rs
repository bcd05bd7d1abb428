//! Kernel ABI layouts for `PACKET_MMAP` receive rings.
//!
//! Every structure here mirrors its counterpart in `linux/if_packet.h` field
//! for field. Sizes and offsets are asserted at compile time; the kernel owns
//! this layout and nothing in this crate may reorder or repack it.
//!
//! ```text
//!  TPACKET_V1 / TPACKET_V2 frame          TPACKET_V3 block
//!  ┌──────────────────────────┐           ┌──────────────────────────┐
//!  │ tpacket_hdr / tpacket2_hdr│          │ tpacket_block_desc       │
//!  ├──────────────────────────┤ ALIGN     │   tpacket_hdr_v1         │
//!  │ sockaddr_ll              │           ├──────────────────────────┤ offset_to_first_pkt
//!  ├──────────────────────────┤ tp_mac    │ tpacket3_hdr │ sll │ pkt │
//!  │ packet bytes (snaplen)   │           ├──────────────────────────┤ tp_next_offset
//!  └──────────────────────────┘           │ tpacket3_hdr │ sll │ pkt │
//!                                         │ ...                      │
//!                                         └──────────────────────────┘
//! ```

use std::mem::{offset_of, size_of};

use serde::{Deserialize, Serialize};

use crate::error::RingError;

/// `TPACKET_ALIGNMENT` from `linux/if_packet.h`.
pub const TPACKET_ALIGNMENT: usize = 16;

/// Round `x` up to the next multiple of [`TPACKET_ALIGNMENT`] (`TPACKET_ALIGN`).
#[inline]
#[must_use]
pub const fn tpacket_align(x: usize) -> usize {
    (x + TPACKET_ALIGNMENT - 1) & !(TPACKET_ALIGNMENT - 1)
}

/// Negotiated ring ABI generation (`enum tpacket_versions`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum TpacketVersion {
    /// One packet per frame, microsecond timestamps
    V1 = 0,
    /// One packet per frame, nanosecond timestamps, VLAN metadata
    V2 = 1,
    /// Variable-size packets packed into blocks
    #[default]
    V3 = 2,
}

impl TpacketVersion {
    /// Size of the per-packet header (`tpacket_hdr`, `tpacket2_hdr` or `tpacket3_hdr`).
    #[must_use]
    pub const fn packet_header_len(self) -> usize {
        match self {
            Self::V1 => size_of::<TpacketHdr>(),
            Self::V2 => size_of::<Tpacket2Hdr>(),
            Self::V3 => size_of::<Tpacket3Hdr>(),
        }
    }

    /// Offset of the `sockaddr_ll` record relative to a packet header.
    #[must_use]
    pub const fn sockaddr_offset(self) -> usize {
        tpacket_align(self.packet_header_len())
    }

    /// Smallest slot able to hold the slot header and one address record.
    #[must_use]
    pub const fn min_slot_len(self) -> usize {
        match self {
            Self::V1 | Self::V2 => self.sockaddr_offset() + size_of::<SockaddrLl>(),
            Self::V3 => {
                tpacket_align(size_of::<TpacketBlockDesc>())
                    + self.sockaddr_offset()
                    + size_of::<SockaddrLl>()
            }
        }
    }
}

impl TryFrom<u32> for TpacketVersion {
    type Error = RingError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::V1),
            1 => Ok(Self::V2),
            2 => Ok(Self::V3),
            other => Err(RingError::UnsupportedVersion(other)),
        }
    }
}

impl std::fmt::Display for TpacketVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => f.write_str("TPACKET_V1"),
            Self::V2 => f.write_str("TPACKET_V2"),
            Self::V3 => f.write_str("TPACKET_V3"),
        }
    }
}

/// Plain-old-data kernel structures that may be copied out of ring memory.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]`, contain only integer fields (or arrays
/// and structs thereof) and accept every bit pattern as a valid value.
pub(crate) unsafe trait KernelAbi: Copy + 'static {}

/// `struct tpacket_hdr` (TPACKET_V1 frame header).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TpacketHdr {
    /// Status word (`unsigned long`)
    pub tp_status: libc::c_ulong,
    /// Original packet length
    pub tp_len: u32,
    /// Captured length
    pub tp_snaplen: u32,
    /// Offset of the link-layer header from the frame start
    pub tp_mac: u16,
    /// Offset of the network header from the frame start
    pub tp_net: u16,
    /// Timestamp seconds
    pub tp_sec: u32,
    /// Timestamp microseconds
    pub tp_usec: u32,
}

/// `struct tpacket2_hdr` (TPACKET_V2 frame header).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tpacket2Hdr {
    /// Status word
    pub tp_status: u32,
    /// Original packet length
    pub tp_len: u32,
    /// Captured length
    pub tp_snaplen: u32,
    /// Offset of the link-layer header from the frame start
    pub tp_mac: u16,
    /// Offset of the network header from the frame start
    pub tp_net: u16,
    /// Timestamp seconds
    pub tp_sec: u32,
    /// Timestamp nanoseconds
    pub tp_nsec: u32,
    /// VLAN tag control information
    pub tp_vlan_tci: u16,
    /// VLAN tag protocol identifier
    pub tp_vlan_tpid: u16,
    /// Padding
    pub tp_padding: [u8; 4],
}

/// `struct tpacket_bd_ts` (block timestamp).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TpacketBdTs {
    /// Seconds
    pub ts_sec: u32,
    /// Sub-second part (`ts_usec`/`ts_nsec` union)
    pub ts_usec: u32,
}

/// `struct tpacket_hdr_v1` (TPACKET_V3 block header body).
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TpacketHdrV1 {
    /// Block status word
    pub block_status: u32,
    /// Number of packets in the block
    pub num_pkts: u32,
    /// Offset of the first `tpacket3_hdr` from the block start
    pub offset_to_first_pkt: u32,
    /// Bytes used in the block
    pub blk_len: u32,
    /// Monotonic block sequence number
    pub seq_num: u64,
    /// Timestamp of the first packet
    pub ts_first_pkt: TpacketBdTs,
    /// Timestamp of the last packet
    pub ts_last_pkt: TpacketBdTs,
}

/// `struct tpacket_block_desc` (TPACKET_V3 block descriptor).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TpacketBlockDesc {
    /// Descriptor version
    pub version: u32,
    /// Offset of the private area
    pub offset_to_priv: u32,
    /// Block header (`union tpacket_bd_header_u`, only `bh1` exists)
    pub hdr: TpacketHdrV1,
}

/// `struct tpacket_hdr_variant1` (per-packet extension in TPACKET_V3).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TpacketHdrVariant1 {
    /// Receive flow hash
    pub tp_rxhash: u32,
    /// VLAN tag control information
    pub tp_vlan_tci: u32,
    /// VLAN tag protocol identifier
    pub tp_vlan_tpid: u16,
    /// Padding
    pub tp_padding: u16,
}

/// `struct tpacket3_hdr` (TPACKET_V3 packet header inside a block).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tpacket3Hdr {
    /// Offset to the next packet header, 0 if not supplied
    pub tp_next_offset: u32,
    /// Timestamp seconds
    pub tp_sec: u32,
    /// Timestamp nanoseconds
    pub tp_nsec: u32,
    /// Captured length
    pub tp_snaplen: u32,
    /// Original packet length
    pub tp_len: u32,
    /// Per-packet status bits
    pub tp_status: u32,
    /// Offset of the link-layer header from this packet header
    pub tp_mac: u16,
    /// Offset of the network header from this packet header
    pub tp_net: u16,
    /// Extension words
    pub hv1: TpacketHdrVariant1,
    /// Padding
    pub tp_padding: [u8; 8],
}

/// `struct sockaddr_ll` (link-layer address record following each packet header).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SockaddrLl {
    /// Address family (`AF_PACKET`)
    pub sll_family: u16,
    /// Ethertype, network byte order
    pub sll_protocol: u16,
    /// Interface index
    pub sll_ifindex: i32,
    /// ARP hardware type
    pub sll_hatype: u16,
    /// Packet type (`PACKET_HOST`, `PACKET_OUTGOING`, ...)
    pub sll_pkttype: u8,
    /// Hardware address length
    pub sll_halen: u8,
    /// Hardware address
    pub sll_addr: [u8; 8],
}

// SAFETY: all of the following are #[repr(C)] aggregates of integers; any bit
// pattern is a valid value.
unsafe impl KernelAbi for TpacketHdr {}
unsafe impl KernelAbi for Tpacket2Hdr {}
unsafe impl KernelAbi for TpacketBlockDesc {}
unsafe impl KernelAbi for Tpacket3Hdr {}
unsafe impl KernelAbi for SockaddrLl {}

const _: () = {
    assert!(size_of::<libc::c_ulong>() == size_of::<usize>());
    assert!(offset_of!(TpacketHdr, tp_len) == size_of::<libc::c_ulong>());
    assert!(size_of::<Tpacket2Hdr>() == 32);
    assert!(offset_of!(Tpacket2Hdr, tp_vlan_tci) == 24);
    assert!(offset_of!(Tpacket2Hdr, tp_vlan_tpid) == 26);
    assert!(size_of::<TpacketHdrV1>() == 40);
    assert!(offset_of!(TpacketHdrV1, seq_num) == 16);
    assert!(size_of::<TpacketBlockDesc>() == 48);
    assert!(offset_of!(TpacketBlockDesc, hdr) == 8);
    assert!(size_of::<TpacketHdrVariant1>() == 12);
    assert!(size_of::<Tpacket3Hdr>() == 48);
    assert!(offset_of!(Tpacket3Hdr, hv1) == 28);
    assert!(size_of::<SockaddrLl>() == 20);
    assert!(offset_of!(SockaddrLl, sll_ifindex) == 4);
};

fn put(buf: &mut [u8], offset: usize, bytes: &[u8]) {
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

// Encoders write native-endian fields at kernel offsets. They exist to build
// ring snapshots for replay, tests and benchmarks; the decode path never uses them.

impl TpacketHdr {
    /// Encode into `buf` at kernel layout.
    ///
    /// # Panics
    ///
    /// Panics if `buf.len() < size_of::<TpacketHdr>()`.
    pub fn encode_into(&self, buf: &mut [u8]) {
        put(buf, offset_of!(Self, tp_status), &self.tp_status.to_ne_bytes());
        put(buf, offset_of!(Self, tp_len), &self.tp_len.to_ne_bytes());
        put(buf, offset_of!(Self, tp_snaplen), &self.tp_snaplen.to_ne_bytes());
        put(buf, offset_of!(Self, tp_mac), &self.tp_mac.to_ne_bytes());
        put(buf, offset_of!(Self, tp_net), &self.tp_net.to_ne_bytes());
        put(buf, offset_of!(Self, tp_sec), &self.tp_sec.to_ne_bytes());
        put(buf, offset_of!(Self, tp_usec), &self.tp_usec.to_ne_bytes());
    }
}

impl Tpacket2Hdr {
    /// Encode into `buf` at kernel layout.
    ///
    /// # Panics
    ///
    /// Panics if `buf.len() < 32`.
    pub fn encode_into(&self, buf: &mut [u8]) {
        put(buf, offset_of!(Self, tp_status), &self.tp_status.to_ne_bytes());
        put(buf, offset_of!(Self, tp_len), &self.tp_len.to_ne_bytes());
        put(buf, offset_of!(Self, tp_snaplen), &self.tp_snaplen.to_ne_bytes());
        put(buf, offset_of!(Self, tp_mac), &self.tp_mac.to_ne_bytes());
        put(buf, offset_of!(Self, tp_net), &self.tp_net.to_ne_bytes());
        put(buf, offset_of!(Self, tp_sec), &self.tp_sec.to_ne_bytes());
        put(buf, offset_of!(Self, tp_nsec), &self.tp_nsec.to_ne_bytes());
        put(buf, offset_of!(Self, tp_vlan_tci), &self.tp_vlan_tci.to_ne_bytes());
        put(buf, offset_of!(Self, tp_vlan_tpid), &self.tp_vlan_tpid.to_ne_bytes());
        put(buf, offset_of!(Self, tp_padding), &self.tp_padding);
    }
}

impl TpacketBlockDesc {
    /// Encode into `buf` at kernel layout.
    ///
    /// # Panics
    ///
    /// Panics if `buf.len() < 48`.
    pub fn encode_into(&self, buf: &mut [u8]) {
        put(buf, offset_of!(Self, version), &self.version.to_ne_bytes());
        put(buf, offset_of!(Self, offset_to_priv), &self.offset_to_priv.to_ne_bytes());

        let base = offset_of!(Self, hdr);
        let h = &self.hdr;
        put(buf, base + offset_of!(TpacketHdrV1, block_status), &h.block_status.to_ne_bytes());
        put(buf, base + offset_of!(TpacketHdrV1, num_pkts), &h.num_pkts.to_ne_bytes());
        put(
            buf,
            base + offset_of!(TpacketHdrV1, offset_to_first_pkt),
            &h.offset_to_first_pkt.to_ne_bytes(),
        );
        put(buf, base + offset_of!(TpacketHdrV1, blk_len), &h.blk_len.to_ne_bytes());
        put(buf, base + offset_of!(TpacketHdrV1, seq_num), &h.seq_num.to_ne_bytes());

        let first = base + offset_of!(TpacketHdrV1, ts_first_pkt);
        put(buf, first, &h.ts_first_pkt.ts_sec.to_ne_bytes());
        put(buf, first + 4, &h.ts_first_pkt.ts_usec.to_ne_bytes());
        let last = base + offset_of!(TpacketHdrV1, ts_last_pkt);
        put(buf, last, &h.ts_last_pkt.ts_sec.to_ne_bytes());
        put(buf, last + 4, &h.ts_last_pkt.ts_usec.to_ne_bytes());
    }
}

impl Tpacket3Hdr {
    /// Encode into `buf` at kernel layout.
    ///
    /// # Panics
    ///
    /// Panics if `buf.len() < 48`.
    pub fn encode_into(&self, buf: &mut [u8]) {
        put(buf, offset_of!(Self, tp_next_offset), &self.tp_next_offset.to_ne_bytes());
        put(buf, offset_of!(Self, tp_sec), &self.tp_sec.to_ne_bytes());
        put(buf, offset_of!(Self, tp_nsec), &self.tp_nsec.to_ne_bytes());
        put(buf, offset_of!(Self, tp_snaplen), &self.tp_snaplen.to_ne_bytes());
        put(buf, offset_of!(Self, tp_len), &self.tp_len.to_ne_bytes());
        put(buf, offset_of!(Self, tp_status), &self.tp_status.to_ne_bytes());
        put(buf, offset_of!(Self, tp_mac), &self.tp_mac.to_ne_bytes());
        put(buf, offset_of!(Self, tp_net), &self.tp_net.to_ne_bytes());

        let hv1 = offset_of!(Self, hv1);
        put(
            buf,
            hv1 + offset_of!(TpacketHdrVariant1, tp_rxhash),
            &self.hv1.tp_rxhash.to_ne_bytes(),
        );
        put(
            buf,
            hv1 + offset_of!(TpacketHdrVariant1, tp_vlan_tci),
            &self.hv1.tp_vlan_tci.to_ne_bytes(),
        );
        put(
            buf,
            hv1 + offset_of!(TpacketHdrVariant1, tp_vlan_tpid),
            &self.hv1.tp_vlan_tpid.to_ne_bytes(),
        );
        put(
            buf,
            hv1 + offset_of!(TpacketHdrVariant1, tp_padding),
            &self.hv1.tp_padding.to_ne_bytes(),
        );
        put(buf, offset_of!(Self, tp_padding), &self.tp_padding);
    }
}

impl SockaddrLl {
    /// Encode into `buf` at kernel layout.
    ///
    /// # Panics
    ///
    /// Panics if `buf.len() < 20`.
    pub fn encode_into(&self, buf: &mut [u8]) {
        put(buf, offset_of!(Self, sll_family), &self.sll_family.to_ne_bytes());
        put(buf, offset_of!(Self, sll_protocol), &self.sll_protocol.to_ne_bytes());
        put(buf, offset_of!(Self, sll_ifindex), &self.sll_ifindex.to_ne_bytes());
        put(buf, offset_of!(Self, sll_hatype), &self.sll_hatype.to_ne_bytes());
        put(buf, offset_of!(Self, sll_pkttype), &[self.sll_pkttype]);
        put(buf, offset_of!(Self, sll_halen), &[self.sll_halen]);
        put(buf, offset_of!(Self, sll_addr), &self.sll_addr);
    }
}
