//! Shared builders for ringtap integration tests.
//!
//! Each builder lays kernel headers out exactly as the kernel would inside a
//! zeroed slot, using only the public encoders.

use ringtap_core::abi::{
    SockaddrLl, Tpacket2Hdr, Tpacket3Hdr, TpacketBlockDesc, TpacketHdr, TpacketHdrV1,
    TpacketVersion,
};
use ringtap_core::{TpStatus, tpacket_align};

/// Link-layer offset used by every builder.
pub const MAC: u16 = 80;

const AF_PACKET: u16 = 17;

/// Offset of the first packet in a V3 block built here.
pub const FIRST_PKT: usize = tpacket_align(std::mem::size_of::<TpacketBlockDesc>());

fn sll(ifindex: i32) -> SockaddrLl {
    SockaddrLl {
        sll_family: AF_PACKET,
        sll_protocol: 0x0008,
        sll_ifindex: ifindex,
        sll_halen: 6,
        ..Default::default()
    }
}

/// Write a TPACKET_V1 frame at the start of `buf`.
pub fn write_v1(buf: &mut [u8], hdr: TpacketHdr, payload: &[u8], ifindex: i32) {
    hdr.encode_into(buf);
    sll(ifindex).encode_into(&mut buf[TpacketVersion::V1.sockaddr_offset()..]);
    let mac = hdr.tp_mac as usize;
    buf[mac..mac + payload.len()].copy_from_slice(payload);
}

/// Write a TPACKET_V2 frame at the start of `buf`.
pub fn write_v2(buf: &mut [u8], hdr: Tpacket2Hdr, payload: &[u8], ifindex: i32) {
    hdr.encode_into(buf);
    sll(ifindex).encode_into(&mut buf[TpacketVersion::V2.sockaddr_offset()..]);
    let mac = hdr.tp_mac as usize;
    buf[mac..mac + payload.len()].copy_from_slice(payload);
}

/// V1 frame header for a user-owned `payload`.
pub fn v1_header(payload_len: usize, wire_len: u32, sec: u32, usec: u32) -> TpacketHdr {
    TpacketHdr {
        tp_status: TpStatus::USER as _,
        tp_len: wire_len,
        tp_snaplen: payload_len as u32,
        tp_mac: MAC,
        tp_net: MAC + 14,
        tp_sec: sec,
        tp_usec: usec,
    }
}

/// V2 frame header for a user-owned `payload`.
pub fn v2_header(payload_len: usize, wire_len: u32, status: u32, tci: u16) -> Tpacket2Hdr {
    Tpacket2Hdr {
        tp_status: status,
        tp_len: wire_len,
        tp_snaplen: payload_len as u32,
        tp_mac: MAC,
        tp_net: MAC + 14,
        tp_sec: 1_700_000_000,
        tp_nsec: 250,
        tp_vlan_tci: tci,
        tp_vlan_tpid: 0x8100,
        tp_padding: [0; 4],
    }
}

/// One packet to place in a V3 block.
#[derive(Debug, Clone)]
pub struct V3Packet {
    /// Packet header; `tp_snaplen` and `tp_next_offset` are filled in by [`write_v3_block`]
    pub hdr: Tpacket3Hdr,
    /// Captured bytes
    pub payload: Vec<u8>,
    /// Receiving interface
    pub ifindex: i32,
}

impl V3Packet {
    /// Untagged, untruncated packet.
    pub fn new(payload: Vec<u8>, ifindex: i32) -> Self {
        Self {
            hdr: Tpacket3Hdr {
                tp_sec: 1_700_000_000,
                tp_nsec: 1,
                tp_len: payload.len() as u32,
                tp_status: TpStatus::USER,
                tp_mac: MAC,
                tp_net: MAC + 14,
                ..Default::default()
            },
            payload,
            ifindex,
        }
    }

    /// Mark the packet as carrying an out-of-band VLAN tag.
    pub fn with_vlan(mut self, tci: u16) -> Self {
        self.hdr.tp_status |= TpStatus::VLAN_VALID;
        self.hdr.hv1.tp_vlan_tci = u32::from(tci);
        self
    }
}

/// Distance from one packet header to the next when `tp_next_offset` is 0.
pub fn computed_step(packet: &V3Packet) -> usize {
    tpacket_align(packet.hdr.tp_mac as usize + packet.payload.len())
}

/// Write a TPACKET_V3 block at the start of `buf` and return its used length.
///
/// With `explicit_next` each packet but the last carries `tp_next_offset`;
/// otherwise all next offsets are 0.
pub fn write_v3_block(
    buf: &mut [u8],
    block_status: u32,
    packets: &[V3Packet],
    explicit_next: bool,
) -> usize {
    let mut offset = FIRST_PKT;
    for (i, packet) in packets.iter().enumerate() {
        let step = computed_step(packet);
        let mut hdr = packet.hdr;
        hdr.tp_snaplen = packet.payload.len() as u32;
        hdr.tp_next_offset = if explicit_next && i + 1 < packets.len() {
            step as u32
        } else {
            0
        };
        hdr.encode_into(&mut buf[offset..]);
        sll(packet.ifindex).encode_into(&mut buf[offset + TpacketVersion::V3.sockaddr_offset()..]);
        let mac = offset + hdr.tp_mac as usize;
        buf[mac..mac + packet.payload.len()].copy_from_slice(&packet.payload);
        offset += step;
    }

    TpacketBlockDesc {
        version: 1,
        offset_to_priv: 0,
        hdr: TpacketHdrV1 {
            block_status,
            num_pkts: packets.len() as u32,
            offset_to_first_pkt: FIRST_PKT as u32,
            blk_len: offset as u32,
            seq_num: 7,
            ..Default::default()
        },
    }
    .encode_into(buf);
    offset
}

/// Deterministic test payload of `len` bytes.
pub fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_add(seed)).collect()
}
