//! 802.1Q tag reinsertion.
//!
//! When VLAN acceleration is active the kernel strips the tag from the frame
//! and reports it out-of-band in the packet header. Consumers that parse
//! Ethernet framing themselves expect the tag in-band, so it is rebuilt here:
//!
//! ```text
//!  before:  | dst mac (6) | src mac (6) | ethertype | ...
//!  after:   | dst mac (6) | src mac (6) | TPID (2) | TCI (2) | ethertype | ...
//! ```

use std::borrow::Cow;

/// Length of one MAC address (`ETH_ALEN`).
pub const ETH_ALEN: usize = 6;

/// Length of an 802.1Q tag (`VLAN_HLEN`).
pub const VLAN_HLEN: usize = 4;

/// 802.1Q tag protocol identifier (`ETH_P_8021Q`).
pub const ETH_P_8021Q: u16 = 0x8100;

/// Mask of the VLAN identifier within a TCI (`VLAN_VID_MASK`).
pub const VLAN_VID_MASK: u16 = 0x0fff;

/// Reinsert an 802.1Q tag carrying `tci` after the MAC addresses.
///
/// Returns `payload` untouched (borrowed) when `tci` is zero or `enabled` is
/// false. The TCI is written big-endian as reported, so priority and DEI bits
/// survive alongside the 12-bit VLAN id.
#[inline]
#[must_use]
pub fn reinsert_vlan(payload: &[u8], tci: u16, enabled: bool) -> Cow<'_, [u8]> {
    reinsert_vlan_with_tpid(payload, tci, ETH_P_8021Q, enabled)
}

/// Like [`reinsert_vlan`] but with an explicit tag protocol id (e.g. `0x88a8`).
///
/// Payloads shorter than the two MAC addresses cannot carry a tag and are
/// returned unchanged.
#[must_use]
pub fn reinsert_vlan_with_tpid(payload: &[u8], tci: u16, tpid: u16, enabled: bool) -> Cow<'_, [u8]> {
    if tci == 0 || !enabled || payload.len() < ETH_ALEN * 2 {
        return Cow::Borrowed(payload);
    }

    let (macs, rest) = payload.split_at(ETH_ALEN * 2);
    let mut eth = Vec::with_capacity(payload.len() + VLAN_HLEN);
    eth.extend_from_slice(macs);
    eth.extend_from_slice(&tpid.to_be_bytes());
    eth.extend_from_slice(&tci.to_be_bytes());
    eth.extend_from_slice(rest);
    Cow::Owned(eth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(extra: usize) -> Vec<u8> {
        (0..(ETH_ALEN * 2 + extra) as u8).collect()
    }

    #[test]
    fn test_zero_tci_borrows() {
        let data = frame(20);
        let out = reinsert_vlan(&data, 0, true);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(&*out, &data[..]);
    }

    #[test]
    fn test_disabled_borrows() {
        let data = frame(20);
        let out = reinsert_vlan(&data, 0x0ABC, false);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out.len(), data.len());
    }

    #[test]
    fn test_tag_inserted_after_macs() {
        let data = frame(30);
        let out = reinsert_vlan(&data, 0x0ABC, true);
        assert_eq!(out.len(), data.len() + VLAN_HLEN);
        assert_eq!(&out[..12], &data[..12]);
        assert_eq!(&out[12..16], &[0x81, 0x00, 0x0A, 0xBC]);
        assert_eq!(&out[16..], &data[12..]);
    }

    #[test]
    fn test_priority_bits_preserved() {
        let data = frame(2);
        let out = reinsert_vlan(&data, 0xE064, true);
        assert_eq!(&out[14..16], &[0xE0, 0x64]);
    }

    #[test]
    fn test_explicit_tpid() {
        let data = frame(4);
        let out = reinsert_vlan_with_tpid(&data, 0x0064, 0x88a8, true);
        assert_eq!(&out[12..16], &[0x88, 0xa8, 0x00, 0x64]);
    }

    #[test]
    fn test_runt_payload_untouched() {
        let data = [0u8; 8];
        let out = reinsert_vlan(&data, 0x0ABC, true);
        assert!(matches!(out, Cow::Borrowed(_)));
    }
}
