//! Slot status word (`TP_STATUS_*`).
//!
//! The status word is the only synchronization between the kernel and this
//! consumer. The kernel fills a slot and then sets `TP_STATUS_USER`; the
//! consumer reads the slot and then stores `TP_STATUS_KERNEL` (zero). Loads use
//! `Acquire` so packet bytes read afterwards are the ones the kernel published;
//! the clearing store uses `Release` so every read of the slot completes before
//! the kernel may overwrite it.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Status bits of a frame, block or packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TpStatus(u32);

impl TpStatus {
    /// Slot owned by the kernel
    pub const KERNEL: u32 = 0;
    /// Slot owned by userspace
    pub const USER: u32 = 1 << 0;
    /// Packet was copied (too large for a frame)
    pub const COPY: u32 = 1 << 1;
    /// Packets were dropped since the last status read
    pub const LOSING: u32 = 1 << 2;
    /// Checksum not yet computed (offload)
    pub const CSUMNOTREADY: u32 = 1 << 3;
    /// `tp_vlan_tci` holds a valid tag
    pub const VLAN_VALID: u32 = 1 << 4;
    /// Block retired by the block timer
    pub const BLK_TMO: u32 = 1 << 5;
    /// `tp_vlan_tpid` holds a valid protocol id
    pub const VLAN_TPID_VALID: u32 = 1 << 6;
    /// Checksum verified by hardware
    pub const CSUM_VALID: u32 = 1 << 7;
    /// GSO TCP packet
    pub const GSO_TCP: u32 = 1 << 8;
    /// Software timestamp
    pub const TS_SOFTWARE: u32 = 1 << 29;
    /// Raw hardware timestamp
    pub const TS_RAW_HARDWARE: u32 = 1 << 31;

    /// Create empty status (kernel-owned).
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Create from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Get raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check if a specific flag is set.
    #[must_use]
    pub const fn contains(self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    /// Set a flag.
    #[must_use]
    pub const fn with(self, flag: u32) -> Self {
        Self(self.0 | flag)
    }

    /// Clear a flag.
    #[must_use]
    pub const fn without(self, flag: u32) -> Self {
        Self(self.0 & !flag)
    }

    /// Userspace may read the slot.
    #[must_use]
    pub const fn is_user_owned(self) -> bool {
        self.contains(Self::USER)
    }

    /// Fully cleared, i.e. handed back to the kernel.
    #[must_use]
    pub const fn is_kernel_owned(self) -> bool {
        self.0 == Self::KERNEL
    }

    /// Kernel dropped packets before this one.
    #[must_use]
    pub const fn is_losing(self) -> bool {
        self.contains(Self::LOSING)
    }

    /// Out-of-band VLAN TCI is valid.
    #[must_use]
    pub const fn has_vlan(self) -> bool {
        self.contains(Self::VLAN_VALID)
    }

    /// Out-of-band VLAN TPID is valid.
    #[must_use]
    pub const fn has_vlan_tpid(self) -> bool {
        self.contains(Self::VLAN_TPID_VALID)
    }

    /// Block was closed by the retire timer rather than by filling up.
    #[must_use]
    pub const fn is_timed_out(self) -> bool {
        self.contains(Self::BLK_TMO)
    }
}

impl std::fmt::Display for TpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: &[(u32, &str)] = &[
            (TpStatus::USER, "USER"),
            (TpStatus::COPY, "COPY"),
            (TpStatus::LOSING, "LOSING"),
            (TpStatus::CSUMNOTREADY, "CSUMNOTREADY"),
            (TpStatus::VLAN_VALID, "VLAN_VALID"),
            (TpStatus::BLK_TMO, "BLK_TMO"),
            (TpStatus::VLAN_TPID_VALID, "VLAN_TPID_VALID"),
            (TpStatus::CSUM_VALID, "CSUM_VALID"),
            (TpStatus::GSO_TCP, "GSO_TCP"),
            (TpStatus::TS_SOFTWARE, "TS_SOFTWARE"),
            (TpStatus::TS_RAW_HARDWARE, "TS_RAW_HARDWARE"),
        ];

        if self.is_kernel_owned() {
            return f.write_str("KERNEL");
        }

        let mut first = true;
        for &(bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        let unknown = self.0 & !NAMES.iter().fold(0, |acc, &(bit, _)| acc | bit);
        if unknown != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{unknown:#x}")?;
        }
        Ok(())
    }
}

/// Shared status word of a slot.
///
/// `u32` for TPACKET_V2/V3 headers, `unsigned long` for TPACKET_V1.
#[derive(Clone, Copy)]
pub(crate) enum StatusWord<'a> {
    Word(&'a AtomicU32),
    Long(&'a AtomicUsize),
}

impl StatusWord<'_> {
    /// Acquire-load the status bits.
    #[inline]
    pub(crate) fn load(self) -> TpStatus {
        match self {
            // TP_STATUS_* bits all live in the low 32 bits of the V1 word.
            Self::Word(w) => TpStatus::from_bits(w.load(Ordering::Acquire)),
            Self::Long(w) => TpStatus::from_bits(w.load(Ordering::Acquire) as u32),
        }
    }

    /// Release-store `TP_STATUS_KERNEL`, handing the slot back.
    #[inline]
    pub(crate) fn clear(self) {
        match self {
            Self::Word(w) => w.store(TpStatus::KERNEL, Ordering::Release),
            Self::Long(w) => w.store(TpStatus::KERNEL as usize, Ordering::Release),
        }
    }
}

impl std::fmt::Debug for StatusWord<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StatusWord({})", self.load())
    }
}
