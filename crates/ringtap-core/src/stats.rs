//! Consumer-side capture counters.
//!
//! These count what the consumer saw while walking the ring. Kernel drop
//! counters (`PACKET_STATISTICS`) are read from the socket, not from here.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::header::PacketHeader;

/// Capture statistics tracker
///
/// Counters use relaxed atomics and may be shared between the consumer and a
/// reporting thread.
#[derive(Debug, Default)]
pub struct CaptureStats {
    /// Packets read
    packets: AtomicU64,
    /// Captured bytes read
    bytes: AtomicU64,
    /// Packets with `wire_len > snap_len`
    truncated: AtomicU64,
    /// Packets carrying an out-of-band VLAN tag
    vlan_tagged: AtomicU64,
    /// Slots handed back to the kernel
    slots_released: AtomicU64,
    /// Slots skipped because their header failed validation
    malformed_slots: AtomicU64,
}

impl CaptureStats {
    /// Create new statistics tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one packet of `bytes` captured bytes
    pub fn record_packet(&self, bytes: u64) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a truncated packet
    pub fn record_truncated(&self) {
        self.truncated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a VLAN-tagged packet
    pub fn record_vlan(&self) {
        self.vlan_tagged.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a slot handed back to the kernel
    pub fn record_slot_released(&self) {
        self.slots_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a malformed slot
    pub fn record_malformed(&self) {
        self.malformed_slots.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the packet currently under `header`.
    pub fn observe<H: PacketHeader + ?Sized>(&self, header: &H) {
        self.record_packet(header.snap_len() as u64);
        if header.is_truncated() {
            self.record_truncated();
        }
        if header.vlan_id().is_some() {
            self.record_vlan();
        }
    }

    /// Get statistics snapshot
    #[must_use]
    pub fn snapshot(&self) -> CaptureStatsSnapshot {
        CaptureStatsSnapshot {
            packets: self.packets.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            vlan_tagged: self.vlan_tagged.load(Ordering::Relaxed),
            slots_released: self.slots_released.load(Ordering::Relaxed),
            malformed_slots: self.malformed_slots.load(Ordering::Relaxed),
        }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.packets.store(0, Ordering::Relaxed);
        self.bytes.store(0, Ordering::Relaxed);
        self.truncated.store(0, Ordering::Relaxed);
        self.vlan_tagged.store(0, Ordering::Relaxed);
        self.slots_released.store(0, Ordering::Relaxed);
        self.malformed_slots.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of capture statistics
///
/// Non-atomic copy of statistics for reporting and logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStatsSnapshot {
    /// Packets read
    pub packets: u64,
    /// Captured bytes read
    pub bytes: u64,
    /// Truncated packets
    pub truncated: u64,
    /// VLAN-tagged packets
    pub vlan_tagged: u64,
    /// Slots handed back to the kernel
    pub slots_released: u64,
    /// Malformed slots skipped
    pub malformed_slots: u64,
}
