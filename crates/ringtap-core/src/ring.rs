//! Ring slot walker.
//!
//! A receive ring is `slot_count` equally sized slots (frames for
//! TPACKET_V1/V2, blocks for TPACKET_V3) laid out back to back. The kernel
//! fills them in order, so the consumer only ever needs to probe the slot at
//! its current index.

use serde::{Deserialize, Serialize};

use crate::abi::{TPACKET_ALIGNMENT, TpacketVersion};
use crate::error::RingError;
use crate::header::{PacketHeader, RingHeader, release_slot, slot_status};
use crate::region::{RingRegion, SlotRef};
use crate::stats::CaptureStats;

/// Geometry of a receive ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingLayout {
    /// Bytes per slot (`tp_frame_size` or `tp_block_size`)
    pub slot_size: usize,
    /// Number of slots
    pub slot_count: usize,
}

impl Default for RingLayout {
    fn default() -> Self {
        Self {
            slot_size: 4096,
            slot_count: 64,
        }
    }
}

impl RingLayout {
    /// Create a layout.
    #[must_use]
    pub const fn new(slot_size: usize, slot_count: usize) -> Self {
        Self {
            slot_size,
            slot_count,
        }
    }

    /// Total bytes covered by the ring.
    ///
    /// # Errors
    ///
    /// Returns `RingError::InvalidLayout` if the size overflows.
    pub fn total_len(&self) -> Result<usize, RingError> {
        self.slot_size
            .checked_mul(self.slot_count)
            .ok_or_else(|| RingError::InvalidLayout("ring size overflows usize".into()))
    }

    /// Validate the layout for `version`.
    ///
    /// # Errors
    ///
    /// Returns `RingError::InvalidLayout` describing the first violated rule.
    pub fn validate(&self, version: TpacketVersion) -> Result<(), RingError> {
        if self.slot_count == 0 {
            return Err(RingError::InvalidLayout("slot_count must be > 0".into()));
        }

        if self.slot_size % TPACKET_ALIGNMENT != 0 {
            return Err(RingError::InvalidLayout(format!(
                "slot_size must be a multiple of {TPACKET_ALIGNMENT}"
            )));
        }

        let min = version.min_slot_len();
        if self.slot_size < min {
            return Err(RingError::InvalidLayout(format!(
                "slot_size must be >= {min} for {version}"
            )));
        }

        self.total_len()?;
        Ok(())
    }
}

/// Consumer side of a mapped receive ring.
#[derive(Debug)]
pub struct Ring<'a> {
    region: RingRegion<'a>,
    version: TpacketVersion,
    layout: RingLayout,
    /// Index of the next slot to probe
    next: usize,
    stats: CaptureStats,
}

impl<'a> Ring<'a> {
    /// Wrap `region` as a ring of `layout` slots holding `version` headers.
    ///
    /// # Errors
    ///
    /// Returns `RingError::InvalidLayout` if the layout is invalid or does not
    /// fit in the region.
    pub fn new(
        region: RingRegion<'a>,
        version: TpacketVersion,
        layout: RingLayout,
    ) -> Result<Self, RingError> {
        layout.validate(version)?;

        let total = layout.total_len()?;
        if total > region.len() {
            return Err(RingError::InvalidLayout(format!(
                "{} slots of {} bytes exceed region of {} bytes",
                layout.slot_count,
                layout.slot_size,
                region.len()
            )));
        }

        tracing::debug!(
            version = %version,
            slot_size = layout.slot_size,
            slot_count = layout.slot_count,
            "Ring attached"
        );

        Ok(Self {
            region,
            version,
            layout,
            next: 0,
            stats: CaptureStats::new(),
        })
    }

    /// Negotiated header generation.
    #[must_use]
    pub fn version(&self) -> TpacketVersion {
        self.version
    }

    /// Ring geometry.
    #[must_use]
    pub fn layout(&self) -> RingLayout {
        self.layout
    }

    /// Index of the slot [`next_ready`](Self::next_ready) probes next.
    #[must_use]
    pub fn position(&self) -> usize {
        self.next
    }

    /// Move the probe index to slot `idx` (modulo the slot count).
    pub fn seek(&mut self, idx: usize) {
        self.next = idx % self.layout.slot_count;
    }

    /// Consumer counters.
    #[must_use]
    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Bounded view of slot `idx`.
    ///
    /// # Errors
    ///
    /// Returns `RingError::OutOfBounds` if `idx >= slot_count`.
    pub fn slot(&self, idx: usize) -> Result<SlotRef<'a>, RingError> {
        if idx >= self.layout.slot_count {
            return Err(RingError::OutOfBounds {
                offset: idx,
                len: 1,
                limit: self.layout.slot_count,
            });
        }
        self.region
            .slot(idx * self.layout.slot_size, self.layout.slot_size)
    }

    /// Decode the slot at the current index if the kernel handed it over.
    ///
    /// Never blocks. Returns `None` when the current slot is still owned by
    /// the kernel. Slots whose header fails validation are handed back and
    /// skipped; at most one full turn of the ring is probed per call.
    pub fn next_ready(&mut self) -> Option<RingHeader<'a>> {
        for _ in 0..self.layout.slot_count {
            let idx = self.next;
            let slot = self.slot(idx).ok()?;

            let status = slot_status(self.version, &slot).ok()?;
            if !status.is_user_owned() {
                return None;
            }

            self.next = (idx + 1) % self.layout.slot_count;

            match RingHeader::new(self.version, slot) {
                Ok(header) => return Some(header),
                Err(e) => {
                    tracing::warn!(
                        slot = idx,
                        version = %self.version,
                        error = %e,
                        "Malformed slot handed back to kernel"
                    );
                    if release_slot(self.version, &slot).is_ok() {
                        self.stats.record_slot_released();
                    }
                    self.stats.record_malformed();
                }
            }
        }
        None
    }

    /// Release `header` back to the kernel and count it.
    pub fn release(&self, header: RingHeader<'a>) {
        header.release();
        self.stats.record_slot_released();
    }
}
