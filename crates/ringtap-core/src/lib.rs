//! # ringtap core
//!
//! Header decoding and frame iteration for Linux `PACKET_MMAP` receive rings.
//!
//! This crate provides:
//! - `#[repr(C)]` mirrors of the TPACKET_V1, TPACKET_V2 and TPACKET_V3 kernel
//!   headers with compile-time layout checks
//! - Bounded, offset-addressed views over a mapped ring region
//! - Zero-copy header views with acquire/release handling of the status word
//! - In-block packet iteration for TPACKET_V3
//! - VLAN tag reinsertion for payloads whose tag was stripped by the NIC
//! - A non-blocking slot walker and consumer-side counters
//!
//! Socket setup, `mmap` and the `poll` loop are left to the caller, which
//! hands this crate a mapped region and the negotiated [`TpacketVersion`].
//!
//! ```no_run
//! use ringtap_core::{PacketHeader, Ring, RingLayout, RingRegion, TpacketVersion};
//!
//! # fn consume(base: *mut u8, len: usize) -> Result<(), ringtap_core::RingError> {
//! // SAFETY: `base` is a live PACKET_RX_RING mapping of `len` bytes.
//! let region = unsafe { RingRegion::from_raw_parts(base, len)? };
//! let mut ring = Ring::new(region, TpacketVersion::V3, RingLayout::new(1 << 20, 64))?;
//!
//! while let Some(mut block) = ring.next_ready() {
//!     loop {
//!         println!("{} bytes on ifindex {}", block.wire_len(), block.interface_index());
//!         if !block.advance() {
//!             break;
//!         }
//!     }
//!     ring.release(block);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Kernel ABI
pub mod abi;
pub mod status;

// Ring memory and header views
pub mod header;
pub mod region;
pub mod ring;

pub mod config;
pub mod error;
pub mod stats;
pub mod vlan;

pub use abi::{TPACKET_ALIGNMENT, TpacketVersion, tpacket_align};
pub use config::CaptureOptions;
pub use error::RingError;
pub use header::{
    BlockV3, CaptureInfo, FrameV1, FrameV2, PacketHeader, RingHeader, release_slot, slot_status,
};
pub use region::{OwnedRegion, RingRegion, SlotRef};
pub use ring::{Ring, RingLayout};
pub use stats::{CaptureStats, CaptureStatsSnapshot};
pub use status::TpStatus;
pub use vlan::reinsert_vlan;

/// Result type for ring operations
pub type Result<T> = std::result::Result<T, RingError>;
