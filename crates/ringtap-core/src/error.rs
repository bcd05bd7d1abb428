//! Error types for ring region and header construction.
//!
//! Per-packet accessors never fail. Everything fallible happens when a region,
//! slot or header view is first built over kernel memory.

use thiserror::Error;

/// Errors raised while mapping views onto a capture ring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    /// Region base pointer was null
    #[error("Ring region base address is null")]
    NullRegion,

    /// Address or offset not aligned to the ring alignment
    #[error("Offset {offset:#x} is not aligned to {align} bytes")]
    Misaligned {
        /// Offending offset (or base address)
        offset: usize,
        /// Required alignment
        align: usize,
    },

    /// A structure or byte range would extend past its enclosing slot or region
    #[error("Range {offset:#x}+{len} exceeds limit of {limit} bytes")]
    OutOfBounds {
        /// Start of the range
        offset: usize,
        /// Length of the range
        len: usize,
        /// Size of the enclosing slot or region
        limit: usize,
    },

    /// Ring layout rejected
    #[error("Invalid ring layout: {0}")]
    InvalidLayout(String),

    /// Unknown TPACKET ABI version
    #[error("Unsupported TPACKET version: {0}")]
    UnsupportedVersion(u32),
}
