//! Bounded views over a mapped capture ring.
//!
//! The ring is treated as an arena addressed by byte offsets. [`RingRegion`]
//! covers the whole mapping, [`SlotRef`] one frame or block inside it. Every
//! structure read out of the ring goes through [`SlotRef`], which checks the
//! requested range against the slot before touching memory. This is the only
//! place in the crate that dereferences ring memory.

use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::atomic::{AtomicU32, AtomicUsize};

use crate::abi::{KernelAbi, TPACKET_ALIGNMENT};
use crate::error::RingError;

/// A mapped ring region shared with the kernel.
///
/// The region does not own its memory; it is valid for `'a`.
#[derive(Debug, Clone, Copy)]
pub struct RingRegion<'a> {
    base: NonNull<u8>,
    len: usize,
    _marker: PhantomData<&'a [u8]>,
}

impl<'a> RingRegion<'a> {
    /// Wrap a raw mapping, typically the address returned by `mmap` on a
    /// `PACKET_RX_RING` socket.
    ///
    /// # Errors
    ///
    /// Returns `RingError::NullRegion` for a null base and
    /// `RingError::Misaligned` if the base is not aligned to `TPACKET_ALIGNMENT`.
    ///
    /// # Safety
    ///
    /// `base` must point to `len` readable and writable bytes that stay mapped
    /// for `'a`. Only the kernel and the views built from this region may
    /// access it while it is in use.
    pub unsafe fn from_raw_parts(base: *mut u8, len: usize) -> Result<Self, RingError> {
        let base = NonNull::new(base).ok_or(RingError::NullRegion)?;
        Self::checked(base, len)
    }

    /// Wrap an in-process buffer, e.g. a ring snapshot being replayed.
    ///
    /// # Errors
    ///
    /// Returns `RingError::Misaligned` if the buffer start is not aligned to
    /// `TPACKET_ALIGNMENT`.
    pub fn from_slice(buf: &'a mut [u8]) -> Result<Self, RingError> {
        let len = buf.len();
        Self::checked(NonNull::from(buf).cast::<u8>(), len)
    }

    fn checked(base: NonNull<u8>, len: usize) -> Result<Self, RingError> {
        let addr = base.as_ptr() as usize;
        if addr % TPACKET_ALIGNMENT != 0 {
            return Err(RingError::Misaligned {
                offset: addr,
                align: TPACKET_ALIGNMENT,
            });
        }
        Ok(Self {
            base,
            len,
            _marker: PhantomData,
        })
    }

    /// Region size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the region is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrow `len` bytes starting at `offset` as one ring slot.
    ///
    /// # Errors
    ///
    /// Returns `RingError::Misaligned` if `offset` is not a multiple of
    /// `TPACKET_ALIGNMENT`, `RingError::OutOfBounds` if the slot extends past
    /// the region.
    pub fn slot(&self, offset: usize, len: usize) -> Result<SlotRef<'a>, RingError> {
        if offset % TPACKET_ALIGNMENT != 0 {
            return Err(RingError::Misaligned {
                offset,
                align: TPACKET_ALIGNMENT,
            });
        }
        match offset.checked_add(len) {
            Some(end) if end <= self.len => {}
            _ => {
                return Err(RingError::OutOfBounds {
                    offset,
                    len,
                    limit: self.len,
                });
            }
        }

        Ok(SlotRef {
            // SAFETY: offset + len <= self.len, so the pointer stays inside the region.
            base: unsafe { self.base.add(offset) },
            len,
            region_offset: offset,
            _marker: PhantomData,
        })
    }
}

/// One frame or block inside a [`RingRegion`].
///
/// A slot only carries bounds. Its bytes are reachable through a header view,
/// whose borrows end before [`release`](crate::PacketHeader::release):
///
/// ```compile_fail
/// use ringtap_core::OwnedRegion;
///
/// let mut owned = OwnedRegion::zeroed(64);
/// let region = owned.region();
/// let slot = region.slot(0, 64).unwrap();
/// let held = slot.bytes(0, 4).unwrap();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SlotRef<'a> {
    base: NonNull<u8>,
    len: usize,
    region_offset: usize,
    _marker: PhantomData<&'a [u8]>,
}

impl<'a> SlotRef<'a> {
    /// Slot size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the slot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of this slot within its region.
    #[must_use]
    pub fn region_offset(&self) -> usize {
        self.region_offset
    }

    /// Verify that `len` bytes at `offset` lie inside the slot.
    ///
    /// # Errors
    ///
    /// Returns `RingError::OutOfBounds` otherwise.
    #[inline]
    pub fn check(&self, offset: usize, len: usize) -> Result<(), RingError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(RingError::OutOfBounds {
                offset,
                len,
                limit: self.len,
            }),
        }
    }

    /// Copy a kernel structure out of the slot.
    ///
    /// # Errors
    ///
    /// Returns `RingError::OutOfBounds` if the structure does not fit.
    #[inline]
    pub(crate) fn read<T: KernelAbi>(&self, offset: usize) -> Result<T, RingError> {
        self.check(offset, size_of::<T>())?;
        // SAFETY: the range was checked above and `T: KernelAbi` accepts any
        // bit pattern. Unaligned reads tolerate kernel-chosen packet offsets.
        Ok(unsafe { ptr::read_unaligned(self.base.as_ptr().add(offset).cast::<T>()) })
    }

    /// Borrow `len` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `RingError::OutOfBounds` if the range does not fit.
    #[inline]
    pub(crate) fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], RingError> {
        self.check(offset, len)?;
        // SAFETY: the range was checked above; the memory lives for 'a and
        // the kernel does not write to a user-owned slot.
        Ok(unsafe { slice::from_raw_parts(self.base.as_ptr().add(offset), len) })
    }

    pub(crate) fn status_u32(&self, offset: usize) -> Result<&'a AtomicU32, RingError> {
        self.atomic::<AtomicU32>(offset)
    }

    pub(crate) fn status_ulong(&self, offset: usize) -> Result<&'a AtomicUsize, RingError> {
        self.atomic::<AtomicUsize>(offset)
    }

    fn atomic<A>(&self, offset: usize) -> Result<&'a A, RingError> {
        self.check(offset, size_of::<A>())?;
        let ptr = self.base.as_ptr().wrapping_add(offset);
        if (ptr as usize) % align_of::<A>() != 0 {
            return Err(RingError::Misaligned {
                offset: self.region_offset + offset,
                align: align_of::<A>(),
            });
        }
        // SAFETY: in bounds and aligned for `A`; the atomic types share the
        // layout of the integers the kernel stores there, and the status word
        // is only ever accessed atomically by this crate.
        Ok(unsafe { &*ptr.cast::<A>() })
    }
}

#[repr(C, align(16))]
#[derive(Clone, Copy)]
struct Chunk([u8; TPACKET_ALIGNMENT]);

const _: () = assert!(align_of::<Chunk>() == TPACKET_ALIGNMENT);

/// Heap buffer aligned like a kernel ring mapping.
///
/// Used to replay ring snapshots captured to disk and to build synthetic
/// rings.
#[derive(Clone)]
pub struct OwnedRegion {
    chunks: Vec<Chunk>,
    len: usize,
}

impl OwnedRegion {
    /// Allocate `len` zeroed bytes.
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        Self {
            chunks: vec![Chunk([0; TPACKET_ALIGNMENT]); len.div_ceil(TPACKET_ALIGNMENT)],
            len,
        }
    }

    /// Copy `bytes` into a freshly aligned buffer.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut owned = Self::zeroed(bytes.len());
        owned.as_bytes_mut().copy_from_slice(bytes);
        owned
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Contents as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `chunks` holds at least `len` initialized bytes.
        unsafe { slice::from_raw_parts(self.chunks.as_ptr().cast::<u8>(), self.len) }
    }

    /// Contents as mutable bytes.
    #[must_use]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: `chunks` holds at least `len` initialized bytes, borrowed mutably.
        unsafe { slice::from_raw_parts_mut(self.chunks.as_mut_ptr().cast::<u8>(), self.len) }
    }

    /// View the buffer as a ring region.
    #[must_use]
    pub fn region(&mut self) -> RingRegion<'_> {
        RingRegion {
            base: NonNull::from(self.as_bytes_mut()).cast::<u8>(),
            len: self.len,
            _marker: PhantomData,
        }
    }
}

impl std::fmt::Debug for OwnedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedRegion").field("len", &self.len).finish()
    }
}
