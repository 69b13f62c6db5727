//! Vector-aligned byte buffers with fallible allocation.

use std::ops::{Deref, DerefMut};

use bytemuck::{Pod, Zeroable};

use crate::errors::{Result, SeqmapError};

/// Alignment, in bytes, of every buffer handed to vectorized scoring code.
pub const VECTOR_WIDTH: usize = 64;

#[repr(C, align(64))]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct VectorLane([u8; VECTOR_WIDTH]);

/// A zero-initialised buffer whose start is aligned to [`VECTOR_WIDTH`].
///
/// The backing storage is a whole number of lanes, so typed views of any
/// `Pod` type up to 64-byte alignment cover the full allocation.
#[derive(Debug, Default)]
pub struct AlignedBuffer {
    lanes: Vec<VectorLane>,
    len: usize,
}

impl AlignedBuffer {
    /// Allocates a buffer of at least `bytes` bytes.
    ///
    /// `context` names the buffer in the error if the allocation fails.
    pub fn with_len(bytes: usize, context: &str) -> Result<Self> {
        let mut buffer = Self::default();
        buffer.grow_to(bytes, context)?;
        Ok(buffer)
    }

    /// Requested length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes actually reserved, a multiple of [`VECTOR_WIDTH`].
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.lanes.len() * VECTOR_WIDTH
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<VectorLane, u8>(&self.lanes)[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<VectorLane, u8>(&mut self.lanes)[..self.len]
    }

    /// The whole allocation viewed as `T`s.
    pub fn as_slice_mut<T: Pod>(&mut self) -> &mut [T] {
        bytemuck::cast_slice_mut(&mut self.lanes)
    }

    /// Grows the buffer to hold `bytes` bytes. Never shrinks; existing contents are kept.
    pub fn grow_to(&mut self, bytes: usize, context: &str) -> Result<()> {
        if bytes <= self.len {
            return Ok(());
        }
        let lanes = bytes.div_ceil(VECTOR_WIDTH);
        if lanes > self.lanes.len() {
            let additional = lanes - self.lanes.len();
            self.lanes
                .try_reserve_exact(additional)
                .map_err(|_| SeqmapError::allocation(lanes.saturating_mul(VECTOR_WIDTH), context))?;
            self.lanes.resize(lanes, VectorLane::zeroed());
        }
        self.len = bytes;
        Ok(())
    }
}

/// Wrapper that starts `T` on its own cache line.
///
/// Each compute thread's scratch sits in one of these so that neighbouring
/// threads never write to the same line.
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(T);

impl<T> CacheAligned<T> {
    #[inline]
    pub const fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for CacheAligned<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

/// Allocates a table of `len` copies of `fill`, reporting failure instead of aborting.
pub fn try_table<T: Clone>(len: usize, fill: T, context: &str) -> Result<Vec<T>> {
    let mut table = Vec::new();
    table
        .try_reserve_exact(len)
        .map_err(|_| SeqmapError::allocation(len.saturating_mul(size_of::<T>()), context))?;
    table.resize(len, fill);
    Ok(table)
}
