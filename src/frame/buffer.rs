// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Planar I420 storage and the bounded buffer pool.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Owned planar I420 image.
///
/// Y at full resolution, U and V at half resolution in both dimensions.
/// Chroma planes start out neutral so a fresh buffer renders grey-free black
/// once the Y plane is written.
#[derive(Debug, Default, Clone)]
pub struct I420Buffer {
    width: u32,
    height: u32,
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
}

impl I420Buffer {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let stride_y = width as usize;
        let stride_c = (width / 2) as usize;
        Self {
            width,
            height,
            y: vec![16u8; stride_y * height as usize],
            u: vec![128u8; stride_c * (height / 2) as usize],
            v: vec![128u8; stride_c * (height / 2) as usize],
        }
    }

    /// Build a buffer from contiguous plane data.
    ///
    /// Plane lengths must match the I420 rule for the given dimensions.
    pub fn from_planes(width: u32, height: u32, y: &[u8], u: &[u8], v: &[u8]) -> Option<Self> {
        let y_len = width as usize * height as usize;
        let c_len = (width / 2) as usize * (height / 2) as usize;
        if y.len() != y_len || u.len() != c_len || v.len() != c_len {
            return None;
        }
        Some(Self {
            width,
            height,
            y: y.to_vec(),
            u: u.to_vec(),
            v: v.to_vec(),
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn stride_y(&self) -> usize {
        self.width as usize
    }

    #[must_use]
    pub fn stride_u(&self) -> usize {
        (self.width / 2) as usize
    }

    #[must_use]
    pub fn stride_v(&self) -> usize {
        (self.width / 2) as usize
    }

    #[must_use]
    pub fn data_y(&self) -> &[u8] {
        &self.y
    }

    #[must_use]
    pub fn data_u(&self) -> &[u8] {
        &self.u
    }

    #[must_use]
    pub fn data_v(&self) -> &[u8] {
        &self.v
    }

    pub fn data_y_mut(&mut self) -> &mut [u8] {
        &mut self.y
    }

    pub fn data_u_mut(&mut self) -> &mut [u8] {
        &mut self.u
    }

    pub fn data_v_mut(&mut self) -> &mut [u8] {
        &mut self.v
    }

    /// Mutable access to all three planes at once.
    pub fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        (&mut self.y, &mut self.u, &mut self.v)
    }
}

/// Pool handle around an [`I420Buffer`].
///
/// When the last `Arc<PooledBuffer>` clone drops, the storage is pushed back
/// onto the owning pool's free list. Handles created with
/// [`PooledBuffer::detached`] simply free their storage.
#[derive(Debug)]
pub struct PooledBuffer {
    data: I420Buffer,
    pool: Option<Weak<PoolShared>>,
}

impl PooledBuffer {
    /// Wrap storage that belongs to no pool.
    #[must_use]
    pub fn detached(data: I420Buffer) -> Arc<Self> {
        Arc::new(Self { data, pool: None })
    }
}

impl Deref for PooledBuffer {
    type Target = I420Buffer;

    fn deref(&self) -> &I420Buffer {
        &self.data
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut I420Buffer {
        &mut self.data
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.as_ref().and_then(Weak::upgrade) {
            pool.put_back(std::mem::take(&mut self.data));
        }
    }
}

#[derive(Debug, Default)]
struct PoolState {
    free: Vec<I420Buffer>,
    checked_out: usize,
}

#[derive(Debug)]
struct PoolShared {
    capacity: usize,
    state: Mutex<PoolState>,
}

impl PoolShared {
    fn put_back(&self, data: I420Buffer) {
        let mut state = self.state.lock();
        state.checked_out = state.checked_out.saturating_sub(1);
        state.free.push(data);
    }
}

/// Bounded pool of reusable I420 buffers.
///
/// `get_free_buffer` hands out at most `capacity` buffers at a time and never
/// blocks; an exhausted pool reports `None` and the caller drops that frame.
#[derive(Debug, Clone)]
pub struct I420BufferManager {
    shared: Arc<PoolShared>,
}

impl I420BufferManager {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                capacity,
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    /// Take a buffer of exactly the requested dimensions.
    ///
    /// Free buffers of any other size are discarded on the spot, so a
    /// dimension change drains the stale generation instead of serving it.
    /// Returns `None` when all buffers are checked out. Contents of a reused
    /// buffer are unspecified; callers overwrite every plane.
    #[must_use]
    pub fn get_free_buffer(&self, width: u32, height: u32) -> Option<PooledBuffer> {
        let mut state = self.shared.state.lock();
        state
            .free
            .retain(|b| b.width() == width && b.height() == height);

        let data = if let Some(data) = state.free.pop() {
            data
        } else if state.free.len() + state.checked_out < self.shared.capacity {
            I420Buffer::new(width, height)
        } else {
            return None;
        };

        state.checked_out += 1;
        Some(PooledBuffer {
            data,
            pool: Some(Arc::downgrade(&self.shared)),
        })
    }

    /// Number of buffers currently handed out.
    #[must_use]
    pub fn checked_out(&self) -> usize {
        self.shared.state.lock().checked_out
    }

    /// Number of buffers resting on the free list.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.shared.state.lock().free.len()
    }
}
