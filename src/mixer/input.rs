// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Bounded, synchronized per-participant input queue.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Frame, FrameConverter, FrameFormat, I420BufferManager, PooledBuffer};

/// Maximum frames a single input buffers before it is considered out of
/// phase.
pub const MAX_QUEUE_SIZE: usize = 5;

/// A queued input frame: pooled pixels plus its timestamps.
#[derive(Debug, Clone)]
pub struct SoftInputFrame {
    pub buffer: Arc<PooledBuffer>,
    /// Presentation timestamp in 90 kHz units.
    pub time_stamp: u32,
    pub sync_enabled: bool,
    pub sync_time_stamp: i64,
}

#[derive(Debug)]
struct InputState {
    active: bool,
    /// Input-level sync permission; revoked for good on queue overflow.
    sync_enabled: bool,
    /// Sync bit of the most recently pushed frame.
    frame_sync_enabled: bool,
    queue: VecDeque<SoftInputFrame>,
}

/// One participant's frame queue.
///
/// Frames are copied into a private buffer pool on push so the upstream can
/// recycle its payload immediately. The queue holds at most
/// [`MAX_QUEUE_SIZE`] frames; a full queue clears itself and permanently
/// demotes the input to unsynchronized mode, because that much backlog means
/// cross-stream sync can only stall the mix.
#[derive(Debug)]
pub struct SoftInput {
    state: Mutex<InputState>,
    pool: I420BufferManager,
    converter: FrameConverter,
}

impl Default for SoftInput {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftInput {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InputState {
                active: false,
                sync_enabled: true,
                frame_sync_enabled: false,
                queue: VecDeque::new(),
            }),
            pool: I420BufferManager::new(MAX_QUEUE_SIZE),
            converter: FrameConverter::new(),
        }
    }

    /// Activate or deactivate the input; deactivation drops queued frames.
    pub fn set_active(&self, active: bool) {
        let mut state = self.state.lock();
        state.active = active;
        if !state.active {
            state.queue.clear();
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Enqueue a decoded frame.
    ///
    /// Non-I420 frames and pushes to an inactive input are dropped. The lock
    /// is released across the pixel copy so readers are not held up by it.
    pub fn push_input(&self, frame: &Frame) {
        if frame.format != FrameFormat::I420 {
            warn!("dropping frame with format {:?}", frame.format);
            return;
        }

        {
            let mut state = self.state.lock();
            if !state.active {
                return;
            }

            if state.queue.len() == MAX_QUEUE_SIZE {
                warn!("input frame queue is full ({MAX_QUEUE_SIZE}), disable sync");

                // A full queue means this input is too far out of phase for
                // cross-stream sync to ever catch up.
                state.queue.clear();
                state.sync_enabled = false;
            }
        }

        let Some(mut buffer) = self
            .pool
            .get_free_buffer(frame.buffer.width(), frame.buffer.height())
        else {
            warn!("no free buffer");
            return;
        };

        if let Err(error) = self.converter.convert(&frame.buffer, &mut buffer) {
            error!("frame conversion failed: {error:#}");
            return;
        }

        let mut state = self.state.lock();
        if state.active {
            state.frame_sync_enabled = frame.sync_enabled;
            if !state.sync_enabled || !state.frame_sync_enabled {
                // Without sync only the newest frame matters.
                state.queue.clear();
            }

            state.queue.push_back(SoftInputFrame {
                buffer: Arc::new(buffer),
                time_stamp: frame.time_stamp,
                sync_enabled: frame.sync_enabled,
                sync_time_stamp: frame.sync_time_stamp,
            });
        }
    }

    /// Take the front frame's pixels.
    ///
    /// The last remaining frame is handed out but kept queued: it is the
    /// participant's current still image and removing it would paint the
    /// region black whenever the upstream pauses.
    #[must_use]
    pub fn pop_input(&self) -> Option<Arc<PooledBuffer>> {
        let mut state = self.state.lock();

        if !state.active {
            return None;
        }

        let front = state.queue.front()?.buffer.clone();
        if state.queue.len() > 1 {
            state.queue.pop_front();
        }

        Some(front)
    }

    #[must_use]
    pub fn front(&self) -> Option<SoftInputFrame> {
        let state = self.state.lock();
        if !state.active {
            return None;
        }
        state.queue.front().cloned()
    }

    #[must_use]
    pub fn back(&self) -> Option<SoftInputFrame> {
        let state = self.state.lock();
        if !state.active {
            return None;
        }
        state.queue.back().cloned()
    }

    /// Advance to the first frame at or past `sync_time_stamp` and return it.
    ///
    /// The sentinel `-1` returns the front without advancing. The queue never
    /// drops below one frame, preserving the still-image behavior under
    /// sync-driven advance.
    #[must_use]
    pub fn get_sync_frame(&self, sync_time_stamp: i64) -> Option<SoftInputFrame> {
        let mut state = self.state.lock();

        if !state.active || state.queue.is_empty() {
            return None;
        }

        if sync_time_stamp == -1 {
            return state.queue.front().cloned();
        }

        while state.queue.len() > 1 {
            match state.queue.front() {
                Some(front) if front.sync_time_stamp < sync_time_stamp => {
                    state.queue.pop_front();
                }
                _ => break,
            }
        }

        let front = state.queue.front().cloned();
        if let Some(frame) = &front {
            debug!("get sync frame {}", frame.sync_time_stamp);
        }
        front
    }

    /// `true` only when both the input and its latest frame carry sync.
    #[must_use]
    pub fn is_sync_enabled(&self) -> bool {
        let state = self.state.lock();
        state.sync_enabled && state.frame_sync_enabled
    }

    #[cfg(test)]
    pub(crate) fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }
}
