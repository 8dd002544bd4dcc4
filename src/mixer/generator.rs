// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Timer-driven frame generator.
//!
//! One generator serves a band of frame rates `{min_fps * 2^k}` up to
//! `max_fps` from a single master tick: an output registered at `fps` is
//! delivered every `max_fps / fps` ticks. Composition itself is one pass per
//! tick regardless of how many outputs are due.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};

use super::compositor::CompositorCore;
use super::timer::{JobTimer, TimeoutSink};
use crate::frame::scale::{i420_rect, i420_scale, PixelRect};
use crate::{
    FrameSink, I420Buffer, I420BufferManager, LayoutEntry, LayoutSolution, PooledBuffer, Rect,
    TextDrawer, VideoFrame, VideoSize, YuvColor,
};

/// Buffers available for in-flight composed frames.
const COMPOSITION_POOL_SIZE: usize = 30;

#[cfg(feature = "parallel")]
const MAX_PARALLEL_TASKS: usize = 16;

/// A registered output destination.
#[derive(Debug, Clone)]
pub struct Output {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub dest: FrameSink,
}

#[derive(Debug, Default)]
struct PendingLayout {
    layout: LayoutSolution,
    changed: bool,
}

/// Per-tick state, only ever touched from the timer thread.
#[derive(Debug, Default)]
struct TickState {
    counter: u32,
    layout: LayoutSolution,
}

/// One region's work order: which pixels go where on the canvas.
struct RegionJob {
    buffer: Arc<PooledBuffer>,
    src: PixelRect,
    dst: PixelRect,
}

/// Generator state shared between the timer thread and the configuration
/// API.
pub(crate) struct GeneratorShared {
    owner: Arc<CompositorCore>,
    max_supported_fps: u32,
    min_supported_fps: u32,
    supported_fps: Vec<u32>,
    counter_max: u32,
    size: VideoSize,
    bg_color: YuvColor,
    crop: bool,
    pool: I420BufferManager,
    text_drawer: TextDrawer,
    config: Mutex<PendingLayout>,
    /// Buckets indexed by delivery period minus one.
    outputs: RwLock<Vec<Vec<Output>>>,
    tick: Mutex<TickState>,
}

impl GeneratorShared {
    pub(crate) fn new(
        owner: Arc<CompositorCore>,
        size: VideoSize,
        bg_color: YuvColor,
        crop: bool,
        max_fps: u32,
        min_fps: u32,
    ) -> Self {
        let min_supported_fps = min_fps.max(1);
        let mut max_supported_fps = max_fps.max(min_supported_fps);

        debug!("support fps max({max_supported_fps}), min({min_supported_fps})");

        // The band only works when doubling the minimum lands exactly on the
        // maximum; otherwise fall back to the single low rate.
        let mut fps = min_supported_fps;
        while fps < max_supported_fps {
            fps *= 2;
        }
        if fps != max_supported_fps {
            warn!(
                "invalid fps min({min_supported_fps}), max({max_supported_fps}) \
                 -> min({min_supported_fps}), max({min_supported_fps})"
            );
            max_supported_fps = min_supported_fps;
        }

        let mut supported_fps = Vec::new();
        let mut fps = min_supported_fps;
        while fps <= max_supported_fps {
            supported_fps.push(fps);
            fps *= 2;
        }

        let counter_max = max_supported_fps / min_supported_fps;

        Self {
            owner,
            max_supported_fps,
            min_supported_fps,
            supported_fps,
            counter_max,
            size,
            bg_color,
            crop,
            pool: I420BufferManager::new(COMPOSITION_POOL_SIZE),
            text_drawer: TextDrawer::default(),
            config: Mutex::new(PendingLayout::default()),
            outputs: RwLock::new(vec![Vec::new(); counter_max as usize]),
            tick: Mutex::new(TickState::default()),
        }
    }

    pub(crate) fn max_supported_fps(&self) -> u32 {
        self.max_supported_fps
    }

    pub(crate) fn supported_fps(&self) -> &[u32] {
        &self.supported_fps
    }

    /// `true` when an output at `fps` can be served from this band.
    pub(crate) fn is_supported(&self, _width: u32, _height: u32, fps: u32) -> bool {
        self.supported_fps.contains(&fps)
    }

    pub(crate) fn add_output(
        &self,
        width: u32,
        height: u32,
        fps: u32,
        dest: FrameSink,
    ) -> bool {
        if !self.is_supported(width, height, fps) {
            warn!("unsupported output fps({fps}) for band {min}..{max}",
                min = self.min_supported_fps,
                max = self.max_supported_fps,
            );
            return false;
        }

        let index = (self.max_supported_fps / fps - 1) as usize;
        self.outputs.write()[index].push(Output {
            width,
            height,
            fps,
            dest,
        });
        true
    }

    pub(crate) fn remove_output(&self, dest: &FrameSink) -> bool {
        let mut outputs = self.outputs.write();
        for bucket in outputs.iter_mut() {
            if let Some(position) = bucket
                .iter()
                .position(|output| output.dest.same_destination(dest))
            {
                bucket.remove(position);
                return true;
            }
        }
        false
    }

    pub(crate) fn has_outputs(&self) -> bool {
        self.outputs.read().iter().any(|bucket| !bucket.is_empty())
    }

    /// Stage a layout replacement; it becomes live atomically at the top of
    /// the next composition.
    pub(crate) fn update_layout_solution(&self, solution: LayoutSolution) {
        let mut config = self.config.lock();
        config.layout = solution;
        config.changed = true;
    }

    pub(crate) fn draw_text(&self, spec: &str) {
        self.text_drawer.set_text(spec);
        self.text_drawer.enable(true);
    }

    pub(crate) fn clear_text(&self) {
        self.text_drawer.enable(false);
    }

    fn reconfigure_if_needed(&self, tick: &mut TickState) {
        let mut config = self.config.lock();
        if !config.changed {
            return;
        }
        tick.layout = config.layout.clone();
        config.changed = false;
        drop(config);

        debug!("reconfigure");
    }

    fn compose_tick(&self, tick: &mut TickState) {
        let has_valid_output = {
            let outputs = self.outputs.read();
            outputs
                .iter()
                .enumerate()
                .any(|(i, bucket)| tick.counter % (i as u32 + 1) == 0 && !bucket.is_empty())
        };

        if has_valid_output {
            self.reconfigure_if_needed(tick);

            if let Some(frame) = self.generate_frame(&tick.layout) {
                let outputs = self.outputs.read();
                for (i, bucket) in outputs.iter().enumerate() {
                    if tick.counter % (i as u32 + 1) != 0 {
                        continue;
                    }
                    for output in bucket {
                        trace!(
                            "deliver frame({counter}), fps({fps}), timestamp({ts})",
                            counter = tick.counter,
                            fps = output.fps,
                            ts = frame.time_stamp(),
                        );
                        if !output.dest.deliver(&frame) {
                            trace!("destination gone, frame skipped");
                        }
                    }
                }
            }
        }

        tick.counter = (tick.counter + 1) % self.counter_max;
    }

    fn generate_frame(&self, layout: &[LayoutEntry]) -> Option<VideoFrame> {
        let Some(mut canvas) = self
            .pool
            .get_free_buffer(self.size.width, self.size.height)
        else {
            error!("no valid composite buffer");
            return None;
        };

        i420_rect(&mut canvas, self.bg_color);

        let jobs = self.collect_regions(layout);
        compose_regions(&mut canvas, &jobs);

        self.text_drawer.draw_frame(&mut canvas);

        let timestamp_ms = clock_ms();
        Some(VideoFrame::new(
            Arc::new(canvas),
            (timestamp_ms * 90) as u32,
            timestamp_ms,
        ))
    }

    /// Resolve every region of the layout to a frame and its scale geometry.
    ///
    /// Picks the cross-input sync mode first: the latest front timestamp of
    /// all sync-capable inputs (`min_sync`) against the earliest back
    /// timestamp (`max_sync`) spans the window of frames every such input
    /// can still serve.
    ///
    /// - `max_sync == -1`: nothing is sync-capable, plain pops.
    /// - `min_sync > max_sync`: sync requested but no common timestamp yet;
    ///   show fronts without advancing and wait.
    /// - otherwise: advance every sync-capable input up to `max_sync`.
    fn collect_regions(&self, regions: &[LayoutEntry]) -> Vec<RegionJob> {
        let mut min_sync = -1i64;
        let mut max_sync = -1i64;
        for entry in regions {
            let Some(input) = self.owner.get_input(entry.input) else {
                continue;
            };
            if !input.is_sync_enabled() {
                continue;
            }
            let (Some(front), Some(back)) = (input.front(), input.back()) else {
                continue;
            };

            if min_sync == -1 || min_sync < front.sync_time_stamp {
                min_sync = front.sync_time_stamp;
            }
            if max_sync == -1 || max_sync > back.sync_time_stamp {
                max_sync = back.sync_time_stamp;
            }
        }
        debug!("min_sync {min_sync}, max_sync {max_sync}");

        let mut jobs = Vec::with_capacity(regions.len());
        for entry in regions {
            let buffer = if max_sync == -1 {
                self.owner.get_input_frame(entry.input)
            } else if min_sync > max_sync {
                self.owner.get_sync_input_frame(entry.input, -1)
            } else {
                self.owner.get_sync_input_frame(entry.input, max_sync)
            };
            let Some(buffer) = buffer else {
                continue;
            };

            let input_size = VideoSize::new(buffer.width(), buffer.height());
            let Some((src, dst)) =
                region_geometry(self.size, input_size, entry.region.rect(), self.crop)
            else {
                continue;
            };
            jobs.push(RegionJob { buffer, src, dst });
        }
        jobs
    }
}

impl TimeoutSink for GeneratorShared {
    fn on_timeout(&self) {
        let mut tick = self.tick.lock();
        self.compose_tick(&mut tick);
    }
}

/// Paint all regions onto the canvas in layout order.
#[cfg(not(feature = "parallel"))]
fn compose_regions(canvas: &mut I420Buffer, jobs: &[RegionJob]) {
    for job in jobs {
        if let Err(error) = i420_scale(&job.buffer, job.src, canvas, job.dst) {
            error!("i420 scale failed: {error:#}");
        }
    }
}

/// Paint all regions onto the canvas in layout order.
///
/// The expensive scaling runs concurrently into region-sized staging
/// buffers; the staged pixels are then pasted serially, so the result is
/// pixel-identical to the serial path.
#[cfg(feature = "parallel")]
fn compose_regions(canvas: &mut I420Buffer, jobs: &[RegionJob]) {
    if jobs.len() <= 4 {
        for job in jobs {
            if let Err(error) = i420_scale(&job.buffer, job.src, canvas, job.dst) {
                error!("i420 scale failed: {error:#}");
            }
        }
        return;
    }

    let chunk_size = (jobs.len() + MAX_PARALLEL_TASKS - 1) / MAX_PARALLEL_TASKS;
    let staged: Vec<Vec<(I420Buffer, PixelRect)>> = std::thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|job| {
                            let mut staging = I420Buffer::new(job.dst.width, job.dst.height);
                            let full =
                                PixelRect::new(0, 0, job.dst.width, job.dst.height);
                            if let Err(error) =
                                i420_scale(&job.buffer, job.src, &mut staging, full)
                            {
                                error!("i420 scale failed: {error:#}");
                            }
                            (staging, job.dst)
                        })
                        .collect()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(staged) => staged,
                Err(_) => {
                    error!("composition task panicked");
                    Vec::new()
                }
            })
            .collect()
    });

    for (staging, dst) in staged.into_iter().flatten() {
        let full = PixelRect::new(0, 0, dst.width, dst.height);
        if let Err(error) = i420_scale(&staging, full, canvas, dst) {
            error!("i420 paste failed: {error:#}");
        }
    }
}

/// Map a fractional layout rectangle to pixel source and destination
/// rectangles.
///
/// `crop` fills the destination edge-to-edge from the largest centered
/// source window of matching aspect; letterbox shows the full source inside
/// the largest centered destination window of its aspect. All coordinates
/// are clipped to the canvas and aligned down to even values for the
/// half-resolution chroma planes.
pub(crate) fn region_geometry(
    canvas: VideoSize,
    input: VideoSize,
    rect: &Rect,
    crop: bool,
) -> Option<(PixelRect, PixelRect)> {
    if input.width == 0 || input.height == 0 {
        return None;
    }

    let mut dst_x = rect.left.scale(canvas.width).min(canvas.width);
    let mut dst_y = rect.top.scale(canvas.height).min(canvas.height);
    let dst_width = rect
        .width
        .scale(canvas.width)
        .min(canvas.width - dst_x);
    let dst_height = rect
        .height
        .scale(canvas.height)
        .min(canvas.height - dst_y);
    if dst_width == 0 || dst_height == 0 {
        return None;
    }

    let (src_x, src_y, src_width, src_height, cropped_dst_width, cropped_dst_height) = if crop {
        let src_width = input
            .width
            .min((u64::from(dst_width) * u64::from(input.height) / u64::from(dst_height)) as u32);
        let src_height = input
            .height
            .min((u64::from(dst_height) * u64::from(input.width) / u64::from(dst_width)) as u32);
        (
            (input.width - src_width) / 2,
            (input.height - src_height) / 2,
            src_width,
            src_height,
            dst_width,
            dst_height,
        )
    } else {
        let cropped_dst_width = dst_width
            .min((u64::from(input.width) * u64::from(dst_height) / u64::from(input.height)) as u32);
        let cropped_dst_height = dst_height
            .min((u64::from(input.height) * u64::from(dst_width) / u64::from(input.width)) as u32);
        (
            0,
            0,
            input.width,
            input.height,
            cropped_dst_width,
            cropped_dst_height,
        )
    };

    // center within the layout rectangle
    dst_x += (dst_width - cropped_dst_width) / 2;
    dst_y += (dst_height - cropped_dst_height) / 2;

    // chroma planes are half resolution: everything even
    Some((
        PixelRect::new(src_x & !1, src_y & !1, src_width & !1, src_height & !1),
        PixelRect::new(
            dst_x & !1,
            dst_y & !1,
            cropped_dst_width & !1,
            cropped_dst_height & !1,
        ),
    ))
}

fn clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

/// Timer-driven composer for one frame-rate band.
///
/// Owns its [`JobTimer`]; dropping the generator stops and joins the timer
/// before any shared state goes away, so no destination callback can fire
/// afterwards.
pub struct SoftFrameGenerator {
    timer: JobTimer,
    shared: Arc<GeneratorShared>,
}

impl std::fmt::Debug for SoftFrameGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftFrameGenerator")
            .field("max_fps", &self.shared.max_supported_fps)
            .field("min_fps", &self.shared.min_supported_fps)
            .finish_non_exhaustive()
    }
}

impl SoftFrameGenerator {
    /// Create the generator and start its master tick at `max_fps`.
    ///
    /// # Errors
    ///
    /// This can fail if the timer thread cannot be spawned.
    pub(crate) fn start(
        owner: Arc<CompositorCore>,
        size: VideoSize,
        bg_color: YuvColor,
        crop: bool,
        max_fps: u32,
        min_fps: u32,
    ) -> Result<Self> {
        let shared = Arc::new(GeneratorShared::new(
            owner, size, bg_color, crop, max_fps, min_fps,
        ));
        let timer = JobTimer::start(shared.max_supported_fps(), shared.clone())
            .context("unable to start generator timer")?;

        Ok(Self { timer, shared })
    }

    #[must_use]
    pub fn is_supported(&self, width: u32, height: u32, fps: u32) -> bool {
        self.shared.is_supported(width, height, fps)
    }

    pub fn add_output(&self, width: u32, height: u32, fps: u32, dest: FrameSink) -> bool {
        self.shared.add_output(width, height, fps, dest)
    }

    pub fn remove_output(&self, dest: &FrameSink) -> bool {
        self.shared.remove_output(dest)
    }

    pub fn update_layout_solution(&self, solution: LayoutSolution) {
        self.shared.update_layout_solution(solution);
    }

    pub fn draw_text(&self, spec: &str) {
        self.shared.draw_text(spec);
    }

    pub fn clear_text(&self) {
        self.shared.clear_text();
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<GeneratorShared> {
        &self.shared
    }
}

impl Drop for SoftFrameGenerator {
    fn drop(&mut self) {
        debug!("dropping frame generator");
        self.timer.stop();
        if self.shared.has_outputs() {
            warn!("outputs not empty at generator shutdown");
        }
    }
}
