// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Compositor façade owning inputs, avatars and generators.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    AvatarManager, Frame, FrameSink, LayoutSolution, PooledBuffer, SoftFrameGenerator, SoftInput,
    VideoSize, YuvColor,
};

/// Inputs and avatar cache shared with the generators.
///
/// Generators hold an `Arc` of this core, never of the façade, so the
/// façade's drop order (generators first) guarantees the timer threads are
/// joined while everything they reference is still alive.
#[derive(Debug)]
pub(crate) struct CompositorCore {
    max_input: u8,
    inputs: Vec<SoftInput>,
    avatars: AvatarManager,
}

impl CompositorCore {
    pub(crate) fn new(max_input: u8) -> Self {
        Self {
            max_input,
            inputs: (0..max_input).map(|_| SoftInput::new()).collect(),
            avatars: AvatarManager::new(),
        }
    }

    pub(crate) fn get_input(&self, index: u8) -> Option<&SoftInput> {
        self.inputs.get(usize::from(index))
    }

    pub(crate) fn avatars(&self) -> &AvatarManager {
        &self.avatars
    }

    /// Frame for a region without cross-input sync: a plain pop, or the
    /// avatar when the index is inactive.
    pub(crate) fn get_input_frame(&self, index: u8) -> Option<Arc<PooledBuffer>> {
        let input = self.get_input(index)?;
        if input.is_active() {
            input.pop_input()
        } else {
            self.avatars.get_avatar_frame(index)
        }
    }

    /// Frame for a region under cross-input sync.
    ///
    /// Inactive indices fall back to their avatar, desynced inputs to a
    /// plain pop; sync-capable inputs advance to `sync_time_stamp` (`-1`
    /// holds the front).
    pub(crate) fn get_sync_input_frame(
        &self,
        index: u8,
        sync_time_stamp: i64,
    ) -> Option<Arc<PooledBuffer>> {
        let input = self.get_input(index)?;
        if !input.is_active() {
            return self.avatars.get_avatar_frame(index);
        }
        if !input.is_sync_enabled() {
            return input.pop_input();
        }

        input
            .get_sync_frame(sync_time_stamp)
            .map(|frame| frame.buffer)
    }
}

/// Software video compositor.
///
/// Constructs `max_input` input queues, the avatar cache and two frame
/// generators covering the output rates {15, 30, 60} and {6, 12, 24, 48}.
/// All configuration and media calls are routed to the owning component.
#[derive(Debug)]
pub struct SoftVideoCompositor {
    // dropped before `core`: stops and joins both timers first
    generators: Vec<SoftFrameGenerator>,
    core: Arc<CompositorCore>,
}

impl SoftVideoCompositor {
    /// Create the compositor and start both generator timers.
    ///
    /// # Arguments
    ///
    /// - `max_input`: number of input slots, fixed for the lifetime.
    /// - `root_size`: output canvas dimensions, fixed for the lifetime.
    /// - `bg_color`: canvas color where no region paints.
    /// - `crop`: `true` fills each region edge-to-edge from a centered
    ///   source window, `false` letterboxes the full source.
    ///
    /// # Errors
    ///
    /// This can fail if a generator timer thread cannot be spawned.
    pub fn create(
        max_input: u8,
        root_size: VideoSize,
        bg_color: YuvColor,
        crop: bool,
    ) -> Result<Self> {
        info!("create( {max_input}, {root_size}, crop: {crop} )");

        let core = Arc::new(CompositorCore::new(max_input));

        let generators = vec![
            SoftFrameGenerator::start(core.clone(), root_size, bg_color, crop, 60, 15)
                .context("unable to start 60/15 generator")?,
            SoftFrameGenerator::start(core.clone(), root_size, bg_color, crop, 48, 6)
                .context("unable to start 48/6 generator")?,
        ];

        Ok(Self { generators, core })
    }

    /// The canvas size is fixed at construction.
    pub fn update_root_size(&self, root_size: VideoSize) {
        warn!("updateRootSize not supported: {root_size}");
    }

    /// The background color is fixed at construction.
    pub fn update_background_color(&self, bg_color: YuvColor) {
        warn!(
            "updateBackgroundColor not supported: YCbCr({:#x}, {:#x}, {:#x})",
            bg_color.y, bg_color.cb, bg_color.cr
        );
    }

    /// Replace the layout on both generators.
    ///
    /// Entries referring to indices outside `[0, max_input)` are dropped
    /// with a warning; the change becomes visible atomically at each
    /// generator's next composition.
    pub fn update_layout_solution(&self, mut solution: LayoutSolution) {
        let max_input = self.core.max_input;
        let before = solution.len();
        solution.retain(|entry| entry.input < max_input);
        if solution.len() != before {
            warn!(
                "dropped {count} layout entries outside of [0, {max_input})",
                count = before - solution.len()
            );
        }

        for generator in &self.generators {
            generator.update_layout_solution(solution.clone());
        }
    }

    pub fn activate_input(&self, input: u8) -> bool {
        match self.core.get_input(input) {
            Some(soft_input) => {
                soft_input.set_active(true);
                true
            }
            None => {
                warn!("activate_input( {input} ): no such input");
                false
            }
        }
    }

    pub fn deactivate_input(&self, input: u8) {
        match self.core.get_input(input) {
            Some(soft_input) => soft_input.set_active(false),
            None => warn!("deactivate_input( {input} ): no such input"),
        }
    }

    pub fn set_avatar(&self, input: u8, avatar: &str) -> bool {
        if usize::from(input) >= usize::from(self.core.max_input) {
            warn!("set_avatar( {input} ): no such input");
            return false;
        }
        self.core.avatars.set_avatar(input, avatar)
    }

    pub fn unset_avatar(&self, input: u8) -> bool {
        if usize::from(input) >= usize::from(self.core.max_input) {
            warn!("unset_avatar( {input} ): no such input");
            return false;
        }
        self.core.avatars.unset_avatar(input)
    }

    /// Push a decoded frame into one input queue.
    pub fn push_input(&self, input: u8, frame: &Frame) {
        match self.core.get_input(input) {
            Some(soft_input) => soft_input.push_input(frame),
            None => warn!("push_input( {input} ): no such input"),
        }
    }

    /// Register an output; picks the first generator supporting the rate.
    ///
    /// Returns `false` when no generator covers `fps`; nothing is delivered
    /// to `dest` in that case.
    pub fn add_output(&self, width: u32, height: u32, fps: u32, dest: FrameSink) -> bool {
        debug!("add_output, {width}x{height}, fps({fps})");

        for generator in &self.generators {
            if generator.is_supported(width, height, fps) {
                return generator.add_output(width, height, fps, dest);
            }
        }

        error!("can not add output, {width}x{height}, fps({fps})");
        false
    }

    /// Remove a registered output.
    pub fn remove_output(&self, dest: &FrameSink) -> bool {
        debug!("remove_output, {dest:?}");

        for generator in &self.generators {
            if generator.remove_output(dest) {
                return true;
            }
        }

        error!("can not remove output, {dest:?}");
        false
    }

    /// Set and enable the text overlay on both generators.
    pub fn draw_text(&self, text_spec: &str) {
        for generator in &self.generators {
            generator.draw_text(text_spec);
        }
    }

    /// Disable the text overlay on both generators.
    pub fn clear_text(&self) {
        for generator in &self.generators {
            generator.clear_text();
        }
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> &Arc<CompositorCore> {
        &self.core
    }

    #[cfg(test)]
    pub(crate) fn generators(&self) -> &[SoftFrameGenerator] {
        &self.generators
    }
}
