// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Text overlay drawn onto every composed canvas.
//!
//! Glyph rendering is delegated to an [`OverlayRenderer`] collaborator; this
//! module only manages the overlay text and its enabled state. The built-in
//! [`BandRenderer`] is a placeholder that shades a caption band, enough for
//! composition tests and headless deployments.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::I420Buffer;

/// Collaborator that paints an overlay spec onto a canvas.
///
/// The spec string's syntax is the renderer's business; the compositor hands
/// it through untouched.
pub trait OverlayRenderer: Send + Sync {
    fn render(&self, spec: &str, canvas: &mut I420Buffer);
}

#[derive(Debug, Default)]
struct TextState {
    spec: String,
    enabled: bool,
}

/// Holds the overlay text and invokes the renderer once per composed frame.
pub struct TextDrawer {
    renderer: Arc<dyn OverlayRenderer>,
    state: Mutex<TextState>,
}

impl TextDrawer {
    #[must_use]
    pub fn new(renderer: Arc<dyn OverlayRenderer>) -> Self {
        Self {
            renderer,
            state: Mutex::new(TextState::default()),
        }
    }

    /// Replace the overlay text. Drawing still requires [`TextDrawer::enable`].
    pub fn set_text(&self, spec: &str) {
        trace!("set_text( '{spec}' )");
        self.state.lock().spec = spec.to_owned();
    }

    pub fn enable(&self, enabled: bool) {
        self.state.lock().enabled = enabled;
    }

    /// Draw onto the finished canvas; no-op while disabled or empty.
    pub fn draw_frame(&self, canvas: &mut I420Buffer) {
        let state = self.state.lock();
        if !state.enabled || state.spec.is_empty() {
            return;
        }
        self.renderer.render(&state.spec, canvas);
    }
}

impl Default for TextDrawer {
    fn default() -> Self {
        Self::new(Arc::new(BandRenderer))
    }
}

impl std::fmt::Debug for TextDrawer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TextDrawer")
            .field("spec", &state.spec)
            .field("enabled", &state.enabled)
            .finish()
    }
}

/// Placeholder renderer: shades a caption band along the bottom edge, wide
/// enough to hint at the text length.
pub struct BandRenderer;

const BAND_FRACTION: u32 = 10;

impl OverlayRenderer for BandRenderer {
    fn render(&self, spec: &str, canvas: &mut I420Buffer) {
        let width = canvas.width();
        let height = canvas.height();
        if width == 0 || height == 0 {
            return;
        }

        let band_height = (height / BAND_FRACTION).max(2) & !1;
        let top = height - band_height;

        // Eight luma pixels per character, capped at the canvas width.
        let band_width = (spec.chars().count() as u32 * 8).min(width).max(2) & !1;

        let stride = canvas.stride_y();
        let y_plane = canvas.data_y_mut();
        for row in top..height {
            let line = row as usize * stride;
            for col in 0..band_width {
                let px = &mut y_plane[line + col as usize];
                *px = (*px / 4).saturating_add(32);
            }
        }
    }
}
