// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Placeholder images substituted for inactive inputs.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;

use crate::{I420Buffer, PooledBuffer};

#[derive(Debug, Default)]
struct AvatarState {
    /// index -> image URL
    inputs: HashMap<u8, String>,
    /// URL -> decoded frame; a failed load is cached as `None` so the region
    /// stays blank until the avatar is set again.
    frames: HashMap<String, Option<Arc<PooledBuffer>>>,
}

/// Lazy cache of decoded avatar images, keyed by URL.
///
/// Images are raw planar I420 files whose dimensions are encoded in the file
/// name as `<prefix>.<W>x<H>.<ext>`. An image is decoded on first use and
/// evicted once no input index references its URL any more.
#[derive(Debug, Default)]
pub struct AvatarManager {
    state: Mutex<AvatarState>,
}

impl AvatarManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `index` to an image URL.
    ///
    /// Rebinding evicts the previous URL's cached frame when this index was
    /// its last referent.
    pub fn set_avatar(&self, index: u8, url: &str) -> bool {
        let mut state = self.state.lock();
        debug!("set_avatar( {index} ) = {url}");

        let Some(old_url) = state.inputs.insert(index, url.to_owned()) else {
            return true;
        };
        if old_url == url {
            return true;
        }

        if !state.inputs.values().any(|other| *other == old_url) {
            state.frames.remove(&old_url);
        }
        true
    }

    /// Remove the binding of `index`, evicting the frame when unreferenced.
    pub fn unset_avatar(&self, index: u8) -> bool {
        let mut state = self.state.lock();
        debug!("unset_avatar( {index} )");

        let Some(url) = state.inputs.remove(&index) else {
            return true;
        };

        if !state.inputs.values().any(|other| *other == url) {
            state.frames.remove(&url);
        }
        true
    }

    /// Look up (and on first use load) the avatar frame of `index`.
    ///
    /// Returns `None` for unbound indices and for images that failed to
    /// parse or load; failures are sticky until `set_avatar` is called again.
    #[must_use]
    pub fn get_avatar_frame(&self, index: u8) -> Option<Arc<PooledBuffer>> {
        let mut state = self.state.lock();

        let Some(url) = state.inputs.get(&index).cloned() else {
            trace!("no avatar bound for index {index}");
            return None;
        };

        if let Some(cached) = state.frames.get(&url) {
            return cached.clone();
        }

        let frame = match load_image(&url) {
            Ok(frame) => Some(frame),
            Err(error) => {
                warn!("unable to load avatar image '{url}': {error:#}");
                None
            }
        };
        state.frames.insert(url, frame.clone());
        frame
    }
}

/// Extract `<W>x<H>` from the first `.<W>x<H>.` run of the URL.
fn image_size(url: &str) -> Result<(u32, u32)> {
    let begin = url.find('.').context("no '.' before image width")?;
    let x = url[begin..]
        .find('x')
        .map(|offset| begin + offset)
        .context("no 'x' between image dimensions")?;
    let width: u32 = url[begin + 1..x]
        .parse()
        .context("invalid image width")?;

    let end = url[x..]
        .find('.')
        .map(|offset| x + offset)
        .context("no '.' after image height")?;
    let height: u32 = url[x + 1..end]
        .parse()
        .context("invalid image height")?;

    trace!("image size in url({url}), {width}x{height}");
    Ok((width, height))
}

fn load_image(url: &str) -> Result<Arc<PooledBuffer>> {
    let (width, height) = image_size(url)?;

    let data = std::fs::read(url).with_context(|| format!("unable to read '{url}'"))?;

    let expected = (width as usize * height as usize * 3 + 1) / 2;
    if data.len() != expected {
        bail!(
            "invalid size {actual}, expected size {expected}",
            actual = data.len()
        );
    }

    let y_len = width as usize * height as usize;
    let c_len = (width / 2) as usize * (height / 2) as usize;
    let buffer = I420Buffer::from_planes(
        width,
        height,
        &data[..y_len],
        &data[y_len..y_len + c_len],
        &data[y_len + c_len..y_len + 2 * c_len],
    )
    .context("plane layout does not match image dimensions")?;

    Ok(PooledBuffer::detached(buffer))
}
