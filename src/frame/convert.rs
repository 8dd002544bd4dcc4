// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Format-invariant copy of an input frame into a pooled buffer.

use anyhow::{bail, Result};

use super::I420Buffer;

/// Copies a decoded frame into a pool buffer of the same dimensions.
///
/// Kept as its own type so the input queue can normalize whatever plane
/// layout an upstream hands over without knowing about it; today that is a
/// stride-aware plane copy.
#[derive(Debug, Default)]
pub struct FrameConverter;

impl FrameConverter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Copy `src` into `dst`.
    ///
    /// # Errors
    ///
    /// Fails if the dimensions differ; the destination buffer is requested
    /// with the source's dimensions, so a mismatch means the caller raced a
    /// resolution change and the frame is dropped.
    pub fn convert(&self, src: &I420Buffer, dst: &mut I420Buffer) -> Result<()> {
        if src.width() != dst.width() || src.height() != dst.height() {
            bail!(
                "dimension mismatch: {}x{} -> {}x{}",
                src.width(),
                src.height(),
                dst.width(),
                dst.height()
            );
        }

        dst.data_y_mut().copy_from_slice(src.data_y());
        dst.data_u_mut().copy_from_slice(src.data_u());
        dst.data_v_mut().copy_from_slice(src.data_v());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_all_planes() {
        let mut src = I420Buffer::new(16, 8);
        src.data_y_mut().fill(200);
        src.data_u_mut().fill(90);
        src.data_v_mut().fill(240);

        let mut dst = I420Buffer::new(16, 8);
        FrameConverter::new().convert(&src, &mut dst).unwrap();

        assert!(dst.data_y().iter().all(|&p| p == 200));
        assert!(dst.data_u().iter().all(|&p| p == 90));
        assert!(dst.data_v().iter().all(|&p| p == 240));
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let src = I420Buffer::new(16, 8);
        let mut dst = I420Buffer::new(8, 8);
        assert!(FrameConverter::new().convert(&src, &mut dst).is_err());
    }
}
