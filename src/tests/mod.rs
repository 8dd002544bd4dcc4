// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

mod input;

pub mod testing {

    use std::sync::{Arc, Once};

    use parking_lot::Mutex;

    use crate::mixer::GeneratorShared;
    use crate::{Frame, FrameDestination, I420Buffer, TimeoutSink, VideoFrame, YuvColor};

    /// canvas resolution used by most composition tests
    pub const RESOLUTION: crate::VideoSize = crate::VideoSize::SD;

    pub const RED: YuvColor = YuvColor {
        y: 81,
        cb: 90,
        cr: 240,
    };
    pub const GREEN: YuvColor = YuvColor {
        y: 145,
        cb: 54,
        cr: 34,
    };
    pub const BLUE: YuvColor = YuvColor {
        y: 41,
        cb: 240,
        cr: 110,
    };
    pub const WHITE: YuvColor = YuvColor {
        y: 235,
        cb: 128,
        cr: 128,
    };

    static INIT: Once = Once::new();

    /// initialize for testing
    pub fn init() {
        INIT.call_once(|| {
            env_logger::try_init().ok();
        });
    }

    /// build a uniformly colored I420 buffer
    pub fn solid_buffer(width: u32, height: u32, color: YuvColor) -> Arc<I420Buffer> {
        let mut buffer = I420Buffer::new(width, height);
        let (y, u, v) = buffer.planes_mut();
        y.fill(color.y);
        u.fill(color.cb);
        v.fill(color.cr);
        Arc::new(buffer)
    }

    /// build a colored frame without sync metadata
    pub fn solid_frame(width: u32, height: u32, color: YuvColor, time_stamp: u32) -> Frame {
        Frame::new(solid_buffer(width, height, color), time_stamp)
    }

    /// build a colored frame carrying a sync timestamp
    pub fn sync_frame(
        width: u32,
        height: u32,
        color: YuvColor,
        time_stamp: u32,
        sync_time_stamp: i64,
    ) -> Frame {
        Frame::with_sync(solid_buffer(width, height, color), time_stamp, sync_time_stamp)
    }

    /// write a raw I420 avatar image into the temp directory and return its
    /// path in the `<prefix>.<W>x<H>.<ext>` form the avatar manager parses
    pub fn avatar_file(prefix: &str, width: u32, height: u32, color: YuvColor) -> String {
        let name = format!(
            "{prefix}-{pid}.{width}x{height}.i420",
            pid = std::process::id()
        );
        let path = std::env::temp_dir().join(name);

        let y_len = width as usize * height as usize;
        let c_len = (width / 2) as usize * (height / 2) as usize;
        let mut data = vec![color.y; y_len];
        data.extend(std::iter::repeat(color.cb).take(c_len));
        data.extend(std::iter::repeat(color.cr).take(c_len));
        std::fs::write(&path, data).unwrap();

        path.to_string_lossy().into_owned()
    }

    /// sample the luma plane
    pub fn y_at(buffer: &I420Buffer, x: u32, y: u32) -> u8 {
        buffer.data_y()[y as usize * buffer.stride_y() + x as usize]
    }

    /// sample the Cb plane at full-resolution coordinates
    pub fn u_at(buffer: &I420Buffer, x: u32, y: u32) -> u8 {
        buffer.data_u()[(y / 2) as usize * buffer.stride_u() + (x / 2) as usize]
    }

    /// sample the Cr plane at full-resolution coordinates
    pub fn v_at(buffer: &I420Buffer, x: u32, y: u32) -> u8 {
        buffer.data_v()[(y / 2) as usize * buffer.stride_v() + (x / 2) as usize]
    }

    /// assert one canvas position shows the given color
    pub fn assert_color_at(buffer: &I420Buffer, x: u32, y: u32, color: YuvColor) {
        assert_eq!(y_at(buffer, x, y), color.y, "Y at ({x}, {y})");
        assert_eq!(u_at(buffer, x, y), color.cb, "Cb at ({x}, {y})");
        assert_eq!(v_at(buffer, x, y), color.cr, "Cr at ({x}, {y})");
    }

    /// assert the whole canvas is one color
    pub fn assert_solid(buffer: &I420Buffer, color: YuvColor) {
        assert!(buffer.data_y().iter().all(|&p| p == color.y), "Y plane");
        assert!(buffer.data_u().iter().all(|&p| p == color.cb), "Cb plane");
        assert!(buffer.data_v().iter().all(|&p| p == color.cr), "Cr plane");
    }

    /// destination recording every delivered frame
    #[derive(Default)]
    pub struct CollectSink {
        frames: Mutex<Vec<VideoFrame>>,
    }

    impl CollectSink {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn count(&self) -> usize {
            self.frames.lock().len()
        }

        pub fn frames(&self) -> Vec<VideoFrame> {
            self.frames.lock().clone()
        }

        pub fn last(&self) -> Option<VideoFrame> {
            self.frames.lock().last().cloned()
        }

        /// drop all recorded frames, releasing their buffers
        pub fn clear(&self) {
            self.frames.lock().clear();
        }
    }

    impl FrameDestination for CollectSink {
        fn on_frame(&self, frame: &VideoFrame) {
            self.frames.lock().push(frame.clone());
        }
    }

    /// drive one composition tick by hand
    pub fn tick(generator: &GeneratorShared) {
        generator.on_timeout();
    }

    /// drive several composition ticks by hand
    pub fn tick_n(generator: &GeneratorShared, ticks: usize) {
        for _ in 0..ticks {
            generator.on_timeout();
        }
    }

    /// wait the given amount of milliseconds
    pub fn wait_millis(milliseconds: u64) {
        std::thread::sleep(std::time::Duration::from_millis(milliseconds));
    }
}
