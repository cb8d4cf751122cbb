// Opens a webcam and hands back frames the overlay can draw on.
// Visual expectation: each `next_frame()` is one fresh live image, packed as
// 0x00RRGGBB, which becomes the base under snow, frost and fireworks.

use crate::error::Error;
use crate::types::FrameBuffer;
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution},
};
use tracing::info;

pub struct CameraCapture {
    cam: Camera,
    width: u32,
    height: u32,
}

impl CameraCapture {
    /// Open camera `index` as close to `width`x`height` @30fps as the device allows.
    pub fn new(index: u32, width: u32, height: u32) -> Result<Self, Error> {
        let fmt = CameraFormat::new(Resolution::new(width, height), FrameFormat::YUYV, 30);
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        let mut cam = Camera::new(CameraIndex::Index(index), req)
            .map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;
        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        // The stream may settle on a different resolution than requested.
        let actual = cam.resolution();
        info!(index, width = actual.width(), height = actual.height(), "camera streaming");
        Ok(Self { cam, width: actual.width(), height: actual.height() })
    }

    /// Block until the next frame and convert it.
    pub fn next_frame(&mut self) -> Result<FrameBuffer, Error> {
        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;
        let rgb = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;
        Ok(FrameBuffer::from_rgb_image(&rgb))
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
