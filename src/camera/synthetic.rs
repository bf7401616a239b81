//! Synthetic JPEG source
//!
//! Renders a scrolling colour gradient per frame; useful for running the
//! server on hardware without a sensor.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use super::{CameraError, Frame, FrameSource};
use crate::config::CameraConfig;

pub struct SyntheticSource {
    width: u32,
    height: u32,
    quality: u8,
    sequence: AtomicU64,
}

impl SyntheticSource {
    pub fn new(config: &CameraConfig) -> Result<Self, CameraError> {
        if config.width == 0 || config.height == 0 {
            return Err(CameraError::Device(format!(
                "invalid synthetic frame size {}x{}",
                config.width, config.height
            )));
        }
        Ok(Self {
            width: config.width,
            height: config.height,
            quality: config.quality.clamp(1, 100),
            sequence: AtomicU64::new(0),
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn render(&self, sequence: u64) -> Result<Bytes, CameraError> {
        let (w, h) = (self.width, self.height);
        let shift = (sequence.wrapping_mul(4) % u64::from(w)) as u32;
        let blue = (sequence & 0xff) as u8;
        let img = RgbImage::from_fn(w, h, |x, y| {
            Rgb([
                (((x + shift) % w) * 255 / w) as u8,
                (y * 255 / h) as u8,
                blue,
            ])
        });

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode_image(&img)
            .map_err(|e| CameraError::Encode(e.to_string()))?;
        Ok(Bytes::from(out))
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn capture(&self) -> Result<Frame, CameraError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let data = self.render(sequence)?;
        Ok(Frame::new(data, sequence))
    }
}
