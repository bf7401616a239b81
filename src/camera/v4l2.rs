//! V4L2 capture source
//!
//! Requests MJPG from the device so frames come out of the driver already
//! JPEG-encoded; each dequeued buffer is copied into `Bytes` before the
//! driver buffer is requeued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::{CameraError, Frame, FrameSource};
use crate::config::CameraConfig;

pub struct V4l2Source {
    _device: Device,
    stream: Mutex<MmapStream<'static>>,
    sequence: AtomicU64,
}

impl V4l2Source {
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let device = Device::with_path(&config.device)?;

        let caps = device.query_caps()?;
        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(CameraError::Device(format!(
                "{} ({}) does not support video capture",
                caps.card, config.device
            )));
        }

        let mjpg = FourCC::new(b"MJPG");
        let mut fmt = device.format()?;
        fmt.fourcc = mjpg;
        let fmt = device.set_format(&fmt)?;
        if fmt.fourcc != mjpg {
            return Err(CameraError::Device(format!(
                "{} does not deliver MJPG (got {})",
                config.device, fmt.fourcc
            )));
        }

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, config.buffer_count)?;

        Ok(Self {
            _device: device,
            stream: Mutex::new(stream),
            sequence: AtomicU64::new(0),
        })
    }
}

impl FrameSource for V4l2Source {
    fn name(&self) -> &str {
        "v4l2"
    }

    fn capture(&self) -> Result<Frame, CameraError> {
        let mut stream = self
            .stream
            .lock()
            .map_err(|_| CameraError::Device("capture stream lock poisoned".to_string()))?;

        let (buf, meta) = CaptureStream::next(&mut *stream)
            .map_err(|e| CameraError::Unavailable(e.to_string()))?;
        let used = usize::try_from(meta.bytesused).map_or(buf.len(), |n| n.min(buf.len()));
        if used == 0 {
            return Err(CameraError::Unavailable("empty buffer from driver".to_string()));
        }

        let data = Bytes::copy_from_slice(&buf[..used]);
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Frame::new(data, sequence))
    }
}
