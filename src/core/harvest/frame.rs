use super::error::HarvestError;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

/// 一次截屏得到的帧
///
/// 数据对引擎不透明：可能是原始 RGBA，也可能是 PNG/JPEG 编码字节，
/// 只有识别端会读取。引擎只关心宽高。
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<Vec<u8>>,
    pub captured_at: Duration,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        captured_at_ms: u64,
        frame_number: u64,
    ) -> Result<Self, HarvestError> {
        if width == 0 || height == 0 {
            return Err(HarvestError::InvalidBounds { width, height });
        }

        Ok(Self {
            width,
            height,
            data: Arc::new(data),
            captured_at: Duration::from_millis(captured_at_ms),
            frame_number,
        })
    }

    /// 从编码后的截图（PNG/JPEG/BMP）构造帧，只解析头部拿到尺寸
    pub fn from_encoded(
        bytes: Vec<u8>,
        captured_at_ms: u64,
        frame_number: u64,
    ) -> Result<Self, HarvestError> {
        let (width, height) = image::io::Reader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(image::ImageError::IoError)?
            .into_dimensions()?;

        Self::new(width, height, bytes, captured_at_ms, frame_number)
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

/// 帧元数据（轻量级，用于日志和统计）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub captured_at_ms: u64,
    pub frame_number: u64,
}

impl FrameInfo {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            captured_at_ms: frame.captured_at.as_millis() as u64,
            frame_number: frame.frame_number,
        }
    }
}
