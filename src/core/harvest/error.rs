use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Capture failed: {0}")]
    Capture(String),
    #[error("Recognition failed: {0}")]
    Recognition(String),
    #[error("Invalid screen bounds: {width}x{height}")]
    InvalidBounds { width: u32, height: u32 },
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Unexpected fault: {0}")]
    Unexpected(String),
}
