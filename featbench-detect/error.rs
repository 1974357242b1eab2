use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectError {
    #[error("image {width}x{height} too small (minimum {min_size}x{min_size})")]
    ImageTooSmall { width: u32, height: u32, min_size: u32 },
    #[error("invalid threshold: {0} (must be 1-127)")]
    InvalidThreshold(u8),
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: &'static str },
}

pub type DetectResult<T> = Result<T, DetectError>;
