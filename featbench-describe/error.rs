use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DescribeError {
    #[error("cannot describe keypoints on an empty {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: &'static str },
}

pub type DescribeResult<T> = Result<T, DescribeError>;
