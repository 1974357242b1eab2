use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HomographyError {
    #[error("need at least 4 correspondences, got {found}")]
    TooFewCorrespondences { found: usize },

    #[error("point sets differ in length: {src} source vs {dst} destination")]
    LengthMismatch { src: usize, dst: usize },

    #[error("point configuration is degenerate")]
    Degenerate,

    #[error("no consensus set of at least 4 inliers after {iterations} iterations")]
    NoConsensus { iterations: usize },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: &'static str },
}

pub type HomographyResult<T> = Result<T, HomographyError>;
