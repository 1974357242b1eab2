use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("{index} cannot hold {kind} descriptors")]
    UnsupportedDescriptors { index: &'static str, kind: &'static str },
    #[error("query and train descriptors differ in kind")]
    KindMismatch,
    #[error("descriptor length mismatch: query {query}, train {train}")]
    DimensionMismatch { query: usize, train: usize },
    #[error("index holds {available} descriptors but {required} neighbours were requested")]
    InsufficientTrainSet { required: usize, available: usize },
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: &'static str },
}

pub type MatcherResult<T> = Result<T, MatchError>;
