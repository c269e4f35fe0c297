//! Router error types

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("No shard can serve {target}")]
    UnresolvableRoute { target: String },

    #[error("Unknown shard: {0}")]
    UnknownShard(String),

    #[error("Shard registered twice: {0}")]
    DuplicateShard(String),

    #[error("Invalid shard topology: {0}")]
    InvalidConfig(String),
}

impl RouterError {
    pub fn unresolvable(target: impl Into<String>) -> Self {
        Self::UnresolvableRoute {
            target: target.into(),
        }
    }
}

pub type RouterResult<T> = Result<T, RouterError>;
