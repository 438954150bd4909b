//! Errors raised while building windows and validating configuration.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("window `{0}` must span a positive duration")]
    EmptyWindow(String),

    #[error("window name must not be empty")]
    UnnamedWindow,

    #[error("duplicate window name: {0}")]
    DuplicateWindow(String),

    #[error("unknown window: {0}")]
    UnknownWindow(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
