use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while decoding or encoding DNS wire data
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DnsError {
    #[error("message is truncated")]
    TruncatedMessage,
    #[error("compression pointer loop at offset {offset}")]
    CompressionLoop { offset: usize },
    #[error("label has an unknown format or invalid characters")]
    MalformedLabel,
    #[error("label `{0}` is longer than 63 bytes")]
    LabelTooLong(String),
}

/// Errors raised by a single upstream exchange
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("upstream transport error: {0}")]
    Io(#[from] io::Error),
    #[error("no upstream reply within {0:?}")]
    Timeout(Duration),
}
