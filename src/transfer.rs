//! Upload transfer-mode selection.

use std::fmt;

/// Files at or above this size (in bytes) are always uploaded with chunked transfer encoding.
pub const CHUNKED_UPLOAD_THRESHOLD: u64 = 40_000_000;

/// How an upload body is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Single request body with a known length.
    Standard,
    /// Streamed body sent with `Transfer-Encoding: chunked`.
    Chunked,
}

impl TransferMode {
    /// Pick the transfer mode for a file of `size` bytes.
    ///
    /// `force_chunked` lets the caller opt into chunked transfer for small files too.
    pub fn select(size: u64, force_chunked: bool) -> Self {
        if force_chunked || size >= CHUNKED_UPLOAD_THRESHOLD {
            TransferMode::Chunked
        } else {
            TransferMode::Standard
        }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self, TransferMode::Chunked)
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Standard => write!(f, "standard"),
            TransferMode::Chunked => write!(f, "chunked"),
        }
    }
}

/// Result of an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Status code the server answered with (200 or 201).
    pub status: u16,
    pub mode: TransferMode,
    /// Size of the uploaded file.
    pub bytes: u64,
}
