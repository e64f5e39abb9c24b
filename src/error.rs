//! Error types for the moveit_client crate.

use std::time::Duration;

use thiserror::Error;

use crate::transfer::TransferMode;

/// Errors that can occur when talking to a MOVEit server.
#[derive(Error, Debug)]
pub enum MoveitError {
    #[error("Invalid server host: {0}")]
    InvalidHost(String),

    #[error("Invalid file or folder ID: {0}")]
    InvalidId(String),

    #[error("Unsupported download format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Upload to folder {folder_id} rejected with status {status} ({bytes} bytes, {mode} transfer)")]
    UploadRejected {
        status: u16,
        folder_id: String,
        bytes: u64,
        mode: TransferMode,
    },

    #[error("Server reported page {page} of {total_pages}")]
    Pagination { page: u32, total_pages: u32 },

    #[error("Listing did not finish within {limit} pages")]
    PageLimitExceeded { limit: u32 },

    #[error("Listing did not finish within {0:?}")]
    ListingTimedOut(Duration),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to parse spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),
}

/// Result type alias for MoveitError.
pub type Result<T> = std::result::Result<T, MoveitError>;
