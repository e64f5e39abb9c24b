//! moveit_client - A client for the MOVEit Transfer REST API.
//!
//! This library provides functionality to:
//! - Exchange credentials for an access-token bundle
//! - List every file or folder, following the server's pagination
//! - Download a file and parse it as a table (CSV, TSV or XLSX)
//! - Upload files, switching to chunked transfer for large ones
//!
//! The token bundle is an ordinary value: it is returned by
//! [`MoveitClient::authenticate`] and passed to every other call.
//!
//! # Example
//!
//! ```no_run
//! use moveit_client::{CredentialPayload, DownloadFormat, MoveitClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = MoveitClient::new("example.com")?;
//!     let token = client
//!         .authenticate(&CredentialPayload::password("user", "secret"))
//!         .await?;
//!
//!     for file in client.list_files(&token).await? {
//!         println!("{}", moveit_client::models::summarize(&file));
//!     }
//!
//!     let table = client.download_file(&token, "123456", &DownloadFormat::Csv).await?;
//!     println!("{} rows", table.row_count());
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod models;
pub mod tabular;
pub mod transfer;

// Re-exports for convenience
pub use auth::CredentialPayload;
pub use client::MoveitClient;
pub use config::ClientConfig;
pub use error::{MoveitError, Result};
pub use models::{Record, ResourceKind, TokenBundle};
pub use tabular::{Cell, ColumnKind, DownloadFormat, Table};
pub use transfer::{TransferMode, UploadOutcome, CHUNKED_UPLOAD_THRESHOLD};
