//! MOVEit REST API client: listing, download and upload.

use std::io::BufReader;
use std::path::Path;

use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, TRANSFER_ENCODING};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{MoveitError, Result};
use crate::host::validate_id;
use crate::models::{flatten_record, ApiErrorResponse, PageEnvelope, Paging, Record, ResourceKind, TokenBundle};
use crate::tabular::{parse_delimited, parse_workbook, parse_xlsx, DownloadFormat, Table, XLSX_MIME};
use crate::transfer::{TransferMode, UploadOutcome};

/// Client for a single MOVEit server.
///
/// Holds no session state: every call takes the [`TokenBundle`] it should use.
#[derive(Clone)]
pub struct MoveitClient {
    config: ClientConfig,
    http: Client,
}

impl MoveitClient {
    /// Create a client with default settings.
    ///
    /// # Arguments
    /// * `host` - Host fragment (`example.com` → `https://moveit.example.com`) or explicit base URL
    pub fn new(host: &str) -> Result<Self> {
        Self::with_config(ClientConfig::new(host)?)
    }

    /// Create a client from a configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    /// List every file visible to the token.
    pub async fn list_files(&self, token: &TokenBundle) -> Result<Vec<Record>> {
        self.list(token, ResourceKind::Files).await
    }

    /// List every folder visible to the token, with nested fields flattened.
    pub async fn list_folders(&self, token: &TokenBundle) -> Result<Vec<Record>> {
        self.list(token, ResourceKind::Folders).await
    }

    /// List all records of a paginated resource.
    ///
    /// Pages are requested one after another until the server reports the last one;
    /// records are returned in page order. The listing fails if it needs more than
    /// the configured page limit or outlives the configured deadline.
    pub async fn list(&self, token: &TokenBundle, kind: ResourceKind) -> Result<Vec<Record>> {
        match self.config.deadline() {
            Some(deadline) => tokio::time::timeout(deadline, self.collect_pages(token, kind))
                .await
                .map_err(|_| MoveitError::ListingTimedOut(deadline))?,
            None => self.collect_pages(token, kind).await,
        }
    }

    async fn collect_pages(&self, token: &TokenBundle, kind: ResourceKind) -> Result<Vec<Record>> {
        let url = self.endpoint(kind.path());
        let limit = self.config.page_limit();

        let first = self.fetch_page(token, &url, None).await?;
        let mut paging = first.paging;
        let mut items = first.items;
        let mut requests = 1;

        debug!(%kind, page = paging.page, total_pages = paging.total_pages, items = items.len(), "fetched page");

        while !listing_finished(paging)? {
            if requests >= limit {
                return Err(MoveitError::PageLimitExceeded { limit });
            }

            let next_page = paging.page + 1;
            let envelope = self.fetch_page(token, &url, Some(next_page)).await?;
            requests += 1;

            debug!(%kind, page = envelope.paging.page, total_pages = envelope.paging.total_pages, items = envelope.items.len(), "fetched page");

            items.extend(envelope.items);
            paging = envelope.paging;
        }

        if kind.flattens() {
            items = items.into_iter().map(flatten_record).collect();
        }

        info!(%kind, records = items.len(), pages = requests, "listing complete");
        Ok(items)
    }

    async fn fetch_page(&self, token: &TokenBundle, url: &str, page: Option<u32>) -> Result<PageEnvelope> {
        let mut request = self.http.get(url).bearer_auth(token.access_token());

        if let Some(page) = page {
            request = request.query(&[("page", page)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Download a file and parse it as a table.
    ///
    /// The body is staged in a temporary file that is removed on every exit path.
    pub async fn download_file(
        &self,
        token: &TokenBundle,
        file_id: &str,
        format: &DownloadFormat,
    ) -> Result<Table> {
        let (file_id, staging) = self.stage_download(token, file_id, format.content_type()).await?;

        let table = match format {
            DownloadFormat::Csv => parse_delimited(BufReader::new(staging.reopen()?), b',')?,
            DownloadFormat::Tsv => parse_delimited(BufReader::new(staging.reopen()?), b'\t')?,
            DownloadFormat::Excel { sheet } => parse_xlsx(staging.path(), sheet.as_deref())?,
        };

        info!(file_id = %file_id, rows = table.row_count(), columns = table.column_count(), "parsed download");
        Ok(table)
    }

    /// Download an XLSX workbook and parse every sheet, in workbook order.
    pub async fn download_workbook(&self, token: &TokenBundle, file_id: &str) -> Result<Vec<(String, Table)>> {
        let (file_id, staging) = self.stage_download(token, file_id, XLSX_MIME).await?;
        let sheets = parse_workbook(staging.path())?;

        info!(file_id = %file_id, sheets = sheets.len(), "parsed workbook");
        Ok(sheets)
    }

    /// Stream a file's content into a staging file. Dropping the returned file deletes it.
    async fn stage_download(
        &self,
        token: &TokenBundle,
        file_id: &str,
        content_type: &str,
    ) -> Result<(String, NamedTempFile)> {
        let file_id = validate_id(file_id)?;
        let url = self.endpoint(&format!("/api/v1/files/{}/download", file_id));
        let staging = match self.config.staging() {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };

        let response = self
            .http
            .get(&url)
            .bearer_auth(token.access_token())
            .header(CONTENT_TYPE, content_type)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let mut file = File::from_std(staging.reopen()?);
        let mut stream = response.bytes_stream();
        let mut bytes = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            bytes += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        drop(file);

        debug!(file_id = %file_id, bytes, staging = %staging.path().display(), "downloaded file");
        Ok((file_id, staging))
    }

    /// Upload a local file into a folder.
    ///
    /// Files of [`CHUNKED_UPLOAD_THRESHOLD`](crate::transfer::CHUNKED_UPLOAD_THRESHOLD)
    /// bytes or more, or any file when `chunked` is set, are streamed with chunked
    /// transfer encoding. Only status 200 and 201 count as success.
    ///
    /// # Arguments
    /// * `folder_id` - ID of the destination folder
    /// * `local_path` - Path to the local file
    /// * `file_type` - MIME type of the file part
    /// * `chunked` - Force chunked transfer regardless of size
    pub async fn upload_file<P: AsRef<Path>>(
        &self,
        token: &TokenBundle,
        folder_id: &str,
        local_path: P,
        file_type: &str,
        chunked: bool,
    ) -> Result<UploadOutcome> {
        let local_path = local_path.as_ref();
        let folder_id = validate_id(folder_id)?;
        // Non-UTF-8 names are sent with replacement characters.
        let filename = local_path
            .file_name()
            .unwrap_or(local_path.as_os_str())
            .to_string_lossy()
            .into_owned();

        let size = tokio::fs::metadata(local_path).await?.len();
        let mode = TransferMode::select(size, chunked);

        let part = match mode {
            TransferMode::Standard => Part::bytes(tokio::fs::read(local_path).await?),
            TransferMode::Chunked => {
                let file = File::open(local_path).await?;
                Part::stream(Body::wrap_stream(ReaderStream::new(file)))
            }
        };
        let part = part.file_name(filename.clone()).mime_str(file_type)?;
        let form = Form::new().part("file", part);

        let url = self.endpoint(&format!("/api/v1/folders/{}/files", folder_id));
        debug!(%url, file = %filename, bytes = size, %mode, "uploading file");

        let mut request = self
            .http
            .post(&url)
            .bearer_auth(token.access_token())
            .header(ACCEPT, "application/json")
            .multipart(form);

        if mode.is_chunked() {
            request = request.header(TRANSFER_ENCODING, "chunked");
        }

        let response = request.send().await?;
        let status = response.status().as_u16();

        if status != 200 && status != 201 {
            let body = response.text().await.unwrap_or_default();
            warn!(status, folder_id = %folder_id, bytes = size, %mode, %body, "upload rejected");
            return Err(MoveitError::UploadRejected {
                status,
                folder_id,
                bytes: size,
                mode,
            });
        }

        info!(file = %filename, folder_id = %folder_id, bytes = size, %mode, "uploaded file");
        Ok(UploadOutcome {
            status,
            mode,
            bytes: size,
        })
    }
}

/// Whether a listing has reached its last page.
fn listing_finished(paging: Paging) -> Result<bool> {
    if paging.total_pages == 0 || paging.page == paging.total_pages {
        Ok(true)
    } else if paging.page > paging.total_pages {
        Err(MoveitError::Pagination {
            page: paging.page,
            total_pages: paging.total_pages,
        })
    } else {
        Ok(false)
    }
}

/// Turn a non-success response into an API error, preferring the server's own message.
pub(crate) async fn api_error(response: Response) -> MoveitError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
        .ok()
        .and_then(ApiErrorResponse::message)
        .unwrap_or(body);

    MoveitError::Api { status, message }
}
