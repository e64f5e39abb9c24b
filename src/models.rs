//! Data models for MOVEit API requests and responses.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A file or folder record, passed through as the server returned it.
pub type Record = Map<String, Value>;

/// Access-token bundle returned by the token endpoint.
///
/// Immutable once obtained. Every field the server sent beyond the well-known
/// ones is kept verbatim in [`TokenBundle::extra`].
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBundle {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TokenBundle {
    /// Wrap an access token obtained elsewhere.
    pub fn from_access_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: None,
            expires_in: None,
            refresh_token: None,
            extra: Map::new(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    /// Lifetime in seconds, as reported by the server.
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

impl fmt::Debug for TokenBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBundle")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("extra", &self.extra)
            .finish()
    }
}

/// Paginated resources exposed by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Files,
    Folders,
}

impl ResourceKind {
    /// Path of the listing endpoint, relative to the base URL.
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::Files => "/api/v1/files",
            ResourceKind::Folders => "/api/v1/folders",
        }
    }

    /// Whether records of this kind are flattened into dotted keys.
    pub fn flattens(&self) -> bool {
        matches!(self, ResourceKind::Folders)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Files => write!(f, "files"),
            ResourceKind::Folders => write!(f, "folders"),
        }
    }
}

/// One page of a listing.
#[derive(Debug, Deserialize)]
pub struct PageEnvelope {
    #[serde(default)]
    pub items: Vec<Record>,
    pub paging: Paging,
}

/// Page counters of a listing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    #[serde(deserialize_with = "deserialize_count")]
    pub page: u32,
    #[serde(deserialize_with = "deserialize_count")]
    pub total_pages: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Count {
    Number(u64),
    Text(String),
}

/// Page counters arrive as numbers or as numeric strings.
fn deserialize_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match Count::deserialize(deserializer)? {
        Count::Number(n) => u32::try_from(n).map_err(serde::de::Error::custom),
        Count::Text(s) => s.trim().parse::<u32>().map_err(serde::de::Error::custom),
    }
}

/// Flatten nested objects into dotted keys: `{"a": {"b": 1}}` becomes `{"a.b": 1}`.
///
/// Arrays, scalars and empty objects are kept as they are.
pub fn flatten_record(record: Record) -> Record {
    let mut flat = Map::new();
    flatten_into(&mut flat, None, record);
    flat
}

fn flatten_into(out: &mut Record, prefix: Option<&str>, record: Record) {
    for (key, value) in record {
        let key = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key,
        };
        match value {
            Value::Object(nested) if !nested.is_empty() => flatten_into(out, Some(&key), nested),
            other => {
                out.insert(key, other);
            }
        }
    }
}

/// One-line summary of a record: id, size and name (or path).
pub fn summarize(record: &Record) -> String {
    let id = record.get("id").map(scalar_text).unwrap_or_else(|| "-".to_string());
    let size = record
        .get("size")
        .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .map(format_size)
        .unwrap_or_else(|| "-".to_string());
    let name = record
        .get("path")
        .or_else(|| record.get("name"))
        .map(scalar_text)
        .unwrap_or_else(|| "-".to_string());
    format!("{}\t{}\t{}", id, size, name)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// MOVEit error response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "error_description")]
    pub error_description: Option<String>,
}

impl ApiErrorResponse {
    /// The most specific message the server gave.
    pub fn message(self) -> Option<String> {
        self.detail.or(self.error_description).or(self.title)
    }
}
