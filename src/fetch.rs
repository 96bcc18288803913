//! Record sources and the URL-keyed fetch cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::Client;

use crate::error::{FetchError, FetchResult};
use crate::models::Record;

pub type Headers = Vec<(String, String)>;

/// Headers the registrations API expects on every request.
pub fn api_headers(token: &str) -> Headers {
    vec![
        ("accept".to_string(), "application/json".to_string()),
        ("xc-token".to_string(), token.to_string()),
    ]
}

/// Decodes a JSON array of records. Elements that are not record objects are
/// skipped; only a body that is not an array at all is malformed.
pub fn decode_records(body: &str) -> FetchResult<Vec<Record>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let total = values.len();

    let records: Vec<Record> = values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<Record>(value) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::debug!(index, error = %err, "skipping undecodable record");
                None
            }
        })
        .collect();

    for record in records.iter().filter(|record| record.id.is_none()) {
        tracing::debug!(
            name = record.full_name.as_deref().unwrap_or("<unnamed>"),
            "record has no usable Id and will be left out of every table"
        );
    }
    if records.len() < total {
        tracing::warn!(skipped = total - records.len(), total, "some records could not be decoded");
    }

    Ok(records)
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, url: &str, headers: &[(String, String)]) -> FetchResult<Vec<Record>>;
}

pub struct HttpSource {
    http: Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    async fn fetch(&self, url: &str, headers: &[(String, String)]) -> FetchResult<Vec<Record>> {
        let mut request = self.http.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        decode_records(&body)
    }
}

/// Reads a JSON array of records from disk; the "url" is a file path.
#[derive(Debug, Default)]
pub struct FileSource;

#[async_trait]
impl RecordSource for FileSource {
    async fn fetch(&self, url: &str, _headers: &[(String, String)]) -> FetchResult<Vec<Record>> {
        let body = tokio::fs::read_to_string(url)
            .await
            .map_err(|source| FetchError::Io {
                path: url.to_string(),
                source,
            })?;
        decode_records(&body)
    }
}

#[derive(Debug, Clone)]
struct CachedFetch {
    records: Arc<Vec<Record>>,
    fetched_at: DateTime<Utc>,
}

/// Caches the latest successful fetch per URL until explicitly invalidated.
pub struct CachedFetcher<S> {
    source: S,
    headers: Headers,
    entries: RwLock<HashMap<String, CachedFetch>>,
    generation: AtomicU64,
}

impl<S: RecordSource> CachedFetcher<S> {
    pub fn new(source: S, headers: Headers) -> Self {
        Self {
            source,
            headers,
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn fetch(&self, url: &str) -> FetchResult<Arc<Vec<Record>>> {
        let cached = self.entries.read().get(url).map(|entry| entry.records.clone());
        if let Some(records) = cached {
            tracing::debug!(url, records = records.len(), "cache hit");
            return Ok(records);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        tracing::info!(url, "fetching registrations");
        let records = match self.source.fetch(url, &self.headers).await {
            Ok(records) => Arc::new(records),
            Err(err) => {
                tracing::warn!(url, error = %err, "fetch failed");
                return Err(err);
            }
        };
        tracing::info!(url, records = records.len(), "fetched registrations");

        let mut entries = self.entries.write();
        if self.generation.load(Ordering::SeqCst) == generation {
            entries.insert(
                url.to_string(),
                CachedFetch {
                    records: records.clone(),
                    fetched_at: Utc::now(),
                },
            );
        } else {
            tracing::debug!(url, "cache invalidated mid-fetch, result not stored");
        }

        Ok(records)
    }

    /// Forces the next fetch of every URL to go to the source.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.write().clear();
        tracing::debug!("cache cleared");
    }

    pub fn fetched_at(&self, url: &str) -> Option<DateTime<Utc>> {
        self.entries.read().get(url).map(|entry| entry.fetched_at)
    }
}
