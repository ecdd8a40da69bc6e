//! Bulk form-document listing from the well-files imaging system.
//!
//! This sub-system has its own login flow and no asynchronous generation
//! step: search results are paginated at a fixed page size and each entry
//! downloads directly. Used for completion reports and drilling permits,
//! which arrive many-per-well rather than one-per-case.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{redirect, Client};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::session::{PortalSystem, SessionCache, SessionCookies};
use super::{is_rate_limit_status, FetchOutcome, PortalError};
use crate::models::{DocumentMetadata, RetrievedDocument};
use crate::utils::{detect_content_type, is_pdf};

/// Configuration for the well-files client.
#[derive(Debug, Clone)]
pub struct WellFilesConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Shorter than the WebLink TTL; this sub-system expires sessions fast.
    pub session_ttl_mins: i64,
    /// Fixed search page size.
    pub page_size: u32,
    /// Safety cap on pagination.
    pub max_pages: u32,
    /// Fixed delay between entry downloads.
    pub download_delay: Duration,
    pub timeout: Duration,
}

impl Default for WellFilesConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: None,
            password: None,
            session_ttl_mins: 10,
            page_size: 100,
            max_pages: 10,
            download_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

/// One listing entry before download.
#[derive(Debug, Clone)]
pub struct WellFileEntry {
    pub entry_id: String,
    pub form_number: Option<String>,
    pub download_url: String,
    pub metadata: DocumentMetadata,
}

/// Accumulates paginated search results until a short page or the safety
/// limit. Separated from I/O so the stopping rule is testable.
#[derive(Debug)]
pub(crate) struct PageAccumulator<T> {
    page_size: u32,
    max_pages: u32,
    pages_seen: u32,
    items: Vec<T>,
}

impl<T> PageAccumulator<T> {
    pub fn new(page_size: u32, max_pages: u32) -> Self {
        Self {
            page_size,
            max_pages,
            pages_seen: 0,
            items: Vec::new(),
        }
    }

    /// Absorb one page; returns true when another page should be fetched.
    pub fn push(&mut self, page: Vec<T>) -> bool {
        self.pages_seen += 1;
        let full_page = page.len() as u32 >= self.page_size;
        self.items.extend(page);
        full_page && self.pages_seen < self.max_pages
    }

    pub fn pages_seen(&self) -> u32 {
        self.pages_seen
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Client for the well-files listing/download flow.
pub struct WellFilesClient {
    client: Client,
    config: WellFilesConfig,
    sessions: SessionCache,
}

impl WellFilesClient {
    pub fn new(config: WellFilesConfig, sessions: SessionCache) -> Result<Self, PortalError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(redirect::Policy::none())
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self {
            client,
            config,
            sessions,
        })
    }

    /// Retrieve all documents of a form type for a well, optionally
    /// filtered down to an explicit set of entry ids.
    ///
    /// Returns `FetchOutcome::RateLimited` alongside an empty vec when the
    /// portal throttles mid-listing so the caller can abort the run.
    pub async fn fetch_well_documents(
        &self,
        well_id: &str,
        form_number: Option<&str>,
        entry_filter: Option<&[String]>,
    ) -> Result<(Vec<RetrievedDocument>, Option<FetchOutcome>), PortalError> {
        let session = self.session().await?;

        let entries = match self.list_entries(&session, well_id, form_number).await? {
            ListResponse::RateLimited => return Ok((Vec::new(), Some(FetchOutcome::RateLimited))),
            ListResponse::Entries(entries) => entries,
        };

        let selected: Vec<WellFileEntry> = match entry_filter {
            Some(wanted) => {
                let wanted: HashSet<&str> = wanted.iter().map(|s| s.as_str()).collect();
                entries
                    .into_iter()
                    .filter(|e| wanted.contains(e.entry_id.as_str()))
                    .collect()
            }
            None => entries,
        };

        info!(well_id, count = selected.len(), "downloading well file entries");

        let mut documents = Vec::with_capacity(selected.len());
        let last_index = selected.len().saturating_sub(1);
        for (index, entry) in selected.into_iter().enumerate() {
            match self.download_entry(&session, &entry).await {
                Ok(doc) => documents.push(doc),
                Err(PortalError::ServerError { status, .. }) if is_rate_limit_status(status) => {
                    warn!(well_id, status, "well files throttled mid-download");
                    return Ok((documents, Some(FetchOutcome::RateLimited)));
                }
                Err(e) => {
                    // One bad entry does not fail the well; record and move on.
                    warn!(entry_id = %entry.entry_id, error = %e, "entry download failed");
                }
            }
            if index < last_index {
                tokio::time::sleep(self.config.download_delay).await;
            }
        }

        Ok((documents, None))
    }

    async fn session(&self) -> Result<SessionCookies, PortalError> {
        if let Some(session) = self.sessions.get(PortalSystem::WellFiles).await {
            return Ok(session);
        }
        let session = self.login().await?;
        self.sessions.store(session.clone()).await;
        Ok(session)
    }

    /// The imaging system's login is a single credential post.
    async fn login(&self) -> Result<SessionCookies, PortalError> {
        let response = self
            .client
            .post(format!("{}/api/Account/Login", self.config.base_url))
            .json(&json!({
                "username": self.config.username.as_deref().unwrap_or(""),
                "password": self.config.password.as_deref().unwrap_or(""),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PortalError::Auth {
                system: PortalSystem::WellFiles.as_str(),
                reason: format!("login returned {}", response.status()),
            });
        }

        let mut pairs = Vec::new();
        for value in response.headers().get_all("set-cookie") {
            if let Ok(raw) = value.to_str() {
                if let Some((name, val)) = raw.split(';').next().and_then(|p| p.split_once('=')) {
                    pairs.push((name.trim().to_string(), val.trim().to_string()));
                }
            }
        }
        if pairs.is_empty() {
            return Err(PortalError::Auth {
                system: PortalSystem::WellFiles.as_str(),
                reason: "no session cookie granted".to_string(),
            });
        }

        Ok(SessionCookies::new(
            PortalSystem::WellFiles,
            &pairs,
            chrono::Duration::minutes(self.config.session_ttl_mins),
        ))
    }

    /// Paginated listing filtered by well id and optional form number.
    async fn list_entries(
        &self,
        session: &SessionCookies,
        well_id: &str,
        form_number: Option<&str>,
    ) -> Result<ListResponse, PortalError> {
        let mut accumulator = PageAccumulator::new(self.config.page_size, self.config.max_pages);
        let mut page_number = 1u32;

        loop {
            let response = self
                .client
                .post(format!("{}/api/Forms/Search", self.config.base_url))
                .header("Cookie", &session.cookie_header)
                .json(&json!({
                    "wellId": well_id,
                    "formNumber": form_number,
                    "pageNumber": page_number,
                    "pageSize": self.config.page_size,
                }))
                .send()
                .await?;

            let status = response.status().as_u16();
            if is_rate_limit_status(status) {
                return Ok(ListResponse::RateLimited);
            }
            if !response.status().is_success() {
                return Err(PortalError::ServerError {
                    status,
                    url: "api/Forms/Search".to_string(),
                });
            }

            let body: Value = response.json().await?;
            let page = parse_entries(&self.config.base_url, &body)?;
            debug!(well_id, page_number, count = page.len(), "listing page");

            if !accumulator.push(page) {
                break;
            }
            page_number += 1;
        }

        Ok(ListResponse::Entries(accumulator.into_items()))
    }

    /// Direct download with one retry on server error.
    async fn download_entry(
        &self,
        session: &SessionCookies,
        entry: &WellFileEntry,
    ) -> Result<RetrievedDocument, PortalError> {
        let mut attempt = 0u32;
        let bytes = loop {
            attempt += 1;
            let response = self
                .client
                .get(&entry.download_url)
                .header("Cookie", &session.cookie_header)
                .send()
                .await?;
            let status = response.status().as_u16();
            if response.status().is_success() {
                break response.bytes().await?.to_vec();
            }
            if status >= 500 && !is_rate_limit_status(status) && attempt == 1 {
                debug!(entry_id = %entry.entry_id, status, "retrying download once");
                continue;
            }
            return Err(PortalError::ServerError {
                status,
                url: entry.download_url.clone(),
            });
        };

        if !is_pdf(&bytes) {
            return Err(PortalError::NotPdf {
                detected: detect_content_type(&bytes),
            });
        }

        Ok(RetrievedDocument {
            entry_id: entry.entry_id.clone(),
            metadata: entry.metadata.clone(),
            content: bytes,
            content_type: "application/pdf".to_string(),
            source_url: entry.download_url.clone(),
            candidate_count: 1,
        })
    }
}

enum ListResponse {
    Entries(Vec<WellFileEntry>),
    RateLimited,
}

/// Parse one page of listing results defensively.
fn parse_entries(base_url: &str, body: &Value) -> Result<Vec<WellFileEntry>, PortalError> {
    let items = body
        .pointer("/items")
        .and_then(Value::as_array)
        .ok_or_else(|| PortalError::Malformed("missing items array".to_string()))?;

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let Some(entry_id) = item
            .get("id")
            .and_then(|v| v.as_str().map(|s| s.to_string()).or_else(|| v.as_i64().map(|n| n.to_string())))
        else {
            continue;
        };
        let download_url = match item.get("url").and_then(Value::as_str) {
            Some(url) if url.starts_with("http") => url.to_string(),
            Some(url) => format!("{base_url}{url}"),
            None => format!("{base_url}/api/Forms/{entry_id}/Download"),
        };
        entries.push(WellFileEntry {
            entry_id,
            form_number: item
                .get("formNumber")
                .and_then(Value::as_str)
                .map(|s| s.to_string()),
            download_url,
            metadata: DocumentMetadata {
                relief_type: item
                    .get("formName")
                    .and_then(Value::as_str)
                    .map(|s| s.to_string()),
                county: item
                    .get("county")
                    .and_then(Value::as_str)
                    .map(|s| s.to_string()),
                ..Default::default()
            },
        });
    }
    Ok(entries)
}
