//! Single-case order retrieval from the WebLink repository.
//!
//! Protocol, in order: login handshake (cached), structured search scoped
//! to the case number and order document types, candidate selection,
//! page count, asynchronous PDF generation, fixed-interval polling,
//! download, and magic-header validation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{redirect, Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::query::order_search_command;
use super::session::{PortalSystem, SessionCache, SessionCookies};
use super::{is_rate_limit_status, FetchOutcome, PortalError};
use crate::models::{DocumentMetadata, RetrievedDocument};
use crate::utils::{detect_content_type, is_pdf};

/// Configuration for the WebLink client.
#[derive(Debug, Clone)]
pub struct WeblinkConfig {
    /// Portal root, e.g. `https://imaging.example.gov`.
    pub base_url: String,
    /// Repository/template name the orders live under.
    pub template: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Cached session TTL; kept below the portal's own session lifetime.
    pub session_ttl_mins: i64,
    /// PDF generation poll interval.
    pub poll_interval: Duration,
    /// Maximum poll attempts before giving up on a generation job.
    pub poll_max_attempts: u32,
    /// Ambient HTTP timeout for every portal call.
    pub timeout: Duration,
}

impl Default for WeblinkConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            template: "OAP".to_string(),
            username: None,
            password: None,
            session_ttl_mins: 20,
            poll_interval: Duration::from_secs(1),
            poll_max_attempts: 30,
            timeout: Duration::from_secs(30),
        }
    }
}

/// One search hit from the order repository.
#[derive(Debug, Clone)]
pub(crate) struct SearchHit {
    pub entry_id: i64,
    pub metadata: DocumentMetadata,
}

/// Client for the WebLink search/generate/download flow.
///
/// Stateless aside from the session it borrows from the cache.
pub struct WeblinkClient {
    client: Client,
    config: WeblinkConfig,
    sessions: SessionCache,
}

impl WeblinkClient {
    pub fn new(config: WeblinkConfig, sessions: SessionCache) -> Result<Self, PortalError> {
        // Redirects are followed manually during login so Set-Cookie
        // headers on each hop can be collected.
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

    /// Retrieve the most recent order on file for a case.
    pub async fn fetch_order(&self, case_number: &str) -> Result<FetchOutcome, PortalError> {
        let session = self.session().await?;

        let hits = match self.search(&session, case_number).await? {
            SearchResponse::RateLimited => return Ok(FetchOutcome::RateLimited),
            SearchResponse::Hits(hits) => hits,
        };
        if hits.is_empty() {
            debug!(case_number, "no order on file");
            return Ok(FetchOutcome::NotFound);
        }

        let candidate_count = hits.len();
        let selected = pick_most_recent(hits);
        if candidate_count > 1 {
            info!(
                case_number,
                candidate_count,
                entry_id = selected.entry_id,
                "multiple order candidates; selected most recent"
            );
        }

        let page_count = self.page_count(&session, selected.entry_id).await?;
        let job_key = self
            .start_generation(&session, selected.entry_id, page_count)
            .await?;
        self.poll_generation(&session, &job_key).await?;
        let (content, source_url) = self.download(&session, &job_key).await?;

        if !is_pdf(&content) {
            warn!(
                case_number,
                entry_id = selected.entry_id,
                "generated payload failed PDF validation"
            );
            return Err(PortalError::NotPdf {
                detected: detect_content_type(&content),
            });
        }

        Ok(FetchOutcome::Retrieved(Box::new(RetrievedDocument {
            entry_id: selected.entry_id.to_string(),
            metadata: selected.metadata,
            content_type: "application/pdf".to_string(),
            content,
            source_url,
            candidate_count,
        })))
    }

    /// Fetch-or-create the WebLink session.
    async fn session(&self) -> Result<SessionCookies, PortalError> {
        if let Some(session) = self.sessions.get(PortalSystem::Weblink).await {
            return Ok(session);
        }
        let session = self.login().await?;
        self.sessions.store(session.clone()).await;
        Ok(session)
    }

    /// Drive the portal's login/redirect handshake, collecting cookies
    /// from every hop into one immutable credential.
    async fn login(&self) -> Result<SessionCookies, PortalError> {
        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut url = Url::parse(&format!("{}/WebLink/Login.aspx", self.config.base_url))
            .map_err(|e| PortalError::Malformed(format!("bad portal base url: {e}")))?;

        // The portal bounces through a handful of redirects setting a
        // session cookie on each; cap the walk.
        for _hop in 0..5 {
            let mut request = self.client.get(url.clone());
            if !pairs.is_empty() {
                request = request.header("Cookie", join_cookies(&pairs));
            }
            let response = request.send().await?;
            collect_cookies(&response, &mut pairs);

            if response.status().is_redirection() {
                let next = response
                    .headers()
                    .get("location")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|location| url.join(location).ok());
                match next {
                    Some(next) => url = next,
                    None => break,
                }
                continue;
            }

            if !response.status().is_success() {
                return Err(PortalError::Auth {
                    system: PortalSystem::Weblink.as_str(),
                    reason: format!("login page returned {}", response.status()),
                });
            }
            break;
        }

        // Named accounts post credentials after the cookie walk; the
        // public reading room grants an anonymous session without.
        if let (Some(username), Some(password)) = (
            self.config.username.as_deref(),
            self.config.password.as_deref(),
        ) {
            let response = self
                .client
                .post(format!(
                    "{}/WebLink/LoginService.aspx/Login",
                    self.config.base_url
                ))
                .header("Cookie", join_cookies(&pairs))
                .json(&json!({ "userName": username, "password": password }))
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(PortalError::Auth {
                    system: PortalSystem::Weblink.as_str(),
                    reason: format!("credential post returned {}", response.status()),
                });
            }
            collect_cookies(&response, &mut pairs);
        }

        if pairs.is_empty() {
            return Err(PortalError::Auth {
                system: PortalSystem::Weblink.as_str(),
                reason: "no session cookies granted".to_string(),
            });
        }

        info!(cookies = pairs.len(), "acquired weblink session");
        Ok(SessionCookies::new(
            PortalSystem::Weblink,
            &pairs,
            chrono::Duration::minutes(self.config.session_ttl_mins),
        ))
    }

    /// Issue the structured order search for a case number.
    async fn search(
        &self,
        session: &SessionCookies,
        case_number: &str,
    ) -> Result<SearchResponse, PortalError> {
        let command = order_search_command(&self.config.template, case_number);
        let response = self
            .client
            .post(format!(
                "{}/WebLink/SearchService.aspx/GetSearchResults",
                self.config.base_url
            ))
            .header("Cookie", &session.cookie_header)
            .json(&json!({
                "repoName": self.config.template,
                "searchCommand": command,
                "startIdx": 0,
                "endIdx": 50,
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        if is_rate_limit_status(status) {
            warn!(status, "search throttled");
            return Ok(SearchResponse::RateLimited);
        }
        if response.status() == StatusCode::UNAUTHORIZED
            || response.status() == StatusCode::FORBIDDEN
        {
            self.sessions.invalidate(PortalSystem::Weblink).await;
            return Err(PortalError::Auth {
                system: PortalSystem::Weblink.as_str(),
                reason: format!("search rejected with {status}"),
            });
        }
        if !response.status().is_success() {
            return Err(PortalError::ServerError {
                status,
                url: "SearchService.aspx/GetSearchResults".to_string(),
            });
        }

        let body: Value = response.json().await?;
        Ok(SearchResponse::Hits(parse_search_hits(&body)?))
    }

    /// Request the page count of an entry.
    async fn page_count(
        &self,
        session: &SessionCookies,
        entry_id: i64,
    ) -> Result<u32, PortalError> {
        let response = self
            .client
            .post(format!(
                "{}/WebLink/DocumentService.aspx/GetBasicDocumentInfo",
                self.config.base_url
            ))
            .header("Cookie", &session.cookie_header)
            .json(&json!({ "entryId": entry_id }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PortalError::ServerError {
                status: response.status().as_u16(),
                url: "DocumentService.aspx/GetBasicDocumentInfo".to_string(),
            });
        }
        let body: Value = response.json().await?;
        body.pointer("/data/pageCount")
            .and_then(Value::as_u64)
            .map(|n| n as u32)
            .filter(|n| *n > 0)
            .ok_or_else(|| PortalError::Malformed("missing or zero pageCount".to_string()))
    }

    /// Start asynchronous PDF generation for the full page range.
    async fn start_generation(
        &self,
        session: &SessionCookies,
        entry_id: i64,
        page_count: u32,
    ) -> Result<String, PortalError> {
        let page_range = format!("1-{page_count}");
        let response = self
            .client
            .post(format!(
                "{}/WebLink/PdfExportService.aspx/StartPdfExport",
                self.config.base_url
            ))
            .header("Cookie", &session.cookie_header)
            .json(&json!({
                "entryId": entry_id,
                "pageRange": page_range,
                "watermark": false,
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PortalError::ServerError {
                status: response.status().as_u16(),
                url: "PdfExportService.aspx/StartPdfExport".to_string(),
            });
        }
        let body: Value = response.json().await?;
        body.pointer("/data/key")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .ok_or_else(|| PortalError::Malformed("missing generation job key".to_string()))
    }

    /// Poll a generation job at a fixed interval until it completes.
    async fn poll_generation(
        &self,
        session: &SessionCookies,
        job_key: &str,
    ) -> Result<(), PortalError> {
        for attempt in 1..=self.config.poll_max_attempts {
            let response = self
                .client
                .post(format!(
                    "{}/WebLink/PdfExportService.aspx/GetPdfExportStatus",
                    self.config.base_url
                ))
                .header("Cookie", &session.cookie_header)
                .json(&json!({ "key": job_key }))
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(PortalError::ServerError {
                    status: response.status().as_u16(),
                    url: "PdfExportService.aspx/GetPdfExportStatus".to_string(),
                });
            }
            let body: Value = response.json().await?;
            let state = body
                .pointer("/data/status")
                .and_then(Value::as_str)
                .unwrap_or("");
            match state {
                "Completed" => {
                    debug!(job_key, attempt, "generation completed");
                    return Ok(());
                }
                "Failed" => {
                    return Err(PortalError::Malformed(format!(
                        "generation job {job_key} reported failure"
                    )))
                }
                _ => tokio::time::sleep(self.config.poll_interval).await,
            }
        }
        Err(PortalError::GenerationTimeout {
            attempts: self.config.poll_max_attempts,
        })
    }

    /// Download the rendered document from the job-specific URL.
    async fn download(
        &self,
        session: &SessionCookies,
        job_key: &str,
    ) -> Result<(Vec<u8>, String), PortalError> {
        let url = format!(
            "{}/WebLink/PdfExportService.aspx/GetPdfExportResult?key={}",
            self.config.base_url,
            urlencoding::encode(job_key)
        );
        let response = self
            .client
            .get(&url)
            .header("Cookie", &session.cookie_header)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PortalError::ServerError {
                status: response.status().as_u16(),
                url: url.clone(),
            });
        }
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), url))
    }
}

enum SearchResponse {
    Hits(Vec<SearchHit>),
    RateLimited,
}

/// Parse search results defensively; missing fields degrade to `None`
/// rather than failing the whole search.
pub(crate) fn parse_search_hits(body: &Value) -> Result<Vec<SearchHit>, PortalError> {
    let results = body
        .pointer("/data/results")
        .and_then(Value::as_array)
        .ok_or_else(|| PortalError::Malformed("missing data.results array".to_string()))?;

    let mut hits = Vec::with_capacity(results.len());
    for result in results {
        let Some(entry_id) = result.get("entryId").and_then(Value::as_i64) else {
            // An un-addressable hit cannot be generated or downloaded.
            continue;
        };
        hits.push(SearchHit {
            entry_id,
            metadata: DocumentMetadata {
                applicant: field_str(result, "Applicant"),
                county: field_str(result, "County"),
                legal_description: field_str(result, "Legal Description"),
                relief_type: field_str(result, "Relief Type"),
                signed_date: field_str(result, "Date Signed").and_then(|s| parse_portal_date(&s)),
                order_number: field_str(result, "Order Number"),
            },
        });
    }
    Ok(hits)
}

/// Pull a named metadata field out of a search hit.
fn field_str(result: &Value, name: &str) -> Option<String> {
    result
        .pointer("/fieldValues")
        .and_then(Value::as_object)
        .and_then(|fields| fields.get(name))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// The portal emits dates as either RFC 3339 or `MM/DD/YYYY`.
fn parse_portal_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(s, "%m/%d/%Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Select the most recent candidate by signing date. The portal does not
/// guarantee ordering, so ties (and undated entries) resolve to the first
/// encountered, which is deterministic for a given response.
pub(crate) fn pick_most_recent(hits: Vec<SearchHit>) -> SearchHit {
    hits.into_iter()
        .reduce(|best, hit| match (best.metadata.signed_date, hit.metadata.signed_date) {
            (Some(b), Some(h)) if h > b => hit,
            (None, Some(_)) => hit,
            _ => best,
        })
        .expect("pick_most_recent called with empty hits")
}

fn join_cookies(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collect Set-Cookie pairs from a response, replacing earlier values
/// for the same cookie name.
fn collect_cookies(response: &reqwest::Response, pairs: &mut Vec<(String, String)>) {
    for value in response.headers().get_all("set-cookie") {
        let Ok(raw) = value.to_str() else { continue };
        let Some(pair) = raw.split(';').next() else { continue };
        let Some((name, value)) = pair.split_once('=') else { continue };
        let name = name.trim().to_string();
        let value = value.trim().to_string();
        if let Some(existing) = pairs.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = value;
        } else {
            pairs.push((name, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(entry_id: i64, signed: Option<&str>) -> SearchHit {
        SearchHit {
            entry_id,
            metadata: DocumentMetadata {
                signed_date: signed.and_then(parse_portal_date),
                ..Default::default()
            },
        }
    }

    #[test]
    fn parse_hits_from_portal_json() {
        let body = serde_json::json!({
            "data": {
                "results": [
                    {
                        "entryId": 881234,
                        "fieldValues": {
                            "Applicant": "Acme Operating ",
                            "County": "BLAINE",
                            "Date Signed": "06/12/2025",
                            "Order Number": "742811"
                        }
                    },
                    { "fieldValues": {} }
                ]
            }
        });
        let hits = parse_search_hits(&body).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry_id, 881234);
        assert_eq!(hits[0].metadata.applicant.as_deref(), Some("Acme Operating"));
        assert_eq!(hits[0].metadata.order_number.as_deref(), Some("742811"));
        assert!(hits[0].metadata.signed_date.is_some());
    }

    #[test]
    fn parse_hits_rejects_missing_results() {
        let body = serde_json::json!({ "data": {} });
        assert!(parse_search_hits(&body).is_err());
    }

    #[test]
    fn most_recent_candidate_wins() {
        let selected = pick_most_recent(vec![
            hit(1, Some("01/10/2025")),
            hit(2, Some("06/12/2025")),
            hit(3, Some("03/01/2025")),
        ]);
        assert_eq!(selected.entry_id, 2);
    }

    #[test]
    fn ties_resolve_to_first_encountered() {
        let selected = pick_most_recent(vec![
            hit(7, Some("06/12/2025")),
            hit(8, Some("06/12/2025")),
        ]);
        assert_eq!(selected.entry_id, 7);
    }

    #[test]
    fn dated_beats_undated() {
        let selected = pick_most_recent(vec![hit(4, None), hit(5, Some("02/02/2024"))]);
        assert_eq!(selected.entry_id, 5);
    }

    #[test]
    fn portal_dates_parse_both_shapes() {
        assert!(parse_portal_date("2025-06-12T00:00:00Z").is_some());
        assert!(parse_portal_date("06/12/2025").is_some());
        assert!(parse_portal_date("June 12").is_none());
    }
}
