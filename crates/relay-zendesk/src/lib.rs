//! Zendesk adapter (ticket backend).
//!
//! Implements the `relay-core` `TicketBackend` port over the Zendesk REST API:
//! - at most `max_concurrency` requests in flight process-wide
//! - retries transport errors, timeouts and 429s with exponential backoff
//! - 429 waits `Retry-After` (capped) before the retry layer re-attempts
//! - other non-2xx responses fail the call immediately

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tokio_retry::RetryIf;
use tracing::{error, warn};

use relay_core::{
    config::Config,
    domain::{
        CommentId, CommentRecord, CreatedTicket, NewTicket, TicketId, TicketLookup,
        TicketSnapshot, TicketStatus,
    },
    errors::Error,
    ports::TicketBackend,
    retry::RetryPolicy,
    Result,
};

const MAX_COMMENT_PAGES: usize = 20;

#[derive(Clone, Debug)]
pub struct ZendeskConfig {
    pub subdomain: String,
    pub email: String,
    pub api_token: String,
    pub group_id: Option<u64>,
    pub tags: Vec<String>,
    pub requester_email_domain: String,
    /// API origin; `https://{subdomain}.zendesk.com` unless overridden.
    pub base_url: String,
    pub request_timeout: Duration,
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    /// Wait used when a 429 carries no usable `Retry-After`.
    pub default_retry_after: Duration,
    pub max_retry_after: Duration,
}

impl ZendeskConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            subdomain: cfg.zendesk_subdomain.clone(),
            email: cfg.zendesk_email.clone(),
            api_token: cfg.zendesk_api_token.clone(),
            group_id: cfg.zendesk_group_id,
            tags: cfg.zendesk_tags.clone(),
            requester_email_domain: cfg.requester_email_domain.clone(),
            base_url: format!("https://{}.zendesk.com", cfg.zendesk_subdomain),
            request_timeout: Duration::from_secs(15),
            max_concurrency: 2,
            retry: RetryPolicy::new(3, Duration::from_secs(2), Duration::from_secs(10)),
            default_retry_after: Duration::from_secs(5),
            max_retry_after: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ZendeskError {
    #[error("transport error: {0}")]
    Transport(reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited, waited {0:?}")]
    RateLimited(Duration),

    #[error("not found")]
    NotFound,

    #[error("zendesk returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ZendeskError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ZendeskError::Timeout
        } else if e.is_decode() {
            ZendeskError::Decode(e.to_string())
        } else {
            ZendeskError::Transport(e)
        }
    }

    /// Transient failures the retry layer re-attempts.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ZendeskError::Transport(_) | ZendeskError::Timeout | ZendeskError::RateLimited(_)
        )
    }
}

type ZendeskResult<T> = std::result::Result<T, ZendeskError>;

// === Wire types ===

#[derive(Deserialize)]
struct TicketEnvelope {
    ticket: TicketBody,
}

#[derive(Deserialize)]
struct TicketBody {
    id: u64,
    #[serde(default = "unknown_status")]
    status: TicketStatus,
    #[serde(default)]
    requester_id: Option<u64>,
}

fn unknown_status() -> TicketStatus {
    TicketStatus::Unknown
}

#[derive(Deserialize)]
struct CommentsPage {
    #[serde(default)]
    comments: Vec<CommentBody>,
    #[serde(default)]
    next_page: Option<String>,
}

#[derive(Deserialize)]
struct CommentBody {
    id: u64,
    author_id: u64,
    #[serde(default)]
    body: String,
}

pub struct ZendeskClient {
    cfg: ZendeskConfig,
    http: reqwest::Client,
    gate: Semaphore,
}

impl ZendeskClient {
    pub fn new(cfg: ZendeskConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|e| Error::External(format!("zendesk http client error: {e}")))?;
        let gate = Semaphore::new(cfg.max_concurrency.max(1));
        Ok(Self { cfg, http, gate })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v2{path}", self.cfg.base_url.trim_end_matches('/'))
    }

    /// Agent-facing URL of a ticket.
    pub fn ticket_url(&self, id: TicketId) -> String {
        format!(
            "https://{}.zendesk.com/agent/tickets/{id}",
            self.cfg.subdomain
        )
    }

    /// Placeholder requester email so the backend needs no real contact info.
    pub fn requester_email(&self, external_id: i64) -> String {
        format!(
            "telegram-{external_id}@{}",
            self.cfg.requester_email_domain
        )
    }

    pub fn ticket_payload(&self, ticket: &NewTicket) -> Value {
        let mut body = json!({
            "subject": ticket.subject,
            "comment": { "body": ticket.description },
            "requester": {
                "name": ticket.requester_name,
                "email": self.requester_email(ticket.requester_external_id.0),
            },
            "tags": self.cfg.tags,
        });
        if let Some(group_id) = self.cfg.group_id {
            body["group_id"] = json!(group_id);
        }
        json!({ "ticket": body })
    }

    pub async fn create(&self, ticket: &NewTicket) -> ZendeskResult<CreatedTicket> {
        let payload = self.ticket_payload(ticket);
        let created: TicketEnvelope = self
            .request(Method::POST, &self.api_url("/tickets.json"), Some(&payload))
            .await?;
        let id = TicketId(created.ticket.id);
        Ok(CreatedTicket {
            id,
            url: self.ticket_url(id),
        })
    }

    pub async fn fetch_ticket(&self, id: TicketId) -> ZendeskResult<TicketSnapshot> {
        let env: TicketEnvelope = self
            .request(Method::GET, &self.api_url(&format!("/tickets/{id}.json")), None)
            .await?;
        let requester_id = env
            .ticket
            .requester_id
            .ok_or_else(|| ZendeskError::Decode(format!("ticket {id} has no requester_id")))?;
        Ok(TicketSnapshot {
            id: TicketId(env.ticket.id),
            status: env.ticket.status,
            requester_id,
        })
    }

    /// All comments, oldest first, following pagination.
    pub async fn fetch_comments(&self, id: TicketId) -> ZendeskResult<Vec<CommentRecord>> {
        let mut out = Vec::new();
        let mut url = self.api_url(&format!("/tickets/{id}/comments.json"));
        for _ in 0..MAX_COMMENT_PAGES {
            let page: CommentsPage = self.request(Method::GET, &url, None).await?;
            out.extend(page.comments.into_iter().map(|c| CommentRecord {
                id: CommentId(c.id),
                author_id: c.author_id,
                body: c.body,
            }));
            match page.next_page {
                Some(next) if !next.is_empty() => url = next,
                _ => return Ok(out),
            }
        }
        warn!(ticket_id = %id, "comment pagination limit reached");
        Ok(out)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> ZendeskResult<T> {
        RetryIf::spawn(
            self.cfg.retry.backoff(),
            || self.attempt(method.clone(), url, body),
            |e: &ZendeskError| {
                if e.is_retryable() {
                    warn!(url, "zendesk request failed, retrying: {e}");
                }
                e.is_retryable()
            },
        )
        .await
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> ZendeskResult<T> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ZendeskError::Decode(format!("request gate closed: {e}")))?;

        let mut req = self
            .http
            .request(method, url)
            .basic_auth(format!("{}/token", self.cfg.email), Some(&self.cfg.api_token));
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await.map_err(ZendeskError::from_reqwest)?;
        let status = resp.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            drop(permit);
            let wait = retry_after(
                resp.headers(),
                self.cfg.default_retry_after,
                self.cfg.max_retry_after,
            );
            warn!(url, wait_secs = wait.as_secs_f64(), "zendesk 429, waiting");
            sleep(wait).await;
            return Err(ZendeskError::RateLimited(wait));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ZendeskError::NotFound);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ZendeskError::Status {
                status,
                body: body.chars().take(500).collect(),
            });
        }

        resp.json::<T>().await.map_err(ZendeskError::from_reqwest)
    }
}

/// `Retry-After` in whole seconds, falling back to `default`, capped at `max`.
fn retry_after(headers: &HeaderMap, default: Duration, max: Duration) -> Duration {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
        .min(max)
}

#[async_trait]
impl TicketBackend for ZendeskClient {
    async fn create_ticket(&self, ticket: NewTicket) -> Option<CreatedTicket> {
        match self.create(&ticket).await {
            Ok(created) => Some(created),
            Err(e) => {
                error!("failed to create zendesk ticket: {e}");
                None
            }
        }
    }

    async fn ticket_info(&self, id: TicketId) -> TicketLookup {
        match self.fetch_ticket(id).await {
            Ok(snapshot) => TicketLookup::Found(snapshot),
            Err(ZendeskError::NotFound) => TicketLookup::NotFound,
            Err(e) => {
                error!(ticket_id = %id, "failed to fetch zendesk ticket: {e}");
                TicketLookup::Unavailable
            }
        }
    }

    async fn ticket_comments(&self, id: TicketId) -> Option<Vec<CommentRecord>> {
        match self.fetch_comments(id).await {
            Ok(comments) => Some(comments),
            Err(e) => {
                error!(ticket_id = %id, "failed to fetch zendesk comments: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests;
