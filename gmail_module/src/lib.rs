//! Gmail REST client: inbox polling and reply delivery.
//!
//! Covers the surface the triage service needs — list unread messages, fetch
//! and decode a message body, mark a message read, and deliver a reply either
//! as a draft or as sent mail.
//!
//! Configuration:
//! - `GMAIL_API_BASE_URL`: API base URL override (default: `https://gmail.googleapis.com/gmail/v1`)

pub mod models;

use base64::engine::general_purpose::{URL_SAFE as BASE64_URL_SAFE, URL_SAFE_NO_PAD as BASE64_URL_SAFE_NO_PAD};
use base64::Engine;
use tracing::{debug, error, info};

use google_auth_module::{GoogleAuth, GoogleAuthError};

use crate::models::{DraftResponse, Message, MessageListResponse, MessagePayload};

/// Default Gmail API base URL.
const DEFAULT_API_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Error types for Gmail operations.
#[derive(Debug, thiserror::Error)]
pub enum GmailError {
    #[error("auth error: {0}")]
    Auth(#[from] GoogleAuthError),
    #[error("http error: {0}")]
    Http(String),
    #[error("gmail api error: HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("json error: {0}")]
    Json(String),
}

/// One unread inbound email, flattened to the fields the triage pass uses.
#[derive(Debug, Clone)]
pub struct InboundEmail {
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub body: String,
}

/// Gmail REST client bound to the authenticated user (`me`).
#[derive(Debug, Clone)]
pub struct GmailClient {
    auth: GoogleAuth,
}

impl GmailClient {
    pub fn new(auth: GoogleAuth) -> Self {
        Self { auth }
    }

    /// List unread messages under `label`, fetching each one to flatten out
    /// subject, sender and plain-text body.
    pub fn list_unread(&self, label: &str) -> Result<Vec<InboundEmail>, GmailError> {
        let access_token = self.auth.get_access_token()?;
        let client = reqwest::blocking::Client::new();

        let url = format!("{}/users/me/messages", api_base_url());
        let response = client
            .get(&url)
            .query(&[("q", "is:unread"), ("labelIds", label)])
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .map_err(|e| GmailError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!("failed to list unread messages: {} - {}", status, body);
            return Err(GmailError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let list: MessageListResponse = response
            .json()
            .map_err(|e| GmailError::Json(e.to_string()))?;

        let refs = list.messages.unwrap_or_default();
        debug!("{} unread message(s) listed", refs.len());

        let mut emails = Vec::with_capacity(refs.len());
        for msg_ref in refs {
            emails.push(self.fetch_message(&client, &access_token, &msg_ref.id)?);
        }
        Ok(emails)
    }

    fn fetch_message(
        &self,
        client: &reqwest::blocking::Client,
        access_token: &str,
        id: &str,
    ) -> Result<InboundEmail, GmailError> {
        let url = format!("{}/users/me/messages/{}", api_base_url(), id);
        let response = client
            .get(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .map_err(|e| GmailError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!("failed to fetch message {}: {} - {}", id, status, body);
            return Err(GmailError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let message: Message = response
            .json()
            .map_err(|e| GmailError::Json(e.to_string()))?;

        let payload = message.payload.unwrap_or_default();
        let subject = payload.header_value("Subject").unwrap_or_default().to_string();
        let sender = payload.header_value("From").unwrap_or_default().to_string();
        let body = extract_plain_text_body(&payload);

        Ok(InboundEmail {
            id: message.id,
            subject,
            sender,
            body,
        })
    }

    /// Remove the `UNREAD` label from a message.
    pub fn mark_read(&self, id: &str) -> Result<(), GmailError> {
        let access_token = self.auth.get_access_token()?;
        let client = reqwest::blocking::Client::new();

        let url = format!("{}/users/me/messages/{}/modify", api_base_url(), id);
        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&serde_json::json!({ "removeLabelIds": ["UNREAD"] }))
            .send()
            .map_err(|e| GmailError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!("failed to mark message {} read: {} - {}", id, status, body);
            return Err(GmailError::Api {
                status: status.as_u16(),
                body,
            });
        }

        debug!("message {} marked read", id);
        Ok(())
    }

    /// Send a plain-text reply. The subject is normalized to `Re: <subject>`.
    pub fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), GmailError> {
        let access_token = self.auth.get_access_token()?;
        let client = reqwest::blocking::Client::new();

        let raw = build_raw_message(to, &reply_subject(subject), body);
        let url = format!("{}/users/me/messages/send", api_base_url());
        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .map_err(|e| GmailError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let resp_body = response.text().unwrap_or_default();
            error!("failed to send reply to {}: {} - {}", to, status, resp_body);
            return Err(GmailError::Api {
                status: status.as_u16(),
                body: resp_body,
            });
        }

        info!("reply sent to {}", to);
        Ok(())
    }

    /// Create a draft reply instead of sending. Returns the draft id.
    pub fn create_draft(&self, to: &str, subject: &str, body: &str) -> Result<String, GmailError> {
        let access_token = self.auth.get_access_token()?;
        let client = reqwest::blocking::Client::new();

        let raw = build_raw_message(to, &reply_subject(subject), body);
        let url = format!("{}/users/me/drafts", api_base_url());
        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&serde_json::json!({ "message": { "raw": raw } }))
            .send()
            .map_err(|e| GmailError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let resp_body = response.text().unwrap_or_default();
            error!("failed to create draft for {}: {} - {}", to, status, resp_body);
            return Err(GmailError::Api {
                status: status.as_u16(),
                body: resp_body,
            });
        }

        let draft: DraftResponse = response
            .json()
            .map_err(|e| GmailError::Json(e.to_string()))?;

        info!("draft {} created for {}", draft.id, to);
        Ok(draft.id)
    }
}

/// API base URL, overridable for tests.
fn api_base_url() -> String {
    std::env::var("GMAIL_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
}

/// Extract the plain-text body from a message payload.
///
/// Prefers inline `body.data` on the payload itself; otherwise takes the
/// first `text/plain` part found depth-first, so multipart/alternative
/// messages resolve to their text alternative.
pub fn extract_plain_text_body(payload: &MessagePayload) -> String {
    if let Some(data) = payload.body.as_ref().and_then(|body| body.data.as_deref()) {
        if !data.is_empty() {
            return decode_body_data(data);
        }
    }
    find_text_plain(payload).map(decode_body_data).unwrap_or_default()
}

fn find_text_plain(payload: &MessagePayload) -> Option<&str> {
    if let Some(parts) = payload.parts.as_ref() {
        for part in parts {
            let is_text_plain = part
                .mime_type
                .as_deref()
                .map(|mime| mime.eq_ignore_ascii_case("text/plain"))
                .unwrap_or(false);
            if is_text_plain {
                if let Some(data) = part.body.as_ref().and_then(|body| body.data.as_deref()) {
                    return Some(data);
                }
            }
            if let Some(data) = find_text_plain(part) {
                return Some(data);
            }
        }
    }
    None
}

/// Decode base64url body data. Gmail emits url-safe base64 with or without
/// padding depending on the part, so padding is stripped before decoding.
fn decode_body_data(data: &str) -> String {
    let trimmed = data.trim_end_matches('=');
    match BASE64_URL_SAFE_NO_PAD.decode(trimmed) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            error!("failed to decode message body: {}", err);
            String::new()
        }
    }
}

/// Normalize a reply subject to `Re: <subject>` without doubling an existing
/// prefix.
pub fn reply_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    let already_prefixed = trimmed
        .get(..3)
        .map(|prefix| prefix.eq_ignore_ascii_case("re:"))
        .unwrap_or(false);
    if already_prefixed {
        trimmed.to_string()
    } else {
        format!("Re: {}", trimmed)
    }
}

/// Extract the addr-spec from a `From` header value (`Name <addr>` or bare
/// `addr`), lowercased. This is the stable correspondent key.
pub fn extract_sender_address(raw: &str) -> Option<String> {
    let candidate = match (raw.find('<'), raw.rfind('>')) {
        (Some(start), Some(end)) if start < end => &raw[start + 1..end],
        _ => raw,
    };
    let address = candidate.trim().to_ascii_lowercase();
    if address.contains('@') {
        Some(address)
    } else {
        None
    }
}

/// Build the base64url-encoded RFC 5322 message Gmail expects as `raw`.
fn build_raw_message(to: &str, subject: &str, body: &str) -> String {
    let message = format!(
        "To: {to}\r\nSubject: {subject}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{body}",
    );
    BASE64_URL_SAFE.encode(message.as_bytes())
}
