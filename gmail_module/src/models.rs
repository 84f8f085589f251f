//! Serde models for the Gmail REST API surface this crate touches.

use serde::Deserialize;

/// Response from `GET /users/{user}/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageListResponse {
    pub messages: Option<Vec<MessageRef>>,
    #[serde(rename = "resultSizeEstimate")]
    #[allow(dead_code)]
    pub result_size_estimate: Option<u32>,
}

/// One entry in a message list.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub id: String,
    #[serde(rename = "threadId")]
    #[allow(dead_code)]
    pub thread_id: Option<String>,
}

/// Response from `GET /users/{user}/messages/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    pub payload: Option<MessagePayload>,
}

/// A MIME payload node. The top-level payload carries the headers; multipart
/// messages nest their alternatives under `parts`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MessagePayload {
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    pub headers: Option<Vec<MessageHeader>>,
    pub body: Option<MessageBody>,
    pub parts: Option<Vec<MessagePayload>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MessageBody {
    /// Base64url-encoded content; absent for container parts.
    pub data: Option<String>,
    #[allow(dead_code)]
    pub size: Option<u64>,
}

/// Response from `POST /users/{user}/drafts`.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftResponse {
    pub id: String,
}

impl MessagePayload {
    /// Value of the first header matching `name`, case-insensitive.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.as_ref().and_then(|headers| {
            headers
                .iter()
                .find(|header| header.name.eq_ignore_ascii_case(name))
                .map(|header| header.value.as_str())
        })
    }
}
