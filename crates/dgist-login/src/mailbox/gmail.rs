//! Gmail REST transport and wire types.

use super::MailboxApi;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// Full message as returned by `messages.get`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    #[serde(default)]
    pub id: String,
    /// Epoch milliseconds; Gmail sends it as a decimal string.
    #[serde(default)]
    pub internal_date: Option<Value>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
}

impl MessagePart {
    fn data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
    }
}

impl GmailMessage {
    pub fn timestamp_ms(&self) -> u64 {
        match &self.internal_date {
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            _ => 0,
        }
    }

    /// Encoded plain-text body: an explicit `text/plain` part, else the first
    /// part, else the top-level body.
    pub fn encoded_text_body(&self) -> Option<&str> {
        let payload = self.payload.as_ref()?;
        if payload.parts.is_empty() {
            return payload.data();
        }
        payload
            .parts
            .iter()
            .find(|p| {
                p.mime_type
                    .as_deref()
                    .is_some_and(|m| m.contains("text/plain"))
            })
            .or_else(|| payload.parts.first())
            .and_then(MessagePart::data)
    }
}

/// Blocking Gmail client authenticated per call with a bearer token.
pub struct GmailApi {
    client: Client,
    base_url: String,
}

impl GmailApi {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(GMAIL_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl MailboxApi for GmailApi {
    fn list_message_ids(
        &self,
        token: &str,
        query: &str,
        max_results: u32,
    ) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/messages", self.base_url);
        let max_results = max_results.to_string();
        let list = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("q", query), ("maxResults", max_results.as_str())])
            .send()?
            .error_for_status()?
            .json::<MessageList>()?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    fn get_message(&self, token: &str, id: &str) -> anyhow::Result<GmailMessage> {
        let url = format!("{}/messages/{}", self.base_url, id);
        Ok(self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()?
            .error_for_status()?
            .json::<GmailMessage>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GmailMessage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn prefers_plain_text_part() {
        let msg = parse(
            r#"{"id":"m1","internalDate":"1700000000123","payload":{"parts":[
                {"mimeType":"text/html","body":{"data":"aHRtbA"}},
                {"mimeType":"text/plain; charset=UTF-8","body":{"data":"cGxhaW4"}}]}}"#,
        );
        assert_eq!(msg.timestamp_ms(), 1_700_000_000_123);
        assert_eq!(msg.encoded_text_body(), Some("cGxhaW4"));
    }

    #[test]
    fn falls_back_to_first_part_then_top_level_body() {
        let msg = parse(
            r#"{"id":"m2","payload":{"parts":[{"mimeType":"text/html","body":{"data":"Zmlyc3Q"}}]}}"#,
        );
        assert_eq!(msg.encoded_text_body(), Some("Zmlyc3Q"));

        let msg = parse(r#"{"id":"m3","internalDate":42,"payload":{"body":{"data":"dG9w"}}}"#);
        assert_eq!(msg.timestamp_ms(), 42);
        assert_eq!(msg.encoded_text_body(), Some("dG9w"));
    }

    #[test]
    fn missing_payload_has_no_body() {
        let msg = parse(r#"{"id":"m4"}"#);
        assert_eq!(msg.encoded_text_body(), None);
        assert_eq!(msg.timestamp_ms(), 0);
    }
}
