//! One-time code retrieval from the user's mailbox.

pub mod gmail;

use crate::error::FlowError;
use crate::store::{Store, StoreExt};
use crate::token::{AccessToken, DEFAULT_EXPIRY_SKEW_MS};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

pub use gmail::{GmailApi, GmailMessage};

/// Minimal mailbox REST surface: search by query, then fetch by id.
pub trait MailboxApi: Send + Sync {
    fn list_message_ids(
        &self,
        token: &str,
        query: &str,
        max_results: u32,
    ) -> anyhow::Result<Vec<String>>;

    fn get_message(&self, token: &str, id: &str) -> anyhow::Result<GmailMessage>;
}

#[derive(Debug, Clone)]
pub struct MailboxConfig {
    /// Address the portal sends verification mails from.
    pub sender: String,
    /// Search recency window, in mailbox query syntax.
    pub recency_window: String,
    pub max_results: u32,
    /// How far before the baseline a message may be stamped and still count.
    pub code_tolerance_ms: u64,
    pub expiry_skew_ms: u64,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            sender: "no-reply@dgist.ac.kr".to_string(),
            recency_window: "1h".to_string(),
            max_results: 5,
            code_tolerance_ms: 2_000,
            expiry_skew_ms: DEFAULT_EXPIRY_SKEW_MS,
        }
    }
}

/// A six-digit code found in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeCandidate {
    pub digits: String,
    /// Message timestamp, epoch milliseconds.
    pub observed_at: u64,
}

static CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])([0-9]{6})(?:[^0-9]|$)").expect("valid code pattern"));

static BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// First run of exactly six digits not embedded in a longer number.
pub fn extract_code(text: &str) -> Option<String> {
    CODE_PATTERN
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Decodes a base64url message body, tolerating missing padding and stray whitespace.
pub fn decode_body(data: &str) -> anyhow::Result<String> {
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64URL.decode(compact.as_bytes())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Candidates stamped at or after `baseline - tolerance`, newest first wins.
pub fn select_newest(
    candidates: impl IntoIterator<Item = CodeCandidate>,
    baseline_ms: u64,
    tolerance_ms: u64,
) -> Option<CodeCandidate> {
    let floor = baseline_ms.saturating_sub(tolerance_ms);
    candidates
        .into_iter()
        .filter(|c| c.observed_at >= floor)
        .fold(None, |best: Option<CodeCandidate>, c| match best {
            Some(b) if b.observed_at >= c.observed_at => Some(b),
            _ => Some(c),
        })
}

pub struct MailboxClient {
    api: Box<dyn MailboxApi>,
    store: Arc<dyn Store>,
    config: MailboxConfig,
}

impl MailboxClient {
    pub fn new(api: Box<dyn MailboxApi>, store: Arc<dyn Store>, config: MailboxConfig) -> Self {
        Self { api, store, config }
    }

    pub fn config(&self) -> &MailboxConfig {
        &self.config
    }

    pub fn query(&self) -> String {
        format!(
            "from:{} newer_than:{}",
            self.config.sender, self.config.recency_window
        )
    }

    /// Finds the newest code not older than `baseline_ms - tolerance`.
    ///
    /// The token is checked locally first; an invalid one fails with
    /// [`FlowError::Auth`] without touching the network. A failed listing is
    /// [`FlowError::Transient`]. Individual messages that cannot be fetched or
    /// decoded are skipped.
    pub fn fetch_newest_code(
        &self,
        token: &AccessToken,
        baseline_ms: u64,
        now_ms: u64,
    ) -> Result<Option<CodeCandidate>, FlowError> {
        if !token.is_valid_at(now_ms, self.config.expiry_skew_ms) {
            return Err(FlowError::auth(
                "The stored mailbox token is missing or expired.",
            ));
        }

        let ids = self
            .api
            .list_message_ids(&token.token, &self.query(), self.config.max_results)
            .map_err(|e| FlowError::transient(format!("listing messages failed: {}", e)))?;

        if ids.is_empty() {
            return Ok(None);
        }

        let mut candidates = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.inspect_message(&token.token, id) {
                Ok(Some(candidate)) => candidates.push(candidate),
                Ok(None) => log::debug!("[2FA] Message {} carries no code", id),
                Err(e) => log::warn!("[2FA] Failed to read message {}: {}", id, e),
            }
        }

        let best = select_newest(candidates, baseline_ms, self.config.code_tolerance_ms);
        if let Some(ref candidate) = best {
            if let Err(e) = self.store.save_last_known_code(&candidate.digits) {
                log::debug!("[2FA] Could not record last known code: {}", e);
            }
        }
        Ok(best)
    }

    /// Reads the newest code in the search window regardless of age, using
    /// the stored token. Used to show the current code on demand.
    pub fn fetch_latest_code(&self, now_ms: u64) -> Result<Option<CodeCandidate>, FlowError> {
        let token = self
            .store
            .access_token()
            .map_err(|e| FlowError::transient(format!("reading token: {}", e)))?
            .ok_or_else(|| FlowError::auth("No mailbox access token is stored."))?;
        self.fetch_newest_code(&token, 0, now_ms)
    }

    fn inspect_message(&self, token: &str, id: &str) -> anyhow::Result<Option<CodeCandidate>> {
        let message = self.api.get_message(token, id)?;
        let Some(data) = message.encoded_text_body() else {
            return Ok(None);
        };
        let text = decode_body(data)?;
        Ok(extract_code(&text).map(|digits| CodeCandidate {
            digits,
            observed_at: message.timestamp_ms(),
        }))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::gmail::{GmailMessage, MessagePart, PartBody};
    use super::MailboxApi;
    use base64::Engine;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted mailbox: a list of (id, timestamp, plain text) or failures.
    #[derive(Default)]
    pub(crate) struct FakeMailboxApi {
        pub(crate) messages: Mutex<Vec<(String, u64, String)>>,
        pub(crate) broken_ids: Mutex<Vec<String>>,
        pub(crate) fail_listing: Mutex<bool>,
        pub(crate) list_calls: AtomicUsize,
    }

    impl FakeMailboxApi {
        pub(crate) fn push(&self, id: &str, ts: u64, text: &str) {
            self.messages
                .lock()
                .unwrap()
                .push((id.to_string(), ts, text.to_string()));
        }

        pub(crate) fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    impl MailboxApi for FakeMailboxApi {
        fn list_message_ids(&self, _: &str, _: &str, max: u32) -> anyhow::Result<Vec<String>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail_listing.lock().unwrap() {
                anyhow::bail!("503 Service Unavailable");
            }
            Ok(self
                .messages
                .lock()
                .unwrap()
                .iter()
                .rev()
                .take(max as usize)
                .map(|(id, _, _)| id.clone())
                .collect())
        }

        fn get_message(&self, _: &str, id: &str) -> anyhow::Result<GmailMessage> {
            if self.broken_ids.lock().unwrap().iter().any(|b| b == id) {
                anyhow::bail!("500 Internal Server Error");
            }
            let messages = self.messages.lock().unwrap();
            let (_, ts, text) = messages
                .iter()
                .find(|(i, _, _)| i == id)
                .ok_or_else(|| anyhow::anyhow!("404 Not Found"))?;
            let data = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(text.as_bytes());
            Ok(GmailMessage {
                id: id.to_string(),
                internal_date: Some(Value::String(ts.to_string())),
                payload: Some(MessagePart {
                    mime_type: Some("text/plain".into()),
                    body: Some(PartBody { data: Some(data) }),
                    parts: Vec::new(),
                }),
            })
        }
    }

    /// Shares one fake between the test and the client that owns a `Box`.
    impl MailboxApi for std::sync::Arc<FakeMailboxApi> {
        fn list_message_ids(&self, t: &str, q: &str, max: u32) -> anyhow::Result<Vec<String>> {
            (**self).list_message_ids(t, q, max)
        }

        fn get_message(&self, t: &str, id: &str) -> anyhow::Result<GmailMessage> {
            (**self).get_message(t, id)
        }
    }
}
