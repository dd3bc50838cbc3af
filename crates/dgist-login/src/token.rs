use serde::{Deserialize, Serialize};

/// Default margin before the nominal expiry at which a token stops being used.
pub const DEFAULT_EXPIRY_SKEW_MS: u64 = 5_000;

/// Opaque mailbox bearer credential, as stored by the settings surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub token: String,
    /// Milliseconds since the Unix epoch.
    pub issued_at: u64,
    pub ttl_seconds: u64,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, issued_at: u64, ttl_seconds: u64) -> Self {
        Self {
            token: token.into(),
            issued_at,
            ttl_seconds,
        }
    }

    pub fn expires_at(&self) -> u64 {
        self.issued_at
            .saturating_add(self.ttl_seconds.saturating_mul(1000))
    }

    /// Valid while `now < issued_at + ttl - skew`, so a request never starts
    /// with a token about to expire.
    pub fn is_valid_at(&self, now_ms: u64, skew_ms: u64) -> bool {
        !self.token.is_empty() && now_ms < self.expires_at().saturating_sub(skew_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_token_is_invalid() {
        let token = AccessToken::new("ya29", 0, 10);
        assert!(!token.is_valid_at(20_000, DEFAULT_EXPIRY_SKEW_MS));
    }

    #[test]
    fn skew_trims_the_tail_of_the_lifetime() {
        let token = AccessToken::new("ya29", 1_000, 60);
        assert!(token.is_valid_at(55_999, 5_000));
        assert!(!token.is_valid_at(56_000, 5_000));
        assert!(token.is_valid_at(60_999, 0));
    }

    #[test]
    fn empty_token_is_never_valid() {
        let token = AccessToken::new("", 0, 3600);
        assert!(!token.is_valid_at(1, 0));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(AccessToken::new("t", 5, 3599)).unwrap();
        assert_eq!(json["issuedAt"], 5);
        assert_eq!(json["ttlSeconds"], 3599);
    }
}
