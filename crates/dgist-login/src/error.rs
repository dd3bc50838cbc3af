/// High-level error category, used to decide whether a failure is retried,
/// surfaced to the user, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Mailbox token missing or expired; the user has to reconnect.
    Authentication,
    /// Network hiccups and malformed mailbox data; retried on the next tick.
    Transient,
    /// A poll or retry budget ran out.
    Exhausted,
    /// The portal page did not look the way we expected.
    Page,
    /// Browser, storage and cancellation problems.
    System,
}

/// Error types produced by the automation flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Access token missing, expired or rejected. Never retried automatically.
    Auth { message: String },

    /// Listing request failed (non-2xx or network) or a message was unreadable.
    Transient { message: String },

    /// An attempt budget ran out before the awaited condition held.
    BudgetExhausted { what: String, attempts: u32 },

    /// An expected form control is absent from the page.
    ElementNotFound { selector: String },

    /// The portal rejected the stored credentials.
    LoginRejected { message: String },

    /// The portal temporarily refuses logins for this account.
    LoginLimited { message: String },

    /// The portal reported some other login failure.
    LoginFailed { message: String },

    /// No stored credentials to fill in.
    MissingCredentials,

    /// The whole session ran past its deadline.
    Timeout { message: String },

    Browser { message: String },
    Cancelled,
}

impl FlowError {
    pub fn auth(message: impl Into<String>) -> Self {
        FlowError::Auth {
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        FlowError::Transient {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            FlowError::Auth { .. } => ErrorCategory::Authentication,
            FlowError::Transient { .. } => ErrorCategory::Transient,
            FlowError::BudgetExhausted { .. } => ErrorCategory::Exhausted,
            FlowError::ElementNotFound { .. }
            | FlowError::LoginRejected { .. }
            | FlowError::LoginLimited { .. }
            | FlowError::LoginFailed { .. }
            | FlowError::MissingCredentials => ErrorCategory::Page,
            FlowError::Timeout { .. } => ErrorCategory::Exhausted,
            FlowError::Browser { .. } | FlowError::Cancelled => ErrorCategory::System,
        }
    }

    /// Returns true if the failing step should simply be attempted again on
    /// its next scheduled wake-up.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FlowError::Transient { .. } | FlowError::ElementNotFound { .. }
        )
    }

    /// Returns the user-facing error message
    pub fn user_message(&self) -> String {
        match self {
            FlowError::Auth { message } => format!(
                "Mailbox access is not available.\n\n{}\n\nReconnect the mailbox and store a fresh access token.",
                message
            ),
            FlowError::Transient { message } => format!("Temporary mailbox problem: {}", message),
            FlowError::BudgetExhausted { what, attempts } => {
                format!("Gave up on {} after {} attempts.", what, attempts)
            }
            FlowError::ElementNotFound { selector } => {
                format!("Could not find the expected page element `{}`.", selector)
            }
            FlowError::LoginRejected { message } => format!(
                "Incorrect ID or password.\n\n{}\n\nThe stored credentials were removed; save new ones and try again.",
                message
            ),
            FlowError::LoginLimited { message } => format!(
                "Login is temporarily limited.\n\n{}\n\nPlease try again later.",
                message
            ),
            FlowError::LoginFailed { message } => format!("Portal login failed.\n\n{}", message),
            FlowError::MissingCredentials => {
                "No stored credentials. Save your portal ID and password first.".to_string()
            }
            FlowError::Timeout { message } => format!("Timed out.\n\n{}", message),
            FlowError::Browser { message } => format!("Browser error.\n\n{}", message),
            FlowError::Cancelled => "Operation cancelled by user.".to_string(),
        }
    }
}

impl std::fmt::Display for FlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for FlowError {}

impl From<anyhow::Error> for FlowError {
    fn from(err: anyhow::Error) -> Self {
        FlowError::Browser {
            message: err.to_string(),
        }
    }
}
