//! # DGIST Portal Auto-Login Library
//!
//! This library drives a Chrome tab through the DGIST single sign-on and
//! authentication portals: it fills the stored credentials, requests an email
//! verification code, reads the code from the user's mailbox and submits it.

pub mod browser;
pub mod clock;
pub mod error;
pub mod flows;
pub mod logger;
pub mod mailbox;
pub mod notify;
pub mod page;
pub mod portal;
pub mod session;
pub mod store;
pub mod token;
pub mod utils;

// Re-export commonly used items
pub use error::{ErrorCategory, FlowError};
pub use logger::init_logger;
pub use mailbox::{GmailApi, MailboxClient, MailboxConfig};
pub use notify::{DesktopNotifier, LogNotifier, Notifier, TerminalNotifier};
pub use portal::{classify, default_profiles, PageProfile, PortalKind};
pub use session::{run_portal_login, PortalSession, SessionConfig, SessionOutcome};
pub use store::{Credentials, JsonFileStore, MemoryStore, Store, StoreExt};
pub use token::AccessToken;
pub use utils::{get_user_data_dir, CancellationToken};
