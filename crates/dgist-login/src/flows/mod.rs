//! Per-page-load automation flows, driven cooperatively by the session loop.
//!
//! A flow never sleeps. Each call to `step` does the work due at that instant
//! and answers with the delay until it wants to run again.

pub mod form;
pub mod login;
pub mod two_factor;

use crate::error::FlowError;
use crate::mailbox::MailboxClient;
use crate::notify::Notifier;
use crate::page::Page;
use crate::portal::PageProfile;
use crate::store::Store;
use std::time::Duration;

pub use form::{FormDriver, SubmitMethod};
pub use login::{classify_login_error, LoginErrorKind, LoginFlow, LoginState, LoginTimings};
pub use two_factor::{PollSession, TwoFactorFlow, TwoFactorState, TwoFactorTimings};

/// Collaborators handed to a flow for one step.
pub struct FlowContext<'a> {
    pub page: &'a dyn Page,
    pub store: &'a dyn Store,
    pub notifier: &'a dyn Notifier,
    pub mailbox: &'a MailboxClient,
    pub profiles: &'a [PageProfile],
    pub now_ms: u64,
}

/// Why a flow is being stepped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Its scheduled wake-up arrived.
    Timer,
    /// The DOM changed; re-check without consuming retry budget.
    Mutation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEnd {
    Completed,
    /// The login page turned into the two-factor page.
    HandOffToTwoFactor,
    Failed(FlowError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wake {
    After(Duration),
    /// Keep whatever wake-up was already scheduled.
    Unchanged,
    Finished(FlowEnd),
}

impl Wake {
    pub fn now() -> Self {
        Wake::After(Duration::ZERO)
    }

    pub fn failed(err: FlowError) -> Self {
        Wake::Finished(FlowEnd::Failed(err))
    }
}

/// Either flow, as owned by the session for the current page load.
pub enum ActiveFlow {
    Login(LoginFlow),
    TwoFactor(TwoFactorFlow),
}

impl ActiveFlow {
    pub fn step(&mut self, ctx: &FlowContext<'_>, trigger: Trigger) -> Wake {
        match self {
            ActiveFlow::Login(flow) => flow.step(ctx, trigger),
            ActiveFlow::TwoFactor(flow) => flow.step(ctx, trigger),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActiveFlow::Login(_) => "login",
            ActiveFlow::TwoFactor(_) => "two-factor",
        }
    }
}
