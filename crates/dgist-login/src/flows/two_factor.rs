//! Email one-time-code verification: request a code, wait for it to land in
//! the mailbox, fill it in, submit, then click the confirmation control that
//! shows up after submission and submit once more.

use super::form::FormDriver;
use super::{FlowContext, FlowEnd, Trigger, Wake};
use crate::error::{ErrorCategory, FlowError};
use crate::mailbox::CodeCandidate;
use crate::portal::PageProfile;
use crate::store::StoreExt;
use crate::utils::CancellationToken;
use std::time::Duration;

const NOTIFY_TITLE: &str = "DGIST 2FA";

fn configured(role: &Option<String>) -> Option<&str> {
    role.as_deref().filter(|s| !s.is_empty())
}

#[derive(Debug, Clone)]
pub struct TwoFactorTimings {
    /// Pause after requesting a code, to let the mail go out.
    pub request_delay: Duration,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    /// Pause between filling the code and submitting.
    pub fill_settle: Duration,
    pub confirm_poll: Duration,
    pub confirm_max: Duration,
    /// Pause between clicking the confirmation and resubmitting.
    pub resubmit_delay: Duration,
    pub form_wait_interval: Duration,
    pub form_wait_attempts: u32,
}

impl Default for TwoFactorTimings {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(1000),
            max_poll_attempts: 90,
            fill_settle: Duration::from_millis(200),
            confirm_poll: Duration::from_millis(50),
            confirm_max: Duration::from_millis(5000),
            resubmit_delay: Duration::from_millis(100),
            form_wait_interval: Duration::from_millis(500),
            form_wait_attempts: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoFactorState {
    Idle,
    Requested,
    Polling,
    CodeFound,
    Submitted,
    AwaitingConfirm,
    ConfirmClicked,
    Done,
    Exhausted,
    TimedOutConfirm,
}

impl TwoFactorState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TwoFactorState::Done | TwoFactorState::Exhausted | TwoFactorState::TimedOutConfirm
        )
    }
}

/// Mailbox polling state for one page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSession {
    /// When the code was requested; older codes are rejected.
    pub baseline: u64,
    pub last_submitted_code: Option<String>,
    pub attempt_count: u32,
    pub active: bool,
}

impl PollSession {
    fn new(baseline: u64) -> Self {
        Self {
            baseline,
            last_submitted_code: None,
            attempt_count: 0,
            active: true,
        }
    }
}

pub struct TwoFactorFlow {
    profile: PageProfile,
    timings: TwoFactorTimings,
    state: TwoFactorState,
    session: Option<PollSession>,
    request_sent: bool,
    confirm_clicked: bool,
    confirm_started_at: u64,
    form_wait_attempts: u32,
    auth_notified: bool,
    cancel: CancellationToken,
}

impl TwoFactorFlow {
    pub fn new(profile: PageProfile, timings: TwoFactorTimings, cancel: CancellationToken) -> Self {
        Self {
            profile,
            timings,
            state: TwoFactorState::Idle,
            session: None,
            request_sent: false,
            confirm_clicked: false,
            confirm_started_at: 0,
            form_wait_attempts: 0,
            auth_notified: false,
            cancel,
        }
    }

    pub fn state(&self) -> TwoFactorState {
        self.state
    }

    pub fn poll_session(&self) -> Option<&PollSession> {
        self.session.as_ref()
    }

    fn transition(&mut self, next: TwoFactorState) {
        log::debug!("[2FA] {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub fn step(&mut self, ctx: &FlowContext<'_>, trigger: Trigger) -> Wake {
        if self.cancel.is_cancelled() {
            return Wake::failed(FlowError::Cancelled);
        }

        match (self.state, trigger) {
            (TwoFactorState::Idle, _) => self.start(ctx, trigger),
            (TwoFactorState::Requested, Trigger::Timer) => {
                self.transition(TwoFactorState::Polling);
                self.poll(ctx)
            }
            (TwoFactorState::Polling, Trigger::Timer) => self.poll(ctx),
            (TwoFactorState::CodeFound, Trigger::Timer) => self.submit_code(ctx),
            (TwoFactorState::AwaitingConfirm, _) => self.check_confirm(ctx, trigger),
            (TwoFactorState::ConfirmClicked, Trigger::Timer) => self.resubmit(ctx),
            (state, _) if state.is_terminal() => Wake::Finished(FlowEnd::Completed),
            _ => Wake::Unchanged,
        }
    }

    /// Idle: wait for the code form, then request a code exactly once.
    fn start(&mut self, ctx: &FlowContext<'_>, trigger: Trigger) -> Wake {
        let selectors = self.profile.selectors.clone();
        let (Some(code_input), Some(submit)) = (
            configured(&selectors.code_input),
            configured(&selectors.submit_button),
        ) else {
            return Wake::failed(FlowError::ElementNotFound {
                selector: "code input / submit button".to_string(),
            });
        };

        let ready = ctx.page.exists(code_input).unwrap_or(false)
            && ctx.page.exists(submit).unwrap_or(false);
        if !ready {
            if trigger == Trigger::Mutation {
                return Wake::Unchanged;
            }
            self.form_wait_attempts += 1;
            log::info!(
                "[2FA] Verification form not found yet. Attempt {}/{}",
                self.form_wait_attempts,
                self.timings.form_wait_attempts
            );
            if self.form_wait_attempts >= self.timings.form_wait_attempts {
                ctx.notifier.notify(
                    NOTIFY_TITLE,
                    "Could not find the verification code form. Please try refreshing the page.",
                );
                return Wake::failed(FlowError::ElementNotFound {
                    selector: code_input.to_string(),
                });
            }
            return Wake::After(self.timings.form_wait_interval);
        }

        let request = configured(&selectors.request_code_button)
            .filter(|sel| ctx.page.exists(sel).unwrap_or(false));

        match request {
            Some(button) if !self.request_sent => {
                self.request_sent = true;
                self.session = Some(PollSession::new(ctx.now_ms));
                log::info!("[2FA] Requesting a verification code...");
                if let Err(e) = ctx.page.click(button) {
                    log::warn!("[2FA] Request button click failed: {}", e);
                }
                self.transition(TwoFactorState::Requested);
                Wake::After(self.timings.request_delay)
            }
            _ => {
                log::info!("[2FA] No request control; polling for a code sent earlier");
                self.session = Some(PollSession::new(ctx.now_ms));
                self.transition(TwoFactorState::Polling);
                Wake::now()
            }
        }
    }

    fn poll(&mut self, ctx: &FlowContext<'_>) -> Wake {
        let Some(session) = self.session.as_mut() else {
            return Wake::failed(FlowError::transient("polling without a session"));
        };
        session.attempt_count += 1;
        let attempt = session.attempt_count;
        let baseline = session.baseline;
        log::info!(
            "[2FA] Poll attempt {}/{}",
            attempt,
            self.timings.max_poll_attempts
        );

        let result = match ctx.store.access_token() {
            Ok(Some(token)) => ctx.mailbox.fetch_newest_code(&token, baseline, ctx.now_ms),
            Ok(None) => Err(FlowError::auth("No mailbox access token is stored.")),
            Err(e) => Err(FlowError::transient(format!("reading token: {}", e))),
        };

        // The page may have gone away while the request was in flight.
        if self.cancel.is_cancelled() || self.state != TwoFactorState::Polling {
            return Wake::failed(FlowError::Cancelled);
        }

        let last_submitted = self
            .session
            .as_ref()
            .and_then(|s| s.last_submitted_code.clone());

        match result {
            Ok(Some(candidate)) if last_submitted.as_deref() != Some(candidate.digits.as_str()) => {
                log::info!(
                    "[2FA] New code obtained from mailbox (stamped {})",
                    candidate.observed_at
                );
                if let Some(wake) = self.fill_code(ctx, candidate) {
                    return wake;
                }
            }
            Ok(_) => {}
            Err(e) if e.category() == ErrorCategory::Authentication => {
                log::warn!("[2FA] {}", e.user_message().replace('\n', " "));
                if !self.auth_notified {
                    self.auth_notified = true;
                    ctx.notifier.notify(NOTIFY_TITLE, &e.user_message());
                }
            }
            Err(e) => log::warn!("[2FA] Error while polling mailbox: {}", e),
        }

        if attempt >= self.timings.max_poll_attempts {
            log::info!("[2FA] Gave up waiting for a new code.");
            if let Some(session) = self.session.as_mut() {
                session.active = false;
            }
            self.transition(TwoFactorState::Exhausted);
            ctx.notifier.notify(
                NOTIFY_TITLE,
                "Waited for a code but none arrived. You can request a new code and try again.",
            );
            return Wake::failed(FlowError::BudgetExhausted {
                what: "verification code".to_string(),
                attempts: attempt,
            });
        }

        Wake::After(self.timings.poll_interval)
    }

    /// Fills the code and stops polling. `None` means the fill failed and
    /// polling goes on.
    fn fill_code(&mut self, ctx: &FlowContext<'_>, candidate: CodeCandidate) -> Option<Wake> {
        let code_input = self.profile.selectors.code_input.clone()?;
        if let Err(e) = FormDriver::new(ctx.page).set_value_and_notify(&code_input, &candidate.digits)
        {
            log::warn!("[2FA] Could not fill the code: {}", e);
            return None;
        }

        if let Some(session) = self.session.as_mut() {
            session.last_submitted_code = Some(candidate.digits);
            session.active = false;
        }
        self.transition(TwoFactorState::CodeFound);
        Some(Wake::After(self.timings.fill_settle))
    }

    fn submit_code(&mut self, ctx: &FlowContext<'_>) -> Wake {
        let selectors = &self.profile.selectors;
        let submit = selectors.submit_button.as_deref().unwrap_or_default();
        log::info!("[2FA] Submitting the verification code");
        match FormDriver::new(ctx.page).submit(
            submit,
            selectors.form.as_deref(),
            selectors.code_input.as_deref(),
        ) {
            Ok(method) => log::debug!("[2FA] Submitted via {:?}", method),
            Err(e) => log::warn!("[2FA] Submit failed: {}", e),
        }

        self.transition(TwoFactorState::Submitted);
        self.confirm_started_at = ctx.now_ms;
        self.transition(TwoFactorState::AwaitingConfirm);
        Wake::After(self.timings.confirm_poll)
    }

    fn check_confirm(&mut self, ctx: &FlowContext<'_>, trigger: Trigger) -> Wake {
        let confirm = self.profile.selectors.confirm_button.clone();
        let driver = FormDriver::new(ctx.page);

        if let Some(confirm) = confirm.as_deref() {
            if !self.confirm_clicked && driver.is_interactable(confirm) {
                self.confirm_clicked = true;
                log::info!("[2FA] Clicking confirmation after submit");
                if let Err(e) = ctx.page.click(confirm) {
                    log::warn!("[2FA] Confirmation click failed: {}", e);
                }
                self.transition(TwoFactorState::ConfirmClicked);
                return Wake::After(self.timings.resubmit_delay);
            }
        }

        let waited = ctx.now_ms.saturating_sub(self.confirm_started_at);
        if waited >= self.timings.confirm_max.as_millis() as u64 {
            log::info!("[2FA] No confirmation appeared; assuming the first submit sufficed");
            self.transition(TwoFactorState::TimedOutConfirm);
            return Wake::Finished(FlowEnd::Completed);
        }

        match trigger {
            Trigger::Timer => Wake::After(self.timings.confirm_poll),
            Trigger::Mutation => Wake::Unchanged,
        }
    }

    fn resubmit(&mut self, ctx: &FlowContext<'_>) -> Wake {
        let selectors = &self.profile.selectors;
        let submit = selectors.submit_button.as_deref().unwrap_or_default();
        log::info!("[2FA] Submitting again after confirmation");
        if let Err(e) = FormDriver::new(ctx.page).submit(
            submit,
            selectors.form.as_deref(),
            selectors.code_input.as_deref(),
        ) {
            log::warn!("[2FA] Resubmit failed: {}", e);
        }
        self.transition(TwoFactorState::Done);
        log::info!("[✓] Two-factor verification submitted.");
        Wake::Finished(FlowEnd::Completed)
    }
}
