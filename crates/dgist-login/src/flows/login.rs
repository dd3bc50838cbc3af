use super::form::FormDriver;
use super::{FlowContext, FlowEnd, Trigger, Wake};
use crate::error::FlowError;
use crate::portal::{classify, PageProfile};
use crate::store::{Credentials, StoreExt};
use crate::utils::CancellationToken;
use std::time::Duration;

const NOTIFY_TITLE: &str = "DGIST Portal Login";

#[derive(Debug, Clone)]
pub struct LoginTimings {
    pub form_retry_interval: Duration,
    pub form_retry_attempts: u32,
    /// Pause between filling the form and submitting it.
    pub pre_submit_delay: Duration,
    pub error_check_interval: Duration,
    pub error_checks: u32,
}

impl Default for LoginTimings {
    fn default() -> Self {
        Self {
            form_retry_interval: Duration::from_millis(500),
            form_retry_attempts: 10,
            pre_submit_delay: Duration::from_millis(500),
            error_check_interval: Duration::from_millis(500),
            error_checks: 11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Start,
    WaitingForForm,
    Filled,
    WatchingErrors,
    Done,
    Failed,
}

/// What the portal's error banner is complaining about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginErrorKind {
    WrongCredentials,
    RateLimited,
    Other,
}

pub fn classify_login_error(text: &str) -> LoginErrorKind {
    if text.contains("ID or password is incorrect") {
        LoginErrorKind::WrongCredentials
    } else if text.contains("limited to log in for") {
        LoginErrorKind::RateLimited
    } else {
        LoginErrorKind::Other
    }
}

/// Fills and submits a portal login form with the stored credentials, then
/// watches the page for an error banner.
pub struct LoginFlow {
    profile: PageProfile,
    timings: LoginTimings,
    state: LoginState,
    credentials: Option<Credentials>,
    form_attempts: u32,
    error_checks: u32,
    cancel: CancellationToken,
}

impl LoginFlow {
    pub fn new(profile: PageProfile, timings: LoginTimings, cancel: CancellationToken) -> Self {
        Self {
            profile,
            timings,
            state: LoginState::Start,
            credentials: None,
            form_attempts: 0,
            error_checks: 0,
            cancel,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    fn finish(&mut self, end: FlowEnd) -> Wake {
        self.state = match end {
            FlowEnd::Failed(_) => LoginState::Failed,
            _ => LoginState::Done,
        };
        Wake::Finished(end)
    }

    pub fn step(&mut self, ctx: &FlowContext<'_>, trigger: Trigger) -> Wake {
        if self.cancel.is_cancelled() {
            return self.finish(FlowEnd::Failed(FlowError::Cancelled));
        }

        // Some logins land straight on the verification page.
        if let Ok(url) = ctx.page.url() {
            if classify(&url, ctx.profiles).is_some_and(|p| p.kind.is_two_factor()) {
                log::info!("[*] Two-factor page reached, handing off");
                return self.finish(FlowEnd::HandOffToTwoFactor);
            }
        }

        match (self.state, trigger) {
            (LoginState::Start, _) => self.start(ctx),
            (LoginState::WaitingForForm, _) => self.fill(ctx, trigger),
            (LoginState::Filled, Trigger::Timer) => self.submit(ctx),
            (LoginState::WatchingErrors, _) => self.watch_errors(ctx, trigger),
            (LoginState::Done, _) => Wake::Finished(FlowEnd::Completed),
            _ => Wake::Unchanged,
        }
    }

    fn start(&mut self, ctx: &FlowContext<'_>) -> Wake {
        let credentials = match ctx.store.credentials() {
            Ok(Some(credentials)) => credentials,
            Ok(None) => {
                log::warn!("[!] No stored credentials");
                ctx.notifier.notify(
                    NOTIFY_TITLE,
                    "Please run `dgist-login --set-credentials` to enter your credentials.",
                );
                return self.finish(FlowEnd::Failed(FlowError::MissingCredentials));
            }
            Err(e) => return self.finish(FlowEnd::Failed(e.into())),
        };

        self.credentials = Some(credentials);
        self.state = LoginState::WaitingForForm;
        self.fill(ctx, Trigger::Timer)
    }

    fn form_ready(&self, ctx: &FlowContext<'_>) -> Option<(String, String, String)> {
        let s = &self.profile.selectors;
        let username = s.username.clone()?;
        let password = s.password.clone()?;
        let submit = s.submit_button.clone()?;
        let present = |sel: &str| ctx.page.exists(sel).unwrap_or(false);
        (present(&username) && present(&password) && present(&submit))
            .then_some((username, password, submit))
    }

    /// Spends one form retry; fails once the budget is used up.
    fn retry_form(&mut self, ctx: &FlowContext<'_>, cause: FlowError) -> Wake {
        self.state = LoginState::WaitingForForm;
        self.form_attempts += 1;
        log::info!(
            "[*] Login form not ready ({}). Retry {}/{}",
            cause,
            self.form_attempts,
            self.timings.form_retry_attempts
        );
        if self.form_attempts >= self.timings.form_retry_attempts {
            ctx.notifier.notify(
                NOTIFY_TITLE,
                "Could not find login form elements. Please try refreshing the page.",
            );
            let err = match cause {
                FlowError::ElementNotFound { .. } => cause,
                _ => FlowError::ElementNotFound {
                    selector: self.profile.selectors.username.clone().unwrap_or_default(),
                },
            };
            return self.finish(FlowEnd::Failed(err));
        }
        Wake::After(self.timings.form_retry_interval)
    }

    fn fill(&mut self, ctx: &FlowContext<'_>, trigger: Trigger) -> Wake {
        let Some((username, password, _)) = self.form_ready(ctx) else {
            if trigger == Trigger::Mutation {
                return Wake::Unchanged;
            }
            let selector = self.profile.selectors.username.clone().unwrap_or_default();
            return self.retry_form(ctx, FlowError::ElementNotFound { selector });
        };

        let Some(credentials) = self.credentials.as_ref() else {
            return self.finish(FlowEnd::Failed(FlowError::MissingCredentials));
        };

        log::info!("[*] Filling login form for {}", credentials.username);
        let driver = FormDriver::new(ctx.page);
        let filled = driver
            .set_value_and_notify(&username, &credentials.username)
            .and_then(|_| driver.set_value_and_notify(&password, &credentials.password));
        match filled {
            Ok(()) => {}
            Err(e) if e.is_retryable() => return self.retry_form(ctx, e),
            Err(e) => return self.finish(FlowEnd::Failed(e)),
        }

        if let Some(remember) = self.profile.selectors.remember_checkbox.as_deref() {
            if ctx.page.exists(remember).unwrap_or(false) {
                if let Err(e) = driver.ensure_checked(remember) {
                    log::warn!("[!] Could not tick {}: {}", remember, e);
                }
            }
        }

        self.state = LoginState::Filled;
        Wake::After(self.timings.pre_submit_delay)
    }

    fn submit(&mut self, ctx: &FlowContext<'_>) -> Wake {
        let s = &self.profile.selectors;
        let submit = s.submit_button.as_deref().unwrap_or_default();
        match FormDriver::new(ctx.page).submit(submit, s.form.as_deref(), s.password.as_deref()) {
            Ok(method) => log::info!("[*] Login form submitted ({:?})", method),
            Err(e) if e.is_retryable() => return self.retry_form(ctx, e),
            Err(e) => return self.finish(FlowEnd::Failed(e)),
        }
        self.state = LoginState::WatchingErrors;
        Wake::After(self.timings.error_check_interval)
    }

    fn watch_errors(&mut self, ctx: &FlowContext<'_>, trigger: Trigger) -> Wake {
        let banner = self
            .profile
            .selectors
            .error_banner
            .as_deref()
            .and_then(|sel| ctx.page.text(sel).ok().flatten())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        if let Some(text) = banner {
            return self.report(ctx, text);
        }

        if trigger == Trigger::Mutation {
            return Wake::Unchanged;
        }
        self.error_checks += 1;
        if self.error_checks >= self.timings.error_checks {
            log::info!("[✓] No login error reported");
            return self.finish(FlowEnd::Completed);
        }
        Wake::After(self.timings.error_check_interval)
    }

    fn report(&mut self, ctx: &FlowContext<'_>, text: String) -> Wake {
        log::warn!("[!] Portal reported: {}", text);
        let err = match classify_login_error(&text) {
            LoginErrorKind::WrongCredentials => {
                if let Err(e) = ctx.store.clear_credentials() {
                    log::error!("[!] Could not clear stored credentials: {}", e);
                }
                ctx.notifier.notify(
                    "DGIST Portal Login Failed",
                    "Your ID or password is incorrect. Please update your credentials.",
                );
                FlowError::LoginRejected { message: text }
            }
            LoginErrorKind::RateLimited => {
                ctx.notifier.notify("DGIST Portal Login Limited", &text);
                FlowError::LoginLimited { message: text }
            }
            LoginErrorKind::Other => {
                ctx.notifier.notify(NOTIFY_TITLE, &text);
                FlowError::LoginFailed { message: text }
            }
        };
        self.finish(FlowEnd::Failed(err))
    }
}
