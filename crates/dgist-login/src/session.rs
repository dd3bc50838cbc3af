use crate::browser::{close_browser, create_browser, initial_tab};
use crate::clock::{Clock, SystemClock};
use crate::error::FlowError;
use crate::flows::{
    ActiveFlow, FlowContext, FlowEnd, LoginFlow, LoginTimings, Trigger, TwoFactorFlow,
    TwoFactorTimings, Wake,
};
use crate::mailbox::MailboxClient;
use crate::notify::Notifier;
use crate::page::chrome::ChromePage;
use crate::page::observer::{PageEvent, PageObserver};
use crate::page::Page;
use crate::portal::{classify, default_profiles, PageProfile, PortalKind};
use crate::store::Store;
use crate::utils::CancellationToken;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_START_URL: &str = "https://isign.dgist.ac.kr/authentication/login";
/// Consecutive unreadable observations after which the browser counts as gone.
const MAX_HEARTBEAT_FAILURES: u32 = 12;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub struct SessionConfig {
    pub start_url: String,
    pub headless: bool,
    pub user_agent: String,
    pub profiles: Vec<PageProfile>,
    pub two_factor: TwoFactorTimings,
    pub login: LoginTimings,
    /// Deadline for the whole run, from the first observed page.
    pub overall_timeout: Duration,
    /// How often the page address and DOM are sampled.
    pub observe_interval: Duration,
    /// How long a page without work must stay put before the run ends.
    pub settle_time: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            profiles: default_profiles(),
            two_factor: TwoFactorTimings::default(),
            login: LoginTimings::default(),
            overall_timeout: Duration::from_secs(180),
            observe_interval: Duration::from_millis(250),
            settle_time: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Nothing left to automate on the page the browser ended up on.
    Completed { final_url: String },
}

/// The flow owned by the current page load.
struct Running {
    flow: ActiveFlow,
    cancel: CancellationToken,
    next_at: Option<u64>,
}

impl Running {
    fn drop_flow(self) {
        log::debug!("[*] Dropping {} flow", self.flow.name());
        self.cancel.cancel();
    }
}

/// Drives one portal visit: watches the page, starts the matching flow on
/// each load, and steps it whenever its timer fires or the DOM changes.
pub struct PortalSession<'a> {
    page: &'a dyn Page,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    mailbox: MailboxClient,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    cancel: CancellationToken,
}

impl<'a> PortalSession<'a> {
    pub fn new(
        page: &'a dyn Page,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        mailbox: MailboxClient,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            page,
            store,
            notifier,
            mailbox,
            clock,
            config,
            cancel,
        }
    }

    fn flow_for(&self, url: &str) -> Option<Running> {
        let profile = classify(url, &self.config.profiles)?;
        let cancel = CancellationToken::new();
        let flow = match profile.kind {
            PortalKind::TwoFactor => ActiveFlow::TwoFactor(TwoFactorFlow::new(
                profile.clone(),
                self.config.two_factor.clone(),
                cancel.clone(),
            )),
            PortalKind::Isign | PortalKind::Auth => ActiveFlow::Login(LoginFlow::new(
                profile.clone(),
                self.config.login.clone(),
                cancel.clone(),
            )),
        };
        log::info!("[*] {:?} page detected, starting {} flow", profile.kind, flow.name());
        Some(Running {
            flow,
            cancel,
            next_at: None,
        })
    }

    fn context(&self, now_ms: u64) -> FlowContext<'_> {
        FlowContext {
            page: self.page,
            store: self.store.as_ref(),
            notifier: self.notifier.as_ref(),
            mailbox: &self.mailbox,
            profiles: &self.config.profiles,
            now_ms,
        }
    }

    /// Runs until a flow fails, the browser settles on a page with nothing
    /// left to do, the overall deadline passes, or the session is cancelled.
    pub fn run(&self) -> Result<SessionOutcome, FlowError> {
        let started = self.clock.now_ms();
        let deadline = started + self.config.overall_timeout.as_millis() as u64;
        let settle_ms = self.config.settle_time.as_millis() as u64;

        let mut observer = PageObserver::new();
        let mut current: Option<Running> = None;
        let mut idle_since: Option<u64> = None;
        let mut url = String::new();
        let mut heartbeat_failures = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                log::info!("[!] Cancellation requested, stopping.");
                if let Some(running) = current.take() {
                    running.drop_flow();
                }
                return Err(FlowError::Cancelled);
            }

            let now = self.clock.now_ms();
            if now >= deadline {
                log::warn!("[!] Session deadline reached on {}", url);
                if let Some(running) = current.take() {
                    running.drop_flow();
                }
                return Err(FlowError::Timeout {
                    message: format!(
                        "The portal did not finish within {} seconds.",
                        self.config.overall_timeout.as_secs()
                    ),
                });
            }

            let event = match observer.poll(self.page) {
                Ok(event) => {
                    heartbeat_failures = 0;
                    event
                }
                Err(e) => {
                    heartbeat_failures += 1;
                    if heartbeat_failures >= MAX_HEARTBEAT_FAILURES {
                        log::warn!("[!] Browser heartbeat lost (manual close?): {}", e);
                        return Err(FlowError::Browser {
                            message: format!("Browser connection lost: {}", e),
                        });
                    }
                    // Evaluations fail briefly while a document is replaced.
                    log::debug!(
                        "[!] Page not readable ({}/{}): {}",
                        heartbeat_failures,
                        MAX_HEARTBEAT_FAILURES,
                        e
                    );
                    self.clock.sleep(self.config.observe_interval);
                    continue;
                }
            };

            let mut trigger = None;
            match event {
                Some(PageEvent::Loaded(address)) => {
                    log::debug!("[*] Page loaded: {}", address);
                    if let Some(running) = current.take() {
                        running.drop_flow();
                    }
                    current = self.flow_for(&address);
                    idle_since = current.is_none().then_some(now);
                    url = address;
                    trigger = Some(Trigger::Timer);
                }
                Some(PageEvent::Mutated) => trigger = Some(Trigger::Mutation),
                None => {}
            }

            // A scheduled wake-up outranks a mutation re-check.
            if let Some(running) = current.as_mut() {
                if running.next_at.is_some_and(|at| at <= now) {
                    running.next_at = None;
                    trigger = Some(Trigger::Timer);
                }
            }

            let wake = match (current.as_mut(), trigger) {
                (Some(running), Some(trigger)) => Some(running.flow.step(&self.context(now), trigger)),
                _ => None,
            };

            match wake {
                Some(Wake::After(delay)) => {
                    if let Some(running) = current.as_mut() {
                        running.next_at = Some(now + delay.as_millis() as u64);
                    }
                }
                Some(Wake::Finished(end)) => {
                    let name = current.as_ref().map_or("", |r| r.flow.name());
                    if let Some(running) = current.take() {
                        running.drop_flow();
                    }
                    match end {
                        FlowEnd::Completed => {
                            log::info!("[✓] {} flow finished", name);
                            idle_since = Some(now);
                        }
                        FlowEnd::HandOffToTwoFactor => {
                            // Let the next poll report the verification page as a fresh load.
                            observer.reset();
                        }
                        FlowEnd::Failed(e) => {
                            log::error!("[!] {} flow failed: {}", name, e);
                            return Err(e);
                        }
                    }
                }
                Some(Wake::Unchanged) | None => {}
            }

            if current.is_none() {
                if let Some(since) = idle_since {
                    if now.saturating_sub(since) >= settle_ms {
                        log::info!("[✓] Settled on {}", url);
                        return Ok(SessionOutcome::Completed { final_url: url });
                    }
                }
            }

            let mut pause = self.config.observe_interval;
            if let Some(at) = current.as_ref().and_then(|r| r.next_at) {
                pause = pause.min(Duration::from_millis(at.saturating_sub(now)));
            }
            self.clock.sleep(pause);
        }
    }
}

/// Launches Chrome, opens the portal and runs a [`PortalSession`] to the end.
pub fn run_portal_login(
    config: SessionConfig,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    mailbox: MailboxClient,
    cancel: CancellationToken,
) -> Result<SessionOutcome, FlowError> {
    let browser = create_browser(&config.user_agent, config.headless).map_err(|e| {
        FlowError::Browser {
            message: e.to_string(),
        }
    })?;

    let result = drive(&browser, config, store, notifier, mailbox, cancel);
    close_browser(browser);
    result
}

fn drive(
    browser: &headless_chrome::Browser,
    config: SessionConfig,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    mailbox: MailboxClient,
    cancel: CancellationToken,
) -> Result<SessionOutcome, FlowError> {
    let tab = initial_tab(browser)?;
    tab.set_default_timeout(Duration::from_secs(30));
    let page = ChromePage::new(tab);

    log::info!("[*] Navigating to: {}", config.start_url);
    page.navigate(&config.start_url)?;

    PortalSession::new(
        &page,
        store,
        notifier,
        mailbox,
        Arc::new(SystemClock),
        config,
        cancel,
    )
    .run()
}
