//! # DGIST Portal Login Tool
//!
//! Opens the DGIST portal in a browser, logs in with the stored credentials
//! and completes the email verification step by reading the code from the
//! user's mailbox.

mod args;
mod credentials;

use args::{Args, NotifierKind};
use clap::Parser;
use dgist_login::clock::{Clock, SystemClock};
use dgist_login::{
    init_logger, run_portal_login, AccessToken, CancellationToken, DesktopNotifier, GmailApi,
    JsonFileStore, LogNotifier, MailboxClient, MailboxConfig, Notifier, SessionConfig,
    SessionOutcome, Store, StoreExt, TerminalNotifier,
};
use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// The main entry point of the application.
fn main() -> ExitCode {
    // Parse command-line arguments.
    let args = Args::parse();
    init_logger(args.level.into());

    let store: Arc<dyn Store> = match JsonFileStore::open_default() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open the settings store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(code) = manage_settings(&args, store.as_ref()) {
        return code;
    }

    if args.fetch_code {
        return fetch_code(&args, store);
    }

    // Ensure only one instance is running
    if let Err(e) = dgist_login::utils::ensure_single_instance() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    // Handle the clean session option.
    if args.clean {
        match dgist_login::utils::wipe_user_data_dir() {
            Ok(_) => {
                info!("Session information successfully removed.");
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                error!("Failed to remove session information: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::warn!("[!] Interrupted, shutting down...");
        handler_token.cancel();
    }) {
        error!("Failed to install Ctrl-C handler: {}", e);
    }

    let mailbox = match build_mailbox(&args, Arc::clone(&store)) {
        Ok(mailbox) => mailbox,
        Err(e) => {
            error!("Failed to create mailbox client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let notifier: Arc<dyn Notifier> = match args.notifier {
        NotifierKind::Desktop => Arc::new(DesktopNotifier),
        NotifierKind::Terminal => Arc::new(TerminalNotifier),
        NotifierKind::Log => Arc::new(LogNotifier),
    };

    let config = SessionConfig {
        start_url: args.url.clone(),
        headless: !args.disable_headless,
        user_agent: args.agent.clone(),
        overall_timeout: Duration::from_secs(args.timeout),
        ..SessionConfig::default()
    };

    match run_portal_login(config, store, notifier, mailbox, cancel) {
        Ok(SessionOutcome::Completed { final_url }) => {
            info!("[✓] Portal login finished at {}", final_url);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

/// Runs the settings-only commands. Returns the exit code when one of them
/// was requested, `None` to go on with a portal session.
fn manage_settings(args: &Args, store: &dyn Store) -> Option<ExitCode> {
    let result = if args.set_credentials {
        credentials::prompt_credentials()
            .and_then(|c| store.save_credentials(&c))
            .map(|_| info!("Credentials saved."))
    } else if args.forget {
        store
            .clear_credentials()
            .map(|_| info!("Stored credentials removed."))
    } else if let Some(token) = args.set_token.as_deref() {
        let token = AccessToken::new(token, SystemClock.now_ms(), args.token_ttl);
        store
            .save_access_token(&token)
            .map(|_| info!("Mailbox token saved; valid for {}s.", args.token_ttl))
    } else if args.show_code {
        store.last_known_code().map(|code| match code {
            Some(code) => credentials::print_code(&code),
            None => info!("No verification code has been read yet."),
        })
    } else {
        return None;
    };

    Some(match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    })
}

fn build_mailbox(args: &Args, store: Arc<dyn Store>) -> anyhow::Result<MailboxClient> {
    let api = GmailApi::new()?;
    Ok(MailboxClient::new(
        Box::new(api),
        store,
        MailboxConfig {
            sender: args.sender.clone(),
            code_tolerance_ms: args.tolerance,
            expiry_skew_ms: args.skew,
            ..MailboxConfig::default()
        },
    ))
}

/// Reads the newest code straight from the mailbox, without opening the portal.
fn fetch_code(args: &Args, store: Arc<dyn Store>) -> ExitCode {
    let mailbox = match build_mailbox(args, store) {
        Ok(mailbox) => mailbox,
        Err(e) => {
            error!("Failed to create mailbox client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match mailbox.fetch_latest_code(SystemClock.now_ms()) {
        Ok(Some(candidate)) => {
            credentials::print_code(&candidate.digits);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            info!("No verification mail found from {}.", args.sender);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
