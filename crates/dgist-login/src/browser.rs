use headless_chrome::browser::default_executable;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::error::Error;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

/// Environment variable naming a Chrome/Chromium binary to use instead of the
/// auto-detected one.
pub const CHROME_PATH_ENV: &str = "DGIST_CHROME_PATH";

/// Binary to launch: `DGIST_CHROME_PATH` when set, else whatever Chrome or
/// Chromium is installed.
fn chrome_path() -> Option<PathBuf> {
    match std::env::var_os(CHROME_PATH_ENV) {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => default_executable().ok(),
    }
}

/// Launches Chrome on the persistent profile so the portal's remembered ID
/// and cookies carry over between runs. A profile Chrome refuses to open is
/// wiped once before giving up.
pub fn create_browser(agent: &str, headless: bool) -> Result<Browser, Box<dyn Error>> {
    let user_agent = OsString::from(format!("--user-agent={agent}"));
    let executable = chrome_path();

    let mut wiped = false;
    loop {
        let mut builder = LaunchOptions::default_builder();
        builder
            .headless(headless)
            .sandbox(false)
            // Must outlast a full code-polling window.
            .idle_browser_timeout(Duration::from_secs(300))
            .window_size(Some((1000, 900)))
            .enable_gpu(false)
            .args(vec![
                user_agent.as_os_str(),
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-session-crashed-bubble"),
                OsStr::new("--lang=en-US"),
            ])
            .user_data_dir(Some(crate::utils::get_user_data_dir()?))
            .path(executable.clone());

        match Browser::new(builder.build()?) {
            Ok(browser) => return Ok(browser),
            Err(e) if wiped => {
                return Err(format!("Chrome would not start on a fresh profile: {}", e).into())
            }
            Err(e) => {
                log::warn!("[!] Chrome failed to start ({}); resetting the profile", e);
                crate::utils::wipe_user_data_dir()?;
                wiped = true;
            }
        }
    }
}

/// Returns the tab Chrome opened at startup, or a new one if none shows up.
pub fn initial_tab(browser: &Browser) -> anyhow::Result<Arc<Tab>> {
    for _ in 0..10 {
        if let Ok(tabs) = browser.get_tabs().lock() {
            if let Some(t) = tabs.first() {
                return Ok(Arc::clone(t));
            }
        }
        sleep(Duration::from_millis(200));
    }
    browser.new_tab()
}

/// Closes every tab without waiting on a browser that may already be gone.
pub fn close_browser(browser: Browser) {
    if let Ok(tabs) = browser.get_tabs().lock() {
        for tab in tabs.iter() {
            let _ = tab.close(true);
        }
    }
    sleep(Duration::from_millis(200));
}
