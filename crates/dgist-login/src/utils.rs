use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag, checked by a flow at each scheduled wake-up.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

use fd_lock::{RwLock, RwLockWriteGuard};
use once_cell::sync::Lazy;
use std::fs::File;
use std::sync::Mutex;

// Stores the write guard to keep the lock held for the process lifetime.
static INSTANCE_LOCK: Lazy<Mutex<Option<RwLockWriteGuard<'static, File>>>> =
    Lazy::new(|| Mutex::new(None));

/// Ensures that only one automation session drives the shared Chrome profile.
pub fn ensure_single_instance() -> Result<(), Box<dyn Error>> {
    let mut lock_path = get_data_dir()?;
    lock_path.push("dgist-login.lock");

    let file = File::create(&lock_path)?;
    // Leak the RwLock to get a 'static reference so the guard can outlive this function.
    let lock_ref: &'static mut RwLock<File> = Box::leak(Box::new(RwLock::new(file)));

    match lock_ref.try_write() {
        Ok(guard) => {
            let mut slot = INSTANCE_LOCK
                .lock()
                .map_err(|_| "instance lock poisoned")?;
            *slot = Some(guard);
            Ok(())
        }
        Err(_) => Err("Another dgist-login session is already running.".into()),
    }
}

/// Platform-relative path from the home directory to the application directory.
#[cfg(target_os = "linux")]
const DATA_SUBPATH: &str = ".local/share/dgist-login";

#[cfg(target_os = "macos")]
const DATA_SUBPATH: &str = "Library/Application Support/dgist-login";

#[cfg(target_os = "windows")]
const DATA_SUBPATH: &str = "AppData/Roaming/dgist-login";

/// Returns the application directory holding the stored state and the lock file.
///
/// - **Linux:** `~/.local/share/dgist-login`
/// - **macOS:** `~/Library/Application Support/dgist-login`
/// - **Windows:** `%USERPROFILE%\AppData\Roaming\dgist-login`
///
/// Creates the directory if it does not already exist.
pub fn get_data_dir() -> Result<PathBuf, Box<dyn Error>> {
    let home_dir = env::var("HOME").or_else(|_| env::var("USERPROFILE"))?;
    let data_dir = PathBuf::from(&home_dir).join(DATA_SUBPATH);

    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        log::info!("Data directory created at: {:?}", data_dir);
    }

    Ok(data_dir)
}

/// Returns the dedicated Chrome profile directory, creating it if needed.
pub fn get_user_data_dir() -> Result<PathBuf, Box<dyn Error>> {
    let profile = get_data_dir()?.join("profile");
    if !profile.exists() {
        std::fs::create_dir_all(&profile)?;
    }
    Ok(profile)
}

/// Completely removes the Chrome profile directory (cookies, cached portal session).
pub fn wipe_user_data_dir() -> Result<(), Box<dyn Error>> {
    let path = get_user_data_dir()?;
    if path.exists() {
        std::fs::remove_dir_all(&path)?;
        log::info!("Wiped profile directory: {:?}", path);
    }
    Ok(())
}

/// Escapes a value for embedding inside a single-quoted JS string literal.
pub fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_escape_handles_quotes_and_newlines() {
        assert_eq!(js_escape(r"a'b\c"), r"a\'b\\c");
        assert_eq!(js_escape("x\ny"), "x\\ny");
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
