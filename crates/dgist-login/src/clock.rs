use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock source and sleeper for the cooperative session loop.
///
/// Time is expressed in milliseconds since the Unix epoch because mailbox
/// message timestamps use the same unit.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
