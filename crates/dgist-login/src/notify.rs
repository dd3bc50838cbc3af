use console::Style;
use notify_rust::Notification;

/// Fire-and-forget user messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Desktop notifications through the platform notification daemon.
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, body: &str) {
        log::info!("[*] {}: {}", title, body);

        let mut notification = Notification::new();
        notification
            .summary(title)
            .body(body)
            .appname("dgist-login")
            .timeout(5000);

        if let Err(e) = notification.show() {
            log::error!("Failed to show notification: {}", e);
        }
    }
}

/// Writes notifications to the log only, for headless servers.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        log::warn!("[!] {}: {}", title, body);
    }
}

/// Prints notifications to stderr with a highlighted title.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, title: &str, body: &str) {
        let bold = Style::new().bold();
        let cyan = Style::new().cyan().bold();
        eprintln!();
        eprintln!("{} {}", bold.apply_to(">>"), cyan.apply_to(title));
        eprintln!("   {}", body);
        eprintln!();
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::Notifier;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingNotifier(Mutex<Vec<(String, String)>>);

    impl RecordingNotifier {
        pub(crate) fn messages(&self) -> Vec<(String, String)> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, body: &str) {
            self.0
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
        }
    }
}
