use clap::{Parser, ValueEnum};
use dgist_login::session::{DEFAULT_START_URL, DEFAULT_USER_AGENT};
use log::LevelFilter;

/// Log verbosity as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Where user-facing notices go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NotifierKind {
    /// Desktop notification popups.
    Desktop,
    /// Highlighted lines on stderr.
    Terminal,
    /// Plain log records only.
    Log,
}

/// Automates DGIST portal login and email two-factor verification.
#[derive(Parser, Debug)]
#[command(name = "dgist-login", version, about)]
pub struct Args {
    /// Portal page to open
    #[arg(short, long, default_value = DEFAULT_START_URL)]
    pub url: String,

    /// Logging level
    #[arg(short, long, value_enum, default_value_t = LogLevel::Info)]
    pub level: LogLevel,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub disable_headless: bool,

    /// User agent reported by the browser
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub agent: String,

    /// Give up after this many seconds
    #[arg(short, long, default_value_t = 180)]
    pub timeout: u64,

    /// How user-facing notices are shown
    #[arg(long, value_enum, default_value_t = NotifierKind::Desktop)]
    pub notifier: NotifierKind,

    /// Sender address verification mails come from
    #[arg(long, default_value = "no-reply@dgist.ac.kr")]
    pub sender: String,

    /// Accept codes stamped up to this many milliseconds before the request
    #[arg(long, default_value_t = 2000)]
    pub tolerance: u64,

    /// Stop using the mailbox token this many milliseconds before it expires
    #[arg(long, default_value_t = 5000)]
    pub skew: u64,

    /// Prompt for the portal ID and password and store them
    #[arg(long, conflicts_with_all = ["forget", "clean"])]
    pub set_credentials: bool,

    /// Remove the stored portal ID and password
    #[arg(long)]
    pub forget: bool,

    /// Store a mailbox access token, stamped with the current time
    #[arg(long, value_name = "TOKEN")]
    pub set_token: Option<String>,

    /// Lifetime of the token given with --set-token, in seconds
    #[arg(long, default_value_t = 3600, requires = "set_token")]
    pub token_ttl: u64,

    /// Print the last verification code read from the mailbox
    #[arg(long)]
    pub show_code: bool,

    /// Read the newest verification code from the mailbox now and print it
    #[arg(long, conflicts_with = "show_code")]
    pub fetch_code: bool,

    /// Remove the browser profile (cookies and session state)
    #[arg(short, long)]
    pub clean: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_portal() {
        let args = Args::parse_from(["dgist-login"]);
        assert_eq!(args.url, DEFAULT_START_URL);
        assert_eq!(args.timeout, 180);
        assert_eq!(args.tolerance, 2000);
        assert_eq!(args.level, LogLevel::Info);
        assert!(!args.disable_headless);
    }

    #[test]
    fn token_ttl_needs_a_token() {
        assert!(Args::try_parse_from(["dgist-login", "--token-ttl", "60"]).is_err());
        let args =
            Args::try_parse_from(["dgist-login", "--set-token", "ya29", "--token-ttl", "60"])
                .unwrap();
        assert_eq!(args.set_token.as_deref(), Some("ya29"));
        assert_eq!(args.token_ttl, 60);
    }

    #[test]
    fn fetch_code_is_its_own_command() {
        let args = Args::try_parse_from(["dgist-login", "--fetch-code"]).unwrap();
        assert!(args.fetch_code);
        assert!(!args.show_code);
        assert!(Args::try_parse_from(["dgist-login", "--fetch-code", "--show-code"]).is_err());
    }
}
