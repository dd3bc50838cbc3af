use colored::Colorize;
use log::{Level, LevelFilter};
use std::io::Write;

/// Crates whose chatter drowns out the flow log at `debug` and below.
const NOISY_TARGETS: &[&str] = &["headless_chrome", "tungstenite", "reqwest", "hyper_util", "rustls"];

/// Installs the global `env_logger` backend with coloured level tags.
///
/// Browser and HTTP internals are capped at `warn` unless `level` is `trace`.
pub fn init_logger(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder.filter(None, level);

    if level < LevelFilter::Trace {
        for &target in NOISY_TARGETS {
            builder.filter(Some(target), level.min(LevelFilter::Warn));
        }
    }

    builder
        .format(|buf, record| {
            let level = match record.level() {
                Level::Error => "ERROR".red(),
                Level::Warn => "WARN".yellow(),
                Level::Info => "INFO".green(),
                Level::Debug => "DEBUG".blue(),
                Level::Trace => "TRACE".purple(),
            };
            writeln!(buf, "[{}] - {}", level, record.args())
        })
        .init();
}
