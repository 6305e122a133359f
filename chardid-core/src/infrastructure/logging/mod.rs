//! Logging via `log` + `log4rs`: stderr output, plus a size-rotated log
//! file when a log directory is configured.

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;
use std::path::PathBuf;

const LOG_FILE_NAME: &str = "chardid.log";
const LOG_FILE_MAX_SIZE: u64 = 20_000_000;
const LOG_FILE_KEEP: u32 = 3;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {l:5} [{t}] {m}{n}";

/// Crates logged at the requested level. The root stays at WARN so
/// dependency noise never drowns replay output.
const APP_CRATES: &[&str] = &["chardid_core", "chardid_service"];

/// Initializes the global logger. `level` falls back to INFO when it does
/// not parse. Repeated calls are ignored.
pub fn init_logger(log_dir: Option<&str>, level: &str) {
    let app_level = parse_level(level);

    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let mut builder = Config::builder().appender(Appender::builder().build("stderr", Box::new(console)));
    let mut appenders = vec!["stderr".to_string()];

    if let Some(dir) = log_dir.map(str::trim).filter(|dir| !dir.is_empty()) {
        if let Some(file) = rolling_file_appender(dir) {
            builder = builder.appender(Appender::builder().build("file", Box::new(file)));
            appenders.push("file".to_string());
        }
    }

    for name in APP_CRATES {
        builder = builder.logger(Logger::builder().appenders(appenders.clone()).additive(false).build(*name, app_level));
    }

    let Ok(config) = builder.build(Root::builder().appenders(appenders).build(LevelFilter::Warn)) else {
        return;
    };
    let _ = log4rs::init_config(config);
}

fn rolling_file_appender(dir: &str) -> Option<RollingFileAppender> {
    let path = PathBuf::from(dir).join(LOG_FILE_NAME);
    let archive = PathBuf::from(dir).join(format!("{LOG_FILE_NAME}.{{}}"));
    let roller = FixedWindowRoller::builder().build(archive.to_str()?, LOG_FILE_KEEP).ok()?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(LOG_FILE_MAX_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(path, Box::new(policy))
        .ok()
}

fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::Info)
}
