use std::{env, io::Write, sync::Once};

use chrono::Local;
use env_logger::{fmt::Formatter, Builder as EnvLoggerBuilder};
use log::{LevelFilter, Record};

use crate::errors::error::{TestUtilsError, TestUtilsResult};

static TEST_LOGGING_INIT: Once = Once::new();

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Installs the test logger once per process. Silent unless `RUST_LOG` is set.
pub fn init_logger() {
    TEST_LOGGING_INIT.call_once(|| {
        if let Ok(pattern) = env::var("RUST_LOG") {
            if let Err(err) = AgentTestLogger::init(&pattern) {
                eprintln!("{err}");
            }
        }
    })
}

pub struct AgentTestLogger;

fn write_record(buf: &mut Formatter, record: &Record, colored: bool) -> std::io::Result<()> {
    let location = format!(
        "{}:{}",
        record.file().unwrap_or_default(),
        record.line().unwrap_or_default()
    );
    let timestamp = Local::now().format(TIMESTAMP_FORMAT);
    if colored {
        let style = buf.default_level_style(record.level());
        writeln!(
            buf,
            "{timestamp}|{style}{:>5}{style:#}|{:<28}|{location:>40}| {}",
            record.level(),
            record.target(),
            record.args()
        )
    } else {
        writeln!(
            buf,
            "{timestamp}|{:>5}|{:<28}|{location:>40}| {}",
            record.level(),
            record.target(),
            record.args()
        )
    }
}

impl AgentTestLogger {
    /// `RUST_LOG_FORMATTER=text_no_color` drops the ANSI level colors.
    pub fn init(pattern: &str) -> TestUtilsResult<()> {
        let colored = !matches!(
            env::var("RUST_LOG_FORMATTER").as_deref(),
            Ok("text_no_color")
        );
        EnvLoggerBuilder::new()
            .format(move |buf, record| write_record(buf, record, colored))
            .filter(None, LevelFilter::Off)
            .parse_filters(pattern)
            .try_init()
            .map_err(|err| TestUtilsError::LoggingError(format!("Cannot init logger: {err}")))
    }
}
