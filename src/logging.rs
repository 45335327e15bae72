//! Tracing setup. Stdout carries tool responses, so logs go to a file.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Environment variable holding a filter directive, overriding the config.
const LOG_ENV: &str = "YNAB_AGENT_LOG";

/// Install the global subscriber.
///
/// Logs go to a daily-rolling file in the configured log directory, or to
/// stderr when no directory can be resolved. The returned guard flushes the
/// file writer on drop and must be held for the life of the process.
pub fn init(config: &Config) -> Option<WorkerGuard> {
  let filter = EnvFilter::try_from_env(LOG_ENV)
    .ok()
    .or_else(|| {
      config
        .logging
        .level
        .as_deref()
        .and_then(|level| EnvFilter::try_new(level).ok())
    })
    .unwrap_or_else(|| EnvFilter::new("info"));
  let registry = tracing_subscriber::registry().with(filter);

  let dir = config
    .log_dir()
    .ok()
    .filter(|dir| std::fs::create_dir_all(dir).is_ok());

  match dir {
    Some(dir) => {
      let appender = tracing_appender::rolling::daily(dir, "ynab-agent.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      registry
        .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
        .init();
      Some(guard)
    }
    None => {
      registry
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
      None
    }
  }
}
