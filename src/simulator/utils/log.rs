/// Global logging configuration
use log::LevelFilter;
use std::sync::atomic::{AtomicBool, Ordering};

static ENABLE_LOG: AtomicBool = AtomicBool::new(true);

/// Set console logging enabled
pub fn set_log(enabled: bool) {
  ENABLE_LOG.store(enabled, Ordering::Relaxed);
}

/// Check if console logging is enabled, default is true
pub fn is_log_enabled() -> bool {
  ENABLE_LOG.load(Ordering::Relaxed)
}

/// Install the env_logger backend.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `warn` in quiet mode.
/// Safe to call more than once.
pub fn init_log(quiet: bool) {
  set_log(!quiet);
  let default_level = if quiet { LevelFilter::Warn } else { LevelFilter::Info };
  let _ = env_logger::Builder::new()
    .filter_level(default_level)
    .parse_default_env()
    .format_timestamp(None)
    .try_init();
}

/// Print a console message with blue [Log] prefix
#[macro_export]
macro_rules! log_info {
  ($($arg:tt)*) => {
    if $crate::simulator::utils::log::is_log_enabled() {
      println!("\x1b[34m[Log]\x1b[0m {}", format!($($arg)*));
    }
  };
}
