//! Log setup: every event goes to stdout and to `<exe_dir>/logs/bazaar_lens.log`,
//! stamped with local wall-clock time to the millisecond.

use anyhow::Result;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE_NAME: &str = "bazaar_lens.log";
const TIME_FORMAT: &str = "%H:%M:%S%.3f";

/// Installs the global subscriber. `RUST_LOG` overrides the default `bazaar_lens=info`.
pub fn init_logging() -> Result<()> {
    let log_path = crate::paths::get_logs_dir().join(LOG_FILE_NAME);
    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar_lens=info".into()),
        )
        .with(fmt::layer().with_timer(ChronoLocal::new(TIME_FORMAT.to_string())))
        .with(
            fmt::layer()
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()?;

    tracing::info!("Logging to {}", log_path.display());
    Ok(())
}

/// Appends a panic report to the log file directly, so panics are recorded
/// even when they happen before (or inside) the subscriber.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let timestamp = chrono::Local::now().format(TIME_FORMAT);
        let log_msg = format!("[{}] [PANIC]{} {}\n", timestamp, location, msg);
        eprint!("{}", log_msg);
        let log_path = crate::paths::get_logs_dir().join(LOG_FILE_NAME);
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
            use std::io::Write;
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));
}
