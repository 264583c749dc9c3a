//! Tracing setup shared by the api and worker binaries.

use std::panic;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize the global subscriber. Filtering comes from `RUST_LOG`
/// (default `info`). When `MT_LOG_DIR` is set, output goes to
/// `<MT_LOG_DIR>/<app>.log` with daily rotation instead of stdout.
pub fn init_tracing_subscriber(app_name: &'static str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match rotating_writer(app_name) {
        Some(writer) => {
            let _ = builder.with_writer(writer).try_init();
        }
        None => {
            let _ = builder.try_init();
        }
    }
}

fn rotating_writer(app_name: &'static str) -> Option<BoxMakeWriter> {
    let dir = PathBuf::from(std::env::var_os("MT_LOG_DIR")?);
    if let Err(err) = std::fs::create_dir_all(&dir) {
        eprintln!("failed to create MT_LOG_DIR {}: {err}; logging to stdout", dir.display());
        return None;
    }

    let appender = tracing_appender::rolling::daily(dir, format!("{app_name}.log"));
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // The guard must outlive the process or buffered lines are dropped.
    let _ = LOG_GUARD.set(guard);
    Some(BoxMakeWriter::new(writer))
}

/// Route panics through `tracing` so they land in the same stream as
/// everything else. Idempotent; the hook is installed once per process.
/// Set `MT_LOG_INCLUDE_BACKTRACE=1` to chain into the default hook too.
pub fn install_tracing_panic_hook(app_name: &'static str) {
    static INSTALLED: OnceLock<()> = OnceLock::new();

    INSTALLED.get_or_init(|| {
        let default_hook = panic::take_hook();
        let include_backtrace = std::env::var("MT_LOG_INCLUDE_BACKTRACE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        panic::set_hook(Box::new(move |info| {
            let thread = std::thread::current();
            let location = info
                .location()
                .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()));
            let message = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic payload not string".into());

            tracing::error!(
                application = app_name,
                thread = thread.name().unwrap_or("unknown"),
                location = location.as_deref().unwrap_or("unknown"),
                panic_message = %message,
                "panic captured"
            );

            if include_backtrace {
                default_hook(info);
            }
        }));
    });
}
