use std::fs::OpenOptions;
use std::path::Path;

use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the global subscriber.
///
/// With `CHATSCOPE_LOG_FILE` set (or `log_file` given) events go to that file at
/// DEBUG. Otherwise they go to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let env_path = std::env::var("CHATSCOPE_LOG_FILE").ok();
    let target = log_file
        .map(Path::to_path_buf)
        .or_else(|| env_path.map(Into::into));

    let registry = tracing_subscriber::registry();

    if let Some(log_path) = target {
        let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(LevelFilter::DEBUG);

        registry.with(file_layer).try_init()?;
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(filter);

        registry.with(stderr_layer).try_init()?;
    }

    Ok(())
}
