use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize the logging system
pub fn init_logging(verbose: bool, log_file: Option<PathBuf>) -> Result<()> {
    let env_filter = if verbose {
        EnvFilter::from_default_env()
            .add_directive("site_indexer=debug".parse()?)
            .add_directive("warn".parse()?)
    } else {
        EnvFilter::from_default_env()
            .add_directive("site_indexer=info".parse()?)
            .add_directive("warn".parse()?)
    };

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    // If a log file is specified, create a file logger as well
    if let Some(log_file) = log_file {
        if let Some(parent) = log_file.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = fs::File::create(log_file)?;
        let file_layer = fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(file);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }

    Ok(())
}
