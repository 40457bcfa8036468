use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Install the global `tracing` subscriber.
///
/// Logs go to stderr so stdout stays clean for formatted output. Default:
/// info for our crates, warn for everything else. Can be overridden with
/// `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(service_name)));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {e}")))
}

fn default_directives(service_name: &str) -> String {
    let service = service_name.replace('-', "_");
    format!("warn,mtb_core=info,{service}=info")
}
