#![cfg(not(tarpaulin_include))]

use roving_qc::{Config, app};

/// Main entry point for the QC backend
///
/// Logging is controlled through `RUST_LOG` (default `info`) and the server
/// through the `QC_*` variables read by [`Config::from_env`].
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    app::run(config).await
}
