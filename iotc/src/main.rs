use anyhow::Result;
use tracing::debug;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod cli;
mod cmd;
mod config;
mod console;

use iotc_c2d as c2d;
use iotc_ota as ota;
use iotc_util as util;

use crate::cli::Command;
use crate::util::dirs::config_dir;
use crate::util::store::Store;

fn initialize_tracing() -> Result<()> {
    // Initialize tracing subscriber for human-readable logs
    tracing_subscriber::registry()
        .with(
            // Use some log defaults. These can be overriden using
            // RUST_LOG
            EnvFilter::try_from_default_env().unwrap_or(
                EnvFilter::default()
                    .add_directive("debug".parse()?)
                    .add_directive("hyper=error".parse()?)
                    .add_directive("hyper_util=error".parse()?)
                    .add_directive("rustls=warn".parse()?)
                    .add_directive("reqwest=info".parse()?),
            ),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .event_format(fmt::format().compact().with_target(false).without_time()),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing()?;

    let cli = cli::parse();

    // Create a new configuration store instance
    let store = Store::new(cli.config_dir.unwrap_or_else(config_dir));
    debug!("using config store at {}", store.root().display());

    match cli.command {
        Command::Configure(args) => cmd::configure(args, &store).await,
        Command::Download(args) => cmd::download(args, &store).await,
        Command::Replay(args) => cmd::replay(args, &store).await,
    }
}
