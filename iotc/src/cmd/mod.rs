mod configure;
mod download;
mod replay;

pub use configure::configure;
pub use download::download;
pub use replay::replay;

use anyhow::Result;

use crate::config::OtaConfig;
use crate::ota::{Downloader, HttpsTransport, OtaUpdater};

/// Build the updater described by `config`
async fn updater(config: &OtaConfig) -> Result<OtaUpdater<HttpsTransport>> {
    let transport = HttpsTransport::new(config.https_config().await?);
    let downloader = Downloader::new(transport, config.download_config()?);
    Ok(OtaUpdater::new(
        downloader,
        config.image_dir.clone(),
        config.activator(),
    ))
}
