use anyhow::{Context, Result};
use tracing::{info, instrument};

use super::updater;
use crate::cli::DownloadArgs;
use crate::config::OtaConfig;
use crate::ota::{FirmwareUpdater, ImageSource};
use crate::util::config;
use crate::util::store::Store;

/// Download an image and print where it was stored
#[instrument(skip_all, err)]
pub async fn download(args: DownloadArgs, store: &Store) -> Result<()> {
    let ota = config::load::<OtaConfig>(store)
        .await?
        .unwrap_or_default()
        .apply(&args.ota);

    let mut source = ImageSource::from_url(&args.url)?;
    if let Some(name) = args
        .file_name
        .as_deref()
        .or(ota.default_image_name.as_deref())
    {
        source = source.with_file_name(name)?;
    }

    let updater = updater(&ota).await?;
    let report = updater
        .download(&source)
        .await
        .with_context(|| format!("failed to download {source}"))?;
    if report.is_empty() {
        info!("image is empty, nothing stored");
        return Ok(());
    }

    let path = updater.image_dir().join(&report.file_name);
    info!(
        size = report.size,
        retries = report.retries,
        "image stored in {}",
        path.display()
    );
    println!("{}", path.display());

    if args.activate {
        updater.activate(&report).await?;
    }
    Ok(())
}
