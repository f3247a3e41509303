use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::activate::{ActivateError, ImageActivator};
use crate::download::{DownloadError, DownloadReport, Downloader};
use crate::sink::FileSink;
use crate::source::ImageSource;
use crate::transport::RangeTransport;

/// Fetches and commits firmware images
#[async_trait]
pub trait FirmwareUpdater: Send + Sync {
    /// Download the image at `source`
    async fn download(&self, source: &ImageSource) -> Result<DownloadReport, DownloadError>;

    /// Commit a downloaded image
    async fn activate(&self, report: &DownloadReport) -> Result<(), ActivateError>;
}

/// Downloads images into a directory and hands them to an activator
pub struct OtaUpdater<T> {
    downloader: Downloader<T>,
    image_dir: PathBuf,
    activator: Box<dyn ImageActivator>,
}

impl<T: RangeTransport> OtaUpdater<T> {
    pub fn new(
        downloader: Downloader<T>,
        image_dir: impl Into<PathBuf>,
        activator: Box<dyn ImageActivator>,
    ) -> Self {
        Self {
            downloader,
            image_dir: image_dir.into(),
            activator,
        }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }
}

#[async_trait]
impl<T: RangeTransport + 'static> FirmwareUpdater for OtaUpdater<T> {
    async fn download(&self, source: &ImageSource) -> Result<DownloadReport, DownloadError> {
        let mut sink = FileSink::new(&self.image_dir);
        self.downloader.download(source, &mut sink).await
    }

    async fn activate(&self, report: &DownloadReport) -> Result<(), ActivateError> {
        self.activator
            .activate(&self.image_dir.join(&report.file_name))
            .await
    }
}
