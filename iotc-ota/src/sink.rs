use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Destination of a downloaded image
#[async_trait]
pub trait ImageSink: Send {
    /// Prepare storage for an image of `size` bytes
    async fn create(&mut self, name: &str, size: u64) -> io::Result<()>;

    /// Write `block` at `offset`, returning how many bytes were stored
    async fn write_block(&mut self, offset: u64, block: &[u8]) -> io::Result<usize>;

    /// Make the complete image durable
    async fn close(&mut self) -> io::Result<()>;

    /// Throw away a partially written image
    async fn abort(&mut self) {}
}

struct OpenImage {
    file: fs::File,
    part_path: PathBuf,
    final_path: PathBuf,
    size: u64,
}

/// Stores images as files in a directory.
///
/// The image is written to `<name>.part` and only renamed to `<name>` once
/// closed, so a file with the final name is always complete.
pub struct FileSink {
    dir: PathBuf,
    open: Option<OpenImage>,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            open: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final location of the image called `name`
    pub fn image_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn open_image(&mut self) -> io::Result<&mut OpenImage> {
        self.open
            .as_mut()
            .ok_or_else(|| io::Error::other("no image is open"))
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

#[async_trait]
impl ImageSink for FileSink {
    async fn create(&mut self, name: &str, size: u64) -> io::Result<()> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid image name '{name}'"),
            ));
        }
        if self.open.is_some() {
            self.abort().await;
        }

        fs::create_dir_all(&self.dir).await?;
        let final_path = self.image_path(name);
        let part_path = part_path(&final_path);
        let file = fs::File::create(&part_path).await?;
        file.set_len(size).await?;
        debug!(path = %part_path.display(), size, "image created");

        self.open = Some(OpenImage {
            file,
            part_path,
            final_path,
            size,
        });
        Ok(())
    }

    async fn write_block(&mut self, offset: u64, block: &[u8]) -> io::Result<usize> {
        let image = self.open_image()?;
        if offset >= image.size {
            return Ok(0);
        }
        let room = usize::try_from(image.size - offset).unwrap_or(usize::MAX);
        let len = block.len().min(room);

        image.file.seek(SeekFrom::Start(offset)).await?;
        image.file.write_all(&block[..len]).await?;
        Ok(len)
    }

    async fn close(&mut self) -> io::Result<()> {
        let Some(mut image) = self.open.take() else {
            return Ok(());
        };

        image.file.flush().await?;
        image.file.sync_all().await?;
        drop(image.file);

        fs::rename(&image.part_path, &image.final_path).await?;
        debug!(path = %image.final_path.display(), "image stored");
        Ok(())
    }

    async fn abort(&mut self) {
        if let Some(image) = self.open.take() {
            drop(image.file);
            if let Err(e) = fs::remove_file(&image.part_path).await {
                warn!(path = %image.part_path.display(), "failed to remove partial image: {e}");
            }
        }
    }
}
