/*
Firmware image delivery.

An image is fetched over HTTPS as a sequence of small ranged GET requests
into a pair of fixed-size buffers and written, chunk by chunk, to an image
sink. The total size is discovered up front with a one byte probe. Network
failures are retried with a reconnect against a retry budget shared by the
whole download, every other failure ends the download.

Activating a downloaded image is a separate step, see `FirmwareUpdater`.
*/

mod activate;
mod buffers;
mod download;
mod https;
mod probe;
mod request;
mod sink;
mod source;
mod transport;
mod updater;
mod version;

pub use activate::{ActivateError, CommandActivator, ImageActivator, NoopActivator};
pub use buffers::{
    BufferError, DATA_CHUNK_SIZE, HEADER_BUFFER_LENGTH, RESPONSE_BUFFER_LENGTH, ResponseBuffers,
    ResponseWriter,
};
pub use download::{
    DEFAULT_RETRY_BUDGET, DownloadConfig, DownloadError, DownloadReport, Downloader,
    PROGRESS_INTERVAL,
};
pub use https::{HttpsConfig, HttpsTransport};
pub use probe::{CONTENT_RANGE_PREFIX, MAX_SIZE_DIGITS, ProbeError, parse_total_size};
pub use request::{ChunkPlan, RangedRequest, chunks};
pub use sink::{FileSink, ImageSink};
pub use source::{ImageSource, InvalidImageUrl, Origin, Scheme};
pub use transport::{RangeTransport, TransportError};
pub use updater::{FirmwareUpdater, OtaUpdater};
pub use version::{VersionCheck, compare_versions, is_same_version, needs_update};
