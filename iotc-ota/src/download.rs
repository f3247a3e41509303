use std::io;
use std::ops::RangeInclusive;

use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{Span, debug, error, field, info, instrument, warn};

use crate::buffers::{DATA_CHUNK_SIZE, ResponseBuffers};
use crate::probe::{ProbeError, parse_total_size};
use crate::request::{RangedRequest, chunks};
use crate::sink::ImageSink;
use crate::source::ImageSource;
use crate::transport::{RangeTransport, TransportError};

/// Network failures tolerated over a whole download
pub const DEFAULT_RETRY_BUDGET: u32 = 30;

/// Chunks between two progress reports
pub const PROGRESS_INTERVAL: usize = 30;

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Bytes requested per ranged GET
    pub chunk_size: usize,
    /// Network failures tolerated before giving up. Shared by all chunks.
    pub retry_budget: u32,
    /// Log progress every this many chunks
    pub progress_interval: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DATA_CHUNK_SIZE,
            retry_budget: DEFAULT_RETRY_BUDGET,
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("another download is in progress")]
    Busy,

    #[error("failed to connect to {origin}: {source}")]
    Connect {
        origin: String,
        source: TransportError,
    },

    #[error("size probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("request for bytes {start}-{end} failed: {source}")]
    Transport {
        start: u64,
        end: u64,
        source: TransportError,
    },

    #[error("giving up on bytes {start}-{end} after {attempts} network failures: {source}")]
    RetriesExhausted {
        start: u64,
        end: u64,
        attempts: u32,
        source: TransportError,
    },

    #[error("server replied with status {status} for bytes {start}-{end}")]
    Status { status: u16, start: u64, end: u64 },

    #[error("expected {expected} bytes for bytes {start}-{end}, received {received}")]
    UnexpectedLength {
        start: u64,
        end: u64,
        expected: u64,
        received: usize,
    },

    #[error("failed to create image '{name}': {source}")]
    CreateImage { name: String, source: io::Error },

    #[error("failed to write image at offset {offset}: {source}")]
    Write { offset: u64, source: io::Error },

    #[error("short write at offset {offset}: stored {written} of {expected} bytes")]
    ShortWrite {
        offset: u64,
        written: usize,
        expected: usize,
    },

    #[error("failed to close image: {0}")]
    Close(io::Error),
}

/// Outcome of a successful download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub file_name: String,
    /// Total image size, 0 for an empty object
    pub size: u64,
    pub chunks: usize,
    /// Network failures recovered from
    pub retries: u32,
}

impl DownloadReport {
    /// Whether there was nothing to download
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Progress of one download. Created per image and never reused.
#[derive(Debug)]
struct DownloadSession<'a> {
    source: &'a ImageSource,
    total_size: Option<u64>,
    cursor: u64,
    chunk_size: u64,
    retries_remaining: u32,
    retries_used: u32,
    chunks: usize,
}

impl<'a> DownloadSession<'a> {
    fn new(source: &'a ImageSource, config: &DownloadConfig) -> Self {
        Self {
            source,
            total_size: None,
            cursor: 0,
            chunk_size: config.chunk_size as u64,
            retries_remaining: config.retry_budget,
            retries_used: 0,
            chunks: 0,
        }
    }

    fn resolve_size(&mut self, size: u64) {
        debug_assert!(self.total_size.is_none(), "total size resolved twice");
        self.total_size = Some(size);
    }

    fn total_size(&self) -> u64 {
        self.total_size.unwrap_or_default()
    }

    fn advance(&mut self, written: usize) {
        let cursor = self.cursor + written as u64;
        debug_assert!(cursor <= self.total_size(), "cursor past the end of the image");
        self.cursor = cursor;
        self.chunks += 1;
    }

    /// Consume one retry, returning whether another attempt is allowed
    fn record_failure(&mut self) -> bool {
        self.retries_remaining = self.retries_remaining.saturating_sub(1);
        self.retries_used += 1;
        self.retries_remaining > 0
    }

    fn percent(&self) -> u8 {
        match self.total_size() {
            0 => 100,
            total => (self.cursor * 100 / total) as u8,
        }
    }

    fn report(&self) -> DownloadReport {
        DownloadReport {
            file_name: self.source.file_name().to_owned(),
            size: self.total_size(),
            chunks: self.chunks,
            retries: self.retries_used,
        }
    }
}

struct Engine<T> {
    transport: T,
    buffers: ResponseBuffers,
}

/// Downloads images through a [`RangeTransport`] one chunk at a time.
///
/// The transport and the response buffers belong to the downloader, which
/// serves one download at a time. A download requested while another one is
/// running fails with [`DownloadError::Busy`].
pub struct Downloader<T> {
    config: DownloadConfig,
    engine: Mutex<Engine<T>>,
    progress: Option<watch::Sender<u8>>,
}

impl<T: RangeTransport> Downloader<T> {
    pub fn new(transport: T, config: DownloadConfig) -> Self {
        assert!(config.chunk_size > 0, "chunk size must not be zero");
        let buffers = ResponseBuffers::for_chunk_size(config.chunk_size);
        Self {
            config,
            engine: Mutex::new(Engine { transport, buffers }),
            progress: None,
        }
    }

    /// Publish the download percentage on `tx`
    pub fn with_progress(mut self, tx: watch::Sender<u8>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Fetch the image at `source` into `sink`.
    ///
    /// Succeeds only once every chunk has been written and the sink closed.
    /// Nothing is created in the sink for an empty object.
    #[instrument(name = "download", skip_all, fields(source = %source, size = field::Empty, retries = field::Empty), err)]
    pub async fn download(
        &self,
        source: &ImageSource,
        sink: &mut dyn ImageSink,
    ) -> Result<DownloadReport, DownloadError> {
        let mut engine = self.engine.try_lock().map_err(|_| DownloadError::Busy)?;
        let mut session = DownloadSession::new(source, &self.config);

        engine
            .transport
            .connect(source.origin())
            .await
            .map_err(|e| DownloadError::Connect {
                origin: source.origin().to_string(),
                source: e,
            })?;

        let res = engine
            .run(&mut session, sink, &self.config, self.progress.as_ref())
            .await;
        engine.transport.disconnect().await;
        Span::current().record("retries", session.retries_used);

        let report = res?;
        info!(
            size = report.size,
            chunks = report.chunks,
            "download complete"
        );
        Ok(report)
    }
}

impl<T: RangeTransport> Engine<T> {
    async fn run(
        &mut self,
        session: &mut DownloadSession<'_>,
        sink: &mut dyn ImageSink,
        config: &DownloadConfig,
        progress: Option<&watch::Sender<u8>>,
    ) -> Result<DownloadReport, DownloadError> {
        let size = self.probe(session).await?;
        Span::current().record("size", size);
        if size == 0 {
            info!("image is empty, nothing to download");
            return Ok(session.report());
        }

        let name = session.source.file_name();
        sink.create(name, size)
            .await
            .map_err(|source| DownloadError::CreateImage {
                name: name.to_owned(),
                source,
            })?;

        if let Err(e) = self.fetch_all(session, sink, config, progress).await {
            sink.abort().await;
            return Err(e);
        }
        if let Err(e) = sink.close().await {
            sink.abort().await;
            return Err(DownloadError::Close(e));
        }

        Ok(session.report())
    }

    /// Discover the object size. Never retried.
    async fn probe(&mut self, session: &mut DownloadSession<'_>) -> Result<u64, DownloadError> {
        let source = session.source;
        let request = RangedRequest::probe(source.host(), source.path());
        self.transport
            .send(&request, self.buffers.reset())
            .await
            .map_err(|source| DownloadError::Transport {
                start: 0,
                end: 0,
                source,
            })?;

        let status = self.buffers.status();
        if !(200..300).contains(&status) {
            return Err(DownloadError::Status {
                status,
                start: 0,
                end: 0,
            });
        }

        let content_range = self.buffers.header("content-range");
        debug!("probe reported range {content_range:?}");
        let size = parse_total_size(content_range)?;
        session.resolve_size(size);
        Ok(size)
    }

    async fn fetch_all(
        &mut self,
        session: &mut DownloadSession<'_>,
        sink: &mut dyn ImageSink,
        config: &DownloadConfig,
        progress: Option<&watch::Sender<u8>>,
    ) -> Result<(), DownloadError> {
        let interval = config.progress_interval.max(1);
        for range in chunks(session.total_size(), session.chunk_size) {
            self.fetch_chunk(session, range.clone()).await?;

            let offset = *range.start();
            let body = self.buffers.body();
            let written = sink
                .write_block(offset, body)
                .await
                .map_err(|source| DownloadError::Write { offset, source })?;
            if written != body.len() {
                return Err(DownloadError::ShortWrite {
                    offset,
                    written,
                    expected: body.len(),
                });
            }
            session.advance(written);

            if session.chunks % interval == 0 {
                info!("progress {}%", session.percent());
                if let Some(tx) = progress {
                    tx.send_replace(session.percent());
                }
            }
        }

        if let Some(tx) = progress {
            tx.send_replace(100);
        }
        Ok(())
    }

    /// Fetch one chunk into the body buffer, reconnecting on network failures
    /// for as long as the retry budget allows
    async fn fetch_chunk(
        &mut self,
        session: &mut DownloadSession<'_>,
        range: RangeInclusive<u64>,
    ) -> Result<(), DownloadError> {
        let (start, end) = (*range.start(), *range.end());
        let source = session.source;
        loop {
            let request = RangedRequest::get(source.host(), source.path(), start, end);
            match self.transport.send(&request, self.buffers.reset()).await {
                Ok(()) => break,
                Err(e) if e.is_network() => {
                    if !session.record_failure() {
                        error!("failed to get bytes {start}-{end}: {e}, no retries left");
                        return Err(DownloadError::RetriesExhausted {
                            start,
                            end,
                            attempts: session.retries_used,
                            source: e,
                        });
                    }
                    warn!(
                        "failed to get bytes {start}-{end}: {e}, reconnecting ({} retries left)",
                        session.retries_remaining
                    );
                    self.transport.disconnect().await;
                    if let Err(e) = self.transport.connect(source.origin()).await {
                        warn!("reconnect failed: {e}");
                    }
                }
                Err(source) => return Err(DownloadError::Transport { start, end, source }),
            }
        }

        let status = self.buffers.status();
        if !(200..300).contains(&status) {
            return Err(DownloadError::Status { status, start, end });
        }

        let expected = request_size(start, end);
        let received = self.buffers.body().len();
        if received as u64 != expected {
            return Err(DownloadError::UnexpectedLength {
                start,
                end,
                expected,
                received,
            });
        }

        Ok(())
    }
}

fn request_size(start: u64, end: u64) -> u64 {
    end - start + 1
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex as StdMutex};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::buffers::ResponseWriter;
    use crate::source::Origin;

    enum Reply {
        Ok,
        NetworkError,
        Status(u16),
        NoContentRange,
    }

    #[derive(Default)]
    struct Log {
        ranges: Vec<String>,
        connects: usize,
        disconnects: usize,
    }

    /// Serves an in-memory object, answering the first requests from a script
    struct ScriptedTransport {
        object: Vec<u8>,
        script: VecDeque<Reply>,
        log: Arc<StdMutex<Log>>,
    }

    impl ScriptedTransport {
        fn new(object: Vec<u8>) -> (Self, Arc<StdMutex<Log>>) {
            let log = Arc::new(StdMutex::new(Log::default()));
            (
                Self {
                    object,
                    script: VecDeque::new(),
                    log: log.clone(),
                },
                log,
            )
        }

        fn script(mut self, replies: impl IntoIterator<Item = Reply>) -> Self {
            self.script.extend(replies);
            self
        }
    }

    #[async_trait]
    impl RangeTransport for ScriptedTransport {
        async fn connect(&mut self, _: &Origin) -> Result<(), TransportError> {
            self.log.lock().unwrap().connects += 1;
            Ok(())
        }

        async fn send(
            &mut self,
            request: &RangedRequest,
            mut response: ResponseWriter<'_>,
        ) -> Result<(), TransportError> {
            self.log
                .lock()
                .unwrap()
                .ranges
                .push(request.range_header());

            match self.script.pop_front().unwrap_or(Reply::Ok) {
                Reply::NetworkError => Err(TransportError::Network("connection reset".into())),
                Reply::Status(status) => {
                    response.set_status(status);
                    Ok(())
                }
                Reply::NoContentRange => {
                    response.set_status(206);
                    Ok(())
                }
                Reply::Ok => {
                    let total = self.object.len() as u64;
                    let end = request.end.min(total.saturating_sub(1));
                    response.set_status(206);
                    response.push_header(
                        "Content-Range",
                        &format!("bytes {}-{}/{}", request.start, request.end, total),
                    )?;
                    if total > 0 {
                        response
                            .extend_body(&self.object[request.start as usize..=end as usize])?;
                    }
                    Ok(())
                }
            }
        }

        async fn disconnect(&mut self) {
            self.log.lock().unwrap().disconnects += 1;
        }
    }

    #[derive(Default)]
    struct MemorySink {
        name: Option<String>,
        data: Vec<u8>,
        writes: HashMap<u64, usize>,
        closed: bool,
        aborted: bool,
        limit: Option<usize>,
    }

    #[async_trait]
    impl ImageSink for MemorySink {
        async fn create(&mut self, name: &str, size: u64) -> io::Result<()> {
            self.name = Some(name.to_owned());
            self.data = vec![0; size as usize];
            Ok(())
        }

        async fn write_block(&mut self, offset: u64, block: &[u8]) -> io::Result<usize> {
            let len = self.limit.map_or(block.len(), |l| l.min(block.len()));
            let offset = offset as usize;
            self.data[offset..offset + len].copy_from_slice(&block[..len]);
            self.writes.insert(offset as u64, len);
            Ok(len)
        }

        async fn close(&mut self) -> io::Result<()> {
            self.closed = true;
            Ok(())
        }

        async fn abort(&mut self) {
            self.aborted = true;
        }
    }

    fn object(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn source() -> ImageSource {
        ImageSource::from_url("https://bucket.s3.amazonaws.com/fw.bin?sig=1").unwrap()
    }

    #[tokio::test]
    async fn test_downloads_9000_bytes_in_three_chunks() {
        let image = object(9000);
        let (transport, log) = ScriptedTransport::new(image.clone());
        let downloader = Downloader::new(transport, DownloadConfig::default());
        let mut sink = MemorySink::default();

        let report = downloader.download(&source(), &mut sink).await.unwrap();

        assert_eq!(
            log.lock().unwrap().ranges,
            vec!["bytes=0-0", "bytes=0-4095", "bytes=4096-8191", "bytes=8192-8999"]
        );
        assert_eq!(sink.writes.get(&8192), Some(&808));
        assert_eq!(sink.data, image);
        assert!(sink.closed);
        assert_eq!(
            report,
            DownloadReport {
                file_name: "fw.bin".into(),
                size: 9000,
                chunks: 3,
                retries: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_network_failure_reconnects_and_retries_the_same_chunk() {
        let image = object(5000);
        let (transport, log) = ScriptedTransport::new(image.clone());
        let transport = transport.script([Reply::Ok, Reply::Ok, Reply::NetworkError]);
        let downloader = Downloader::new(transport, DownloadConfig::default());
        let mut sink = MemorySink::default();

        let report = downloader.download(&source(), &mut sink).await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(
            log.ranges,
            vec!["bytes=0-0", "bytes=0-4095", "bytes=4096-4999", "bytes=4096-4999"]
        );
        assert_eq!(log.connects, 2);
        assert_eq!(log.disconnects, 2);
        assert_eq!(report.retries, 1);
        assert_eq!(sink.data, image);
    }

    #[tokio::test]
    async fn test_gives_up_when_the_retry_budget_is_spent() {
        let (transport, log) = ScriptedTransport::new(object(100));
        let transport = transport
            .script([Reply::Ok])
            .script((0..40).map(|_| Reply::NetworkError));
        let downloader = Downloader::new(transport, DownloadConfig::default());
        let mut sink = MemorySink::default();

        let err = downloader.download(&source(), &mut sink).await.unwrap_err();

        assert!(matches!(
            err,
            DownloadError::RetriesExhausted { attempts: 30, .. }
        ));
        // one probe and exactly 30 attempts for the single chunk
        assert_eq!(log.lock().unwrap().ranges.len(), 31);
        assert!(sink.aborted);
        assert!(!sink.closed);
    }

    #[tokio::test]
    async fn test_retry_budget_is_shared_across_chunks() {
        let (transport, log) = ScriptedTransport::new(object(3 * 10));
        // chunks of 10 bytes, the fifth failure lands on the third chunk
        let transport = transport.script([
            Reply::Ok,
            Reply::NetworkError,
            Reply::NetworkError,
            Reply::Ok,
            Reply::NetworkError,
            Reply::NetworkError,
            Reply::Ok,
            Reply::NetworkError,
        ]);
        let config = DownloadConfig {
            chunk_size: 10,
            retry_budget: 5,
            ..Default::default()
        };
        let downloader = Downloader::new(transport, config);
        let mut sink = MemorySink::default();

        let err = downloader.download(&source(), &mut sink).await.unwrap_err();

        assert!(matches!(
            err,
            DownloadError::RetriesExhausted {
                start: 20,
                end: 29,
                attempts: 5,
                ..
            }
        ));
        // probe, 3 + 3 attempts for the first two chunks, 1 for the last
        assert_eq!(log.lock().unwrap().ranges.len(), 8);
    }

    #[tokio::test]
    async fn test_malformed_probe_is_not_retried() {
        let (transport, log) = ScriptedTransport::new(object(100));
        let transport = transport.script([Reply::NoContentRange]);
        let downloader = Downloader::new(transport, DownloadConfig::default());
        let mut sink = MemorySink::default();

        let err = downloader.download(&source(), &mut sink).await.unwrap_err();

        assert!(matches!(err, DownloadError::Probe(ProbeError::Missing)));
        assert_eq!(log.lock().unwrap().ranges, vec!["bytes=0-0"]);
        assert_eq!(sink.name, None);
    }

    #[tokio::test]
    async fn test_probe_network_failure_is_not_retried() {
        let (transport, log) = ScriptedTransport::new(object(100));
        let transport = transport.script([Reply::NetworkError]);
        let downloader = Downloader::new(transport, DownloadConfig::default());

        let err = downloader
            .download(&source(), &mut MemorySink::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Transport { start: 0, end: 0, .. }));
        assert_eq!(log.lock().unwrap().ranges.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_chunk_status_is_fatal() {
        let (transport, log) = ScriptedTransport::new(object(100));
        let transport = transport.script([Reply::Ok, Reply::Status(403)]);
        let downloader = Downloader::new(transport, DownloadConfig::default());
        let mut sink = MemorySink::default();

        let err = downloader.download(&source(), &mut sink).await.unwrap_err();

        assert!(matches!(err, DownloadError::Status { status: 403, start: 0, end: 99 }));
        assert_eq!(log.lock().unwrap().ranges.len(), 2);
        assert!(sink.aborted);
    }

    #[tokio::test]
    async fn test_short_write_is_fatal() {
        let (transport, _) = ScriptedTransport::new(object(100));
        let downloader = Downloader::new(transport, DownloadConfig::default());
        let mut sink = MemorySink {
            limit: Some(50),
            ..Default::default()
        };

        let err = downloader.download(&source(), &mut sink).await.unwrap_err();

        assert!(matches!(
            err,
            DownloadError::ShortWrite {
                offset: 0,
                written: 50,
                expected: 100
            }
        ));
        assert!(sink.aborted);
    }

    #[tokio::test]
    async fn test_empty_object_succeeds_without_chunks() {
        let (transport, log) = ScriptedTransport::new(Vec::new());
        let downloader = Downloader::new(transport, DownloadConfig::default());
        let mut sink = MemorySink::default();

        let report = downloader.download(&source(), &mut sink).await.unwrap();

        assert!(report.is_empty());
        assert_eq!(log.lock().unwrap().ranges, vec!["bytes=0-0"]);
        assert_eq!(sink.name, None);
        assert!(!sink.closed);
    }

    #[tokio::test]
    async fn test_concurrent_download_is_rejected() {
        let (transport, _) = ScriptedTransport::new(object(10));
        let downloader = Downloader::new(transport, DownloadConfig::default());

        let _engine = downloader.engine.try_lock().unwrap();
        let err = downloader
            .download(&source(), &mut MemorySink::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Busy));
    }

    #[tokio::test]
    async fn test_progress_reaches_100() {
        let (transport, _) = ScriptedTransport::new(object(100));
        let (tx, rx) = watch::channel(0);
        let config = DownloadConfig {
            chunk_size: 10,
            progress_interval: 3,
            ..Default::default()
        };
        let downloader = Downloader::new(transport, config).with_progress(tx);

        downloader
            .download(&source(), &mut MemorySink::default())
            .await
            .unwrap();
        assert_eq!(*rx.borrow(), 100);
    }
}
