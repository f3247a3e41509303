use std::time::Duration;

use async_trait::async_trait;
use futures_lite::StreamExt;
use reqwest::header::RANGE;
use reqwest::{Certificate, Client};
use tracing::{debug, trace};

use crate::buffers::ResponseWriter;
use crate::request::RangedRequest;
use crate::source::Origin;
use crate::transport::{RangeTransport, TransportError};

#[derive(Debug, Clone)]
pub struct HttpsConfig {
    /// Maximum time to establish a connection
    pub connect_timeout: Duration,
    /// Maximum time for a full request/response exchange
    pub timeout: Duration,
    /// Extra trust anchors on top of the built-in roots
    pub root_certificates: Vec<Certificate>,
}

impl Default for HttpsConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(10),
            root_certificates: Vec::new(),
        }
    }
}

impl HttpsConfig {
    /// Add the certificates from a PEM bundle as trust anchors
    pub fn with_pem_roots(mut self, pem: &[u8]) -> Result<Self, TransportError> {
        let certs = Certificate::from_pem_bundle(pem)
            .map_err(|e| TransportError::Request(format!("invalid root certificates: {e}")))?;
        self.root_certificates.extend(certs);
        Ok(self)
    }
}

struct Connection {
    client: Client,
    origin: Origin,
}

/// [`RangeTransport`] backed by a reqwest client holding a single connection
pub struct HttpsTransport {
    config: HttpsConfig,
    connection: Option<Connection>,
}

impl HttpsTransport {
    pub fn new(config: HttpsConfig) -> Self {
        Self {
            config,
            connection: None,
        }
    }

    fn client(&self) -> Result<Client, TransportError> {
        let mut builder = Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.timeout)
            .pool_max_idle_per_host(1)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        for cert in &self.config.root_certificates {
            builder = builder.add_root_certificate(cert.clone());
        }
        builder
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))
    }
}

impl Default for HttpsTransport {
    fn default() -> Self {
        Self::new(HttpsConfig::default())
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_builder() {
        TransportError::Request(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

#[async_trait]
impl RangeTransport for HttpsTransport {
    /// Set up a client for `origin`. The TCP and TLS handshake happen on the
    /// first request, so an unreachable origin is reported by `send`.
    async fn connect(&mut self, origin: &Origin) -> Result<(), TransportError> {
        debug!(%origin, "connecting");
        let client = self.client()?;
        self.connection = Some(Connection {
            client,
            origin: origin.clone(),
        });
        Ok(())
    }

    async fn send(
        &mut self,
        request: &RangedRequest,
        mut response: ResponseWriter<'_>,
    ) -> Result<(), TransportError> {
        let Connection { client, origin } =
            self.connection.as_ref().ok_or(TransportError::NotConnected)?;

        let url = format!(
            "{}://{}:{}{}",
            origin.scheme, request.host, origin.port, request.path
        );
        trace!(range = %request.range_header(), "sending request");
        let res = client
            .request(request.method.clone(), url)
            .header(RANGE, request.range_header())
            .send()
            .await
            .map_err(classify)?;

        response.set_status(res.status().as_u16());
        for (name, value) in res.headers() {
            response.push_header(name.as_str(), &String::from_utf8_lossy(value.as_bytes()))?;
        }

        let mut body = res.bytes_stream();
        while let Some(bytes) = body.next().await {
            response.extend_body(&bytes.map_err(classify)?)?;
        }
        trace!(len = response.body_len(), "received response");

        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            debug!(origin = %conn.origin, "disconnected");
        }
    }
}
