use std::fmt;

use iotc_util::http::{InvalidUriError, Uri};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => f.write_str("http"),
            Scheme::Https => f.write_str("https"),
        }
    }
}

/// Where a transport connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

#[derive(Debug, Error)]
pub enum InvalidImageUrl {
    #[error("invalid image URL: {0}")]
    Uri(#[from] InvalidUriError),

    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("image URL has no resource path")]
    MissingResource,

    #[error("invalid image file name '{0}'")]
    InvalidFileName(String),
}

/// A firmware image to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    origin: Origin,
    path: String,
    file_name: String,
}

impl ImageSource {
    /// Parse an image URL.
    ///
    /// The resource path keeps the query string so that presigned URLs work.
    /// The file name defaults to the last path segment.
    pub fn from_url(url: &str) -> Result<Self, InvalidImageUrl> {
        let uri: Uri = url.parse()?;
        let scheme = match uri.scheme() {
            "https" => Scheme::Https,
            "http" => Scheme::Http,
            other => return Err(InvalidImageUrl::UnsupportedScheme(other.to_owned())),
        };

        let path = uri.path_and_query();
        let resource = path.split('?').next().unwrap_or_default();
        if resource.is_empty() || resource == "/" {
            return Err(InvalidImageUrl::MissingResource);
        }
        let last_segment = resource.rsplit('/').next().unwrap_or_default();

        let file_name = if is_valid_file_name(last_segment) {
            last_segment.to_owned()
        } else {
            "firmware.bin".to_owned()
        };

        Ok(Self {
            origin: Origin {
                scheme,
                host: uri.host().to_owned(),
                port: uri.port().unwrap_or_else(|| scheme.default_port()),
            },
            path: path.to_owned(),
            file_name,
        })
    }

    /// Use `name` for the stored image instead of the one derived from the URL
    pub fn with_file_name(mut self, name: &str) -> Result<Self, InvalidImageUrl> {
        if !is_valid_file_name(name) {
            return Err(InvalidImageUrl::InvalidFileName(name.to_owned()));
        }
        self.file_name = name.to_owned();
        Ok(self)
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn host(&self) -> &str {
        &self.origin.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the query of a presigned URL carries credentials
        let path = self.path.split('?').next().unwrap_or_default();
        write!(f, "{}{}", self.origin, path)
    }
}

fn is_valid_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}
