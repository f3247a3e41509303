pub use uri::{InvalidUriError, Uri};

mod uri {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub struct InvalidUriError(String);

    impl InvalidUriError {
        pub fn new(reason: impl Into<String>) -> Self {
            Self(reason.into())
        }

        pub fn reason(&self) -> &str {
            self.0.as_str()
        }
    }

    impl Display for InvalidUriError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }

    impl From<http::uri::InvalidUri> for InvalidUriError {
        fn from(value: http::uri::InvalidUri) -> Self {
            InvalidUriError(value.to_string())
        }
    }

    /// An absolute URI, e.g. the download location of a firmware image.
    ///
    /// Parsing rejects relative references: a value always carries a scheme
    /// and a host.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct Uri(http::Uri);

    impl Uri {
        pub fn from_static(src: &'static str) -> Self {
            Self(http::Uri::from_static(src))
        }

        pub fn scheme(&self) -> &str {
            self.0.scheme_str().unwrap_or_default()
        }

        pub fn host(&self) -> &str {
            self.0.host().unwrap_or_default()
        }

        pub fn port(&self) -> Option<u16> {
            self.0.port_u16()
        }

        /// The request target: path plus query string, `/` if empty.
        pub fn path_and_query(&self) -> &str {
            self.0
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/")
        }
    }

    impl Display for Uri {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }

    impl FromStr for Uri {
        type Err = InvalidUriError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let uri = http::Uri::from_str(s)?;
            if uri.scheme().is_none() {
                return Err(InvalidUriError(format!("missing scheme in '{s}'")));
            }
            if uri.host().is_none_or(str::is_empty) {
                return Err(InvalidUriError(format!("missing host in '{s}'")));
            }
            Ok(Self(uri))
        }
    }

    impl TryFrom<String> for Uri {
        type Error = InvalidUriError;

        fn try_from(value: String) -> Result<Self, Self::Error> {
            value.parse()
        }
    }

    impl From<Uri> for http::Uri {
        fn from(value: Uri) -> Self {
            value.0
        }
    }

    impl Serialize for Uri {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            serializer.serialize_str(&self.to_string())
        }
    }

    impl<'de> Deserialize<'de> for Uri {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn it_splits_a_presigned_url() {
            let uri: Uri = "https://bucket.s3.amazonaws.com/fw/app.bin?X-Amz-Signature=abc&X-Amz-Expires=60"
                .parse()
                .unwrap();

            assert_eq!(uri.scheme(), "https");
            assert_eq!(uri.host(), "bucket.s3.amazonaws.com");
            assert_eq!(uri.port(), None);
            assert_eq!(
                uri.path_and_query(),
                "/fw/app.bin?X-Amz-Signature=abc&X-Amz-Expires=60"
            );
        }

        #[test]
        fn it_keeps_explicit_ports() {
            let uri: Uri = "http://127.0.0.1:8080/image.bin".parse().unwrap();
            assert_eq!(uri.host(), "127.0.0.1");
            assert_eq!(uri.port(), Some(8080));
        }

        #[test]
        fn it_rejects_relative_references() {
            assert!("/image.bin".parse::<Uri>().is_err());
            assert!("image.bin".parse::<Uri>().is_err());
        }
    }
}
