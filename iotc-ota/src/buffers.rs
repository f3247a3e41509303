use thiserror::Error;

/// Number of body bytes requested per ranged GET
pub const DATA_CHUNK_SIZE: usize = 4 * 1024;

/// Capacity of the response header buffer
pub const HEADER_BUFFER_LENGTH: usize = 2048;

/// Capacity of the response body buffer for the default chunk size
pub const RESPONSE_BUFFER_LENGTH: usize = DATA_CHUNK_SIZE + 2048;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("response headers exceed the {capacity} byte header buffer")]
    HeadersOverflow { capacity: usize },

    #[error("response body exceeds the {capacity} byte body buffer")]
    BodyOverflow { capacity: usize },
}

/// The header and body buffers a response is received into.
///
/// Both buffers are allocated once and never grow. Received headers are
/// stored as `name: value\r\n` lines, the way they arrive on the wire.
///
/// The only way to hand the buffers to a transport is [`ResponseBuffers::reset`],
/// which clears whatever the previous response left behind.
#[derive(Debug)]
pub struct ResponseBuffers {
    status: u16,
    headers: Vec<u8>,
    header_capacity: usize,
    body: Vec<u8>,
    body_capacity: usize,
}

impl Default for ResponseBuffers {
    fn default() -> Self {
        Self::with_capacity(HEADER_BUFFER_LENGTH, RESPONSE_BUFFER_LENGTH)
    }
}

impl ResponseBuffers {
    pub fn with_capacity(header_capacity: usize, body_capacity: usize) -> Self {
        Self {
            status: 0,
            headers: Vec::with_capacity(header_capacity),
            header_capacity,
            body: Vec::with_capacity(body_capacity),
            body_capacity,
        }
    }

    /// Buffers sized for chunks of `chunk_size` bytes
    pub fn for_chunk_size(chunk_size: usize) -> Self {
        Self::with_capacity(HEADER_BUFFER_LENGTH, chunk_size + 2048)
    }

    /// Clear both buffers and return a writer for the next response
    pub fn reset(&mut self) -> ResponseWriter<'_> {
        self.status = 0;
        self.headers.clear();
        self.body.clear();
        ResponseWriter { buffers: self }
    }

    /// Status code of the last response, 0 if none was received
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Look up a header of the last response by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .split(|b| *b == b'\n')
            .filter_map(|line| std::str::from_utf8(line).ok())
            .find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case(name)
                    .then(|| value.trim())
            })
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn header_capacity(&self) -> usize {
        self.header_capacity
    }

    pub fn body_capacity(&self) -> usize {
        self.body_capacity
    }
}

/// Write access to freshly reset response buffers
#[derive(Debug)]
pub struct ResponseWriter<'a> {
    buffers: &'a mut ResponseBuffers,
}

impl ResponseWriter<'_> {
    pub fn set_status(&mut self, status: u16) {
        self.buffers.status = status;
    }

    pub fn push_header(&mut self, name: &str, value: &str) -> Result<(), BufferError> {
        let capacity = self.buffers.header_capacity;
        let len = name.len() + value.len() + 4;
        if self.buffers.headers.len() + len > capacity {
            return Err(BufferError::HeadersOverflow { capacity });
        }

        let headers = &mut self.buffers.headers;
        headers.extend_from_slice(name.as_bytes());
        headers.extend_from_slice(b": ");
        headers.extend_from_slice(value.as_bytes());
        headers.extend_from_slice(b"\r\n");
        Ok(())
    }

    pub fn extend_body(&mut self, data: &[u8]) -> Result<(), BufferError> {
        let capacity = self.buffers.body_capacity;
        if self.buffers.body.len() + data.len() > capacity {
            return Err(BufferError::BodyOverflow { capacity });
        }
        self.buffers.body.extend_from_slice(data);
        Ok(())
    }

    pub fn body_len(&self) -> usize {
        self.buffers.body.len()
    }
}
