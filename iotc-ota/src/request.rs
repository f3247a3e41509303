use std::ops::RangeInclusive;

use reqwest::Method;

/// A single ranged GET, built fresh for every chunk and every retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangedRequest {
    pub method: Method,
    pub host: String,
    pub path: String,
    /// First byte requested
    pub start: u64,
    /// Last byte requested, inclusive
    pub end: u64,
}

impl RangedRequest {
    pub fn get(host: impl Into<String>, path: impl Into<String>, start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "range start past range end");
        Self {
            method: Method::GET,
            host: host.into(),
            path: path.into(),
            start,
            end,
        }
    }

    /// The one byte request used to discover the object size
    pub fn probe(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self::get(host, path, 0, 0)
    }

    /// Value of the `Range` header
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// Number of bytes the request asks for
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Inclusive byte ranges tiling `[0, total)` in steps of at most `chunk_size`
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    total: u64,
    chunk_size: u64,
    next: u64,
}

/// Plan the chunk ranges for an object of `total` bytes
pub fn chunks(total: u64, chunk_size: u64) -> ChunkPlan {
    assert!(chunk_size > 0, "chunk size must not be zero");
    ChunkPlan {
        total,
        chunk_size,
        next: 0,
    }
}

impl ChunkPlan {
    /// Total number of chunks in the plan
    pub fn chunk_count(&self) -> u64 {
        self.total.div_ceil(self.chunk_size)
    }
}

impl Iterator for ChunkPlan {
    type Item = RangeInclusive<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(self.chunk_size).min(self.total) - 1;
        self.next = end + 1;
        Some(start..=end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_range_header_is_inclusive() {
        let req = RangedRequest::get("bucket.s3.amazonaws.com", "/fw.bin", 4096, 8191);
        assert_eq!(req.range_header(), "bytes=4096-8191");
        assert_eq!(req.size(), 4096);
        assert_eq!(req.method, Method::GET);
    }

    #[test]
    fn test_probe_asks_for_the_first_byte() {
        let req = RangedRequest::probe("host", "/fw.bin");
        assert_eq!(req.range_header(), "bytes=0-0");
        assert_eq!(req.size(), 1);
    }

    #[test]
    fn test_chunks_for_9000_bytes() {
        let ranges: Vec<_> = chunks(9000, 4096).collect();
        assert_eq!(ranges, vec![0..=4095, 4096..=8191, 8192..=8999]);
        assert_eq!(chunks(9000, 4096).chunk_count(), 3);
    }

    #[test]
    fn test_chunks_tile_the_object_exactly() {
        for total in [1u64, 4095, 4096, 4097, 12288, 100_003] {
            let mut expected_start = 0;
            let mut last_len = 0;
            for range in chunks(total, 4096) {
                assert_eq!(*range.start(), expected_start);
                expected_start = range.end() + 1;
                last_len = range.end() - range.start() + 1;
            }
            assert_eq!(expected_start, total);

            let tail = total % 4096;
            assert_eq!(last_len, if tail == 0 { 4096 } else { tail });
        }
    }

    #[test]
    fn test_empty_object_has_no_chunks() {
        assert_eq!(chunks(0, 4096).next(), None);
        assert_eq!(chunks(0, 4096).chunk_count(), 0);
    }
}
