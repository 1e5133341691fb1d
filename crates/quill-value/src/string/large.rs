//! Chunked builder for very large byte strings
//!
//! Storage is a list of fixed-size chunks. Chunks are allocated once and never
//! resized, so appending never copies existing content.

use smallvec::SmallVec;

/// Byte-string builder backed by fixed-size chunks
#[derive(Clone)]
pub struct LargeBinaryBuf {
    chunks: SmallVec<[Box<[u8]>; 4]>,
    chunk_size: usize,
    len: usize,
}

impl LargeBinaryBuf {
    /// Create an empty builder with the given chunk size
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunks: SmallVec::new(),
            chunk_size: chunk_size.max(1),
            len: 0,
        }
    }

    /// Create a builder holding a copy of `bytes`
    pub fn from_bytes(chunk_size: usize, bytes: &[u8]) -> Self {
        let mut buf = Self::new(chunk_size);
        buf.append(bytes);
        buf
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Configured chunk size
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of allocated chunks
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Append bytes, allocating new chunks as the tail fills
    pub fn append(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            if self.len == self.chunks.len() * self.chunk_size {
                self.chunks
                    .push(vec![0u8; self.chunk_size].into_boxed_slice());
            }
            let index = self.len / self.chunk_size;
            let offset = self.len % self.chunk_size;
            let take = (self.chunk_size - offset).min(bytes.len());
            self.chunks[index][offset..offset + take].copy_from_slice(&bytes[..take]);
            self.len += take;
            bytes = &bytes[take..];
        }
    }

    /// Append one byte
    pub fn push(&mut self, byte: u8) {
        self.append(&[byte]);
    }

    /// Byte at `index`
    pub fn byte_at(&self, index: usize) -> Option<u8> {
        if index >= self.len {
            return None;
        }
        Some(self.chunks[index / self.chunk_size][index % self.chunk_size])
    }

    /// Iterate over the filled part of each chunk
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let chunk_size = self.chunk_size;
        let len = self.len;
        self.chunks.iter().enumerate().map(move |(i, chunk)| {
            let filled = (len - i * chunk_size).min(chunk_size);
            &chunk[..filled]
        })
    }

    /// Copy the contents into one contiguous vector
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for chunk in self.chunks() {
            out.extend_from_slice(chunk);
        }
        out
    }
}

impl PartialEq for LargeBinaryBuf {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.to_vec() == other.to_vec()
    }
}

impl Eq for LargeBinaryBuf {}

impl std::fmt::Debug for LargeBinaryBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeBinaryBuf")
            .field("len", &self.len)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}
