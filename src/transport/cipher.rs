//! Repeating-key XOR transcoder.
//!
//! Byte `i` of the output is `input[i] ^ key[i % key.len()]`. The transform
//! preserves length and is its own inverse.
//!
//! Streamed bodies are transcoded chunk by chunk with [`XorStream`], which
//! carries the keystream offset across chunk boundaries. Transcoding a payload
//! whole or in any split produces the same bytes.
//!
//! # Example
//!
//! ```rust
//! use sd_bridge::transport::{transcode, EncryptionKey, XorStream};
//!
//! let key = EncryptionKey::new("secret").unwrap();
//! let whole = transcode(b"hello world", key.as_bytes());
//!
//! let mut stream = XorStream::new(key);
//! let mut chunked = stream.apply(b"hello").to_vec();
//! chunked.extend_from_slice(&stream.apply(b" world"));
//!
//! assert_eq!(whole, chunked);
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

/// Transcode `input` with `key`, starting at keystream offset 0.
///
/// An empty key leaves the input unchanged.
pub fn transcode(input: &[u8], key: &[u8]) -> Vec<u8> {
    transcode_at(input, key, 0)
}

/// Transcode `input` starting at keystream position `offset`.
fn transcode_at(input: &[u8], key: &[u8], offset: usize) -> Vec<u8> {
    if key.is_empty() {
        return input.to_vec();
    }
    input
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ key[(offset + i) % key.len()])
        .collect()
}

// =============================================================================
// Encryption Key
// =============================================================================

/// Process-wide body encryption key.
///
/// Cheap to clone; the bytes are shared. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey(Arc<[u8]>);

impl EncryptionKey {
    /// Create a key, returning `None` if `key` is empty.
    pub fn new(key: impl AsRef<[u8]>) -> Option<Self> {
        let key = key.as_ref();
        if key.is_empty() {
            None
        } else {
            Some(Self(Arc::from(key)))
        }
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("len", &self.0.len())
            .finish()
    }
}

// =============================================================================
// Streaming Cipher
// =============================================================================

/// Stateful XOR cipher for a sequence of chunks.
///
/// Each call to [`apply`](Self::apply) continues the keystream where the
/// previous chunk stopped.
#[derive(Debug, Clone)]
pub struct XorStream {
    key: EncryptionKey,
    offset: usize,
}

impl XorStream {
    /// Start a new stream at keystream offset 0.
    pub fn new(key: EncryptionKey) -> Self {
        Self { key, offset: 0 }
    }

    /// Transcode the next chunk and advance the offset by its length.
    pub fn apply(&mut self, chunk: &[u8]) -> Bytes {
        let key = self.key.as_bytes();
        let out = transcode_at(chunk, key, self.offset);
        self.offset = (self.offset + chunk.len()) % key.len();
        Bytes::from(out)
    }

    /// Number of bytes processed so far, modulo the key length.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

// =============================================================================
// Tests
// =============================================================================
