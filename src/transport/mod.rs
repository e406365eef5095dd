//! Encrypted HTTP body transport.
//!
//! - [`cipher`]: repeating-key XOR transcoder with a stateful streaming variant
//! - [`middleware`]: Axum middleware that decrypts requests and re-encrypts
//!   streamed responses when `X-Encrypted-Body: XOR` is present

pub mod cipher;
pub mod middleware;

pub use cipher::{transcode, EncryptionKey, XorStream};
pub use middleware::{
    encrypt_response, encryption_middleware, CipherTag, TransportState, DEFAULT_MAX_BODY_BYTES,
    ENCRYPTED_BODY_HEADER,
};
