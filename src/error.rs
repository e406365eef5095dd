use thiserror::Error;

/// Errors loading the persisted defaults document at startup.
#[derive(Debug, Error)]
pub enum DefaultsError {
    #[error("Failed to read defaults file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse defaults file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the encrypted-body transport layer.
///
/// Every variant is a protocol violation by the client and maps to HTTP 400.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// `X-Encrypted-Body` carried a tag other than `XOR`
    #[error("Unsupported cipher tag: {tag:?} (only XOR is supported)")]
    UnsupportedCipher { tag: String },

    /// Body is encrypted but the server has no key configured
    #[error("Unable to decrypt request without key")]
    MissingKey,

    /// The encrypted body is larger than the configured limit
    #[error("Request body exceeds the limit of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The request body could not be read
    #[error("Failed to read request body: {0}")]
    Body(String),
}

/// Errors from script lookup and argument marshalling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// Non-empty script name that is not registered for this entry point
    #[error("Script not found: {name}")]
    NotFound { name: String },

    /// Supplied arguments do not fill the script's slot range exactly
    #[error("Script '{script}' expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        script: String,
        expected: usize,
        actual: usize,
    },

    /// Named arguments whose labels differ from the declared ones
    #[error("Script '{script}' has no argument named '{label}'")]
    UnknownArgument { script: String, label: String },
}

/// Errors returned by the external generation engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Transport-level failure talking to the engine
    #[error("Engine request failed: {0}")]
    Request(String),

    /// Engine answered with a non-success status
    #[error("Engine returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Engine payload could not be decoded
    #[error("Engine returned an undecodable result: {0}")]
    Decode(String),

    /// Engine produced no images
    #[error("Engine returned no images")]
    EmptyResult,
}

/// Errors converting between images and their base64 wire form.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Payload is not valid base64
    #[error("Invalid base64: {0}")]
    Base64(String),

    /// Bytes are not a decodable image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Image could not be encoded
    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Errors writing sample images to disk. Logged, never returned to clients.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to create sample directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write sample {path}: {message}")]
    Write { path: String, message: String },
}

/// Errors that can occur while serving a generation request.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Request JSON does not match the endpoint schema
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// A caller-supplied image could not be decoded
    #[error("Invalid image in '{field}': {message}")]
    InvalidImage { field: &'static str, message: String },

    /// Script lookup or marshalling failed
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// The generation engine failed
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// An output image could not be encoded
    #[error("Failed to encode output image: {message}")]
    Encode { message: String },
}

impl GenerationError {
    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        GenerationError::InvalidRequest {
            message: message.into(),
        }
    }
}
