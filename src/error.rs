//! Error handling for the monitoring core.

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for capture, sampling and analysis dispatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Capture device acquisition or permission failure. Terminal for that
    /// monitoring attempt; the session keeps its prior mode.
    #[error("capture device error: {0}")]
    Device(String),

    /// The device has not produced a full frame yet. Recoverable; the
    /// sampler skips the tick.
    #[error("frame not ready")]
    FrameNotReady,

    /// The analysis call failed before a service answer came back.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The analysis service answered with a failure message.
    #[error("analysis service error: {0}")]
    Service(String),

    /// A start command raced an already active upload or monitoring run.
    /// Rejected immediately with no state change.
    #[error("{0} already in progress")]
    AlreadyInProgress(&'static str),

    /// A frame could not be encoded to a still image.
    #[error("encode error: {0}")]
    Encode(#[from] image::ImageError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings or wire payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
