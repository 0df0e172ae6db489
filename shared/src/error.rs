use thiserror::Error;

/// Failure kinds surfaced by the map and synchronization core.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    /// Any failed request: transport error, non-2xx status, unreadable body.
    #[error("network error: {0}")]
    Network(String),

    /// Zero or negative board dimensions. Fatal to map initialization.
    #[error("invalid board geometry: {width}x{height} over {columns}x{rows} mileposts")]
    InvalidBoardGeometry {
        width: f64,
        height: f64,
        columns: usize,
        rows: usize,
    },

    /// A terrain milepost with no glyph asset. Recoverable, the milepost is skipped.
    #[error("no glyph for milepost kind '{0}'")]
    UnknownMilepostKind(String),

    /// A payload that lacks the fields its phase requires.
    #[error("malformed server payload: {0}")]
    MalformedServerPayload(String),
}

impl ClientError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedServerPayload(msg.into())
    }

    /// Whether the error should be shown to the player, not only logged.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Self::Network(_) | Self::MalformedServerPayload(_))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedServerPayload(err.to_string())
    }
}
