//! Error types for frameseek-av.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while probing or opening media.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// ffprobe (or another executable) could not be found.
    #[error("{tool} not found; install it or set [tools] ffprobe_path")]
    ToolNotFound { tool: String },

    /// An executable ran but exited unsuccessfully.
    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// ffprobe printed something other than the expected JSON.
    #[error("unreadable ffprobe output: {0}")]
    BadProbeOutput(String),

    /// The media file does not exist.
    #[error("media file not found: {}", path.display())]
    MediaNotFound { path: PathBuf },

    /// The file has no video stream with the requested number.
    #[error("no video stream {track} in {}", path.display())]
    NoVideoTrack { path: PathBuf, track: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// FFmpeg library error.
    #[cfg(feature = "native-ffmpeg")]
    #[error("FFmpeg error: {0}")]
    FFmpeg(String),
}

impl Error {
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn media_not_found(path: impl Into<PathBuf>) -> Self {
        Self::MediaNotFound { path: path.into() }
    }
}

#[cfg(feature = "native-ffmpeg")]
impl From<ffmpeg_the_third::Error> for Error {
    fn from(err: ffmpeg_the_third::Error) -> Self {
        Error::FFmpeg(err.to_string())
    }
}

/// Backend failures reach the engine as [`frameseek_core::Error::Backend`];
/// I/O keeps its kind.
impl From<Error> for frameseek_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => frameseek_core::Error::Io(e),
            other => frameseek_core::Error::backend(other.to_string()),
        }
    }
}
