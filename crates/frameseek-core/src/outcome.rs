//! Outcomes of the long-running and seeking operations.
//!
//! Cancellation and end of stream are outcomes, not errors; only genuine
//! failures travel through [`crate::Error`].

use serde::Serialize;

/// Result of a cancellable operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<T> {
    Done(T),
    Cancelled,
}

impl<T> Completion<T> {
    /// Whether the operation ran to completion.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// The completed value, if any.
    pub fn done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Cancelled => None,
        }
    }
}

/// Result of a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekOutcome {
    /// The next frame read is the target.
    Positioned,
    /// The target lies past the last frame.
    EndOfStream,
    /// The cancel token fired.
    Cancelled,
}

/// Which strategy positioned the cursor last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Native,
    Indexed,
    Sequential,
}

/// The cheapest seek strategy a handle may currently use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    /// Native timestamp seeks are trusted.
    Native,
    /// A frame index exists; native seeks are not trusted.
    IndexOnly,
    /// Only decoding forward from a known position is exact.
    SequentialOnly,
}

/// Progress of a long operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Frames processed so far.
    pub done: u64,
    /// Expected frame count, when known.
    pub total: Option<u64>,
}

impl Progress {
    /// Completed fraction, when the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some((self.done as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }
}
