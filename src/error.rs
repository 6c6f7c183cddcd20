use std::error::Error as StdError;

use thiserror::Error;

use crate::types::{PdfId, TransitionId};

/// Fastdec's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Fastdec's crate-wide error type.
///
/// Two kinds of failure flow through here:
/// - soft failures (`InvalidInput`, `DecodeFailed`) mean "no usable path for this utterance".
///   [`crate::Recognizer`] folds them into a `DecodeResult` with `failed = true`.
/// - everything else is caller or model misconfiguration and surfaces as a hard `Err`.
///
/// This is intentionally decoupled from `anyhow` so downstream libraries aren't forced to
/// adopt `anyhow` in their own public APIs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    DecodeFailed(String),

    #[error("acoustic model is not loaded (zero Gaussian components)")]
    ModelNotLoaded,

    #[error("index out of range: frame {frame} of {num_frames}, pdf {pdf} of {num_pdfs}")]
    IndexOutOfRange {
        frame: usize,
        num_frames: usize,
        pdf: PdfId,
        num_pdfs: usize,
    },

    #[error("transition id {0} is not defined by the transition model")]
    UnknownTransitionId(TransitionId),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("malformed matrix: row {row} has {got} columns, expected {expected}")]
    MalformedMatrix {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Whether this error means "no path for this utterance" rather than misconfiguration.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::DecodeFailed(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}
