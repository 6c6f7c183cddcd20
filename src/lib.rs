//! `fastdec`: a small, focused frame-synchronous beam-search decoder for speech recognition.
//!
//! This crate provides:
//! - A token-passing beam search over a weighted decoding graph
//! - Acoustic scoring from precomputed log-likelihoods or a diagonal GMM
//! - Best-path extraction into alignments, word ids, words and pdf ids
//! - Pluggable output encoders (JSON, transcript text)
//!
//! The library is designed to be used by both CLI tools and long-running services:
//! models and graphs are loaded once and shared read-only, and each [`Recognizer`] decodes one
//! utterance at a time.

// High-level API (most consumers should start here).
pub mod opts;
pub mod recognizer;
pub mod result;

// Search core.
pub mod decoder;
pub mod path;
pub mod scorer;

// Read-only collaborators: graph and models.
pub mod gmm;
pub mod graph;
pub mod model;
pub mod transition;
pub mod types;

// Matrix marshalling and archives.
pub mod matrix;

// Output selection and encoder interfaces.
pub mod output_type;
pub mod result_encoder;

// Output encoders that serialize results into various formats.
pub mod json_array_encoder;
pub mod text_encoder;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

mod error;

pub use decoder::{DecoderConfig, DecoderState, FasterDecoder};
pub use error::{Error, Result};
pub use graph::{Graph, StdVectorFst};
pub use opts::{DecodeOpts, LoadOpts};
pub use output_type::OutputType;
pub use recognizer::{Recognizer, Utterance};
pub use result::DecodeResult;
pub use scorer::{AcousticScorer, GmmScorer, MatrixScorer};
pub use transition::{TransitionModel, TransitionState};

pub use rustfst::SymbolTable;

#[cfg(feature = "logging")]
pub use logging::init as init_logging;
