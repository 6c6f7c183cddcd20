use serde::Deserialize;

use crate::decoder::{DEFAULT_BEAM, DecoderConfig};
use crate::{Error, Result};

/// Default acoustic scale applied to log-likelihoods.
pub const DEFAULT_ACOUSTIC_SCALE: f32 = 0.1;

/// Options that control how an utterance is decoded.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// The CLI is responsible for mapping user input into this type so that:
/// - the library remains reusable outside of a CLI context
/// - other frontends (services, tests, batch jobs) can construct options programmatically
///
/// Every field has a default, so a JSON config file may set any subset of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecodeOpts {
    /// Multiplier applied to acoustic log-likelihoods: `cost = -acoustic_scale * loglike`.
    pub acoustic_scale: f32,

    /// Beam width for pruning, in cost units.
    pub beam: f32,

    /// Whether to return the best non-final hypothesis (marked `partial`) when no final state
    /// is reached. When `false` such utterances fail.
    pub allow_partial: bool,
}

impl Default for DecodeOpts {
    fn default() -> Self {
        Self {
            acoustic_scale: DEFAULT_ACOUSTIC_SCALE,
            beam: DEFAULT_BEAM,
            allow_partial: true,
        }
    }
}

impl DecodeOpts {
    /// Parse options from JSON, filling unspecified fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let opts: Self = serde_json::from_str(json)?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.acoustic_scale.is_finite() {
            return Err(Error::msg(format!(
                "acoustic scale must be finite, got {}",
                self.acoustic_scale
            )));
        }
        self.decoder_config().validate()
    }

    pub(crate) fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig { beam: self.beam }
    }
}

/// Where to find the models a [`crate::Recognizer`] is built from.
#[derive(Debug, Clone)]
pub struct LoadOpts {
    /// JSON model file holding the transition model and, optionally, the acoustic model.
    pub model_path: String,

    /// Decoding graph in AT&T text form.
    pub graph_path: String,

    /// Optional word symbol table. Without it, word strings are not resolved.
    pub word_symbols_path: Option<String>,

    /// Also load the acoustic model from the model file.
    ///
    /// Precondition: the model file must contain one. Nothing else about the file layout is
    /// checked.
    pub load_am: bool,
}
