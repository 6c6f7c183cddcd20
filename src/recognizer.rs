//! High-level API for decoding utterances with Fastdec.
//!
//! We expose a single entry point (`Recognizer`) that wires the lower-level pieces together:
//! acoustic scoring → beam search → best-path extraction → symbol resolution.
//!
//! The intent is:
//! - We load the decoding graph and models once (expensive).
//! - We share them read-only (`Arc`) so several recognizers can decode on separate threads.
//! - We reuse one recognizer to decode many utterances, one at a time.

use std::sync::Arc;

use ndarray::ArrayView2;
use rustfst::SymbolTable;
use tracing::{debug, warn};

use crate::decoder::{DecoderConfig, FasterDecoder};
use crate::gmm::AmDiagGmm;
use crate::graph::{Graph, StdVectorFst, read_graph};
use crate::model::Model;
use crate::opts::{DecodeOpts, LoadOpts};
use crate::path::BestPath;
use crate::result::{COULD_NOT_DECODE, DecodeResult, UNKNOWN_WORD, ZERO_LENGTH_UTTERANCE};
use crate::scorer::{AcousticScorer, GmmScorer, MatrixScorer};
use crate::transition::TransitionModel;
use crate::types::PdfId;
use crate::{Error, Result};

/// Per-utterance acoustic input.
#[derive(Debug, Clone, Copy)]
pub enum Utterance<'a> {
    /// Precomputed `frames × pdfs` log-likelihoods.
    LogLikelihoods(ArrayView2<'a, f32>),
    /// `frames × dim` feature vectors, scored with the recognizer's acoustic model.
    Features(ArrayView2<'a, f32>),
}

impl Utterance<'_> {
    pub fn num_frames(&self) -> usize {
        match self {
            Self::LogLikelihoods(m) | Self::Features(m) => m.nrows(),
        }
    }
}

/// The main decoding entry point.
///
/// `Recognizer` owns one [`FasterDecoder`] (and therefore one live search frontier) and shares
/// the read-only models it was built from. `decode` takes `&mut self`: a recognizer runs one
/// utterance at a time. Search state is released once each result has been extracted.
pub struct Recognizer<G: Graph = StdVectorFst> {
    decoder: FasterDecoder<G>,
    trans_model: Arc<TransitionModel>,
    am_gmm: Option<Arc<AmDiagGmm>>,
    word_syms: Option<Arc<SymbolTable>>,
}

impl Recognizer<StdVectorFst> {
    /// Load the model file, decoding graph (binary or text FST) and optional symbol table.
    pub fn load(opts: &LoadOpts) -> Result<Self> {
        let graph = read_graph(&opts.graph_path)?;
        let model = Model::open(&opts.model_path, opts.load_am)?;
        let word_syms = opts
            .word_symbols_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(read_symbols)
            .transpose()?;

        debug!(
            graph = %opts.graph_path,
            transition_ids = model.trans_model.num_transition_ids(),
            acoustic_model = model.am_gmm.is_some(),
            word_symbols = word_syms.as_ref().map(SymbolTable::len),
            "loaded recognizer"
        );

        Self::new(
            Arc::new(graph),
            Arc::new(model.trans_model),
            model.am_gmm.map(Arc::new),
            word_syms.map(Arc::new),
        )
    }
}

impl<G: Graph> Recognizer<G> {
    pub fn new(
        graph: Arc<G>,
        trans_model: Arc<TransitionModel>,
        am_gmm: Option<Arc<AmDiagGmm>>,
        word_syms: Option<Arc<SymbolTable>>,
    ) -> Result<Self> {
        let decoder = FasterDecoder::new(graph, DecoderConfig::default())?;
        Ok(Self {
            decoder,
            trans_model,
            am_gmm,
            word_syms,
        })
    }

    /// A fresh recognizer over the same shared graph and models (no models are copied).
    pub fn try_clone(&self) -> Result<Self> {
        Self::new(
            Arc::clone(self.decoder.graph()),
            Arc::clone(&self.trans_model),
            self.am_gmm.clone(),
            self.word_syms.clone(),
        )
    }

    /// Decode one utterance.
    ///
    /// "No usable path" outcomes come back as `Ok` with `failed = true`:
    /// - zero frames → `error = "Zero-length utterance"`
    /// - the frontier emptied, or no final state was reached and `allow_partial` is off →
    ///   `error = "Could not decode"`
    ///
    /// Misconfiguration (missing acoustic model, matrix or feature dimensions that do not fit the
    /// models) is returned as `Err`.
    pub fn decode(&mut self, utterance: Utterance<'_>, opts: &DecodeOpts) -> Result<DecodeResult> {
        opts.validate()?;
        if utterance.num_frames() == 0 {
            warn!("zero-length utterance");
            return Ok(DecodeResult::failure(ZERO_LENGTH_UTTERANCE));
        }
        self.decoder.set_config(opts.decoder_config())?;

        let outcome = match utterance {
            Utterance::LogLikelihoods(loglikes) => {
                let scorer =
                    MatrixScorer::new(&self.trans_model, loglikes, opts.acoustic_scale)?;
                self.decoder.decode(&scorer)
            }
            Utterance::Features(features) => {
                let am = self.am_gmm.as_deref().ok_or(Error::ModelNotLoaded)?;
                let scorer =
                    GmmScorer::new(am, &self.trans_model, features, opts.acoustic_scale)?;
                self.decoder.decode(&scorer)
            }
        };
        let result = self.collect(outcome, opts.allow_partial);
        self.decoder.release();
        result
    }

    /// Decode with a caller-provided scorer, bypassing the built-in scorer selection.
    ///
    /// The beam is whatever the last `decode` call (or the default) configured.
    pub fn decode_with(
        &mut self,
        scorer: &dyn AcousticScorer,
        allow_partial: bool,
    ) -> Result<DecodeResult> {
        let outcome = self.decoder.decode(scorer);
        let result = self.collect(outcome, allow_partial);
        self.decoder.release();
        result
    }

    pub fn decoder(&self) -> &FasterDecoder<G> {
        &self.decoder
    }

    pub fn transition_model(&self) -> &TransitionModel {
        &self.trans_model
    }

    pub fn acoustic_model(&self) -> Option<&AmDiagGmm> {
        self.am_gmm.as_deref()
    }

    pub fn word_symbols(&self) -> Option<&SymbolTable> {
        self.word_syms.as_deref()
    }

    fn collect(&self, outcome: Result<()>, allow_partial: bool) -> Result<DecodeResult> {
        match outcome {
            Ok(()) => {}
            Err(Error::InvalidInput(message)) => return Ok(DecodeResult::failure(message)),
            Err(err) if err.is_soft() => {
                warn!(error = %err, "utterance failed to decode");
                return Ok(DecodeResult::failure(COULD_NOT_DECODE));
            }
            Err(err) => return Err(err),
        }

        let Some(path) = self.decoder.best_path(allow_partial) else {
            warn!(
                frames = self.decoder.num_frames_decoded(),
                "no final state reached and partial results are disabled"
            );
            return Ok(DecodeResult::failure(COULD_NOT_DECODE));
        };
        if !path.reached_final {
            warn!(
                frames = self.decoder.num_frames_decoded(),
                "no final state reached; returning partial result"
            );
        }
        self.to_result(path)
    }

    fn to_result(&self, path: BestPath) -> Result<DecodeResult> {
        let words = match &self.word_syms {
            Some(syms) => path
                .word_ids
                .iter()
                .map(|&id| syms.get_symbol(id).unwrap_or(UNKNOWN_WORD).to_owned())
                .collect(),
            None => Vec::new(),
        };

        // Alignment labels come from graph arcs; a label the transition model does not know
        // means graph and model do not belong together.
        let pdf_ids = path
            .alignment
            .iter()
            .map(|&tid| {
                self.trans_model
                    .transition_id_to_pdf(tid)
                    .ok_or(Error::UnknownTransitionId(tid))
            })
            .collect::<Result<Vec<PdfId>>>()?;

        Ok(DecodeResult {
            failed: false,
            partial: !path.reached_final,
            score: path.log_likelihood(),
            alignment: path.alignment,
            word_ids: path.word_ids,
            words,
            pdf_ids,
            error: None,
        })
    }
}

fn read_symbols(path: &str) -> Result<SymbolTable> {
    SymbolTable::read_text(path)
        .map_err(|err| Error::msg(format!("failed to read word symbols '{path}': {err}")))
}
