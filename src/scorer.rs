//! Acoustic scoring: turns `(frame, transition id)` into a scaled cost.
//!
//! Both scorers resolve the transition id to a pdf id through the [`TransitionModel`] and return
//! `-acoustic_scale * log_likelihood`. They differ only in where the log-likelihood comes from:
//! - [`MatrixScorer`] reads it from a precomputed `frames × pdfs` table.
//! - [`GmmScorer`] evaluates the pdf's Gaussian mixture against the frame's feature vector.

use std::cell::RefCell;

use ndarray::ArrayView2;

use crate::gmm::AmDiagGmm;
use crate::transition::TransitionModel;
use crate::types::{PdfId, TransitionId};
use crate::{Error, Result};

/// Per-frame acoustic cost provider driven by the decoder.
///
/// Implementations must be idempotent: the same `(frame, tid)` always yields the same cost.
pub trait AcousticScorer {
    /// Number of frames available for decoding.
    fn num_frames(&self) -> usize;

    /// Scaled negative log-likelihood of `tid` at `frame`.
    fn cost(&self, frame: usize, tid: TransitionId) -> Result<f32>;
}

fn pdf_for(trans_model: &TransitionModel, tid: TransitionId) -> Result<PdfId> {
    trans_model
        .transition_id_to_pdf(tid)
        .ok_or(Error::UnknownTransitionId(tid))
}

/// Scorer backed by a precomputed log-likelihood matrix (one row per frame, one column per pdf).
///
/// The models (`'m`) and the utterance data (`'a`) are borrowed independently.
pub struct MatrixScorer<'m, 'a> {
    trans_model: &'m TransitionModel,
    loglikes: ArrayView2<'a, f32>,
    acoustic_scale: f32,
}

impl<'m, 'a> MatrixScorer<'m, 'a> {
    /// Fails with [`Error::DimensionMismatch`] when a non-empty matrix does not have exactly one
    /// column per pdf of the transition model.
    pub fn new(
        trans_model: &'m TransitionModel,
        loglikes: ArrayView2<'a, f32>,
        acoustic_scale: f32,
    ) -> Result<Self> {
        if loglikes.nrows() > 0 && loglikes.ncols() != trans_model.num_pdfs() {
            return Err(Error::DimensionMismatch {
                expected: trans_model.num_pdfs(),
                got: loglikes.ncols(),
            });
        }
        Ok(Self {
            trans_model,
            loglikes,
            acoustic_scale,
        })
    }
}

impl AcousticScorer for MatrixScorer<'_, '_> {
    fn num_frames(&self) -> usize {
        self.loglikes.nrows()
    }

    fn cost(&self, frame: usize, tid: TransitionId) -> Result<f32> {
        let pdf = pdf_for(self.trans_model, tid)?;
        let loglike = self
            .loglikes
            .get((frame, pdf as usize))
            .copied()
            .ok_or(Error::IndexOutOfRange {
                frame,
                num_frames: self.loglikes.nrows(),
                pdf,
                num_pdfs: self.loglikes.ncols(),
            })?;
        Ok(-self.acoustic_scale * loglike)
    }
}

/// Log-likelihoods computed so far for a single frame.
#[derive(Debug, Default)]
struct FrameCache {
    frame: Option<usize>,
    loglikes: Vec<Option<f32>>,
}

/// Scorer that evaluates a diagonal GMM acoustic model on the fly.
///
/// The decoder asks for the same pdf many times within a frame (every arc sharing a pdf), so the
/// current frame's likelihoods are cached. Frames are visited in order; moving to a new frame
/// resets the cache.
pub struct GmmScorer<'m, 'a> {
    am: &'m AmDiagGmm,
    trans_model: &'m TransitionModel,
    features: ArrayView2<'a, f32>,
    acoustic_scale: f32,
    cache: RefCell<FrameCache>,
}

impl<'m, 'a> GmmScorer<'m, 'a> {
    /// Fails with [`Error::ModelNotLoaded`] when the model has no Gaussians, and with
    /// [`Error::DimensionMismatch`] when the feature width differs from the model's.
    pub fn new(
        am: &'m AmDiagGmm,
        trans_model: &'m TransitionModel,
        features: ArrayView2<'a, f32>,
        acoustic_scale: f32,
    ) -> Result<Self> {
        if am.num_gauss() == 0 {
            return Err(Error::ModelNotLoaded);
        }
        if features.nrows() > 0 && features.ncols() != am.dim() {
            return Err(Error::DimensionMismatch {
                expected: am.dim(),
                got: features.ncols(),
            });
        }
        Ok(Self {
            am,
            trans_model,
            features,
            acoustic_scale,
            cache: RefCell::new(FrameCache::default()),
        })
    }

    fn log_likelihood(&self, frame: usize, pdf: PdfId) -> Result<f32> {
        let out_of_range = || Error::IndexOutOfRange {
            frame,
            num_frames: self.features.nrows(),
            pdf,
            num_pdfs: self.am.num_pdfs(),
        };
        if frame >= self.features.nrows() {
            return Err(out_of_range());
        }
        let gmm = self.am.pdf(pdf).ok_or_else(out_of_range)?;

        let mut cache = self.cache.borrow_mut();
        if cache.frame != Some(frame) {
            cache.frame = Some(frame);
            cache.loglikes.clear();
            cache.loglikes.resize(self.am.num_pdfs(), None);
        }
        if let Some(cached) = cache.loglikes[pdf as usize] {
            return Ok(cached);
        }
        let loglike = gmm.log_likelihood(self.features.row(frame))?;
        cache.loglikes[pdf as usize] = Some(loglike);
        Ok(loglike)
    }
}

impl AcousticScorer for GmmScorer<'_, '_> {
    fn num_frames(&self) -> usize {
        self.features.nrows()
    }

    fn cost(&self, frame: usize, tid: TransitionId) -> Result<f32> {
        let pdf = pdf_for(self.trans_model, tid)?;
        Ok(-self.acoustic_scale * self.log_likelihood(frame, pdf)?)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::{Array2, array};

    use super::*;
    use crate::gmm::{AmDiagGmmParams, DiagGmmParams};

    fn gmm(mean: f32) -> DiagGmmParams {
        DiagGmmParams {
            weights: vec![1.0],
            means: vec![vec![mean]],
            variances: vec![vec![1.0]],
        }
    }

    #[test]
    fn matrix_cost_is_scaled_negative_loglike_of_mapped_pdf() -> anyhow::Result<()> {
        // tid 1 -> pdf 1, tid 2 -> pdf 0
        let tm = TransitionModel::from_pdfs(&[1, 0])?;
        let likes = array![[-1.0f32, -3.0], [-2.0, -0.5]];
        let scorer = MatrixScorer::new(&tm, likes.view(), 0.5)?;

        assert_eq!(scorer.num_frames(), 2);
        assert_relative_eq!(scorer.cost(0, 1)?, 1.5);
        assert_relative_eq!(scorer.cost(0, 2)?, 0.5);
        assert_relative_eq!(scorer.cost(1, 1)?, 0.25);
        assert_eq!(scorer.cost(1, 1)?, scorer.cost(1, 1)?);
        Ok(())
    }

    #[test]
    fn matrix_bounds_are_checked() -> anyhow::Result<()> {
        let tm = TransitionModel::from_pdfs(&[0, 1])?;
        let likes = array![[-1.0f32, -3.0]];
        let scorer = MatrixScorer::new(&tm, likes.view(), 1.0)?;

        assert!(matches!(
            scorer.cost(1, 1),
            Err(Error::IndexOutOfRange { frame: 1, pdf: 0, .. })
        ));
        assert!(matches!(
            scorer.cost(0, 9),
            Err(Error::UnknownTransitionId(9))
        ));
        Ok(())
    }

    #[test]
    fn matrix_width_must_match_pdf_count() -> anyhow::Result<()> {
        let tm = TransitionModel::from_pdfs(&[0, 1])?;

        let wide = Array2::<f32>::zeros((3, 5));
        assert!(matches!(
            MatrixScorer::new(&tm, wide.view(), 1.0),
            Err(Error::DimensionMismatch { expected: 2, got: 5 })
        ));

        let narrow = Array2::<f32>::zeros((3, 1));
        assert!(matches!(
            MatrixScorer::new(&tm, narrow.view(), 1.0),
            Err(Error::DimensionMismatch { expected: 2, got: 1 })
        ));

        // A zero-frame matrix is left for the decoder to report.
        let empty = Array2::<f32>::zeros((0, 0));
        assert_eq!(MatrixScorer::new(&tm, empty.view(), 1.0)?.num_frames(), 0);
        Ok(())
    }

    #[test]
    fn gmm_scorer_agrees_with_precomputed_matrix() -> anyhow::Result<()> {
        let am = AmDiagGmm::from_params(&AmDiagGmmParams {
            pdfs: vec![gmm(0.0), gmm(3.0)],
        })?;
        let tm = TransitionModel::from_pdfs(&[0, 1])?;
        let feats = array![[0.2f32], [2.9], [-1.0]];
        let likes = am.compute_loglikes(feats.view())?;

        let from_model = GmmScorer::new(&am, &tm, feats.view(), 0.1)?;
        let from_matrix = MatrixScorer::new(&tm, likes.view(), 0.1)?;
        for frame in 0..3 {
            for tid in 1..=2 {
                assert_relative_eq!(
                    from_model.cost(frame, tid)?,
                    from_matrix.cost(frame, tid)?,
                    epsilon = 1e-6
                );
            }
        }
        // Revisit an earlier frame after the cache moved on.
        assert_relative_eq!(
            from_model.cost(0, 2)?,
            from_matrix.cost(0, 2)?,
            epsilon = 1e-6
        );
        Ok(())
    }

    #[test]
    fn gmm_scorer_requires_gaussians() -> anyhow::Result<()> {
        let am = AmDiagGmm::default();
        let tm = TransitionModel::from_pdfs(&[0])?;
        let feats = array![[0.0f32]];
        assert!(matches!(
            GmmScorer::new(&am, &tm, feats.view(), 0.1),
            Err(Error::ModelNotLoaded)
        ));
        Ok(())
    }

    #[test]
    fn gmm_scorer_checks_feature_width_and_pdf_range() -> anyhow::Result<()> {
        let am = AmDiagGmm::from_params(&AmDiagGmmParams {
            pdfs: vec![gmm(0.0)],
        })?;
        let tm = TransitionModel::from_pdfs(&[0, 3])?;

        let wide = array![[0.0f32, 1.0]];
        assert!(matches!(
            GmmScorer::new(&am, &tm, wide.view(), 0.1),
            Err(Error::DimensionMismatch { expected: 1, got: 2 })
        ));

        let feats = array![[0.0f32]];
        let scorer = GmmScorer::new(&am, &tm, feats.view(), 0.1)?;
        assert!(matches!(
            scorer.cost(0, 2),
            Err(Error::IndexOutOfRange { pdf: 3, .. })
        ));
        Ok(())
    }
}
