//! Diagonal-covariance Gaussian mixture acoustic model.
//!
//! Each pdf id owns one [`DiagGmm`]. Likelihoods are evaluated in the "natural" form: for every
//! component we precompute
//!
//! `gconst = ln w - 0.5 * (D ln 2π + Σ ln σ² + Σ μ²/σ²)`
//!
//! so a frame costs one dot product against `μ/σ²` and one against `1/σ²` per component.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::types::PdfId;
use crate::{Error, Result};

/// Serialized parameters of a single mixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagGmmParams {
    pub weights: Vec<f32>,
    /// One mean vector per component.
    pub means: Vec<Vec<f32>>,
    /// One variance vector per component.
    pub variances: Vec<Vec<f32>>,
}

/// A diagonal-covariance mixture of Gaussians with precomputed evaluation constants.
#[derive(Debug, Clone)]
pub struct DiagGmm {
    gconsts: Array1<f32>,
    /// `μ / σ²`, components × dim.
    means_invvars: Array2<f32>,
    /// `1 / σ²`, components × dim.
    inv_vars: Array2<f32>,
}

impl DiagGmm {
    pub fn from_params(params: &DiagGmmParams) -> Result<Self> {
        let num_comp = params.weights.len();
        if params.means.len() != num_comp || params.variances.len() != num_comp {
            return Err(Error::msg(format!(
                "GMM has {num_comp} weights but {} means and {} variances",
                params.means.len(),
                params.variances.len()
            )));
        }

        let dim = params.means.first().map_or(0, Vec::len);
        let mut gconsts = Array1::<f32>::zeros(num_comp);
        let mut means_invvars = Array2::<f32>::zeros((num_comp, dim));
        let mut inv_vars = Array2::<f32>::zeros((num_comp, dim));
        let log_2pi = (2.0 * std::f64::consts::PI).ln();

        for (c, ((&weight, mean), var)) in params
            .weights
            .iter()
            .zip(&params.means)
            .zip(&params.variances)
            .enumerate()
        {
            if mean.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    got: mean.len(),
                });
            }
            if var.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    got: var.len(),
                });
            }
            if !(weight > 0.0 && weight.is_finite()) {
                return Err(Error::msg(format!(
                    "GMM component {c} has invalid weight {weight}"
                )));
            }

            // Accumulate in f64; gconsts lose a lot of precision in f32 for wide features.
            let mut gconst = f64::from(weight).ln() - 0.5 * dim as f64 * log_2pi;
            for d in 0..dim {
                let v = var[d];
                if !(v > 0.0 && v.is_finite()) {
                    return Err(Error::msg(format!(
                        "GMM component {c} has invalid variance {v} in dimension {d}"
                    )));
                }
                let inv = 1.0 / f64::from(v);
                let m = f64::from(mean[d]);
                gconst -= 0.5 * (f64::from(v).ln() + m * m * inv);
                inv_vars[[c, d]] = inv as f32;
                means_invvars[[c, d]] = (m * inv) as f32;
            }
            gconsts[c] = gconst as f32;
        }

        Ok(Self {
            gconsts,
            means_invvars,
            inv_vars,
        })
    }

    pub fn num_gauss(&self) -> usize {
        self.gconsts.len()
    }

    pub fn dim(&self) -> usize {
        self.inv_vars.ncols()
    }

    /// Per-component log-likelihoods (including the mixture weight) of `feature`.
    pub fn component_log_likelihoods(&self, feature: ArrayView1<f32>) -> Result<Array1<f32>> {
        if feature.len() != self.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                got: feature.len(),
            });
        }
        let squared = feature.mapv(|x| x * x);
        let mut loglikes = self.gconsts.clone();
        loglikes += &self.means_invvars.dot(&feature);
        loglikes.scaled_add(-0.5, &self.inv_vars.dot(&squared));
        Ok(loglikes)
    }

    /// Total log-likelihood `ln Σ_c p(c) N(x; μ_c, σ²_c)`.
    pub fn log_likelihood(&self, feature: ArrayView1<f32>) -> Result<f32> {
        let loglikes = self.component_log_likelihoods(feature)?;
        Ok(log_sum_exp(loglikes.view()))
    }
}

fn log_sum_exp(values: ArrayView1<f32>) -> f32 {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return f32::NEG_INFINITY;
    }
    let sum: f64 = values
        .iter()
        .map(|&v| f64::from(v - max).exp())
        .sum();
    max + sum.ln() as f32
}

/// Serialized acoustic model: one mixture per pdf id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmDiagGmmParams {
    pub pdfs: Vec<DiagGmmParams>,
}

/// Acoustic model holding one [`DiagGmm`] per pdf id.
#[derive(Debug, Clone, Default)]
pub struct AmDiagGmm {
    pdfs: Vec<DiagGmm>,
}

impl AmDiagGmm {
    pub fn new(pdfs: Vec<DiagGmm>) -> Result<Self> {
        if let Some(first) = pdfs.first() {
            let dim = first.dim();
            if let Some(bad) = pdfs.iter().find(|g| g.dim() != dim) {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    got: bad.dim(),
                });
            }
        }
        Ok(Self { pdfs })
    }

    pub fn from_params(params: &AmDiagGmmParams) -> Result<Self> {
        let pdfs = params
            .pdfs
            .iter()
            .map(DiagGmm::from_params)
            .collect::<Result<Vec<_>>>()?;
        Self::new(pdfs)
    }

    pub fn num_pdfs(&self) -> usize {
        self.pdfs.len()
    }

    /// Total number of Gaussian components across all pdfs.
    pub fn num_gauss(&self) -> usize {
        self.pdfs.iter().map(DiagGmm::num_gauss).sum()
    }

    /// Feature dimension (0 for an empty model).
    pub fn dim(&self) -> usize {
        self.pdfs.first().map_or(0, DiagGmm::dim)
    }

    pub fn pdf(&self, pdf: PdfId) -> Option<&DiagGmm> {
        self.pdfs.get(pdf as usize)
    }

    pub fn log_likelihood(&self, pdf: PdfId, feature: ArrayView1<f32>) -> Result<f32> {
        let gmm = self.pdf(pdf).ok_or(Error::IndexOutOfRange {
            frame: 0,
            num_frames: 0,
            pdf,
            num_pdfs: self.num_pdfs(),
        })?;
        gmm.log_likelihood(feature)
    }

    /// Evaluate every pdf against every frame: `frames × pdfs` log-likelihoods.
    pub fn compute_loglikes(&self, features: ArrayView2<f32>) -> Result<Array2<f32>> {
        if self.num_gauss() == 0 {
            return Err(Error::ModelNotLoaded);
        }
        let mut out = Array2::<f32>::zeros((features.nrows(), self.num_pdfs()));
        for (frame, mut row) in features.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
            for (pdf, gmm) in self.pdfs.iter().enumerate() {
                row[pdf] = gmm.log_likelihood(frame)?;
            }
        }
        Ok(out)
    }
}
