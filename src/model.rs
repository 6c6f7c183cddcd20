//! Combined model file: the transition model plus an optional GMM acoustic model.
//!
//! The file is JSON:
//!
//! ```json
//! {
//!   "transition_model": { "states": [ { "phone": 1, "hmm_state": 0, "pdf": 0 } ] },
//!   "am_gmm": { "pdfs": [ { "weights": [1.0], "means": [[0.0]], "variances": [[1.0]] } ] }
//! }
//! ```
//!
//! `am_gmm` may be absent for decoding from precomputed log-likelihoods.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::gmm::{AmDiagGmm, AmDiagGmmParams};
use crate::transition::TransitionModel;
use crate::{Error, Result};

#[derive(Deserialize)]
struct ModelFile {
    transition_model: TransitionModel,
    #[serde(default)]
    am_gmm: Option<AmDiagGmmParams>,
}

/// Models loaded from one model file.
#[derive(Debug, Clone)]
pub struct Model {
    pub trans_model: TransitionModel,
    pub am_gmm: Option<AmDiagGmm>,
}

impl Model {
    pub fn open(path: impl AsRef<Path>, load_am: bool) -> Result<Self> {
        Self::read(open_model(path.as_ref())?, load_am)
    }

    /// Like [`Model::open`], loading the acoustic model when the file has one.
    pub fn open_optional_am(path: impl AsRef<Path>) -> Result<Self> {
        Self::read_optional_am(open_model(path.as_ref())?)
    }

    /// Read a model file. With `load_am = false` any acoustic model in the file is ignored;
    /// with `load_am = true` the file must contain one.
    pub fn read<R: Read>(reader: R, load_am: bool) -> Result<Self> {
        let file: ModelFile = serde_json::from_reader(reader)?;
        if load_am && file.am_gmm.is_none() {
            return Err(Error::msg(
                "acoustic model requested but the model file does not contain one",
            ));
        }
        let am_gmm = if load_am { file.am_gmm } else { None };
        Self::build(file.transition_model, am_gmm)
    }

    /// Read a model file whose acoustic model is optional. A present but invalid acoustic model
    /// is still an error.
    pub fn read_optional_am<R: Read>(reader: R) -> Result<Self> {
        let file: ModelFile = serde_json::from_reader(reader)?;
        Self::build(file.transition_model, file.am_gmm)
    }

    fn build(trans_model: TransitionModel, am_gmm: Option<AmDiagGmmParams>) -> Result<Self> {
        let am_gmm = am_gmm
            .as_ref()
            .map(AmDiagGmm::from_params)
            .transpose()?;
        Ok(Self {
            trans_model,
            am_gmm,
        })
    }

    pub fn info(&self) -> ModelInfo {
        let am = self.am_gmm.as_ref();
        ModelInfo {
            num_phones: self.trans_model.phones().len(),
            num_pdfs: self.trans_model.num_pdfs(),
            num_transition_ids: self.trans_model.num_transition_ids(),
            num_transition_states: self.trans_model.num_transition_states(),
            feature_dim: am.map(AmDiagGmm::dim),
            num_gauss: am.map(AmDiagGmm::num_gauss),
        }
    }
}

fn open_model(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)
        .map_err(|err| Error::msg(format!("failed to open model '{}': {err}", path.display())))?;
    Ok(BufReader::new(file))
}

/// Summary counts of a loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub num_phones: usize,
    pub num_pdfs: usize,
    pub num_transition_ids: usize,
    pub num_transition_states: usize,
    pub feature_dim: Option<usize>,
    pub num_gauss: Option<usize>,
}

impl fmt::Display for ModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "number of phones {}", self.num_phones)?;
        writeln!(f, "number of pdfs {}", self.num_pdfs)?;
        writeln!(f, "number of transition-ids {}", self.num_transition_ids)?;
        writeln!(f, "number of transition-states {}", self.num_transition_states)?;
        if let (Some(dim), Some(gauss)) = (self.feature_dim, self.num_gauss) {
            writeln!(f, "feature dimension {dim}")?;
            writeln!(f, "number of gaussians {gauss}")?;
        }
        Ok(())
    }
}
