//! Transition model: maps transition ids (the graph's input labels) to pdf ids.
//!
//! A transition model is a list of transition states, each a `(phone, hmm_state, pdf)` triple
//! with a number of outgoing HMM transitions. Transition ids enumerate those transitions in
//! order starting at 1; id 0 is epsilon and never maps to a pdf.

use serde::{Deserialize, Serialize};

use crate::types::{PdfId, TransitionId};
use crate::{Error, Result};

/// One `(phone, hmm_state, pdf)` triple and the number of transitions leaving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionState {
    pub phone: u32,
    pub hmm_state: u32,
    pub pdf: PdfId,
    #[serde(default = "default_num_transitions")]
    pub num_transitions: u32,
}

fn default_num_transitions() -> u32 {
    2
}

/// Immutable transition-id → pdf-id mapping plus phone/state bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTransitionModel", into = "RawTransitionModel")]
pub struct TransitionModel {
    states: Vec<TransitionState>,
    /// `id_to_state[tid]` is the index into `states` for transition id `tid` (slot 0 unused).
    id_to_state: Vec<u32>,
    num_pdfs: usize,
}

#[derive(Serialize, Deserialize)]
struct RawTransitionModel {
    states: Vec<TransitionState>,
}

impl TryFrom<RawTransitionModel> for TransitionModel {
    type Error = Error;

    fn try_from(raw: RawTransitionModel) -> Result<Self> {
        Self::new(raw.states)
    }
}

impl From<TransitionModel> for RawTransitionModel {
    fn from(model: TransitionModel) -> Self {
        Self {
            states: model.states,
        }
    }
}

impl TransitionModel {
    /// Build a transition model from its transition states.
    ///
    /// Every state must own at least one transition.
    pub fn new(states: Vec<TransitionState>) -> Result<Self> {
        let mut id_to_state = vec![0u32];
        for (idx, state) in states.iter().enumerate() {
            if state.num_transitions == 0 {
                return Err(Error::msg(format!(
                    "transition state {} (phone {}, hmm state {}) has no transitions",
                    idx + 1,
                    state.phone,
                    state.hmm_state
                )));
            }
            id_to_state.extend(std::iter::repeat_n(idx as u32, state.num_transitions as usize));
        }

        let num_pdfs = states
            .iter()
            .map(|s| s.pdf as usize + 1)
            .max()
            .unwrap_or(0);

        Ok(Self {
            states,
            id_to_state,
            num_pdfs,
        })
    }

    /// Convenience constructor where transition id `i + 1` maps to `pdfs[i]`.
    ///
    /// Each pdf becomes its own single-transition state of phone 1.
    pub fn from_pdfs(pdfs: &[PdfId]) -> Result<Self> {
        let states = pdfs
            .iter()
            .enumerate()
            .map(|(i, &pdf)| TransitionState {
                phone: 1,
                hmm_state: i as u32,
                pdf,
                num_transitions: 1,
            })
            .collect();
        Self::new(states)
    }

    pub fn transition_id_to_pdf(&self, tid: TransitionId) -> Option<PdfId> {
        self.state_of(tid).map(|s| s.pdf)
    }

    pub fn transition_id_to_phone(&self, tid: TransitionId) -> Option<u32> {
        self.state_of(tid).map(|s| s.phone)
    }

    pub fn is_valid(&self, tid: TransitionId) -> bool {
        self.state_of(tid).is_some()
    }

    pub fn num_pdfs(&self) -> usize {
        self.num_pdfs
    }

    pub fn num_transition_ids(&self) -> usize {
        self.id_to_state.len() - 1
    }

    pub fn num_transition_states(&self) -> usize {
        self.states.len()
    }

    /// Distinct phones, ascending.
    pub fn phones(&self) -> Vec<u32> {
        let mut phones: Vec<u32> = self.states.iter().map(|s| s.phone).collect();
        phones.sort_unstable();
        phones.dedup();
        phones
    }

    fn state_of(&self, tid: TransitionId) -> Option<&TransitionState> {
        if tid == 0 {
            return None;
        }
        let idx = *self.id_to_state.get(tid as usize)?;
        self.states.get(idx as usize)
    }
}
