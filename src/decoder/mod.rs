//! Frame-synchronous beam search over a decoding graph.
//!
//! Each frame runs four steps over the frontier of live tokens:
//! 1. follow epsilon-input arcs to a fixed point (graph cost only),
//! 2. prune everything more than `beam` above the best token,
//! 3. follow emitting arcs, charging the acoustic cost of the current frame,
//! 4. prune the new frontier the same way.
//!
//! After the last frame a final epsilon closure and prune run so that final states reachable
//! through epsilon arcs are seen.

pub(crate) mod token;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use rustfst::Trs;
use tracing::{debug, info};

use crate::graph::{Graph, is_emitting};
use crate::path::{BestPath, trace_back};
use crate::result::ZERO_LENGTH_UTTERANCE;
use crate::scorer::AcousticScorer;
use crate::types::StateId;
use crate::{Error, Result};

use token::{Frontier, TokenArena, TokenId};

/// Default beam width (cost units).
pub const DEFAULT_BEAM: f32 = 16.0;

/// Search parameters owned by a [`FasterDecoder`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderConfig {
    /// Tokens costing more than `best + beam` are discarded after every expansion step.
    pub beam: f32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self { beam: DEFAULT_BEAM }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.beam.is_nan() || self.beam < 0.0 {
            return Err(Error::msg(format!(
                "beam must be a non-negative number, got {}",
                self.beam
            )));
        }
        Ok(())
    }
}

/// Lifecycle of a decoder with respect to the current utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// No utterance has been decoded yet, or the last one was abandoned on a hard error.
    Ready,
    /// Frames are being consumed.
    Decoding,
    /// Every frame has been consumed (or the frontier emptied); results can be extracted.
    Done,
}

/// Token-passing beam search decoder bound to one decoding graph.
///
/// The graph is shared read-only; the token arena and frontier are owned per decoder, so one
/// decoder runs one utterance at a time (enforced by `&mut self`). Run several decoders on
/// separate threads to decode in parallel.
pub struct FasterDecoder<G: Graph> {
    graph: Arc<G>,
    config: DecoderConfig,
    state: DecoderState,
    arena: TokenArena,
    frontier: Frontier,
    next: Frontier,
    queue: VecDeque<StateId>,
    queued: HashSet<StateId>,
    frames_decoded: usize,
}

impl<G: Graph> FasterDecoder<G> {
    pub fn new(graph: Arc<G>, config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            graph,
            config,
            state: DecoderState::Ready,
            arena: TokenArena::default(),
            frontier: Frontier::default(),
            next: Frontier::default(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
            frames_decoded: 0,
        })
    }

    pub fn graph(&self) -> &Arc<G> {
        &self.graph
    }

    pub fn config(&self) -> DecoderConfig {
        self.config
    }

    /// Replace the search parameters used by subsequent decodes.
    pub fn set_config(&mut self, config: DecoderConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn num_frames_decoded(&self) -> usize {
        self.frames_decoded
    }

    /// Number of live tokens in the current frontier.
    pub fn num_active(&self) -> usize {
        self.frontier.len()
    }

    /// Decode every frame `scorer` provides.
    ///
    /// Errors:
    /// - [`Error::InvalidInput`] for a zero-frame utterance (no search state is touched).
    /// - [`Error::DecodeFailed`] when the frontier empties; the decoder is left `Done`.
    /// - scorer errors abandon the utterance and return the decoder to `Ready`.
    pub fn decode(&mut self, scorer: &dyn AcousticScorer) -> Result<()> {
        let num_frames = scorer.num_frames();
        if num_frames == 0 {
            return Err(Error::InvalidInput(ZERO_LENGTH_UTTERANCE.to_owned()));
        }

        match self.init_decoding().and_then(|()| self.run(scorer, num_frames)) {
            Ok(()) => {
                self.state = DecoderState::Done;
                info!(
                    frames = self.frames_decoded,
                    active = self.frontier.len(),
                    tokens = self.arena.len(),
                    reached_final = self.reached_final(),
                    "decoded utterance"
                );
                Ok(())
            }
            Err(err) if err.is_soft() => {
                self.state = DecoderState::Done;
                Err(err)
            }
            Err(err) => {
                self.reset();
                Err(err)
            }
        }
    }

    /// Whether any surviving token sits in a final state after decoding finished.
    pub fn reached_final(&self) -> bool {
        self.state == DecoderState::Done
            && self
                .frontier
                .iter()
                .any(|(state, _, _)| self.graph.final_cost(state).is_some())
    }

    /// Trace the winning hypothesis.
    ///
    /// When a final state was reached the winner minimises `cost + final_cost`. Otherwise, with
    /// `allow_partial`, it is the cheapest live token regardless of finality; without it there is
    /// no result. Ties go to the token that entered the frontier first.
    pub fn best_path(&self, allow_partial: bool) -> Option<BestPath> {
        if self.state != DecoderState::Done {
            return None;
        }

        let reached_final = self.reached_final();
        let mut best: Option<(TokenId, f64, f64)> = None;
        for (state, token, cost) in self.frontier.iter() {
            let final_cost = if reached_final {
                match self.graph.final_cost(state) {
                    Some(fc) => f64::from(fc),
                    None => continue,
                }
            } else if allow_partial {
                0.0
            } else {
                return None;
            };
            let total = cost + final_cost;
            if best.is_none_or(|(_, _, best_total)| total < best_total) {
                best = Some((token, final_cost, total));
            }
        }

        best.map(|(token, final_cost, _)| {
            trace_back(&self.arena, token, final_cost, reached_final)
        })
    }

    /// Free the token arena and frontier once results have been extracted.
    ///
    /// The decoder returns to `Ready`; `best_path` has nothing to report until the next decode.
    pub fn release(&mut self) {
        self.arena.release();
        self.frontier.release();
        self.next.release();
        self.queue = VecDeque::new();
        self.queued = HashSet::new();
        self.frames_decoded = 0;
        self.state = DecoderState::Ready;
    }

    fn init_decoding(&mut self) -> Result<()> {
        self.reset();
        let start = self
            .graph
            .initial_state()
            .ok_or_else(|| Error::msg("decoding graph has no start state"))?;
        let token = self.arena.initial()?;
        self.frontier.offer(start, token, 0.0);
        self.state = DecoderState::Decoding;
        Ok(())
    }

    fn reset(&mut self) {
        self.arena.clear();
        self.frontier.clear();
        self.next.clear();
        self.queue.clear();
        self.queued.clear();
        self.frames_decoded = 0;
        self.state = DecoderState::Ready;
    }

    fn run(&mut self, scorer: &dyn AcousticScorer, num_frames: usize) -> Result<()> {
        for frame in 0..num_frames {
            self.process_nonemitting()?;
            self.prune("pre-frame", frame);
            self.process_emitting(scorer, frame)?;
            self.prune("post-frame", frame);
            self.frames_decoded = frame + 1;

            if self.frontier.is_empty() {
                return Err(Error::DecodeFailed(format!(
                    "no surviving hypotheses after frame {frame}"
                )));
            }
        }

        self.process_nonemitting()?;
        self.prune("final", num_frames);
        Ok(())
    }

    /// Epsilon closure of the frontier, computed to a fixed point.
    ///
    /// A state is re-queued only when its token strictly improves, so zero-cost epsilon cycles
    /// terminate. Closure never lowers the frontier's minimum, so candidates above
    /// `min + beam` can be dropped on the spot.
    fn process_nonemitting(&mut self) -> Result<()> {
        let Some(min_cost) = self.frontier.min_cost() else {
            return Ok(());
        };
        let cutoff = min_cost + f64::from(self.config.beam);

        self.queue.clear();
        self.queued.clear();
        for (state, _, _) in self.frontier.iter() {
            if self.queued.insert(state) {
                self.queue.push_back(state);
            }
        }

        while let Some(state) = self.queue.pop_front() {
            self.queued.remove(&state);
            let Some((token, _)) = self.frontier.get(state) else {
                continue;
            };

            let arcs = self.graph.arcs(state)?;
            for arc in arcs.trs() {
                if is_emitting(arc) {
                    continue;
                }
                let cost = self.arena.extended_cost(token, arc, 0.0);
                if cost > cutoff || !self.frontier.improves(arc.nextstate, cost) {
                    continue;
                }
                let next = self.arena.extend(token, arc, 0.0)?;
                self.frontier.offer(arc.nextstate, next, cost);
                if self.queued.insert(arc.nextstate) {
                    self.queue.push_back(arc.nextstate);
                }
            }
        }
        Ok(())
    }

    /// Expand every live token along its emitting arcs using the acoustic cost of `frame`.
    ///
    /// Candidates are compared against the running best of the new frontier; anything beyond
    /// `running_best + beam` would not survive the post-frame prune and is never allocated.
    fn process_emitting(&mut self, scorer: &dyn AcousticScorer, frame: usize) -> Result<()> {
        let beam = f64::from(self.config.beam);
        let mut running_best = f64::INFINITY;
        self.next.clear();

        for (state, token, _) in self.frontier.iter() {
            let arcs = self.graph.arcs(state)?;
            for arc in arcs.trs() {
                if !is_emitting(arc) {
                    continue;
                }
                let acoustic_cost = scorer.cost(frame, arc.ilabel)?;
                let cost = self.arena.extended_cost(token, arc, acoustic_cost);
                if cost > running_best + beam || !self.next.improves(arc.nextstate, cost) {
                    continue;
                }
                let next = self.arena.extend(token, arc, acoustic_cost)?;
                self.next.offer(arc.nextstate, next, cost);
                running_best = running_best.min(cost);
            }
        }

        std::mem::swap(&mut self.frontier, &mut self.next);
        self.next.clear();
        Ok(())
    }

    fn prune(&mut self, phase: &'static str, frame: usize) {
        let Some(min_cost) = self.frontier.min_cost() else {
            return;
        };
        let cutoff = min_cost + f64::from(self.config.beam);
        let removed = self.frontier.retain_within(cutoff);
        debug!(
            frame,
            phase,
            active = self.frontier.len(),
            removed,
            best = min_cost,
            cutoff,
            "pruned frontier"
        );
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array};
    use rustfst::prelude::MutableFst;

    use super::*;
    use crate::graph::{StdVectorFst, build};
    use crate::scorer::MatrixScorer;
    use crate::transition::TransitionModel;

    /// Two-state chain with a zero-cost epsilon cycle hanging off the middle state.
    fn epsilon_cycle_graph() -> anyhow::Result<Arc<StdVectorFst>> {
        Ok(Arc::new(build(
            &[
                (0, 1, 1, 5, 0.0),
                (1, 1, 0, 0, 0.0),
                (1, 2, 0, 0, 0.0),
                (2, 1, 0, 0, 0.0),
                (2, 3, 0, 6, 1.0),
            ],
            &[(3, 0.5)],
        )?))
    }

    /// Two epsilon routes from the start into state 1: directly (word 1, cost 1.0) and through
    /// state 3 (word 2, cost `0.5 + via_cost`). State 1 then emits into final state 2.
    fn merging_graph(via_cost: f32) -> anyhow::Result<Arc<StdVectorFst>> {
        Ok(Arc::new(build(
            &[
                (0, 1, 0, 1, 1.0),
                (0, 3, 0, 0, 0.5),
                (3, 1, 0, 2, via_cost),
                (1, 2, 1, 0, 0.0),
            ],
            &[(2, 0.0)],
        )?))
    }

    fn identity_tm(n: u32) -> anyhow::Result<TransitionModel> {
        Ok(TransitionModel::from_pdfs(&(0..n).collect::<Vec<_>>())?)
    }

    fn decode_one_frame(graph: Arc<StdVectorFst>) -> anyhow::Result<BestPath> {
        let tm = identity_tm(1)?;
        let likes = array![[0.0f32]];
        let mut decoder = FasterDecoder::new(graph, DecoderConfig::default())?;
        decoder.decode(&MatrixScorer::new(&tm, likes.view(), 1.0)?)?;
        decoder
            .best_path(false)
            .ok_or_else(|| anyhow::anyhow!("no final state reached"))
    }

    #[test]
    fn zero_frames_is_invalid_input_and_leaves_decoder_ready() -> anyhow::Result<()> {
        let tm = identity_tm(1)?;
        let likes = Array2::<f32>::zeros((0, 1));
        let mut decoder = FasterDecoder::new(epsilon_cycle_graph()?, DecoderConfig::default())?;

        let err = decoder
            .decode(&MatrixScorer::new(&tm, likes.view(), 1.0)?)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref m) if m == "Zero-length utterance"));
        assert_eq!(decoder.state(), DecoderState::Ready);
        assert!(decoder.best_path(true).is_none());
        Ok(())
    }

    #[test]
    fn epsilon_cycles_reach_final_after_last_frame() -> anyhow::Result<()> {
        let tm = identity_tm(1)?;
        let likes = array![[0.0f32]];
        let mut decoder = FasterDecoder::new(epsilon_cycle_graph()?, DecoderConfig::default())?;

        decoder.decode(&MatrixScorer::new(&tm, likes.view(), 1.0)?)?;
        assert_eq!(decoder.state(), DecoderState::Done);
        assert!(decoder.reached_final());

        let path = decoder.best_path(false).expect("final state reached");
        assert_eq!(path.alignment, vec![1]);
        assert_eq!(path.word_ids, vec![5, 6]);
        assert!((path.graph_cost - 1.5).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn equal_cost_epsilon_merge_keeps_the_first_token() -> anyhow::Result<()> {
        let path = decode_one_frame(merging_graph(0.5)?)?;
        assert_eq!(path.word_ids, vec![1]);
        assert!((path.graph_cost - 1.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn cheaper_later_epsilon_path_replaces_the_token() -> anyhow::Result<()> {
        let path = decode_one_frame(merging_graph(0.25)?)?;
        assert_eq!(path.word_ids, vec![2]);
        assert!((path.graph_cost - 0.75).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn emptied_frontier_is_decode_failed() -> anyhow::Result<()> {
        let tm = identity_tm(1)?;
        // Only one emitting arc: the second frame has nowhere to go.
        let likes = array![[0.0f32], [0.0]];
        let mut decoder = FasterDecoder::new(epsilon_cycle_graph()?, DecoderConfig::default())?;

        let err = decoder
            .decode(&MatrixScorer::new(&tm, likes.view(), 1.0)?)
            .unwrap_err();
        assert!(matches!(err, Error::DecodeFailed(_)));
        assert_eq!(decoder.state(), DecoderState::Done);
        assert_eq!(decoder.num_frames_decoded(), 2);
        assert!(decoder.best_path(true).is_none());
        Ok(())
    }

    #[test]
    fn scorer_errors_reset_the_decoder() -> anyhow::Result<()> {
        // The graph's transition id 1 is unknown to an empty transition model.
        let tm = TransitionModel::from_pdfs(&[])?;
        let likes = Array2::<f32>::zeros((1, 0));
        let mut decoder = FasterDecoder::new(epsilon_cycle_graph()?, DecoderConfig::default())?;

        let err = decoder
            .decode(&MatrixScorer::new(&tm, likes.view(), 1.0)?)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTransitionId(1)));
        assert_eq!(decoder.state(), DecoderState::Ready);
        assert_eq!(decoder.num_active(), 0);
        Ok(())
    }

    #[test]
    fn release_frees_search_state() -> anyhow::Result<()> {
        let tm = identity_tm(1)?;
        let likes = array![[0.0f32]];
        let mut decoder = FasterDecoder::new(epsilon_cycle_graph()?, DecoderConfig::default())?;
        decoder.decode(&MatrixScorer::new(&tm, likes.view(), 1.0)?)?;
        assert!(decoder.num_active() > 0);

        decoder.release();
        assert_eq!(decoder.state(), DecoderState::Ready);
        assert_eq!(decoder.num_active(), 0);
        assert_eq!(decoder.arena.len(), 0);
        assert!(decoder.best_path(true).is_none());

        decoder.decode(&MatrixScorer::new(&tm, likes.view(), 1.0)?)?;
        assert!(decoder.reached_final());
        Ok(())
    }

    #[test]
    fn graph_without_start_state_is_an_error() -> anyhow::Result<()> {
        let tm = identity_tm(1)?;
        let likes = array![[0.0f32]];
        let empty = Arc::new(StdVectorFst::new());
        let mut decoder = FasterDecoder::new(empty, DecoderConfig::default())?;
        let scorer = MatrixScorer::new(&tm, likes.view(), 1.0)?;
        assert!(decoder.decode(&scorer).is_err());
        assert_eq!(decoder.state(), DecoderState::Ready);
        Ok(())
    }

    #[test]
    fn rejects_negative_beam() -> anyhow::Result<()> {
        let config = DecoderConfig { beam: -1.0 };
        assert!(FasterDecoder::new(epsilon_cycle_graph()?, config).is_err());
        assert!(DecoderConfig { beam: f32::NAN }.validate().is_err());
        Ok(())
    }
}
