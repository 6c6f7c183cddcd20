//! Decoding graph access.
//!
//! Graphs are OpenFst vector FSTs over the tropical semiring, read with `rustfst` from either
//! the binary `VectorFst` format Kaldi writes (`HCLG.fst`) or the AT&T text form `fstprint`
//! produces. Input labels are transition ids, output labels are word ids, and weights are costs.

use std::path::Path;

use rustfst::prelude::*;
use rustfst::{Tr, Trs, TrsVec};
use tracing::debug;

use crate::types::{EPSILON, Label, StateId};
use crate::{Error, Result};

/// The concrete graph type loaded from disk.
pub type StdVectorFst = VectorFst<TropicalWeight>;

/// Read-only view of a decoding graph, as the decoder consumes it.
pub trait Graph: Send + Sync {
    /// The state every utterance starts from. `None` for an empty graph.
    fn initial_state(&self) -> Option<StateId>;

    /// Outgoing arcs of `state`, in insertion order.
    fn arcs(&self, state: StateId) -> Result<TrsVec<TropicalWeight>>;

    /// Final cost of `state`, or `None` when it is not final.
    fn final_cost(&self, state: StateId) -> Option<f32>;
}

impl Graph for StdVectorFst {
    fn initial_state(&self) -> Option<StateId> {
        self.start()
    }

    fn arcs(&self, state: StateId) -> Result<TrsVec<TropicalWeight>> {
        Ok(self.get_trs(state)?)
    }

    fn final_cost(&self, state: StateId) -> Option<f32> {
        self.final_weight(state)
            .ok()
            .flatten()
            .map(|w| *w.value())
            .filter(|cost| cost.is_finite())
    }
}

/// Whether an arc consumes a frame.
pub fn is_emitting(tr: &Tr<TropicalWeight>) -> bool {
    tr.ilabel != EPSILON
}

/// Cost carried by an arc.
pub fn arc_cost(tr: &Tr<TropicalWeight>) -> f32 {
    *tr.weight.value()
}

/// Load a decoding graph, trying the binary OpenFst format first and AT&T text second.
///
/// The graph is validated with [`check_graph`].
pub fn read_graph(path: impl AsRef<Path>) -> Result<StdVectorFst> {
    let path = path.as_ref();
    let fst = match StdVectorFst::read(path) {
        Ok(fst) => fst,
        Err(binary_err) => StdVectorFst::read_text(path).map_err(|text_err| {
            Error::msg(format!(
                "failed to read decoding graph '{}': not a binary FST ({binary_err}) and not AT&T text ({text_err})",
                path.display()
            ))
        })?,
    };
    check_graph(&fst)?;
    debug!(
        graph = %path.display(),
        states = fst.num_states(),
        arcs = count_arcs(&fst),
        "loaded decoding graph"
    );
    Ok(fst)
}

/// Parse a graph from AT&T text (`src dst ilabel olabel [weight]` / `state [weight]` lines;
/// the first line's source is the start state).
pub fn parse_text_graph(text: &str) -> Result<StdVectorFst> {
    let fst = StdVectorFst::from_text_string(text)?;
    check_graph(&fst)?;
    Ok(fst)
}

/// Reject graphs the search cannot run on: no start state, or an arc or final cost that is not
/// a finite non-negative number.
pub fn check_graph(fst: &StdVectorFst) -> Result<()> {
    if fst.start().is_none() {
        return Err(Error::msg("decoding graph has no start state"));
    }
    for state in 0..fst.num_states() as StateId {
        for tr in fst.get_trs(state)?.trs() {
            check_cost(arc_cost(tr)).map_err(|msg| {
                Error::msg(format!(
                    "arc {state} -> {} ({}:{}): {msg}",
                    tr.nextstate, tr.ilabel, tr.olabel
                ))
            })?;
        }
        if let Some(weight) = fst.final_weight(state)? {
            check_cost(*weight.value())
                .map_err(|msg| Error::msg(format!("final state {state}: {msg}")))?;
        }
    }
    Ok(())
}

fn check_cost(cost: f32) -> std::result::Result<(), String> {
    if cost.is_finite() && cost >= 0.0 {
        Ok(())
    } else {
        Err(format!("cost must be finite and non-negative, got {cost}"))
    }
}

fn count_arcs(fst: &StdVectorFst) -> usize {
    (0..fst.num_states() as StateId)
        .filter_map(|state| fst.num_trs(state).ok())
        .sum()
}

/// Output labels appearing anywhere in the graph.
pub fn output_labels(fst: &StdVectorFst) -> Result<Vec<Label>> {
    let mut labels = Vec::new();
    for state in 0..fst.num_states() as StateId {
        labels.extend(fst.get_trs(state)?.trs().iter().map(|tr| tr.olabel));
    }
    labels.sort_unstable();
    labels.dedup();
    Ok(labels)
}

/// Build a graph from `(src, dst, ilabel, olabel, cost)` arcs and `(state, cost)` finals.
/// State 0 is the start state.
#[cfg(test)]
pub(crate) fn build(
    arcs: &[(StateId, StateId, Label, Label, f32)],
    finals: &[(StateId, f32)],
) -> anyhow::Result<StdVectorFst> {
    let mut fst = StdVectorFst::new();
    let max_state = arcs
        .iter()
        .flat_map(|&(src, dst, ..)| [src, dst])
        .chain(finals.iter().map(|&(state, _)| state))
        .max()
        .unwrap_or(0);
    for _ in 0..=max_state {
        fst.add_state();
    }
    fst.set_start(0)?;
    for &(src, dst, ilabel, olabel, cost) in arcs {
        fst.add_tr(src, Tr::new(ilabel, olabel, TropicalWeight::new(cost), dst))?;
    }
    for &(state, cost) in finals {
        fst.set_final(state, TropicalWeight::new(cost))?;
    }
    Ok(fst)
}
