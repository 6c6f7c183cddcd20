//! Best-path extraction: turns the winning token's ancestry back into label sequences.

use crate::decoder::token::{TokenArena, TokenId};
use crate::types::{EPSILON, TransitionId, WordId};

/// The winning hypothesis of a finished decode, in time order.
#[derive(Debug, Clone, PartialEq)]
pub struct BestPath {
    /// Non-epsilon input labels (transition ids), one per consumed frame.
    pub alignment: Vec<TransitionId>,
    /// Non-epsilon output labels (word ids).
    pub word_ids: Vec<WordId>,
    /// Sum of arc weights along the path, plus the final cost when a final state was reached.
    pub graph_cost: f64,
    /// Sum of scaled acoustic costs along the path.
    pub acoustic_cost: f64,
    /// Whether the path ends in a final state.
    pub reached_final: bool,
}

impl BestPath {
    pub fn total_cost(&self) -> f64 {
        self.graph_cost + self.acoustic_cost
    }

    /// The path score exposed as a log-likelihood: `-(graph_cost + acoustic_cost)`.
    pub fn log_likelihood(&self) -> f64 {
        -self.total_cost()
    }
}

/// Walk back-pointers from `best` to the root token and return the path in time order.
pub(crate) fn trace_back(
    arena: &TokenArena,
    best: TokenId,
    final_cost: f64,
    reached_final: bool,
) -> BestPath {
    let last = arena.get(best);
    let mut alignment = Vec::new();
    let mut word_ids = Vec::new();

    let mut cursor = Some(best);
    while let Some(id) = cursor {
        let token = arena.get(id);
        if token.ilabel != EPSILON {
            alignment.push(token.ilabel);
        }
        if token.olabel != EPSILON {
            word_ids.push(token.olabel);
        }
        cursor = token.prev;
    }
    alignment.reverse();
    word_ids.reverse();

    BestPath {
        alignment,
        word_ids,
        graph_cost: last.graph_cost + final_cost,
        acoustic_cost: last.acoustic_cost,
        reached_final,
    }
}

#[cfg(test)]
mod tests {
    use rustfst::Tr;
    use rustfst::semirings::{Semiring, TropicalWeight};

    use super::*;

    fn tr(ilabel: u32, olabel: u32, cost: f32, next: u32) -> Tr<TropicalWeight> {
        Tr::new(ilabel, olabel, TropicalWeight::new(cost), next)
    }

    #[test]
    fn trace_back_reverses_and_drops_epsilons() -> anyhow::Result<()> {
        let mut arena = TokenArena::default();
        let root = arena.initial()?;
        let a = arena.extend(root, &tr(4, 0, 1.0, 1), 2.0)?;
        let b = arena.extend(a, &tr(0, 7, 0.5, 2), 0.0)?;
        let c = arena.extend(b, &tr(9, 8, 0.0, 3), 3.0)?;
        // A dead branch off `a` must not leak into the path.
        let _ = arena.extend(a, &tr(5, 6, 0.0, 4), 0.1)?;

        let path = trace_back(&arena, c, 0.25, true);
        assert_eq!(path.alignment, vec![4, 9]);
        assert_eq!(path.word_ids, vec![7, 8]);
        assert_eq!(path.graph_cost, 1.75);
        assert_eq!(path.acoustic_cost, 5.0);
        assert_eq!(path.log_likelihood(), -6.75);
        assert!(path.reached_final);
        Ok(())
    }

    #[test]
    fn root_only_path_is_empty() -> anyhow::Result<()> {
        let mut arena = TokenArena::default();
        let root = arena.initial()?;
        let path = trace_back(&arena, root, 0.0, false);
        assert!(path.alignment.is_empty());
        assert!(path.word_ids.is_empty());
        assert_eq!(path.total_cost(), 0.0);
        Ok(())
    }
}
