use std::collections::HashMap;

use rustfst::Tr;
use rustfst::semirings::TropicalWeight;

use crate::graph::arc_cost;
use crate::types::{EPSILON, Label, StateId};
use crate::{Error, Result};

/// Index of a token inside a [`TokenArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TokenId(u32);

/// One surviving hypothesis: the best way found so far to reach a graph state.
///
/// Tokens are immutable once allocated. A cheaper path to the same state produces a new token
/// and the frontier slot is re-pointed, so back-pointers always refer to older tokens and the
/// ancestry forms a forest.
#[derive(Debug, Clone)]
pub(crate) struct Token {
    /// Accumulated graph cost along the path (arc weights only).
    pub(crate) graph_cost: f64,
    /// Accumulated scaled acoustic cost along the path.
    pub(crate) acoustic_cost: f64,
    /// Labels of the arc taken from `prev` (epsilon for the initial token).
    pub(crate) ilabel: Label,
    pub(crate) olabel: Label,
    pub(crate) prev: Option<TokenId>,
}

impl Token {
    pub(crate) fn cost(&self) -> f64 {
        self.graph_cost + self.acoustic_cost
    }
}

/// Per-utterance token storage.
///
/// Tokens are never freed individually; the whole arena is cleared when the next utterance
/// starts.
#[derive(Debug, Default)]
pub(crate) struct TokenArena {
    tokens: Vec<Token>,
}

impl TokenArena {
    pub(crate) fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Drop every token and give the storage back.
    pub(crate) fn release(&mut self) {
        self.tokens = Vec::new();
    }

    pub(crate) fn len(&self) -> usize {
        self.tokens.len()
    }

    pub(crate) fn get(&self, id: TokenId) -> &Token {
        &self.tokens[id.0 as usize]
    }

    /// Allocate the root token placed on the start state.
    pub(crate) fn initial(&mut self) -> Result<TokenId> {
        self.push(Token {
            graph_cost: 0.0,
            acoustic_cost: 0.0,
            ilabel: EPSILON,
            olabel: EPSILON,
            prev: None,
        })
    }

    /// Allocate the token reached from `prev` by following `tr` with `acoustic_cost` charged.
    pub(crate) fn extend(
        &mut self,
        prev: TokenId,
        tr: &Tr<TropicalWeight>,
        acoustic_cost: f32,
    ) -> Result<TokenId> {
        let token = self.successor(prev, tr, acoustic_cost);
        self.push(token)
    }

    /// Cost `extend` would give the new token, without allocating it.
    pub(crate) fn extended_cost(
        &self,
        prev: TokenId,
        tr: &Tr<TropicalWeight>,
        acoustic_cost: f32,
    ) -> f64 {
        self.successor(prev, tr, acoustic_cost).cost()
    }

    fn successor(&self, prev: TokenId, tr: &Tr<TropicalWeight>, acoustic_cost: f32) -> Token {
        let from = self.get(prev);
        Token {
            graph_cost: from.graph_cost + f64::from(arc_cost(tr)),
            acoustic_cost: from.acoustic_cost + f64::from(acoustic_cost),
            ilabel: tr.ilabel,
            olabel: tr.olabel,
            prev: Some(prev),
        }
    }

    fn push(&mut self, token: Token) -> Result<TokenId> {
        let id = u32::try_from(self.tokens.len()).map_err(|_| {
            Error::msg(format!(
                "token arena is full ({} tokens); lower the beam",
                self.tokens.len()
            ))
        })?;
        self.tokens.push(token);
        Ok(TokenId(id))
    }
}

/// The set of live tokens for one frame: at most one token per graph state.
///
/// Slots are kept in first-seen order and the state index is only used for lookup, so iteration
/// order (and with it every tie-break) is reproducible.
#[derive(Debug, Default)]
pub(crate) struct Frontier {
    slots: Vec<(StateId, TokenId, f64)>,
    index: HashMap<StateId, usize>,
}

impl Frontier {
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    pub(crate) fn release(&mut self) {
        self.slots = Vec::new();
        self.index = HashMap::new();
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn get(&self, state: StateId) -> Option<(TokenId, f64)> {
        self.index.get(&state).map(|&slot| {
            let (_, token, cost) = self.slots[slot];
            (token, cost)
        })
    }

    /// Would a token of `cost` at `state` replace (or be added beside) what is already there?
    ///
    /// Ties keep the existing token.
    pub(crate) fn improves(&self, state: StateId, cost: f64) -> bool {
        match self.get(state) {
            Some((_, existing)) => cost < existing,
            None => true,
        }
    }

    /// Insert `token` at `state` unless an existing token is at least as cheap.
    ///
    /// Returns whether the frontier changed.
    pub(crate) fn offer(&mut self, state: StateId, token: TokenId, cost: f64) -> bool {
        match self.index.get(&state) {
            Some(&slot) => {
                if cost < self.slots[slot].2 {
                    self.slots[slot] = (state, token, cost);
                    true
                } else {
                    false
                }
            }
            None => {
                self.index.insert(state, self.slots.len());
                self.slots.push((state, token, cost));
                true
            }
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (StateId, TokenId, f64)> + '_ {
        self.slots.iter().copied()
    }

    pub(crate) fn min_cost(&self) -> Option<f64> {
        self.slots
            .iter()
            .map(|&(_, _, cost)| cost)
            .min_by(f64::total_cmp)
    }

    /// Drop every token costing more than `cutoff`, preserving the order of survivors.
    ///
    /// Returns the number of tokens removed.
    pub(crate) fn retain_within(&mut self, cutoff: f64) -> usize {
        let before = self.slots.len();
        self.slots.retain(|&(_, _, cost)| cost <= cutoff);
        let removed = before - self.slots.len();
        if removed > 0 {
            self.index.clear();
            for (slot, &(state, _, _)) in self.slots.iter().enumerate() {
                self.index.insert(state, slot);
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use rustfst::semirings::Semiring;

    use super::*;

    fn tr(ilabel: Label, olabel: Label, cost: f32, nextstate: StateId) -> Tr<TropicalWeight> {
        Tr::new(ilabel, olabel, TropicalWeight::new(cost), nextstate)
    }

    fn arena_with(n: usize) -> anyhow::Result<(TokenArena, Vec<TokenId>)> {
        let mut arena = TokenArena::default();
        let ids = (0..n)
            .map(|_| arena.initial())
            .collect::<Result<Vec<_>>>()?;
        Ok((arena, ids))
    }

    #[test]
    fn extend_accumulates_costs_and_links_back() -> anyhow::Result<()> {
        let mut arena = TokenArena::default();
        let root = arena.initial()?;
        let next = arena.extend(root, &tr(3, 9, 1.5, 4), 2.0)?;
        let token = arena.get(next);
        assert_eq!(token.prev, Some(root));
        assert_eq!((token.ilabel, token.olabel), (3, 9));
        assert_eq!(token.cost(), 3.5);
        assert_eq!(arena.extended_cost(root, &tr(3, 9, 1.5, 4), 2.0), token.cost());
        assert_eq!(arena.len(), 2);
        Ok(())
    }

    #[test]
    fn release_empties_the_arena() -> anyhow::Result<()> {
        let (mut arena, _) = arena_with(4)?;
        arena.release();
        assert_eq!(arena.len(), 0);
        assert_eq!(arena.initial()?, TokenId(0));
        Ok(())
    }

    #[test]
    fn offer_keeps_the_cheaper_token_and_the_first_on_ties() -> anyhow::Result<()> {
        let (_, ids) = arena_with(3)?;
        let mut frontier = Frontier::default();

        assert!(frontier.offer(7, ids[0], 2.0));
        assert!(!frontier.offer(7, ids[1], 2.0));
        assert_eq!(frontier.get(7), Some((ids[0], 2.0)));

        assert!(frontier.offer(7, ids[2], 1.0));
        assert_eq!(frontier.get(7), Some((ids[2], 1.0)));
        assert_eq!(frontier.len(), 1);
        Ok(())
    }

    #[test]
    fn retain_within_prunes_and_reindexes() -> anyhow::Result<()> {
        let (_, ids) = arena_with(3)?;
        let mut frontier = Frontier::default();
        frontier.offer(1, ids[0], 5.0);
        frontier.offer(2, ids[1], 1.0);
        frontier.offer(3, ids[2], 3.0);

        assert_eq!(frontier.min_cost(), Some(1.0));
        assert_eq!(frontier.retain_within(3.0), 1);
        let states: Vec<StateId> = frontier.iter().map(|(s, _, _)| s).collect();
        assert_eq!(states, vec![2, 3]);
        assert_eq!(frontier.get(3), Some((ids[2], 3.0)));
        assert_eq!(frontier.get(1), None);
        Ok(())
    }
}
