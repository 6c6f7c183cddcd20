#![allow(dead_code)]

use std::sync::Arc;

use fastdec::{Recognizer, StdVectorFst, SymbolTable, TransitionModel};
use rustfst::Tr;
use rustfst::prelude::*;

/// Build a graph from `(src, dst, ilabel, olabel)` zero-cost arcs; state 0 starts and `last`
/// is final.
fn chain(arcs: &[(u32, u32, u32, u32)], last: u32) -> anyhow::Result<StdVectorFst> {
    let mut fst = StdVectorFst::new();
    for _ in 0..=last {
        fst.add_state();
    }
    fst.set_start(0)?;
    for &(src, dst, ilabel, olabel) in arcs {
        fst.add_tr(src, Tr::new(ilabel, olabel, TropicalWeight::one(), dst))?;
    }
    fst.set_final(last, TropicalWeight::one())?;
    Ok(fst)
}

/// `0 -A:hello-> 1 -B:<eps>-> 2`, state 2 final. Transition id 1 (A) scores pdf 0, id 2 (B) pdf 1.
pub fn two_arc_graph() -> anyhow::Result<StdVectorFst> {
    chain(&[(0, 1, 1, 1), (1, 2, 2, 0)], 2)
}

/// Two competing words. `left` (word 1) uses transition ids 1 then 3, `right` (word 2) uses
/// 2 then 4; both end in final state 3. Transition id `i` scores pdf `i - 1`.
pub fn fork_graph() -> anyhow::Result<StdVectorFst> {
    chain(&[(0, 1, 1, 1), (0, 2, 2, 2), (1, 3, 3, 0), (2, 3, 4, 0)], 3)
}

pub fn words() -> SymbolTable {
    let mut syms = SymbolTable::new();
    syms.add_symbol("hello");
    syms.add_symbol("world");
    syms
}

pub fn recognizer(
    graph: StdVectorFst,
    pdfs: &[u32],
    syms: Option<SymbolTable>,
) -> anyhow::Result<Recognizer> {
    Ok(Recognizer::new(
        Arc::new(graph),
        Arc::new(TransitionModel::from_pdfs(pdfs)?),
        None,
        syms.map(Arc::new),
    )?)
}
