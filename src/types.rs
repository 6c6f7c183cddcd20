//! Identifier types shared across the graph, models and decoder.

/// Index of a state in a decoding graph.
pub type StateId = u32;

/// Arc label. Input labels are transition ids, output labels are word ids.
pub type Label = u32;

/// Scoring unit on the input side of a graph arc ("transition id").
pub type TransitionId = Label;

/// Word identifier on the output side of a graph arc.
pub type WordId = Label;

/// Physical acoustic-state identifier a transition id resolves to.
pub type PdfId = u32;

/// The epsilon label: no scoring unit on the input side, no word on the output side.
pub const EPSILON: Label = 0;
