#[cfg(feature = "cli")]
use clap::ValueEnum;

/// The supported output formats for decode results.
///
/// Each variant maps to a concrete `ResultEncoder` implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
pub enum OutputType {
    /// Output full results as a JSON array.
    Json,

    /// Output one `utterance-id word word ...` transcript line per utterance.
    Text,
}
