use serde::{Deserialize, Serialize};

use crate::types::{PdfId, TransitionId, WordId};

/// Error message reported for a zero-frame utterance.
pub const ZERO_LENGTH_UTTERANCE: &str = "Zero-length utterance";

/// Error message reported when no admissible path survives.
pub const COULD_NOT_DECODE: &str = "Could not decode";

/// Placeholder for word ids the symbol table does not know.
pub const UNKNOWN_WORD: &str = "!!ERR!!";

/// Outcome of decoding one utterance.
///
/// A soft failure (no usable path) is still a `DecodeResult`, with `failed = true` and an
/// `error` message; the sequences are then empty and `score` is 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodeResult {
    pub failed: bool,
    /// The best path did not end in a final state (only possible with `allow_partial`).
    pub partial: bool,
    /// Transition ids along the best path, one per frame.
    pub alignment: Vec<TransitionId>,
    pub word_ids: Vec<WordId>,
    /// Display strings for `word_ids`; empty when no symbol table is configured.
    pub words: Vec<String>,
    /// Pdf ids for `alignment`.
    pub pdf_ids: Vec<PdfId>,
    /// Negated total path cost (graph + scaled acoustic), i.e. a log-likelihood.
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DecodeResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            failed: true,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// The words joined with single spaces.
    pub fn transcript(&self) -> String {
        self.words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_carries_message_and_no_output() {
        let result = DecodeResult::failure(ZERO_LENGTH_UTTERANCE);
        assert!(result.failed);
        assert!(!result.partial);
        assert!(result.alignment.is_empty());
        assert_eq!(result.error.as_deref(), Some("Zero-length utterance"));
    }

    #[test]
    fn error_is_omitted_from_json_on_success() -> anyhow::Result<()> {
        let result = DecodeResult {
            word_ids: vec![1],
            words: vec!["hi".to_owned()],
            ..DecodeResult::default()
        };
        let json = serde_json::to_value(&result)?;
        assert!(json.get("error").is_none());
        assert_eq!(json["words"][0], "hi");
        Ok(())
    }
}
