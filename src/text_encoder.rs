use std::io::Write;

use tracing::warn;

use crate::Result;
use crate::result_encoder::{ResultEncoder, UtteranceResult};

/// A `ResultEncoder` that writes one Kaldi-style transcript line per utterance:
///
/// ```text
/// utt1 hello world
/// utt2 good morning
/// ```
///
/// Design:
/// - Words are written as strings when a symbol table resolved them, otherwise as word ids.
/// - Failed utterances produce no line; they are reported through `tracing` instead so the
///   transcript stays machine-readable.
pub struct TextEncoder<W: Write> {
    /// The underlying writer we stream transcripts into.
    w: W,

    /// Whether the encoder has been closed.
    closed: bool,
}

impl<W: Write> TextEncoder<W> {
    pub fn new(w: W) -> Self {
        Self { w, closed: false }
    }
}

impl<W: Write> ResultEncoder for TextEncoder<W> {
    fn write_result(&mut self, utt: &UtteranceResult<'_>) -> Result<()> {
        if self.closed {
            return Err(crate::Error::msg(
                "cannot write result: encoder is already closed",
            ));
        }

        let result = utt.result;
        if result.failed {
            warn!(
                utterance = utt.utterance_id,
                error = result.error.as_deref().unwrap_or_default(),
                "skipping failed utterance"
            );
            return Ok(());
        }

        write!(&mut self.w, "{}", utt.utterance_id)?;
        if result.words.is_empty() {
            for id in &result.word_ids {
                write!(&mut self.w, " {id}")?;
            }
        } else {
            for word in &result.words {
                write!(&mut self.w, " {word}")?;
            }
        }
        writeln!(&mut self.w)?;

        // Flush so streaming consumers (stdout, pipes) see output promptly.
        self.w.flush()?;
        Ok(())
    }

    /// Flush the underlying writer. This is idempotent.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.w.flush()?;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::DecodeResult;

    fn write_all(results: &[(&str, DecodeResult)]) -> anyhow::Result<String> {
        let mut out = Vec::new();
        let mut enc = TextEncoder::new(&mut out);
        for (id, result) in results {
            enc.write_result(&UtteranceResult {
                utterance_id: id,
                result,
            })?;
        }
        enc.close()?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn writes_words_or_falls_back_to_ids() -> anyhow::Result<()> {
        let with_words = DecodeResult {
            word_ids: vec![3, 4],
            words: vec!["good".to_owned(), "morning".to_owned()],
            ..DecodeResult::default()
        };
        let ids_only = DecodeResult {
            word_ids: vec![7, 9],
            ..DecodeResult::default()
        };
        let text = write_all(&[("a", with_words), ("b", ids_only)])?;
        assert_eq!(text, "a good morning\nb 7 9\n");
        Ok(())
    }

    #[test]
    fn failed_utterances_are_skipped() -> anyhow::Result<()> {
        let text = write_all(&[
            ("bad", DecodeResult::failure("Could not decode")),
            ("empty", DecodeResult::default()),
        ])?;
        assert_eq!(text, "empty\n");
        Ok(())
    }

    #[test]
    fn write_after_close_errors() {
        let mut out = Vec::new();
        let mut enc = TextEncoder::new(&mut out);
        enc.close().unwrap();
        let result = DecodeResult::default();
        assert!(
            enc.write_result(&UtteranceResult {
                utterance_id: "late",
                result: &result,
            })
            .is_err()
        );
    }
}
