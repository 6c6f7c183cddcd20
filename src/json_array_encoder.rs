use std::io::Write;

use crate::Result;
use crate::result_encoder::{ResultEncoder, UtteranceResult};

/// Streams decode results as one JSON array, one element per utterance.
///
/// Each result is written and flushed as soon as its utterance is decoded, so an archive of any
/// size is never held in memory. `[` is emitted lazily; closing an encoder that saw no
/// utterances still yields `[]`.
///
/// ```json
/// [
///   { "utterance_id": "utt1", "failed": false, "words": ["hello"], ... },
///   { "utterance_id": "utt2", "failed": true, "error": "Could not decode", ... }
/// ]
/// ```
pub struct JsonArrayEncoder<W: Write> {
    w: W,
    opened: bool,
    needs_comma: bool,
    closed: bool,
}

impl<W: Write> JsonArrayEncoder<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            opened: false,
            needs_comma: false,
            closed: false,
        }
    }

    fn open_array(&mut self) -> Result<()> {
        if !self.opened {
            self.w.write_all(b"[")?;
            self.opened = true;
        }
        Ok(())
    }
}

impl<W: Write> ResultEncoder for JsonArrayEncoder<W> {
    fn write_result(&mut self, utt: &UtteranceResult<'_>) -> Result<()> {
        if self.closed {
            return Err(crate::Error::msg(format!(
                "cannot write utterance '{}': result stream is already closed",
                utt.utterance_id
            )));
        }
        self.open_array()?;
        if self.needs_comma {
            self.w.write_all(b",")?;
        }
        self.needs_comma = true;

        serde_json::to_writer(&mut self.w, utt)?;
        self.w.flush()?;
        Ok(())
    }

    /// Terminate the array. Repeated calls are no-ops.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.open_array()?;
        self.w.write_all(b"]")?;
        self.w.flush()?;
        self.closed = true;
        Ok(())
    }
}
