use serde::Serialize;

use crate::Result;
use crate::result::DecodeResult;

/// A decoded utterance paired with its id, as written by encoders.
#[derive(Debug, Clone, Serialize)]
pub struct UtteranceResult<'a> {
    pub utterance_id: &'a str,
    #[serde(flatten)]
    pub result: &'a DecodeResult,
}

pub trait ResultEncoder {
    fn write_result(&mut self, utt: &UtteranceResult<'_>) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}
