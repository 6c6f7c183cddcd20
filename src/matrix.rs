//! Conversions between nested row vectors and `ndarray` matrices, and JSON matrix archives.
//!
//! An archive is a JSON object mapping utterance ids to row-major matrices:
//!
//! ```json
//! { "utt1": [[-1.0, -2.5], [-0.3, -4.0]], "utt2": [[-2.0, -1.0]] }
//! ```
//!
//! Utterances are returned in key order so batch runs are reproducible.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::{Array2, ArrayView2, Axis};

use crate::{Error, Result};

/// Utterance id → matrix, in key order.
pub type Archive = BTreeMap<String, Array2<f32>>;

/// Build a `rows × cols` matrix from nested rows. Ragged input is rejected.
///
/// An empty input becomes a `0 × 0` matrix (a zero-frame utterance).
pub fn from_rows(rows: &[Vec<f32>]) -> Result<Array2<f32>> {
    let ncols = rows.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(rows.len() * ncols);
    for (row_idx, row) in rows.iter().enumerate() {
        if row.len() != ncols {
            return Err(Error::MalformedMatrix {
                row: row_idx,
                expected: ncols,
                got: row.len(),
            });
        }
        flat.extend_from_slice(row);
    }
    Array2::from_shape_vec((rows.len(), ncols), flat).map_err(|err| Error::Other(Box::new(err)))
}

pub fn to_rows(matrix: ArrayView2<f32>) -> Vec<Vec<f32>> {
    matrix.axis_iter(Axis(0)).map(|row| row.to_vec()).collect()
}

pub fn read_archive<R: Read>(reader: R) -> Result<Archive> {
    let raw: BTreeMap<String, Vec<Vec<f32>>> = serde_json::from_reader(reader)?;
    raw.into_iter()
        .map(|(key, rows)| {
            let matrix = from_rows(&rows).map_err(|err| {
                Error::msg(format!("utterance '{key}': {err}"))
            })?;
            Ok((key, matrix))
        })
        .collect()
}

pub fn open_archive(path: impl AsRef<Path>) -> Result<Archive> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| {
        Error::msg(format!("failed to open archive '{}': {err}", path.display()))
    })?;
    read_archive(BufReader::new(file))
}

pub fn write_archive<W: Write>(writer: W, archive: &Archive) -> Result<()> {
    let raw: BTreeMap<&str, Vec<Vec<f32>>> = archive
        .iter()
        .map(|(key, matrix)| (key.as_str(), to_rows(matrix.view())))
        .collect();
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer(&mut writer, &raw)?;
    writer.flush()?;
    Ok(())
}

/// Number of frames (rows) per utterance.
pub fn frame_counts(archive: &Archive) -> BTreeMap<&str, usize> {
    archive
        .iter()
        .map(|(key, matrix)| (key.as_str(), matrix.nrows()))
        .collect()
}
