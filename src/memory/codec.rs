//! On-disk record format for one word vector.
//!
//! ```text
//! count: u64 | frequency: i32 | context_size: i32 | magnitude: f32 | payload
//! ```
//!
//! All fields are little-endian. With `count > 0` the payload is `count`
//! indices followed by `count` values; with `count == 0` it is either empty
//! (the zero vector) or all D values. A vector is written sparse iff its
//! nonzero count is below `D / 2`.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{sparse_threshold, RECORD_HEADER_BYTES};
use crate::core::vector::DenseVector;
use crate::error::{Result, RivError};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
struct RecordHeader {
    count: u64,
    frequency: i32,
    context_size: i32,
    magnitude: f32,
}

/// Payload layout chosen for a vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Index/value pairs for this many nonzeros.
    Sparse(usize),
    Dense,
}

/// Layout `vector` will be written with.
pub fn layout_for(vector: &DenseVector) -> Layout {
    let count = vector.nonzero_count();
    if count < sparse_threshold(vector.dimensions()) {
        Layout::Sparse(count)
    } else {
        Layout::Dense
    }
}

/// Serialise `vector` into one contiguous record.
pub fn encode(vector: &DenseVector) -> Result<Vec<u8>> {
    let layout = layout_for(vector);
    let count = match layout {
        Layout::Sparse(n) => n,
        Layout::Dense => 0,
    };
    let header = RecordHeader {
        count: count as u64,
        frequency: vector.frequency,
        context_size: vector.context_size,
        magnitude: vector.magnitude,
    };

    let mut bytes = bincode::serialize(&header)?;
    match layout {
        Layout::Sparse(n) => {
            bytes.reserve(8 * n);
            let sparse = vector.consolidate();
            for &i in sparse.locations() {
                bytes.extend_from_slice(&i.to_le_bytes());
            }
            for &v in sparse.values() {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }
        Layout::Dense => {
            bytes.reserve(4 * vector.dimensions());
            for &v in vector.values.iter() {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    Ok(bytes)
}

fn read_i32s(bytes: &[u8]) -> impl Iterator<Item = i32> + '_ {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
}

/// Parse a record for `word` read from `path` in a D-dimensional space.
pub fn decode(word: &str, path: &Path, bytes: &[u8], dimensions: usize) -> Result<DenseVector> {
    let corrupt = |reason: String| RivError::CorruptRecord {
        word: word.to_string(),
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < RECORD_HEADER_BYTES {
        return Err(corrupt(format!(
            "{} bytes is shorter than the {}-byte header",
            bytes.len(),
            RECORD_HEADER_BYTES
        )));
    }
    let (head, payload) = bytes.split_at(RECORD_HEADER_BYTES);
    let header: RecordHeader =
        bincode::deserialize(head).map_err(|e| corrupt(format!("bad header: {e}")))?;

    let mut vector = DenseVector::zeros(word, dimensions);
    vector.frequency = header.frequency;
    vector.context_size = header.context_size;
    vector.magnitude = header.magnitude;

    let count = usize::try_from(header.count)
        .map_err(|_| corrupt(format!("count {} does not fit in memory", header.count)))?;

    if count == 0 {
        if payload.is_empty() {
            return Ok(vector);
        }
        if payload.len() != 4 * dimensions {
            return Err(corrupt(format!(
                "dense payload is {} bytes, expected {}",
                payload.len(),
                4 * dimensions
            )));
        }
        for (slot, v) in vector.values.iter_mut().zip(read_i32s(payload)) {
            *slot = v;
        }
        return Ok(vector);
    }

    let expected = count.checked_mul(8).unwrap_or(usize::MAX);
    if payload.len() != expected {
        return Err(corrupt(format!(
            "sparse payload is {} bytes, expected {} for {} entries",
            payload.len(),
            expected,
            count
        )));
    }
    let (locations, values) = payload.split_at(4 * count);
    for (i, v) in read_i32s(locations).zip(read_i32s(values)) {
        if i < 0 || i as usize >= dimensions {
            return Err(corrupt(format!(
                "index {i} outside 0..{dimensions}"
            )));
        }
        vector.values[i as usize] += v;
    }
    Ok(vector)
}

/// Write `vector` to `path` in one call, replacing any previous record.
pub fn write_record(path: &Path, vector: &DenseVector) -> Result<()> {
    let bytes = encode(vector)?;
    fs::write(path, &bytes).map_err(|e| RivError::io(path, e))?;
    debug!(word = %vector.name, path = %path.display(), bytes = bytes.len(), "wrote record");
    Ok(())
}

/// Read the record for `word` at `path`; `Ok(None)` if no file exists.
pub fn read_record(path: &Path, word: &str, dimensions: usize) -> Result<Option<DenseVector>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RivError::io(path, e)),
    };
    decode(word, path, &bytes, dimensions).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn vector_with_nonzeros(d: usize, n: usize) -> DenseVector {
        let mut v = DenseVector::zeros("word", d);
        for i in 0..n {
            v.values[(i * 7) % d] = if i % 2 == 0 { i as i32 + 1 } else { -(i as i32) - 1 };
        }
        v.frequency = 12;
        v.context_size = 40;
        v.refresh_magnitude();
        v
    }

    fn here() -> PathBuf {
        PathBuf::from("lexicon/word")
    }

    #[test]
    fn test_sparse_record_restores_vector() {
        let v = vector_with_nonzeros(100, 10);
        let bytes = encode(&v).unwrap();
        assert_eq!(bytes.len(), RECORD_HEADER_BYTES + 8 * 10);
        let back = decode("word", &here(), &bytes, 100).unwrap();
        assert_eq!(back.values, v.values);
        assert_eq!(back.frequency, 12);
        assert_eq!(back.context_size, 40);
        assert_eq!(back.magnitude, v.magnitude);
        assert_eq!(back.name, "word");
    }

    #[test]
    fn test_dense_record_restores_vector() {
        let v = vector_with_nonzeros(20, 20);
        let bytes = encode(&v).unwrap();
        assert_eq!(bytes.len(), RECORD_HEADER_BYTES + 4 * 20);
        let back = decode("word", &here(), &bytes, 20).unwrap();
        assert_eq!(back.values, v.values);
        assert_eq!(back.magnitude, v.magnitude);
    }

    #[test]
    fn test_layout_threshold() {
        // D = 100 with 7-stride indices covers 100 distinct slots.
        let below = vector_with_nonzeros(100, 49);
        let at = vector_with_nonzeros(100, 50);
        assert_eq!(layout_for(&below), Layout::Sparse(49));
        assert_eq!(layout_for(&at), Layout::Dense);
        assert_eq!(encode(&below).unwrap().len(), RECORD_HEADER_BYTES + 8 * 49);
        assert_eq!(encode(&at).unwrap().len(), RECORD_HEADER_BYTES + 4 * 100);
        assert_eq!(decode("word", &here(), &encode(&at).unwrap(), 100).unwrap().values, at.values);
    }

    #[test]
    fn test_zero_vector_record() {
        let v = DenseVector::zeros("word", 50);
        let bytes = encode(&v).unwrap();
        assert_eq!(bytes.len(), RECORD_HEADER_BYTES);
        let back = decode("word", &here(), &bytes, 50).unwrap();
        assert!(back.is_zero());
    }

    #[test]
    fn test_header_is_little_endian() {
        let mut v = vector_with_nonzeros(100, 3);
        v.frequency = 0x0102_0304;
        let bytes = encode(&v).unwrap();
        assert_eq!(&bytes[..8], &3u64.to_le_bytes());
        assert_eq!(&bytes[8..12], &0x0102_0304i32.to_le_bytes());
    }

    #[test]
    fn test_truncated_record_is_corrupt() {
        let v = vector_with_nonzeros(100, 10);
        let bytes = encode(&v).unwrap();
        for cut in [0, 5, RECORD_HEADER_BYTES + 3, bytes.len() - 1] {
            let err = decode("word", &here(), &bytes[..cut], 100).unwrap_err();
            match err {
                RivError::CorruptRecord { word, path, .. } => {
                    assert_eq!(word, "word");
                    assert_eq!(path, here());
                }
                other => panic!("expected CorruptRecord, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_index_out_of_range_is_corrupt() {
        let v = vector_with_nonzeros(100, 10);
        let bytes = encode(&v).unwrap();
        assert!(matches!(
            decode("word", &here(), &bytes, 10),
            Err(RivError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_dense_length_mismatch_is_corrupt() {
        let v = vector_with_nonzeros(20, 20);
        let bytes = encode(&v).unwrap();
        assert!(matches!(
            decode("word", &here(), &bytes, 21),
            Err(RivError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("word");
        assert!(read_record(&path, "word", 100).unwrap().is_none());

        let v = vector_with_nonzeros(100, 30);
        write_record(&path, &v).unwrap();
        let back = read_record(&path, "word", 100).unwrap().unwrap();
        assert_eq!(back.values, v.values);
    }
}
