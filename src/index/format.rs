//! Binary layout shared by the serialized index and the persisted embedding array.
//!
//! ```text
//! offset  size            field
//! 0       8               magic (file kind)
//! 8       4               dimension, u32 little-endian
//! 12      8               row count, u64 little-endian
//! 20      4*dim*count     row-major f32 little-endian matrix
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::{RagError, Result};

pub const INDEX_MAGIC: &[u8; 8] = b"PRAGIDX1";
pub const EMBEDDINGS_MAGIC: &[u8; 8] = b"PRAGEMB1";

const HEADER_LEN: usize = 8 + 4 + 8;

/// A decoded matrix: `rows.len() == dimension * count`
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub dimension: usize,
    pub count: usize,
    pub rows: Vec<f32>,
}

#[inline]
pub fn encode(magic: &[u8; 8], dimension: usize, rows: &[f32]) -> Result<Vec<u8>> {
    if dimension == 0 || rows.len() % dimension != 0 {
        return Err(RagError::Dimension {
            expected: dimension,
            actual: rows.len(),
        });
    }
    let dim = u32::try_from(dimension)
        .map_err(|_| RagError::CorruptIndex(format!("dimension {} does not fit u32", dimension)))?;
    let count = (rows.len() / dimension) as u64;

    let mut bytes = Vec::with_capacity(HEADER_LEN + std::mem::size_of_val(rows));
    bytes.extend_from_slice(magic);
    bytes.extend_from_slice(&dim.to_le_bytes());
    bytes.extend_from_slice(&count.to_le_bytes());
    for value in rows {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    Ok(bytes)
}

#[inline]
pub fn decode(magic: &[u8; 8], bytes: &[u8]) -> Result<Matrix> {
    let header = bytes
        .get(..HEADER_LEN)
        .ok_or_else(|| RagError::CorruptIndex(format!("file too short: {} bytes", bytes.len())))?;

    let (found_magic, rest) = header.split_at(8);
    if found_magic != magic {
        return Err(RagError::CorruptIndex(format!(
            "unexpected magic {:?}",
            String::from_utf8_lossy(found_magic)
        )));
    }

    let (dim_bytes, count_bytes) = rest.split_at(4);
    let dimension = u32::from_le_bytes(
        dim_bytes
            .try_into()
            .map_err(|_| RagError::CorruptIndex("malformed dimension".to_string()))?,
    ) as usize;
    let count = u64::from_le_bytes(
        count_bytes
            .try_into()
            .map_err(|_| RagError::CorruptIndex("malformed row count".to_string()))?,
    );
    if dimension == 0 {
        return Err(RagError::CorruptIndex("zero dimension".to_string()));
    }

    let body = &bytes[HEADER_LEN..];
    let expected_len = usize::try_from(count)
        .ok()
        .and_then(|c| c.checked_mul(dimension))
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| RagError::CorruptIndex(format!("row count {} overflows", count)))?;
    if body.len() != expected_len {
        return Err(RagError::CorruptIndex(format!(
            "body is {} bytes, header promises {} ({} x {} f32)",
            body.len(),
            expected_len,
            count,
            dimension
        )));
    }

    let mut rows = Vec::with_capacity(body.len() / 4);
    for chunk in body.chunks_exact(4) {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if !value.is_finite() {
            return Err(RagError::CorruptIndex(
                "matrix contains non-finite values".to_string(),
            ));
        }
        rows.push(value);
    }

    Ok(Matrix {
        dimension,
        count: rows.len() / dimension,
        rows,
    })
}

/// Write `bytes` to `path` through a temporary sibling and a rename
#[inline]
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = temp_path(path);
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// The temporary sibling used while `path` is being written
#[inline]
pub fn temp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
