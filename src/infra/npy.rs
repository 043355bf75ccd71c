// ============================================================
// Layer 6 — NumPy .npy Matrix Files
// ============================================================
// Embedding matrices are written as NumPy v1.0 arrays so an
// external trainer can `np.load` them directly.
//
// File layout:
//
//   \x93NUMPY            magic (6 bytes)
//   \x01 \x00            version 1.0
//   u16 little-endian    header length
//   {'descr': '<f4', 'fortran_order': False, 'shape': (R, C), }
//   spaces … \n          pad so the data starts on a 64-byte boundary
//   R × C little-endian f32 values, row-major
//
// Only 2-D little-endian f32 C-order arrays are supported,
// which is all this crate produces.
//
// Reference: numpy.lib.format (NEP 1)

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::Array2;

use crate::domain::error::{PipelineError, PipelineResult};

const MAGIC: &[u8] = b"\x93NUMPY";
const ALIGN: usize = 64;

/// Write a 2-D f32 matrix.
pub fn write_f32(path: impl AsRef<Path>, matrix: &Array2<f32>) -> PipelineResult<()> {
    let path         = path.as_ref();
    let (rows, cols) = matrix.dim();

    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({rows}, {cols}), }}"
    );
    // magic + version + u16 length + header + '\n' must be a multiple of ALIGN
    let prefix = MAGIC.len() + 2 + 2;
    let unpadded = prefix + header.len() + 1;
    let padding  = (ALIGN - unpadded % ALIGN) % ALIGN;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let header_len = u16::try_from(header.len())
        .map_err(|_| PipelineError::config(format!("npy header too long for '{}'", path.display())))?;

    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(MAGIC)?;
    out.write_all(&[1, 0])?;
    out.write_all(&header_len.to_le_bytes())?;
    out.write_all(header.as_bytes())?;
    for value in matrix.iter() {
        out.write_all(&value.to_le_bytes())?;
    }
    out.flush()?;

    tracing::debug!("Wrote {}x{} matrix to '{}'", rows, cols, path.display());
    Ok(())
}

/// Read a matrix written by `write_f32`.
pub fn read_f32(path: impl AsRef<Path>) -> PipelineResult<Array2<f32>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PipelineError::missing("embedding matrix", path));
    }
    let mut input = BufReader::new(File::open(path)?);

    let mut preamble = [0u8; 10];
    input.read_exact(&mut preamble)?;
    if &preamble[..6] != MAGIC || preamble[6] != 1 {
        return Err(PipelineError::format(path, 1, "not a version 1.0 .npy file"));
    }
    let header_len = u16::from_le_bytes([preamble[8], preamble[9]]) as usize;

    let mut header = vec![0u8; header_len];
    input.read_exact(&mut header)?;
    let header = String::from_utf8_lossy(&header);
    if !header.contains("'descr': '<f4'") || !header.contains("'fortran_order': False") {
        return Err(PipelineError::format(path, 1, "only little-endian f32 C-order arrays are supported"));
    }
    let (rows, cols) = parse_shape(&header)
        .ok_or_else(|| PipelineError::format(path, 1, "cannot read 2-D shape from header"))?;

    let mut bytes = Vec::with_capacity(rows * cols * 4);
    input.read_to_end(&mut bytes)?;
    if bytes.len() != rows * cols * 4 {
        return Err(PipelineError::format(
            path,
            1,
            format!("expected {} data bytes, found {}", rows * cols * 4, bytes.len()),
        ));
    }
    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| PipelineError::format(path, 1, e.to_string()))
}

fn parse_shape(header: &str) -> Option<(usize, usize)> {
    let start = header.find("'shape': (")? + "'shape': (".len();
    let end   = start + header[start..].find(')')?;
    let dims: Vec<usize> = header[start..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect::<Option<Vec<usize>>>()?;
    match dims.as_slice() {
        [r, c] => Some((*r, *c)),
        _      => None,
    }
}
