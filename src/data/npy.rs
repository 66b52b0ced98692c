//! Minimal reader/writer for NumPy `.npy` arrays.
//!
//! # File layout
//! ```text
//! bytes 0-5:   0x93 'N' 'U' 'M' 'P' 'Y'
//! byte  6:     major version (1, 2 or 3)
//! byte  7:     minor version
//! v1:          2-byte little-endian header length
//! v2/v3:       4-byte little-endian header length
//! header:      Python dict literal, e.g.
//!              {'descr': '|u1', 'fortran_order': False, 'shape': (10000, 32, 32, 3), }
//! data:        C-order elements
//! ```
//!
//! Only little-endian `u1`, `i1`, `i4`, `i8`, `f4` and `f8` arrays in C order
//! are supported, which covers the corruption and perturbation batteries
//! and their label files.

use std::fs;
use std::path::Path;

use crate::error::{AugMixError, Result};

const MAGIC: &[u8; 6] = b"\x93NUMPY";

#[derive(Debug, Clone, PartialEq)]
pub enum NpyData {
    U8(Vec<u8>),
    I8(Vec<i8>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl NpyData {
    pub fn len(&self) -> usize {
        match self {
            NpyData::U8(v) => v.len(),
            NpyData::I8(v) => v.len(),
            NpyData::I32(v) => v.len(),
            NpyData::I64(v) => v.len(),
            NpyData::F32(v) => v.len(),
            NpyData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dtype_name(&self) -> &'static str {
        match self {
            NpyData::U8(_) => "uint8",
            NpyData::I8(_) => "int8",
            NpyData::I32(_) => "int32",
            NpyData::I64(_) => "int64",
            NpyData::F32(_) => "float32",
            NpyData::F64(_) => "float64",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: NpyData,
}

impl NpyArray {
    /// Reads and parses `path`.
    pub fn read(path: impl AsRef<Path>) -> Result<NpyArray> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| AugMixError::file(path, e))?;
        parse_npy(&bytes).map_err(|reason| AugMixError::array(path, reason))
    }

    /// Raw bytes of a `uint8` array.
    pub fn into_u8(self, path: &Path) -> Result<Vec<u8>> {
        match self.data {
            NpyData::U8(v) => Ok(v),
            other => Err(AugMixError::array(
                path,
                format!("expected uint8 image data, found {}", other.dtype_name()),
            )),
        }
    }

    /// Class indices from an integer array of any supported width.
    pub fn into_labels(self, path: &Path) -> Result<Vec<usize>> {
        let signed: Vec<i64> = match self.data {
            NpyData::U8(v) => v.into_iter().map(i64::from).collect(),
            NpyData::I8(v) => v.into_iter().map(i64::from).collect(),
            NpyData::I32(v) => v.into_iter().map(i64::from).collect(),
            NpyData::I64(v) => v,
            other => {
                return Err(AugMixError::array(
                    path,
                    format!("expected integer labels, found {}", other.dtype_name()),
                ))
            }
        };
        signed
            .into_iter()
            .map(|l| usize::try_from(l).map_err(|_| AugMixError::array(path, format!("negative label {}", l))))
            .collect()
    }
}

/// Parses a complete `.npy` file held in memory.
pub fn parse_npy(bytes: &[u8]) -> std::result::Result<NpyArray, String> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err("missing \\x93NUMPY magic".to_string());
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err("truncated v2 header length".to_string());
            }
            (u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize, 12)
        }
        v => return Err(format!("unsupported format version {}", v)),
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(format!("header claims {} bytes but file is {} bytes", header_len, bytes.len()));
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| "header is not valid UTF-8".to_string())?;

    let descr = dict_value(header, "descr")?;
    let descr = descr.trim().trim_matches(|c| c == '\'' || c == '"');
    let fortran = dict_value(header, "fortran_order")?;
    if fortran.trim() == "True" {
        return Err("Fortran-ordered arrays are not supported".to_string());
    }
    let shape = parse_shape(dict_value(header, "shape")?)?;

    let count: usize = shape.iter().product();
    let body = &bytes[data_start..];
    let data = decode(descr, body, count)?;

    Ok(NpyArray { shape, data })
}

/// Text after `'key':` up to the matching top-level comma.
fn dict_value<'a>(header: &'a str, key: &str) -> std::result::Result<&'a str, String> {
    let needle = format!("'{}':", key);
    let start = header
        .find(&needle)
        .map(|i| i + needle.len())
        .ok_or_else(|| format!("header has no '{}' entry", key))?;
    let rest = &header[start..];

    let mut depth = 0i32;
    for (i, ch) in rest.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' | '}' if depth == 0 => return Ok(&rest[..i]),
            _ => {}
        }
    }
    Err(format!("unterminated '{}' entry", key))
}

fn parse_shape(text: &str) -> std::result::Result<Vec<usize>, String> {
    let inner = text
        .trim()
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| format!("malformed shape '{}'", text.trim()))?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<usize>().map_err(|_| format!("bad dimension '{}'", t)))
        .collect()
}

fn decode(descr: &str, body: &[u8], count: usize) -> std::result::Result<NpyData, String> {
    if descr.len() < 2 || !descr.is_ascii() {
        return Err(format!("malformed dtype '{}'", descr));
    }
    let (order, kind) = descr.split_at(1);
    if !matches!(order, "<" | "|" | "=") {
        return Err(format!("unsupported byte order in dtype '{}'", descr));
    }

    let width = match kind {
        "u1" | "i1" | "b1" => 1,
        "i4" | "f4" => 4,
        "i8" | "f8" => 8,
        _ => return Err(format!("unsupported dtype '{}'", descr)),
    };
    let needed = count.checked_mul(width).ok_or("element count overflows")?;
    if body.len() < needed {
        return Err(format!("expected {} data bytes, found {}", needed, body.len()));
    }
    let body = &body[..needed];

    Ok(match kind {
        "u1" | "b1" => NpyData::U8(body.to_vec()),
        "i1" => NpyData::I8(body.iter().map(|&b| b as i8).collect()),
        "i4" => NpyData::I32(body.chunks_exact(4).map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()),
        "i8" => NpyData::I64(
            body.chunks_exact(8)
                .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
        "f4" => NpyData::F32(body.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()),
        _ => NpyData::F64(
            body.chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
    })
}

/// Serializes an array as a version 1.0 `.npy` file.
pub fn encode_npy(array: &NpyArray) -> Vec<u8> {
    let (descr, body): (&str, Vec<u8>) = match &array.data {
        NpyData::U8(v) => ("|u1", v.clone()),
        NpyData::I8(v) => ("|i1", v.iter().map(|&x| x as u8).collect()),
        NpyData::I32(v) => ("<i4", v.iter().flat_map(|x| x.to_le_bytes()).collect()),
        NpyData::I64(v) => ("<i8", v.iter().flat_map(|x| x.to_le_bytes()).collect()),
        NpyData::F32(v) => ("<f4", v.iter().flat_map(|x| x.to_le_bytes()).collect()),
        NpyData::F64(v) => ("<f8", v.iter().flat_map(|x| x.to_le_bytes()).collect()),
    };

    let shape = match array.shape.len() {
        1 => format!("({},)", array.shape[0]),
        _ => format!(
            "({})",
            array.shape.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    };
    let mut header = format!("{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}", descr, shape);
    // Pad so the data starts on a 64-byte boundary, newline-terminated.
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut out = Vec::with_capacity(10 + header.len() + body.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&body);
    out
}

pub fn write_npy(path: impl AsRef<Path>, array: &NpyArray) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, encode_npy(array)).map_err(|e| AugMixError::file(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_written_u8_array() {
        let array = NpyArray { shape: vec![2, 2, 2, 3], data: NpyData::U8((0..24).collect()) };
        let bytes = encode_npy(&array);
        assert_eq!((bytes.len() - 24) % 64, 0);
        assert_eq!(parse_npy(&bytes).unwrap(), array);
    }

    #[test]
    fn test_parse_v2_header() {
        let header = "{'descr': '<i8', 'fortran_order': False, 'shape': (3,), }\n";
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[2, 0]);
        bytes.extend_from_slice(&(header.len() as u32).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        for v in [4i64, 0, 9] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let parsed = parse_npy(&bytes).unwrap();
        assert_eq!(parsed.shape, vec![3]);
        assert_eq!(parsed.into_labels(Path::new("labels.npy")).unwrap(), vec![4, 0, 9]);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let err = parse_npy(b"NOTNUMPY\x01\x00").unwrap_err();
        assert!(err.contains("magic"));
    }

    #[test]
    fn test_rejects_truncated_body() {
        let array = NpyArray { shape: vec![10], data: NpyData::U8(vec![0; 10]) };
        let mut bytes = encode_npy(&array);
        bytes.truncate(bytes.len() - 3);
        assert!(parse_npy(&bytes).is_err());
    }

    #[test]
    fn test_rejects_fortran_order() {
        let header = "{'descr': '|u1', 'fortran_order': True, 'shape': (1, 1), }\n";
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.push(7);
        assert!(parse_npy(&bytes).unwrap_err().contains("Fortran"));
    }

    #[test]
    fn test_float_labels_rejected() {
        let array = NpyArray { shape: vec![1], data: NpyData::F32(vec![1.0]) };
        assert!(array.into_labels(Path::new("labels.npy")).is_err());
    }
}
