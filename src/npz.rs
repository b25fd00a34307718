//! Minimal NPZ / NPY reader and writer.
//!
//! Supports the subset of the NumPy array format actually used by Bark
//! voice prompts:
//!   - NPY format version 1.0 and 2.0
//!   - `int32` / `int64` token arrays (widened to i64)
//!   - `float32` arrays
//!   - 0-d unicode scalars (`<U{n}`) for the optional `name` / `desc` fields
//!   - C-contiguous (row-major) layout
//!
//! NPZ files are simply ZIP archives whose members are `.npy` files.
//! Each member name without its `.npy` extension is the array name.

use std::{
    collections::HashMap,
    io::{Read, Write},
    path::Path,
};

use zip::ZipArchive;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// NPY header parser
// ─────────────────────────────────────────────────────────────────────────────

/// Decoded contents of one NPY entry.
#[derive(Debug, Clone, PartialEq)]
pub enum NpyData {
    I64(Vec<i64>),
    F32(Vec<f32>),
    /// 0-d unicode scalar (numpy `<U{n}`).
    Str(String),
}

/// A loaded NPZ entry: shape + data in row-major (C) order.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: NpyData,
}

/// Parse a raw `.npy` byte buffer.
pub fn parse_npy(data: &[u8]) -> Result<NpyArray> {
    // Magic: 6 bytes "\x93NUMPY"
    if data.len() < 10 || &data[..6] != b"\x93NUMPY" {
        return Err(Error::Npy("bad magic".into()));
    }

    let major = data[6];
    let minor = data[7];

    // Header length: 2 bytes (v1) or 4 bytes (v2), little-endian.
    let (header_len, header_start) = match (major, minor) {
        (1, _) => (u16::from_le_bytes([data[8], data[9]]) as usize, 10),
        (2, _) => {
            if data.len() < 12 {
                return Err(Error::Npy("v2 file too short".into()));
            }
            let len = u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize;
            (len, 12)
        }
        _ => return Err(Error::Npy(format!("unsupported version {}.{}", major, minor))),
    };

    let header_end = header_start + header_len;
    if data.len() < header_end {
        return Err(Error::Npy("truncated header".into()));
    }
    let header = std::str::from_utf8(&data[header_start..header_end])
        .map_err(|_| Error::Npy("header is not valid UTF-8".into()))?;

    let dtype = extract_header_field(header, "descr")
        .ok_or_else(|| Error::Npy("header missing 'descr'".into()))?
        .trim()
        .trim_matches('\'')
        .trim_matches('"')
        .to_string();

    let fortran = extract_header_field(header, "fortran_order")
        .unwrap_or("False")
        .trim()
        .to_ascii_lowercase();
    if fortran == "true" {
        return Err(Error::Npy("Fortran-order arrays are not supported".into()));
    }

    let shape_str = extract_header_field(header, "shape")
        .ok_or_else(|| Error::Npy("header missing 'shape'".into()))?;
    let shape = parse_shape(shape_str.trim())?;
    let n_elements: usize = shape.iter().product();

    let body = &data[header_end..];
    let big_endian = dtype.starts_with('>');
    let kind = dtype.trim_start_matches(['<', '>', '=', '|']);

    // Unicode scalar, e.g. '<U11': n UTF-32 code units.
    if let Some(n_chars) = kind.strip_prefix('U').and_then(|n| n.parse::<usize>().ok()) {
        if !shape.is_empty() {
            return Err(Error::Npy(format!(
                "unicode arrays of shape {:?} are not supported (0-d scalars only)",
                shape
            )));
        }
        if body.len() < n_chars * 4 {
            return Err(Error::Npy("unicode data section too short".into()));
        }
        let mut s = String::with_capacity(n_chars);
        for unit in body[..n_chars * 4].chunks_exact(4) {
            let arr = [unit[0], unit[1], unit[2], unit[3]];
            let cp = if big_endian { u32::from_be_bytes(arr) } else { u32::from_le_bytes(arr) };
            if cp == 0 {
                break; // numpy zero-pads shorter strings
            }
            s.push(char::from_u32(cp).ok_or_else(|| Error::Npy("invalid code point".into()))?);
        }
        return Ok(NpyArray { shape, data: NpyData::Str(s) });
    }

    let elem_size = match kind {
        "i4" | "f4" => 4,
        "i8" => 8,
        other => return Err(Error::Npy(format!("unsupported dtype '{}'", other))),
    };
    if body.len() < n_elements * elem_size {
        return Err(Error::Npy(format!(
            "data section too short: expected {} bytes, got {}",
            n_elements * elem_size,
            body.len()
        )));
    }
    let body = &body[..n_elements * elem_size];

    let data = match kind {
        "i4" => NpyData::I64(
            body.chunks_exact(4)
                .map(|b| {
                    let arr = [b[0], b[1], b[2], b[3]];
                    (if big_endian { i32::from_be_bytes(arr) } else { i32::from_le_bytes(arr) })
                        as i64
                })
                .collect(),
        ),
        "i8" => NpyData::I64(
            body.chunks_exact(8)
                .map(|b| {
                    let arr = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
                    if big_endian { i64::from_be_bytes(arr) } else { i64::from_le_bytes(arr) }
                })
                .collect(),
        ),
        "f4" => NpyData::F32(
            body.chunks_exact(4)
                .map(|b| {
                    let arr = [b[0], b[1], b[2], b[3]];
                    if big_endian { f32::from_be_bytes(arr) } else { f32::from_le_bytes(arr) }
                })
                .collect(),
        ),
        _ => unreachable!(),
    };

    Ok(NpyArray { shape, data })
}

/// Extract the value of a field from a Python-literal dict header string.
///
/// e.g. `extract_header_field("{'descr': '<i8', 'shape': (3,)}", "descr")`
/// returns `Some("<i8")`.
fn extract_header_field<'a>(header: &'a str, field: &str) -> Option<&'a str> {
    let key_sq = format!("'{}':", field);
    let key_dq = format!("\"{}\":", field);

    let start = header
        .find(key_sq.as_str())
        .map(|p| p + key_sq.len())
        .or_else(|| header.find(key_dq.as_str()).map(|p| p + key_dq.len()))?;

    let rest = header[start..].trim_start();

    // Value is either a Python string (quoted), tuple (parentheses), or a bare word.
    if rest.starts_with('(') {
        let end = rest.find(')')?;
        Some(&rest[..end + 1])
    } else if rest.starts_with('\'') || rest.starts_with('"') {
        let quote = rest.chars().next()?;
        let inner = &rest[1..];
        let end = inner.find(quote)?;
        Some(&inner[..end])
    } else {
        let end = rest.find([',', '}']).unwrap_or(rest.len());
        Some(rest[..end].trim())
    }
}

/// Parse a Python-style shape tuple like `(256, 512)` or `(100,)` or `()`.
fn parse_shape(s: &str) -> Result<Vec<usize>> {
    let inner = s.trim_start_matches('(').trim_end_matches(')');
    if inner.trim().is_empty() {
        return Ok(vec![]);
    }
    inner
        .split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<usize>()
                .map_err(|_| Error::Npy(format!("bad shape dim: '{}'", t)))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// NPY writer — int64 token arrays only (all a voice prompt needs)
// ─────────────────────────────────────────────────────────────────────────────

fn format_shape(shape: &[usize]) -> String {
    match shape.len() {
        0 => "()".to_string(),
        1 => format!("({},)", shape[0]),
        _ => format!(
            "({})",
            shape.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Serialise an i64 array to a v1.0 NPY byte buffer.
pub fn write_npy_i64(shape: &[usize], values: &[i64]) -> Result<Vec<u8>> {
    let n_elements: usize = shape.iter().product();
    if n_elements != values.len() {
        return Err(Error::Npy(format!(
            "shape {:?} does not match {} values",
            shape,
            values.len()
        )));
    }

    let header_str = format!(
        "{{'descr': '<i8', 'fortran_order': False, 'shape': {}, }}",
        format_shape(shape)
    );
    // The header is space-padded so that magic + version + length prefix +
    // header is a multiple of 64 bytes, terminated with '\n'.
    let raw_len = 10 + header_str.len() + 1;
    let padded_len = raw_len.div_ceil(64) * 64;
    let mut header = header_str;
    for _ in 0..(padded_len - raw_len) {
        header.push(' ');
    }
    header.push('\n');

    let mut buf = Vec::with_capacity(padded_len + values.len() * 8);
    buf.extend_from_slice(b"\x93NUMPY");
    buf.push(1); // major
    buf.push(0); // minor
    buf.extend_from_slice(&(header.len() as u16).to_le_bytes());
    buf.extend_from_slice(header.as_bytes());
    for &v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    Ok(buf)
}

// ─────────────────────────────────────────────────────────────────────────────
// NPZ loading
// ─────────────────────────────────────────────────────────────────────────────

/// Load an NPZ file and return all arrays indexed by name
/// (`.npy` extension stripped).
pub fn load_npz(path: &Path) -> Result<HashMap<String, NpyArray>> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let mut archive = ZipArchive::new(file)?;

    let mut arrays = HashMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().trim_end_matches(".npy").to_string();

        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf).map_err(|e| Error::io(path, e))?;

        let array =
            parse_npy(&buf).map_err(|e| Error::Npy(format!("entry '{}': {}", name, e)))?;
        arrays.insert(name, array);
    }
    Ok(arrays)
}

/// Optional display metadata embedded in a preset file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetMetadata {
    pub name: String,
    pub desc: String,
}

/// Mark malformed preset content with the offending path.
fn bad_preset(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::BadPreset { path: path.to_path_buf(), reason: e.to_string() }
}

/// Read only the `name` / `desc` entries of a preset file.
///
/// Absent fields come back as empty strings; the prompt arrays are not
/// decoded, so this stays cheap for catalog scans over large directories.
pub fn read_preset_metadata(path: &Path) -> Result<PresetMetadata> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| bad_preset(path, e))?;

    let mut meta = PresetMetadata::default();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| bad_preset(path, e))?;
        let field = match entry.name().trim_end_matches(".npy") {
            "name" => 0,
            "desc" => 1,
            _ => continue,
        };
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf).map_err(|e| Error::io(path, e))?;
        if let NpyData::Str(s) = parse_npy(&buf).map_err(|e| bad_preset(path, e))?.data {
            if field == 0 {
                meta.name = s;
            } else {
                meta.desc = s;
            }
        }
    }
    Ok(meta)
}

// ─────────────────────────────────────────────────────────────────────────────
// Voice prompts
// ─────────────────────────────────────────────────────────────────────────────

/// One shaped token array of a voice prompt.  The token values are opaque
/// to this crate; they only condition the external generator.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptArray {
    pub shape: Vec<usize>,
    pub data: Vec<i64>,
}

impl PromptArray {
    /// Flat 1-D array.
    pub fn new(data: Vec<i64>) -> Self {
        Self { shape: vec![data.len()], data }
    }
}

/// The persisted conditioning artifact that steers the generator toward a
/// particular voice: semantic, coarse and fine token histories.
#[derive(Debug, Clone, PartialEq)]
pub struct VoicePrompt {
    pub semantic_prompt: PromptArray,
    pub coarse_prompt: PromptArray,
    pub fine_prompt: PromptArray,
}

fn take_prompt_array(arrays: &mut HashMap<String, NpyArray>, key: &str) -> Result<PromptArray> {
    let arr = arrays
        .remove(key)
        .ok_or_else(|| Error::Npy(format!("missing '{}' entry", key)))?;
    match arr.data {
        NpyData::I64(data) => Ok(PromptArray { shape: arr.shape, data }),
        _ => Err(Error::Npy(format!("'{}' is not an integer token array", key))),
    }
}

/// Load the three prompt arrays of a voice preset file.
pub fn load_voice_prompt(path: &Path) -> Result<VoicePrompt> {
    let mut arrays = load_npz(path).map_err(|e| match e {
        Error::Io { .. } => e,
        other => bad_preset(path, other),
    })?;
    Ok(VoicePrompt {
        semantic_prompt: take_prompt_array(&mut arrays, "semantic_prompt")
            .map_err(|e| bad_preset(path, e))?,
        coarse_prompt: take_prompt_array(&mut arrays, "coarse_prompt")
            .map_err(|e| bad_preset(path, e))?,
        fine_prompt: take_prompt_array(&mut arrays, "fine_prompt")
            .map_err(|e| bad_preset(path, e))?,
    })
}

/// Write a voice prompt as an NPZ archive with exactly the three keys
/// `semantic_prompt`, `coarse_prompt` and `fine_prompt`.
///
/// An existing file at `path` is overwritten.
pub fn save_npz_file(path: &Path, prompt: &VoicePrompt) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| Error::io(path, e))?;
    let mut archive = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (key, array) in [
        ("semantic_prompt", &prompt.semantic_prompt),
        ("coarse_prompt", &prompt.coarse_prompt),
        ("fine_prompt", &prompt.fine_prompt),
    ] {
        let bytes = write_npy_i64(&array.shape, &array.data)?;
        archive.start_file(format!("{}.npy", key), options.clone())?;
        archive.write_all(&bytes).map_err(|e| Error::io(path, e))?;
    }
    archive.finish()?;
    log::info!("speaker file saved to {}", path.display());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("longbark-npz-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(tag)
    }

    /// Build a 0-d unicode scalar NPY buffer (dtype `<U{n}`) for testing.
    fn make_npy_str(value: &str) -> Vec<u8> {
        let n = value.chars().count();
        let header_str =
            format!("{{'descr': '<U{}', 'fortran_order': False, 'shape': (), }}", n);
        let raw_len = 10 + header_str.len() + 1;
        let padded_len = raw_len.div_ceil(64) * 64;
        let mut header = header_str;
        for _ in 0..(padded_len - raw_len) {
            header.push(' ');
        }
        header.push('\n');

        let mut buf = Vec::new();
        buf.extend_from_slice(b"\x93NUMPY");
        buf.push(1);
        buf.push(0);
        buf.extend_from_slice(&(header.len() as u16).to_le_bytes());
        buf.extend_from_slice(header.as_bytes());
        for c in value.chars() {
            buf.extend_from_slice(&(c as u32).to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_i64_roundtrip_1d() {
        let values = vec![10i64, -3, 400_000, 0];
        let buf = write_npy_i64(&[4], &values).unwrap();
        let arr = parse_npy(&buf).unwrap();
        assert_eq!(arr.shape, vec![4]);
        assert_eq!(arr.data, NpyData::I64(values));
    }

    /// Build an `<i4` NPY buffer by hand; the writer only ever emits
    /// `<i8`, but numpy archives from 32-bit sources use this dtype.
    fn make_npy_i32(values: &[i32]) -> Vec<u8> {
        let header_str = format!(
            "{{'descr': '<i4', 'fortran_order': False, 'shape': ({},), }}",
            values.len()
        );
        let raw_len = 10 + header_str.len() + 1;
        let padded_len = raw_len.div_ceil(64) * 64;
        let mut header = header_str;
        for _ in 0..(padded_len - raw_len) {
            header.push(' ');
        }
        header.push('\n');

        let mut buf = Vec::new();
        buf.extend_from_slice(b"\x93NUMPY");
        buf.push(1);
        buf.push(0);
        buf.extend_from_slice(&(header.len() as u16).to_le_bytes());
        buf.extend_from_slice(header.as_bytes());
        for &v in values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_i32_widened_to_i64() {
        let buf = make_npy_i32(&[5, -17, i32::MAX, i32::MIN]);
        let arr = parse_npy(&buf).unwrap();
        assert_eq!(arr.shape, vec![4]);
        assert_eq!(
            arr.data,
            NpyData::I64(vec![5, -17, i32::MAX as i64, i32::MIN as i64])
        );
    }

    #[test]
    fn test_i64_roundtrip_2d() {
        let values: Vec<i64> = (0..6).collect();
        let buf = write_npy_i64(&[2, 3], &values).unwrap();
        let arr = parse_npy(&buf).unwrap();
        assert_eq!(arr.shape, vec![2, 3]);
        assert_eq!(arr.data, NpyData::I64(values));
    }

    #[test]
    fn test_header_block_is_64_byte_aligned() {
        let buf = write_npy_i64(&[1], &[7]).unwrap();
        let header_len = u16::from_le_bytes([buf[8], buf[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);
        assert_eq!(buf[10 + header_len - 1], b'\n');
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        assert!(write_npy_i64(&[3], &[1, 2]).is_err());
    }

    #[test]
    fn test_parse_unicode_scalar() {
        let buf = make_npy_str("Käthe");
        let arr = parse_npy(&buf).unwrap();
        assert_eq!(arr.data, NpyData::Str("Käthe".to_string()));
    }

    #[test]
    fn test_bad_magic() {
        assert!(parse_npy(b"NOTANPY").is_err());
    }

    #[test]
    fn test_fortran_order_rejected() {
        let mut buf = write_npy_i64(&[1], &[1]).unwrap();
        let pos = buf.windows(5).position(|w| w == b"False").unwrap();
        buf.splice(pos..pos + 5, b"True ".iter().copied());
        assert!(parse_npy(&buf).is_err());
    }

    #[test]
    fn test_voice_prompt_roundtrip() {
        let prompt = VoicePrompt {
            semantic_prompt: PromptArray::new(vec![1, 2, 3, 4, 5]),
            coarse_prompt: PromptArray { shape: vec![2, 3], data: vec![9, 8, 7, 6, 5, 4] },
            fine_prompt: PromptArray { shape: vec![2, 2], data: vec![11, 12, 13, 14] },
        };
        let path = temp_path("roundtrip.npz");
        save_npz_file(&path, &prompt).unwrap();
        let loaded = load_voice_prompt(&path).unwrap();
        assert_eq!(loaded, prompt);
    }

    #[test]
    fn test_metadata_absent_fields_are_empty() {
        let prompt = VoicePrompt {
            semantic_prompt: PromptArray::new(vec![1]),
            coarse_prompt: PromptArray::new(vec![2]),
            fine_prompt: PromptArray::new(vec![3]),
        };
        let path = temp_path("no_meta.npz");
        save_npz_file(&path, &prompt).unwrap();
        let meta = read_preset_metadata(&path).unwrap();
        assert_eq!(meta, PresetMetadata::default());
    }

    #[test]
    fn test_metadata_read() {
        let path = temp_path("with_meta.npz");
        let file = std::fs::File::create(&path).unwrap();
        let mut archive = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        archive.start_file("semantic_prompt.npy", options.clone()).unwrap();
        archive.write_all(&write_npy_i64(&[1], &[1]).unwrap()).unwrap();
        archive.start_file("name.npy", options.clone()).unwrap();
        archive.write_all(&make_npy_str("Announcer")).unwrap();
        archive.start_file("desc.npy", options.clone()).unwrap();
        archive.write_all(&make_npy_str("calm narration voice")).unwrap();
        archive.finish().unwrap();

        let meta = read_preset_metadata(&path).unwrap();
        assert_eq!(meta.name, "Announcer");
        assert_eq!(meta.desc, "calm narration voice");
    }

    #[test]
    fn test_missing_prompt_entry_is_error() {
        let path = temp_path("partial.npz");
        let file = std::fs::File::create(&path).unwrap();
        let mut archive = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        archive.start_file("semantic_prompt.npy", options.clone()).unwrap();
        archive.write_all(&write_npy_i64(&[1], &[1]).unwrap()).unwrap();
        archive.finish().unwrap();

        assert!(load_voice_prompt(&path).is_err());
    }
}
