//! PLY header parsing and batched binary vertex reads.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use pointstream_core::constants::BATCH;
use pointstream_core::{EngineError, FilePoint, IoStage, Result};

/// The accepted vertex layout: x,y,z as f64 followed by r,g,b as u8.
const VERTEX_PROPS: [(&str, &[&str]); 6] = [
    ("double", &["x"]),
    ("double", &["y"]),
    ("double", &["z"]),
    ("uchar", &["red", "r"]),
    ("uchar", &["green", "g"]),
    ("uchar", &["blue", "b"]),
];

/// Parsed PLY header: vertex count and the byte offset where rows begin.
#[derive(Clone, Debug)]
pub struct PlyHeader {
    pub vertex_count: u64,
    pub data_start: u64,
}

fn header_invalid(path: &Path, reason: impl Into<String>) -> EngineError {
    EngineError::HeaderInvalid {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn format_unsupported(path: &Path, reason: impl Into<String>) -> EngineError {
    EngineError::FormatUnsupported {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Normalize the type names PLY writers use for the layout we accept.
fn canonical_type(ty: &str) -> &str {
    match ty {
        "float64" => "double",
        "uint8" => "uchar",
        other => other,
    }
}

/// Parse the ASCII header of `path` up to `end_header`.
///
/// Only `format binary_little_endian` with the exact 27-byte vertex layout
/// is accepted; anything else is `FormatUnsupported`.
pub fn read_header(path: &Path) -> Result<PlyHeader> {
    let file = File::open(path).map_err(|e| EngineError::io(IoStage::Open, path, e))?;
    let mut reader = BufReader::new(file);

    let mut consumed: u64 = 0;
    let mut line = String::new();
    let mut read_line = |reader: &mut BufReader<File>, line: &mut String| -> Result<usize> {
        line.clear();
        let n = reader
            .read_line(line)
            .map_err(|e| EngineError::io(IoStage::Read, path, e))?;
        consumed += n as u64;
        Ok(n)
    };

    if read_line(&mut reader, &mut line)? == 0 || line.trim_end() != "ply" {
        return Err(header_invalid(path, "missing `ply` magic line"));
    }

    let mut format: Option<String> = None;
    let mut vertex_count: Option<u64> = None;
    // property lines of the element currently being declared
    let mut in_vertex_element = false;
    let mut vertex_props: Vec<(String, String)> = Vec::new();
    let mut header_ended = false;

    while read_line(&mut reader, &mut line)? > 0 {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("comment") => {}
            Some("format") => {
                format = words.next().map(str::to_owned);
            }
            Some("element") => {
                let name = words.next().unwrap_or_default();
                in_vertex_element = name == "vertex";
                if in_vertex_element {
                    vertex_count = words.next().and_then(|w| w.parse().ok());
                }
            }
            Some("property") => {
                if in_vertex_element {
                    let ty = words.next().unwrap_or_default();
                    let name = words.next().unwrap_or_default();
                    vertex_props.push((canonical_type(ty).to_owned(), name.to_owned()));
                }
            }
            Some("end_header") => {
                header_ended = true;
                break;
            }
            _ => {}
        }
    }

    if !header_ended {
        return Err(header_invalid(path, "no `end_header` line"));
    }
    let vertex_count =
        vertex_count.ok_or_else(|| header_invalid(path, "no `element vertex` declaration"))?;
    if vertex_count == 0 {
        return Err(header_invalid(path, "vertex count is zero"));
    }

    match format.as_deref() {
        Some("binary_little_endian") => {}
        Some(other) => {
            return Err(format_unsupported(
                path,
                format!("format `{other}`, only binary_little_endian is read"),
            ));
        }
        None => return Err(header_invalid(path, "no `format` line")),
    }

    if vertex_props.len() != VERTEX_PROPS.len() {
        return Err(format_unsupported(
            path,
            format!(
                "expected 6 vertex properties (x,y,z f64 then r,g,b u8), found {}",
                vertex_props.len()
            ),
        ));
    }
    for ((ty, name), (want_ty, want_names)) in vertex_props.iter().zip(VERTEX_PROPS) {
        if ty.as_str() != want_ty || !want_names.contains(&name.as_str()) {
            return Err(format_unsupported(
                path,
                format!("unexpected vertex property `{ty} {name}`"),
            ));
        }
    }

    Ok(PlyHeader {
        vertex_count,
        data_start: consumed,
    })
}

/// Streams vertex rows in batches of up to `BATCH`, reusing one buffer.
pub struct VertexReader {
    path: PathBuf,
    file: BufReader<File>,
    remaining: u64,
    bytes: Vec<u8>,
}

impl VertexReader {
    /// Open `path` positioned at the first vertex row.
    pub fn open(path: &Path, header: &PlyHeader) -> Result<Self> {
        let file = File::open(path).map_err(|e| EngineError::io(IoStage::Open, path, e))?;
        let mut file = BufReader::new(file);
        file.seek(SeekFrom::Start(header.data_start))
            .map_err(|e| EngineError::io(IoStage::Read, path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            remaining: header.vertex_count,
            bytes: Vec::new(),
        })
    }

    /// Read the next batch of rows, or `None` once the stream is exhausted.
    ///
    /// The returned slice is valid until the next call.
    pub fn next_batch(&mut self) -> Result<Option<&[FilePoint]>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let take = self.remaining.min(BATCH as u64) as usize;
        let want = take * std::mem::size_of::<FilePoint>();
        self.bytes.resize(want, 0);
        let mut filled = 0;
        while filled < want {
            match self.file.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(EngineError::io(IoStage::Read, &self.path, e)),
            }
        }
        if filled < want {
            return Err(EngineError::ShortRead {
                path: self.path.clone(),
                expected: want as u64,
                got: filled as u64,
            });
        }
        self.remaining -= take as u64;
        // FilePoint is packed, so alignment-1 casts from raw bytes are fine.
        Ok(Some(bytemuck::cast_slice(&self.bytes)))
    }
}
