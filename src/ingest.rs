//! Ingestion: delimiter sniffing, flexible CSV reads, and the frame cache.
//!
//! The extracts arrive with either `;` or `,` as the field separator and a
//! mix of locale-specific numeric formats, so every column is read as text
//! and type decisions are deferred to coercion. All reads decode through
//! `encoding_rs` (UTF-8 by default).

use std::{
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
    time::SystemTime,
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{debug, info};

use crate::frame::StringFrame;

/// Bytes inspected when sniffing the field separator.
pub const SNIFF_SAMPLE_BYTES: usize = 4096;

/// Tokens treated as missing values during parse, exactly as written.
pub const MISSING_TOKENS: &[&str] = &["NA", "NaN", "nan", "None"];

/// Picks `;` when the sample contains at least as many semicolons as commas,
/// otherwise `,`. Ties go to `;`.
pub fn sniff_delimiter(sample: &str) -> u8 {
    let semicolons = sample.matches(';').count();
    let commas = sample.matches(',').count();
    if semicolons > 0 && semicolons >= commas {
        b';'
    } else {
        b','
    }
}

fn sniff_file_delimiter(path: &Path) -> Result<u8> {
    let mut file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let mut buffer = vec![0u8; SNIFF_SAMPLE_BYTES];
    let read = file
        .read(&mut buffer)
        .with_context(|| format!("Sampling input file {path:?}"))?;
    buffer.truncate(read);
    Ok(sniff_delimiter(&String::from_utf8_lossy(&buffer)))
}

fn null_missing(field: String) -> Option<String> {
    if field.is_empty() || MISSING_TOKENS.contains(&field.as_str()) {
        None
    } else {
        Some(field)
    }
}

fn decode_field(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn read_frame_from_reader<R: Read>(
    reader: R,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<StringFrame> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(reader);

    let headers = reader
        .byte_headers()
        .context("Reading header row")?
        .iter()
        .map(|field| decode_field(field, encoding))
        .collect::<Vec<_>>();
    let mut frame = StringFrame::new(headers);

    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let row = record
            .iter()
            .map(|field| null_missing(decode_field(field, encoding)))
            .collect::<Vec<_>>();
        frame
            .push_row(row)
            .with_context(|| format!("Reading row {}", row_idx + 2))?;
    }
    Ok(frame)
}

/// Reads a delimited file into a [`StringFrame`], sniffing the separator when
/// no override is given.
pub fn read_frame(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<StringFrame> {
    let delimiter = match delimiter {
        Some(d) => d,
        None => sniff_file_delimiter(path)?,
    };
    debug!(
        "Reading {path:?} with delimiter '{}'",
        (delimiter as char).escape_default()
    );
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    read_frame_from_reader(file, delimiter, encoding)
        .with_context(|| format!("Reading delimited file {path:?}"))
}

/// Reads an in-memory byte buffer (upload path) into a [`StringFrame`].
pub fn read_frame_from_bytes(
    bytes: &[u8],
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<StringFrame> {
    let delimiter = delimiter.unwrap_or_else(|| {
        let sample_len = bytes.len().min(SNIFF_SAMPLE_BYTES);
        sniff_delimiter(&String::from_utf8_lossy(&bytes[..sample_len]))
    });
    read_frame_from_reader(bytes, delimiter, encoding).context("Reading delimited buffer")
}

/// Binary cache of ingestion output, one artifact per source file.
///
/// An artifact is reused only when its modification time is strictly newer
/// than the source's; anything else (missing, stale, undecodable) falls back
/// to re-reading the source. Cache writes are best-effort: a full cache
/// directory must never fail the pipeline.
pub struct FrameCache {
    dir: PathBuf,
}

impl FrameCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache artifact path derived from the source file's base name.
    pub fn artifact_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame".to_string());
        self.dir.join(format!("{stem}.bin"))
    }

    /// Returns the cached frame for `source`, or reads the source and
    /// refreshes the artifact.
    pub fn load_or_read(
        &self,
        source: &Path,
        delimiter: Option<u8>,
        encoding: &'static Encoding,
    ) -> Result<StringFrame> {
        let artifact = self.artifact_path(source);
        if let Some(frame) = self.load_fresh(source, &artifact) {
            info!("Using cached frame {artifact:?}");
            return Ok(frame);
        }
        let frame = read_frame(source, delimiter, encoding)?;
        self.store(&artifact, &frame);
        Ok(frame)
    }

    fn load_fresh(&self, source: &Path, artifact: &Path) -> Option<StringFrame> {
        let source_mtime = modified_time(source)?;
        let artifact_mtime = modified_time(artifact)?;
        if artifact_mtime <= source_mtime {
            debug!("Cache artifact {artifact:?} is stale");
            return None;
        }
        let bytes = fs::read(artifact).ok()?;
        match bincode::serde::decode_from_slice(&bytes, bincode::config::standard()) {
            Ok((frame, _)) => Some(frame),
            Err(err) => {
                debug!("Discarding undecodable cache artifact {artifact:?}: {err}");
                None
            }
        }
    }

    fn store(&self, artifact: &Path, frame: &StringFrame) {
        let result = fs::create_dir_all(&self.dir)
            .map_err(anyhow::Error::from)
            .and_then(|_| {
                let bytes = bincode::serde::encode_to_vec(frame, bincode::config::standard())?;
                fs::write(artifact, bytes)?;
                Ok(())
            });
        match result {
            Ok(()) => debug!("Wrote cache artifact {artifact:?}"),
            Err(err) => debug!("Ignoring cache write failure for {artifact:?}: {err}"),
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;

    #[test]
    fn sniff_prefers_semicolon_on_tie() {
        assert_eq!(sniff_delimiter("a;b;c"), b';');
        assert_eq!(sniff_delimiter("a,b,c"), b',');
        assert_eq!(sniff_delimiter("a;b,c"), b';');
        assert_eq!(sniff_delimiter("plain text"), b',');
    }

    #[test]
    fn read_frame_nulls_missing_tokens() {
        let data = b"annee;dept;prev\n2023;099;NA\nNaN;;12,5\n";
        let frame = read_frame_from_bytes(data, None, UTF_8).expect("frame");
        assert_eq!(frame.headers(), ["annee", "dept", "prev"]);
        assert_eq!(frame.row_count(), 2);
        assert_eq!(frame.value(0, 2), None);
        assert_eq!(frame.value(1, 0), None);
        assert_eq!(frame.value(1, 1), None);
        assert_eq!(frame.value(1, 2), Some("12,5"));
    }

    #[test]
    fn read_frame_keeps_case_sensitive_tokens() {
        // "na" is not in the missing-token list; only the exact spellings are.
        let data = b"col\nna\nNone\n";
        let frame = read_frame_from_bytes(data, None, UTF_8).expect("frame");
        assert_eq!(frame.value(0, 0), Some("na"));
        assert_eq!(frame.value(1, 0), None);
    }
}
