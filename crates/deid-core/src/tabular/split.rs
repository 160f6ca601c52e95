//! Splitting one large CSV into size-bounded chunks.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use csv::ByteRecord;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// A chunk is closed once it holds at least this many bytes.
    pub target_bytes: u64,
    /// Repeat the input header at the top of every chunk.
    pub keep_header: bool,
    /// Where chunks go; None = next to the input.
    pub out_dir: Option<PathBuf>,
    /// Put chunk N in its own folder `<out_dir>/<first + N - 1>/`, the layout
    /// `stage` uploads from.
    pub folder_start: Option<u64>,
}

impl SplitOptions {
    pub fn with_target_mb(mb: f64) -> Result<Self> {
        if !(mb.is_finite() && mb > 0.0) {
            bail!("chunk size must be a positive number of MB, got {mb}");
        }
        Ok(Self {
            target_bytes: ((mb * BYTES_PER_MB) as u64).max(1),
            keep_header: true,
            out_dir: None,
            folder_start: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
}

/// `<stem>_chunk_007<.ext>`
pub fn chunk_file_name(input: &Path, number: usize) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    match input.extension() {
        Some(ext) => format!("{stem}_chunk_{number:03}.{}", ext.to_string_lossy()),
        None => format!("{stem}_chunk_{number:03}"),
    }
}

/// Serialized form of one record, terminator included.
fn encode(record: &ByteRecord) -> Result<Vec<u8>> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_byte_record(record)?;
    w.into_inner().context("encode CSV record")
}

struct OpenChunk {
    path: PathBuf,
    out: BufWriter<File>,
    rows: usize,
    bytes: u64,
}

impl OpenChunk {
    fn create(path: PathBuf, header: Option<&[u8]>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        let mut chunk = Self {
            path,
            out: BufWriter::new(file),
            rows: 0,
            bytes: 0,
        };
        if let Some(header) = header {
            chunk.write(header)?;
        }
        Ok(chunk)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.out
            .write_all(bytes)
            .with_context(|| format!("write {}", self.path.display()))?;
        self.bytes += bytes.len() as u64;
        Ok(())
    }

    fn finish(mut self) -> Result<ChunkInfo> {
        self.out
            .flush()
            .with_context(|| format!("write {}", self.path.display()))?;
        Ok(ChunkInfo {
            path: self.path,
            rows: self.rows,
            bytes: self.bytes,
        })
    }
}

/// Splits `input` into chunks of roughly `opts.target_bytes` each.
///
/// Rows are never split, and every chunk holds at least one row, so a chunk
/// overshoots the target by at most its last row. A header-only input yields
/// no chunks. An input without even a header is an error.
pub fn split_csv(input: &Path, opts: &SplitOptions) -> Result<Vec<ChunkInfo>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(input)
        .with_context(|| format!("open {}", input.display()))?;

    let mut records = reader.byte_records();
    let header = match records.next() {
        Some(r) => encode(&r.with_context(|| format!("read {}", input.display()))?)?,
        None => bail!("{} is empty", input.display()),
    };

    let out_dir = match &opts.out_dir {
        Some(dir) => dir.clone(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    let chunk_path = |number: usize| {
        let name = chunk_file_name(input, number);
        match opts.folder_start {
            Some(first) => out_dir.join((first + number as u64 - 1).to_string()).join(name),
            None => out_dir.join(name),
        }
    };

    let mut done = Vec::new();
    let mut current: Option<OpenChunk> = None;
    for record in records {
        let record = record.with_context(|| format!("read {}", input.display()))?;
        let row = encode(&record)?;
        let mut chunk = match current.take() {
            Some(chunk) => chunk,
            None => OpenChunk::create(
                chunk_path(done.len() + 1),
                opts.keep_header.then_some(header.as_slice()),
            )?,
        };
        chunk.write(&row)?;
        chunk.rows += 1;
        if chunk.bytes >= opts.target_bytes {
            let info = chunk.finish()?;
            tracing::debug!(chunk = %info.path.display(), rows = info.rows, bytes = info.bytes, "chunk written");
            done.push(info);
        } else {
            current = Some(chunk);
        }
    }
    if let Some(last) = current.take() {
        done.push(last.finish()?);
    }

    tracing::info!(input = %input.display(), chunks = done.len(), "split finished");
    Ok(done)
}
