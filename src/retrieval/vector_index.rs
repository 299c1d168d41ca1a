//! Flat exact-L2 vector index, persisted to a single file with an atomic
//! write (temp file + fsync + rename), grounded on
//! `examples/arclabs561-rank-rank/crates/rank-retrieve/src/persistence/directory.rs::atomic_write`.
//! Deliberately simpler than that crate's segmented/memmapped store: the
//! corpora this engine targets (one workbook's worth of rows) fit comfortably
//! in memory, so a single row-major `Vec<f32>` is the whole index.

use std::io::{self, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::AppError;

const MAGIC: u32 = 0x5441_4249; // "TABI"
const VERSION: u32 = 1;

/// An in-memory, row-major `n × d` matrix of embeddings plus exact L2
/// nearest-neighbor search. Row `i` corresponds to snippet id `i` in the
/// [`crate::retrieval::corpus::Corpus`] it was built from.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    n: usize,
    d: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Build an index from `n` rows of dimension `d`. All rows must share
    /// the same dimension; a mismatched row is an internal error since the
    /// embedding client is responsible for dimensional consistency.
    pub fn build(rows: &[Vec<f32>], d: usize) -> Result<Self, AppError> {
        let mut data = Vec::with_capacity(rows.len() * d);
        for row in rows {
            if row.len() != d {
                return Err(AppError::Internal(format!(
                    "embedding row has dimension {} but index expects {d}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(VectorIndex {
            n: rows.len(),
            d,
            data,
        })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn dimension(&self) -> usize {
        self.d
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.d..(i + 1) * self.d]
    }

    /// Ascending-L2-distance ranking of every row against `query`, truncated
    /// to `top_n`. Ties broken by ascending row id (stable sort). Empty
    /// index returns an empty list.
    pub fn search(&self, query: &[f32], top_n: usize) -> Vec<(usize, f32)> {
        if self.n == 0 {
            return Vec::new();
        }
        let mut scored: Vec<(usize, f32)> = (0..self.n)
            .map(|i| (i, l2_distance(self.row(i), query)))
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_n);
        scored
    }

    /// Cosine similarity between row `i` and an arbitrary vector, used by
    /// the fusion ranker's dense-similarity term.
    pub fn cosine_similarity(&self, i: usize, other: &[f32]) -> f32 {
        cosine(self.row(i), other)
    }

    /// Atomically persist the index: write to a sibling temp file, `fsync`
    /// it, then rename over the destination so readers never observe a
    /// partially written file.
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Internal(format!("creating index directory: {e}")))?;

        let tmp_path = parent.join(format!(
            ".{}.tmp",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("index")
        ));

        {
            let mut file = std::fs::File::create(&tmp_path)
                .map_err(|e| AppError::Internal(format!("creating temp index file: {e}")))?;
            self.write_to(&mut file)
                .map_err(|e| AppError::Internal(format!("writing index: {e}")))?;
            file.sync_all()
                .map_err(|e| AppError::Internal(format!("fsyncing index: {e}")))?;
        }

        std::fs::rename(&tmp_path, path)
            .map_err(|e| AppError::Internal(format!("publishing index: {e}")))?;
        Ok(())
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(MAGIC)?;
        w.write_u32::<LittleEndian>(VERSION)?;
        w.write_u64::<LittleEndian>(self.n as u64)?;
        w.write_u64::<LittleEndian>(self.d as u64)?;
        let mut hasher = crc32fast::Hasher::new();
        for &v in &self.data {
            hasher.update(&v.to_le_bytes());
        }
        w.write_u32::<LittleEndian>(hasher.finalize())?;
        for &v in &self.data {
            w.write_f32::<LittleEndian>(v)?;
        }
        Ok(())
    }

    /// Load a previously saved index. Any I/O error, bad magic/version, or
    /// checksum mismatch yields `Ok(None)` rather than an error: a missing
    /// or corrupt index is treated as "not built yet", per spec.md §4.4 —
    /// the caller falls back to rebuilding from the corpus.
    pub fn load(path: &Path) -> Option<Self> {
        let mut file = std::fs::File::open(path).ok()?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).ok()?;
        let mut cursor = io::Cursor::new(buf);

        let magic = cursor.read_u32::<LittleEndian>().ok()?;
        if magic != MAGIC {
            return None;
        }
        let version = cursor.read_u32::<LittleEndian>().ok()?;
        if version != VERSION {
            return None;
        }
        let n = cursor.read_u64::<LittleEndian>().ok()? as usize;
        let d = cursor.read_u64::<LittleEndian>().ok()? as usize;
        let expected_checksum = cursor.read_u32::<LittleEndian>().ok()?;

        let mut data = Vec::with_capacity(n * d);
        let mut hasher = crc32fast::Hasher::new();
        for _ in 0..(n * d) {
            let v = cursor.read_f32::<LittleEndian>().ok()?;
            hasher.update(&v.to_le_bytes());
            data.push(v);
        }
        if hasher.finalize() != expected_checksum {
            return None;
        }

        Some(VectorIndex { n, d, data })
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Cosine similarity, 0.0 when either vector has zero magnitude (spec.md
/// §4.5: never divide by zero, treat as no similarity rather than NaN).
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
