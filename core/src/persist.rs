use crate::codec;
use crate::index::{case_merge_report, normalize_case, CaseMergeReport, InvertedIndex};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: usize,
    pub num_terms: usize,
    pub avg_doc_length: f64,
    pub created_at: String,
    pub version: u32,
}

/// On-disk layout of one data directory.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn raw_index(&self) -> PathBuf { self.root.join("inverted_index.json") }
    pub fn artifact(&self) -> PathBuf { self.root.join("optimized_index.msgpack") }
    pub fn normalized_index(&self) -> PathBuf { self.root.join("normalized_index.json") }
    pub fn documents(&self) -> PathBuf { self.root.join("news.sled") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

pub fn save_raw_index(path: &Path, index: &InvertedIndex) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut w, index)?;
    w.flush()?;
    Ok(())
}

pub fn load_raw_index(path: &Path) -> Result<InvertedIndex> {
    let f = File::open(path).with_context(|| format!("open raw index {}", path.display()))?;
    let index = serde_json::from_reader(BufReader::new(f))?;
    Ok(index)
}

pub fn save_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir)?;
    }
    let mut f = File::create(path)?;
    f.write_all(bytes)?;
    Ok(())
}

pub fn load_artifact(path: &Path) -> Result<Vec<u8>> {
    let mut f = File::open(path).with_context(|| format!("open artifact {}", path.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

#[derive(Debug, Clone, Serialize)]
pub struct CompressionReport {
    pub terms: usize,
    pub documents: usize,
    pub raw_bytes: u64,
    pub artifact_bytes: u64,
    pub elapsed_secs: f64,
}

impl CompressionReport {
    pub fn ratio(&self) -> f64 {
        if self.artifact_bytes == 0 { 0.0 } else { self.raw_bytes as f64 / self.artifact_bytes as f64 }
    }
}

/// Reads the raw JSON index and writes the compressed artifact next to it.
pub fn optimize_index(raw_path: &Path, artifact_path: &Path) -> Result<CompressionReport> {
    let start = Instant::now();
    let index = load_raw_index(raw_path)?;
    let compressed = codec::compress(&index);
    let bytes = codec::encode_compressed(&compressed)?;
    save_artifact(artifact_path, &bytes)?;

    let report = CompressionReport {
        terms: compressed.index.len(),
        documents: compressed.doc_id_map.len(),
        raw_bytes: fs::metadata(raw_path)?.len(),
        artifact_bytes: bytes.len() as u64,
        elapsed_secs: start.elapsed().as_secs_f64(),
    };
    tracing::info!(
        terms = report.terms,
        documents = report.documents,
        raw_bytes = report.raw_bytes,
        artifact_bytes = report.artifact_bytes,
        ratio = report.ratio(),
        "compressed index artifact written"
    );
    Ok(report)
}

/// Case-normalizes a raw index file into `output`. Artifact and cache tiers are left untouched.
pub fn normalize_index_file(input: &Path, output: &Path) -> Result<CaseMergeReport> {
    let raw = load_raw_index(input)?;
    let merged = normalize_case(&raw);
    save_raw_index(output, &merged)?;
    let report = case_merge_report(&raw, &merged);
    tracing::info!(original = report.original_terms, normalized = report.normalized_terms, "case variants merged");
    Ok(report)
}
