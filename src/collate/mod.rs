//! Bounded-parallel collation of auxiliary report tables.
//!
//! This sits *around* the estimation pipeline, not inside it: assembling
//! unrelated report tables from disjoint source files shares no mutable
//! state, so it can fan out over a small worker pool. Within the pipeline
//! proper no such parallelism exists — the trend curves are a hard
//! dependency of the fill stage.
//!
//! File reads are cached so the same file is never parsed twice within one
//! run, even when several tables draw on it.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rayon::prelude::*;

use crate::error::{ErrorKind, PipelineError};

/// Worker pool size for collation.
pub const COLLATE_THREADS: usize = 6;

/// One requested report table: a named column projection of a source file.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: String,
    pub source: PathBuf,
    pub columns: Vec<String>,
}

/// An assembled report table.
#[derive(Debug, Clone)]
pub struct CollatedTable {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A parsed source file held by the cache.
#[derive(Debug)]
pub struct CachedFile {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CachedFile {
    pub fn from_reader<R: Read>(reader: R, label: &str) -> Result<Self, PipelineError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let header: Vec<String> = csv_reader
            .headers()
            .map_err(|e| {
                PipelineError::new(
                    ErrorKind::InvalidInput,
                    format!("Failed to read headers of '{label}': {e}"),
                )
            })?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for result in csv_reader.records() {
            let record = result.map_err(|e| {
                PipelineError::new(
                    ErrorKind::InvalidInput,
                    format!("Failed to read row of '{label}': {e}"),
                )
            })?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { header, rows })
    }
}

/// Parse-once cache of source files, shared across collation workers.
#[derive(Default)]
pub struct FileCache {
    inner: Mutex<HashMap<PathBuf, Arc<CachedFile>>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a parsed file, reading it on first access.
    ///
    /// Parsing happens under the map lock; that serializes first reads but
    /// keeps the never-parse-twice guarantee trivially true.
    pub fn get(&self, path: &Path) -> Result<Arc<CachedFile>, PipelineError> {
        let mut map = self.inner.lock().expect("file cache lock poisoned");
        if let Some(cached) = map.get(path) {
            return Ok(Arc::clone(cached));
        }

        let file = File::open(path).map_err(|e| {
            let kind = if e.kind() == std::io::ErrorKind::NotFound {
                ErrorKind::MissingInputFile
            } else {
                ErrorKind::InvalidInput
            };
            PipelineError::new(kind, format!("Failed to open '{}': {e}", path.display()))
        })?;
        let parsed = Arc::new(CachedFile::from_reader(file, &path.display().to_string())?);
        map.insert(path.to_path_buf(), Arc::clone(&parsed));
        Ok(parsed)
    }
}

/// Project the named columns out of a parsed file (case-insensitive match).
pub fn project_columns(
    file: &CachedFile,
    columns: &[String],
    label: &str,
) -> Result<Vec<Vec<String>>, PipelineError> {
    let indexes: Vec<usize> = columns
        .iter()
        .map(|wanted| {
            file.header
                .iter()
                .position(|h| h.eq_ignore_ascii_case(wanted))
                .ok_or_else(|| {
                    PipelineError::new(
                        ErrorKind::MissingColumn,
                        format!("Table '{label}' has no column `{wanted}`."),
                    )
                })
        })
        .collect::<Result<_, _>>()?;

    Ok(file
        .rows
        .iter()
        .map(|row| {
            indexes
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect()
        })
        .collect())
}

/// Assemble all requested tables on a bounded worker pool.
///
/// Output order matches the spec order regardless of worker scheduling.
pub fn collate_tables(specs: &[TableSpec]) -> Result<Vec<CollatedTable>, PipelineError> {
    let cache = FileCache::new();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(COLLATE_THREADS)
        .build()
        .map_err(|e| {
            PipelineError::new(
                ErrorKind::InvalidInput,
                format!("Failed to start collation worker pool: {e}"),
            )
        })?;

    pool.install(|| {
        specs
            .par_iter()
            .map(|spec| {
                let file = cache.get(&spec.source)?;
                let rows = project_columns(&file, &spec.columns, &spec.name)?;
                Ok(CollatedTable {
                    name: spec.name.clone(),
                    header: spec.columns.clone(),
                    rows,
                })
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_file() -> CachedFile {
        let csv = "id,herd,NM$\nA1,north,120\nA2,south,80\n";
        CachedFile::from_reader(csv.as_bytes(), "sample").unwrap()
    }

    #[test]
    fn projection_selects_columns_case_insensitively() {
        let file = sample_file();
        let rows = project_columns(
            &file,
            &["nm$".to_string(), "id".to_string()],
            "sample",
        )
        .unwrap();
        assert_eq!(rows, vec![vec!["120", "A1"], vec!["80", "A2"]]);
    }

    #[test]
    fn projection_fails_on_unknown_column() {
        let err = project_columns(&sample_file(), &["nope".to_string()], "sample").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingColumn);
    }

    #[test]
    fn cache_returns_the_same_parse_for_repeated_reads() {
        let path = std::env::temp_dir().join("pedigree-collate-cache-test.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "id,v").unwrap();
        writeln!(f, "A,1").unwrap();
        drop(f);

        let cache = FileCache::new();
        let first = cache.get(&path).unwrap();
        let second = cache.get(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn collation_preserves_spec_order() {
        let path = std::env::temp_dir().join("pedigree-collate-order-test.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "id,herd,NM$").unwrap();
        writeln!(f, "A1,north,120").unwrap();
        drop(f);

        let specs: Vec<TableSpec> = (0..8)
            .map(|i| TableSpec {
                name: format!("t{i}"),
                source: path.clone(),
                columns: vec!["id".to_string()],
            })
            .collect();
        let tables = collate_tables(&specs).unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7"]);
        let _ = std::fs::remove_file(&path);
    }
}
