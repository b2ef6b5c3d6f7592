//! Batched key/value access into the reference trait table.
//!
//! Ancestor bulls are keyed by two identifier schemes (`BULL NAAB` /
//! `BULL REG`). The lookup issues two sequential batched passes, one per
//! scheme, chunked to bound query size. Identifiers that are not found are
//! simply absent from the result map — the caller must treat absence as
//! "unidentified ancestor", never as an error. A store failure, by contrast,
//! aborts the whole lookup.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{AnchorValues, AnimalRecord, AncestorRole, IdScheme, ProgressSink};
use crate::error::{ErrorKind, PipelineError};

/// Maximum identifiers per batched query.
pub const BATCH_SIZE: usize = 500;

/// Sentinel reference row supplying the global default anchor values.
pub const ANCHOR_SENTINEL_ID: &str = "999HO99999";

/// Trait-name → raw value, as stored for one ancestor.
pub type TraitMap = HashMap<String, f64>;

/// Read-only queryable store of ancestor trait records.
///
/// Implementations are shared read-only across the pipeline; `fetch` must be
/// side-effect free. A returned error means the whole lookup stage failed.
pub trait ReferenceStore {
    fn fetch(
        &self,
        scheme: IdScheme,
        ids: &[String],
        traits: &[String],
    ) -> Result<HashMap<String, TraitMap>, PipelineError>;
}

/// One identifier to resolve, with an optional explicit scheme tag.
///
/// When the tag is absent we fall back to the legacy length classifier
/// ([`IdScheme::classify`]).
#[derive(Debug, Clone)]
pub struct AncestorQuery {
    pub id: String,
    pub scheme: Option<IdScheme>,
}

impl AncestorQuery {
    pub fn scheme(&self) -> IdScheme {
        self.scheme.unwrap_or_else(|| IdScheme::classify(&self.id))
    }
}

/// Collect the de-duplicated set of ancestor identifiers to resolve,
/// preserving first-seen order for deterministic batching.
pub fn ancestor_queries(animals: &[AnimalRecord]) -> Vec<AncestorQuery> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for animal in animals {
        for role in AncestorRole::ALL {
            if let Some(id) = animal.ancestor_id(role) {
                if seen.insert(id) {
                    out.push(AncestorQuery {
                        id: id.to_string(),
                        scheme: animal.ancestor_scheme(role),
                    });
                }
            }
        }
    }
    out
}

/// Resolve ancestor identifiers against the store.
///
/// Two sequential passes (NAAB then REG), each chunked to [`BATCH_SIZE`]
/// identifiers. Progress is reported once per completed chunk.
pub fn lookup_traits(
    store: &dyn ReferenceStore,
    queries: &[AncestorQuery],
    traits: &[String],
    progress: &dyn ProgressSink,
) -> Result<HashMap<String, TraitMap>, PipelineError> {
    let mut naab_ids = Vec::new();
    let mut reg_ids = Vec::new();
    for q in queries {
        match q.scheme() {
            IdScheme::Naab => naab_ids.push(q.id.clone()),
            IdScheme::Reg => reg_ids.push(q.id.clone()),
        }
    }

    let total_chunks = chunk_count(naab_ids.len()) + chunk_count(reg_ids.len());
    let mut done_chunks = 0usize;
    let mut found: HashMap<String, TraitMap> = HashMap::new();

    for (scheme, ids) in [(IdScheme::Naab, &naab_ids), (IdScheme::Reg, &reg_ids)] {
        for chunk in ids.chunks(BATCH_SIZE) {
            let batch = store.fetch(scheme, chunk, traits)?;
            found.extend(batch);
            done_chunks += 1;
            if total_chunks > 0 {
                progress.report(
                    100.0 * done_chunks as f64 / total_chunks as f64,
                    &format!("reference lookup: chunk {done_chunks}/{total_chunks}"),
                );
            }
        }
    }

    Ok(found)
}

fn chunk_count(n: usize) -> usize {
    n.div_ceil(BATCH_SIZE)
}

/// Load the global default anchor values from the sentinel row.
///
/// Every requested trait must have an anchor; a gap here would leave the
/// provenance fallback chain without its terminal value.
pub fn load_anchor_values(
    store: &dyn ReferenceStore,
    traits: &[String],
) -> Result<AnchorValues, PipelineError> {
    let sentinel = vec![ANCHOR_SENTINEL_ID.to_string()];
    let mut result = store.fetch(IdScheme::classify(ANCHOR_SENTINEL_ID), &sentinel, traits)?;
    let row = result.remove(ANCHOR_SENTINEL_ID).ok_or_else(|| {
        PipelineError::new(
            ErrorKind::ReferenceLookup,
            format!("Sentinel row '{ANCHOR_SENTINEL_ID}' not found in reference table."),
        )
    })?;

    for t in traits {
        if !row.contains_key(t) {
            return Err(PipelineError::new(
                ErrorKind::ReferenceLookup,
                format!("Sentinel row '{ANCHOR_SENTINEL_ID}' has no anchor value for trait '{t}'."),
            ));
        }
    }

    Ok(AnchorValues::new(row))
}

/// In-memory reference store backed by a CSV export of the reference table.
///
/// Rows are indexed under both schemes at load time so `fetch` is a plain
/// map probe per identifier.
pub struct CsvReferenceStore {
    naab: HashMap<String, TraitMap>,
    reg: HashMap<String, TraitMap>,
}

impl CsvReferenceStore {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path).map_err(|e| {
            let kind = if e.kind() == std::io::ErrorKind::NotFound {
                ErrorKind::MissingInputFile
            } else {
                ErrorKind::ReferenceLookup
            };
            PipelineError::new(
                kind,
                format!("Failed to open reference table '{}': {e}", path.display()),
            )
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| {
                PipelineError::new(
                    ErrorKind::ReferenceLookup,
                    format!("Failed to read reference table headers: {e}"),
                )
            })?
            .clone();

        let mut naab_col = None;
        let mut reg_col = None;
        let mut trait_cols: Vec<(String, usize)> = Vec::new();
        for (idx, raw) in headers.iter().enumerate() {
            let name = raw.trim().trim_start_matches('\u{feff}');
            if name.eq_ignore_ascii_case(IdScheme::Naab.column_name()) {
                naab_col = Some(idx);
            } else if name.eq_ignore_ascii_case(IdScheme::Reg.column_name()) {
                reg_col = Some(idx);
            } else if !name.is_empty() {
                trait_cols.push((name.to_string(), idx));
            }
        }

        let naab_col = naab_col.ok_or_else(|| missing_key_column(IdScheme::Naab))?;
        let reg_col = reg_col.ok_or_else(|| missing_key_column(IdScheme::Reg))?;

        let mut naab: HashMap<String, TraitMap> = HashMap::new();
        let mut reg: HashMap<String, TraitMap> = HashMap::new();

        for result in csv_reader.records() {
            let record: StringRecord = result.map_err(|e| {
                PipelineError::new(
                    ErrorKind::ReferenceLookup,
                    format!("Failed to read reference table row: {e}"),
                )
            })?;

            let mut values = TraitMap::new();
            for (name, idx) in &trait_cols {
                if let Some(v) = record.get(*idx).and_then(parse_cell_f64) {
                    values.insert(name.clone(), v);
                }
            }

            if let Some(id) = non_empty(record.get(naab_col)) {
                naab.insert(id.to_string(), values.clone());
            }
            if let Some(id) = non_empty(record.get(reg_col)) {
                reg.insert(id.to_string(), values);
            }
        }

        Ok(Self { naab, reg })
    }
}

impl ReferenceStore for CsvReferenceStore {
    fn fetch(
        &self,
        scheme: IdScheme,
        ids: &[String],
        traits: &[String],
    ) -> Result<HashMap<String, TraitMap>, PipelineError> {
        let table = match scheme {
            IdScheme::Naab => &self.naab,
            IdScheme::Reg => &self.reg,
        };

        let mut out = HashMap::new();
        for id in ids {
            if let Some(row) = table.get(id) {
                let filtered: TraitMap = traits
                    .iter()
                    .filter_map(|t| row.get(t).map(|v| (t.clone(), *v)))
                    .collect();
                out.insert(id.clone(), filtered);
            }
        }
        Ok(out)
    }
}

fn missing_key_column(scheme: IdScheme) -> PipelineError {
    PipelineError::new(
        ErrorKind::MissingColumn,
        format!("Reference table is missing key column `{}`.", scheme.column_name()),
    )
}

fn non_empty(cell: Option<&str>) -> Option<&str> {
    cell.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_cell_f64(cell: &str) -> Option<f64> {
    let v = cell.trim().parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
