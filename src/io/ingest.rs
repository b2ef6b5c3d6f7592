//! CSV ingest and normalization.
//!
//! This module turns heterogeneous herd exports into clean `AnimalRecord`s
//! that are safe to run the pipeline on.
//!
//! Design goals:
//! - **Strict schema** for required columns (hard failure before any stage)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (no hidden fallbacks beyond the documented
//!   date formats)

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use csv::StringRecord;

use crate::domain::{AnimalRecord, IdScheme};
use crate::error::{ErrorKind, PipelineError};
use crate::score::GenomicTable;

/// Required columns of the animal input table, validated before any
/// computation starts.
pub const REQUIRED_ANIMAL_COLUMNS: [&str; 7] = [
    "animal_id",
    "sire_id",
    "mgs_id",
    "mmgs_id",
    "birth_date",
    "dam_birth_date",
    "mgd_birth_date",
];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Ingest output: normalized records + row errors.
#[derive(Debug, Clone)]
pub struct AnimalIngest {
    pub animals: Vec<AnimalRecord>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load and normalize the animal input table.
pub fn load_animal_records(path: &Path) -> Result<AnimalIngest, PipelineError> {
    let file = File::open(path).map_err(|e| open_error(path, e))?;
    read_animal_records(file)
}

/// Reader-based ingest (the path-based entry point delegates here).
pub fn read_animal_records<R: Read>(reader: R) -> Result<AnimalIngest, PipelineError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| {
            PipelineError::new(
                ErrorKind::InvalidInput,
                format!("Failed to read animal table headers: {e}"),
            )
        })?
        .clone();
    let header_map = build_header_map(&headers);

    for column in REQUIRED_ANIMAL_COLUMNS {
        if !header_map.contains_key(column) {
            return Err(PipelineError::new(
                ErrorKind::MissingColumn,
                format!("Animal table is missing required column `{column}`."),
            ));
        }
    }

    let mut animals = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in csv_reader.records().enumerate() {
        // +2: records() starts after the header row, and CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_animal_row(&record, &header_map) {
            Ok(animal) => animals.push(animal),
            Err(message) => row_errors.push(RowError {
                line,
                id: get_optional(&record, &header_map, "animal_id").map(str::to_string),
                message,
            }),
        }
    }

    Ok(AnimalIngest {
        animals,
        row_errors,
        rows_read,
    })
}

fn parse_animal_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
) -> Result<AnimalRecord, String> {
    let id = get_optional(record, header_map, "animal_id")
        .ok_or_else(|| "Missing `animal_id` value.".to_string())?
        .to_string();

    let sire_id = get_optional(record, header_map, "sire_id").map(str::to_string);
    let mgs_id = get_optional(record, header_map, "mgs_id").map(str::to_string);
    let mmgs_id = get_optional(record, header_map, "mmgs_id").map(str::to_string);

    let sire_scheme = parse_scheme(get_optional(record, header_map, "sire_id_scheme"))?;
    let mgs_scheme = parse_scheme(get_optional(record, header_map, "mgs_id_scheme"))?;
    let mmgs_scheme = parse_scheme(get_optional(record, header_map, "mmgs_id_scheme"))?;

    let birth_year = parse_year(get_optional(record, header_map, "birth_date"))?;
    let dam_birth_year = parse_year(get_optional(record, header_map, "dam_birth_date"))?;
    let mgd_birth_year = parse_year(get_optional(record, header_map, "mgd_birth_date"))?;

    Ok(AnimalRecord {
        id,
        sire_id,
        mgs_id,
        mmgs_id,
        sire_scheme,
        mgs_scheme,
        mmgs_scheme,
        birth_year,
        dam_birth_year,
        mgd_birth_year,
    })
}

/// Load the optional genomic evaluation table.
///
/// Absence of the file is handled by the caller (the pipeline simply skips
/// the genomic merge); this function fails hard on a malformed table.
pub fn load_genomic_table(path: &Path) -> Result<GenomicTable, PipelineError> {
    let file = File::open(path).map_err(|e| open_error(path, e))?;
    read_genomic_table(file)
}

pub fn read_genomic_table<R: Read>(reader: R) -> Result<GenomicTable, PipelineError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| {
            PipelineError::new(
                ErrorKind::InvalidInput,
                format!("Failed to read genomic table headers: {e}"),
            )
        })?
        .clone();
    let header_map = build_header_map(&headers);

    let Some(&id_col) = header_map.get("animal_id") else {
        return Err(PipelineError::new(
            ErrorKind::MissingColumn,
            "Genomic table is missing required column `animal_id`.",
        ));
    };

    // Every other column is a trait column; keep original (trimmed) names.
    let trait_cols: Vec<(String, usize)> = headers
        .iter()
        .enumerate()
        .filter(|&(idx, _)| idx != id_col)
        .filter_map(|(idx, raw)| {
            let name = raw.trim().trim_start_matches('\u{feff}');
            (!name.is_empty()).then(|| (name.to_string(), idx))
        })
        .collect();

    let mut values: HashMap<String, HashMap<String, f64>> = HashMap::new();
    for result in csv_reader.records() {
        let record = result.map_err(|e| {
            PipelineError::new(
                ErrorKind::InvalidInput,
                format!("Failed to read genomic table row: {e}"),
            )
        })?;

        let Some(id) = record.get(id_col).map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };

        let row = values.entry(id.to_string()).or_default();
        for (name, idx) in &trait_cols {
            // Empty/unparseable cells are nulls: no override for that trait.
            if let Some(v) = record.get(*idx).and_then(|s| s.trim().parse::<f64>().ok()) {
                if v.is_finite() {
                    row.insert(name.clone(), v);
                }
            }
        }
    }

    Ok(GenomicTable::new(values))
}

fn open_error(path: &Path, e: std::io::Error) -> PipelineError {
    let kind = if e.kind() == std::io::ErrorKind::NotFound {
        ErrorKind::MissingInputFile
    } else {
        ErrorKind::InvalidInput
    };
    PipelineError::new(kind, format!("Failed to open '{}': {e}", path.display()))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on
    // the first header. If we don't strip it, schema validation would
    // incorrectly report missing columns.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_optional<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_scheme(cell: Option<&str>) -> Result<Option<IdScheme>, String> {
    let Some(s) = cell else { return Ok(None) };
    if s.eq_ignore_ascii_case("naab") {
        Ok(Some(IdScheme::Naab))
    } else if s.eq_ignore_ascii_case("reg") {
        Ok(Some(IdScheme::Reg))
    } else {
        Err(format!("Invalid id scheme '{s}'. Expected `naab` or `reg`."))
    }
}

/// Extract a birth year from a date cell.
///
/// Herd exports are inconsistent; we accept ISO dates plus the common
/// `DD/MM/YYYY` variants, and a bare 4-digit year. A missing cell is a
/// missing year (`Ok(None)`), which downstream treats as "no usable year"
/// in the provenance fallback chain.
fn parse_year(cell: Option<&str>) -> Result<Option<i32>, String> {
    let Some(s) = cell else { return Ok(None) };

    const FMTS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(Some(d.year()));
        }
    }

    if let Ok(year) = s.parse::<i32>() {
        if (1900..=2100).contains(&year) {
            return Ok(Some(year));
        }
    }

    Err(format!(
        "Invalid date '{s}'. Expected YYYY-MM-DD, DD/MM/YYYY, DD-MM-YYYY, YYYY/MM/DD, or a bare year."
    ))
}
