//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during estimation
//! - exported to CSV/JSON
//! - reloaded later by downstream reporting

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Identifier scheme used to key ancestor bulls in the reference table.
///
/// The legacy classifier infers the scheme from string length; an explicit
/// per-column tag on the animal table overrides it when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    /// NAAB codes (short controlled format, e.g. `7HO12198`).
    Naab,
    /// Registration numbers (long numeric/alphanumeric identifiers).
    Reg,
}

/// Maximum identifier length treated as NAAB by the legacy classifier.
pub const NAAB_MAX_LEN: usize = 10;

impl IdScheme {
    /// Legacy length-based classifier, kept byte-for-byte compatible:
    /// identifiers of at most 10 characters are NAAB, longer ones REG.
    pub fn classify(id: &str) -> Self {
        if id.len() <= NAAB_MAX_LEN {
            IdScheme::Naab
        } else {
            IdScheme::Reg
        }
    }

    pub fn column_name(self) -> &'static str {
        match self {
            IdScheme::Naab => "BULL NAAB",
            IdScheme::Reg => "BULL REG",
        }
    }
}

/// The three ancestor roles used in pedigree scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AncestorRole {
    /// Father.
    Sire,
    /// Maternal grandsire.
    Mgs,
    /// Maternal great-grandsire (maternal grandsire's sire, through the mgd).
    Mmgs,
}

impl AncestorRole {
    pub const ALL: [AncestorRole; 3] = [AncestorRole::Sire, AncestorRole::Mgs, AncestorRole::Mmgs];

    /// Stable index used for role-keyed column storage.
    pub fn index(self) -> usize {
        match self {
            AncestorRole::Sire => 0,
            AncestorRole::Mgs => 1,
            AncestorRole::Mmgs => 2,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AncestorRole::Sire => "sire",
            AncestorRole::Mgs => "mgs",
            AncestorRole::Mmgs => "mmgs",
        }
    }
}

/// One animal as loaded from the input table. Read-only to the engine.
///
/// Birth years are derived from dates at ingest; the year that indexes a
/// role's trend curve differs per role (see [`AnimalRecord::role_birth_year`]).
#[derive(Debug, Clone)]
pub struct AnimalRecord {
    pub id: String,
    pub sire_id: Option<String>,
    pub mgs_id: Option<String>,
    pub mmgs_id: Option<String>,

    /// Explicit id-scheme tags (optional columns); `None` falls back to the
    /// legacy length classifier.
    pub sire_scheme: Option<IdScheme>,
    pub mgs_scheme: Option<IdScheme>,
    pub mmgs_scheme: Option<IdScheme>,

    pub birth_year: Option<i32>,
    pub dam_birth_year: Option<i32>,
    pub mgd_birth_year: Option<i32>,
}

impl AnimalRecord {
    pub fn ancestor_id(&self, role: AncestorRole) -> Option<&str> {
        match role {
            AncestorRole::Sire => self.sire_id.as_deref(),
            AncestorRole::Mgs => self.mgs_id.as_deref(),
            AncestorRole::Mmgs => self.mmgs_id.as_deref(),
        }
    }

    pub fn ancestor_scheme(&self, role: AncestorRole) -> Option<IdScheme> {
        match role {
            AncestorRole::Sire => self.sire_scheme,
            AncestorRole::Mgs => self.mgs_scheme,
            AncestorRole::Mmgs => self.mmgs_scheme,
        }
    }

    /// The birth-year field that indexes the given role's trend curve:
    /// the animal's own birth year for the sire, the dam's for the mgs, and
    /// the mgd's for the mmgs.
    pub fn role_birth_year(&self, role: AncestorRole) -> Option<i32> {
        match role {
            AncestorRole::Sire => self.birth_year,
            AncestorRole::Mgs => self.dam_birth_year,
            AncestorRole::Mmgs => self.mgd_birth_year,
        }
    }
}

/// Provenance of an ancestor-level trait value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// The ancestor was directly identified in the reference table.
    Real,
    /// Substituted from the yearly trend curve for the role's birth year.
    YearEstimate,
    /// Substituted from the global default anchor for the trait.
    Default,
}

impl Provenance {
    pub fn label(self) -> &'static str {
        match self {
            Provenance::Real => "Real",
            Provenance::YearEstimate => "YearEstimate",
            Provenance::Default => "Default",
        }
    }
}

/// Provenance of a score-level value (after the genomic merge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreSource {
    /// Derived from the fixed-weight pedigree blend.
    Pedigree,
    /// Replaced by a genomic evaluation value.
    Genomic,
}

impl ScoreSource {
    pub fn label(self) -> &'static str {
        match self {
            ScoreSource::Pedigree => "Pedigree",
            ScoreSource::Genomic => "Genomic",
        }
    }
}

/// A single ancestor-level trait value; always defined after the fill stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraitValue {
    pub value: f64,
    pub source: Provenance,
}

/// A per-animal per-trait composite score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraitScore {
    pub value: f64,
    pub source: ScoreSource,
}

/// Final ranking entry: dense 1-based rank, ties broken by stable input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub animal_id: String,
    pub index: f64,
    pub rank: usize,
}

/// Global default anchor values per trait, loaded once per run from the
/// sentinel reference row and passed explicitly (never module-level state).
#[derive(Debug, Clone, Default)]
pub struct AnchorValues(HashMap<String, f64>);

impl AnchorValues {
    pub fn new(values: HashMap<String, f64>) -> Self {
        Self(values)
    }

    /// Anchor for a trait. Completeness over the requested trait set is
    /// enforced at load time; an unknown trait maps to 0.0.
    pub fn get(&self, trait_name: &str) -> f64 {
        self.0.get(trait_name).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, trait_name: &str) -> bool {
        self.0.contains_key(trait_name)
    }
}

/// A named, user-editable vector of per-trait signed weights.
///
/// Invariant (enforced at save time): `sum(|weight|) == 100 ± 1e-4`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightProfile {
    pub name: String,
    pub weights: BTreeMap<String, f64>,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub animals_path: PathBuf,
    pub reference_path: PathBuf,
    pub genomic_path: Option<PathBuf>,
    pub profiles_path: PathBuf,

    /// Requested trait names, in output order.
    pub traits: Vec<String>,
    /// Weight profile name used by the ranking stage.
    pub profile: String,

    pub top_n: usize,
    pub export_path: Option<PathBuf>,
    /// Include per-role ancestor source columns in the export.
    pub wide_export: bool,
}

/// Default trait set when the caller does not narrow the request.
pub const DEFAULT_TRAITS: [&str; 7] = ["NM$", "Milk", "Fat", "Protein", "PL", "SCS", "DPR"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_splits_on_ten_characters() {
        assert_eq!(IdScheme::classify("7HO12198"), IdScheme::Naab);
        assert_eq!(IdScheme::classify("999HO99999"), IdScheme::Naab); // exactly 10
        assert_eq!(IdScheme::classify("HOUSA000123456789"), IdScheme::Reg);
    }

    #[test]
    fn role_birth_year_uses_the_matching_field() {
        let a = AnimalRecord {
            id: "A1".to_string(),
            sire_id: None,
            mgs_id: None,
            mmgs_id: None,
            sire_scheme: None,
            mgs_scheme: None,
            mmgs_scheme: None,
            birth_year: Some(2021),
            dam_birth_year: Some(2018),
            mgd_birth_year: Some(2014),
        };
        assert_eq!(a.role_birth_year(AncestorRole::Sire), Some(2021));
        assert_eq!(a.role_birth_year(AncestorRole::Mgs), Some(2018));
        assert_eq!(a.role_birth_year(AncestorRole::Mmgs), Some(2014));
    }
}
