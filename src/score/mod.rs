//! Pedigree scoring and the genomic overlay.
//!
//! The pedigree score is a fixed-weight blend of the three ancestor values
//! plus an unconditional outgroup term anchored at the trait default:
//!
//! ```text
//! score = 0.5·sire + 0.25·mgs + 0.125·mmgs + 0.125·anchor
//! ```
//!
//! The weights are constants by design; user-configurable weighting happens
//! later, at the index-ranking stage, through a different mechanism.

use std::collections::HashMap;

use crate::domain::{AnchorValues, AnimalRecord, AncestorRole, ScoreSource, TraitScore};
use crate::error::{ErrorKind, PipelineError};
use crate::fill::FilledTraits;

pub const SIRE_WEIGHT: f64 = 0.5;
pub const MGS_WEIGHT: f64 = 0.25;
pub const MMGS_WEIGHT: f64 = 0.125;
/// Fixed outgroup contribution, added even when all three ancestor values
/// are themselves `Real`.
pub const ANCHOR_WEIGHT: f64 = 0.125;

/// Per-animal per-trait composite scores, in animal input order.
#[derive(Debug, Clone)]
pub struct ScoreTable {
    pub animal_ids: Vec<String>,
    pub traits: Vec<String>,
    scores: HashMap<String, Vec<TraitScore>>,
}

impl ScoreTable {
    /// Assemble a table from per-trait columns (all parallel to `animal_ids`).
    pub fn from_columns(
        animal_ids: Vec<String>,
        columns: Vec<(String, Vec<TraitScore>)>,
    ) -> Self {
        Self {
            animal_ids,
            traits: columns.iter().map(|(name, _)| name.clone()).collect(),
            scores: columns.into_iter().collect(),
        }
    }

    pub fn column(&self, trait_name: &str) -> Option<&[TraitScore]> {
        self.scores.get(trait_name).map(Vec::as_slice)
    }

    pub fn score(&self, trait_name: &str, idx: usize) -> Option<&TraitScore> {
        self.column(trait_name)?.get(idx)
    }
}

/// Blend the filled ancestor values into one score per (animal, trait).
pub fn score_pedigree(
    animals: &[AnimalRecord],
    traits: &[String],
    filled: &FilledTraits,
    anchors: &AnchorValues,
) -> Result<ScoreTable, PipelineError> {
    let mut scores = HashMap::with_capacity(traits.len());

    for trait_name in traits {
        let anchor = anchors.get(trait_name);
        let sire = role_column(filled, trait_name, AncestorRole::Sire)?;
        let mgs = role_column(filled, trait_name, AncestorRole::Mgs)?;
        let mmgs = role_column(filled, trait_name, AncestorRole::Mmgs)?;

        let mut column = Vec::with_capacity(animals.len());
        for idx in 0..animals.len() {
            let value = SIRE_WEIGHT * sire[idx].value
                + MGS_WEIGHT * mgs[idx].value
                + MMGS_WEIGHT * mmgs[idx].value
                + ANCHOR_WEIGHT * anchor;
            column.push(TraitScore {
                value,
                source: ScoreSource::Pedigree,
            });
        }
        scores.insert(trait_name.clone(), column);
    }

    Ok(ScoreTable {
        animal_ids: animals.iter().map(|a| a.id.clone()).collect(),
        traits: traits.to_vec(),
        scores,
    })
}

fn role_column<'a>(
    filled: &'a FilledTraits,
    trait_name: &str,
    role: AncestorRole,
) -> Result<&'a [crate::domain::TraitValue], PipelineError> {
    filled.column(trait_name, role).ok_or_else(|| {
        PipelineError::new(
            ErrorKind::InvalidInput,
            format!(
                "No filled {} column for trait '{trait_name}' (fill stage incomplete).",
                role.display_name()
            ),
        )
    })
}

/// Genomic evaluation values, keyed animal id → trait → value.
#[derive(Debug, Clone, Default)]
pub struct GenomicTable {
    values: HashMap<String, HashMap<String, f64>>,
}

impl GenomicTable {
    pub fn new(values: HashMap<String, HashMap<String, f64>>) -> Self {
        Self { values }
    }

    pub fn get(&self, animal_id: &str, trait_name: &str) -> Option<f64> {
        self.values.get(animal_id)?.get(trait_name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Overlay genomic values onto the pedigree scores.
///
/// Every (animal, trait) with a non-null genomic value takes that value with
/// `ScoreSource::Genomic`; everything else keeps its pedigree score. The
/// merge is idempotent: applying it twice with the same table changes
/// nothing the second time.
pub fn merge_genomic(table: &mut ScoreTable, genomic: &GenomicTable) {
    let animal_ids = table.animal_ids.clone();
    for trait_name in table.traits.clone() {
        let Some(column) = table.scores.get_mut(&trait_name) else {
            continue;
        };
        for (idx, id) in animal_ids.iter().enumerate() {
            if let Some(value) = genomic.get(id, &trait_name) {
                if value.is_finite() {
                    column[idx] = TraitScore {
                        value,
                        source: ScoreSource::Genomic,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NullProgress, Provenance};
    use crate::fill::fill_ancestor_values;
    use crate::trend::RoleTrends;

    fn animal(id: &str, sire: Option<&str>, mgs: Option<&str>, mmgs: Option<&str>) -> AnimalRecord {
        AnimalRecord {
            id: id.to_string(),
            sire_id: sire.map(str::to_string),
            mgs_id: mgs.map(str::to_string),
            mmgs_id: mmgs.map(str::to_string),
            sire_scheme: None,
            mgs_scheme: None,
            mmgs_scheme: None,
            birth_year: None,
            dam_birth_year: None,
            mgd_birth_year: None,
        }
    }

    fn scored_fixture() -> ScoreTable {
        let animals = vec![animal("A1", Some("S1"), Some("G1"), Some("GG1"))];
        let mut lookups = HashMap::new();
        lookups.insert("S1".to_string(), HashMap::from([("NM$".to_string(), 200.0)]));
        lookups.insert("G1".to_string(), HashMap::from([("NM$".to_string(), 120.0)]));
        lookups.insert("GG1".to_string(), HashMap::from([("NM$".to_string(), 80.0)]));
        let anchors = AnchorValues::new(HashMap::from([("NM$".to_string(), 50.0)]));
        let traits = vec!["NM$".to_string()];
        let filled = fill_ancestor_values(
            &animals,
            &traits,
            &lookups,
            &RoleTrends::default(),
            &anchors,
            &NullProgress,
        );
        // All three ancestor values are Real here.
        assert!(AncestorRole::ALL.iter().all(|&r| {
            filled.value("NM$", r, 0).unwrap().source == Provenance::Real
        }));
        score_pedigree(&animals, &traits, &filled, &anchors).unwrap()
    }

    #[test]
    fn anchor_term_applies_even_with_all_real_ancestors() {
        let table = scored_fixture();
        // 0.5·200 + 0.25·120 + 0.125·80 + 0.125·50 = 100 + 30 + 10 + 6.25
        let score = table.score("NM$", 0).unwrap();
        assert!((score.value - 146.25).abs() < 1e-12);
        assert_eq!(score.source, ScoreSource::Pedigree);
    }

    #[test]
    fn genomic_merge_replaces_and_is_idempotent() {
        let mut table = scored_fixture();
        let genomic = GenomicTable::new(HashMap::from([(
            "A1".to_string(),
            HashMap::from([("NM$".to_string(), 512.0)]),
        )]));

        merge_genomic(&mut table, &genomic);
        let once = table.clone();
        assert_eq!(
            *once.score("NM$", 0).unwrap(),
            TraitScore { value: 512.0, source: ScoreSource::Genomic }
        );

        merge_genomic(&mut table, &genomic);
        assert_eq!(table.score("NM$", 0).unwrap(), once.score("NM$", 0).unwrap());
        assert_eq!(table.animal_ids, once.animal_ids);
    }

    #[test]
    fn animals_absent_from_the_genomic_table_keep_pedigree_scores() {
        let mut table = scored_fixture();
        let genomic = GenomicTable::new(HashMap::from([(
            "SOMEONE_ELSE".to_string(),
            HashMap::from([("NM$".to_string(), 1.0)]),
        )]));
        merge_genomic(&mut table, &genomic);
        let score = table.score("NM$", 0).unwrap();
        assert_eq!(score.source, ScoreSource::Pedigree);
        assert!((score.value - 146.25).abs() < 1e-12);
    }
}
