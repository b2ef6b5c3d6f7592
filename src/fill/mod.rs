//! Provenance fill: one defined `TraitValue` for every (animal, role, trait).
//!
//! The fallback chain per cell:
//!
//! 1. ancestor directly identified in the lookup → `Real`
//! 2. role birth year known and covered by that role's trend → `YearEstimate`
//! 3. otherwise → `Default` (the trait's global anchor)
//!
//! The fill is trait-major and column-oriented for throughput (tens of
//! thousands of animals × dozens of traits), but the rule itself is
//! evaluated per cell with no cross-animal dependency.

use std::collections::HashMap;

use crate::domain::{
    AnchorValues, AnimalRecord, AncestorRole, ProgressSink, Provenance, TraitValue,
};
use crate::reference::TraitMap;
use crate::trend::RoleTrends;

/// Filled ancestor values: per trait, one column per role, parallel to the
/// animal input order.
#[derive(Debug, Clone)]
pub struct FilledTraits {
    animal_count: usize,
    columns: HashMap<String, [Vec<TraitValue>; 3]>,
}

impl FilledTraits {
    pub fn animal_count(&self) -> usize {
        self.animal_count
    }

    pub fn column(&self, trait_name: &str, role: AncestorRole) -> Option<&[TraitValue]> {
        self.columns
            .get(trait_name)
            .map(|roles| roles[role.index()].as_slice())
    }

    pub fn value(&self, trait_name: &str, role: AncestorRole, idx: usize) -> Option<&TraitValue> {
        self.column(trait_name, role)?.get(idx)
    }
}

/// Produce a `TraitValue` for every (animal, role, trait) combination.
///
/// Postcondition: every cell is defined with a source in
/// {Real, YearEstimate, Default} — never absent.
pub fn fill_ancestor_values(
    animals: &[AnimalRecord],
    traits: &[String],
    lookups: &HashMap<String, TraitMap>,
    trends: &RoleTrends,
    anchors: &AnchorValues,
    progress: &dyn ProgressSink,
) -> FilledTraits {
    let mut columns = HashMap::with_capacity(traits.len());

    for (done, trait_name) in traits.iter().enumerate() {
        let anchor = anchors.get(trait_name);
        let mut roles: [Vec<TraitValue>; 3] = [
            Vec::with_capacity(animals.len()),
            Vec::with_capacity(animals.len()),
            Vec::with_capacity(animals.len()),
        ];

        for role in AncestorRole::ALL {
            let trend = trends.get(role, trait_name);
            let column = &mut roles[role.index()];
            for animal in animals {
                column.push(fill_cell(animal, role, trait_name, lookups, trend, anchor));
            }
        }

        columns.insert(trait_name.clone(), roles);
        progress.report(
            100.0 * (done + 1) as f64 / traits.len() as f64,
            &format!("fill: trait {} ({}/{})", trait_name, done + 1, traits.len()),
        );
    }

    FilledTraits {
        animal_count: animals.len(),
        columns,
    }
}

fn fill_cell(
    animal: &AnimalRecord,
    role: AncestorRole,
    trait_name: &str,
    lookups: &HashMap<String, TraitMap>,
    trend: Option<&crate::trend::YearlyTrend>,
    anchor: f64,
) -> TraitValue {
    if let Some(id) = animal.ancestor_id(role) {
        if let Some(value) = lookups.get(id).and_then(|row| row.get(trait_name)) {
            return TraitValue {
                value: *value,
                source: Provenance::Real,
            };
        }
    }

    if let Some(year) = animal.role_birth_year(role) {
        if let Some(value) = trend.and_then(|t| t.value_for(year)) {
            return TraitValue {
                value,
                source: Provenance::YearEstimate,
            };
        }
    }

    TraitValue {
        value: anchor,
        source: Provenance::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NullProgress;
    use crate::trend::estimate_trend;

    fn animal(
        id: &str,
        sire_id: Option<&str>,
        birth_year: Option<i32>,
        dam_birth_year: Option<i32>,
    ) -> AnimalRecord {
        AnimalRecord {
            id: id.to_string(),
            sire_id: sire_id.map(str::to_string),
            mgs_id: None,
            mmgs_id: None,
            sire_scheme: None,
            mgs_scheme: None,
            mmgs_scheme: None,
            birth_year,
            dam_birth_year,
            mgd_birth_year: None,
        }
    }

    fn fixture() -> (Vec<AnimalRecord>, HashMap<String, TraitMap>, RoleTrends, AnchorValues) {
        let animals = vec![
            animal("A1", Some("7HO11111"), Some(2019), None), // identified sire
            animal("A2", Some("UNKNOWN"), Some(2019), None),  // year fallback
            animal("A3", None, None, None),                   // anchor fallback
        ];

        let mut lookups = HashMap::new();
        lookups.insert(
            "7HO11111".to_string(),
            HashMap::from([("NM$".to_string(), 200.0)]),
        );

        let mut trends = RoleTrends::default();
        let samples: Vec<(i32, f64)> = (0..12).map(|_| (2019, 100.0)).collect();
        trends.insert(
            AncestorRole::Sire,
            "NM$".to_string(),
            estimate_trend(&samples, 50.0).unwrap(),
        );

        let anchors = AnchorValues::new(HashMap::from([("NM$".to_string(), 50.0)]));
        (animals, lookups, trends, anchors)
    }

    #[test]
    fn every_cell_is_defined_with_the_expected_source() {
        let (animals, lookups, trends, anchors) = fixture();
        let traits = vec!["NM$".to_string()];
        let filled =
            fill_ancestor_values(&animals, &traits, &lookups, &trends, &anchors, &NullProgress);

        for role in AncestorRole::ALL {
            let col = filled.column("NM$", role).unwrap();
            assert_eq!(col.len(), animals.len());
        }

        let sire = filled.column("NM$", AncestorRole::Sire).unwrap();
        assert_eq!(sire[0], TraitValue { value: 200.0, source: Provenance::Real });
        assert_eq!(sire[1], TraitValue { value: 100.0, source: Provenance::YearEstimate });
        assert_eq!(sire[2], TraitValue { value: 50.0, source: Provenance::Default });

        // No mgs trend and no dam birth years: everything defaults.
        let mgs = filled.column("NM$", AncestorRole::Mgs).unwrap();
        assert!(mgs.iter().all(|v| v.source == Provenance::Default && v.value == 50.0));
    }

    #[test]
    fn year_outside_the_trend_range_falls_to_the_anchor() {
        let (mut animals, lookups, trends, anchors) = fixture();
        animals[1].birth_year = Some(1990); // trend only covers 2019
        let traits = vec!["NM$".to_string()];
        let filled =
            fill_ancestor_values(&animals, &traits, &lookups, &trends, &anchors, &NullProgress);
        let sire = filled.column("NM$", AncestorRole::Sire).unwrap();
        assert_eq!(sire[1].source, Provenance::Default);
        assert_eq!(sire[1].value, 50.0);
    }
}
