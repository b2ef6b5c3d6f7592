//! Composite index computation and population ranking.
//!
//! Each trait score is standardized by a reference standard deviation,
//! weighted by the active profile, and summed into one index per animal:
//!
//! ```text
//! index = Σ over profile traits of (score[trait] / ref_sd[trait]) · weight[trait]
//! ```
//!
//! Missing/NaN scores contribute 0 (fail-soft) so a population-wide ranking
//! is always producible even with partial data; profile traits without a
//! reference SD are silently skipped.

pub mod profiles;

pub use profiles::*;

use std::collections::HashMap;

use crate::domain::{RankedResult, WeightProfile};
use crate::score::ScoreTable;

/// Built-in reference standard deviations per trait.
///
/// These standardize heterogeneous trait scales before weighting. Values
/// approximate current US Holstein population spreads.
pub fn default_reference_sd() -> HashMap<String, f64> {
    HashMap::from([
        ("NM$".to_string(), 178.0),
        ("Milk".to_string(), 778.0),
        ("Fat".to_string(), 31.0),
        ("Protein".to_string(), 22.0),
        ("PL".to_string(), 2.2),
        ("SCS".to_string(), 0.14),
        ("DPR".to_string(), 1.6),
    ])
}

/// Compute each animal's index and rank the population.
///
/// Sort is descending by index and stable, so animals with equal indexes
/// keep their original input order; ranks are dense and 1-based.
pub fn rank_population(
    table: &ScoreTable,
    profile: &WeightProfile,
    reference_sd: &HashMap<String, f64>,
) -> Vec<RankedResult> {
    let n = table.animal_ids.len();
    let mut indexes = vec![0.0f64; n];

    for (trait_name, weight) in &profile.weights {
        // Traits without a reference SD are skipped, not an error.
        let Some(&sd) = reference_sd.get(trait_name) else {
            continue;
        };
        if sd == 0.0 || !sd.is_finite() {
            continue;
        }
        let Some(column) = table.column(trait_name) else {
            continue;
        };
        for (idx, score) in column.iter().enumerate() {
            if score.value.is_finite() {
                indexes[idx] += score.value / sd * weight;
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    // `sort_by` is stable; equal indexes compare Equal and keep input order.
    order.sort_by(|&a, &b| {
        indexes[b]
            .partial_cmp(&indexes[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    order
        .into_iter()
        .enumerate()
        .map(|(pos, idx)| RankedResult {
            animal_id: table.animal_ids[idx].clone(),
            index: indexes[idx],
            rank: pos + 1,
        })
        .collect()
}
