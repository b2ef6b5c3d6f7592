//! Yearly trend estimation.
//!
//! For each trait and each ancestor role we derive a birth-year → mean-value
//! curve from the animals whose ancestor is directly identified. The curve
//! spans the identified animals' full birth-year range with no gaps, so the
//! fill stage can substitute a year estimate wherever a real value is
//! missing.
//!
//! The rules, applied independently per (role, trait):
//!
//! - a year is a usable anchor point only if it holds at least
//!   [`MIN_YEAR_SAMPLES`] identified values;
//! - with two or more usable years, an OLS line over the usable yearly means
//!   predicts *every* year (usable years store the regression prediction,
//!   not the raw bucket mean);
//! - with exactly one usable year, a two-point line toward the default
//!   anchor interpolates below the usable year and extrapolates at/after it;
//! - with none, every year takes the default anchor.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{AnchorValues, AnimalRecord, AncestorRole};
use crate::math::fit_line;
use crate::reference::TraitMap;

/// Minimum identified values a year needs to count as a usable anchor point.
pub const MIN_YEAR_SAMPLES: usize = 10;

/// One year on a trend curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearPoint {
    pub mean: f64,
    pub sample_count: usize,
    /// True for every year that was not itself a usable anchor point.
    pub interpolated: bool,
}

/// A complete year → mean curve for one trait. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct YearlyTrend {
    years: BTreeMap<i32, YearPoint>,
}

impl YearlyTrend {
    pub fn value_for(&self, year: i32) -> Option<f64> {
        self.years.get(&year).map(|p| p.mean)
    }

    pub fn point(&self, year: i32) -> Option<&YearPoint> {
        self.years.get(&year)
    }

    pub fn year_range(&self) -> Option<(i32, i32)> {
        let min = *self.years.keys().next()?;
        let max = *self.years.keys().next_back()?;
        Some((min, max))
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

/// Estimate a trend curve from `(birth_year, identified_value)` samples.
///
/// Returns `None` when there are no samples at all; the fill stage then
/// falls through to the default anchor directly.
pub fn estimate_trend(samples: &[(i32, f64)], default_anchor: f64) -> Option<YearlyTrend> {
    if samples.is_empty() {
        return None;
    }

    // 1) Bucket by birth year: count + mean per year.
    let mut buckets: BTreeMap<i32, (usize, f64)> = BTreeMap::new();
    for &(year, value) in samples {
        let entry = buckets.entry(year).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += value;
    }

    let min_year = *buckets.keys().next()?;
    let max_year = *buckets.keys().next_back()?;

    // 2) Usable anchor years.
    let valid: Vec<(i32, f64)> = buckets
        .iter()
        .filter(|(_, (count, _))| *count >= MIN_YEAR_SAMPLES)
        .map(|(year, (count, sum))| (*year, sum / *count as f64))
        .collect();

    let sample_count = |year: i32| buckets.get(&year).map(|(c, _)| *c).unwrap_or(0);
    let mut years = BTreeMap::new();

    match valid.len() {
        0 => {
            // 3a) No usable year: flat default-anchor curve.
            for year in min_year..=max_year {
                years.insert(
                    year,
                    YearPoint {
                        mean: default_anchor,
                        sample_count: sample_count(year),
                        interpolated: true,
                    },
                );
            }
        }
        1 => {
            // 3b) One usable year: two-point line toward the default anchor.
            // The anchor point sits at the minimum year, unless the usable
            // year *is* the minimum, in which case it sits one year after.
            let (valid_year, valid_mean) = valid[0];
            let boundary = if valid_year == min_year { valid_year + 1 } else { min_year };
            let slope = (valid_mean - default_anchor) / f64::from(valid_year - boundary);

            for year in min_year..=max_year {
                let mean = valid_mean + slope * f64::from(year - valid_year);
                years.insert(
                    year,
                    YearPoint {
                        mean,
                        sample_count: sample_count(year),
                        interpolated: year != valid_year,
                    },
                );
            }
        }
        _ => {
            // 3c) Two or more usable years: OLS of yearly mean on year.
            // Usable years keep the regression prediction, not the raw mean.
            let points: Vec<(f64, f64)> = valid
                .iter()
                .map(|&(year, mean)| (f64::from(year), mean))
                .collect();
            // Usable years are distinct by construction, so the fit only
            // fails on pathological input; fall back to a flat mean line.
            let (intercept, slope) = fit_line(&points).unwrap_or_else(|| {
                let mean = points.iter().map(|(_, y)| *y).sum::<f64>() / points.len() as f64;
                (mean, 0.0)
            });

            for year in min_year..=max_year {
                let is_valid = valid.iter().any(|&(v, _)| v == year);
                years.insert(
                    year,
                    YearPoint {
                        mean: intercept + slope * f64::from(year),
                        sample_count: sample_count(year),
                        interpolated: !is_valid,
                    },
                );
            }
        }
    }

    Some(YearlyTrend { years })
}

/// Trend curves for every (role, trait) combination of a run.
#[derive(Debug, Clone, Default)]
pub struct RoleTrends {
    per_role: [HashMap<String, YearlyTrend>; 3],
}

impl RoleTrends {
    pub fn get(&self, role: AncestorRole, trait_name: &str) -> Option<&YearlyTrend> {
        self.per_role[role.index()].get(trait_name)
    }

    pub fn insert(&mut self, role: AncestorRole, trait_name: String, trend: YearlyTrend) {
        self.per_role[role.index()].insert(trait_name, trend);
    }
}

/// Build the trend curves for all roles and traits.
///
/// A sample contributes to a role's curve when that role's ancestor was
/// directly identified in the lookup *and* the role's birth-year field is
/// known; the curve is keyed on that birth-year field (the animal's own
/// birth year for the sire, the dam's for the mgs, the mgd's for the mmgs).
pub fn build_role_trends(
    animals: &[AnimalRecord],
    traits: &[String],
    lookups: &HashMap<String, TraitMap>,
    anchors: &AnchorValues,
) -> RoleTrends {
    let mut trends = RoleTrends::default();

    for role in AncestorRole::ALL {
        for trait_name in traits {
            let samples: Vec<(i32, f64)> = animals
                .iter()
                .filter_map(|animal| {
                    let id = animal.ancestor_id(role)?;
                    let year = animal.role_birth_year(role)?;
                    let value = lookups.get(id)?.get(trait_name)?;
                    Some((year, *value))
                })
                .collect();

            if let Some(trend) = estimate_trend(&samples, anchors.get(trait_name)) {
                trends.insert(role, trait_name.clone(), trend);
            }
        }
    }

    trends
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples_for_year(year: i32, values: &[f64]) -> Vec<(i32, f64)> {
        values.iter().map(|&v| (year, v)).collect()
    }

    fn bulk(year: i32, value: f64, n: usize) -> Vec<(i32, f64)> {
        std::iter::repeat_n((year, value), n).collect()
    }

    #[test]
    fn regression_prediction_replaces_raw_means_on_valid_years() {
        // Three valid years with means 90 / 100 / 110 plus one thin year.
        let mut samples = Vec::new();
        samples.extend(bulk(2018, 90.0, 10));
        samples.extend(bulk(2019, 100.0, 10));
        samples.extend(bulk(2020, 110.0, 10));
        samples.extend(samples_for_year(2021, &[500.0, 500.0])); // count 2 < 10

        let trend = estimate_trend(&samples, 50.0).unwrap();
        assert_eq!(trend.year_range(), Some((2018, 2021)));
        assert_eq!(trend.len(), 4);

        // The line is exact: slope 10/year through (2019, 100).
        for (year, expected) in [(2018, 90.0), (2019, 100.0), (2020, 110.0), (2021, 120.0)] {
            assert!((trend.value_for(year).unwrap() - expected).abs() < 1e-6, "year {year}");
        }

        // Interpolated flags exactly the non-valid years.
        assert!(!trend.point(2018).unwrap().interpolated);
        assert!(!trend.point(2019).unwrap().interpolated);
        assert!(!trend.point(2020).unwrap().interpolated);
        assert!(trend.point(2021).unwrap().interpolated);
        assert_eq!(trend.point(2021).unwrap().sample_count, 2);
    }

    #[test]
    fn single_valid_year_interior_builds_piecewise_line() {
        // Valid year 2019 (mean 110) above a thin 2016; anchor 50 at the
        // minimum year. Slope = (110 - 50) / (2019 - 2016) = 20.
        let mut samples = samples_for_year(2016, &[400.0]);
        samples.extend(bulk(2019, 110.0, 12));
        samples.extend(samples_for_year(2021, &[0.0]));

        let trend = estimate_trend(&samples, 50.0).unwrap();
        assert_eq!(trend.year_range(), Some((2016, 2021)));

        // Below the valid year: interpolation toward the anchor.
        assert!((trend.value_for(2016).unwrap() - 50.0).abs() < 1e-9);
        assert!((trend.value_for(2017).unwrap() - 70.0).abs() < 1e-9);
        assert!((trend.value_for(2018).unwrap() - 90.0).abs() < 1e-9);
        // At and after: the same slope extrapolated forward.
        assert!((trend.value_for(2019).unwrap() - 110.0).abs() < 1e-9);
        assert!((trend.value_for(2020).unwrap() - 130.0).abs() < 1e-9);
        assert!((trend.value_for(2021).unwrap() - 150.0).abs() < 1e-9);

        for year in 2016..=2021 {
            assert_eq!(trend.point(year).unwrap().interpolated, year != 2019, "year {year}");
        }
    }

    #[test]
    fn single_valid_year_at_minimum_anchors_one_year_after() {
        // Valid year is the minimum: the anchor point moves to valid+1, so
        // slope = (mean - anchor) / (valid - (valid+1)) = anchor - mean.
        let mut samples = bulk(2018, 80.0, 10);
        samples.extend(samples_for_year(2020, &[1.0]));

        let trend = estimate_trend(&samples, 50.0).unwrap();
        assert!((trend.value_for(2018).unwrap() - 80.0).abs() < 1e-9);
        assert!((trend.value_for(2019).unwrap() - 50.0).abs() < 1e-9);
        assert!((trend.value_for(2020).unwrap() - 20.0).abs() < 1e-9);
        assert!(!trend.point(2018).unwrap().interpolated);
        assert!(trend.point(2019).unwrap().interpolated);
    }

    #[test]
    fn zero_valid_years_fall_back_to_the_anchor() {
        let samples = vec![(2015, 300.0), (2017, -40.0), (2018, 12.0)];
        let trend = estimate_trend(&samples, 50.0).unwrap();
        assert_eq!(trend.year_range(), Some((2015, 2018)));
        for year in 2015..=2018 {
            let p = trend.point(year).unwrap();
            assert_eq!(p.mean, 50.0);
            assert!(p.interpolated);
        }
    }

    #[test]
    fn degenerate_single_year_range_produces_one_prediction() {
        // min == max, one usable year, zero variance: no division errors.
        let trend = estimate_trend(&bulk(2019, 77.0, 15), 50.0).unwrap();
        assert_eq!(trend.len(), 1);
        assert!((trend.value_for(2019).unwrap() - 77.0).abs() < 1e-9);
        assert!(!trend.point(2019).unwrap().interpolated);
    }

    #[test]
    fn no_samples_yields_no_trend() {
        assert!(estimate_trend(&[], 50.0).is_none());
    }
}
