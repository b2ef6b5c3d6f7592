//! Weight-profile store.
//!
//! Profiles live in a small keyed JSON document (`name → trait → weight`).
//! Two built-in profiles always exist and cannot be deleted or overwritten;
//! user-defined profiles must satisfy the abs-sum-100 invariant before they
//! are accepted, so an invalid profile can never reach the ranking stage.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::WeightProfile;
use crate::error::{ErrorKind, PipelineError};

/// Tolerance on `sum(|weight|) == 100`.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-4;

pub const BUILTIN_PROFILE_NAMES: [&str; 2] = ["nm-default", "production"];

/// The two protected built-in profiles.
pub fn builtin_profiles() -> Vec<WeightProfile> {
    vec![
        WeightProfile {
            name: "nm-default".to_string(),
            weights: BTreeMap::from([("NM$".to_string(), 100.0)]),
        },
        WeightProfile {
            name: "production".to_string(),
            weights: BTreeMap::from([
                ("Milk".to_string(), 40.0),
                ("Fat".to_string(), 30.0),
                ("Protein".to_string(), 30.0),
            ]),
        },
    ]
}

/// Validate the profile invariant: `sum(|weight|) == 100 ± 1e-4`, all
/// weights finite, at least one trait.
pub fn validate_weights(weights: &BTreeMap<String, f64>) -> Result<(), PipelineError> {
    if weights.is_empty() {
        return Err(PipelineError::new(
            ErrorKind::WeightProfileInvalid,
            "Profile must weight at least one trait.",
        ));
    }
    if let Some((name, w)) = weights.iter().find(|(_, w)| !w.is_finite()) {
        return Err(PipelineError::new(
            ErrorKind::WeightProfileInvalid,
            format!("Weight for trait '{name}' is not finite ({w})."),
        ));
    }

    let total: f64 = weights.values().map(|w| w.abs()).sum();
    if (total - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(PipelineError::new(
            ErrorKind::WeightProfileInvalid,
            format!("Sum of absolute weights must be 100 (got {total})."),
        ));
    }
    Ok(())
}

/// On-disk profile store. Built-ins are re-seeded on load if missing.
pub struct ProfileStore {
    path: PathBuf,
    profiles: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ProfileStore {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let mut profiles: BTreeMap<String, BTreeMap<String, f64>> = if path.exists() {
            let raw = fs::read_to_string(path).map_err(|e| {
                PipelineError::new(
                    ErrorKind::InvalidInput,
                    format!("Failed to read profile store '{}': {e}", path.display()),
                )
            })?;
            serde_json::from_str(&raw).map_err(|e| {
                PipelineError::new(
                    ErrorKind::InvalidInput,
                    format!("Malformed profile store '{}': {e}", path.display()),
                )
            })?
        } else {
            BTreeMap::new()
        };

        for builtin in builtin_profiles() {
            profiles.entry(builtin.name).or_insert(builtin.weights);
        }

        Ok(Self {
            path: path.to_path_buf(),
            profiles,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<WeightProfile> {
        self.profiles.get(name).map(|weights| WeightProfile {
            name: name.to_string(),
            weights: weights.clone(),
        })
    }

    /// Validate and store a user-defined profile. Built-in names are
    /// protected from being shadowed.
    pub fn save_profile(&mut self, profile: WeightProfile) -> Result<(), PipelineError> {
        if BUILTIN_PROFILE_NAMES.contains(&profile.name.as_str()) {
            return Err(PipelineError::new(
                ErrorKind::WeightProfileInvalid,
                format!("Profile '{}' is built in and cannot be replaced.", profile.name),
            ));
        }
        validate_weights(&profile.weights)?;
        self.profiles.insert(profile.name, profile.weights);
        Ok(())
    }

    pub fn delete_profile(&mut self, name: &str) -> Result<(), PipelineError> {
        if BUILTIN_PROFILE_NAMES.contains(&name) {
            return Err(PipelineError::new(
                ErrorKind::WeightProfileInvalid,
                format!("Profile '{name}' is built in and cannot be deleted."),
            ));
        }
        if self.profiles.remove(name).is_none() {
            return Err(PipelineError::new(
                ErrorKind::InvalidInput,
                format!("No profile named '{name}'."),
            ));
        }
        Ok(())
    }

    /// Write the store back to disk.
    pub fn persist(&self) -> Result<(), PipelineError> {
        let raw = serde_json::to_string_pretty(&self.profiles).map_err(|e| {
            PipelineError::new(
                ErrorKind::ExportFailed,
                format!("Failed to serialize profile store: {e}"),
            )
        })?;
        fs::write(&self.path, raw).map_err(|e| {
            PipelineError::new(
                ErrorKind::ExportFailed,
                format!("Failed to write profile store '{}': {e}", self.path.display()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries.iter().map(|(n, w)| (n.to_string(), *w)).collect()
    }

    #[test]
    fn builtins_satisfy_their_own_invariant() {
        for p in builtin_profiles() {
            validate_weights(&p.weights).unwrap();
        }
    }

    #[test]
    fn abs_sum_must_be_one_hundred_within_tolerance() {
        validate_weights(&weights(&[("NM$", 60.0), ("SCS", -40.0)])).unwrap();
        validate_weights(&weights(&[("NM$", 100.000_05)])).unwrap();

        let err = validate_weights(&weights(&[("NM$", 99.9)])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WeightProfileInvalid);
        let err = validate_weights(&weights(&[("NM$", 100.001)])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WeightProfileInvalid);
    }

    #[test]
    fn store_seeds_builtins_and_protects_them() {
        let path = std::env::temp_dir().join("pedigree-profiles-test-empty.json");
        let _ = fs::remove_file(&path);
        let mut store = ProfileStore::load(&path).unwrap();

        assert!(store.get("nm-default").is_some());
        assert!(store.get("production").is_some());

        let err = store.delete_profile("nm-default").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WeightProfileInvalid);
        let err = store
            .save_profile(WeightProfile {
                name: "production".to_string(),
                weights: weights(&[("Milk", 100.0)]),
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WeightProfileInvalid);
    }

    #[test]
    fn save_and_delete_round_trip_for_user_profiles() {
        let path = std::env::temp_dir().join("pedigree-profiles-test-user.json");
        let _ = fs::remove_file(&path);
        let mut store = ProfileStore::load(&path).unwrap();

        store
            .save_profile(WeightProfile {
                name: "fitness".to_string(),
                weights: weights(&[("PL", 50.0), ("DPR", 30.0), ("SCS", -20.0)]),
            })
            .unwrap();
        store.persist().unwrap();

        let reloaded = ProfileStore::load(&path).unwrap();
        let p = reloaded.get("fitness").unwrap();
        assert_eq!(p.weights.len(), 3);

        let mut store = reloaded;
        store.delete_profile("fitness").unwrap();
        assert!(store.get("fitness").is_none());
        let _ = fs::remove_file(&path);
    }
}
